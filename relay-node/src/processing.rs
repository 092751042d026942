//! Processing node: TCP server towards clients, TCP client towards the display node.
//! One worker per accepted client; all workers share the single display link.

use std::net::SocketAddr;
use std::sync::Arc;
use relay_core::{process_data, validate_payload, RetryPolicy, ACK, MAX_CLIENT_FRAME_LEN};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::error::{RelayError, Result};
use crate::shutdown::{NodeHandle, ShutdownToken};
use crate::transport::{self, ACCEPT_BACKOFF};

#[derive(Debug, Clone)]
pub struct ProcessingConfig {
    /// Client-facing listen address.
    pub listen: SocketAddr,
    pub display_host: String,
    pub display_port: u16,
    /// Largest client payload accepted; longer declarations close the connection.
    pub max_frame_len: u32,
    /// Forward-and-ack retry budget per message.
    pub forward_retry: RetryPolicy,
}

impl ProcessingConfig {
    pub fn new(listen: SocketAddr, display_host: impl Into<String>, display_port: u16) -> Self {
        Self {
            listen,
            display_host: display_host.into(),
            display_port,
            max_frame_len: MAX_CLIENT_FRAME_LEN,
            forward_retry: RetryPolicy::FORWARD,
        }
    }

    fn display_addr(&self) -> String {
        format!("{}:{}", self.display_host, self.display_port)
    }
}

/// The one persistent connection to the display node. Each frame is written
/// under the lock so frames from different workers never interleave.
struct DisplayLink {
    addr: String,
    stream: Mutex<TcpStream>,
}

impl DisplayLink {
    async fn connect(addr: String) -> Result<Self> {
        let stream = TcpStream::connect(addr.as_str())
            .await
            .map_err(|source| RelayError::Connect {
                addr: addr.clone(),
                source,
            })?;
        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "set_nodelay failed on display link");
        }
        Ok(Self {
            addr,
            stream: Mutex::new(stream),
        })
    }

    async fn forward(&self, payload: &[u8]) -> Result<()> {
        let mut stream = self.stream.lock().await;
        transport::write_frame(&mut *stream, payload).await
    }

    async fn close(&self) {
        let mut stream = self.stream.lock().await;
        let _ = stream.shutdown().await;
    }
}

/// A bound processing node with a live display link. Call [`ProcessingNode::run`] to serve.
pub struct ProcessingNode {
    listener: TcpListener,
    display: Arc<DisplayLink>,
    config: Arc<ProcessingConfig>,
    shutdown: ShutdownToken,
}

impl ProcessingNode {
    /// Bind the client-facing listener, then connect to the display node.
    /// Either failure is fatal: no client is accepted without a working downstream link.
    pub async fn bind(config: ProcessingConfig, shutdown: ShutdownToken) -> Result<Self> {
        let listener = TcpListener::bind(config.listen)
            .await
            .map_err(|source| RelayError::Bind {
                addr: config.listen.to_string(),
                source,
            })?;
        let link = DisplayLink::connect(config.display_addr()).await?;
        info!(
            listen = %listener.local_addr()?,
            display = %link.addr,
            "processing node ready"
        );
        Ok(Self {
            listener,
            display: Arc::new(link),
            config: Arc::new(config),
            shutdown,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn handle(&self) -> NodeHandle {
        NodeHandle::new(self.shutdown.clone())
    }

    /// Accept clients until stopped. Returns once every worker has exited and the display link is closed.
    pub async fn run(self) -> Result<()> {
        let mut workers = JoinSet::new();
        loop {
            tokio::select! {
                _ = self.shutdown.triggered() => break,
                Some(_) = workers.join_next(), if !workers.is_empty() => {}
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let span = info_span!("client", conn = %uuid::Uuid::new_v4(), %peer);
                        let worker = Worker {
                            display: self.display.clone(),
                            config: self.config.clone(),
                            shutdown: self.shutdown.clone(),
                        };
                        workers.spawn(worker.serve(stream).instrument(span));
                    }
                    Err(e) => {
                        warn!(error = %e, "accept failed, retrying");
                        if !self.shutdown.sleep(ACCEPT_BACKOFF).await {
                            break;
                        }
                    }
                },
            }
        }
        drop(self.listener);
        while workers.join_next().await.is_some() {}
        self.display.close().await;
        info!("processing node stopped");
        Ok(())
    }
}

/// Per-connection state: everything a worker needs, nothing shared but the display link.
struct Worker {
    display: Arc<DisplayLink>,
    config: Arc<ProcessingConfig>,
    shutdown: ShutdownToken,
}

impl Worker {
    async fn serve(self, stream: TcpStream) {
        debug!("client connected");
        let (mut reader, mut writer) = stream.into_split();
        loop {
            let frame = tokio::select! {
                _ = self.shutdown.triggered() => break,
                frame = transport::read_frame(&mut reader, self.config.max_frame_len) => frame,
            };
            let payload = match frame {
                Ok(p) => p,
                Err(RelayError::PeerClosed) => {
                    info!("client disconnected");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "closing client connection");
                    break;
                }
            };
            match self.handle_message(&payload, &mut writer).await {
                Ok(()) => {}
                Err(RelayError::Shutdown) => break,
                Err(RelayError::Validation(e)) => {
                    warn!(error = %e, len = payload.len(), "skipping message without ack");
                }
                Err(e) => error!(error = %e, "giving up on message"),
            }
        }
        // Dropping both halves closes the client socket.
    }

    /// Validate, dedup, then forward and ack within the retry budget.
    /// A stop request abandons the message with [`RelayError::Shutdown`].
    async fn handle_message<W>(&self, payload: &[u8], client: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let text = validate_payload(payload)?;
        let processed = process_data(text);
        debug!(len = payload.len(), out = processed.len(), "processed message");

        let mut attempts = self.config.forward_retry.start();
        let mut last_err = RelayError::NoAck;
        while let Some(attempt) = attempts.next_attempt() {
            let backoff = attempts.backoff();
            let outcome = tokio::select! {
                biased;
                _ = self.shutdown.triggered() => return Err(RelayError::Shutdown),
                outcome = async {
                    tokio::time::sleep(backoff).await;
                    self.forward_and_ack(&processed, client).await
                } => outcome,
            };
            match outcome {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!(attempt, error = %e, "forward or ack failed");
                    last_err = e;
                }
            }
        }
        Err(last_err)
    }

    /// Forward to the display node, then ack the client unframed.
    /// A lost ack after a successful forward means the client's resend is forwarded again.
    async fn forward_and_ack<W>(&self, processed: &str, client: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        self.display.forward(processed.as_bytes()).await?;
        transport::write_fixed(client, ACK).await
    }
}
