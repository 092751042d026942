//! Display node: accept framed messages and render them. Never acknowledges.

use std::net::SocketAddr;
use std::sync::Arc;

use relay_core::MAX_DISPLAY_FRAME_LEN;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::error::{RelayError, Result};
use crate::shutdown::{NodeHandle, ShutdownToken};
use crate::transport::{self, ACCEPT_BACKOFF};

/// Sink for received messages. Rendering failures stay local to the display node.
pub trait Renderer: Send + Sync + 'static {
    fn render(&self, peer: SocketAddr, text: &str);
}

/// Prints `Received: <text>` to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleRenderer;

impl Renderer for ConsoleRenderer {
    fn render(&self, _peer: SocketAddr, text: &str) {
        println!("Received: {text}");
    }
}

/// Hands each rendered message to a channel; a closed receiver just drops output.
impl Renderer for mpsc::UnboundedSender<String> {
    fn render(&self, _peer: SocketAddr, text: &str) {
        let _ = self.send(text.to_owned());
    }
}

pub struct DisplayNode {
    listener: TcpListener,
    renderer: Arc<dyn Renderer>,
    max_frame_len: u32,
    shutdown: ShutdownToken,
}

impl DisplayNode {
    pub async fn bind(
        listen: SocketAddr,
        renderer: impl Renderer,
        shutdown: ShutdownToken,
    ) -> Result<Self> {
        let listener = TcpListener::bind(listen)
            .await
            .map_err(|source| RelayError::Bind {
                addr: listen.to_string(),
                source,
            })?;
        info!(listen = %listener.local_addr()?, "display node ready");
        Ok(Self {
            listener,
            renderer: Arc::new(renderer),
            max_frame_len: MAX_DISPLAY_FRAME_LEN,
            shutdown,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn handle(&self) -> NodeHandle {
        NodeHandle::new(self.shutdown.clone())
    }

    /// Accept connections until stopped; each connection gets its own read loop.
    pub async fn run(self) -> Result<()> {
        let mut readers = JoinSet::new();
        loop {
            tokio::select! {
                _ = self.shutdown.triggered() => break,
                Some(_) = readers.join_next(), if !readers.is_empty() => {}
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let span = info_span!("display_conn", conn = %uuid::Uuid::new_v4(), %peer);
                        readers.spawn(
                            read_loop(
                                stream,
                                peer,
                                self.renderer.clone(),
                                self.max_frame_len,
                                self.shutdown.clone(),
                            )
                            .instrument(span),
                        );
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
        while readers.join_next().await.is_some() {}
        info!("display node stopped");
        Ok(())
    }
}

async fn read_loop(
    mut stream: TcpStream,
    peer: SocketAddr,
    renderer: Arc<dyn Renderer>,
    max_frame_len: u32,
    shutdown: ShutdownToken,
) {
    debug!("connection accepted");
    loop {
        let frame = tokio::select! {
            _ = shutdown.triggered() => break,
            frame = transport::read_frame(&mut stream, max_frame_len) => frame,
        };
        match frame {
            Ok(payload) => renderer.render(peer, &String::from_utf8_lossy(&payload)),
            Err(RelayError::PeerClosed) => {
                info!("peer disconnected");
                break;
            }
            Err(e) => {
                warn!(error = %e, "dropping connection");
                break;
            }
        }
    }
}
