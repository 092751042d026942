//! Client: send framed text to the processing node and wait for `OK`, reconnecting on failure.

use std::time::Duration;

use relay_core::{is_ack, RetryPolicy, ACK_READ_LEN};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::error::{RelayError, Result};
use crate::shutdown::ShutdownToken;
use crate::transport;

/// Default bound on waiting for an ack.
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(5);

/// Console command that ends the interactive loop.
const EXIT_COMMAND: &str = "exit";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    /// Attempts per `send`, each possibly reconnecting.
    pub retry: RetryPolicy,
    /// `None` waits for an ack as long as the transport allows.
    pub ack_timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            retry: RetryPolicy::CLIENT_SEND,
            ack_timeout: Some(DEFAULT_ACK_TIMEOUT),
        }
    }

    fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Owns at most one connection to the processing node.
/// Disconnected when `conn` is `None`; sends are strictly sequential.
pub struct Client {
    config: ClientConfig,
    conn: Option<TcpStream>,
}

impl Client {
    pub fn new(config: ClientConfig) -> Self {
        Self { config, conn: None }
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    /// Open a fresh connection, replacing any current one. No retries here.
    pub async fn connect(&mut self) -> Result<()> {
        self.disconnect().await;
        let addr = self.config.addr();
        let stream = TcpStream::connect(addr.as_str())
            .await
            .map_err(|source| RelayError::Connect {
                addr: addr.clone(),
                source,
            })?;
        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "set_nodelay failed");
        }
        info!(%addr, "connected to processing node");
        self.conn = Some(stream);
        Ok(())
    }

    /// Send one message and wait for its ack. Each attempt reconnects if needed;
    /// a failed write or ack tears the connection down and consumes an attempt.
    /// Returns `false` once the retry budget is spent. Empty messages are refused locally.
    pub async fn send(&mut self, message: &str) -> bool {
        if message.is_empty() {
            warn!("refusing to send an empty message");
            return false;
        }
        let mut attempts = self.config.retry.start();
        while let Some(attempt) = attempts.next_attempt() {
            tokio::time::sleep(attempts.backoff()).await;
            match self.try_send(message.as_bytes()).await {
                Ok(()) => {
                    debug!(attempt, "message acknowledged");
                    return true;
                }
                Err(e) => {
                    warn!(attempt, error = %e, "send attempt failed");
                    self.disconnect().await;
                }
            }
        }
        warn!(attempts = attempts.used(), "giving up on message");
        false
    }

    async fn try_send(&mut self, payload: &[u8]) -> Result<()> {
        if self.conn.is_none() {
            self.connect().await?;
        }
        let conn = self.conn.as_mut().ok_or(RelayError::PeerClosed)?;
        transport::write_frame(conn, payload).await?;
        self.await_ack().await
    }

    /// Single read of up to 31 bytes; succeeds only on exactly `OK`.
    pub async fn await_ack(&mut self) -> Result<()> {
        let conn = self.conn.as_mut().ok_or(RelayError::PeerClosed)?;
        let read = transport::read_fixed(conn, ACK_READ_LEN);
        let reply = match self.config.ack_timeout {
            Some(limit) => tokio::time::timeout(limit, read)
                .await
                .map_err(|_| RelayError::NoAck)??,
            None => read.await?,
        };
        if is_ack(&reply) {
            Ok(())
        } else {
            debug!(len = reply.len(), "unexpected ack bytes");
            Err(RelayError::NoAck)
        }
    }

    /// Shut down and drop the connection if there is one. Idempotent.
    pub async fn disconnect(&mut self) {
        if let Some(mut conn) = self.conn.take() {
            let _ = conn.shutdown().await;
            debug!("disconnected");
        }
    }

    /// Console loop: send each input line until `exit`, end of input, or shutdown.
    /// A failed send is reported and the loop keeps going.
    pub async fn run_interactive<R>(&mut self, input: R, shutdown: &ShutdownToken) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        loop {
            let line = tokio::select! {
                _ = shutdown.triggered() => break,
                line = lines.next_line() => line?,
            };
            let Some(line) = line else { break };
            if line == EXIT_COMMAND {
                break;
            }
            if !self.send(&line).await {
                warn!("failed to deliver message to processing node");
            }
        }
        self.disconnect().await;
        Ok(())
    }
}
