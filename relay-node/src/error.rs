//! Error taxonomy for node and connection lifecycles.

use relay_core::{FrameDecodeError, FrameEncodeError, ValidationError};

pub type Result<T> = std::result::Result<T, RelayError>;

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Peer unreachable or refused.
    #[error("connect to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("bind {addr} failed: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    /// Short read/write or socket fault.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),
    /// Orderly disconnect: zero bytes read.
    #[error("peer closed the connection")]
    PeerClosed,
    #[error("invalid frame: {0}")]
    InvalidFrame(#[from] FrameDecodeError),
    #[error("cannot frame payload: {0}")]
    Encode(#[from] FrameEncodeError),
    #[error("invalid message: {0}")]
    Validation(#[from] ValidationError),
    #[error("no acknowledgement from peer")]
    NoAck,
    #[error("shutdown requested")]
    Shutdown,
}

impl RelayError {
    /// Startup failures end a node; everything else is local to one connection or one send.
    pub fn is_fatal(&self) -> bool {
        matches!(self, RelayError::Connect { .. } | RelayError::Bind { .. })
    }
}
