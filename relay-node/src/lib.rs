//! Word relay nodes: Client -> Processing -> Display over framed TCP.

pub mod client;
pub mod config;
pub mod display;
pub mod error;
pub mod processing;
pub mod shutdown;
pub mod supervisor;
pub mod transport;

pub use client::{Client, ClientConfig};
pub use display::{ConsoleRenderer, DisplayNode, Renderer};
pub use error::{RelayError, Result};
pub use processing::{ProcessingConfig, ProcessingNode};
pub use shutdown::{NodeHandle, ShutdownToken};
