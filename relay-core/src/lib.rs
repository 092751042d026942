//! Word relay protocol reference implementation.
//! Host-driven: no I/O; nodes own the sockets and call into this crate for framing, dedup and retry bookkeeping.

pub mod protocol;
pub mod retry;
pub mod wire;
pub mod words;

pub use protocol::{is_ack, ACK, ACK_READ_LEN, MAX_CLIENT_FRAME_LEN, MAX_DISPLAY_FRAME_LEN};
pub use retry::{Attempts, RetryPolicy};
pub use wire::{decode_frame, decode_len, encode_frame, FrameDecodeError, FrameEncodeError};
pub use words::{process_data, validate_data, validate_payload, ValidationError};
