//! Word relay wire protocol: constants shared by every role.
//!
//! Client -> Processing: `[u32 BE length][payload]`.
//! Processing -> Client: `OK` (2 raw bytes, unframed).
//! Processing -> Display: `[u32 BE length][payload]`.

/// Size of the big-endian length prefix.
pub const LEN_SIZE: usize = 4;

/// Acknowledgement sent unframed by the processing node after a successful forward.
pub const ACK: &[u8] = b"OK";

/// Maximum number of bytes a client reads while waiting for an ack.
pub const ACK_READ_LEN: usize = 31;

/// Largest payload the processing node accepts from a client.
pub const MAX_CLIENT_FRAME_LEN: u32 = 4095;

/// Largest payload the display node accepts (16 MiB).
pub const MAX_DISPLAY_FRAME_LEN: u32 = 16 * 1024 * 1024;

/// True iff `bytes` is exactly the ack literal. Partial or padded reads are failures.
pub fn is_ack(bytes: &[u8]) -> bool {
    bytes == ACK
}
