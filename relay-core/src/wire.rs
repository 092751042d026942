//! Framing: length-prefix (4 bytes BE) + raw payload bytes.

use crate::protocol::LEN_SIZE;

/// Encode a payload into a single frame: 4 bytes BE length + payload.
/// The whole frame lands in one buffer so a writer can emit it with one call.
pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>, FrameEncodeError> {
    if payload.is_empty() {
        return Err(FrameEncodeError::Empty);
    }
    let len = u32::try_from(payload.len()).map_err(|_| FrameEncodeError::TooLarge(payload.len()))?;
    let mut out = Vec::with_capacity(LEN_SIZE + payload.len());
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(payload);
    Ok(out)
}

/// Error encoding a payload into a frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameEncodeError {
    #[error("refusing to encode an empty frame")]
    Empty,
    #[error("payload of {0} bytes does not fit a u32 length prefix")]
    TooLarge(usize),
}

/// Validate a length header against the receiver's maximum.
/// Zero and anything above `max` are protocol violations; the payload must not be read.
pub fn decode_len(header: [u8; LEN_SIZE], max: u32) -> Result<usize, FrameDecodeError> {
    let len = u32::from_be_bytes(header);
    if len == 0 {
        return Err(FrameDecodeError::Empty);
    }
    if len > max {
        return Err(FrameDecodeError::TooLarge { len, max });
    }
    Ok(len as usize)
}

/// Decode one frame from the front of `bytes`. Returns the payload and the number of bytes consumed.
/// Call with partial buffer; returns `NeedMore` if not enough bytes (caller should try again after more data).
pub fn decode_frame(bytes: &[u8], max: u32) -> Result<(&[u8], usize), FrameDecodeError> {
    if bytes.len() < LEN_SIZE {
        return Err(FrameDecodeError::NeedMore);
    }
    let len = decode_len([bytes[0], bytes[1], bytes[2], bytes[3]], max)?;
    if bytes.len() < LEN_SIZE + len {
        return Err(FrameDecodeError::NeedMore);
    }
    Ok((&bytes[LEN_SIZE..LEN_SIZE + len], LEN_SIZE + len))
}

/// Error decoding a frame (need more bytes, zero length, or over the receiver's limit).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameDecodeError {
    #[error("need more bytes")]
    NeedMore,
    #[error("frame declares zero length")]
    Empty,
    #[error("frame declares {len} bytes, limit is {max}")]
    TooLarge { len: u32, max: u32 },
}
