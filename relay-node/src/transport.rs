//! Framed transport over tokio streams: length-prefixed frames plus the raw ack exchange.

use std::time::Duration;

use relay_core::protocol::LEN_SIZE;
use relay_core::wire::{decode_len, encode_frame};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{RelayError, Result};

/// Pause after a failed accept before trying again.
pub(crate) const ACCEPT_BACKOFF: Duration = Duration::from_secs(1);

/// Write one frame: BE length header + payload, as a single buffered write.
/// No retries here; callers own their retry policy.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode_frame(payload)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one frame whose declared length must be in `1..=max`.
/// An out-of-range length fails before any payload byte is consumed.
pub async fn read_frame<R>(reader: &mut R, max: u32) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; LEN_SIZE];
    read_full(reader, &mut header).await?;
    let len = decode_len(header, max)?;
    let mut payload = vec![0u8; len];
    read_full(reader, &mut payload).await?;
    Ok(payload)
}

/// Single unframed read of at most `n` bytes. Zero bytes means the peer closed.
pub async fn read_fixed<R>(reader: &mut R, n: usize) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; n];
    let got = reader.read(&mut buf).await?;
    if got == 0 {
        return Err(RelayError::PeerClosed);
    }
    buf.truncate(got);
    Ok(buf)
}

/// Unframed write, used only for the ack.
pub async fn write_fixed<W>(writer: &mut W, bytes: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(bytes).await?;
    writer.flush().await?;
    Ok(())
}

/// Fill `buf` completely. EOF before the first byte is an orderly close;
/// EOF part way through is a short read.
async fn read_full<R>(reader: &mut R, buf: &mut [u8]) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Err(RelayError::PeerClosed);
            }
            return Err(RelayError::Transport(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("short read: {} of {} bytes", filled, buf.len()),
            )));
        }
        filled += n;
    }
    Ok(())
}
