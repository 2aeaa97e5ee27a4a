//! Length-prefixed framing over any async byte stream.
//!
//! Each frame is a 4-byte unsigned big-endian length followed by exactly
//! that many payload bytes. Both sides of the bridge use these helpers, so
//! the framing rules live here once:
//!
//! - A read that yields zero bytes at the *start* of the length prefix or of
//!   the body is an orderly close ([`read_frame`] returns `Ok(None)`).
//! - A short read partway through the prefix or body is a protocol error.
//! - Decoding the payload is the caller's concern: a malformed body is
//!   dropped and logged by the read loops, never treated as fatal.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::protocol::codec::{encode_message, ProtocolError, MAX_FRAME_LEN};
use crate::protocol::messages::Message;

/// Errors from sending a message: encoding or socket I/O.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Reads one frame body.
///
/// Returns `Ok(None)` when the peer has closed the connection cleanly at a
/// frame boundary.
///
/// # Errors
///
/// Returns an error for I/O failures, a short read inside a frame
/// (`UnexpectedEof`), or a declared length above [`MAX_FRAME_LEN`]
/// (`InvalidData`; the stream has lost frame alignment).
pub async fn read_frame<R>(reader: &mut R) -> io::Result<Option<Vec<u8>>>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    if !read_full(reader, &mut len_buf).await? {
        return Ok(None);
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("declared frame length {len} exceeds maximum {MAX_FRAME_LEN}"),
        ));
    }

    let mut body = vec![0u8; len];
    if len > 0 && !read_full(reader, &mut body).await? {
        return Ok(None);
    }
    Ok(Some(body))
}

/// Writes one frame: the 4-byte big-endian length prefix, then the body.
pub async fn write_frame<W>(writer: &mut W, body: &[u8]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    if body.len() > MAX_FRAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("frame body of {} bytes exceeds maximum {MAX_FRAME_LEN}", body.len()),
        ));
    }
    writer.write_all(&(body.len() as u32).to_be_bytes()).await?;
    writer.write_all(body).await?;
    writer.flush().await
}

/// Encodes `msg` and writes it as one frame.
pub async fn write_message<W>(writer: &mut W, msg: &Message) -> Result<(), SendError>
where
    W: AsyncWrite + Unpin,
{
    let body = encode_message(msg)?;
    write_frame(writer, &body).await?;
    Ok(())
}

/// Fills `buf` completely.
///
/// Returns `Ok(false)` if the stream ended before the first byte (orderly
/// close); errors with `UnexpectedEof` if it ends partway through.
async fn read_full<R>(reader: &mut R, buf: &mut [u8]) -> io::Result<bool>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(false);
            }
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("stream ended after {filled} of {} frame bytes", buf.len()),
            ));
        }
        filled += n;
    }
    Ok(true)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
