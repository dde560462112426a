//! Length-prefixed message framing for relay connections.
//!
//! Message format:
//! ```text
//! ┌─────────────────┬──────────────────────┐
//! │ Length (4 bytes)│ JSON object (N bytes)│
//! │  big-endian u32 │                      │
//! └─────────────────┴──────────────────────┘
//! ```

use anyhow::{anyhow, Result};
use serde::{de::DeserializeOwned, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Maximum frame size (1 MB)
const MAX_FRAME_SIZE: u32 = 1024 * 1024;

/// Read one raw frame from a stream.
///
/// Only transport-level failures (EOF, short read, bogus length prefix)
/// surface here; JSON decoding is left to the caller so that a decode
/// failure can be handled without tearing down the connection.
pub async fn read_frame<R>(reader: &mut R) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    // Read 4-byte length prefix (big-endian)
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await?;
    let len = u32::from_be_bytes(len_buf);

    // Validate frame size
    if len > MAX_FRAME_SIZE {
        return Err(anyhow!(
            "Frame too large: {} bytes (max {})",
            len,
            MAX_FRAME_SIZE
        ));
    }

    if len == 0 {
        return Err(anyhow!("Empty frame"));
    }

    // Read frame body
    let mut buf = vec![0u8; len as usize];
    reader.read_exact(&mut buf).await?;
    Ok(buf)
}

/// Read a length-prefixed JSON message from a stream.
pub async fn read_message<R, T>(reader: &mut R) -> Result<T>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let buf = read_frame(reader).await?;
    let message: T = serde_json::from_slice(&buf)?;
    Ok(message)
}

/// Write a length-prefixed JSON message to a stream.
pub async fn write_message<W, T>(writer: &mut W, message: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    // Serialize to JSON
    let json_bytes = serde_json::to_vec(message)?;

    // Validate frame size
    if json_bytes.len() > MAX_FRAME_SIZE as usize {
        return Err(anyhow!(
            "Frame too large: {} bytes (max {})",
            json_bytes.len(),
            MAX_FRAME_SIZE
        ));
    }

    // Write length prefix (big-endian)
    let len = json_bytes.len() as u32;
    writer.write_all(&len.to_be_bytes()).await?;

    // Write message body
    writer.write_all(&json_bytes).await?;

    // Flush to ensure message is sent immediately
    writer.flush().await?;

    Ok(())
}
