//! Frame codec
//!
//! Packet layout:
//!
//! ``MAGIC(4) || LENGTH(4, big-endian) || PAYLOAD``
//!
//! PAYLOAD is a JSON-encoded [`Frame`]: a correlation id plus one
//! [`Message`]. Requests and responses on one connection are paired by the
//! correlation id, so a single socket can carry interleaved exchanges in
//! both directions.

use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{ProtocolError, Result};

use super::message::Message;

/// Protocol magic constant "LIB1"
pub const MAGIC: [u8; 4] = *b"LIB1";

/// Maximum accepted payload size
pub const MAX_FRAME_LEN: usize = 8 * 1024 * 1024;

/// One framed message with its correlation id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Correlation id pairing a response with its request
    pub id: u64,
    /// The message body
    pub body: Message,
}

impl Frame {
    /// Create a frame
    pub fn new(id: u64, body: Message) -> Self {
        Self { id, body }
    }
}

/// Write one frame to the stream
pub async fn write_frame<W>(writer: &mut W, frame: &Frame) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let payload = serde_json::to_vec(frame)?;
    if payload.len() > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge(payload.len()).into());
    }

    let mut buf = BytesMut::with_capacity(8 + payload.len());
    buf.put_slice(&MAGIC);
    buf.put_u32(payload.len() as u32);
    buf.put_slice(&payload);

    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one frame from the stream
///
/// Returns `Ok(None)` on a clean close (EOF before the first header byte).
/// EOF in the middle of a frame is an error.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Frame>>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; 8];
    match reader.read_exact(&mut header).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let magic: [u8; 4] = header[0..4].try_into().expect("4-byte slice");
    if magic != MAGIC {
        return Err(ProtocolError::BadMagic(magic).into());
    }

    let len = u32::from_be_bytes(header[4..8].try_into().expect("4-byte slice")) as usize;
    if len > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge(len).into());
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;

    let frame = serde_json::from_slice(&payload)?;
    Ok(Some(frame))
}
