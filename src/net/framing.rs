//! Wire codec for tree connections.
//!
//! Every logical message travels as one length-prefixed frame:
//!
//! ```text
//! [u32 LE length] [payload: length bytes]
//! ```
//!
//! The payload is opaque to this layer. A zero-length frame is a legal
//! empty message; lengths above [`MAX_FRAME_SIZE`] are rejected as
//! malformed.
//!
//! [`FrameReader`] turns a byte stream into one frame per call, which is the
//! only property the handshake and dispatch loop depend on.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::constants::{FRAME_HEADER_LEN, MAX_FRAME_SIZE, READ_BUFFER_SIZE};

/// Error produced while encoding, decoding or moving frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// Peer closed the stream on a frame boundary.
    #[error("connection closed by peer")]
    Closed,

    /// Peer closed the stream in the middle of a frame.
    #[error("connection closed mid-frame ({buffered} bytes buffered)")]
    Truncated {
        /// Bytes of the incomplete frame received before EOF.
        buffered: usize,
    },

    /// Declared or requested frame length exceeds the limit.
    #[error("frame too large: {0} bytes (max {MAX_FRAME_SIZE})")]
    TooLarge(usize),

    /// Transport-level I/O failure.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

/// Encode a payload into a wire-format frame.
///
/// Returns `[u32 LE length][payload]`.
pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    let length = u32::try_from(payload.len())
        .ok()
        .filter(|len| *len <= MAX_FRAME_SIZE)
        .ok_or(FrameError::TooLarge(payload.len()))?;

    let mut buf = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
    buf.extend_from_slice(&length.to_le_bytes());
    buf.extend_from_slice(payload);
    Ok(buf)
}

/// Write one frame and flush it.
pub async fn send_frame<W>(writer: &mut W, payload: &[u8]) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
{
    let encoded = encode_frame(payload)?;
    writer.write_all(&encoded).await?;
    writer.flush().await?;
    Ok(())
}

/// Incremental frame decoder that handles partial reads.
///
/// Push bytes via [`FrameDecoder::push`] and pull complete frames with
/// [`FrameDecoder::next_frame`], or do both at once with
/// [`FrameDecoder::feed`]. Handles TCP-style byte stream reassembly.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
}

impl FrameDecoder {
    /// Create a new decoder with empty buffer.
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Append raw stream bytes to the reassembly buffer.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Extract the next complete frame, if one is buffered.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::TooLarge`] as soon as a header declares an
    /// oversized frame, without waiting for its payload.
    pub fn next_frame(&mut self) -> Result<Option<Vec<u8>>, FrameError> {
        let Some(header) = self.buf.get(..FRAME_HEADER_LEN) else {
            return Ok(None);
        };
        let length = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        if length > MAX_FRAME_SIZE {
            return Err(FrameError::TooLarge(length as usize));
        }

        let total = FRAME_HEADER_LEN + length as usize;
        if self.buf.len() < total {
            return Ok(None); // Incomplete frame, wait for more data
        }

        let payload = self.buf[FRAME_HEADER_LEN..total].to_vec();
        self.buf.drain(..total);
        Ok(Some(payload))
    }

    /// Feed bytes into the decoder and extract all complete frames.
    ///
    /// Incomplete data is buffered for the next call.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Vec<Vec<u8>>, FrameError> {
        self.push(bytes);
        let mut frames = Vec::new();
        while let Some(frame) = self.next_frame()? {
            frames.push(frame);
        }
        Ok(frames)
    }

    /// Returns true if the decoder has buffered partial data.
    pub fn has_partial(&self) -> bool {
        !self.buf.is_empty()
    }

    /// Number of buffered bytes not yet returned as a frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}

/// Reads exactly one frame per call from an async byte stream.
///
/// Bytes that arrive beyond the current frame stay buffered for the next
/// [`FrameReader::read_frame`] call, so back-to-back frames in a single
/// TCP segment are never lost or merged.
pub struct FrameReader<R> {
    reader: R,
    decoder: FrameDecoder,
    buf: Box<[u8]>,
}

impl<R> std::fmt::Debug for FrameReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameReader")
            .field("buffered", &self.decoder.buffered())
            .finish_non_exhaustive()
    }
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Wrap a reader with an empty reassembly buffer.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            decoder: FrameDecoder::new(),
            buf: vec![0u8; READ_BUFFER_SIZE].into_boxed_slice(),
        }
    }

    /// Read the next complete frame.
    ///
    /// Blocks until a full frame is available. There is no timeout; the
    /// call only ends on a frame, EOF, or a transport error.
    pub async fn read_frame(&mut self) -> Result<Vec<u8>, FrameError> {
        loop {
            if let Some(frame) = self.decoder.next_frame()? {
                return Ok(frame);
            }

            let n = self.reader.read(&mut self.buf).await?;
            if n == 0 {
                // EOF
                return Err(if self.decoder.has_partial() {
                    FrameError::Truncated {
                        buffered: self.decoder.buffered(),
                    }
                } else {
                    FrameError::Closed
                });
            }
            self.decoder.push(&self.buf[..n]);
        }
    }
}
