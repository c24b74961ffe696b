use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::codec::{decode_frame, encode_frame, Frame};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// One live duplex connection, framed.
///
/// Splits into a [`FrameReader`] and a [`FrameWriter`], one per direction.
/// The two directions are independent and never need to lock against each
/// other; each half is single-owner for the lifetime of the connection.
pub struct DuplexChannel<S> {
    stream: S,
}

impl<S: AsyncRead + AsyncWrite> DuplexChannel<S> {
    /// Wrap a connected stream.
    pub fn new(stream: S) -> Self {
        Self { stream }
    }

    /// Split into the read and write halves.
    pub fn split(self) -> (FrameReader<ReadHalf<S>>, FrameWriter<WriteHalf<S>>) {
        let (read, write) = tokio::io::split(self.stream);
        (FrameReader::new(read), FrameWriter::new(write))
    }
}

/// Reads complete frames from an async stream.
///
/// Handles partial reads internally — callers always get complete frames,
/// delivered in exact wire order. Bytes past the last complete frame stay
/// buffered across calls.
pub struct FrameReader<R> {
    inner: R,
    buf: BytesMut,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Create a new frame reader.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Read the next complete frame.
    ///
    /// Returns a buffered frame without touching the stream when one is
    /// already complete. Otherwise suspends on one read at a time until a
    /// full line arrives.
    ///
    /// End of stream yields [`FrameError::ConnectionClosed`] on a frame
    /// boundary, or [`FrameError::Truncated`] when undecoded bytes remain
    /// (reported once; the partial bytes are dropped). Cancellation mid-read
    /// yields [`FrameError::Cancelled`].
    pub async fn read_frame(&mut self, cancel: &CancellationToken) -> Result<Frame> {
        loop {
            if let Some(frame) = decode_frame(&mut self.buf)? {
                return Ok(frame);
            }

            let read = tokio::select! {
                () = cancel.cancelled() => return Err(FrameError::Cancelled),
                read = self.inner.read_buf(&mut self.buf) => read?,
            };

            if read == 0 {
                if self.buf.is_empty() {
                    return Err(FrameError::ConnectionClosed);
                }
                let discarded = self.buf.len();
                self.buf.clear();
                warn!(discarded, "stream ended mid-frame; dropping partial bytes");
                return Err(FrameError::Truncated { discarded });
            }
        }
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

/// Writes complete frames to an async stream.
///
/// No internal queueing — at most one write in flight; the single-writer
/// contract is enforced by exclusive ownership of the write half.
pub struct FrameWriter<W> {
    inner: W,
    buf: BytesMut,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    /// Create a new frame writer.
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Encode and write one frame, then flush.
    ///
    /// A failure means the channel is broken; the caller decides whether to
    /// tear down and reconnect. Nothing is retried at the byte level.
    pub async fn write_frame(&mut self, frame: &Frame, cancel: &CancellationToken) -> Result<()> {
        self.buf.clear();
        encode_frame(frame, &mut self.buf);

        let buf = &self.buf;
        let inner = &mut self.inner;
        tokio::select! {
            () = cancel.cancelled() => return Err(FrameError::Cancelled),
            res = async {
                inner.write_all(buf).await?;
                inner.flush().await
            } => res?,
        }
        Ok(())
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> W {
        self.inner
    }
}
