/// Errors that can occur while framing or moving frames over a channel.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// A decoded line is not valid UTF-8.
    #[error("frame is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer closed the connection on a frame boundary.
    #[error("connection closed")]
    ConnectionClosed,

    /// The stream ended mid-frame; the partial bytes were discarded.
    #[error("stream ended mid-frame ({discarded} bytes discarded)")]
    Truncated { discarded: usize },

    /// The operation was cancelled by the shutdown signal.
    #[error("operation cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, FrameError>;
