/// Errors that can occur in service operations.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] pipelink_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] pipelink_frame::FrameError),
}

pub type Result<T> = std::result::Result<T, ServiceError>;
