//! Local named-pipe transport for pipelink.
//!
//! Both peers rendezvous on a filesystem socket path agreed out-of-band —
//! the OS-local analogue of naming a pipe. The listener binds the path and
//! accepts one peer at a time; the initiator connects to it. All I/O is
//! asynchronous (tokio).

pub mod endpoint;
pub mod error;

pub use endpoint::PipeEndpoint;
pub use error::{Result, TransportError};
