//! Connection supervision and the per-connection service loop.
//!
//! A [`Listener`] or [`Initiator`] owns the reconnect/accept policy: it
//! produces one connected duplex channel at a time and drives a pair of
//! concurrent tasks against it — a receive task feeding decoded frames into
//! a bounded event queue, and a send task emitting frames from a
//! [`FrameSource`] on a fixed cadence. When either task finishes, the
//! connection is torn down and the supervisor starts its next cycle.
//!
//! Shutdown is a shared [`CancellationToken`](tokio_util::sync::CancellationToken):
//! cancel it and every loop unwinds within one pending I/O operation,
//! releasing the connection resources.

pub mod error;
pub mod service;
pub mod source;
pub mod supervisor;

pub use error::{Result, ServiceError};
pub use service::{drive_channel, LoopEnd, ServiceConfig, DEFAULT_EVENT_CAPACITY};
pub use source::{FrameSource, SequenceSource, StaticSource};
pub use supervisor::{Initiator, Listener};
