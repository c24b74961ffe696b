//! Newline-delimited message framing and the duplex channel for pipelink.
//!
//! Every message on the wire is one text line:
//!
//! ```text
//! <title>,<message>\n
//! ```
//!
//! UTF-8 encoded, no length prefix, no escaping — fields must not contain
//! the delimiter or the terminator themselves. A line without a delimiter
//! decodes with `title = "N/A"` and the whole line as the message.
//!
//! The terminator is fixed to `\n` on every platform. Relying on the OS
//! default newline would break framing between peers built for different
//! platforms.

pub mod channel;
pub mod codec;
pub mod error;

pub use channel::{DuplexChannel, FrameReader, FrameWriter};
pub use codec::{
    decode_frame, encode_frame, Frame, FALLBACK_TITLE, FIELD_DELIMITER, LINE_TERMINATOR,
};
pub use error::{FrameError, Result};
