use bytes::{BufMut, BytesMut};

use crate::error::Result;

/// Separates the title from the message within one wire line.
pub const FIELD_DELIMITER: u8 = b',';

/// Terminates each wire line. Fixed to `\n` on all platforms.
pub const LINE_TERMINATOR: u8 = b'\n';

/// Title substituted when a decoded line carries no delimiter.
pub const FALLBACK_TITLE: &str = "N/A";

/// One decoded logical message.
///
/// Neither field may contain [`LINE_TERMINATOR`], and the title must not
/// contain [`FIELD_DELIMITER`]. The codec does not enforce this — producers
/// must guarantee it, since the wire format has no escaping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Short label for the message.
    pub title: String,
    /// The message body. May itself contain delimiters (relaxed split).
    pub message: String,
}

impl Frame {
    /// Create a new frame.
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
        }
    }

    /// The total wire size of this frame (fields + delimiter + terminator).
    pub fn wire_size(&self) -> usize {
        self.title.len() + self.message.len() + 2
    }
}

/// Encode a frame into the wire format: `title,message\n`.
pub fn encode_frame(frame: &Frame, dst: &mut BytesMut) {
    dst.reserve(frame.wire_size());
    dst.put_slice(frame.title.as_bytes());
    dst.put_u8(FIELD_DELIMITER);
    dst.put_slice(frame.message.as_bytes());
    dst.put_u8(LINE_TERMINATOR);
}

/// Decode the next frame from a buffer.
///
/// Returns `Ok(None)` and leaves the buffer untouched when no terminator is
/// present yet. Once a terminator is found, the line is consumed including
/// its terminator even when it fails to decode, so one bad line cannot
/// wedge the stream; trailing bytes are preserved for the next call.
///
/// The line is split on the FIRST delimiter only, so the message may itself
/// contain delimiters. A line without any delimiter decodes as
/// `(FALLBACK_TITLE, line)` — a deliberate fallback, not an error.
pub fn decode_frame(src: &mut BytesMut) -> Result<Option<Frame>> {
    let Some(end) = src.iter().position(|&b| b == LINE_TERMINATOR) else {
        return Ok(None); // Need more data
    };

    let raw = src.split_to(end + 1);
    let line = std::str::from_utf8(&raw[..end])?;
    let frame = match line.split_once(FIELD_DELIMITER as char) {
        Some((title, message)) => Frame::new(title, message),
        None => Frame::new(FALLBACK_TITLE, line),
    };

    Ok(Some(frame))
}
