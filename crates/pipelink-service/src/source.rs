use pipelink_frame::Frame;

/// Produces the outbound frame stream for a service's send task.
///
/// Implementations must keep the codec's field constraints: no line
/// terminator in either field, no delimiter in the title.
pub trait FrameSource: Send + Sync {
    /// The next frame to write.
    fn next_frame(&mut self) -> Frame;
}

/// Emits the same frame every tick.
pub struct StaticSource {
    title: String,
    message: String,
}

impl StaticSource {
    /// Create a source with a fixed title and message.
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
        }
    }
}

impl FrameSource for StaticSource {
    fn next_frame(&mut self) -> Frame {
        Frame::new(self.title.clone(), self.message.clone())
    }
}

/// Emits a fixed title with an auto-incrementing counter message.
pub struct SequenceSource {
    title: String,
    counter: u64,
}

impl SequenceSource {
    /// Create a source starting its counter at zero.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            counter: 0,
        }
    }
}

impl FrameSource for SequenceSource {
    fn next_frame(&mut self) -> Frame {
        let frame = Frame::new(self.title.clone(), format!("Message > {}", self.counter));
        self.counter += 1;
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_source_repeats() {
        let mut source = StaticSource::new("Title2", "Message2");
        assert_eq!(source.next_frame(), Frame::new("Title2", "Message2"));
        assert_eq!(source.next_frame(), Frame::new("Title2", "Message2"));
    }

    #[test]
    fn sequence_source_increments() {
        let mut source = SequenceSource::new("Title1");
        assert_eq!(source.next_frame(), Frame::new("Title1", "Message > 0"));
        assert_eq!(source.next_frame(), Frame::new("Title1", "Message > 1"));
        assert_eq!(source.next_frame(), Frame::new("Title1", "Message > 2"));
    }
}
