/// Prefix that marks an interesting record on the wire.
pub const DATA_PREFIX: &str = "data: ";

/// Payload that marks the end of a reply.
pub const DONE_SENTINEL: &str = "[DONE]";

/// The kind of a decoded wire frame.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FrameKind {
    /// A `data: ` record carrying a payload.
    Data,

    /// The `data: [DONE]` record.
    Terminator,

    /// Anything else (comments, `event:` lines, blank records).
    Ignorable,
}

/// A single decoded unit from the wire stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// What kind of record this is.
    pub kind: FrameKind,

    /// The trimmed payload for data frames, the raw segment for ignorable
    /// frames, and empty for terminators.
    pub payload: String,
}

impl Frame {
    /// Create a data frame with the given payload.
    pub fn data(payload: impl Into<String>) -> Self {
        Self {
            kind: FrameKind::Data,
            payload: payload.into(),
        }
    }

    /// Create a terminator frame.
    pub fn terminator() -> Self {
        Self {
            kind: FrameKind::Terminator,
            payload: String::new(),
        }
    }

    /// Create an ignorable frame that remembers the raw segment.
    pub fn ignorable(segment: impl Into<String>) -> Self {
        Self {
            kind: FrameKind::Ignorable,
            payload: segment.into(),
        }
    }

    /// Classify one complete segment taken from between frame delimiters.
    ///
    /// Leading carriage returns and newlines are skipped so that runs of more
    /// than two newlines do not hide the `data: ` prefix.
    pub fn classify(segment: &str) -> Self {
        let Some(rest) = segment
            .trim_start_matches(['\r', '\n'])
            .strip_prefix(DATA_PREFIX)
        else {
            return Self::ignorable(segment);
        };
        let payload = rest.trim();
        if payload == DONE_SENTINEL {
            Self::terminator()
        } else {
            Self::data(payload)
        }
    }

    /// Returns true if this frame ends the reply.
    pub fn is_terminator(&self) -> bool {
        self.kind == FrameKind::Terminator
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_data() {
        let frame = Frame::classify("data: {\"content\":\"Hi\"}  ");
        assert_eq!(frame, Frame::data("{\"content\":\"Hi\"}"));
    }

    #[test]
    fn classify_terminator() {
        let frame = Frame::classify("data: [DONE]\r");
        assert!(frame.is_terminator());
        assert!(frame.payload.is_empty());
    }

    #[test]
    fn classify_requires_space_after_colon() {
        assert_eq!(Frame::classify("data:[DONE]").kind, FrameKind::Ignorable);
    }

    #[test]
    fn classify_other_records() {
        assert_eq!(Frame::classify("event: ping").kind, FrameKind::Ignorable);
        assert_eq!(Frame::classify(": keep-alive").kind, FrameKind::Ignorable);
        assert_eq!(Frame::classify("").kind, FrameKind::Ignorable);
    }

    #[test]
    fn classify_skips_leading_newlines() {
        let frame = Frame::classify("\ndata: {}");
        assert_eq!(frame, Frame::data("{}"));
    }
}
