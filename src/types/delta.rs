/// A content change extracted from a single frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delta {
    /// A piece of reply text to append.
    TextFragment(String),

    /// The server signalled that the reply is complete.
    EndOfReply,
}

impl Delta {
    /// Create a text fragment delta.
    pub fn text(text: impl Into<String>) -> Self {
        Delta::TextFragment(text.into())
    }
}
