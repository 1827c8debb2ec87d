//! Folds content deltas into one growing assistant message.
//!
//! Every accepted delta yields a [`Snapshot`] holding the full text so far,
//! not a diff, so the conversation store can replace the in-progress message
//! wholesale however many snapshots arrive.

use crate::Delta;
use crate::observability::SNAPSHOTS;

/// Where the session's reply lives in the conversation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Slot {
    /// Nothing has been published yet.
    #[default]
    Unassigned,

    /// The reply is the last message in the conversation.
    Last,
}

/// A display-ready reconstruction of the reply so far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// All text accumulated so far.
    pub text: String,

    /// True for the snapshot that closed the session.
    pub is_final: bool,
}

/// Transient state for one submission.
///
/// A session accepts deltas until it is closed, which happens exactly once:
/// on [`Delta::EndOfReply`], on [`finish`](Self::finish), or on
/// [`abort`](Self::abort).
#[derive(Debug)]
pub struct StreamSession {
    text: String,
    open: bool,
    slot: Slot,
    fragments: usize,
}

impl StreamSession {
    /// Opens a new session with no text.
    pub fn new() -> Self {
        Self {
            text: String::new(),
            open: true,
            slot: Slot::Unassigned,
            fragments: 0,
        }
    }

    /// Applies a delta and returns the snapshot to publish, if any.
    ///
    /// Fragments are appended strictly in arrival order.  Once the session is
    /// closed every call returns `None`.
    pub fn apply(&mut self, delta: Delta) -> Option<Snapshot> {
        if !self.open {
            return None;
        }
        match delta {
            Delta::TextFragment(fragment) => {
                self.text.push_str(&fragment);
                self.fragments += 1;
                Some(self.snapshot(false))
            }
            Delta::EndOfReply => self.finish(),
        }
    }

    /// Closes the session at end of input and returns the final snapshot.
    pub fn finish(&mut self) -> Option<Snapshot> {
        if !self.open {
            return None;
        }
        self.open = false;
        Some(self.snapshot(true))
    }

    /// Closes the session without a final snapshot.
    ///
    /// Text already published stays where it is.
    pub fn abort(&mut self) {
        self.open = false;
    }

    /// Records that a snapshot from this session reached the conversation.
    pub fn mark_published(&mut self) {
        self.slot = Slot::Last;
    }

    /// Returns true while deltas are still accepted.
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Returns where the reply lives in the conversation.
    pub fn slot(&self) -> Slot {
        self.slot
    }

    /// Returns the text accumulated so far.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Returns the number of text fragments applied.
    pub fn fragments(&self) -> usize {
        self.fragments
    }

    fn snapshot(&self, is_final: bool) -> Snapshot {
        SNAPSHOTS.click();
        Snapshot {
            text: self.text.clone(),
            is_final,
        }
    }
}

impl Default for StreamSession {
    fn default() -> Self {
        Self::new()
    }
}
