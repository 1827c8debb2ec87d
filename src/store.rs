//! The ordered list of user and assistant messages.
//!
//! The store is owned by the chat session.  Renderers observe it through a
//! [`tokio::sync::watch`] channel that carries an immutable view after every
//! change.

use std::sync::Arc;

use tokio::sync::watch;

use crate::{Message, Role};

/// An immutable view of the conversation.
pub type ConversationView = Arc<Vec<Message>>;

/// Holds the conversation and publishes every change.
pub struct ConversationStore {
    messages: ConversationView,
    tx: watch::Sender<ConversationView>,
}

impl ConversationStore {
    /// Creates an empty conversation.
    pub fn new() -> Self {
        let messages: ConversationView = Arc::new(Vec::new());
        let (tx, _) = watch::channel(Arc::clone(&messages));
        Self { messages, tx }
    }

    /// Appends a user message.
    ///
    /// Must be called before the reply's session opens.
    pub fn append_user(&mut self, text: impl Into<String>) {
        self.mutate(|messages| messages.push(Message::user(text)));
    }

    /// Applies a reply snapshot.
    ///
    /// If the last message is an assistant message its content is replaced;
    /// otherwise a new assistant message is appended.  This rule is what keeps
    /// a reply to a single entry no matter how many snapshots arrive.
    pub fn apply_snapshot(&mut self, text: impl Into<String>) {
        let text = text.into();
        self.mutate(|messages| match messages.last_mut() {
            Some(last) if last.role == Role::Assistant => last.content = text,
            _ => messages.push(Message::assistant(text)),
        });
    }

    /// Appends an assistant message unconditionally.
    pub fn append_assistant(&mut self, text: impl Into<String>) {
        self.mutate(|messages| messages.push(Message::assistant(text)));
    }

    /// Removes every message.
    pub fn reset(&mut self) {
        self.mutate(Vec::clear);
    }

    /// Returns the messages in order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Returns the current view without copying the messages.
    pub fn view(&self) -> ConversationView {
        Arc::clone(&self.messages)
    }

    /// Returns the last message, if any.
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Returns the number of messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns true if the conversation has no messages.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Subscribes to conversation changes.
    ///
    /// The receiver starts out holding the current view.
    pub fn subscribe(&self) -> watch::Receiver<ConversationView> {
        if self.tx.receiver_count() == 0 {
            // Changes made while nobody listened were not published.
            self.tx.send_replace(Arc::clone(&self.messages));
        }
        self.tx.subscribe()
    }

    fn mutate(&mut self, f: impl FnOnce(&mut Vec<Message>)) {
        // While a view is published the channel shares the Arc, so each
        // change copies the history once.  Unobserved changes stay in place.
        f(Arc::make_mut(&mut self.messages));
        if self.tx.receiver_count() > 0 {
            self.tx.send_replace(Arc::clone(&self.messages));
        }
    }
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConversationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationStore")
            .field("messages", &self.messages)
            .finish()
    }
}
