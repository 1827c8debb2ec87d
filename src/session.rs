//! Core chat session management.
//!
//! `ChatSession` runs one submission at a time: it appends the user message,
//! opens the reply stream, and drives frames through the parser and the
//! accumulator into the conversation store.  `send` takes `&mut self`, so a
//! second submission cannot start while a reply is still streaming.

use std::time::Instant;

use futures::StreamExt;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::accumulator::{Snapshot, StreamSession};
use crate::client::{ByteStream, ChatClient, Transport};
use crate::config::ChatConfig;
use crate::error::{Error, Result};
use crate::event::parse_frame;
use crate::observability::{STREAM_DURATION, STREAM_TTFB, TURNS, TURNS_INTERRUPTED};
use crate::sse::decode_frames;
use crate::store::{ConversationStore, ConversationView};
use crate::types::{FrameKind, Message};

/// Shown in place of a reply when the request could not be made.
pub const APOLOGY_MESSAGE: &str =
    "Sorry, there was an error processing your request. Please try again.";

/// How a submission ended.
///
/// Every variant leaves the conversation in its final state for the turn.
#[derive(Debug, Clone)]
pub enum TurnOutcome {
    /// The reply ended with the terminator or a clean end of input.
    Completed,

    /// Input ended in the middle of a record, which was dropped.
    Truncated,

    /// No reply body was received; the apology message was appended.
    TransportFailed(Error),

    /// Reading the body failed; text received so far was kept.
    StreamFailed(Error),

    /// The caller cancelled; text received so far was kept.
    Interrupted,
}

impl TurnOutcome {
    /// Returns true if the reply arrived in full.
    pub fn is_completed(&self) -> bool {
        matches!(self, TurnOutcome::Completed)
    }

    /// Returns the error that ended the turn, if any.
    pub fn error(&self) -> Option<&Error> {
        match self {
            TurnOutcome::TransportFailed(err) | TurnOutcome::StreamFailed(err) => Some(err),
            _ => None,
        }
    }
}

/// Aggregated stats for a chat session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Number of messages in the conversation.
    pub message_count: usize,
    /// Submissions made.
    pub turns: u64,
    /// Turns whose reply arrived in full.
    pub completed: u64,
    /// Turns whose input ended inside a record.
    pub truncated: u64,
    /// Turns that ended with the apology message.
    pub transport_failures: u64,
    /// Turns cut short by a read error.
    pub stream_failures: u64,
    /// Turns cancelled by the caller.
    pub interrupted: u64,
    /// Frames decoded across all turns.
    pub frames: u64,
    /// Data frames skipped because their payload was malformed.
    pub payload_anomalies: u64,
}

/// A chat session that owns the conversation and the transport.
pub struct ChatSession<T: Transport = ChatClient> {
    transport: T,
    store: ConversationStore,
    stats: SessionStats,
}

impl ChatSession<ChatClient> {
    /// Creates a session talking HTTP to the configured service.
    pub fn from_config(config: &ChatConfig) -> Result<Self> {
        Ok(Self::new(ChatClient::new(config)?))
    }
}

impl<T: Transport> ChatSession<T> {
    /// Creates a new chat session over the given transport.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            store: ConversationStore::new(),
            stats: SessionStats::default(),
        }
    }

    /// Sends a user message and streams the reply into the conversation.
    ///
    /// The user message is appended before the request is made.  Failures
    /// of the request or the stream are reported through the returned
    /// [`TurnOutcome`]; `Err` is only returned for input that cannot be
    /// sent.
    ///
    /// Cancelling `cancel` stops reading at once.  No final snapshot is
    /// published and the text received so far stays in place.
    pub async fn send(&mut self, text: &str, cancel: &CancellationToken) -> Result<TurnOutcome> {
        if text.trim().is_empty() {
            return Err(Error::validation(
                "message is empty",
                Some("text".to_string()),
            ));
        }
        TURNS.click();
        self.stats.turns += 1;
        self.store.append_user(text);

        let start = Instant::now();
        let submitted = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = self.transport.submit(text) => Some(result),
        };
        let outcome = match submitted {
            None => TurnOutcome::Interrupted,
            Some(Ok(body)) => self.read_reply(body, start, cancel).await,
            Some(Err(err)) => {
                error!("chat request failed: {err}");
                self.store.append_assistant(APOLOGY_MESSAGE);
                TurnOutcome::TransportFailed(err)
            }
        };
        self.record(&outcome);
        Ok(outcome)
    }

    async fn read_reply(
        &mut self,
        body: ByteStream,
        start: Instant,
        cancel: &CancellationToken,
    ) -> TurnOutcome {
        let mut frames = decode_frames(body);
        let mut session = StreamSession::new();
        let mut first_frame = true;

        let outcome = loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                next = frames.next() => Some(next),
            };
            let Some(next) = next else {
                session.abort();
                break TurnOutcome::Interrupted;
            };
            match next {
                Some(Ok(frame)) => {
                    if first_frame {
                        STREAM_TTFB.add(start.elapsed().as_secs_f64());
                        first_frame = false;
                    }
                    self.stats.frames += 1;
                    let Some(delta) = parse_frame(&frame) else {
                        if frame.kind == FrameKind::Data {
                            self.stats.payload_anomalies += 1;
                        }
                        continue;
                    };
                    if let Some(snapshot) = session.apply(delta) {
                        self.publish(&mut session, snapshot);
                    }
                    if !session.is_open() {
                        break TurnOutcome::Completed;
                    }
                }
                Some(Err(err)) => {
                    warn!(
                        received = session.text().len(),
                        "reply stream failed: {err}"
                    );
                    session.abort();
                    break TurnOutcome::StreamFailed(err);
                }
                None => {
                    if let Some(snapshot) = session.finish() {
                        self.publish(&mut session, snapshot);
                    }
                    break match frames.truncated() {
                        Some(_) => TurnOutcome::Truncated,
                        None => TurnOutcome::Completed,
                    };
                }
            }
        };
        STREAM_DURATION.add(start.elapsed().as_secs_f64());
        debug!(
            fragments = session.fragments(),
            bytes = session.text().len(),
            dropped_bytes = frames.dropped_bytes(),
            "reply closed"
        );
        outcome
    }

    fn publish(&mut self, session: &mut StreamSession, snapshot: Snapshot) {
        self.store.apply_snapshot(snapshot.text);
        session.mark_published();
    }

    fn record(&mut self, outcome: &TurnOutcome) {
        match outcome {
            TurnOutcome::Completed => self.stats.completed += 1,
            TurnOutcome::Truncated => self.stats.truncated += 1,
            TurnOutcome::TransportFailed(_) => self.stats.transport_failures += 1,
            TurnOutcome::StreamFailed(_) => self.stats.stream_failures += 1,
            TurnOutcome::Interrupted => {
                TURNS_INTERRUPTED.click();
                self.stats.interrupted += 1;
            }
        }
    }

    /// Clears the conversation history.
    pub fn clear(&mut self) {
        self.store.reset();
    }

    /// Returns the conversation so far.
    pub fn messages(&self) -> &[Message] {
        self.store.messages()
    }

    /// Returns the number of messages in the conversation.
    pub fn message_count(&self) -> usize {
        self.store.len()
    }

    /// Returns the conversation store.
    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    /// Subscribes to conversation changes.
    pub fn subscribe(&self) -> watch::Receiver<ConversationView> {
        self.store.subscribe()
    }

    /// Returns the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Returns the current session statistics snapshot.
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            message_count: self.store.len(),
            ..self.stats.clone()
        }
    }
}
