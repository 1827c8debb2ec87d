// Public modules
pub mod accumulator;
pub mod client;
pub mod commands;
pub mod config;
pub mod error;
pub mod event;
pub mod observability;
pub mod render;
pub mod session;
pub mod sse;
pub mod store;
pub mod types;

// Re-exports
pub use accumulator::{Slot, Snapshot, StreamSession};
pub use client::{ByteStream, ChatClient, HealthReport, Transport};
pub use commands::{ChatCommand, help_text, parse_command};
pub use config::{ChatArgs, ChatConfig};
pub use error::{Error, Result};
pub use event::{parse_frame, parse_payload};
pub use observability::register_biometrics;
pub use render::{ConversationRenderer, PlainTextRenderer};
pub use session::{APOLOGY_MESSAGE, ChatSession, SessionStats, TurnOutcome};
pub use sse::{FrameDecoder, decode_frames};
pub use store::{ConversationStore, ConversationView};
pub use types::*;
