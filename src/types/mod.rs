// Public modules
pub mod chat_request;
pub mod content_chunk;
pub mod delta;
pub mod frame;
pub mod message;

// Re-exports
pub use chat_request::ChatRequest;
pub use content_chunk::ContentChunk;
pub use delta::Delta;
pub use frame::{DATA_PREFIX, DONE_SENTINEL, Frame, FrameKind};
pub use message::{Message, Role};
