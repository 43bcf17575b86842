// Public modules
pub mod chat_chunk;
pub mod chat_message;
pub mod chat_request;
pub mod role;
pub mod stop_reason;
pub mod stream_event;
pub mod usage;

// Re-exports
pub use chat_chunk::{ChatCompletionChunk, ChunkChoice, ChunkDelta};
pub use chat_message::ChatMessage;
pub use chat_request::{ChatRequest, DEFAULT_PENALTY, DEFAULT_TOP_P, StreamOptions};
pub use role::Role;
pub use stop_reason::{StopReason, StopReasonParseError};
pub use stream_event::StreamEvent;
pub use usage::Usage;
