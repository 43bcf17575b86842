// Public modules
pub mod chat;
pub mod client;
pub mod conversation;
pub mod error;
pub mod history;
pub mod i18n;
pub mod observability;
pub mod settings;
pub mod sse;
pub mod transcript;
pub mod types;
pub mod utils;

// Re-exports
pub use client::{ChatBackend, CompletionClient, EventStream};
pub use conversation::{Conversation, Message};
pub use error::{Error, Result};
pub use history::{TranscriptEntry, list_transcripts};
pub use i18n::{Locales, Translations};
pub use settings::{EnvOverrides, Settings, SettingsStore};
pub use types::*;
