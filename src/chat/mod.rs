//! The interactive side of mdchat.
//!
//! This module provides the menu-driven shell on top of the client library:
//!
//! - Streaming replies with real-time token display and Ctrl+C interruption
//! - Commands for leaving a chat, renaming it and inspecting the session
//! - Transcript browsing, settings editing and language selection
//!
//! # Architecture
//!
//! - [`config`]: CLI argument parsing and resolved paths
//! - [`input`]: line input, from the terminal or from a script
//! - [`render`]: styled terminal output and the interrupt flag
//! - [`session`]: one chat screen's conversation and streaming turns
//! - [`commands`]: chat command parsing
//! - [`shell`]: the screen state machine

pub mod commands;
pub mod config;
pub mod input;
pub mod render;
pub mod session;
pub mod shell;

pub use render::{PlainTextRenderer, Renderer, Style};
pub use commands::{ChatCommand, EXIT_KEYWORDS, help_text, parse_command};
pub use config::{ChatArgs, ChatConfig};
pub use input::{LineReader, RustylineReader, ScriptedReader};
pub use session::{ChatSession, SessionStats, TurnOutcome, TurnReport};
pub use shell::{AppContext, Screen, Shell};
