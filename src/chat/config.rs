//! Configuration types for the chat application.
//!
//! This module provides CLI argument parsing via `arrrg` and the resolved paths and display
//! options the shell runs with.  Model and sampling parameters live in the settings file instead;
//! see [`crate::settings`].

use std::path::PathBuf;

use arrrg_derive::CommandLine;

/// Default settings file.
pub const DEFAULT_CONFIG_FILE: &str = "config.json";
/// Default directory for saved transcripts.
pub const DEFAULT_HISTORY_DIR: &str = "chat_history";
/// Default directory for translation tables.
pub const DEFAULT_LOCALES_DIR: &str = "locales";

/// Command-line arguments for the mdchat tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Settings file.
    #[arrrg(optional, "Settings file (default: config.json)", "PATH")]
    pub config: Option<String>,

    /// Directory of saved transcripts.
    #[arrrg(optional, "Transcript directory (default: chat_history)", "DIR")]
    pub history_dir: Option<String>,

    /// Directory of translation tables.
    #[arrrg(optional, "Translation directory (default: locales)", "DIR")]
    pub locales_dir: Option<String>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

/// Configuration for the shell.
///
/// This struct holds the resolved configuration values after processing
/// command-line arguments with appropriate defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    /// Path of the settings file.
    pub config_path: PathBuf,

    /// Directory transcripts are saved to and listed from.
    pub history_dir: PathBuf,

    /// Directory holding `<code>.json` translation tables.
    pub locales_dir: PathBuf,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    ///
    /// Defaults:
    /// - Settings: `config.json`
    /// - History: `chat_history/`
    /// - Locales: `locales/`
    /// - Color: enabled
    pub fn new() -> Self {
        Self {
            config_path: PathBuf::from(DEFAULT_CONFIG_FILE),
            history_dir: PathBuf::from(DEFAULT_HISTORY_DIR),
            locales_dir: PathBuf::from(DEFAULT_LOCALES_DIR),
            use_color: true,
        }
    }

    /// Sets the settings file.
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = path.into();
        self
    }

    /// Sets the transcript directory.
    pub fn with_history_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.history_dir = dir.into();
        self
    }

    /// Sets the translation directory.
    pub fn with_locales_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.locales_dir = dir.into();
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl From<ChatArgs> for ChatConfig {
    fn from(args: ChatArgs) -> Self {
        let defaults = ChatConfig::new();
        ChatConfig {
            config_path: args
                .config
                .map(PathBuf::from)
                .unwrap_or(defaults.config_path),
            history_dir: args
                .history_dir
                .map(PathBuf::from)
                .unwrap_or(defaults.history_dir),
            locales_dir: args
                .locales_dir
                .map(PathBuf::from)
                .unwrap_or(defaults.locales_dir),
            use_color: !args.no_color,
        }
    }
}
