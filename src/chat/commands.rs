//! Command parsing for the chat screen.
//!
//! Two kinds of input control the chat without being sent to the model: the bare exit keywords
//! (`exit`, `quit`, `bye`, `dashboard`) and slash commands such as `/title`.

/// Bare words that end the chat and return to the dashboard.
pub const EXIT_KEYWORDS: &[&str] = &["exit", "quit", "bye", "dashboard"];

/// A parsed chat command.
///
/// These commands control the chat session and are not sent to the API.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatCommand {
    /// Save the conversation (if enabled) and return to the dashboard.
    Leave,

    /// Rename the conversation before it is saved.
    Title(String),

    /// Display session statistics.
    Stats,

    /// Display help information.
    Help,

    /// Report a parsing error back to the caller.
    Invalid(String),
}

/// Parses user input for chat commands.
///
/// Returns `Some(ChatCommand)` if the input is a command, or `None` if it should be sent to the
/// model.
///
/// # Examples
///
/// ```
/// # use mdchat::chat::{parse_command, ChatCommand};
/// assert_eq!(parse_command("bye"), Some(ChatCommand::Leave));
/// assert!(parse_command("/title Rust questions").is_some());
/// assert!(parse_command("Hello there!").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();

    if is_exit_keyword(input) {
        return Some(ChatCommand::Leave);
    }
    let rest = input.strip_prefix('/')?;

    let mut parts = rest.splitn(2, ' ');
    let command = parts.next()?.to_lowercase();
    let argument = parts.next().map(|s| s.trim()).filter(|s| !s.is_empty());

    let result = match command.as_str() {
        "title" => match argument {
            Some(title) => ChatCommand::Title(title.to_string()),
            None => ChatCommand::Invalid("/title requires a title".to_string()),
        },
        "stats" | "status" => ChatCommand::Stats,
        "help" | "?" => ChatCommand::Help,
        word if is_exit_keyword(word) => ChatCommand::Leave,
        _ => ChatCommand::Invalid(format!("Unknown command: /{}", command)),
    };

    Some(result)
}

fn is_exit_keyword(word: &str) -> bool {
    EXIT_KEYWORDS
        .iter()
        .any(|keyword| keyword.eq_ignore_ascii_case(word))
}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    r#"Available commands:
  /title <text>          Rename the conversation before it is saved
  /stats                 Show session statistics
  /help                  Show this help message
  exit, quit, bye        Save the conversation and return to the dashboard
  dashboard              Same as exit"#
}
