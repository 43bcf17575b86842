//! Line input for the shell.

use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use crate::{Error, Result};

/// A source of user input lines.
pub trait LineReader {
    /// Show `prompt` and read one line.
    ///
    /// Returns `Ok(None)` at end of input.  A line cancelled with Ctrl+C reads as an empty
    /// line.
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>>;

    /// Remember a line for history recall.  Optional.
    fn add_history(&mut self, _line: &str) {}
}

/// Terminal input with line editing and history.
pub struct RustylineReader {
    editor: DefaultEditor,
}

impl RustylineReader {
    pub fn new() -> Result<Self> {
        let editor = DefaultEditor::new().map_err(|e| {
            Error::io(
                "Failed to initialize line editor",
                std::io::Error::other(e.to_string()),
            )
        })?;
        Ok(Self { editor })
    }
}

impl LineReader for RustylineReader {
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        match self.editor.readline(prompt) {
            Ok(line) => Ok(Some(line)),
            Err(ReadlineError::Interrupted) => Ok(Some(String::new())),
            Err(ReadlineError::Eof) => Ok(None),
            Err(ReadlineError::Io(e)) => Err(Error::io("Failed to read input", e)),
            Err(e) => Err(Error::io(
                "Failed to read input",
                std::io::Error::other(e.to_string()),
            )),
        }
    }

    fn add_history(&mut self, line: &str) {
        let _ = self.editor.add_history_entry(line);
    }
}

/// Replays a fixed list of lines; end of input once they run out.
#[derive(Debug, Default, Clone)]
pub struct ScriptedReader {
    lines: std::collections::VecDeque<String>,
    prompts: Vec<String>,
}

impl ScriptedReader {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
            prompts: Vec::new(),
        }
    }

    /// Every prompt shown so far.
    pub fn prompts(&self) -> &[String] {
        &self.prompts
    }

    /// Lines not consumed yet.
    pub fn remaining(&self) -> usize {
        self.lines.len()
    }
}

impl LineReader for ScriptedReader {
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        self.prompts.push(prompt.to_string());
        Ok(self.lines.pop_front())
    }
}
