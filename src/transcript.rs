//! Markdown transcripts.
//!
//! A transcript is the only persisted form of a conversation:
//!
//! ```text
//! # <title>
//!
//! **Created:** <timestamp>
//! **Last Updated:** <timestamp>
//! **Conversation ID:** <id>
//!
//! ---
//!
//! ### You (<timestamp>)
//!
//! <content>
//!
//! ---
//!
//! ```
//!
//! Parsing is a tolerant line scan, not a grammar: it never fails on malformed input.  A message
//! whose content contains a line equal to `---` or a line starting with `### ` cannot be read
//! back intact; the scanner takes those lines for structure.  Line endings are not preserved
//! either: content written with `\r\n` reads back with bare `\n`.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use time::OffsetDateTime;
use tracing::{debug, info};

use crate::conversation::{Conversation, Message};
use crate::observability::{TRANSCRIPTS_LOADED, TRANSCRIPTS_SAVED};
use crate::types::Role;
use crate::utils::time::{file_stamp, format_timestamp, now, parse_timestamp};
use crate::{Error, Result};

/// File extension of transcripts.
pub const EXTENSION: &str = "md";

const SEPARATOR: &str = "---";
const MESSAGE_PREFIX: &str = "### ";
const CREATED_PREFIX: &str = "**Created:**";
const UPDATED_PREFIX: &str = "**Last Updated:**";
const ID_PREFIX: &str = "**Conversation ID:**";
const USER_LABEL: &str = "You";
const ASSISTANT_LABEL: &str = "Assistant";

/// Render a conversation as a transcript.
pub fn render(conversation: &Conversation) -> String {
    let mut out = String::new();
    out.push_str(&format!("# {}\n\n", conversation.title()));
    out.push_str(&format!(
        "{CREATED_PREFIX} {}\n",
        format_timestamp(conversation.created_at())
    ));
    out.push_str(&format!(
        "{UPDATED_PREFIX} {}\n",
        format_timestamp(conversation.last_updated())
    ));
    out.push_str(&format!("{ID_PREFIX} {}\n\n", conversation.id()));
    out.push_str(&format!("{SEPARATOR}\n\n"));
    for message in conversation.messages() {
        let label = match message.role {
            Role::User => USER_LABEL,
            Role::Assistant => ASSISTANT_LABEL,
        };
        out.push_str(&format!(
            "{MESSAGE_PREFIX}{label} ({})\n\n",
            format_timestamp(message.timestamp)
        ));
        out.push_str(&message.content);
        out.push_str(&format!("\n\n{SEPARATOR}\n\n"));
    }
    out
}

/// Parse a transcript.  Never fails; see the module documentation for what is lost.
pub fn parse(text: &str) -> Conversation {
    let fresh = Conversation::new();
    let mut lines = text.lines();

    let title = lines
        .next()
        .map(|line| line.trim().trim_start_matches('#').trim())
        .filter(|title| !title.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| fresh.title().to_string());

    let mut id = None;
    let mut created_at = None;
    let mut last_updated = None;
    let mut messages = Vec::new();
    let mut current: Option<PendingMessage> = None;

    for line in lines {
        if let Some(header) = line.strip_prefix(MESSAGE_PREFIX) {
            if let Some(pending) = current.take() {
                messages.push(pending.finish());
            }
            current = Some(PendingMessage::from_header(header));
            continue;
        }
        if line.trim() == SEPARATOR {
            if let Some(pending) = current.take() {
                messages.push(pending.finish());
            }
            continue;
        }
        match current.as_mut() {
            Some(pending) => pending.lines.push(line),
            None if messages.is_empty() => {
                if let Some(value) = line.strip_prefix(CREATED_PREFIX) {
                    created_at = parse_timestamp(value);
                } else if let Some(value) = line.strip_prefix(UPDATED_PREFIX) {
                    last_updated = parse_timestamp(value);
                } else if let Some(value) = line.strip_prefix(ID_PREFIX) {
                    id = Some(value.trim().to_string()).filter(|id| !id.is_empty());
                }
            }
            None => {}
        }
    }
    if let Some(pending) = current.take() {
        messages.push(pending.finish());
    }

    let created_at = created_at.unwrap_or_else(|| fresh.created_at());
    let last_updated = last_updated
        .or_else(|| messages.last().map(|m: &Message| m.timestamp))
        .unwrap_or(created_at);
    Conversation::from_parts(
        id.unwrap_or_else(|| fresh.id().to_string()),
        title,
        created_at,
        last_updated,
        messages,
    )
}

/// A message header seen by the scanner, with the content lines gathered so far.
struct PendingMessage<'a> {
    role: Role,
    timestamp: OffsetDateTime,
    lines: Vec<&'a str>,
}

impl<'a> PendingMessage<'a> {
    fn from_header(header: &str) -> Self {
        let (label, stamp) = match header.split_once('(') {
            Some((label, rest)) => (label, rest.split(')').next()),
            None => (header, None),
        };
        let role = if label.contains(USER_LABEL) {
            Role::User
        } else {
            Role::Assistant
        };
        let timestamp = match stamp.and_then(parse_timestamp) {
            Some(timestamp) => timestamp,
            None => {
                debug!(header, "message header without a usable timestamp; using now");
                now()
            }
        };
        Self {
            role,
            timestamp,
            lines: Vec::new(),
        }
    }

    /// Drop the blank line after the header and the blank line before the separator.
    fn finish(self) -> Message {
        let mut lines = self.lines.as_slice();
        if lines.first().is_some_and(|line| line.trim().is_empty()) {
            lines = &lines[1..];
        }
        if lines.last().is_some_and(|line| line.trim().is_empty()) {
            lines = &lines[..lines.len() - 1];
        }
        Message::new(self.role, lines.join("\n"), self.timestamp)
    }
}

/// Write `conversation` to a new file in `dir` and return its path.
///
/// The file name is `<YYYYmmdd_HHMMSS>_<title>.md`; characters that are not allowed in file names
/// are replaced with `_`.  An existing file is never overwritten: a `-2`, `-3`, ... suffix is
/// added instead.
pub fn save(conversation: &Conversation, dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .map_err(|e| Error::io(format!("Failed to create {}", dir.display()), e))?;
    let stem = format!(
        "{}_{}",
        file_stamp(now()),
        sanitize_file_name(conversation.title())
    );
    let text = render(conversation);
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        let name = if attempt == 1 {
            format!("{stem}.{EXTENSION}")
        } else {
            format!("{stem}-{attempt}.{EXTENSION}")
        };
        let path = dir.join(name);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => {
                return Err(Error::io(
                    format!("Failed to create transcript {}", path.display()),
                    e,
                ));
            }
        };
        file.write_all(text.as_bytes())
            .and_then(|()| file.flush())
            .map_err(|e| Error::io(format!("Failed to write transcript {}", path.display()), e))?;
        TRANSCRIPTS_SAVED.click();
        info!(path = %path.display(), messages = conversation.len(), "transcript saved");
        return Ok(path);
    }
}

/// Read and parse the transcript at `path`.
pub fn load(path: &Path) -> Result<Conversation> {
    let text = fs::read_to_string(path)
        .map_err(|e| Error::io(format!("Failed to read transcript {}", path.display()), e))?;
    TRANSCRIPTS_LOADED.click();
    Ok(parse(&text))
}

/// Replace characters that are not allowed in file names.
pub fn sanitize_file_name(title: &str) -> String {
    let cleaned: String = title
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "untitled".to_string()
    } else {
        cleaned.to_string()
    }
}
