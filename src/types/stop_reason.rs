use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Reasons why the model stopped generating a response.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The model reached the end of a generated turn.
    Stop,

    /// The response reached the `max_tokens` limit.
    Length,

    /// The endpoint withheld content.
    ContentFilter,

    /// The model asked for a tool; mdchat never offers tools, so this is unexpected.
    ToolCalls,
}

impl StopReason {
    /// Returns true when the reply was cut short rather than finished.
    pub fn is_truncated(&self) -> bool {
        matches!(self, StopReason::Length | StopReason::ContentFilter)
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Stop => write!(f, "stop"),
            StopReason::Length => write!(f, "length"),
            StopReason::ContentFilter => write!(f, "content_filter"),
            StopReason::ToolCalls => write!(f, "tool_calls"),
        }
    }
}

/// Error returned when parsing an invalid stop reason string.
#[derive(Debug)]
pub struct StopReasonParseError {
    /// The invalid string value that could not be parsed.
    pub invalid_value: String,
}

impl fmt::Display for StopReasonParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown stop reason: {}", self.invalid_value)
    }
}

impl std::error::Error for StopReasonParseError {}

impl FromStr for StopReason {
    type Err = StopReasonParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stop" => Ok(StopReason::Stop),
            "length" => Ok(StopReason::Length),
            "content_filter" => Ok(StopReason::ContentFilter),
            "tool_calls" | "function_call" => Ok(StopReason::ToolCalls),
            _ => Err(StopReasonParseError {
                invalid_value: s.to_string(),
            }),
        }
    }
}
