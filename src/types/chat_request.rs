use serde::{Deserialize, Serialize};

use crate::types::ChatMessage;

/// Nucleus sampling is pinned; only temperature is user-tunable.
pub const DEFAULT_TOP_P: f32 = 1.0;

/// Presence and frequency penalties are pinned to neutral.
pub const DEFAULT_PENALTY: f32 = 0.0;

/// Options controlling what a streaming response reports.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct StreamOptions {
    /// Ask the endpoint to append a usage chunk to the stream.
    pub include_usage: bool,
}

/// Body of a `POST /chat/completions` request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatRequest {
    /// Model identifier.
    pub model: String,

    /// The whole conversation so far, oldest first.
    pub messages: Vec<ChatMessage>,

    /// Sampling temperature.
    pub temperature: f32,

    /// Upper bound on generated tokens.
    pub max_tokens: u32,

    /// Nucleus sampling value.
    pub top_p: f32,

    /// Presence penalty.
    pub presence_penalty: f32,

    /// Frequency penalty.
    pub frequency_penalty: f32,

    /// Whether the response is streamed as server-sent events.
    pub stream: bool,

    /// Streaming options; only sent when streaming.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_options: Option<StreamOptions>,
}

impl ChatRequest {
    /// Create a streaming request with the pinned sampling values.
    pub fn streaming(
        model: impl Into<String>,
        messages: Vec<ChatMessage>,
        temperature: f32,
        max_tokens: u32,
    ) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature,
            max_tokens,
            top_p: DEFAULT_TOP_P,
            presence_penalty: DEFAULT_PENALTY,
            frequency_penalty: DEFAULT_PENALTY,
            stream: true,
            stream_options: Some(StreamOptions {
                include_usage: true,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, to_value};

    #[test]
    fn streaming_request_shape() {
        let request = ChatRequest::streaming(
            "some-model",
            vec![ChatMessage::user("Hello")],
            0.5,
            1000,
        );
        assert_eq!(
            to_value(&request).unwrap(),
            json!({
                "model": "some-model",
                "messages": [{"role": "user", "content": "Hello"}],
                "temperature": 0.5,
                "max_tokens": 1000,
                "top_p": 1.0,
                "presence_penalty": 0.0,
                "frequency_penalty": 0.0,
                "stream": true,
                "stream_options": {"include_usage": true}
            })
        );
    }
}
