//! Server-Sent Events (SSE) processing for streaming completions.
//!
//! This module turns the raw byte stream of a `chat/completions` response into
//! [`StreamEvent`]s.  Events are separated by a blank line; every `data:` line of an event
//! contributes to its payload.  Bytes are buffered until a whole event is available, so UTF-8
//! sequences split across network chunks decode correctly.

use std::collections::VecDeque;

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;

use crate::observability::{STREAM_BYTES, STREAM_ERRORS};
use crate::types::{ChatCompletionChunk, StopReason, StreamEvent};
use crate::{Error, Result};

/// Payload that terminates an OpenAI-style stream.
const DONE_SENTINEL: &str = "[DONE]";

/// Process a stream of bytes into a stream of completion events.
///
/// The returned stream ends after the `[DONE]` sentinel or when the body ends, whichever comes
/// first.  Transport errors and malformed payloads are yielded as `Err` items.  One chunk may
/// carry text, a finish reason and usage at once; they are yielded in that order.
pub fn process_sse<S, E>(byte_stream: S) -> impl Stream<Item = Result<StreamEvent>> + Send
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send + Unpin + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    // Convert transport errors to our error type
    let stream = byte_stream.map(|result| {
        result.map_err(|e| {
            Error::streaming(format!("Error in HTTP stream: {e}"), Some(Box::new(e)))
        })
    });

    // (stream, buffered bytes, decoded events not yet yielded, finished)
    stream::unfold(
        (stream, Vec::<u8>::new(), VecDeque::new(), false),
        move |(mut stream, mut buffer, mut pending, mut finished)| async move {
            loop {
                if let Some(event) = pending.pop_front() {
                    match &event {
                        Ok(StreamEvent::Done) => {
                            pending.clear();
                            finished = true;
                        }
                        Err(_) => STREAM_ERRORS.click(),
                        Ok(_) => {}
                    }
                    return Some((event, (stream, buffer, pending, finished)));
                }
                if finished {
                    return None;
                }

                // First check if we have a complete event in the buffer
                if let Some(raw) = take_event(&mut buffer) {
                    pending.extend(decode_event(&raw));
                    continue;
                }

                // Read more data
                match stream.next().await {
                    Some(Ok(bytes)) => {
                        STREAM_BYTES.count(bytes.len() as u64);
                        buffer.extend_from_slice(&bytes);
                    }
                    Some(Err(e)) => {
                        STREAM_ERRORS.click();
                        return Some((Err(e), (stream, buffer, pending, true)));
                    }
                    None => {
                        // End of stream; a final event may lack its trailing blank line.
                        let raw = std::mem::take(&mut buffer);
                        pending.extend(decode_event(&raw));
                        finished = true;
                    }
                }
            }
        },
    )
}

/// Remove the first complete event (terminated by a blank line) from `buffer`.
fn take_event(buffer: &mut Vec<u8>) -> Option<Vec<u8>> {
    let (end, separator_len) = find_event_boundary(buffer)?;
    let mut event: Vec<u8> = buffer.drain(..end + separator_len).collect();
    event.truncate(end);
    Some(event)
}

/// Locate the blank line ending the first event, tolerating CRLF line endings.
fn find_event_boundary(buffer: &[u8]) -> Option<(usize, usize)> {
    let lf = buffer.windows(2).position(|w| w == b"\n\n").map(|pos| (pos, 2));
    let crlf = buffer
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|pos| (pos, 4));
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

/// Decode one raw event.  Comments, keep-alives and chunks without text decode to nothing.
fn decode_event(raw: &[u8]) -> Vec<Result<StreamEvent>> {
    let text = match std::str::from_utf8(raw) {
        Ok(text) => text,
        Err(e) => {
            return vec![Err(Error::streaming(
                format!("Invalid UTF-8 in stream: {e}"),
                Some(Box::new(e)),
            ))];
        }
    };

    let mut data: Option<String> = None;
    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        if line.starts_with(':') {
            continue;
        }
        if let Some(value) = line.strip_prefix("data:") {
            let value = value.strip_prefix(' ').unwrap_or(value);
            match data.as_mut() {
                Some(existing) => {
                    existing.push('\n');
                    existing.push_str(value);
                }
                None => data = Some(value.to_string()),
            }
        }
    }

    let Some(data) = data else {
        return Vec::new();
    };
    let data = data.trim();
    if data.is_empty() {
        return Vec::new();
    }
    if data == DONE_SENTINEL {
        return vec![Ok(StreamEvent::Done)];
    }
    parse_payload(data)
}

/// Parse the JSON payload of a `data:` field.
fn parse_payload(data: &str) -> Vec<Result<StreamEvent>> {
    #[derive(Deserialize)]
    struct InBandError {
        error: InBandErrorDetail,
    }

    #[derive(Deserialize)]
    struct InBandErrorDetail {
        #[serde(rename = "type")]
        error_type: Option<String>,
        message: Option<String>,
        code: Option<serde_json::Value>,
    }

    if let Ok(InBandError { error }) = serde_json::from_str::<InBandError>(data) {
        let status_code = error
            .code
            .as_ref()
            .and_then(serde_json::Value::as_u64)
            .and_then(|code| u16::try_from(code).ok())
            .unwrap_or(500);
        let message = error.message.unwrap_or_else(|| data.to_string());
        return vec![Err(Error::api(status_code, error.error_type, message))];
    }

    let chunk = match serde_json::from_str::<ChatCompletionChunk>(data) {
        Ok(chunk) => chunk,
        Err(e) => {
            return vec![Err(Error::streaming(
                format!("Failed to parse event JSON: {e}"),
                Some(Box::new(e)),
            ))];
        }
    };

    let mut events = Vec::new();
    if let Some(text) = chunk.text().filter(|text| !text.is_empty()) {
        events.push(Ok(StreamEvent::Delta(text.to_string())));
    }
    if let Some(reason) = chunk.finish_reason() {
        events.push(Ok(StreamEvent::Finished(reason.parse::<StopReason>().ok())));
    }
    if let Some(usage) = chunk.usage {
        events.push(Ok(StreamEvent::Usage(usage)));
    }
    events
}
