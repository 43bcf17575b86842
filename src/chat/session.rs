//! Core chat session management.
//!
//! This module provides the `ChatSession` struct which owns the conversation of one chat screen
//! and handles the streaming exchange with a [`ChatBackend`].

use std::time::{Duration, Instant};

use futures::StreamExt;
use tracing::{debug, info};

use crate::chat::render::Renderer;
use crate::client::ChatBackend;
use crate::conversation::Conversation;
use crate::error::Result;
use crate::observability::{STREAM_CHUNKS, STREAM_DURATION, STREAM_INTERRUPTS};
use crate::settings::Settings;
use crate::types::{ChatMessage, Role, StopReason, StreamEvent, Usage};

/// How often the interrupt flag is checked while waiting for the next chunk.
const INTERRUPT_POLL: Duration = Duration::from_millis(50);

/// Marker appended to a reply cut short with Ctrl+C.
pub const INTERRUPTED_MARKER: &str = "[interrupted]";

/// How a turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The stream ran to completion.
    Completed,
    /// The user interrupted the stream; the partial reply was kept.
    Interrupted,
}

/// The result of one successful exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnReport {
    pub outcome: TurnOutcome,
    /// The reply as stored in the conversation.
    pub reply: String,
    pub stop_reason: Option<StopReason>,
    pub usage: Option<Usage>,
}

/// A chat session that owns the conversation of one chat screen.
pub struct ChatSession {
    conversation: Conversation,
    usage_totals: Usage,
    last_turn_usage: Option<Usage>,
    request_count: u64,
    interrupted_turns: u64,
}

/// Aggregated stats for a chat session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStats {
    /// The conversation title.
    pub title: String,
    /// The model used for the next request.
    pub model: String,
    /// The number of messages in the conversation.
    pub message_count: usize,
    /// Total number of API requests made.
    pub total_requests: u64,
    /// Number of replies cut short by the user.
    pub interrupted_turns: u64,
    /// Total prompt tokens across all requests that reported usage.
    pub total_prompt_tokens: u64,
    /// Total generated tokens across all requests that reported usage.
    pub total_completion_tokens: u64,
    /// Usage of the last turn, if reported.
    pub last_turn_usage: Option<Usage>,
}

impl SessionStats {
    /// One `key: value` line per statistic.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!("title: {}", self.title),
            format!("model: {}", self.model),
            format!("messages: {}", self.message_count),
            format!("requests: {}", self.total_requests),
            format!("interrupted replies: {}", self.interrupted_turns),
            format!(
                "tokens: {} prompt, {} completion",
                self.total_prompt_tokens, self.total_completion_tokens
            ),
        ];
        if let Some(usage) = self.last_turn_usage {
            lines.push(format!(
                "last turn: {} prompt, {} completion",
                usage.prompt_tokens, usage.completion_tokens
            ));
        }
        lines
    }
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatSession {
    /// Creates a session around a fresh conversation.
    pub fn new() -> Self {
        Self::with_conversation(Conversation::new())
    }

    /// Creates a session around an existing conversation.
    pub fn with_conversation(conversation: Conversation) -> Self {
        Self {
            conversation,
            usage_totals: Usage::default(),
            last_turn_usage: None,
            request_count: 0,
            interrupted_turns: 0,
        }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Renames the conversation.
    pub fn set_title(&mut self, title: &str) -> Result<()> {
        self.conversation.set_title(title)
    }

    /// Returns the number of messages in the conversation.
    pub fn message_count(&self) -> usize {
        self.conversation.len()
    }

    /// Sends a user message and streams the response.
    ///
    /// This method:
    /// 1. Sends the whole history plus `user_input` to the backend
    /// 2. Renders response chunks as they arrive, under `assistant_label`
    /// 3. Appends the user message and the complete reply to the conversation
    ///
    /// An interrupt is honored both while the request is opening and between chunks.
    ///
    /// # Errors
    ///
    /// Returns an error if the request or the stream fails.  The conversation is left untouched
    /// in that case.
    pub async fn send_streaming(
        &mut self,
        backend: &dyn ChatBackend,
        settings: &Settings,
        user_input: &str,
        assistant_label: &str,
        renderer: &mut dyn Renderer,
    ) -> Result<TurnReport> {
        renderer.clear_interrupt();
        let mut messages = self.conversation.api_messages();
        messages.push(ChatMessage::user(user_input));

        let started = Instant::now();
        self.request_count = self.request_count.saturating_add(1);
        // The request itself may stall before any header arrives; Ctrl+C must still work.
        let mut request = backend.stream_chat(settings, messages);
        let opened = loop {
            if renderer.should_interrupt() {
                break None;
            }
            tokio::select! {
                result = &mut request => break Some(result),
                _ = tokio::time::sleep(INTERRUPT_POLL) => {}
            }
        };
        drop(request);
        let mut stream = match opened {
            Some(result) => Some(result?),
            None => None,
        };
        renderer.start_response(assistant_label);

        let mut reply = String::new();
        let mut usage = None;
        let mut stop_reason = None;
        let mut outcome = TurnOutcome::Completed;
        loop {
            let Some(stream) = stream.as_mut() else {
                outcome = TurnOutcome::Interrupted;
                break;
            };
            if renderer.should_interrupt() {
                outcome = TurnOutcome::Interrupted;
                break;
            }
            let event = tokio::select! {
                event = stream.next() => event,
                _ = tokio::time::sleep(INTERRUPT_POLL) => continue,
            };
            match event {
                Some(Ok(StreamEvent::Delta(text))) => {
                    STREAM_CHUNKS.click();
                    renderer.print_text(&text);
                    reply.push_str(&text);
                }
                Some(Ok(StreamEvent::Usage(reported))) => usage = Some(reported),
                Some(Ok(StreamEvent::Finished(reason))) => stop_reason = reason,
                Some(Ok(StreamEvent::Done)) | None => break,
                Some(Err(err)) => {
                    renderer.finish_response();
                    return Err(err);
                }
            }
        }
        STREAM_DURATION.add(started.elapsed().as_secs_f64());

        match outcome {
            TurnOutcome::Completed => renderer.finish_response(),
            TurnOutcome::Interrupted => {
                STREAM_INTERRUPTS.click();
                self.interrupted_turns = self.interrupted_turns.saturating_add(1);
                renderer.clear_interrupt();
                renderer.print_interrupted();
                reply = if reply.is_empty() {
                    INTERRUPTED_MARKER.to_string()
                } else {
                    format!("{reply}\n\n{INTERRUPTED_MARKER}")
                };
                info!("reply interrupted by user");
            }
        }

        self.conversation.add_message(Role::User, user_input);
        self.conversation.add_message(Role::Assistant, reply.clone());
        if let Some(usage) = usage {
            self.last_turn_usage = Some(usage);
            self.usage_totals = self.usage_totals + usage;
        }
        debug!(
            chars = reply.len(),
            ?stop_reason,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "turn finished"
        );
        Ok(TurnReport {
            outcome,
            reply,
            stop_reason,
            usage,
        })
    }

    /// Returns the current session statistics snapshot.
    pub fn stats(&self, settings: &Settings) -> SessionStats {
        SessionStats {
            title: self.conversation.title().to_string(),
            model: settings.model.clone(),
            message_count: self.message_count(),
            total_requests: self.request_count,
            interrupted_turns: self.interrupted_turns,
            total_prompt_tokens: self.usage_totals.prompt_tokens,
            total_completion_tokens: self.usage_totals.completion_tokens,
            last_turn_usage: self.last_turn_usage,
        }
    }

    /// Ends the session, yielding its conversation.
    pub fn into_conversation(self) -> Conversation {
        self.conversation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::client::EventStream;
    use crate::chat::render::Style;
    use futures::stream;
    use std::cell::Cell;
    use std::sync::Mutex;

    /// Replays canned events and records the history it was sent.
    struct ScriptedBackend {
        events: Mutex<Vec<Vec<Result<StreamEvent>>>>,
        requests: Mutex<Vec<Vec<ChatMessage>>>,
        hang: bool,
        stall: bool,
    }

    impl ScriptedBackend {
        fn new(turns: Vec<Vec<Result<StreamEvent>>>) -> Self {
            Self {
                events: Mutex::new(turns),
                requests: Mutex::new(Vec::new()),
                hang: false,
                stall: false,
            }
        }
    }

    #[async_trait::async_trait]
    impl ChatBackend for ScriptedBackend {
        async fn stream_chat(
            &self,
            _settings: &Settings,
            messages: Vec<ChatMessage>,
        ) -> Result<EventStream> {
            self.requests.lock().unwrap().push(messages);
            if self.stall {
                std::future::pending::<()>().await;
            }
            let mut turns = self.events.lock().unwrap();
            if turns.is_empty() {
                return Err(Error::connection("connection refused", None));
            }
            let events = turns.remove(0);
            if self.hang {
                Ok(Box::pin(stream::iter(events).chain(stream::pending())))
            } else {
                Ok(Box::pin(stream::iter(events)))
            }
        }
    }

    #[derive(Default)]
    struct Recorder {
        text: String,
        lines: Vec<String>,
        responses: usize,
        interrupt_after_text: bool,
        interrupt_after_polls: Option<usize>,
        polls: Cell<usize>,
        interrupted: bool,
    }

    impl Renderer for Recorder {
        fn print_line(&mut self, _style: Style, text: &str) {
            self.lines.push(text.to_string());
        }

        fn start_response(&mut self, _label: &str) {
            self.responses += 1;
        }

        fn print_text(&mut self, text: &str) {
            self.text.push_str(text);
        }

        fn finish_response(&mut self) {}

        fn should_interrupt(&self) -> bool {
            if self.interrupted {
                return false;
            }
            if let Some(limit) = self.interrupt_after_polls {
                self.polls.set(self.polls.get() + 1);
                return self.polls.get() > limit;
            }
            self.interrupt_after_text && !self.text.is_empty()
        }

        fn clear_interrupt(&mut self) {
            if self.should_interrupt() {
                self.interrupted = true;
            }
        }
    }

    fn delta(text: &str) -> Result<StreamEvent> {
        Ok(StreamEvent::Delta(text.to_string()))
    }

    #[tokio::test]
    async fn turn_appends_both_messages() {
        let backend = ScriptedBackend::new(vec![vec![
            delta("Hi"),
            delta(" there"),
            Ok(StreamEvent::Finished(Some(StopReason::Stop))),
            Ok(StreamEvent::Usage(Usage::new(5, 2))),
            Ok(StreamEvent::Done),
        ]]);
        let mut session = ChatSession::new();
        let mut renderer = Recorder::default();
        let report = session
            .send_streaming(&backend, &Settings::default(), "Hello", "AI", &mut renderer)
            .await
            .unwrap();
        assert_eq!(report.outcome, TurnOutcome::Completed);
        assert_eq!(report.reply, "Hi there");
        assert_eq!(report.stop_reason, Some(StopReason::Stop));
        assert_eq!(renderer.text, "Hi there");
        let messages = session.conversation().api_messages();
        assert_eq!(
            messages,
            vec![ChatMessage::user("Hello"), ChatMessage::assistant("Hi there")]
        );
        let stats = session.stats(&Settings::default());
        assert_eq!(stats.total_requests, 1);
        assert_eq!(stats.total_prompt_tokens, 5);
        assert_eq!(stats.total_completion_tokens, 2);
        assert_eq!(stats.message_count, 2);
    }

    #[tokio::test]
    async fn history_is_forwarded() {
        let backend = ScriptedBackend::new(vec![vec![delta("one")], vec![delta("two")]]);
        let mut session = ChatSession::new();
        let mut renderer = Recorder::default();
        let settings = Settings::default();
        session
            .send_streaming(&backend, &settings, "first", "AI", &mut renderer)
            .await
            .unwrap();
        session
            .send_streaming(&backend, &settings, "second", "AI", &mut renderer)
            .await
            .unwrap();
        let requests = backend.requests.lock().unwrap();
        assert_eq!(requests[0], vec![ChatMessage::user("first")]);
        assert_eq!(
            requests[1],
            vec![
                ChatMessage::user("first"),
                ChatMessage::assistant("one"),
                ChatMessage::user("second"),
            ]
        );
    }

    #[tokio::test]
    async fn failed_request_leaves_conversation_untouched() {
        let backend = ScriptedBackend::new(vec![]);
        let mut session = ChatSession::new();
        let mut renderer = Recorder::default();
        let err = session
            .send_streaming(&backend, &Settings::default(), "Hello", "AI", &mut renderer)
            .await
            .unwrap_err();
        assert!(err.is_connection());
        assert!(err.is_recoverable());
        assert_eq!(session.message_count(), 0);
        assert_eq!(renderer.responses, 0);
    }

    #[tokio::test]
    async fn stream_error_leaves_conversation_untouched() {
        let backend = ScriptedBackend::new(vec![vec![
            delta("partial"),
            Err(Error::streaming("connection reset", None)),
        ]]);
        let mut session = ChatSession::new();
        let mut renderer = Recorder::default();
        let result = session
            .send_streaming(&backend, &Settings::default(), "Hello", "AI", &mut renderer)
            .await;
        assert!(matches!(result, Err(Error::Streaming { .. })));
        assert_eq!(session.message_count(), 0);
        assert_eq!(renderer.text, "partial");
    }

    #[tokio::test]
    async fn interrupt_keeps_partial_reply() {
        let mut backend = ScriptedBackend::new(vec![vec![delta("partial")]]);
        backend.hang = true;
        let mut session = ChatSession::new();
        let mut renderer = Recorder {
            interrupt_after_text: true,
            ..Recorder::default()
        };
        let report = session
            .send_streaming(&backend, &Settings::default(), "Hello", "AI", &mut renderer)
            .await
            .unwrap();
        assert_eq!(report.outcome, TurnOutcome::Interrupted);
        assert_eq!(report.reply, "partial\n\n[interrupted]");
        assert_eq!(session.message_count(), 2);
        assert_eq!(session.stats(&Settings::default()).interrupted_turns, 1);
        assert!(renderer.lines.iter().any(|l| l == INTERRUPTED_MARKER));
    }

    #[tokio::test(start_paused = true)]
    async fn interrupt_while_waiting_for_the_response() {
        let mut backend = ScriptedBackend::new(vec![vec![delta("never")]]);
        backend.stall = true;
        let mut session = ChatSession::new();
        let mut renderer = Recorder {
            interrupt_after_polls: Some(3),
            ..Recorder::default()
        };
        let report = session
            .send_streaming(&backend, &Settings::default(), "Hello", "AI", &mut renderer)
            .await
            .unwrap();
        assert_eq!(report.outcome, TurnOutcome::Interrupted);
        assert_eq!(report.reply, INTERRUPTED_MARKER);
        assert_eq!(renderer.text, "");
        assert_eq!(session.message_count(), 2);
        assert_eq!(session.stats(&Settings::default()).interrupted_turns, 1);
        assert_eq!(backend.requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn set_title_and_stats_lines() {
        let mut session = ChatSession::new();
        session.set_title("Weekend plans").unwrap();
        let lines = session.stats(&Settings::default()).lines();
        assert_eq!(lines[0], "title: Weekend plans");
        assert!(lines[1].starts_with("model: "));
        assert_eq!(session.into_conversation().title(), "Weekend plans");
    }
}
