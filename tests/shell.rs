//! End-to-end tests for the menu shell.
//!
//! The shell runs against a scripted line reader, a recording renderer and a canned backend, with
//! settings and transcripts in a temporary directory.  Nothing touches the network.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use futures::stream;
use tempfile::TempDir;

use mdchat::chat::{AppContext, ChatConfig, Renderer, ScriptedReader, Shell, Style};
use mdchat::client::EventStream;
use mdchat::{
    ChatBackend, ChatMessage, Conversation, EnvOverrides, Error, Result, Role, Settings,
    SettingsStore, StopReason, StreamEvent, Usage, transcript,
};

/// Replays one canned reply per request and records what was sent.
#[derive(Default)]
struct CannedBackend {
    replies: Mutex<Vec<Result<Vec<StreamEvent>>>>,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl CannedBackend {
    fn replying(replies: Vec<Result<Vec<StreamEvent>>>) -> Self {
        Self {
            replies: Mutex::new(replies),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ChatBackend for CannedBackend {
    async fn stream_chat(
        &self,
        _settings: &Settings,
        messages: Vec<ChatMessage>,
    ) -> Result<EventStream> {
        self.requests.lock().unwrap().push(messages);
        let mut replies = self.replies.lock().unwrap();
        if replies.is_empty() {
            return Err(Error::connection("connection refused", None));
        }
        let events = replies.remove(0)?;
        Ok(Box::pin(stream::iter(events.into_iter().map(Ok))))
    }
}

/// Keeps every line and every streamed fragment.
#[derive(Default)]
struct Recorder {
    lines: Vec<(Style, String)>,
    streamed: String,
}

impl Recorder {
    fn has_line(&self, needle: &str) -> bool {
        self.lines.iter().any(|(_, line)| line.contains(needle))
    }

    fn errors(&self) -> Vec<&str> {
        self.lines
            .iter()
            .filter(|(style, _)| *style == Style::Error)
            .map(|(_, line)| line.as_str())
            .collect()
    }
}

impl Renderer for Recorder {
    fn print_line(&mut self, style: Style, text: &str) {
        self.lines.push((style, text.to_string()));
    }

    fn start_response(&mut self, label: &str) {
        self.lines.push((Style::Assistant, format!("{label}:")));
    }

    fn print_text(&mut self, text: &str) {
        self.streamed.push_str(text);
    }

    fn finish_response(&mut self) {}
}

struct Fixture {
    dir: TempDir,
    config: ChatConfig,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let config = ChatConfig::new()
            .with_config_path(dir.path().join("config.json"))
            .with_history_dir(dir.path().join("chat_history"))
            .with_locales_dir(Path::new(env!("CARGO_MANIFEST_DIR")).join("locales"))
            .without_color();
        Self { dir, config }
    }

    fn context(&self) -> AppContext {
        let overrides = EnvOverrides::default().with_api_key("sk-test-0123456789");
        AppContext::load(&self.config, &overrides).unwrap()
    }

    fn transcripts(&self) -> Vec<PathBuf> {
        match fs::read_dir(&self.config.history_dir) {
            Ok(entries) => entries.map(|entry| entry.unwrap().path()).collect(),
            Err(_) => Vec::new(),
        }
    }

    fn stored_settings(&self) -> Settings {
        SettingsStore::new(&self.config.config_path)
            .load(&EnvOverrides::default())
            .unwrap()
    }

    async fn run(
        &self,
        backend: &CannedBackend,
        script: &[&str],
    ) -> (Result<()>, AppContext, Recorder, ScriptedReader) {
        let mut reader = ScriptedReader::new(script.iter().copied());
        let mut renderer = Recorder::default();
        let mut shell = Shell::new(self.context(), backend, &mut reader, &mut renderer);
        let result = shell.run().await;
        let context = shell.into_context();
        (result, context, renderer, reader)
    }
}

fn reply(text: &str) -> Result<Vec<StreamEvent>> {
    Ok(vec![
        StreamEvent::Delta(text.to_string()),
        StreamEvent::Finished(Some(StopReason::Stop)),
        StreamEvent::Usage(Usage::new(4, 2)),
        StreamEvent::Done,
    ])
}

#[tokio::test]
async fn new_chat_is_saved_on_exit() {
    let fixture = Fixture::new();
    let backend = CannedBackend::replying(vec![reply("Hi there"), reply("Sure")]);
    let (result, _, renderer, reader) = fixture
        .run(&backend, &["1", "Hello", "", "Help me", "bye", "5"])
        .await;
    result.unwrap();
    assert_eq!(reader.remaining(), 0);
    assert_eq!(renderer.streamed, "Hi thereSure");

    let requests = backend.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].len(), 3);
    assert_eq!(requests[1][0].content, "Hello");
    assert_eq!(requests[1][1].content, "Hi there");

    let saved = fixture.transcripts();
    assert_eq!(saved.len(), 1);
    let conversation = transcript::load(&saved[0]).unwrap();
    let contents: Vec<&str> = conversation
        .messages()
        .iter()
        .map(|m| m.content.as_str())
        .collect();
    assert_eq!(contents, ["Hello", "Hi there", "Help me", "Sure"]);
    assert!(renderer.has_line("Conversation saved to"));
    assert!(renderer.has_line("Goodbye!"));
}

#[tokio::test]
async fn title_command_names_the_saved_file() {
    let fixture = Fixture::new();
    let backend = CannedBackend::replying(vec![reply("Pack light")]);
    let (result, _, renderer, _) = fixture
        .run(&backend, &["1", "/title Weekend trip", "What to bring?", "/quit", "5"])
        .await;
    result.unwrap();
    assert!(renderer.has_line("Conversation renamed to Weekend trip"));
    let saved = fixture.transcripts();
    assert_eq!(saved.len(), 1);
    let name = saved[0].file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.ends_with("_Weekend trip.md"), "{name}");
}

#[tokio::test]
async fn stream_failure_returns_to_dashboard_without_saving() {
    let fixture = Fixture::new();
    let backend = CannedBackend::replying(vec![Err(Error::streaming("connection reset", None))]);
    let (result, _, renderer, reader) = fixture.run(&backend, &["1", "Hello", "5"]).await;
    result.unwrap();
    assert_eq!(reader.remaining(), 0);
    assert!(
        renderer
            .errors()
            .iter()
            .any(|line| line.starts_with("Request failed:") && line.contains("connection reset"))
    );
    assert!(fixture.transcripts().is_empty());
}

#[tokio::test]
async fn empty_chat_is_not_saved() {
    let fixture = Fixture::new();
    let backend = CannedBackend::default();
    let (result, _, _, _) = fixture.run(&backend, &["1", "exit", "5"]).await;
    result.unwrap();
    assert!(backend.requests().is_empty());
    assert!(fixture.transcripts().is_empty());
}

#[tokio::test]
async fn chat_is_not_saved_when_history_is_off() {
    let fixture = Fixture::new();
    let backend = CannedBackend::replying(vec![reply("Hi")]);
    let (result, context, _, _) = fixture
        .run(&backend, &["3", "6", "n", "9", "1", "Hello", "exit", "5"])
        .await;
    result.unwrap();
    assert!(!context.settings.save_history);
    assert!(!fixture.stored_settings().save_history);
    assert!(fixture.transcripts().is_empty());
}

#[tokio::test]
async fn settings_validate_and_persist() {
    let fixture = Fixture::new();
    let backend = CannedBackend::default();
    let script = ["3", "4", "0.3", "4", "1.5", "5", "abc", "5", "2048", "42", "9", "5"];
    let (result, _, renderer, _) = fixture.run(&backend, &script).await;
    result.unwrap();

    let invalid = renderer
        .errors()
        .iter()
        .filter(|line| line.starts_with("Invalid value"))
        .count();
    assert_eq!(invalid, 2);
    assert!(renderer.has_line("Invalid choice."));
    assert!(renderer.has_line("Settings saved."));

    let stored = fixture.stored_settings();
    assert!((stored.temperature - 0.3).abs() < 1e-6);
    assert_eq!(stored.max_tokens, 2048);
}

#[tokio::test]
async fn language_change_reloads_translations() {
    let fixture = Fixture::new();
    let backend = CannedBackend::default();
    let (result, context, renderer, _) = fixture.run(&backend, &["4", "2", "5"]).await;
    result.unwrap();
    assert_eq!(context.translations.language(), "fr");
    assert_eq!(fixture.stored_settings().language, "fr");
    assert!(renderer.has_line("✓ Paramètres enregistrés."));
    assert!(renderer.has_line("Au revoir !"));
}

#[tokio::test]
async fn invalid_language_choice_changes_nothing() {
    let fixture = Fixture::new();
    let backend = CannedBackend::default();
    let (result, context, renderer, _) = fixture.run(&backend, &["4", "7", "5"]).await;
    result.unwrap();
    assert_eq!(context.settings.language, "en");
    assert!(renderer.has_line("Invalid choice / Choix invalide"));
}

#[tokio::test]
async fn history_lists_and_displays_transcripts() {
    let fixture = Fixture::new();
    let mut conversation = Conversation::new();
    conversation.set_title("Rust questions").unwrap();
    conversation.add_message(Role::User, "What is a lifetime?");
    conversation.add_message(Role::Assistant, "A region of code.\nIt bounds borrows.");
    transcript::save(&conversation, &fixture.config.history_dir).unwrap();

    let backend = CannedBackend::default();
    let (result, _, renderer, _) = fixture
        .run(&backend, &["2", "x", "2", "9", "2", "b", "2", "1", "5"])
        .await;
    result.unwrap();

    assert!(renderer.has_line("] Rust questions"));
    assert!(renderer.has_line("Please enter a valid number."));
    assert!(renderer.has_line("Invalid selection."));
    assert!(renderer.has_line("What is a lifetime?"));
    assert!(renderer.has_line("It bounds borrows."));
    assert!(renderer.has_line("Created:"));
}

#[tokio::test]
async fn empty_history_returns_to_dashboard() {
    let fixture = Fixture::new();
    let backend = CannedBackend::default();
    let (result, _, renderer, reader) = fixture.run(&backend, &["2", "5"]).await;
    result.unwrap();
    assert_eq!(reader.remaining(), 0);
    assert!(renderer.has_line("No saved conversations yet."));
}

#[tokio::test]
async fn dashboard_rejects_unknown_choices_and_exits_at_end_of_input() {
    let fixture = Fixture::new();
    let backend = CannedBackend::default();
    let (result, _, renderer, reader) = fixture.run(&backend, &["7", "menu"]).await;
    result.unwrap();
    assert_eq!(reader.remaining(), 0);
    assert_eq!(renderer.errors(), ["Invalid choice.", "Invalid choice."]);
    let exit_items = renderer
        .lines
        .iter()
        .filter(|(style, line)| *style == Style::Alert && line == "5. Exit")
        .count();
    assert_eq!(exit_items, 3);
    assert!(renderer.has_line("Goodbye!"));
}

#[tokio::test]
async fn missing_api_key_warns_at_startup() {
    let fixture = Fixture::new();
    let context = AppContext::load(&fixture.config, &EnvOverrides::default()).unwrap();
    let backend = CannedBackend::default();
    let mut reader = ScriptedReader::new(["5"]);
    let mut renderer = Recorder::default();
    Shell::new(context, &backend, &mut reader, &mut renderer)
        .run()
        .await
        .unwrap();
    assert!(renderer.has_line("no API key is set"));
}
