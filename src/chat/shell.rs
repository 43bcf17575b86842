//! The menu-driven shell.
//!
//! The shell is an explicit state machine over [`Screen`].  Every transition is driven by one
//! blocking line read; all state lives in an [`AppContext`] passed in by the caller.

use std::path::PathBuf;

use tracing::{debug, warn};

use crate::chat::commands::{ChatCommand, help_text, parse_command};
use crate::chat::config::ChatConfig;
use crate::chat::input::LineReader;
use crate::chat::render::{Renderer, Style};
use crate::chat::session::ChatSession;
use crate::client::ChatBackend;
use crate::conversation::Conversation;
use crate::history::list_transcripts;
use crate::i18n::{Locales, SUPPORTED_LANGUAGES, Translations};
use crate::settings::{
    API_KEY_ENV, BASE_URL_ENV, EnvOverrides, MODEL_ENV, Settings, SettingsStore,
};
use crate::transcript;
use crate::types::Role;
use crate::utils::time::display_timestamp;
use crate::{Error, Result};

const LANGUAGE_HEADER: &str = "Select Language / Sélectionner la langue / اختر اللغة:";
const LANGUAGE_PROMPT: &str = "Enter choice / Entrez votre choix / أدخل اختيارك (1-3): ";
const LANGUAGE_INVALID: &str = "Invalid choice / Choix invalide / اختيار غير صالح";
const DEFAULT_YES_NO: &str = "y/n";

/// The screens of the shell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Screen {
    Dashboard,
    NewChat,
    ViewHistory,
    Settings,
    ChangeLanguage,
    Exit,
}

/// Everything the shell reads and mutates.
#[derive(Clone, Debug)]
pub struct AppContext {
    pub store: SettingsStore,
    pub settings: Settings,
    pub locales: Locales,
    pub translations: Translations,
    pub history_dir: PathBuf,
}

impl AppContext {
    /// Load the settings and the matching translation table.
    pub fn load(config: &ChatConfig, overrides: &EnvOverrides) -> Result<Self> {
        let store = SettingsStore::new(&config.config_path);
        let settings = store.load(overrides)?;
        let locales = Locales::new(&config.locales_dir);
        let translations = locales.load(&settings.language);
        Ok(Self {
            store,
            settings,
            locales,
            translations,
            history_dir: config.history_dir.clone(),
        })
    }

    /// Reload the translation table for the current language.
    pub fn reload_translations(&mut self) {
        self.translations = self.locales.load(&self.settings.language);
    }

    /// Persist the current settings.
    pub fn save_settings(&self) -> Result<()> {
        self.store.save(&self.settings)
    }

    fn text(&self, key: &'static str) -> String {
        self.translations.text(key).to_string()
    }
}

/// Drives the screens over a line reader, a renderer and a chat backend.
pub struct Shell<'a> {
    context: AppContext,
    backend: &'a dyn ChatBackend,
    reader: &'a mut dyn LineReader,
    renderer: &'a mut dyn Renderer,
}

impl<'a> Shell<'a> {
    pub fn new(
        context: AppContext,
        backend: &'a dyn ChatBackend,
        reader: &'a mut dyn LineReader,
        renderer: &'a mut dyn Renderer,
    ) -> Self {
        Self {
            context,
            backend,
            reader,
            renderer,
        }
    }

    pub fn context(&self) -> &AppContext {
        &self.context
    }

    pub fn into_context(self) -> AppContext {
        self.context
    }

    /// Run until the user exits or input ends.
    ///
    /// # Errors
    ///
    /// Only fatal errors are returned: failures to read input, to write the settings file or to
    /// save a transcript.  Failed replies are reported on screen and the shell carries on.
    pub async fn run(&mut self) -> Result<()> {
        self.welcome();
        let mut screen = Screen::Dashboard;
        loop {
            debug!(?screen, "entering screen");
            screen = match screen {
                Screen::Dashboard => self.dashboard()?,
                Screen::NewChat => self.new_chat().await?,
                Screen::ViewHistory => self.view_history()?,
                Screen::Settings => self.settings_menu()?,
                Screen::ChangeLanguage => self.change_language()?,
                Screen::Exit => {
                    let goodbye = self.context.text("exit_message");
                    self.renderer.print_blank();
                    self.renderer.print_line(Style::Title, &goodbye);
                    self.renderer.print_blank();
                    return Ok(());
                }
            };
        }
    }

    fn read(&mut self, prompt: &str) -> Result<Option<String>> {
        self.reader.read_line(prompt)
    }

    fn welcome(&mut self) {
        let header = self.context.text("welcome.header");
        self.renderer.print_banner(&header);
        self.renderer
            .print_info(&self.context.text("welcome.description"));
        self.renderer
            .print_info(&self.context.text("welcome.history_info"));
        if !self.context.settings.has_api_key() {
            warn!("no API key configured");
            self.renderer.print_blank();
            self.renderer
                .print_error(&self.context.text("warnings.no_api_key"));
        }
        self.renderer.print_blank();
    }

    fn dashboard(&mut self) -> Result<Screen> {
        let title = self.context.text("dashboard.title");
        self.renderer.print_banner(&title);
        let options = [
            ("dashboard.options.new_chat", Style::User),
            ("dashboard.options.view_history", Style::Accent),
            ("dashboard.options.settings", Style::Info),
            ("dashboard.options.language", Style::Title),
            ("dashboard.options.exit", Style::Alert),
        ];
        for (index, (key, style)) in options.into_iter().enumerate() {
            let label = self.context.text(key);
            self.renderer.print_menu_item(index + 1, style, &label);
        }
        self.renderer.print_blank();

        let prompt = format!("{} ", self.context.text("dashboard.prompt"));
        let Some(choice) = self.read(&prompt)? else {
            return Ok(Screen::Exit);
        };
        Ok(match choice.trim() {
            "1" => Screen::NewChat,
            "2" => Screen::ViewHistory,
            "3" => Screen::Settings,
            "4" => Screen::ChangeLanguage,
            "5" => Screen::Exit,
            _ => {
                self.renderer
                    .print_error(&self.context.text("settings.invalid_choice"));
                Screen::Dashboard
            }
        })
    }

    async fn new_chat(&mut self) -> Result<Screen> {
        let mut session = ChatSession::new();
        self.renderer.print_blank();
        self.renderer
            .print_line(Style::Header, &self.context.text("chat.started"));
        self.renderer
            .print_info(&self.context.text("chat.instructions"));
        self.renderer.print_blank();

        loop {
            let prompt = format!("{}: ", self.context.text("chat.you"));
            let Some(line) = self.read(&prompt)? else {
                break;
            };
            if line.trim().is_empty() {
                continue;
            }
            self.reader.add_history(line.trim());

            match parse_command(&line) {
                Some(ChatCommand::Leave) => break,
                Some(ChatCommand::Title(title)) => match session.set_title(&title) {
                    Ok(()) => {
                        let message = format!(
                            "{} {}",
                            self.context.text("chat.title_set"),
                            session.conversation().title()
                        );
                        self.renderer.print_success(&message);
                    }
                    Err(err) => self.renderer.print_error(&err.to_string()),
                },
                Some(ChatCommand::Stats) => {
                    for stat in session.stats(&self.context.settings).lines() {
                        self.renderer.print_info(&format!("    {stat}"));
                    }
                }
                Some(ChatCommand::Help) => {
                    for help in help_text().lines() {
                        self.renderer.print_info(&format!("    {help}"));
                    }
                }
                Some(ChatCommand::Invalid(message)) => self.renderer.print_error(&message),
                None => {
                    let label = self.context.text("chat.ai");
                    let result = session
                        .send_streaming(
                            self.backend,
                            &self.context.settings,
                            &line,
                            &label,
                            &mut *self.renderer,
                        )
                        .await;
                    match result {
                        Ok(report) => {
                            if report.stop_reason.is_some_and(|r| r.is_truncated()) {
                                self.renderer
                                    .print_info(&self.context.text("chat.truncated"));
                            }
                        }
                        Err(err) if err.is_recoverable() => {
                            warn!(error = %err, "reply failed; returning to dashboard");
                            let message =
                                format!("{} {err}", self.context.text("chat.request_failed"));
                            self.renderer.print_error(&message);
                            break;
                        }
                        Err(err) => return Err(err),
                    }
                }
            }
        }

        self.finish_chat(session.into_conversation())?;
        Ok(Screen::Dashboard)
    }

    /// Save the conversation if history is enabled and anything was said.
    fn finish_chat(&mut self, conversation: Conversation) -> Result<()> {
        if !self.context.settings.save_history || conversation.is_empty() {
            return Ok(());
        }
        let path = transcript::save(&conversation, &self.context.history_dir)?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let message = format!("{} {name}", self.context.text("chat.saved"));
        self.renderer.print_blank();
        self.renderer.print_success(&message);
        Ok(())
    }

    fn view_history(&mut self) -> Result<Screen> {
        let entries = list_transcripts(&self.context.history_dir)?;
        if entries.is_empty() {
            self.renderer
                .print_info(&self.context.text("history.empty"));
            return Ok(Screen::Dashboard);
        }

        self.renderer.print_blank();
        self.renderer
            .print_line(Style::Header, &self.context.text("history.title"));
        self.renderer.print_blank();
        for (index, entry) in entries.iter().enumerate() {
            let line = format!("[{}] {}", entry.display_date(), entry.title);
            self.renderer.print_menu_item(index + 1, Style::Plain, &line);
        }

        let prompt = format!("\n{} ", self.context.text("history.view_prompt"));
        let Some(choice) = self.read(&prompt)? else {
            return Ok(Screen::Dashboard);
        };
        let choice = choice.trim();
        if choice.eq_ignore_ascii_case("b") {
            return Ok(Screen::Dashboard);
        }
        match choice.parse::<usize>() {
            Ok(index) if (1..=entries.len()).contains(&index) => {
                match transcript::load(&entries[index - 1].path) {
                    Ok(conversation) => self.show_conversation(&conversation),
                    Err(err) => self.renderer.print_error(&err.to_string()),
                }
            }
            Ok(_) => self
                .renderer
                .print_error(&self.context.text("history.invalid_selection")),
            Err(_) => self
                .renderer
                .print_error(&self.context.text("history.enter_valid")),
        }
        Ok(Screen::Dashboard)
    }

    fn show_conversation(&mut self, conversation: &Conversation) {
        let rule = "=".repeat(crate::chat::render::BANNER_WIDTH);
        let show_timestamps = self.context.settings.show_timestamps;
        self.renderer.print_blank();
        self.renderer.print_line(Style::Header, &rule);
        self.renderer.print_line(Style::Title, conversation.title());
        if show_timestamps {
            let created = format!(
                "{} {}",
                self.context.text("history.created"),
                display_timestamp(conversation.created_at())
            );
            self.renderer.print_info(&created);
        }
        for message in conversation.messages() {
            let (label, style) = match message.role {
                Role::User => (self.context.text("chat.you"), Style::User),
                Role::Assistant => (self.context.text("chat.ai"), Style::Assistant),
            };
            let heading = if show_timestamps {
                format!("{label} ({}):", display_timestamp(message.timestamp))
            } else {
                format!("{label}:")
            };
            self.renderer.print_blank();
            self.renderer.print_line(Style::Bold, &heading);
            for line in message.content.lines() {
                self.renderer.print_line(style, line);
            }
        }
        self.renderer.print_blank();
        self.renderer.print_line(Style::Header, &rule);
        self.renderer.print_blank();
    }

    fn settings_menu(&mut self) -> Result<Screen> {
        loop {
            self.print_settings();
            let prompt = format!("\n{} ", self.context.text("settings.select_prompt"));
            let Some(choice) = self.read(&prompt)? else {
                return Ok(Screen::Dashboard);
            };
            let keep_going = match choice.trim() {
                "1" => self.edit_api_key()?,
                "2" => self.edit_text_setting("settings.base_url", BASE_URL_ENV, |s, v| {
                    s.set_base_url(v)
                })?,
                "3" => {
                    self.edit_text_setting("settings.model", MODEL_ENV, |s, v| s.set_model(v))?
                }
                "4" => self.edit_number_setting("settings.temperature", " (0.0-1.0)", |s, v| {
                    s.set_temperature(v)
                })?,
                "5" => self.edit_number_setting("settings.max_tokens", "", |s, v| {
                    s.set_max_tokens(v)
                })?,
                "6" => {
                    let Some(answer) = self.ask_yes_no("settings.save_history")? else {
                        return Ok(Screen::Dashboard);
                    };
                    self.context.settings.save_history = answer;
                    true
                }
                "7" => {
                    let Some(answer) = self.ask_yes_no("settings.show_timestamps")? else {
                        return Ok(Screen::Dashboard);
                    };
                    self.context.settings.show_timestamps = answer;
                    true
                }
                "8" => self.edit_language()?,
                "9" => {
                    self.context.save_settings()?;
                    self.renderer
                        .print_success(&self.context.text("settings.saved"));
                    self.context.reload_translations();
                    return Ok(Screen::Dashboard);
                }
                _ => {
                    self.renderer
                        .print_error(&self.context.text("settings.invalid_choice"));
                    true
                }
            };
            if !keep_going {
                return Ok(Screen::Dashboard);
            }
        }
    }

    fn print_settings(&mut self) {
        let settings = &self.context.settings;
        let t = &self.context.translations;
        let rows = [
            (t.text("settings.api_key"), settings.masked_api_key()),
            (t.text("settings.base_url"), settings.base_url.clone()),
            (t.text("settings.model"), settings.model.clone()),
            (t.text("settings.temperature"), settings.temperature.to_string()),
            (t.text("settings.max_tokens"), settings.max_tokens.to_string()),
            (t.text("settings.save_history"), settings.save_history.to_string()),
            (
                t.text("settings.show_timestamps"),
                settings.show_timestamps.to_string(),
            ),
            (
                t.text("settings.language"),
                t.language_name(&settings.language).to_string(),
            ),
        ];
        self.renderer.print_blank();
        self.renderer
            .print_line(Style::Header, t.text("settings.title"));
        self.renderer.print_blank();
        for (index, (label, value)) in rows.iter().enumerate() {
            self.renderer
                .print_menu_item(index + 1, Style::Plain, &format!("{label}: {value}"));
        }
        self.renderer
            .print_menu_item(rows.len() + 1, Style::Plain, t.text("settings.save_return"));
    }

    /// Prompt `<enter_new> <label><suffix>: ` and return the answer, `None` at end of input.
    fn ask_new_value(&mut self, label_key: &'static str, suffix: &str) -> Result<Option<String>> {
        let prompt = format!(
            "{} {}{suffix}: ",
            self.context.text("settings.enter_new"),
            self.context.text(label_key)
        );
        self.read(&prompt)
    }

    fn note_env_persist(&mut self, variable: &str) {
        let note = format!("{} {variable}.", self.context.text("settings.note_env_persist"));
        self.renderer.print_info(&note);
    }

    fn warn_invalid(&mut self, err: &Error) {
        debug!(error = %err, "rejected settings value");
        self.renderer
            .print_error(&self.context.text("warnings.invalid_value"));
    }

    fn edit_api_key(&mut self) -> Result<bool> {
        let Some(value) = self.ask_new_value("settings.api_key", "")? else {
            return Ok(false);
        };
        self.context.settings.set_api_key(&value);
        self.renderer
            .print_info(&self.context.text("settings.note_config_only"));
        self.note_env_persist(API_KEY_ENV);
        Ok(true)
    }

    fn edit_text_setting(
        &mut self,
        label_key: &'static str,
        variable: &str,
        apply: impl FnOnce(&mut Settings, &str) -> Result<()>,
    ) -> Result<bool> {
        let Some(value) = self.ask_new_value(label_key, "")? else {
            return Ok(false);
        };
        match apply(&mut self.context.settings, &value) {
            Ok(()) => self.note_env_persist(variable),
            Err(err) => self.warn_invalid(&err),
        }
        Ok(true)
    }

    fn edit_number_setting(
        &mut self,
        label_key: &'static str,
        suffix: &str,
        apply: impl FnOnce(&mut Settings, &str) -> Result<()>,
    ) -> Result<bool> {
        let Some(value) = self.ask_new_value(label_key, suffix)? else {
            return Ok(false);
        };
        if let Err(err) = apply(&mut self.context.settings, &value) {
            self.warn_invalid(&err);
        }
        Ok(true)
    }

    /// Ask a yes/no question; an answer is "yes" when it starts with the first letter of the
    /// localized `yes_no` string.
    fn ask_yes_no(&mut self, label_key: &'static str) -> Result<Option<bool>> {
        let yes_no = self
            .context
            .translations
            .get("settings.yes_no")
            .unwrap_or(DEFAULT_YES_NO)
            .to_string();
        let prompt = format!("{} ({yes_no}): ", self.context.text(label_key));
        let Some(answer) = self.read(&prompt)? else {
            return Ok(None);
        };
        Ok(Some(is_yes(&answer, &yes_no)))
    }

    fn edit_language(&mut self) -> Result<bool> {
        self.renderer.print_blank();
        self.renderer.print_rule();
        self.print_language_list();
        self.renderer.print_rule();
        let Some(choice) = self.ask_new_value("settings.language", "")? else {
            return Ok(false);
        };
        match language_choice(&choice) {
            Some(code) => {
                self.context.settings.set_language(code);
                self.context.save_settings()?;
                self.context.reload_translations();
                let message = format!(
                    "{} {}",
                    self.context.translations.language_name(code),
                    self.context.text("settings.saved")
                );
                self.renderer.print_success(&message);
            }
            None => self
                .renderer
                .print_error(&self.context.text("settings.invalid_choice")),
        }
        Ok(true)
    }

    fn print_language_list(&mut self) {
        for (index, code) in SUPPORTED_LANGUAGES.iter().enumerate() {
            let name = self.context.translations.language_name(code);
            self.renderer.print_menu_item(index + 1, Style::Plain, name);
        }
    }

    fn change_language(&mut self) -> Result<Screen> {
        self.renderer.print_blank();
        self.renderer.print_rule();
        self.renderer.print_line(Style::Header, LANGUAGE_HEADER);
        self.renderer.print_rule();
        self.print_language_list();
        self.renderer.print_rule();
        let Some(choice) = self.read(LANGUAGE_PROMPT)? else {
            return Ok(Screen::Dashboard);
        };
        match language_choice(&choice) {
            Some(code) => {
                self.context.settings.set_language(code);
                self.context.save_settings()?;
                self.context.reload_translations();
                let message = format!("✓ {}", self.context.text("settings.saved"));
                self.renderer.print_success(&message);
            }
            None => self.renderer.print_error(LANGUAGE_INVALID),
        }
        Ok(Screen::Dashboard)
    }
}

/// Map a 1-based menu answer to a supported language code.
fn language_choice(answer: &str) -> Option<&'static str> {
    let index = answer.trim().parse::<usize>().ok()?;
    SUPPORTED_LANGUAGES.get(index.checked_sub(1)?).copied()
}

fn is_yes(answer: &str, yes_no: &str) -> bool {
    let Some(yes) = yes_no.chars().next() else {
        return false;
    };
    let answer = answer.trim().to_lowercase();
    yes.to_lowercase()
        .next()
        .is_some_and(|yes| answer.starts_with(yes))
}
