//! Persisted settings with environment overrides.
//!
//! The settings file is the source of truth for behavioral preferences (sampling parameters,
//! history and timestamp toggles, language).  The environment is the source of truth for the
//! connection parameters: when `MDCHAT_API_KEY`, `MDCHAT_BASE_URL` or `MDCHAT_MODEL` hold a
//! non-empty value, that value replaces the persisted one on every load.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::i18n;
use crate::observability::SETTINGS_SAVED;
use crate::{Error, Result};

/// Default endpoint for the completion API.
pub const DEFAULT_BASE_URL: &str = "https://inference.baseten.co/v1";
/// Default model identifier.
pub const DEFAULT_MODEL: &str = "deepseek-ai/DeepSeek-R1-0528";
/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
/// Default cap on generated tokens.
pub const DEFAULT_MAX_TOKENS: u32 = 1000;

/// Environment variable overriding the API key.
pub const API_KEY_ENV: &str = "MDCHAT_API_KEY";
/// Environment variable overriding the endpoint base URL.
pub const BASE_URL_ENV: &str = "MDCHAT_BASE_URL";
/// Environment variable overriding the model identifier.
pub const MODEL_ENV: &str = "MDCHAT_MODEL";

const NOT_SET: &str = "[Not Set]";

/////////////////////////////////////////////// Settings //////////////////////////////////////////////

/// User settings as stored on disk.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub save_history: bool,
    pub show_timestamps: bool,
    pub language: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            save_history: true,
            show_timestamps: true,
            language: i18n::DEFAULT_LANGUAGE.to_string(),
        }
    }
}

impl Settings {
    /// Returns true if an API key is configured.
    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    /// The API key as shown in the settings menu: `first5...last5`, or `[Not Set]` for keys of
    /// ten characters or fewer.
    pub fn masked_api_key(&self) -> String {
        let chars: Vec<char> = self.api_key.chars().collect();
        if chars.len() > 10 {
            let head: String = chars[..5].iter().collect();
            let tail: String = chars[chars.len() - 5..].iter().collect();
            format!("{head}...{tail}")
        } else {
            NOT_SET.to_string()
        }
    }

    /// Replace every connection parameter the environment provides.
    pub fn apply_overrides(&mut self, overrides: &EnvOverrides) {
        if let Some(api_key) = &overrides.api_key {
            self.api_key = api_key.clone();
        }
        if let Some(base_url) = &overrides.base_url {
            self.base_url = base_url.clone();
        }
        if let Some(model) = &overrides.model {
            self.model = model.clone();
        }
    }

    pub fn set_api_key(&mut self, input: &str) {
        self.api_key = input.trim().to_string();
    }

    /// Set the endpoint base URL; it must be an absolute URL.
    pub fn set_base_url(&mut self, input: &str) -> Result<()> {
        let input = input.trim();
        url::Url::parse(input).map_err(|e| {
            Error::validation(
                format!("'{input}' is not a valid URL: {e}"),
                Some("base_url".to_string()),
            )
        })?;
        self.base_url = input.to_string();
        Ok(())
    }

    pub fn set_model(&mut self, input: &str) -> Result<()> {
        let input = input.trim();
        if input.is_empty() {
            return Err(Error::validation(
                "model must not be empty",
                Some("model".to_string()),
            ));
        }
        self.model = input.to_string();
        Ok(())
    }

    /// Set the temperature from user input; it must be a number in `[0.0, 1.0]`.
    pub fn set_temperature(&mut self, input: &str) -> Result<()> {
        let temperature = input
            .trim()
            .parse::<f32>()
            .ok()
            .filter(|t| t.is_finite() && (0.0..=1.0).contains(t))
            .ok_or_else(|| {
                Error::validation(
                    format!("temperature must be between 0.0 and 1.0, got '{}'", input.trim()),
                    Some("temperature".to_string()),
                )
            })?;
        self.temperature = temperature;
        Ok(())
    }

    /// Set the token cap from user input; it must be a positive integer.
    pub fn set_max_tokens(&mut self, input: &str) -> Result<()> {
        let max_tokens = input
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| {
                Error::validation(
                    format!("max tokens must be a positive integer, got '{}'", input.trim()),
                    Some("max_tokens".to_string()),
                )
            })?;
        self.max_tokens = max_tokens;
        Ok(())
    }

    /// Set the language, substituting the default for unsupported codes.
    pub fn set_language(&mut self, code: &str) {
        self.language = i18n::resolve_language(code).to_string();
    }
}

///////////////////////////////////////////// EnvOverrides /////////////////////////////////////////////

/// Connection parameters supplied by the environment.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EnvOverrides {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
}

impl EnvOverrides {
    /// Read the overrides from the process environment.  Empty values count as absent.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the overrides through an arbitrary lookup function.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        Self {
            api_key: get(API_KEY_ENV),
            base_url: get(BASE_URL_ENV),
            model: get(MODEL_ENV),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

///////////////////////////////////////////// SettingsStore ////////////////////////////////////////////

/// Reads and writes the settings file.
#[derive(Clone, Debug)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the settings.
    ///
    /// A missing file is created from the defaults (with the environment applied) so later runs
    /// see a stable file.  The environment overrides are applied on every load.  A file that
    /// exists but cannot be read or parsed is a configuration error.
    pub fn load(&self, overrides: &EnvOverrides) -> Result<Settings> {
        let mut settings = match fs::read_to_string(&self.path) {
            Ok(text) => serde_json::from_str::<Settings>(&text).map_err(|e| {
                Error::config(
                    format!("Failed to parse settings file {}: {e}", self.path.display()),
                    Some(Box::new(e)),
                )
            })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "creating default settings file");
                let mut settings = Settings::default();
                settings.apply_overrides(overrides);
                self.save(&settings)?;
                settings
            }
            Err(e) => {
                return Err(Error::config(
                    format!("Failed to read settings file {}: {e}", self.path.display()),
                    Some(Box::new(e)),
                ));
            }
        };
        settings.apply_overrides(overrides);
        let language = i18n::resolve_language(&settings.language);
        if language != settings.language {
            warn!(language = %settings.language, "unsupported language in settings; using default");
            settings.language = language.to_string();
        }
        debug!(path = %self.path.display(), model = %settings.model, "settings loaded");
        Ok(settings)
    }

    /// Overwrite the settings file with `settings`.
    pub fn save(&self, settings: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                Error::io(format!("Failed to create {}", parent.display()), e)
            })?;
        }
        let json = serde_json::to_string_pretty(settings)?;
        fs::write(&self.path, json).map_err(|e| {
            Error::io(format!("Failed to write settings to {}", self.path.display()), e)
        })?;
        SETTINGS_SAVED.click();
        Ok(())
    }
}
