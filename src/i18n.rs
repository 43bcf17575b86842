//! Translation tables for the user interface.
//!
//! Each supported language has one JSON file, `<dir>/<code>.json`, holding a nested
//! string-keyed table.  Loading never fails: a missing or corrupt file falls back to the default
//! language, and a broken default falls back to a minimal built-in table.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::observability::TRANSLATION_FALLBACKS;

/// Language codes with a shipped translation table, in menu order.
pub const SUPPORTED_LANGUAGES: &[&str] = &["en", "fr", "ar"];

/// The language used when the requested one is unsupported or unavailable.
pub const DEFAULT_LANGUAGE: &str = "en";

const APP_NAME: &str = "mdchat";

/// Map `code` to itself if it is supported, otherwise to [`DEFAULT_LANGUAGE`].
pub fn resolve_language(code: &str) -> &'static str {
    let code = code.trim();
    SUPPORTED_LANGUAGES
        .iter()
        .copied()
        .find(|supported| supported.eq_ignore_ascii_case(code))
        .unwrap_or(DEFAULT_LANGUAGE)
}

/// Where a loaded table came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TableSource {
    /// The requested language's own file.
    Requested,
    /// The default language's file, substituted for the requested one.
    Default,
    /// The built-in minimal table.
    BuiltIn,
}

/// A loaded translation table.
#[derive(Clone, Debug, PartialEq)]
pub struct Translations {
    language: String,
    table: Value,
    source: TableSource,
}

impl Translations {
    /// The minimal table used when no file can be loaded.
    pub fn built_in() -> Self {
        let mut table = Map::new();
        table.insert("app_name".to_string(), Value::String(APP_NAME.to_string()));
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
            table: Value::Object(table),
            source: TableSource::BuiltIn,
        }
    }

    /// Build a table from an in-memory JSON value.
    pub fn from_value(language: impl Into<String>, table: Value) -> Self {
        Self {
            language: language.into(),
            table,
            source: TableSource::Requested,
        }
    }

    /// The language code whose table this is.
    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn source(&self) -> TableSource {
        self.source
    }

    pub fn table(&self) -> &Value {
        &self.table
    }

    /// Look up a dotted key path such as `dashboard.options.new_chat`.
    pub fn get(&self, key: &str) -> Option<&str> {
        key.split('.')
            .try_fold(&self.table, |node, part| node.get(part))
            .and_then(Value::as_str)
    }

    /// Look up a dotted key path, returning the path itself when the key is absent.
    pub fn text<'a>(&'a self, key: &'a str) -> &'a str {
        match self.get(key) {
            Some(text) => text,
            None => {
                warn!(language = %self.language, key, "missing translation");
                key
            }
        }
    }

    /// The display name of a language, e.g. `Français` for `fr`.
    pub fn language_name<'a>(&'a self, code: &'a str) -> &'a str {
        self.table
            .get("languages")
            .and_then(|languages| languages.get(code))
            .and_then(Value::as_str)
            .unwrap_or(code)
    }
}

/// The directory of translation files.
#[derive(Clone, Debug)]
pub struct Locales {
    dir: PathBuf,
}

impl Locales {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Load the table for `code`.  Never fails.
    pub fn load(&self, code: &str) -> Translations {
        let language = resolve_language(code);
        if language != code.trim() {
            debug!(requested = code, language, "unsupported language; using default");
        }
        match self.read_table(language) {
            Some(table) => {
                let source = if language.eq_ignore_ascii_case(code.trim()) {
                    TableSource::Requested
                } else {
                    TableSource::Default
                };
                return Translations {
                    language: language.to_string(),
                    table,
                    source,
                };
            }
            None if language != DEFAULT_LANGUAGE => {
                TRANSLATION_FALLBACKS.click();
                if let Some(table) = self.read_table(DEFAULT_LANGUAGE) {
                    return Translations {
                        language: DEFAULT_LANGUAGE.to_string(),
                        table,
                        source: TableSource::Default,
                    };
                }
            }
            None => {}
        }
        TRANSLATION_FALLBACKS.click();
        warn!(dir = %self.dir.display(), "no usable translation table; using built-in strings");
        Translations::built_in()
    }

    fn read_table(&self, code: &str) -> Option<Value> {
        let path = self.dir.join(format!("{code}.json"));
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot read translation file");
                return None;
            }
        };
        match serde_json::from_str::<Value>(&text) {
            Ok(table @ Value::Object(_)) => Some(table),
            Ok(_) => {
                warn!(path = %path.display(), "translation file is not a JSON object");
                None
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot parse translation file");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn write(dir: &TempDir, code: &str, table: &Value) {
        fs::write(dir.path().join(format!("{code}.json")), table.to_string()).unwrap();
    }

    fn fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "en",
            &json!({"app_name": "mdchat", "chat": {"you": "You"}, "languages": {"fr": "French"}}),
        );
        write(
            &dir,
            "fr",
            &json!({"app_name": "mdchat", "chat": {"you": "Vous"}, "languages": {"fr": "Français"}}),
        );
        dir
    }

    #[test]
    fn resolve_supported_and_unsupported() {
        assert_eq!(resolve_language("fr"), "fr");
        assert_eq!(resolve_language(" AR "), "ar");
        assert_eq!(resolve_language("xx"), "en");
        assert_eq!(resolve_language(""), "en");
    }

    #[test]
    fn loading_twice_is_identical() {
        let dir = fixture();
        let locales = Locales::new(dir.path());
        let first = locales.load("fr");
        let second = locales.load("fr");
        assert_eq!(first, second);
        assert_eq!(first.source(), TableSource::Requested);
        assert_eq!(first.text("chat.you"), "Vous");
    }

    #[test]
    fn unsupported_code_yields_default_table() {
        let dir = fixture();
        let locales = Locales::new(dir.path());
        let fallback = locales.load("xx");
        let english = locales.load("en");
        assert_eq!(fallback.table(), english.table());
        assert_eq!(fallback.language(), "en");
    }

    #[test]
    fn missing_file_falls_back_to_default() {
        let dir = fixture();
        let locales = Locales::new(dir.path());
        let arabic = locales.load("ar");
        assert_eq!(arabic.language(), "en");
        assert_eq!(arabic.source(), TableSource::Default);
        assert_eq!(arabic.text("chat.you"), "You");
    }

    #[test]
    fn corrupt_file_falls_back_to_default() {
        let dir = fixture();
        fs::write(dir.path().join("fr.json"), "{ broken").unwrap();
        let locales = Locales::new(dir.path());
        let french = locales.load("fr");
        assert_eq!(french.table(), locales.load("en").table());
    }

    #[test]
    fn broken_default_falls_back_to_built_in() {
        let dir = fixture();
        fs::write(dir.path().join("en.json"), "[1, 2, 3]").unwrap();
        fs::remove_file(dir.path().join("fr.json")).unwrap();
        let locales = Locales::new(dir.path());
        let table = locales.load("fr");
        assert_eq!(table, Translations::built_in());
        assert_eq!(table.text("app_name"), "mdchat");
    }

    #[test]
    fn missing_key_returns_path() {
        let table = Translations::built_in();
        assert_eq!(table.get("chat.you"), None);
        assert_eq!(table.text("chat.you"), "chat.you");
        assert_eq!(table.language_name("fr"), "fr");
    }

    #[test]
    fn language_names() {
        let dir = fixture();
        let locales = Locales::new(dir.path());
        assert_eq!(locales.load("fr").language_name("fr"), "Français");
        assert_eq!(locales.load("en").language_name("ar"), "ar");
    }
}
