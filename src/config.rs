use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::cancel::CancellationSignal;
use crate::command::language::language_code_for;
use crate::error::{Result, GstError};

const APP_DIR_NAME: &str = "SubtitleGenerator";
const CONFIG_FILE_NAME: &str = "gui_config.json";

/// Models the translator is known to accept.
pub const KNOWN_MODELS: &[&str] = &[
    "gemini-2.5-flash",
    "gemini-2.5-pro",
    "gemini-2.0-flash",
    "gemini-2.5-flash-preview-05-20",
    "gemini-2.5-pro-preview-06-05",
];

/// Persisted user settings.
///
/// Stored as a flat JSON object. Loading always starts from
/// [`AppConfig::default`] and overlays whatever the file provides, see
/// [`AppConfig::merge`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Gemini API key passed to the translator with `-k`
    pub gemini_api_key: String,
    /// Translation model identifier
    pub model: String,
    /// TMDB API key or v4 read access token
    pub tmdb_api_key: String,
    /// Last TMDB id the user worked with
    pub tmdb_id: String,
    pub api_expanded: bool,
    pub settings_expanded: bool,
    /// Target language name, e.g. "Korean"
    pub language: String,
    /// Target language code used in output filenames, e.g. "ko"
    pub language_code: String,
    /// Ask the translator to extract audio from the video
    pub extract_audio: bool,
    /// Fetch TMDB details automatically before a run
    pub auto_fetch_tmdb: bool,
    pub is_tv_series: bool,
    /// Insert the "Translated by" caption into produced subtitles
    pub add_translator_info: bool,
    /// Explicit location of the translator executable
    pub gst_path: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            gemini_api_key: String::new(),
            model: "gemini-2.5-flash".to_string(),
            tmdb_api_key: String::new(),
            tmdb_id: String::new(),
            api_expanded: false,
            settings_expanded: false,
            language: "Korean".to_string(),
            language_code: "ko".to_string(),
            extract_audio: false,
            auto_fetch_tmdb: true,
            is_tv_series: false,
            add_translator_info: true,
            gst_path: None,
        }
    }
}

impl AppConfig {
    /// Overlay a JSON object onto `defaults`.
    ///
    /// Keys unknown to `AppConfig` are ignored and a value of the wrong type
    /// leaves that key at its default. A non-object overlay yields `defaults`.
    pub fn merge(defaults: &AppConfig, overlay: Value) -> AppConfig {
        let Value::Object(overlay) = overlay else {
            return defaults.clone();
        };
        let Ok(Value::Object(mut merged)) = serde_json::to_value(defaults) else {
            return defaults.clone();
        };

        for (key, value) in overlay {
            if !merged.contains_key(&key) {
                continue;
            }
            let previous = merged.insert(key.clone(), value);
            if serde_json::from_value::<AppConfig>(Value::Object(merged.clone())).is_err() {
                warn!("Ignoring config value for '{}': unexpected type", key);
                if let Some(previous) = previous {
                    merged.insert(key, previous);
                }
            }
        }

        serde_json::from_value(Value::Object(merged)).unwrap_or_else(|_| defaults.clone())
    }

    pub fn has_gemini_api_key(&self) -> bool {
        !self.gemini_api_key.trim().is_empty()
    }

    pub fn has_tmdb_api_key(&self) -> bool {
        !self.tmdb_api_key.trim().is_empty()
    }

    pub fn has_tmdb_id(&self) -> bool {
        !self.tmdb_id.trim().is_empty()
    }

    /// Copy with API keys replaced, for display.
    pub fn masked(&self) -> AppConfig {
        fn mask(secret: &str) -> String {
            if secret.is_empty() { String::new() } else { "****".to_string() }
        }

        AppConfig {
            gemini_api_key: mask(&self.gemini_api_key),
            tmdb_api_key: mask(&self.tmdb_api_key),
            ..self.clone()
        }
    }

    /// Human-readable list of problems with the current settings.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if !self.has_gemini_api_key() {
            issues.push("Gemini API key is missing".to_string());
        }
        if !KNOWN_MODELS.contains(&self.model.as_str()) {
            issues.push(format!("Invalid model: {}", self.model));
        }
        if self.language.trim().is_empty() {
            issues.push("Language is not set".to_string());
        }

        issues
    }

    /// Set a single key from its string form, as typed on the command line.
    pub fn set_value(&mut self, key: &str, raw: &str) -> Result<()> {
        let Ok(Value::Object(mut current)) = serde_json::to_value(&*self) else {
            return Err(GstError::Config("Failed to serialize config".to_string()));
        };
        let slot = current
            .get(key)
            .ok_or_else(|| GstError::Config(format!("Unknown config key '{}'", key)))?;

        let value = match slot {
            Value::Bool(_) => match raw.to_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Value::Bool(true),
                "false" | "no" | "off" | "0" => Value::Bool(false),
                _ => {
                    return Err(GstError::Config(format!(
                        "Expected a boolean for '{}', got '{}'",
                        key, raw
                    )));
                }
            },
            _ if key == "gst_path" && raw.is_empty() => Value::Null,
            _ => Value::String(raw.to_string()),
        };

        current.insert(key.to_string(), value);
        *self = serde_json::from_value(Value::Object(current))?;
        Ok(())
    }
}

/// Reads and writes [`AppConfig`] at a fixed location.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    /// Store at the per-user configuration directory.
    ///
    /// Falls back to the current directory when the platform directory
    /// cannot be determined or created.
    pub fn at_default_location() -> Self {
        let dir = dirs::config_dir().map(|base| base.join(APP_DIR_NAME));

        let dir = match dir {
            Some(dir) => match std::fs::create_dir_all(&dir) {
                Ok(()) => dir,
                Err(e) => {
                    warn!("Error creating configuration directory {}: {}", dir.display(), e);
                    PathBuf::from(".")
                }
            },
            None => PathBuf::from("."),
        };

        Self::new(dir.join(CONFIG_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load settings merged over the defaults. Never fails.
    pub fn load(&self) -> AppConfig {
        if !self.path.exists() {
            return AppConfig::default();
        }
        match self.read(&self.path) {
            Ok(config) => config,
            Err(e) => {
                warn!("Error loading configuration from {}: {}", self.path.display(), e);
                AppConfig::default()
            }
        }
    }

    /// Overwrite the stored settings wholesale.
    pub fn save(&self, config: &AppConfig) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::write(config, &self.path)?;
        info!("Configuration saved to {}", self.path.display());
        Ok(())
    }

    pub fn reset(&self) -> Result<AppConfig> {
        let config = AppConfig::default();
        self.save(&config)?;
        Ok(config)
    }

    pub fn export<P: AsRef<Path>>(&self, config: &AppConfig, path: P) -> Result<()> {
        Self::write(config, path.as_ref())
    }

    /// Read a settings file from elsewhere, merged over the defaults.
    pub fn import<P: AsRef<Path>>(&self, path: P) -> Result<AppConfig> {
        self.read(path.as_ref())
    }

    fn read(&self, path: &Path) -> Result<AppConfig> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| GstError::Config(format!("Failed to read config file: {}", e)))?;
        let value: Value = serde_json::from_str(&content)
            .map_err(|e| GstError::Config(format!("Failed to parse config file: {}", e)))?;
        Ok(AppConfig::merge(&AppConfig::default(), value))
    }

    fn write(config: &AppConfig, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(config)?;
        std::fs::write(path, content)
            .map_err(|e| GstError::Config(format!("Failed to write config file: {}", e)))
    }
}

/// Settings for one batch run, rebuilt from [`AppConfig`] for every invocation.
#[derive(Debug, Clone)]
pub struct TranslationConfig {
    pub language: String,
    pub language_code: String,
    pub api_key: String,
    pub model: String,
    /// Plot summary used to build the translator description
    pub overview: String,
    pub movie_title: String,
    pub is_tv_series: bool,
    pub extract_audio: bool,
    pub add_translator_info: bool,
    pub cancel: CancellationSignal,
}

impl TranslationConfig {
    pub fn from_app(config: &AppConfig, cancel: CancellationSignal) -> Self {
        let language_code = if config.language_code.trim().is_empty() {
            language_code_for(&config.language)
        } else {
            config.language_code.trim().to_string()
        };

        Self {
            language: config.language.clone(),
            language_code,
            api_key: config.gemini_api_key.clone(),
            model: config.model.clone(),
            overview: String::new(),
            movie_title: String::new(),
            is_tv_series: config.is_tv_series,
            extract_audio: config.extract_audio,
            add_translator_info: config.add_translator_info,
            cancel,
        }
    }

    pub fn with_overview<S: Into<String>>(mut self, overview: S) -> Self {
        self.overview = overview.into();
        self
    }

    pub fn with_movie_title<S: Into<String>>(mut self, title: S) -> Self {
        self.movie_title = title.into();
        self
    }

    /// Text of the caption inserted at the start of produced subtitles.
    pub fn attribution_text(&self) -> String {
        format!("# Translated by {} #", self.model)
    }
}
