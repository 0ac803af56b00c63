use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::constants::{endpoints, limits, models, paths};
use crate::error::CoTeacherError;
use crate::session::{ResponseStyle, SessionState, Subject};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub llm: LlmSettings,
    #[serde(default)]
    pub session: SessionSettings,
    #[serde(default)]
    pub export: ExportSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub model: String,
    pub base_url: String,
    /// Ask the server whether a model exists when it is selected.
    pub validate_model: bool,
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub subject: Subject,
    pub style: ResponseStyle,
    pub context_messages: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    /// Where exports are written. Defaults to the working directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            model: models::DEFAULT_MODEL.to_string(),
            base_url: endpoints::OLLAMA_BASE_URL.to_string(),
            validate_model: false,
            connect_timeout_secs: limits::DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            subject: Subject::default(),
            style: ResponseStyle::default(),
            context_messages: limits::CONTEXT_MESSAGES,
        }
    }
}

impl ExportSettings {
    pub fn directory(&self) -> PathBuf {
        self.directory.clone().unwrap_or_else(|| PathBuf::from("."))
    }
}

impl Settings {
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(paths::CONFIG_DIR)
            .join(paths::CONFIG_FILE)
    }

    /// Load from the default location, falling back to defaults when the file
    /// is missing or unreadable.
    pub fn load() -> Self {
        let config_path = Self::config_path();
        if !config_path.exists() {
            return Self::default();
        }

        match Self::load_from(&config_path) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!("Ignoring {}: {}", config_path.display(), e);
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, CoTeacherError> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CoTeacherError::Config(e.to_string()))
    }

    pub fn save_to(&self, path: &Path) -> Result<(), CoTeacherError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| CoTeacherError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// A fresh session carrying the configured model, subject and style.
    pub fn new_session(&self) -> SessionState {
        SessionState::new()
            .with_model(self.llm.model.clone())
            .with_subject(self.session.subject)
            .with_style(self.session.style)
    }
}
