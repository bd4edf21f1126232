use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::policy::DecisionPolicy;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
    #[error("Secret {0} is not set")]
    MissingSecret(String),
    #[error("Invalid endpoint {endpoint}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
    #[error("Config IO error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Config parse error: {0}")]
    Parse(String),
}

/// Model parameters for one chat-completions call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatModelSettings {
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub top_p: f64,
}

impl ChatModelSettings {
    pub fn summarizer_default() -> Self {
        Self {
            model: "llama-3.3-70b-versatile".into(),
            temperature: 1.0,
            max_tokens: 1024,
            top_p: 1.0,
        }
    }

    pub fn classifier_default() -> Self {
        Self {
            model: "llama-3.2-11b-vision-preview".into(),
            temperature: 0.2,
            max_tokens: 300,
            top_p: 1.0,
        }
    }
}

/// A `[summarizer]` / `[classifier]` table where every key is optional.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatModelOverrides {
    model: Option<String>,
    temperature: Option<f64>,
    max_tokens: Option<u32>,
    top_p: Option<f64>,
}

impl ChatModelOverrides {
    fn apply(self, base: ChatModelSettings) -> ChatModelSettings {
        ChatModelSettings {
            model: self.model.unwrap_or(base.model),
            temperature: self.temperature.unwrap_or(base.temperature),
            max_tokens: self.max_tokens.unwrap_or(base.max_tokens),
            top_p: self.top_p.unwrap_or(base.top_p),
        }
    }
}

fn summarizer_overrides<'de, D>(deserializer: D) -> Result<ChatModelSettings, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let overrides = ChatModelOverrides::deserialize(deserializer)?;
    Ok(overrides.apply(ChatModelSettings::summarizer_default()))
}

fn classifier_overrides<'de, D>(deserializer: D) -> Result<ChatModelSettings, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let overrides = ChatModelOverrides::deserialize(deserializer)?;
    Ok(overrides.apply(ChatModelSettings::classifier_default()))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub api_base: String,
    /// Name of the secret holding the bearer token. The token itself is never stored here.
    pub api_key_env: String,
    pub request_timeout_secs: u64,
    pub default_question: String,
    pub jpeg_quality: u8,
    pub max_image_width: u32,
    /// Upper bound on one classification, on top of the HTTP timeout.
    pub classify_timeout_secs: u64,
    /// Where the business context and cached vibe are persisted.
    pub context_path: PathBuf,
    /// Directory the desktop camera reads photos from.
    pub capture_dir: PathBuf,
    pub max_zoom: Option<f32>,
    /// When set, every capture is also written here.
    pub archive_dir: Option<PathBuf>,
    #[serde(deserialize_with = "summarizer_overrides")]
    pub summarizer: ChatModelSettings,
    #[serde(deserialize_with = "classifier_overrides")]
    pub classifier: ChatModelSettings,
    pub policy: DecisionPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base: "https://api.groq.com".into(),
            api_key_env: "GROQ_API_KEY".into(),
            request_timeout_secs: 30,
            summarizer: ChatModelSettings::summarizer_default(),
            classifier: ChatModelSettings::classifier_default(),
            default_question: "Is there a person smiling in this photo?".into(),
            jpeg_quality: 80,
            max_image_width: 1024,
            classify_timeout_secs: 45,
            policy: DecisionPolicy::default(),
            context_path: PathBuf::from("warmr-context.toml"),
            capture_dir: PathBuf::from("captures"),
            max_zoom: None,
            archive_dir: None,
        }
    }
}

impl Settings {
    /// Settings file path: `WARMR_CONFIG`, else `./warmr.toml`.
    pub fn default_path() -> PathBuf {
        std::env::var_os("WARMR_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("warmr.toml"))
    }

    /// Load settings from `path`; a missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::info!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let settings: Settings =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))?;
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
                path: dir.display().to_string(),
                source,
            })?;
        }
        fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        log::info!("Settings saved to {}", path.display());
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let parsed = url::Url::parse(&self.api_base).map_err(|e| ConfigError::InvalidEndpoint {
            endpoint: self.api_base.clone(),
            reason: e.to_string(),
        })?;
        if parsed.scheme() != "https" && parsed.scheme() != "http" {
            return Err(ConfigError::InvalidEndpoint {
                endpoint: self.api_base.clone(),
                reason: format!("unsupported scheme {}", parsed.scheme()),
            });
        }
        if self.summarizer.model.trim().is_empty() {
            return Err(ConfigError::MissingField("summarizer.model"));
        }
        if self.classifier.model.trim().is_empty() {
            return Err(ConfigError::MissingField("classifier.model"));
        }
        if self.max_image_width == 0 {
            return Err(ConfigError::Parse("maxImageWidth must be at least 1".into()));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(ConfigError::Parse(format!(
                "jpegQuality must be within 1..=100, got {}",
                self.jpeg_quality
            )));
        }
        Ok(())
    }

    /// Look up the bearer token named by `api_key_env`.
    pub fn api_key(&self, secrets: &dyn SecretStore) -> Result<String, ConfigError> {
        secrets
            .secret(&self.api_key_env)
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingSecret(self.api_key_env.clone()))
    }
}

/// Source of API credentials.
pub trait SecretStore: Send + Sync {
    fn secret(&self, name: &str) -> Option<String>;
}

/// Reads secrets from process environment variables.
pub struct EnvSecretStore;

impl SecretStore for EnvSecretStore {
    fn secret(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}
