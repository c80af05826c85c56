//! Configuration models for glossfill.
//!
//! All I^R (resolvable ignorance) is parameterized here. There is no
//! module-level mutable state: the resolved `Config` is handed to the
//! pipeline explicitly.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration for glossfill.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Chat-completion API configuration
    pub api: ApiConfig,

    /// Concurrency, retry and model settings
    pub pipeline: PipelineConfig,

    /// Input/output file locations
    pub input: InputConfig,
}

/// Chat-completion API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// API key (can also be set via the `api_key_env` variable)
    pub api_key: Option<String>,

    /// Environment variable name for the API key
    pub api_key_env: String,

    /// Base URL for the chat-completion API
    pub base_url: String,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: "OPENAI_API_KEY".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            timeout_secs: 60,
        }
    }
}

/// Concurrency, retry and model settings for the fill pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Concurrency ceiling: in-flight requests at any moment
    pub workers: usize,

    /// Batch size = workers × batch_multiplier
    pub batch_multiplier: usize,

    /// Primary-model attempts per cell before falling back
    pub max_retries: u32,

    /// Base retry delay in seconds; the delay before attempt n is
    /// `retry_delay_secs × (n - 1)`
    pub retry_delay_secs: u64,

    /// Minimum accepted content length; anything this short or shorter
    /// counts as a failed attempt
    pub min_content_len: usize,

    /// Model used for every primary attempt
    pub primary_model: ModelSpec,

    /// Cheaper model used for the single last-resort attempt
    pub fallback_model: ModelSpec,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 25,
            batch_multiplier: 3,
            max_retries: 3,
            retry_delay_secs: 2,
            min_content_len: 10,
            primary_model: ModelSpec::new("gpt-4.1-nano"),
            fallback_model: ModelSpec::new("gpt-3.5-turbo"),
        }
    }
}

/// Specification for a model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Model ID as the API knows it
    pub id: String,

    /// Maximum tokens per completion
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

impl ModelSpec {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_temperature() -> f64 {
    0.7
}

/// Input/output file locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Full glossary table
    pub table: PathBuf,

    /// Small sample table, selected with `--sample`
    pub sample_table: PathBuf,

    /// Checkpoint file
    pub checkpoint: PathBuf,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            table: PathBuf::from("glossary.csv"),
            sample_table: PathBuf::from("glossary_sample.csv"),
            checkpoint: PathBuf::from("checkpoint.json"),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// B_i(file exists) → Result
    /// B_i(file is valid TOML) → Result
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_owned(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_owned(),
            source: e,
        })
    }

    /// Load configuration from `path`, or fall back to defaults when no
    /// file was given and none exists at the conventional location.
    pub fn load_or_default(path: Option<&std::path::Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::from_file(p),
            None => {
                let conventional = std::path::Path::new("glossfill.toml");
                if conventional.exists() {
                    Self::from_file(conventional)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Resolve the API key from config or environment.
    ///
    /// B_i(api key available) → Result. A placeholder value is rejected
    /// the same as a missing one: failing fast here is what keeps a
    /// misconfigured run from touching any file.
    pub fn resolve_api_key(&self) -> Result<String, ConfigError> {
        let key = match &self.api.api_key {
            Some(key) => expand_env_vars(key),
            None => std::env::var(&self.api.api_key_env).map_err(|_| {
                ConfigError::MissingApiKey {
                    env_var: self.api.api_key_env.clone(),
                }
            })?,
        };

        if is_placeholder(&key) {
            return Err(ConfigError::PlaceholderApiKey {
                env_var: self.api.api_key_env.clone(),
            });
        }

        Ok(key)
    }
}

/// Check whether a key value is an obvious stand-in rather than a credential.
fn is_placeholder(key: &str) -> bool {
    let key = key.trim();
    key.is_empty()
        || key.contains("${")
        || key.eq_ignore_ascii_case("changeme")
        || key.to_ascii_lowercase().contains("your-api-key")
}

/// Expand environment variables in a string.
///
/// Supports ${VAR_NAME} syntax. If the variable is not set, the
/// placeholder is left unchanged.
pub fn expand_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    let re = regex::Regex::new(r"\$\{([^}]+)\}").unwrap();

    for cap in re.captures_iter(s) {
        let var_name = &cap[1];
        if let Ok(value) = std::env::var(var_name) {
            result = result.replace(&cap[0], &value);
        }
    }

    result
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Missing API key: set {env_var} env var or api.api_key in config")]
    MissingApiKey { env_var: String },

    #[error("API key looks like a placeholder: set {env_var} to a real credential")]
    PlaceholderApiKey { env_var: String },
}
