//! Config struct and loading logic.
//!
//! Priority (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables
//! 3. `.prcontext.toml` in the working directory
//! 4. `~/.config/prcontext/config.toml` (global defaults)
//! 5. Built-in defaults

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::constants;
use crate::env::Env;
use crate::models::ProviderName;

/// Errors during config loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    ParseFile {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub provider: ProviderConfig,
    pub analysis: AnalysisConfig,
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
}

/// LLM provider configuration.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub name: ProviderName,
    pub model: String,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("name", &self.name)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: ProviderName::Groq,
            model: "llama-3.3-70b-versatile".to_string(),
            base_url: None,
            api_key: None,
        }
    }
}

impl ProviderConfig {
    /// Whether a usable API key is present.
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

/// Analysis limits and sampling settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub max_attempts: u32,
    pub max_files: usize,
    pub quick_max_files: usize,
    pub quick_max_commits: usize,
    pub max_concurrent: usize,
    pub temperature: f64,
    pub max_tokens: u64,
    pub top_p: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            max_files: 100,
            quick_max_files: 10,
            quick_max_commits: 5,
            max_concurrent: 4,
            temperature: 0.3,
            max_tokens: 2000,
            top_p: 0.9,
        }
    }
}

/// Result cache configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: 3600,
        }
    }
}

/// Log output configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` filter directive, e.g. `warn` or `prcontext=debug`.
    pub level: String,
    /// Emit JSON lines instead of human-readable logs.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            json: false,
        }
    }
}

impl Config {
    /// Load configuration with proper layering.
    ///
    /// Reads from global config, the local config in `dir`, then applies
    /// environment variable overrides.
    pub fn load(dir: Option<&Path>, env: &Env) -> Result<Self, ConfigError> {
        let local = dir.map(|d| d.join(constants::CONFIG_FILENAME));
        Self::load_layers(Self::global_config_path().as_deref(), local.as_deref(), env)
    }

    fn load_layers(
        global: Option<&Path>,
        local: Option<&Path>,
        env: &Env,
    ) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        // Layer 4: global config
        if let Some(global_path) = global {
            if global_path.exists() {
                let global = Self::load_file(global_path)?;
                config.merge(global);
            }
        }

        // Layer 3: local config
        if let Some(local_path) = local {
            if local_path.exists() {
                let local = Self::load_file(local_path)?;
                config.merge(local);
            }
        }

        // Layer 2: environment variables
        config.apply_env_vars(env);
        config.discard_placeholder_key();

        Ok(config)
    }

    /// Load a config from a specific file.
    fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::ParseFile {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Get the global config file path.
    fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(constants::CONFIG_DIR).join("config.toml"))
    }

    /// Merge another config into this one (other takes precedence for non-default values).
    fn merge(&mut self, other: Config) {
        // Provider settings
        let default_provider = ProviderConfig::default();
        if other.provider.name != default_provider.name {
            self.provider.name = other.provider.name;
        }
        if other.provider.model != default_provider.model {
            self.provider.model = other.provider.model;
        }
        if other.provider.base_url.is_some() {
            self.provider.base_url = other.provider.base_url;
        }
        if other.provider.api_key.is_some() {
            self.provider.api_key = other.provider.api_key;
        }

        // Analysis settings
        let default_analysis = AnalysisConfig::default();
        let analysis = other.analysis;
        if analysis.max_attempts != default_analysis.max_attempts {
            self.analysis.max_attempts = analysis.max_attempts;
        }
        if analysis.max_files != default_analysis.max_files {
            self.analysis.max_files = analysis.max_files;
        }
        if analysis.quick_max_files != default_analysis.quick_max_files {
            self.analysis.quick_max_files = analysis.quick_max_files;
        }
        if analysis.quick_max_commits != default_analysis.quick_max_commits {
            self.analysis.quick_max_commits = analysis.quick_max_commits;
        }
        if analysis.max_concurrent != default_analysis.max_concurrent {
            self.analysis.max_concurrent = analysis.max_concurrent;
        }
        if analysis.temperature != default_analysis.temperature {
            self.analysis.temperature = analysis.temperature;
        }
        if analysis.max_tokens != default_analysis.max_tokens {
            self.analysis.max_tokens = analysis.max_tokens;
        }
        if analysis.top_p != default_analysis.top_p {
            self.analysis.top_p = analysis.top_p;
        }

        // Cache settings (disabled overrides enabled)
        if !other.cache.enabled {
            self.cache.enabled = false;
        }
        if other.cache.ttl_secs != CacheConfig::default().ttl_secs {
            self.cache.ttl_secs = other.cache.ttl_secs;
        }

        // Logging settings
        if other.logging.level != LoggingConfig::default().level {
            self.logging.level = other.logging.level;
        }
        if other.logging.json {
            self.logging.json = true;
        }
    }

    /// Apply environment variable overrides.
    fn apply_env_vars(&mut self, env: &Env) {
        if let Some(val) = env.non_empty(constants::ENV_PROVIDER) {
            if let Ok(name) = val.parse::<ProviderName>() {
                self.provider.name = name;
            } else {
                eprintln!("Warning: ignoring invalid {} value: {val}", constants::ENV_PROVIDER);
            }
        }
        if let Some(val) = env.non_empty(constants::ENV_MODEL) {
            self.provider.model = val;
        }
        if let Some(val) = env.non_empty(constants::ENV_BASE_URL) {
            self.provider.base_url = Some(val);
        }

        // Provider-specific API key resolution
        let api_key = env
            .non_empty(constants::ENV_API_KEY)
            .or_else(|| env.non_empty(self.provider.name.api_key_env_var()));
        if api_key.is_some() {
            self.provider.api_key = api_key;
        }

        if let Some(val) = env.non_empty(constants::ENV_CACHE_TTL) {
            match val.trim().parse::<u64>() {
                Ok(secs) => self.cache.ttl_secs = secs,
                Err(_) => eprintln!(
                    "Warning: ignoring invalid {} value: {val}",
                    constants::ENV_CACHE_TTL
                ),
            }
        }
        if let Some(val) = env.non_empty(constants::ENV_MAX_ATTEMPTS) {
            match val.trim().parse::<u32>() {
                Ok(n) if n > 0 => self.analysis.max_attempts = n,
                _ => eprintln!(
                    "Warning: ignoring invalid {} value: {val}",
                    constants::ENV_MAX_ATTEMPTS
                ),
            }
        }

        // Logging
        if env.flag(constants::ENV_DEBUG) == Some(true) {
            self.logging.level = "info".to_string();
        }
        if let Some(json) = env.flag(constants::ENV_LOG_JSON) {
            self.logging.json = json;
        }
    }

    /// Switch provider from the command line.
    ///
    /// A key from config files belongs to the provider it was written for,
    /// so switching re-resolves the key from the environment only.
    pub fn override_provider(&mut self, name: ProviderName, env: &Env) {
        if name == self.provider.name {
            return;
        }
        self.provider.name = name;
        self.provider.api_key = env
            .non_empty(constants::ENV_API_KEY)
            .or_else(|| env.non_empty(name.api_key_env_var()));
        self.discard_placeholder_key();
    }

    /// Treat the sample key from example env files as no key at all.
    fn discard_placeholder_key(&mut self) {
        let is_placeholder = self
            .provider
            .api_key
            .as_deref()
            .is_some_and(|k| k.trim().is_empty() || k.trim() == constants::PLACEHOLDER_API_KEY);
        if is_placeholder {
            self.provider.api_key = None;
        }
    }
}
