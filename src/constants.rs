//! App-wide constants.
//!
//! Centralises the tool name, config paths, and environment variable
//! names so a rename only requires changing this file.

/// Display name of the tool (lowercase).
pub const APP_NAME: &str = "prcontext";

/// Crate version from `Cargo.toml`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Local config filename (e.g. `.prcontext.toml` in the working directory).
pub const CONFIG_FILENAME: &str = ".prcontext.toml";

/// Directory name under `~/.config/` for global config.
pub const CONFIG_DIR: &str = "prcontext";

/// Sample API key shipped in example env files; never a real key.
pub const PLACEHOLDER_API_KEY: &str = "your_groq_api_key_here";

// ── Environment variable names ──────────────────────────────────────

pub const ENV_PROVIDER: &str = "PRCONTEXT_PROVIDER";
pub const ENV_MODEL: &str = "PRCONTEXT_MODEL";
pub const ENV_API_KEY: &str = "PRCONTEXT_API_KEY";
pub const ENV_BASE_URL: &str = "PRCONTEXT_BASE_URL";
pub const ENV_CACHE_TTL: &str = "PRCONTEXT_CACHE_TTL";
pub const ENV_MAX_ATTEMPTS: &str = "PRCONTEXT_MAX_ATTEMPTS";
pub const ENV_DEBUG: &str = "PRCONTEXT_DEBUG";
pub const ENV_LOG_JSON: &str = "PRCONTEXT_LOG_JSON";
