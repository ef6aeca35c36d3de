use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub onboarding: OnboardingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

/// Настройки онбординга
#[derive(Debug, Deserialize, Clone)]
pub struct OnboardingConfig {
    /// Ceiling for the whole sign-in attempt
    #[serde(default = "default_sign_in_timeout_secs")]
    pub sign_in_timeout_secs: u64,
    /// Read-after-write attempts against the identity store
    #[serde(default = "default_settle_attempts")]
    pub settle_attempts: u32,
    #[serde(default = "default_settle_initial_backoff_ms")]
    pub settle_initial_backoff_ms: u64,
    /// Base URL of a remote attribute API used when a direct identity write
    /// fails. Empty disables the fallback.
    #[serde(default)]
    pub fallback_api_base: String,
    /// Accounts with known-bad stored state that always resolve to `complete`.
    /// Matched against username, email and user id.
    #[serde(default)]
    pub complete_overrides: Vec<String>,
}

impl Default for OnboardingConfig {
    fn default() -> Self {
        Self {
            sign_in_timeout_secs: default_sign_in_timeout_secs(),
            settle_attempts: default_settle_attempts(),
            settle_initial_backoff_ms: default_settle_initial_backoff_ms(),
            fallback_api_base: String::new(),
            complete_overrides: Vec::new(),
        }
    }
}

fn default_port() -> u16 {
    3000
}

fn default_sign_in_timeout_secs() -> u64 {
    45
}

fn default_settle_attempts() -> u32 {
    3
}

fn default_settle_initial_backoff_ms() -> u64 {
    200
}

/// Default configuration embedded in the binary
const DEFAULT_CONFIG: &str = r#"
[database]
path = "target/db/app.db"

[server]
port = 3000

[onboarding]
sign_in_timeout_secs = 45
settle_attempts = 3
settle_initial_backoff_ms = 200
fallback_api_base = ""
complete_overrides = []
"#;

/// Load configuration from config.toml file
///
/// Search order:
/// 1. Next to the executable (for production)
/// 2. Falls back to embedded default config
pub fn load_config() -> anyhow::Result<Config> {
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            let config_path = exe_dir.join("config.toml");

            if config_path.exists() {
                tracing::info!("Loading config from: {}", config_path.display());
                let contents = std::fs::read_to_string(&config_path)?;
                let config: Config = toml::from_str(&contents)?;
                return Ok(config);
            } else {
                tracing::warn!("config.toml not found at: {}", config_path.display());
            }
        }
    }

    tracing::info!("Using default embedded configuration");
    let config: Config = toml::from_str(DEFAULT_CONFIG)?;
    Ok(config)
}

/// Get the database file path from configuration
/// Resolves relative paths relative to the executable directory
pub fn get_database_path(config: &Config) -> anyhow::Result<PathBuf> {
    let db_path_str = &config.database.path;
    let db_path = Path::new(db_path_str);

    if db_path.is_absolute() {
        return Ok(db_path.to_path_buf());
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            return Ok(exe_dir.join(db_path));
        }
    }

    Ok(PathBuf::from(db_path_str))
}
