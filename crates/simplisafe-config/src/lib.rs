//! Configuration for SimpliSafe client programs.
//!
//! TOML profiles, password resolution (env + keyring + plaintext),
//! credential persistence, tracing setup, and translation to
//! `simplisafe_core::SessionConfig`.

pub mod credentials;
pub mod logging;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use simplisafe_core::{Endpoints, EventSource, SessionConfig};

pub use credentials::{
    CredentialStore, FileCredentialStore, KeyringCredentialStore, credential_store_for,
    persist_credentials,
};

const KEYRING_SERVICE: &str = "simplisafe";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no profile named '{profile}'")]
    UnknownProfile { profile: String },

    #[error("no password configured for profile '{profile}'")]
    NoPassword { profile: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("credential encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("logging setup failed: {0}")]
    Logging(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named account profiles.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Look up a profile, falling back to `default_profile`.
    pub fn profile<'a>(&'a self, name: Option<&'a str>) -> Result<(&'a str, &'a Profile), ConfigError> {
        let name = name
            .or(self.default_profile.as_deref())
            .unwrap_or("default");
        self.profiles
            .get(name)
            .map(|p| (name, p))
            .ok_or_else(|| ConfigError::UnknownProfile {
                profile: name.into(),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Defaults {
    /// `tracing` filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    #[serde(default)]
    pub log_json: bool,

    /// Request timeout, e.g. "10s".
    #[serde(default = "default_timeout")]
    pub timeout: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter(),
            log_json: false,
            timeout: default_timeout(),
        }
    }
}

fn default_log_filter() -> String {
    logging::DEFAULT_FILTER.into()
}
fn default_timeout() -> String {
    "10s".into()
}

/// A named account profile.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Profile {
    /// Account email for password logins.
    pub username: Option<String>,

    /// Password (plaintext; prefer keyring or `SIMPLISAFE_PASSWORD`).
    pub password: Option<String>,

    /// Override the vendor host, e.g. for a test server.
    pub base_url: Option<String>,

    pub client_id: Option<String>,

    /// Stable device identifier sent with password logins. Generated on
    /// first use by [`ensure_device_id`].
    pub device_id: Option<String>,

    /// "push", "poll" or "disabled".
    pub event_source: Option<String>,

    /// Poll cadence, e.g. "30s".
    pub poll_interval: Option<String>,

    /// Periodic full refresh, e.g. "15m". Unset disables it.
    pub refresh_interval: Option<String>,

    /// Override the request timeout.
    pub timeout: Option<String>,

    pub dedup_capacity: Option<usize>,

    /// "keyring" (default) or "file".
    pub credential_store: Option<String>,
}

// ── Config file path ────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "simplisafe-rs", "simplisafe")
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback().join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Directory for per-profile state such as credential files.
pub fn data_dir() -> PathBuf {
    project_dirs().map_or_else(dirs_fallback, |dirs| dirs.data_dir().to_path_buf())
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("simplisafe");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load Config from `path`, with `SIMPLISAFE_` environment overrides
/// (nested keys separated by `__`, e.g. `SIMPLISAFE_DEFAULTS__LOG_JSON`).
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("SIMPLISAFE_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

/// Give the profile a device id if it has none. Returns `true` when one
/// was generated and the config should be saved.
pub fn ensure_device_id(profile: &mut Profile) -> bool {
    if profile.device_id.is_some() {
        return false;
    }
    profile.device_id = Some(uuid::Uuid::new_v4().to_string());
    true
}

// ── Password resolution ─────────────────────────────────────────────

/// Resolve the account password: env var, then keyring, then plaintext.
pub fn resolve_password(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    // 1. Env var
    if let Ok(pw) = std::env::var("SIMPLISAFE_PASSWORD") {
        return Ok(SecretString::from(pw));
    }

    // 2. Keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/password")) {
        if let Ok(pw) = entry.get_password() {
            return Ok(SecretString::from(pw));
        }
    }

    // 3. Plaintext in config
    if let Some(ref pw) = profile.password {
        return Ok(SecretString::from(pw.clone()));
    }

    Err(ConfigError::NoPassword {
        profile: profile_name.into(),
    })
}

// ── SessionConfig translation ───────────────────────────────────────

fn parse_duration(field: &str, value: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(value).map_err(|e| ConfigError::Validation {
        field: field.into(),
        reason: format!("'{value}': {e}"),
    })
}

/// Build a `SessionConfig` from a profile plus global defaults.
pub fn profile_to_session_config(
    profile: &Profile,
    defaults: &Defaults,
) -> Result<SessionConfig, ConfigError> {
    let mut config = SessionConfig::default();

    if let Some(ref base) = profile.base_url {
        let parsed = url::Url::parse(base).map_err(|e| ConfigError::Validation {
            field: "base_url".into(),
            reason: format!("'{base}': {e}"),
        })?;
        config.endpoints = Endpoints::with_base(parsed.as_str());
    }
    if let Some(ref client_id) = profile.client_id {
        config.client_id.clone_from(client_id);
    }
    if let Some(ref device_id) = profile.device_id {
        config.device_id.clone_from(device_id);
    }
    if let Some(ref source) = profile.event_source {
        config.event_source =
            source
                .parse::<EventSource>()
                .map_err(|_| ConfigError::Validation {
                    field: "event_source".into(),
                    reason: format!("expected 'push', 'poll', or 'disabled', got '{source}'"),
                })?;
    }

    let timeout = profile.timeout.as_deref().unwrap_or(&defaults.timeout);
    config.timeout = parse_duration("timeout", timeout)?;

    if let Some(ref interval) = profile.poll_interval {
        config.poll_interval = parse_duration("poll_interval", interval)?;
    }
    if let Some(ref interval) = profile.refresh_interval {
        config.refresh_interval = Some(parse_duration("refresh_interval", interval)?);
    }
    if let Some(capacity) = profile.dedup_capacity {
        if capacity == 0 {
            return Err(ConfigError::Validation {
                field: "dedup_capacity".into(),
                reason: "must be at least 1".into(),
            });
        }
        config.dedup_capacity = capacity;
    }

    Ok(config)
}
