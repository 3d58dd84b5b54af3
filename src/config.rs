//! Configuration loading and validation.
//!
//! Loads `toleration-defaults.toml` (or `$TOLERATION_DEFAULTS_CONFIG`).
//! Every section uses `#[serde(default)]` so an empty file is valid.
//!
//! Precedence: env vars > config file > defaults.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::admission::plugin::{DecodeErrorPolicy, DefaultTolerationSeconds};
use crate::api::pod::TolerationStorage;
use crate::reconciler::{GracePeriods, ToleranceReconciler, DEFAULT_TOLERATION_SECONDS};

/// Env var naming the config file.
pub const CONFIG_PATH_ENV: &str = "TOLERATION_DEFAULTS_CONFIG";

/// Config file used when nothing else is given.
pub const DEFAULT_CONFIG_FILE: &str = "toleration-defaults.toml";

/// Errors loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("failed to read config at {path}: {source}")]
    Read {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for this schema.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        /// File that failed.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: toml::de::Error,
    },

    /// A grace period is zero or negative.
    #[error("{field} must be a positive number of seconds, got {value}")]
    InvalidGracePeriod {
        /// Offending setting.
        field: &'static str,
        /// Offending value.
        value: i64,
    },

    /// Listen address does not parse.
    #[error("invalid server.listen_addr {0:?}")]
    InvalidListenAddr(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Defaulting behaviour.
    pub admission: AdmissionConfig,
    /// Webhook listener.
    pub server: ServerConfig,
    /// Log output.
    pub logging: LoggingConfig,
}

/// `[admission]` section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AdmissionConfig {
    /// Grace period for the not-ready toleration.
    pub default_not_ready_toleration_seconds: i64,
    /// Grace period for the unreachable toleration.
    pub default_unreachable_toleration_seconds: i64,
    /// Where to write tolerations for pods that store none.
    pub tolerations_storage: TolerationStorage,
    /// Handling of undecodable tolerations.
    pub on_decode_error: DecodeErrorPolicy,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            default_not_ready_toleration_seconds: DEFAULT_TOLERATION_SECONDS,
            default_unreachable_toleration_seconds: DEFAULT_TOLERATION_SECONDS,
            tolerations_storage: TolerationStorage::default(),
            on_decode_error: DecodeErrorPolicy::default(),
        }
    }
}

impl AdmissionConfig {
    /// Configured grace periods.
    pub fn grace_periods(&self) -> GracePeriods {
        GracePeriods {
            not_ready: self.default_not_ready_toleration_seconds,
            unreachable: self.default_unreachable_toleration_seconds,
        }
    }

    /// Build the plugin this section describes.
    pub fn plugin(&self) -> DefaultTolerationSeconds {
        DefaultTolerationSeconds::new(ToleranceReconciler::with_grace_periods(
            self.grace_periods(),
        ))
        .with_storage(self.tolerations_storage)
        .with_decode_error_policy(self.on_decode_error)
    }
}

/// `[server]` section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the webhook listens on.
    pub listen_addr: String,
    /// Seconds to let in-flight reviews finish after a shutdown signal.
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
        }
    }
}

impl ServerConfig {
    /// Drain window as a [`Duration`].
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// Parsed listen address.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.listen_addr
            .parse()
            .map_err(|_| ConfigError::InvalidListenAddr(self.listen_addr.clone()))
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory for rotated JSON logs. Console only when unset.
    pub logs_dir: Option<PathBuf>,
}

impl Config {
    /// Parse a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }

    /// Check invariants the reconciler relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let admission = &self.admission;
        for (field, value) in [
            (
                "admission.default_not_ready_toleration_seconds",
                admission.default_not_ready_toleration_seconds,
            ),
            (
                "admission.default_unreachable_toleration_seconds",
                admission.default_unreachable_toleration_seconds,
            ),
        ] {
            if value <= 0 {
                return Err(ConfigError::InvalidGracePeriod { field, value });
            }
        }
        self.server.socket_addr()?;
        Ok(())
    }

    /// Apply environment variable overrides.
    ///
    /// Takes a resolver function so tests need not touch the process env.
    pub fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(v) = env("TOLERATION_DEFAULTS_NOT_READY_SECONDS") {
            match v.parse() {
                Ok(n) => self.admission.default_not_ready_toleration_seconds = n,
                Err(_) => tracing::warn!(
                    var = "TOLERATION_DEFAULTS_NOT_READY_SECONDS",
                    value = %v,
                    "ignoring invalid env override"
                ),
            }
        }
        if let Some(v) = env("TOLERATION_DEFAULTS_UNREACHABLE_SECONDS") {
            match v.parse() {
                Ok(n) => self.admission.default_unreachable_toleration_seconds = n,
                Err(_) => tracing::warn!(
                    var = "TOLERATION_DEFAULTS_UNREACHABLE_SECONDS",
                    value = %v,
                    "ignoring invalid env override"
                ),
            }
        }
        if let Some(v) = env("TOLERATION_DEFAULTS_LISTEN_ADDR") {
            self.server.listen_addr = v;
        }
    }
}

/// Read and parse a config file without overrides or validation.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_owned(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_owned(),
        source,
    })
}

/// Resolve the config path: `explicit`, then `$TOLERATION_DEFAULTS_CONFIG`,
/// then `./toleration-defaults.toml`.
///
/// The flag reports whether the path was asked for rather than defaulted.
pub fn resolve_config_path(
    explicit: Option<&Path>,
    env: impl Fn(&str) -> Option<String>,
) -> (PathBuf, bool) {
    if let Some(path) = explicit {
        return (path.to_owned(), true);
    }
    if let Some(path) = env(CONFIG_PATH_ENV) {
        return (PathBuf::from(path), true);
    }
    (PathBuf::from(DEFAULT_CONFIG_FILE), false)
}

/// Load the effective config: file (if any), then env overrides, then
/// validation.
///
/// A missing file is an error only when its path was asked for.
pub fn load_effective(
    explicit: Option<&Path>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Config, ConfigError> {
    let (path, requested) = resolve_config_path(explicit, &env);
    let mut config = if requested || path.exists() {
        tracing::info!(path = %path.display(), "loading config from file");
        load_config(&path)?
    } else {
        tracing::info!("no config file found, using defaults");
        Config::default()
    };
    config.apply_overrides(&env);
    config.validate()?;
    Ok(config)
}

fn default_listen_addr() -> String {
    "0.0.0.0:8443".to_owned()
}

fn default_shutdown_timeout_secs() -> u64 {
    30
}
