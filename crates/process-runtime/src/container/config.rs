//! # Worker Configuration
//!
//! Everything the worker reads once at startup.
//!
//! ## Sources (later wins)
//!
//! 1. `WorkerConfig::default()`
//! 2. JSON file named by `PM_CONFIG_FILE`, if set
//! 3. `PM_*` environment variables
//!
//! | Variable | Field |
//! |----------|-------|
//! | `PM_TARGET_SYSTEM` | `target_system` |
//! | `PM_EVENT_TYPES` | `event_types` (comma separated) |
//! | `PM_INBOX_URI` | `inbox_uri` |
//! | `PM_CONNECTION_NAME` | `connection_name` |
//! | `PM_STEP_TIMEOUT_SECS` | `step_timeout_secs` (0 disables) |
//! | `PM_DRAIN_POLICY` | `drain_policy` (`drain` / `discard`) |
//! | `PM_CHANNEL_CAPACITY` | `channel_capacity` |
//! | `PM_LOG_LEVEL` | `log_level` |

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use shared_bus::{EventTypeId, DEFAULT_CHANNEL_CAPACITY};
use thiserror::Error;
use tracing::info;

use crate::bootstrap::BootstrapOptions;
use crate::filter::TargetDescriptor;
use crate::pump::DrainPolicy;

/// Environment variable naming an optional JSON config file.
pub const CONFIG_FILE_ENV: &str = "PM_CONFIG_FILE";

/// Events the process-management worker follows by default.
pub const DEFAULT_EVENT_TYPES: [&str; 3] = [
    "ordering.OrderCreated",
    "invoicing.InvoiceCreated",
    "email.EMailSent",
];

/// Process that handles the default events.
pub const DEFAULT_PROCESS: &str = "OrderProcess";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("Failed to read config file {path}: {source}")]
    Io {
        /// File that was read.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid JSON for [`WorkerConfig`].
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        /// File that was parsed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// An environment override could not be parsed.
    #[error("Invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        /// Variable name.
        key: &'static str,
        /// Raw value.
        value: String,
        /// What was wrong with it.
        reason: String,
    },

    /// The assembled configuration is unusable.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Complete worker configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Subsystem this worker claims envelopes for.
    pub target_system: TargetDescriptor,
    /// Event types to subscribe to, in registration order.
    pub event_types: Vec<EventTypeId>,
    /// Inbox the subscriptions deliver to.
    pub inbox_uri: String,
    /// Connection name handed to the data-access registrations.
    pub connection_name: String,
    /// Message type → process name.
    pub process_mappings: BTreeMap<String, String>,
    /// Per-step bootstrap timeout in seconds. 0 waits indefinitely.
    pub step_timeout_secs: u64,
    /// What happens to buffered envelopes at shutdown.
    pub drain_policy: DrainPolicy,
    /// Transport channel capacity.
    pub channel_capacity: usize,
    /// Default log filter when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        let event_types: Vec<EventTypeId> = DEFAULT_EVENT_TYPES
            .iter()
            .filter_map(|name| EventTypeId::new(*name))
            .collect();
        let process_mappings = event_types
            .iter()
            .map(|event| (event.as_str().to_string(), DEFAULT_PROCESS.to_string()))
            .collect();

        Self {
            target_system: TargetDescriptor::default(),
            event_types,
            inbox_uri: "memory://process-management/inbox".to_string(),
            connection_name: "ProcessManagement".to_string(),
            process_mappings,
            step_timeout_secs: 30,
            drain_policy: DrainPolicy::default(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            log_level: "info".to_string(),
        }
    }
}

impl WorkerConfig {
    /// Load from the process environment: defaults, then `PM_CONFIG_FILE`,
    /// then `PM_*` overrides. The result is validated.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`WorkerConfig::load`], reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup(CONFIG_FILE_ENV) {
            Some(path) if !path.trim().is_empty() => Self::from_json_file(path.trim())?,
            _ => Self::default(),
        };
        config.apply_overrides(lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by `PM_*` variables only.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON file. Missing fields keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "Loaded worker config file");
        Ok(config)
    }

    /// Apply `PM_*` overrides read through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("PM_TARGET_SYSTEM") {
            self.target_system =
                TargetDescriptor::new(&value).map_err(|e| ConfigError::InvalidValue {
                    key: "PM_TARGET_SYSTEM",
                    value: value.clone(),
                    reason: e.to_string(),
                })?;
        }

        if let Some(value) = lookup("PM_EVENT_TYPES") {
            self.event_types = value
                .split(',')
                .map(str::trim)
                .filter_map(EventTypeId::new)
                .collect();
            if self.event_types.is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: "PM_EVENT_TYPES",
                    value,
                    reason: "no event types listed".to_string(),
                });
            }
        }

        if let Some(value) = lookup("PM_INBOX_URI") {
            self.inbox_uri = value;
        }
        if let Some(value) = lookup("PM_CONNECTION_NAME") {
            self.connection_name = value;
        }

        if let Some(value) = lookup("PM_STEP_TIMEOUT_SECS") {
            self.step_timeout_secs = parse_number("PM_STEP_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = lookup("PM_DRAIN_POLICY") {
            self.drain_policy = value
                .parse()
                .map_err(|reason| ConfigError::InvalidValue {
                    key: "PM_DRAIN_POLICY",
                    value: value.clone(),
                    reason,
                })?;
        }

        if let Some(value) = lookup("PM_CHANNEL_CAPACITY") {
            self.channel_capacity = parse_number("PM_CHANNEL_CAPACITY", &value)?;
        }

        if let Some(value) = lookup("PM_LOG_LEVEL") {
            self.log_level = value;
        }

        Ok(())
    }

    /// Check the assembled configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.event_types.is_empty() {
            return Err(ConfigError::Invalid("event_types must not be empty".into()));
        }
        if self.inbox_uri.trim().is_empty() {
            return Err(ConfigError::Invalid("inbox_uri must not be blank".into()));
        }
        if self.connection_name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "connection_name must not be blank".into(),
            ));
        }
        if self.channel_capacity == 0 {
            return Err(ConfigError::Invalid(
                "channel_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// The per-step timeout, `None` when disabled.
    #[must_use]
    pub fn step_timeout(&self) -> Option<Duration> {
        (self.step_timeout_secs > 0).then(|| Duration::from_secs(self.step_timeout_secs))
    }

    /// Bootstrap tunables derived from this config.
    #[must_use]
    pub fn bootstrap_options(&self) -> BootstrapOptions {
        BootstrapOptions {
            step_timeout: self.step_timeout(),
            drain_policy: self.drain_policy,
        }
    }
}

fn parse_number<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidValue {
            key,
            value: value.to_string(),
            reason: e.to_string(),
        })
}
