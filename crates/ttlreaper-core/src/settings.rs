//! Process settings for the reaper.
//!
//! These are fixed for the life of the process (which record to read, which
//! label marks an instance). The per-cycle `ReaperConfig` lives in the
//! external configuration record instead.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::domain::parse_positive_duration;

pub const DEFAULT_TTL_LABEL: &str = "kubettlreaper.samir.io/ttl";
pub const DEFAULT_CONFIGURATION_NAME: &str = "ttlreaper-config";
pub const DEFAULT_CONFIG_RETRY_BACKOFF: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid settings: {0}")]
    Invalid(String),
}

fn default_configuration_name() -> String {
    DEFAULT_CONFIGURATION_NAME.to_string()
}

fn default_ttl_label() -> String {
    DEFAULT_TTL_LABEL.to_string()
}

fn default_config_retry_backoff() -> Duration {
    DEFAULT_CONFIG_RETRY_BACKOFF
}

fn deserialize_duration<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
    let raw = String::deserialize(d)?;
    parse_positive_duration(&raw).map_err(serde::de::Error::custom)
}

/// Largest unit that divides the duration exactly, so `from_yaml` reads back the same value.
fn format_duration(d: &Duration) -> String {
    const UNITS: [(u128, &str); 3] = [(1_000_000_000, "s"), (1_000_000, "ms"), (1_000, "us")];
    let nanos = d.as_nanos();
    for (per_unit, unit) in UNITS {
        if nanos % per_unit == 0 {
            return format!("{}{unit}", nanos / per_unit);
        }
    }
    format!("{nanos}ns")
}

fn serialize_duration<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&format_duration(d))
}

/// ReaperSettings はプロセス全体の設定
///
/// 環境変数を都度読むのではなく、この値を Reaper のコンストラクタに渡します。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ReaperSettings {
    /// Namespace holding the configuration record.
    pub namespace: String,

    #[serde(default = "default_configuration_name")]
    pub configuration_name: String,

    /// Label key whose value is the TTL duration.
    #[serde(default = "default_ttl_label")]
    pub ttl_label: String,

    /// Delay before retrying after a cycle aborted on configuration errors.
    #[serde(
        default = "default_config_retry_backoff",
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub config_retry_backoff: Duration,

    /// Report expired instances without deleting them.
    #[serde(default)]
    pub dry_run: bool,
}

impl ReaperSettings {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            configuration_name: default_configuration_name(),
            ttl_label: default_ttl_label(),
            config_retry_backoff: DEFAULT_CONFIG_RETRY_BACKOFF,
            dry_run: false,
        }
    }

    pub fn with_configuration_name(mut self, name: impl Into<String>) -> Self {
        self.configuration_name = name.into();
        self
    }

    pub fn with_ttl_label(mut self, label: impl Into<String>) -> Self {
        self.ttl_label = label.into();
        self
    }

    pub fn with_config_retry_backoff(mut self, backoff: Duration) -> Self {
        self.config_retry_backoff = backoff;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn from_yaml(raw: &str) -> Result<Self, SettingsError> {
        let settings: Self = serde_yaml::from_str(raw)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&raw)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.namespace.trim().is_empty() {
            return Err(SettingsError::Invalid("namespace must not be empty".into()));
        }
        if self.configuration_name.trim().is_empty() {
            return Err(SettingsError::Invalid(
                "configuration-name must not be empty".into(),
            ));
        }
        if self.ttl_label.trim().is_empty() {
            return Err(SettingsError::Invalid("ttl-label must not be empty".into()));
        }
        if self.config_retry_backoff.is_zero() {
            return Err(SettingsError::Invalid(
                "config-retry-backoff must be positive".into(),
            ));
        }
        Ok(())
    }
}
