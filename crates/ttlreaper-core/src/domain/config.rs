//! Reaper configuration: the external record and its decoded form.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::duration::parse_positive_duration;
use super::errors::ReaperError;
use super::type_descriptor::TypeDescriptor;

/// Key holding the poll interval (a duration string such as `"5s"`).
pub const CHECK_INTERVAL_KEY: &str = "check-interval";

/// Key holding the YAML sequence of `{group, version, kind}` triples.
pub const GVK_LIST_KEY: &str = "gvk-list";

/// The raw key/value configuration document as stored externally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigRecord {
    pub namespace: String,
    pub name: String,

    /// Bumped by the store on every write; used to filter no-op change notifications.
    #[serde(default)]
    pub resource_version: u64,

    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

impl ConfigRecord {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            resource_version: 0,
            data: BTreeMap::new(),
        }
    }

    pub fn with_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }
}

/// Decoded configuration for one cycle.
///
/// Decoded fresh on every cycle and discarded afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaperConfig {
    pub poll_interval: Duration,
    pub watched_types: Vec<TypeDescriptor>,
}

impl ReaperConfig {
    /// Decodes a configuration record.
    ///
    /// `check-interval` is required and must be a positive duration.
    /// `gvk-list` may be absent or blank, which yields an empty type list.
    pub fn decode(record: &ConfigRecord) -> Result<Self, ReaperError> {
        let malformed = |reason: String| ReaperError::ConfigMalformed {
            name: record.name.clone(),
            reason,
        };

        let interval = record
            .data
            .get(CHECK_INTERVAL_KEY)
            .ok_or_else(|| malformed(format!("{CHECK_INTERVAL_KEY} not found")))?;
        let poll_interval = parse_positive_duration(interval.trim())
            .map_err(|e| malformed(format!("invalid {CHECK_INTERVAL_KEY} value: {e}")))?;

        let watched_types = match record.data.get(GVK_LIST_KEY) {
            None => Vec::new(),
            Some(raw) if raw.trim().is_empty() => Vec::new(),
            Some(raw) => decode_gvk_list(raw)
                .map_err(|reason| malformed(format!("invalid {GVK_LIST_KEY}: {reason}")))?,
        };

        Ok(Self {
            poll_interval,
            watched_types,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.watched_types.is_empty()
    }
}

fn decode_gvk_list(raw: &str) -> Result<Vec<TypeDescriptor>, String> {
    let parsed: Option<Vec<TypeDescriptor>> =
        serde_yaml::from_str(raw).map_err(|e| e.to_string())?;
    let types = parsed.unwrap_or_default();

    if let Some((index, _)) = types.iter().enumerate().find(|(_, t)| !t.is_complete()) {
        return Err(format!("entry {index} is missing version or kind"));
    }
    Ok(types)
}
