//! TypeDescriptor - スキャン対象のリソース型 (group, version, kind)
//!
//! スキャン対象の型は実行時に設定から与えられるため、
//! kind ごとの構造体ではなく、この 3 つ組で型を識別します。

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a resource schema in the object store.
///
/// `group` is empty for the core API group (e.g. `Secret`, `ConfigMap`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeDescriptor {
    #[serde(default)]
    pub group: String,
    pub version: String,
    pub kind: String,
}

impl TypeDescriptor {
    pub fn new(
        group: impl Into<String>,
        version: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            kind: kind.into(),
        }
    }

    /// `group/version` の形式（core group は `version` のみ）
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    /// A descriptor is usable only when version and kind are present.
    pub fn is_complete(&self) -> bool {
        !self.version.trim().is_empty() && !self.kind.trim().is_empty()
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, Kind={}", self.api_version(), self.kind)
    }
}
