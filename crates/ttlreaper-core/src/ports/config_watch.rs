//! ConfigWatch port - 設定レコードの変更通知
//!
//! 変更の監視はホスト側の機能です。コアは通知を受け取るだけで、
//! 監視の仕組み自体は実装しません。

use async_trait::async_trait;

/// A change notification for one configuration record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigChange {
    pub namespace: String,
    pub name: String,
    pub resource_version: u64,
}

/// Decides which notifications trigger a cycle.
///
/// Only the named record in the operator namespace counts, and only when its
/// resource version moved.
#[derive(Debug, Clone)]
pub struct ConfigChangePredicate {
    namespace: String,
    name: String,
    last_seen: Option<u64>,
}

impl ConfigChangePredicate {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            last_seen: None,
        }
    }

    /// Returns true if `change` should trigger a cycle, remembering its version.
    pub fn accept(&mut self, change: &ConfigChange) -> bool {
        if change.namespace != self.namespace || change.name != self.name {
            return false;
        }
        if self.last_seen == Some(change.resource_version) {
            return false;
        }
        self.last_seen = Some(change.resource_version);
        true
    }
}

/// ConfigWatch は変更イベントのストリーム
#[async_trait]
pub trait ConfigWatch: Send {
    /// Waits for the next change. `None` means the watch is closed.
    async fn next_change(&mut self) -> Option<ConfigChange>;
}
