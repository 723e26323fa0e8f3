//! ConfigSource - 設定レコードを読み込んで ReaperConfig にデコード
//!
//! 副作用は読み込みのみです。サイクルごとに毎回読み直します。

use std::sync::Arc;

use crate::domain::{ConfigRecord, ReaperConfig, ReaperError};
use crate::ports::{ConfigStore, StoreError};

pub struct ConfigSource {
    store: Arc<dyn ConfigStore>,
    namespace: String,
}

impl ConfigSource {
    pub fn new(store: Arc<dyn ConfigStore>, namespace: impl Into<String>) -> Self {
        Self {
            store,
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Fetches the raw record.
    pub async fn fetch(&self, name: &str) -> Result<ConfigRecord, ReaperError> {
        let not_found = || ReaperError::ConfigNotFound {
            namespace: self.namespace.clone(),
            name: name.to_string(),
        };
        match self.store.get(&self.namespace, name).await {
            Ok(Some(record)) => Ok(record),
            Ok(None) | Err(StoreError::NotFound { .. }) => Err(not_found()),
            Err(e) => Err(ReaperError::ConfigUnavailable {
                namespace: self.namespace.clone(),
                name: name.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    /// Fetches and decodes the record named `name`.
    pub async fn load(&self, name: &str) -> Result<ReaperConfig, ReaperError> {
        let record = self.fetch(name).await?;
        ReaperConfig::decode(&record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CHECK_INTERVAL_KEY, GVK_LIST_KEY, TypeDescriptor};
    use crate::impls::InMemoryConfigStore;
    use std::time::Duration;

    fn source(store: &InMemoryConfigStore) -> ConfigSource {
        ConfigSource::new(Arc::new(store.clone()), "ttlreaper-system")
    }

    #[tokio::test]
    async fn loads_named_record_from_namespace() {
        let store = InMemoryConfigStore::new();
        store
            .put(
                ConfigRecord::new("ttlreaper-system", "cfg")
                    .with_entry(CHECK_INTERVAL_KEY, "5s")
                    .with_entry(GVK_LIST_KEY, "- {group: '', version: v1, kind: Secret}"),
            )
            .await;

        let config = source(&store).load("cfg").await.unwrap();
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(
            config.watched_types,
            vec![TypeDescriptor::new("", "v1", "Secret")]
        );
    }

    #[tokio::test]
    async fn record_in_other_namespace_is_not_found() {
        let store = InMemoryConfigStore::new();
        store
            .put(ConfigRecord::new("default", "cfg").with_entry(CHECK_INTERVAL_KEY, "5s"))
            .await;

        let err = source(&store).load("cfg").await.unwrap_err();
        assert_eq!(
            err,
            ReaperError::ConfigNotFound {
                namespace: "ttlreaper-system".into(),
                name: "cfg".into()
            }
        );
    }

    #[tokio::test]
    async fn store_failure_is_config_unavailable() {
        let store = InMemoryConfigStore::new();
        store.set_unavailable(Some("apiserver down".into())).await;

        let err = source(&store).load("cfg").await.unwrap_err();
        assert!(matches!(err, ReaperError::ConfigUnavailable { .. }));
        assert!(err.aborts_cycle());
    }

    #[tokio::test]
    async fn malformed_record_is_reported() {
        let store = InMemoryConfigStore::new();
        store
            .put(ConfigRecord::new("ttlreaper-system", "cfg").with_entry(GVK_LIST_KEY, "[]"))
            .await;

        let err = source(&store).load("cfg").await.unwrap_err();
        assert!(matches!(err, ReaperError::ConfigMalformed { .. }));
    }
}
