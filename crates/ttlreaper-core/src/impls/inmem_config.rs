//! InMemoryConfigStore - 開発・テスト用の設定レコードストア
//!
//! 書き込みのたびに resource_version を進め、
//! tokio::sync::watch で変更を通知します。

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, watch};

use crate::domain::ConfigRecord;
use crate::ports::{ConfigChange, ConfigStore, ConfigWatch, StoreError};

#[derive(Default)]
struct InMemoryConfigState {
    records: BTreeMap<(String, String), ConfigRecord>,
    next_version: u64,
    unavailable: Option<String>,
}

#[derive(Clone)]
pub struct InMemoryConfigStore {
    state: Arc<Mutex<InMemoryConfigState>>,
    changes: Arc<watch::Sender<Option<ConfigChange>>>,
}

impl Default for InMemoryConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryConfigStore {
    pub fn new() -> Self {
        Self::with_state(InMemoryConfigState::default())
    }

    fn with_state(state: InMemoryConfigState) -> Self {
        let (changes, _) = watch::channel(None);
        Self {
            state: Arc::new(Mutex::new(state)),
            changes: Arc::new(changes),
        }
    }

    /// Builds a store from records without publishing change notifications.
    pub fn seeded(records: impl IntoIterator<Item = ConfigRecord>) -> Self {
        let mut state = InMemoryConfigState::default();
        for mut record in records {
            state.next_version += 1;
            record.resource_version = state.next_version;
            state
                .records
                .insert((record.namespace.clone(), record.name.clone()), record);
        }
        Self::with_state(state)
    }

    /// Creates or replaces a record, bumps its resource version and notifies watchers.
    pub async fn put(&self, mut record: ConfigRecord) -> u64 {
        let change = {
            let mut state = self.state.lock().await;
            state.next_version += 1;
            record.resource_version = state.next_version;
            let change = ConfigChange {
                namespace: record.namespace.clone(),
                name: record.name.clone(),
                resource_version: record.resource_version,
            };
            state
                .records
                .insert((record.namespace.clone(), record.name.clone()), record);
            change
        };
        let version = change.resource_version;
        // 受信側がいなくても書き込み自体は成功
        self.changes.send_replace(Some(change));
        version
    }

    pub async fn remove(&self, namespace: &str, name: &str) -> Option<ConfigRecord> {
        let removed = {
            let mut state = self.state.lock().await;
            state.next_version += 1;
            let version = state.next_version;
            state
                .records
                .remove(&(namespace.to_string(), name.to_string()))
                .map(|r| (r, version))
        };
        let (record, version) = removed?;
        self.changes.send_replace(Some(ConfigChange {
            namespace: record.namespace.clone(),
            name: record.name.clone(),
            resource_version: version,
        }));
        Some(record)
    }

    /// Makes every `get` fail until cleared with `None`.
    pub async fn set_unavailable(&self, reason: Option<String>) {
        let mut state = self.state.lock().await;
        state.unavailable = reason;
    }

    pub async fn records(&self) -> Vec<ConfigRecord> {
        let state = self.state.lock().await;
        state.records.values().cloned().collect()
    }

    /// Subscribes to change notifications published after this call.
    pub fn subscribe(&self) -> InMemoryConfigWatch {
        InMemoryConfigWatch {
            rx: self.changes.subscribe(),
        }
    }
}

#[async_trait]
impl ConfigStore for InMemoryConfigStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<ConfigRecord>, StoreError> {
        let state = self.state.lock().await;
        if let Some(reason) = &state.unavailable {
            return Err(StoreError::Unavailable(reason.clone()));
        }
        Ok(state
            .records
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }
}

/// InMemoryConfigStore の変更通知
///
/// watch channel なので、連続した変更は最新の 1 件にまとめられます。
pub struct InMemoryConfigWatch {
    rx: watch::Receiver<Option<ConfigChange>>,
}

#[async_trait]
impl ConfigWatch for InMemoryConfigWatch {
    async fn next_change(&mut self) -> Option<ConfigChange> {
        loop {
            self.rx.changed().await.ok()?;
            let latest = self.rx.borrow_and_update().clone();
            if latest.is_some() {
                return latest;
            }
        }
    }
}
