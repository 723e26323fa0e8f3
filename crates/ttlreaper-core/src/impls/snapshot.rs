//! StoreSnapshot - in-memory ストアの初期状態を YAML/JSON で記述
//!
//! CLI はこのファイルからストアを組み立て、サイクル後の状態を書き戻せます。

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{InMemoryConfigStore, InMemoryObjectStore};
use crate::domain::{ConfigRecord, ManagedInstance, TypeDescriptor};

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to read snapshot {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse snapshot {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("failed to encode snapshot: {0}")]
    Encode(#[from] serde_yaml::Error),
}

/// All instances of one type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeBucket {
    #[serde(rename = "type")]
    pub descriptor: TypeDescriptor,

    #[serde(default)]
    pub items: Vec<ManagedInstance>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(default)]
    pub configs: Vec<ConfigRecord>,

    #[serde(default)]
    pub objects: Vec<TypeBucket>,
}

impl StoreSnapshot {
    pub fn from_yaml(raw: &str, origin: &str) -> Result<Self, SnapshotError> {
        serde_yaml::from_str(raw).map_err(|source| SnapshotError::Parse {
            path: origin.to_string(),
            source,
        })
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| SnapshotError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&raw, &path.display().to_string())
    }

    pub fn to_yaml(&self) -> Result<String, SnapshotError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Builds the in-memory adapters. Every listed type is registered, even empty ones.
    pub fn into_stores(self) -> (InMemoryConfigStore, InMemoryObjectStore) {
        let configs = InMemoryConfigStore::seeded(self.configs);
        let objects = InMemoryObjectStore::seeded(
            self.objects
                .into_iter()
                .map(|bucket| (bucket.descriptor, bucket.items)),
        );
        (configs, objects)
    }

    /// Captures the current state of both adapters.
    pub async fn capture(configs: &InMemoryConfigStore, objects: &InMemoryObjectStore) -> Self {
        Self {
            configs: configs.records().await,
            objects: objects
                .buckets()
                .await
                .into_iter()
                .map(|(descriptor, items)| TypeBucket { descriptor, items })
                .collect(),
        }
    }
}
