//! ObjectStore port - 型付きオブジェクトの一覧・削除
//!
//! ホスト側のオーケストレーション基盤が提供するクライアントを抽象化します。
//! コアはこの accessor を生成も破棄もしません。

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{InstanceRef, ManagedInstance, TypeDescriptor};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Network, auth, or unknown-schema failures.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("{instance} not found")]
    NotFound { instance: InstanceRef },

    /// The store refused the operation (e.g. forbidden, conflict).
    #[error("rejected: {0}")]
    Rejected(String),
}

/// Server-side filter for `list`.
///
/// The reaper always lists with `HasLabel(marker)` so unmarked objects are
/// never transferred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListFilter {
    HasLabel(String),
}

impl ListFilter {
    pub fn has_label(key: impl Into<String>) -> Self {
        ListFilter::HasLabel(key.into())
    }

    pub fn matches(&self, instance: &ManagedInstance) -> bool {
        match self {
            ListFilter::HasLabel(key) => instance.has_label(key),
        }
    }
}

/// ObjectStore は実行時に指定された型のオブジェクトを扱う
///
/// # 設計原則
/// - 型は `TypeDescriptor` で指定（kind ごとの構造体は持たない）
/// - `list` は全 namespace を対象とする
/// - 返却順はストアの順序のまま処理される
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn list(
        &self,
        descriptor: &TypeDescriptor,
        filter: &ListFilter,
    ) -> Result<Vec<ManagedInstance>, StoreError>;

    async fn delete(
        &self,
        descriptor: &TypeDescriptor,
        instance: &InstanceRef,
    ) -> Result<(), StoreError>;
}
