//! Errors - エラー型と分類
//!
//! 設定レベルのエラーはサイクル全体を中断します。
//! 型レベル・インスタンスレベルのエラーは CycleReport に記録され、
//! サイクル自体は成功として扱われます。

use serde::Serialize;
use thiserror::Error;

use super::instance::InstanceRef;
use super::type_descriptor::TypeDescriptor;

/// ErrorKind は運用上の分類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Aborts the whole cycle; retry after the short backoff.
    Config,
    /// Isolated to one type's sub-scan.
    Type,
    /// Isolated to one instance.
    Instance,
    /// The caller abandoned the cycle.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "error", rename_all = "snake_case")]
pub enum ReaperError {
    #[error("configuration {namespace}/{name} not found")]
    ConfigNotFound { namespace: String, name: String },

    #[error("failed to fetch configuration {namespace}/{name}: {reason}")]
    ConfigUnavailable {
        namespace: String,
        name: String,
        reason: String,
    },

    #[error("configuration {name} is malformed: {reason}")]
    ConfigMalformed { name: String, reason: String },

    #[error("store unavailable while listing {descriptor}: {reason}")]
    StoreUnavailable {
        descriptor: TypeDescriptor,
        reason: String,
    },

    #[error("invalid TTL value on {instance}: {reason}")]
    InstanceUnparseable {
        instance: InstanceRef,
        reason: String,
    },

    #[error("failed to delete {instance} ({descriptor}): {reason}")]
    DeleteFailed {
        descriptor: TypeDescriptor,
        instance: InstanceRef,
        reason: String,
    },

    #[error("reap cycle cancelled")]
    Cancelled,
}

impl ReaperError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReaperError::ConfigNotFound { .. }
            | ReaperError::ConfigUnavailable { .. }
            | ReaperError::ConfigMalformed { .. } => ErrorKind::Config,
            ReaperError::StoreUnavailable { .. } => ErrorKind::Type,
            ReaperError::InstanceUnparseable { .. } | ReaperError::DeleteFailed { .. } => {
                ErrorKind::Instance
            }
            ReaperError::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Only configuration errors abort a cycle.
    pub fn aborts_cycle(&self) -> bool {
        self.kind() == ErrorKind::Config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_config_errors_abort() {
        let not_found = ReaperError::ConfigNotFound {
            namespace: "ops".into(),
            name: "cfg".into(),
        };
        let unavailable = ReaperError::StoreUnavailable {
            descriptor: TypeDescriptor::new("", "v1", "Secret"),
            reason: "connection refused".into(),
        };
        let delete = ReaperError::DeleteFailed {
            descriptor: TypeDescriptor::new("", "v1", "Secret"),
            instance: InstanceRef::new("ops", "a"),
            reason: "forbidden".into(),
        };

        assert!(not_found.aborts_cycle());
        assert!(!unavailable.aborts_cycle());
        assert!(!delete.aborts_cycle());
        assert_eq!(ReaperError::Cancelled.kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn messages_name_the_object() {
        let err = ReaperError::DeleteFailed {
            descriptor: TypeDescriptor::new("", "v1", "Secret"),
            instance: InstanceRef::new("ops", "a"),
            reason: "forbidden".into(),
        };
        assert_eq!(
            err.to_string(),
            "failed to delete ops/a (v1, Kind=Secret): forbidden"
        );
    }
}
