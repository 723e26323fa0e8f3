//! Impls - ports の実装（開発用・テスト用）
//!
//! # 含まれる実装
//! - **InMemoryObjectStore**: 型ごとのバケットを持つオブジェクトストア
//! - **InMemoryConfigStore**: 変更通知付きの設定レコードストア
//! - **TracingEventSink / RecordingEventSink**: イベント記録
//! - **StoreSnapshot**: YAML からストアを組み立てる
//!
//! # 本番用実装
//! 実際のクラスタ API クライアントはホスト側が ObjectStore / ConfigStore /
//! ConfigWatch を実装して注入します。

pub mod events;
pub mod inmem_config;
pub mod inmem_store;
pub mod snapshot;

// 主要な型を再エクスポート
pub use self::events::{RecordingEventSink, TracingEventSink};
pub use self::inmem_config::{InMemoryConfigStore, InMemoryConfigWatch};
pub use self::inmem_store::InMemoryObjectStore;
pub use self::snapshot::{SnapshotError, StoreSnapshot, TypeBucket};
