//! ttlreaper-core
//!
//! Core building blocks for the TTL reaper: instances carrying a TTL label are
//! deleted once `now > creationTimestamp + ttl`.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（type descriptor, instance, duration, config, decision, report, errors, events）
//! - **ports**: 抽象化レイヤー（ObjectStore, ConfigStore, ConfigWatch, EventSink, Clock, IdGenerator）
//! - **app**: アプリケーションロジック（ConfigSource, TypeScanner, Reaper, ReaperDriver）
//! - **impls**: 実装（InMemoryObjectStore, InMemoryConfigStore, StoreSnapshot など開発用）
//! - **settings**: プロセス設定（ReaperSettings）
//! - **observability**: ログ初期化とサイクル集計

pub mod app;
pub mod domain;
pub mod impls;
pub mod observability;
pub mod ports;
pub mod settings;

pub use app::{Reaper, ReaperDriver};
pub use domain::{CycleReport, ReaperError};
pub use settings::ReaperSettings;
