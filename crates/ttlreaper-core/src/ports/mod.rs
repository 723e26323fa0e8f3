//! Ports - 抽象化レイヤー
//!
//! このモジュールは Hexagonal Architecture の「ポート」を定義します。
//! 各 trait はホスト側の基盤（オブジェクトストア、設定レコード、
//! 変更通知、イベント記録）へのインターフェースを提供します。
//!
//! # 設計原則
//! - コアは永続状態を持たない（すべて外部のストアにある）
//! - 各サイクルは現在の外部状態だけから計算できる

pub mod clock;
pub mod config_store;
pub mod config_watch;
pub mod event_sink;
pub mod id_generator;
pub mod object_store;

// 主要な trait を再エクスポート
pub use self::clock::{Clock, FixedClock, ManualClock, SystemClock};
pub use self::config_store::ConfigStore;
pub use self::config_watch::{ConfigChange, ConfigChangePredicate, ConfigWatch};
pub use self::event_sink::{EventSink, NoopEventSink};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::object_store::{ListFilter, ObjectStore, StoreError};
