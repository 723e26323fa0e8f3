//! Application layer - ports を組み合わせたユースケース
//!
//! - **ConfigSource**: 設定レコードの取得とデコード
//! - **TypeScanner**: 型ごとのラベル付きインスタンス列挙
//! - **Reaper**: 1 サイクル分の判定と削除
//! - **ReaperDriver**: サイクルの繰り返しと停止

pub mod config_source;
pub mod driver;
pub mod reaper;
pub mod scanner;

pub use self::config_source::ConfigSource;
pub use self::driver::{CycleResult, ReaperDriver};
pub use self::reaper::Reaper;
pub use self::scanner::TypeScanner;
