//! EventSink port - イベント記録の抽象化
//!
//! # 実装
//! - NoopEventSink: 何もしない
//! - TracingEventSink: tracing に出力
//! - RecordingEventSink: メモリに保持（テスト用）

use crate::domain::ReaperEvent;

/// EventSink はオペレーター向けイベントを記録
///
/// 記録の失敗でサイクルを止めないよう、戻り値はありません。
pub trait EventSink: Send + Sync {
    fn record(&self, event: ReaperEvent);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn record(&self, _event: ReaperEvent) {}
}
