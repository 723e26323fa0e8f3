//! EventSink の実装
//!
//! - **TracingEventSink**: tracing にイベントを出力（本番用）
//! - **RecordingEventSink**: メモリに保持（テスト用）

use std::sync::{Arc, Mutex};

use crate::domain::{EventReason, EventSubject, EventType, ReaperEvent};
use crate::ports::EventSink;

/// Writes each event as a structured log line.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn record(&self, event: ReaperEvent) {
        let subject = match &event.subject {
            EventSubject::ConfigRecord { namespace, name } => format!("{namespace}/{name}"),
            EventSubject::Instance {
                descriptor,
                instance,
            } => format!("{descriptor} {instance}"),
        };
        match event.event_type {
            EventType::Normal => tracing::info!(
                event_id = %event.id,
                reason = event.reason.as_str(),
                subject = %subject,
                "{}",
                event.message
            ),
            EventType::Warning => tracing::warn!(
                event_id = %event.id,
                reason = event.reason.as_str(),
                subject = %subject,
                "{}",
                event.message
            ),
        }
    }
}

/// Keeps every event in memory, in record order.
#[derive(Debug, Clone, Default)]
pub struct RecordingEventSink {
    events: Arc<Mutex<Vec<ReaperEvent>>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ReaperEvent> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn with_reason(&self, reason: EventReason) -> Vec<ReaperEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.reason == reason)
            .collect()
    }
}

impl EventSink for RecordingEventSink {
    fn record(&self, event: ReaperEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
    }
}
