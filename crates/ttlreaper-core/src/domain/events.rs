//! Events - オペレーター向けに記録するイベント
//!
//! 設定レコードや削除対象のオブジェクトに紐づけて記録されます。
//! EventSink port を通して送信されます。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::EventId;
use super::instance::InstanceRef;
use super::type_descriptor::TypeDescriptor;

/// Severity of a recorded event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    Normal,
    Warning,
}

/// Stable machine-readable reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventReason {
    /// The configuration record decoded successfully.
    ValidConfig,
    /// The configuration record could not be decoded.
    InvalidConfig,
    /// An instance carries a TTL marker that is not a duration.
    #[serde(rename = "InvalidTTL")]
    InvalidTtl,
    /// An expired instance was deleted.
    #[serde(rename = "ReapedOnTTL")]
    ReapedOnTtl,
    /// Deleting an expired instance failed.
    ReapFailed,
}

impl EventReason {
    pub fn event_type(self) -> EventType {
        match self {
            EventReason::ValidConfig | EventReason::ReapedOnTtl => EventType::Normal,
            EventReason::InvalidConfig | EventReason::InvalidTtl | EventReason::ReapFailed => {
                EventType::Warning
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EventReason::ValidConfig => "ValidConfig",
            EventReason::InvalidConfig => "InvalidConfig",
            EventReason::InvalidTtl => "InvalidTTL",
            EventReason::ReapedOnTtl => "ReapedOnTTL",
            EventReason::ReapFailed => "ReapFailed",
        }
    }
}

/// The object an event is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventSubject {
    ConfigRecord { namespace: String, name: String },
    Instance {
        descriptor: TypeDescriptor,
        instance: InstanceRef,
    },
}

/// ReaperEvent は記録されるイベント
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaperEvent {
    pub id: EventId,
    pub reason: EventReason,
    pub event_type: EventType,
    pub subject: EventSubject,
    pub message: String,
    pub recorded_at: DateTime<Utc>,
}

impl ReaperEvent {
    pub fn new(
        id: EventId,
        reason: EventReason,
        subject: EventSubject,
        message: impl Into<String>,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            reason,
            event_type: reason.event_type(),
            subject,
            message: message.into(),
            recorded_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reasons_serialize_with_their_wire_names() {
        for reason in [
            EventReason::ValidConfig,
            EventReason::InvalidConfig,
            EventReason::InvalidTtl,
            EventReason::ReapedOnTtl,
            EventReason::ReapFailed,
        ] {
            let s = serde_json::to_string(&reason).unwrap();
            assert_eq!(s, format!("\"{}\"", reason.as_str()));
        }
    }

    #[test]
    fn warnings_are_classified() {
        assert_eq!(EventReason::ReapedOnTtl.event_type(), EventType::Normal);
        assert_eq!(EventReason::ReapFailed.event_type(), EventType::Warning);
        assert_eq!(EventReason::InvalidTtl.event_type(), EventType::Warning);
    }
}
