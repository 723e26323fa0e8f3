//! Domain model (type descriptors, instances, config, decisions, reports, ...).
//!
//! ドメイン層は外部システムに依存しません。
//! 時刻は引数として受け取り、I/O は ports 経由で行います。

pub mod config;
pub mod decision;
pub mod duration;
pub mod errors;
pub mod events;
pub mod ids;
pub mod instance;
pub mod report;
pub mod state;
pub mod type_descriptor;

pub use config::{CHECK_INTERVAL_KEY, ConfigRecord, GVK_LIST_KEY, ReaperConfig};
pub use decision::{ExpiryDecision, ExpiryEvaluator, ExpiryOutcome};
pub use duration::{DurationError, parse_duration, parse_positive_duration};
pub use errors::{ErrorKind, ReaperError};
pub use events::{EventReason, EventSubject, EventType, ReaperEvent};
pub use ids::{CycleId, EventId};
pub use instance::{InstanceRef, ManagedInstance};
pub use report::{CycleCounts, CycleReport, TypeReport};
pub use state::CycleState;
pub use type_descriptor::TypeDescriptor;
