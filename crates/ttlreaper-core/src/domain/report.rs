//! Cycle report: what one reap cycle did, including partial failures.
//!
//! Type-level and instance-level errors end up here instead of failing the
//! cycle. The caller reads `next_delay` to schedule the next trigger.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

use super::errors::ReaperError;
use super::ids::CycleId;
use super::instance::InstanceRef;
use super::state::CycleState;
use super::type_descriptor::TypeDescriptor;

fn serialize_millis<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

/// Totals for one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleCounts {
    pub types: usize,
    pub scanned: usize,
    pub not_expired: usize,
    pub deleted: usize,
    pub unparseable: usize,
    pub delete_failures: usize,
    pub type_failures: usize,
}

/// Result of processing one declared type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeReport {
    pub descriptor: TypeDescriptor,

    /// Marked instances returned by the store.
    pub scanned: usize,

    pub not_expired: usize,

    /// Deleted (or, in dry-run mode, selected for deletion) in store order.
    pub deleted: Vec<InstanceRef>,

    /// `InstanceUnparseable` and `DeleteFailed` errors, one per instance.
    pub instance_errors: Vec<ReaperError>,

    /// Set when the sub-scan was abandoned (`StoreUnavailable`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ReaperError>,
}

impl TypeReport {
    pub fn new(descriptor: TypeDescriptor) -> Self {
        Self {
            descriptor,
            scanned: 0,
            not_expired: 0,
            deleted: Vec::new(),
            instance_errors: Vec::new(),
            error: None,
        }
    }

    pub fn failed(descriptor: TypeDescriptor, error: ReaperError) -> Self {
        Self {
            error: Some(error),
            ..Self::new(descriptor)
        }
    }
}

/// Report for a cycle that got past configuration loading.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleReport {
    pub cycle_id: CycleId,

    /// `Done` or `Cancelled`.
    pub state: CycleState,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    /// The configured poll interval.
    #[serde(rename = "next_delay_ms", serialize_with = "serialize_millis")]
    pub next_delay: Duration,

    pub dry_run: bool,

    /// One entry per processed type, in declared order.
    pub types: Vec<TypeReport>,
}

impl CycleReport {
    pub fn is_done(&self) -> bool {
        self.state == CycleState::Done
    }

    /// Per-type errors (abandoned sub-scans).
    pub fn type_errors(&self) -> impl Iterator<Item = &ReaperError> {
        self.types.iter().filter_map(|t| t.error.as_ref())
    }

    /// Per-instance errors across all types.
    pub fn instance_errors(&self) -> impl Iterator<Item = &ReaperError> {
        self.types.iter().flat_map(|t| t.instance_errors.iter())
    }

    /// Every deleted instance with its type.
    pub fn deleted(&self) -> impl Iterator<Item = (&TypeDescriptor, &InstanceRef)> {
        self.types
            .iter()
            .flat_map(|t| t.deleted.iter().map(move |i| (&t.descriptor, i)))
    }

    pub fn has_partial_failures(&self) -> bool {
        self.type_errors().next().is_some() || self.instance_errors().next().is_some()
    }

    pub fn counts(&self) -> CycleCounts {
        let mut counts = CycleCounts {
            types: self.types.len(),
            ..CycleCounts::default()
        };
        for t in &self.types {
            counts.scanned += t.scanned;
            counts.not_expired += t.not_expired;
            counts.deleted += t.deleted.len();
            if t.error.is_some() {
                counts.type_failures += 1;
            }
            for e in &t.instance_errors {
                match e {
                    ReaperError::InstanceUnparseable { .. } => counts.unparseable += 1,
                    ReaperError::DeleteFailed { .. } => counts.delete_failures += 1,
                    _ => {}
                }
            }
        }
        counts
    }
}
