//! Expiry decisions: whether a marked instance has outlived its TTL.
//!
//! The evaluator is a pure function of (instance, now). It never fails:
//! a malformed marker becomes an `Unparseable` outcome, not an error.

use chrono::{DateTime, Utc};

use super::duration::parse_duration;
use super::instance::{InstanceRef, ManagedInstance};

/// Outcome of evaluating one instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpiryOutcome {
    /// `now` is strictly after `expired_at`; the instance should be deleted.
    Expired { expired_at: DateTime<Utc> },

    /// Not yet eligible. `expires_at` is `None` when the instance carries no
    /// marker or the expiry instant is beyond the representable range.
    NotExpired { expires_at: Option<DateTime<Utc>> },

    /// The marker value is not a duration; the instance is skipped.
    Unparseable { reason: String },
}

impl ExpiryOutcome {
    pub fn is_expired(&self) -> bool {
        matches!(self, ExpiryOutcome::Expired { .. })
    }
}

/// Derived per cycle, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiryDecision {
    pub instance: InstanceRef,
    pub outcome: ExpiryOutcome,
}

/// Applies the single fixed rule: `creation_timestamp + ttl < now`.
#[derive(Debug, Clone)]
pub struct ExpiryEvaluator {
    ttl_label: String,
}

impl ExpiryEvaluator {
    pub fn new(ttl_label: impl Into<String>) -> Self {
        Self {
            ttl_label: ttl_label.into(),
        }
    }

    pub fn ttl_label(&self) -> &str {
        &self.ttl_label
    }

    /// Evaluates one instance against `now`.
    ///
    /// The boundary instant itself is not expired: eligibility starts strictly
    /// after `creation_timestamp + ttl`.
    pub fn evaluate(&self, instance: &ManagedInstance, now: DateTime<Utc>) -> ExpiryOutcome {
        let Some(raw) = instance.label(&self.ttl_label) else {
            return ExpiryOutcome::NotExpired { expires_at: None };
        };

        let ttl = match parse_duration(raw) {
            Ok(ttl) => ttl,
            Err(e) => {
                return ExpiryOutcome::Unparseable {
                    reason: e.to_string(),
                };
            }
        };

        match instance.creation_timestamp.checked_add_signed(ttl) {
            Some(expired_at) if now > expired_at => ExpiryOutcome::Expired { expired_at },
            Some(expires_at) => ExpiryOutcome::NotExpired {
                expires_at: Some(expires_at),
            },
            None => ExpiryOutcome::NotExpired { expires_at: None },
        }
    }

    pub fn decide(&self, instance: &ManagedInstance, now: DateTime<Utc>) -> ExpiryDecision {
        ExpiryDecision {
            instance: instance.id.clone(),
            outcome: self.evaluate(instance, now),
        }
    }
}
