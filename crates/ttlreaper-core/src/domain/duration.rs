//! Duration strings (`"10s"`, `"1h30m"`, `"1.5h"`, `"-5m"`).
//!
//! Both the TTL marker and `check-interval` use this grammar:
//! an optional sign followed by one or more `<decimal><unit>` groups.
//! Valid units are `ns`, `us` (`µs`, `μs`), `ms`, `s`, `m`, `h`.
//! A bare `0` is accepted without a unit.

use chrono::TimeDelta;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DurationError {
    #[error("invalid duration {0:?}")]
    Invalid(String),

    #[error("missing unit in duration {0:?}")]
    MissingUnit(String),

    #[error("unknown unit {unit:?} in duration {input:?}")]
    UnknownUnit { unit: String, input: String },

    #[error("duration {0:?} is out of range")]
    Overflow(String),
}

const NANOSECOND: u64 = 1;
const MICROSECOND: u64 = 1_000 * NANOSECOND;
const MILLISECOND: u64 = 1_000 * MICROSECOND;
const SECOND: u64 = 1_000 * MILLISECOND;
const MINUTE: u64 = 60 * SECOND;
const HOUR: u64 = 60 * MINUTE;

fn unit_scale(unit: &str) -> Option<u64> {
    match unit {
        "ns" => Some(NANOSECOND),
        "us" | "µs" | "μs" => Some(MICROSECOND),
        "ms" => Some(MILLISECOND),
        "s" => Some(SECOND),
        "m" => Some(MINUTE),
        "h" => Some(HOUR),
        _ => None,
    }
}

/// Splits the leading ASCII digits off `s`.
fn leading_digits(s: &str) -> (&str, &str) {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    s.split_at(end)
}

/// Parses a signed duration string into a `TimeDelta` with nanosecond precision.
pub fn parse_duration(input: &str) -> Result<TimeDelta, DurationError> {
    let invalid = || DurationError::Invalid(input.to_string());
    let overflow = || DurationError::Overflow(input.to_string());

    let mut s = input;
    let mut negative = false;
    if let Some(rest) = s.strip_prefix('-') {
        negative = true;
        s = rest;
    } else if let Some(rest) = s.strip_prefix('+') {
        s = rest;
    }

    if s == "0" {
        return Ok(TimeDelta::zero());
    }
    if s.is_empty() {
        return Err(invalid());
    }

    let mut total: u64 = 0;
    while !s.is_empty() {
        let (whole, rest) = leading_digits(s);
        let (fraction, rest) = match rest.strip_prefix('.') {
            Some(after_dot) => leading_digits(after_dot),
            None => ("", rest),
        };
        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid());
        }

        let unit_end = rest
            .find(|c: char| c == '.' || c.is_ascii_digit())
            .unwrap_or(rest.len());
        let unit = &rest[..unit_end];
        if unit.is_empty() {
            return Err(DurationError::MissingUnit(input.to_string()));
        }
        let scale = unit_scale(unit).ok_or_else(|| DurationError::UnknownUnit {
            unit: unit.to_string(),
            input: input.to_string(),
        })?;

        let whole_value: u64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| overflow())?
        };
        let mut nanos = whole_value.checked_mul(scale).ok_or_else(overflow)?;

        if !fraction.is_empty() {
            // 18 digits of fraction are more than nanosecond precision needs
            let digits = &fraction[..fraction.len().min(18)];
            let numerator: u128 = digits.parse().map_err(|_| invalid())?;
            let denominator = 10u128.pow(digits.len() as u32);
            let frac_nanos = numerator * u128::from(scale) / denominator;
            let frac_nanos = u64::try_from(frac_nanos).map_err(|_| overflow())?;
            nanos = nanos.checked_add(frac_nanos).ok_or_else(overflow)?;
        }

        total = total.checked_add(nanos).ok_or_else(overflow)?;
        s = &rest[unit_end..];
    }

    let signed = if negative {
        if total > 1u64 << 63 {
            return Err(overflow());
        }
        (total as i128).wrapping_neg() as i64
    } else {
        i64::try_from(total).map_err(|_| overflow())?
    };

    Ok(TimeDelta::nanoseconds(signed))
}

/// Parses a duration that must be strictly positive (poll intervals, backoffs).
pub fn parse_positive_duration(input: &str) -> Result<std::time::Duration, DurationError> {
    let delta = parse_duration(input)?;
    match delta.to_std() {
        Ok(d) if !d.is_zero() => Ok(d),
        _ => Err(DurationError::Invalid(input.to_string())),
    }
}
