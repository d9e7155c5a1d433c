//! Cumulative-count timeseries built by walking backward from the reference
//! time in fixed jumps.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::model::iso_millis;
use super::window::months_before;

/// Errors raised for malformed bucketing parameters.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BucketizeError {
    #[error("invalid jump: amount must be > 0 (got {amount} {unit})")]
    InvalidJump { amount: u32, unit: &'static str },
}

/// Unit of a timeseries jump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JumpUnit {
    Days,
    Weeks,
    Months,
}

impl JumpUnit {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Days => "days",
            Self::Weeks => "weeks",
            Self::Months => "months",
        }
    }
}

/// Distance between two consecutive buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Jump {
    pub unit: JumpUnit,
    pub amount: u32,
}

impl Jump {
    pub const fn days(amount: u32) -> Self {
        Self {
            unit: JumpUnit::Days,
            amount,
        }
    }

    pub const fn weeks(amount: u32) -> Self {
        Self {
            unit: JumpUnit::Weeks,
            amount,
        }
    }

    pub const fn months(amount: u32) -> Self {
        Self {
            unit: JumpUnit::Months,
            amount,
        }
    }

    /// Rejects jumps that would never move the walk backward.
    pub fn validate(&self) -> Result<(), BucketizeError> {
        if self.amount == 0 {
            return Err(BucketizeError::InvalidJump {
                amount: self.amount,
                unit: self.unit.as_str(),
            });
        }
        Ok(())
    }

    /// Instant one jump before `at`, saturating at the earliest
    /// representable instant. Month jumps clamp to the end of the target
    /// month.
    pub fn before(&self, at: DateTime<Utc>) -> DateTime<Utc> {
        match self.unit {
            JumpUnit::Months => months_before(at, self.amount),
            JumpUnit::Days | JumpUnit::Weeks => {
                let days = match self.unit {
                    JumpUnit::Weeks => i64::from(self.amount) * 7,
                    _ => i64::from(self.amount),
                };
                TimeDelta::try_days(days)
                    .and_then(|delta| at.checked_sub_signed(delta))
                    .unwrap_or(DateTime::<Utc>::MIN_UTC)
            }
        }
    }
}

/// One bucket of a cumulative timeseries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeseriesPoint {
    #[serde(with = "iso_millis")]
    pub date: DateTime<Utc>,
    pub count: u64,
}

/// Build a cumulative timeseries of `events`, oldest bucket first.
///
/// Starts at `(now, events.len())` and steps back by `jump` while
/// `oldest_date < current`, counting events `<= current` at each bucket.
/// When `oldest_date >= now` the result is the single point at `now`.
pub fn bucketize(
    now: DateTime<Utc>,
    oldest_date: DateTime<Utc>,
    jump: Jump,
    events: &[DateTime<Utc>],
) -> Result<Vec<TimeseriesPoint>, BucketizeError> {
    jump.validate()?;

    let mut sorted = events.to_vec();
    sorted.sort_unstable();
    let count_until = |at: DateTime<Utc>| sorted.partition_point(|event| *event <= at) as u64;

    let mut points = vec![TimeseriesPoint {
        date: now,
        count: events.len() as u64,
    }];

    let mut current = now;
    while oldest_date < current {
        current = jump.before(current);
        points.push(TimeseriesPoint {
            date: current,
            count: count_until(current),
        });
    }

    points.reverse();
    Ok(points)
}
