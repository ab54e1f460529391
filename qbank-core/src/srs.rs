use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use snafu::ensure;

use crate::{
    consts::*,
    error::{InvalidGradeSnafu, QbankError},
};

/// Recall quality on the SM-2 scale, `0` (blackout) to `5` (perfect).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Grade(u8);

impl Grade {
    pub fn new(grade: u8) -> Result<Self, QbankError> {
        ensure!(grade <= MAX_GRADE, InvalidGradeSnafu { grade });
        Ok(Self(grade))
    }

    pub fn value(&self) -> u8 {
        self.0
    }

    pub fn is_pass(&self) -> bool {
        self.0 >= PASSING_GRADE
    }
}

impl TryFrom<u8> for Grade {
    type Error = QbankError;

    fn try_from(grade: u8) -> Result<Self, Self::Error> {
        Self::new(grade)
    }
}

/// Review schedule attached to a question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SrsRecord {
    pub ease_factor: f64,
    /// days until the next review
    pub interval: u32,
    pub repetitions: u32,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub due_date: DateTime<Utc>,
}

impl SrsRecord {
    /// Schedule of a question that was never reviewed.
    pub fn initial(now: DateTime<Utc>) -> Self {
        Self {
            ease_factor: INITIAL_EASE_FACTOR,
            interval: 0,
            repetitions: 0,
            due_date: now,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.due_date <= now
    }
}

/// Compute the next schedule with the SM-2 rules.
pub fn schedule(current: Option<&SrsRecord>, grade: Grade, now: DateTime<Utc>) -> SrsRecord {
    let current = current.cloned().unwrap_or_else(|| SrsRecord::initial(now));

    let (interval, repetitions) = if !grade.is_pass() {
        (1, 0)
    } else {
        let interval = match current.repetitions {
            0 => 1,
            1 => 6,
            _ => (current.interval as f64 * current.ease_factor).round() as u32,
        };
        (interval, current.repetitions + 1)
    };

    let q = (MAX_GRADE - grade.value()) as f64;
    let ease_factor = (current.ease_factor + (0.1 - q * (0.08 + q * 0.02))).max(MIN_EASE_FACTOR);

    SrsRecord {
        ease_factor,
        interval,
        repetitions,
        due_date: now + Duration::days(interval as i64),
    }
}
