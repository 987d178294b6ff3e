// Submission deadline for the prediction round.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::model::Fixture;

/// Predictions close this long before the round's first kickoff.
pub const SUBMISSION_LEAD_HOURS: i64 = 12;

/// Deadline evaluated at a specific instant. Never cache this across checks:
/// the clock moves on without any state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadlineState {
    /// `None` when the round has no scheduled fixtures yet.
    pub deadline: Option<DateTime<Utc>>,
    pub is_past_deadline: bool,
}

impl DeadlineState {
    pub fn evaluate(fixtures_for_next_round: &[Fixture], now: DateTime<Utc>) -> Self {
        let deadline = submission_deadline(fixtures_for_next_round);
        DeadlineState {
            deadline,
            is_past_deadline: deadline.is_some_and(|d| now > d),
        }
    }

    /// Evaluate against the wall clock.
    pub fn now(fixtures_for_next_round: &[Fixture]) -> Self {
        Self::evaluate(fixtures_for_next_round, Utc::now())
    }

    /// An open round with nothing scheduled.
    pub fn open() -> Self {
        DeadlineState {
            deadline: None,
            is_past_deadline: false,
        }
    }
}

/// Earliest kickoff among the round's fixtures, minus the lead window.
pub fn submission_deadline(fixtures: &[Fixture]) -> Option<DateTime<Utc>> {
    fixtures
        .iter()
        .filter_map(|f| f.kickoff_time)
        .min()
        .map(|kickoff| kickoff - Duration::hours(SUBMISSION_LEAD_HOURS))
}

pub fn is_past_deadline_at(fixtures: &[Fixture], now: DateTime<Utc>) -> bool {
    DeadlineState::evaluate(fixtures, now).is_past_deadline
}

pub fn is_past_deadline(fixtures: &[Fixture]) -> bool {
    is_past_deadline_at(fixtures, Utc::now())
}
