// Submission gate: validates one round's prediction before it is stored,
// then prepares the row the store will insert.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::deadline::DeadlineState;
use crate::fixture_index::FixtureIndex;
use crate::history::PickState;
use crate::model::{GameId, NewPrediction, Outcome, TeamLocation};

/// What the user filled in. Either field may still be unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionCandidate {
    pub team_selected: Option<String>,
    pub outcome: Option<Outcome>,
    /// League round the pick is for (the prediction week).
    pub round: u32,
}

/// Why a submission was refused. `Display` is the user-facing message.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rejection {
    #[error("You are unable to make a prediction as you have been eliminated.")]
    AlreadyEliminated,

    #[error("Prediction submitted. Wait for it to be resolved before picking again.")]
    PredictionAlreadySubmitted,

    #[error("The submission deadline has passed for this gameweek.")]
    DeadlinePassed,

    #[error("Select both a team and an outcome.")]
    IncompleteSelection,

    #[error("You have already picked that team in this game.")]
    TeamAlreadyUsed,

    #[error("That team has no fixture this gameweek.")]
    NoFixture,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Accepted,
    Rejected(Rejection),
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted)
    }
}

/// Validate a candidate, stopping at the first failed rule.
///
/// This is advisory: the store's insert remains the authority on the
/// one-team-per-game rule.
pub fn submit(
    candidate: &SubmissionCandidate,
    pick_state: &PickState,
    deadline: &DeadlineState,
    index: &FixtureIndex,
) -> Verdict {
    match check(candidate, pick_state, deadline, index) {
        Ok(()) => Verdict::Accepted,
        Err(reason) => Verdict::Rejected(reason),
    }
}

fn check(
    candidate: &SubmissionCandidate,
    pick_state: &PickState,
    deadline: &DeadlineState,
    index: &FixtureIndex,
) -> Result<(), Rejection> {
    if pick_state.is_eliminated {
        return Err(Rejection::AlreadyEliminated);
    }
    if pick_state.is_pending {
        return Err(Rejection::PredictionAlreadySubmitted);
    }
    if deadline.is_past_deadline {
        return Err(Rejection::DeadlinePassed);
    }
    let (Some(team), Some(_)) = (selected_team(candidate), candidate.outcome) else {
        return Err(Rejection::IncompleteSelection);
    };
    let resolved = index.team_by_name(team);
    let name = resolved.map_or(team, |t| t.name.as_str());
    if pick_state.has_used(name) {
        return Err(Rejection::TeamAlreadyUsed);
    }
    let plays = resolved.is_some_and(|t| index.lookup(candidate.round, t.id).is_some());
    if !plays {
        return Err(Rejection::NoFixture);
    }
    Ok(())
}

fn selected_team(candidate: &SubmissionCandidate) -> Option<&str> {
    candidate
        .team_selected
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Build the row to insert for an accepted candidate.
///
/// Returns `None` when the candidate would not pass [`submit`] on the
/// selection and fixture rules; callers are expected to gate first.
pub fn prepare_record(
    candidate: &SubmissionCandidate,
    pick_state: &PickState,
    index: &FixtureIndex,
    user_id: &str,
    game_id: GameId,
    submitted_at: DateTime<Utc>,
) -> Option<NewPrediction> {
    let outcome = candidate.outcome?;
    let team = index.team_by_name(selected_team(candidate)?)?;
    let entry = index.lookup(candidate.round, team.id)?;

    Some(NewPrediction {
        user_id: user_id.to_string(),
        game_id,
        round_number: pick_state.next_round_number(),
        team_selected: team.name.clone(),
        team_opposing: entry.opponent_name.clone(),
        team_selected_location: entry.location(),
        outcome_selected: outcome,
        fpl_round: Some(candidate.round),
        submitted_at,
    })
}

/// Human-readable description of a pick, used in confirmations and
/// notification emails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionSummary {
    pub round_number: u32,
    pub team_selected: String,
    pub team_opposing: String,
    pub location: TeamLocation,
    pub outcome: Outcome,
}

impl PredictionSummary {
    pub fn from_record(record: &NewPrediction) -> Self {
        PredictionSummary {
            round_number: record.round_number,
            team_selected: record.team_selected.clone(),
            team_opposing: record.team_opposing.clone(),
            location: record.team_selected_location,
            outcome: record.outcome_selected,
        }
    }

    /// e.g. `"Arsenal win vs Spurs at home"`.
    pub fn describe(&self) -> String {
        let venue = match self.location {
            TeamLocation::Home => "at home",
            TeamLocation::Away => "away",
        };
        format!(
            "{} {} vs {} {}",
            self.team_selected,
            self.outcome.display_str().to_lowercase(),
            self.team_opposing,
            venue
        )
    }

    /// Confirmation question shown before submitting,
    /// e.g. `"Are you sure you want to predict an Arsenal win vs Spurs at home?"`.
    pub fn confirmation(&self) -> String {
        let article = if self
            .team_selected
            .chars()
            .next()
            .is_some_and(|c| "aeiou".contains(c.to_ascii_lowercase()))
        {
            "an"
        } else {
            "a"
        };
        format!("Are you sure you want to predict {article} {}?", self.describe())
    }
}
