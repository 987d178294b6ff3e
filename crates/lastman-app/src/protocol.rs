// Messages exchanged between the app event loop, its load tasks, and the
// front end.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use lastman_core::deadline::DeadlineState;
use lastman_core::gate::{PredictionSummary, Rejection};
use lastman_core::history::{GameStatus, PickState};
use lastman_core::model::{GameId, Outcome, Prediction, Team, TeamId};
use lastman_core::planner::PlanGrid;
use lastman_core::stats::StatsPanel;

use crate::source::ReferenceData;

// ---------------------------------------------------------------------------
// Front end -> app
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserCommand {
    /// Reload fixtures and the user's predictions.
    Refresh,
    /// Plan, move or clear a team in a future round.
    PlanPick { team_id: TeamId, round: u32 },
    ClearPlan,
    /// Change the planner horizon; clamped and persisted.
    SetWeeks(u8),
    /// Fixtures and results of any gameweek of the season.
    BrowseFixtures { round: u32 },
    Submit {
        team: Option<String>,
        outcome: Option<Outcome>,
    },
    Quit,
}

// ---------------------------------------------------------------------------
// App -> front end
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum UiUpdate {
    Loading,
    Snapshot(Box<AppSnapshot>),
    SubmissionResult(SubmissionResult),
    /// Reply to [`UserCommand::BrowseFixtures`].
    Fixtures(FixtureWeek),
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionResult {
    Accepted { summary: PredictionSummary },
    Rejected(Rejection),
    /// The gate passed but the store could not take the record.
    Failed { message: String },
}

/// One fixture of a gameweek, ready to display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FixtureLine {
    pub fixture_id: u32,
    pub kickoff_time: Option<DateTime<Utc>>,
    pub home_team: String,
    pub away_team: String,
    pub home_score: Option<u32>,
    pub away_score: Option<u32>,
    pub finished: bool,
    pub home_form: String,
    pub away_form: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FixtureDay {
    pub date: NaiveDate,
    pub fixtures: Vec<FixtureLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FixtureWeek {
    pub round: u32,
    pub days: Vec<FixtureDay>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InjuryLine {
    pub player: String,
    pub chance_of_playing: Option<u8>,
    pub news: String,
}

/// A team's flagged players, least likely to play first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeamInjuries {
    pub team_id: TeamId,
    pub team: String,
    pub players: Vec<InjuryLine>,
}

/// Everything the front end renders, rebuilt after each state change.
#[derive(Debug, Clone, Serialize)]
pub struct AppSnapshot {
    pub signed_in: bool,
    pub loading: bool,
    pub current_round: u32,
    /// Round the next prediction is for (`current_round + 1`).
    pub prediction_round: u32,
    pub current_game_id: Option<GameId>,
    pub pick_state: PickState,
    pub status: GameStatus,
    pub deadline: DeadlineState,
    pub weeks: u8,
    pub teams: Vec<Team>,
    pub plan_grid: PlanGrid,
    /// Planned picks as (round, team name), by round.
    pub planned: Vec<(u32, String)>,
    pub week_fixtures: Vec<FixtureDay>,
    /// Current game's predictions, by round.
    pub current_game: Vec<Prediction>,
    pub stats: StatsPanel,
    /// Teams with flagged players, alphabetical.
    pub injuries: Vec<TeamInjuries>,
}

// ---------------------------------------------------------------------------
// Load task -> app
// ---------------------------------------------------------------------------

/// What a load task fetched. `reference` is `None` when only personal data
/// was requested; `personal` is `None` for signed-out sessions.
#[derive(Debug, Clone, Default)]
pub struct LoadedData {
    pub reference: Option<ReferenceData>,
    pub personal: Option<PersonalData>,
}

#[derive(Debug, Clone, Default)]
pub struct PersonalData {
    pub predictions: Vec<Prediction>,
    pub current_game_id: Option<GameId>,
}

/// Result of one refresh. `generation` identifies the refresh that produced
/// it; only the latest generation is applied.
#[derive(Debug)]
pub enum LoadEvent {
    Loaded { generation: u64, data: Box<LoadedData> },
    Failed { generation: u64, message: String },
}

impl LoadEvent {
    pub fn generation(&self) -> u64 {
        match self {
            LoadEvent::Loaded { generation, .. } | LoadEvent::Failed { generation, .. } => *generation,
        }
    }
}
