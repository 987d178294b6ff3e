// Pick history resolution: which teams are spent, and whether the user is
// still alive in the current game.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::model::{GameId, Prediction};

/// Derived state of a user within the current game.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickState {
    /// Teams already selected in this game.
    pub used_team_names: BTreeSet<String>,
    pub is_eliminated: bool,
    /// An unresolved pick exists. Never true while `is_eliminated` is.
    pub is_pending: bool,
    /// Number of picks made in this game so far.
    pub picks_made: u32,
}

/// Single-valued view of `PickState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameStatus {
    /// No picks yet in the current game (or no current game).
    NotEntered,
    /// Survived every resolved pick; free to submit.
    Active,
    /// Waiting on a fixture to finish.
    Pending,
    Eliminated,
}

impl GameStatus {
    pub fn display_str(&self) -> &'static str {
        match self {
            GameStatus::NotEntered => "Not entered",
            GameStatus::Active => "Active",
            GameStatus::Pending => "Pending",
            GameStatus::Eliminated => "Eliminated",
        }
    }
}

impl PickState {
    pub fn status(&self) -> GameStatus {
        if self.is_eliminated {
            GameStatus::Eliminated
        } else if self.is_pending {
            GameStatus::Pending
        } else if self.picks_made == 0 {
            GameStatus::NotEntered
        } else {
            GameStatus::Active
        }
    }

    pub fn has_used(&self, team_name: &str) -> bool {
        self.used_team_names.contains(team_name)
    }

    /// Round number the next submitted pick will carry.
    pub fn next_round_number(&self) -> u32 {
        self.picks_made + 1
    }
}

/// Resolve a user's prediction history against the current game.
///
/// An absent game id, or a game with no predictions, yields the empty state.
/// Elimination takes precedence over pending: if stale data shows both an
/// incorrect and an unresolved pick, the user is reported as eliminated only.
pub fn resolve(predictions: &[Prediction], current_game_id: Option<GameId>) -> PickState {
    let Some(game_id) = current_game_id else {
        return PickState::default();
    };

    let mut state = PickState::default();
    let mut has_unresolved = false;

    for p in predictions.iter().filter(|p| p.game_id == game_id) {
        state.used_team_names.insert(p.team_selected.clone());
        state.picks_made += 1;
        match p.correct {
            Some(false) => state.is_eliminated = true,
            None => has_unresolved = true,
            Some(true) => {}
        }
    }

    if state.is_eliminated && has_unresolved {
        warn!(
            "Game {} has both an incorrect and an unresolved pick; treating as eliminated",
            game_id
        );
    }
    state.is_pending = has_unresolved && !state.is_eliminated;

    state
}
