// Reference data (teams, fixtures) and the prediction log rows.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// First round of a league season.
pub const MIN_ROUND: u32 = 1;
/// Last round of a 20-team league season.
pub const MAX_ROUND: u32 = 38;

pub type TeamId = u32;
pub type GameId = i64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("unknown outcome `{0}` (expected Win or Draw)")]
    UnknownOutcome(String),

    #[error("unknown team location `{0}` (expected Home or Away)")]
    UnknownLocation(String),
}

// ---------------------------------------------------------------------------
// Teams and fixtures
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    pub short_name: String,
}

impl Team {
    /// Case-insensitive match on full or short name, ignoring surrounding
    /// whitespace.
    pub fn matches_name(&self, name: &str) -> bool {
        let name = name.trim();
        self.name.eq_ignore_ascii_case(name) || self.short_name.eq_ignore_ascii_case(name)
    }
}

/// First team in `teams` that [`Team::matches_name`] `name`.
pub fn find_team<'a>(teams: impl IntoIterator<Item = &'a Team>, name: &str) -> Option<&'a Team> {
    teams.into_iter().find(|t| t.matches_name(name))
}

/// A player flagged as doubtful or unavailable for the next round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Injury {
    pub player_name: String,
    pub team_id: TeamId,
    /// Percentage chance of playing next round; `None` when not published.
    pub chance_of_playing: Option<u8>,
    pub news: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fixture {
    pub id: u32,
    pub round: u32,
    pub home_team_id: TeamId,
    pub away_team_id: TeamId,
    pub home_score: Option<u32>,
    pub away_score: Option<u32>,
    pub started: bool,
    pub finished: bool,
    pub finished_provisional: bool,
    /// Unscheduled fixtures have no kickoff yet.
    pub kickoff_time: Option<DateTime<Utc>>,
    pub home_difficulty: u8,
    pub away_difficulty: u8,
}

/// Win/draw/loss from one team's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FormResult {
    Win,
    Draw,
    Loss,
}

impl FormResult {
    pub fn letter(&self) -> char {
        match self {
            FormResult::Win => 'W',
            FormResult::Draw => 'D',
            FormResult::Loss => 'L',
        }
    }
}

impl Fixture {
    pub fn involves(&self, team_id: TeamId) -> bool {
        self.home_team_id == team_id || self.away_team_id == team_id
    }

    /// The other team in this fixture, or `None` if `team_id` isn't playing.
    pub fn opponent_of(&self, team_id: TeamId) -> Option<TeamId> {
        if self.home_team_id == team_id {
            Some(self.away_team_id)
        } else if self.away_team_id == team_id {
            Some(self.home_team_id)
        } else {
            None
        }
    }

    /// Result for `team_id` once both scores are known.
    pub fn result_for(&self, team_id: TeamId) -> Option<FormResult> {
        let (home, away) = (self.home_score?, self.away_score?);
        let (own, other) = if self.home_team_id == team_id {
            (home, away)
        } else if self.away_team_id == team_id {
            (away, home)
        } else {
            return None;
        };
        Some(match own.cmp(&other) {
            std::cmp::Ordering::Greater => FormResult::Win,
            std::cmp::Ordering::Equal => FormResult::Draw,
            std::cmp::Ordering::Less => FormResult::Loss,
        })
    }
}

// ---------------------------------------------------------------------------
// Predictions
// ---------------------------------------------------------------------------

/// The result a user backs their selected team to achieve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    Win,
    Draw,
}

impl Outcome {
    /// Parse "win"/"draw" in any case.
    pub fn from_str_outcome(s: &str) -> Result<Self, ModelError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "win" | "w" => Ok(Outcome::Win),
            "draw" | "d" => Ok(Outcome::Draw),
            _ => Err(ModelError::UnknownOutcome(s.to_string())),
        }
    }

    pub fn display_str(&self) -> &'static str {
        match self {
            Outcome::Win => "Win",
            Outcome::Draw => "Draw",
        }
    }

    /// Whether a final result satisfies this outcome.
    pub fn is_satisfied_by(&self, result: FormResult) -> bool {
        match self {
            Outcome::Win => result == FormResult::Win,
            Outcome::Draw => result == FormResult::Draw,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TeamLocation {
    Home,
    Away,
}

impl TeamLocation {
    pub fn from_str_location(s: &str) -> Result<Self, ModelError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "home" | "h" => Ok(TeamLocation::Home),
            "away" | "a" => Ok(TeamLocation::Away),
            _ => Err(ModelError::UnknownLocation(s.to_string())),
        }
    }

    pub fn display_str(&self) -> &'static str {
        match self {
            TeamLocation::Home => "Home",
            TeamLocation::Away => "Away",
        }
    }

    /// Single-letter suffix used in fixture labels ("Spurs (H)").
    pub fn marker(&self) -> char {
        match self {
            TeamLocation::Home => 'H',
            TeamLocation::Away => 'A',
        }
    }
}

impl fmt::Display for TeamLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_str())
    }
}

/// A stored prediction row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub id: i64,
    pub user_id: String,
    pub game_id: GameId,
    /// 1-indexed position of this pick within its game.
    pub round_number: u32,
    pub team_selected: String,
    pub team_opposing: String,
    pub team_selected_location: TeamLocation,
    pub outcome_selected: Outcome,
    /// `None` until the fixture is resolved.
    pub correct: Option<bool>,
    /// League round the fixture belongs to.
    pub fpl_round: Option<u32>,
    pub team_selected_score: Option<u32>,
    pub team_opposing_score: Option<u32>,
}

/// A prediction ready to be inserted by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPrediction {
    pub user_id: String,
    pub game_id: GameId,
    pub round_number: u32,
    pub team_selected: String,
    pub team_opposing: String,
    pub team_selected_location: TeamLocation,
    pub outcome_selected: Outcome,
    pub fpl_round: Option<u32>,
    pub submitted_at: DateTime<Utc>,
}

/// Group a user's full prediction history by game id, each game ordered by
/// round number.
pub fn group_by_game(predictions: &[Prediction]) -> BTreeMap<GameId, Vec<Prediction>> {
    let mut grouped: BTreeMap<GameId, Vec<Prediction>> = BTreeMap::new();
    for p in predictions {
        grouped.entry(p.game_id).or_default().push(p.clone());
    }
    for game in grouped.values_mut() {
        game.sort_by_key(|p| p.round_number);
    }
    grouped
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn outcome_parsing_is_case_insensitive() {
        assert_eq!(Outcome::from_str_outcome("Win"), Ok(Outcome::Win));
        assert_eq!(Outcome::from_str_outcome("DRAW"), Ok(Outcome::Draw));
        assert_eq!(Outcome::from_str_outcome(" w "), Ok(Outcome::Win));
        assert_eq!(
            Outcome::from_str_outcome("lose"),
            Err(ModelError::UnknownOutcome("lose".to_string()))
        );
    }

    #[test]
    fn location_parsing_and_marker() {
        assert_eq!(TeamLocation::from_str_location("away"), Ok(TeamLocation::Away));
        assert_eq!(TeamLocation::from_str_location("H"), Ok(TeamLocation::Home));
        assert!(TeamLocation::from_str_location("neutral").is_err());
        assert_eq!(TeamLocation::Home.marker(), 'H');
        assert_eq!(format!("{}", TeamLocation::Away), "Away");
    }

    #[test]
    fn result_for_reads_from_each_side() {
        let mut f = fixture(1, 1, 10, 20);
        assert_eq!(f.result_for(10), None);

        f.home_score = Some(2);
        f.away_score = Some(1);
        assert_eq!(f.result_for(10), Some(FormResult::Win));
        assert_eq!(f.result_for(20), Some(FormResult::Loss));
        assert_eq!(f.result_for(30), None);

        f.away_score = Some(2);
        assert_eq!(f.result_for(20), Some(FormResult::Draw));
    }

    #[test]
    fn opponent_of_and_involves() {
        let f = fixture(1, 1, 10, 20);
        assert_eq!(f.opponent_of(10), Some(20));
        assert_eq!(f.opponent_of(20), Some(10));
        assert_eq!(f.opponent_of(99), None);
        assert!(f.involves(20));
        assert!(!f.involves(99));
    }

    #[test]
    fn outcome_satisfaction() {
        assert!(Outcome::Win.is_satisfied_by(FormResult::Win));
        assert!(!Outcome::Win.is_satisfied_by(FormResult::Draw));
        assert!(Outcome::Draw.is_satisfied_by(FormResult::Draw));
        assert!(!Outcome::Draw.is_satisfied_by(FormResult::Loss));
    }

    #[test]
    fn group_by_game_orders_rounds() {
        let preds = vec![
            prediction(2, 2, "Chelsea", None),
            prediction(1, 1, "Arsenal", Some(false)),
            prediction(2, 1, "Fulham", Some(true)),
        ];
        let grouped = group_by_game(&preds);
        assert_eq!(grouped.len(), 2);
        let game2: Vec<&str> = grouped[&2].iter().map(|p| p.team_selected.as_str()).collect();
        assert_eq!(game2, vec!["Fulham", "Chelsea"]);
    }

    #[test]
    fn group_by_game_empty() {
        assert!(group_by_game(&[]).is_empty());
    }

    #[test]
    fn find_team_matches_full_or_short_name() {
        let teams = vec![team(1, "Arsenal"), team(13, "Man City")];
        assert_eq!(find_team(&teams, " man city ").map(|t| t.id), Some(13));
        assert_eq!(find_team(&teams, "ars").map(|t| t.id), Some(1));
        assert!(find_team(&teams, "Manchester").is_none());
        assert!(find_team(&teams, "").is_none());
    }
}
