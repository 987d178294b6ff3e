// Multi-round pick planner.
//
// Holds a tentative round -> team plan for the session and classifies every
// (team, round) cell of the planning grid. Nothing here is persisted: a plan
// lives until the caller drops the Planner.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::fixture_index::{FixtureEntry, FixtureIndex};
use crate::history::PickState;
use crate::model::{Team, TeamId};

pub const MIN_WEEKS: u8 = 5;
pub const MAX_WEEKS: u8 = 10;
pub const DEFAULT_WEEKS: u8 = MIN_WEEKS;

// ---------------------------------------------------------------------------
// Horizon
// ---------------------------------------------------------------------------

/// Number of future rounds shown by the planner, always within
/// `MIN_WEEKS..=MAX_WEEKS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Horizon(u8);

impl Horizon {
    /// Clamp `weeks` into the allowed range.
    pub fn new(weeks: u8) -> Self {
        Horizon(weeks.clamp(MIN_WEEKS, MAX_WEEKS))
    }

    pub fn weeks(&self) -> u8 {
        self.0
    }

    /// Rounds `current_round + 1 ..= current_round + weeks`.
    pub fn rounds(&self, current_round: u32) -> RangeInclusive<u32> {
        (current_round + 1)..=(current_round + u32::from(self.0))
    }
}

impl Default for Horizon {
    fn default() -> Self {
        Horizon(DEFAULT_WEEKS)
    }
}

// ---------------------------------------------------------------------------
// Plan state
// ---------------------------------------------------------------------------

/// Sparse round -> team mapping. An unplanned round has no key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanState {
    picks: BTreeMap<u32, TeamId>,
}

impl PlanState {
    pub fn get(&self, round: u32) -> Option<TeamId> {
        self.picks.get(&round).copied()
    }

    /// Round the team is planned in, if any.
    pub fn round_of(&self, team_id: TeamId) -> Option<u32> {
        self.picks
            .iter()
            .find_map(|(&round, &planned)| (planned == team_id).then_some(round))
    }

    pub fn contains_team(&self, team_id: TeamId) -> bool {
        self.round_of(team_id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, TeamId)> + '_ {
        self.picks.iter().map(|(&r, &t)| (r, t))
    }

    pub fn len(&self) -> usize {
        self.picks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.picks.is_empty()
    }
}

/// What a call to [`Planner::pick`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickChange {
    Planned { round: u32 },
    Moved { from: u32, to: u32 },
    Cleared { round: u32 },
}

// ---------------------------------------------------------------------------
// Cell classification
// ---------------------------------------------------------------------------

/// Fixture difficulty tiers, 1 (easiest) through 5 (hardest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DifficultyTier {
    VeryEasy,
    Easy,
    Moderate,
    Hard,
    VeryHard,
}

impl DifficultyTier {
    pub fn from_rating(rating: u8) -> Option<Self> {
        match rating {
            1 => Some(DifficultyTier::VeryEasy),
            2 => Some(DifficultyTier::Easy),
            3 => Some(DifficultyTier::Moderate),
            4 => Some(DifficultyTier::Hard),
            5 => Some(DifficultyTier::VeryHard),
            _ => None,
        }
    }

    pub fn rating(&self) -> u8 {
        match self {
            DifficultyTier::VeryEasy => 1,
            DifficultyTier::Easy => 2,
            DifficultyTier::Moderate => 3,
            DifficultyTier::Hard => 4,
            DifficultyTier::VeryHard => 5,
        }
    }
}

/// Rendering category of one planner cell, in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellCategory {
    PlannedThisRound,
    /// Team already used in a submitted round of this game.
    Locked,
    PlannedElsewhere,
    Difficulty(DifficultyTier),
    /// Has a fixture but the rating is outside 1..=5.
    Unrated,
    /// Bye or postponed; shown de-emphasised.
    NoFixture,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanCell {
    pub round: u32,
    /// Opponent label such as `"Spurs (A)"`, absent without a fixture.
    pub display: Option<String>,
    pub difficulty: Option<u8>,
    pub category: CellCategory,
    /// Whether a click should reach [`Planner::pick`].
    pub selectable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanRow {
    pub team_id: TeamId,
    pub team_name: String,
    pub cells: Vec<PlanCell>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanGrid {
    pub rounds: Vec<u32>,
    pub rows: Vec<PlanRow>,
}

// ---------------------------------------------------------------------------
// Planner
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct Planner {
    plan: PlanState,
    horizon: Horizon,
}

impl Planner {
    pub fn new(horizon: Horizon) -> Self {
        Planner {
            plan: PlanState::default(),
            horizon,
        }
    }

    pub fn plan(&self) -> &PlanState {
        &self.plan
    }

    pub fn horizon(&self) -> Horizon {
        self.horizon
    }

    /// Change the number of rounds shown. Planned picks outside the new
    /// window are kept so widening it again restores them.
    pub fn set_horizon(&mut self, horizon: Horizon) {
        self.horizon = horizon;
    }

    /// Fixture info for `team_id` in `round`, if it plays.
    pub fn candidate<'a>(
        &self,
        index: &'a FixtureIndex,
        team_id: TeamId,
        round: u32,
    ) -> Option<&'a FixtureEntry> {
        index.lookup(round, team_id)
    }

    pub fn is_team_planned(&self, team_id: TeamId) -> bool {
        self.plan.contains_team(team_id)
    }

    /// Whether the team was already used in a submitted round this game.
    /// Unknown team ids are never locked.
    pub fn is_team_locked(&self, index: &FixtureIndex, team_id: TeamId, pick_state: &PickState) -> bool {
        index
            .team(team_id)
            .is_some_and(|team| pick_state.has_used(&team.name))
    }

    /// Toggle/move `team_id` into `round`.
    ///
    /// 1. Not planned anywhere: plan it for `round`.
    /// 2. Planned in another round: move it to `round`.
    /// 3. Planned in `round` already: clear the round.
    ///
    /// Whatever team previously occupied `round` is replaced. Callers must
    /// check [`Planner::is_team_locked`] first; locked teams are not guarded
    /// here.
    pub fn pick(&mut self, team_id: TeamId, round: u32) -> PickChange {
        let change = match self.plan.round_of(team_id) {
            None => {
                self.plan.picks.insert(round, team_id);
                PickChange::Planned { round }
            }
            Some(existing) if existing != round => {
                self.plan.picks.remove(&existing);
                self.plan.picks.insert(round, team_id);
                PickChange::Moved {
                    from: existing,
                    to: round,
                }
            }
            Some(_) => {
                self.plan.picks.remove(&round);
                PickChange::Cleared { round }
            }
        };
        debug!("Planner pick team={} round={}: {:?}", team_id, round, change);
        change
    }

    pub fn clear(&mut self) {
        self.plan = PlanState::default();
    }

    /// Classify a single cell. Pure function of the current state.
    pub fn classify(
        &self,
        index: &FixtureIndex,
        pick_state: &PickState,
        team_id: TeamId,
        round: u32,
    ) -> CellCategory {
        let entry = index.lookup(round, team_id);
        if self.plan.get(round) == Some(team_id) {
            CellCategory::PlannedThisRound
        } else if self.is_team_locked(index, team_id, pick_state) {
            CellCategory::Locked
        } else if self.is_team_planned(team_id) {
            CellCategory::PlannedElsewhere
        } else {
            match entry {
                Some(e) => DifficultyTier::from_rating(e.difficulty)
                    .map(CellCategory::Difficulty)
                    .unwrap_or(CellCategory::Unrated),
                None => CellCategory::NoFixture,
            }
        }
    }

    /// Build the full team x round grid for the horizon after `current_round`.
    pub fn grid(
        &self,
        index: &FixtureIndex,
        teams: &[Team],
        pick_state: &PickState,
        current_round: u32,
    ) -> PlanGrid {
        let rounds: Vec<u32> = self.horizon.rounds(current_round).collect();
        let rows = teams
            .iter()
            .map(|team| {
                let locked = self.is_team_locked(index, team.id, pick_state);
                let cells = rounds
                    .iter()
                    .map(|&round| {
                        let entry = index.lookup(round, team.id);
                        PlanCell {
                            round,
                            display: entry.map(|e| e.opponent_display_name.clone()),
                            difficulty: entry.map(|e| e.difficulty),
                            category: self.classify(index, pick_state, team.id, round),
                            selectable: !locked && entry.is_some(),
                        }
                    })
                    .collect();
                PlanRow {
                    team_id: team.id,
                    team_name: team.name.clone(),
                    cells,
                }
            })
            .collect();

        PlanGrid { rounds, rows }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::resolve;
    use crate::model::test_support::{fixture, prediction, team};
    use crate::model::Fixture;

    fn teams() -> Vec<Team> {
        vec![
            team(1, "Arsenal"),
            team(2, "Spurs"),
            team(3, "Chelsea"),
            team(4, "Fulham"),
        ]
    }

    fn fixtures() -> Vec<Fixture> {
        let mut out = Vec::new();
        for round in 6..=10 {
            let mut a = fixture(round * 10, round, 1, 2);
            a.home_difficulty = 2;
            a.away_difficulty = 4;
            out.push(a);
            // Chelsea and Fulham blank in round 8.
            if round != 8 {
                let mut b = fixture(round * 10 + 1, round, 3, 4);
                b.home_difficulty = 1;
                b.away_difficulty = 5;
                out.push(b);
            }
        }
        out
    }

    fn index() -> FixtureIndex {
        FixtureIndex::build(&fixtures(), &teams())
    }

    fn assert_no_duplicates(plan: &PlanState) {
        let mut seen = std::collections::HashSet::new();
        for (_, team) in plan.iter() {
            assert!(seen.insert(team), "team {team} planned twice");
        }
    }

    #[test]
    fn horizon_is_clamped() {
        assert_eq!(Horizon::new(0).weeks(), 5);
        assert_eq!(Horizon::new(7).weeks(), 7);
        assert_eq!(Horizon::new(40).weeks(), 10);
        assert_eq!(Horizon::default().weeks(), 5);
        assert_eq!(Horizon::new(5).rounds(5), 6..=10);
    }

    #[test]
    fn pick_plans_unplanned_team() {
        let mut planner = Planner::default();
        assert_eq!(planner.pick(1, 6), PickChange::Planned { round: 6 });
        assert_eq!(planner.plan().get(6), Some(1));
        assert!(planner.is_team_planned(1));
    }

    #[test]
    fn pick_twice_toggles_off() {
        let mut planner = Planner::default();
        planner.pick(1, 6);
        assert_eq!(planner.pick(1, 6), PickChange::Cleared { round: 6 });
        assert!(planner.plan().is_empty());
        assert!(!planner.is_team_planned(1));
    }

    #[test]
    fn pick_other_round_moves_team() {
        let mut planner = Planner::default();
        planner.pick(1, 6);
        assert_eq!(planner.pick(1, 7), PickChange::Moved { from: 6, to: 7 });
        assert_eq!(planner.plan().get(6), None);
        assert_eq!(planner.plan().get(7), Some(1));
    }

    #[test]
    fn pick_replaces_occupant_of_round() {
        let mut planner = Planner::default();
        planner.pick(1, 6);
        planner.pick(2, 6);
        assert_eq!(planner.plan().get(6), Some(2));
        assert!(!planner.is_team_planned(1));
    }

    #[test]
    fn no_team_is_ever_planned_twice() {
        let mut planner = Planner::default();
        let script = [
            (1, 6),
            (2, 7),
            (1, 7),
            (3, 6),
            (3, 8),
            (2, 8),
            (1, 7),
            (4, 9),
            (4, 6),
            (2, 6),
            (1, 10),
        ];
        for (team, round) in script {
            planner.pick(team, round);
            assert_no_duplicates(planner.plan());
        }
    }

    #[test]
    fn candidate_delegates_to_index() {
        let planner = Planner::default();
        let index = index();
        assert_eq!(
            planner.candidate(&index, 3, 6).map(|e| e.opponent_display_name.as_str()),
            Some("Fulham (H)")
        );
        assert!(planner.candidate(&index, 3, 8).is_none());
    }

    #[test]
    fn locked_team_uses_history_names() {
        let planner = Planner::default();
        let index = index();
        let state = resolve(&[prediction(1, 1, "Chelsea", Some(true))], Some(1));
        assert!(planner.is_team_locked(&index, 3, &state));
        assert!(!planner.is_team_locked(&index, 1, &state));
        assert!(!planner.is_team_locked(&index, 99, &state));
    }

    #[test]
    fn classification_precedence() {
        let index = index();
        let state = resolve(&[prediction(1, 1, "Chelsea", Some(true))], Some(1));
        let mut planner = Planner::default();
        planner.pick(1, 6);
        // A locked team that somehow got planned still shows as planned here.
        planner.pick(3, 7);

        assert_eq!(planner.classify(&index, &state, 1, 6), CellCategory::PlannedThisRound);
        assert_eq!(planner.classify(&index, &state, 1, 7), CellCategory::PlannedElsewhere);
        assert_eq!(planner.classify(&index, &state, 3, 7), CellCategory::PlannedThisRound);
        assert_eq!(planner.classify(&index, &state, 3, 6), CellCategory::Locked);
        assert_eq!(
            planner.classify(&index, &state, 2, 6),
            CellCategory::Difficulty(DifficultyTier::Hard)
        );
        assert_eq!(
            planner.classify(&index, &state, 4, 6),
            CellCategory::Difficulty(DifficultyTier::VeryHard)
        );
        assert_eq!(planner.classify(&index, &state, 4, 8), CellCategory::NoFixture);
    }

    #[test]
    fn out_of_range_difficulty_is_unrated() {
        let mut f = fixture(1, 6, 1, 2);
        f.home_difficulty = 0;
        let index = FixtureIndex::build(&[f], &teams());
        let planner = Planner::default();
        assert_eq!(
            planner.classify(&index, &PickState::default(), 1, 6),
            CellCategory::Unrated
        );
    }

    #[test]
    fn grid_covers_horizon() {
        let index = index();
        let state = resolve(&[prediction(1, 1, "Chelsea", Some(true))], Some(1));
        let mut planner = Planner::new(Horizon::new(5));
        planner.pick(2, 9);

        let grid = planner.grid(&index, &teams(), &state, 5);
        assert_eq!(grid.rounds, vec![6, 7, 8, 9, 10]);
        assert_eq!(grid.rows.len(), 4);

        let spurs = &grid.rows[1];
        assert_eq!(spurs.team_name, "Spurs");
        assert_eq!(spurs.cells[3].category, CellCategory::PlannedThisRound);
        assert_eq!(spurs.cells[0].category, CellCategory::PlannedElsewhere);
        assert_eq!(spurs.cells[0].display.as_deref(), Some("Arsenal (A)"));

        let chelsea = &grid.rows[2];
        assert!(chelsea.cells.iter().all(|c| !c.selectable));
        assert!(chelsea.cells.iter().all(|c| c.category == CellCategory::Locked));

        let fulham = &grid.rows[3];
        assert_eq!(fulham.cells[2].category, CellCategory::NoFixture);
        assert!(!fulham.cells[2].selectable);
        assert!(fulham.cells[2].display.is_none());
        assert!(fulham.cells[0].selectable);
    }

    #[test]
    fn grid_with_no_data_is_well_defined() {
        let planner = Planner::default();
        let grid = planner.grid(&FixtureIndex::default(), &[], &PickState::default(), 1);
        assert_eq!(grid.rounds.len(), 5);
        assert!(grid.rows.is_empty());
    }

    #[test]
    fn shrinking_horizon_keeps_plan() {
        let mut planner = Planner::new(Horizon::new(10));
        planner.pick(1, 14);
        planner.set_horizon(Horizon::new(5));
        assert_eq!(planner.horizon().weeks(), 5);
        assert_eq!(planner.plan().get(14), Some(1));
    }
}
