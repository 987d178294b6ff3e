// (round, team) -> opponent lookup built once per fixture list.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::model::{find_team, Fixture, Team, TeamId, TeamLocation};

/// One team's view of a fixture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixtureEntry {
    pub fixture_id: u32,
    pub opponent_id: TeamId,
    /// Opponent name with a home/away marker, e.g. `"Spurs (H)"`.
    pub opponent_display_name: String,
    pub opponent_name: String,
    pub is_home: bool,
    /// This team's own difficulty rating for the fixture (1 easiest, 5 hardest).
    pub difficulty: u8,
}

impl FixtureEntry {
    pub fn location(&self) -> TeamLocation {
        if self.is_home {
            TeamLocation::Home
        } else {
            TeamLocation::Away
        }
    }
}

/// Owned lookup structure. Rebuild it whenever the fixture list changes.
#[derive(Debug, Clone, Default)]
pub struct FixtureIndex {
    entries: HashMap<(u32, TeamId), FixtureEntry>,
    teams: HashMap<TeamId, Team>,
}

impl FixtureIndex {
    /// Build the index in one pass over `fixtures`.
    ///
    /// Fixtures that reference a team missing from `teams` are skipped, since
    /// there is no name to display for the opponent. If a team appears twice
    /// in the same round the first fixture wins.
    pub fn build(fixtures: &[Fixture], teams: &[Team]) -> Self {
        let teams: HashMap<TeamId, Team> = teams.iter().map(|t| (t.id, t.clone())).collect();
        let mut entries = HashMap::with_capacity(fixtures.len() * 2);

        for fixture in fixtures {
            let (Some(home), Some(away)) = (
                teams.get(&fixture.home_team_id),
                teams.get(&fixture.away_team_id),
            ) else {
                debug!(
                    "Skipping fixture {} with unknown team ({} v {})",
                    fixture.id, fixture.home_team_id, fixture.away_team_id
                );
                continue;
            };

            let sides = [
                (home, away, true, fixture.home_difficulty),
                (away, home, false, fixture.away_difficulty),
            ];
            for (team, opponent, is_home, difficulty) in sides {
                let key = (fixture.round, team.id);
                if entries.contains_key(&key) {
                    warn!(
                        "Team {} already has a fixture in round {}, ignoring fixture {}",
                        team.name, fixture.round, fixture.id
                    );
                    continue;
                }
                let marker = if is_home { 'H' } else { 'A' };
                entries.insert(
                    key,
                    FixtureEntry {
                        fixture_id: fixture.id,
                        opponent_id: opponent.id,
                        opponent_display_name: format!("{} ({})", opponent.name, marker),
                        opponent_name: opponent.name.clone(),
                        is_home,
                        difficulty,
                    },
                );
            }
        }

        FixtureIndex { entries, teams }
    }

    /// `None` means the team has no fixture that round (bye or postponed).
    pub fn lookup(&self, round: u32, team_id: TeamId) -> Option<&FixtureEntry> {
        self.entries.get(&(round, team_id))
    }

    pub fn team(&self, team_id: TeamId) -> Option<&Team> {
        self.teams.get(&team_id)
    }

    /// Case-insensitive match on full or short name; see [`find_team`].
    pub fn team_by_name(&self, name: &str) -> Option<&Team> {
        find_team(self.teams.values(), name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
