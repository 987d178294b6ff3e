// Personal statistics panel computed from a user's prediction history.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::model::{Prediction, TeamLocation};

/// Selections (resolved or not) a team needs before its success rate is shown.
pub const MIN_SELECTIONS_FOR_RATE: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamSuccess {
    pub team: String,
    pub times_selected: u32,
    pub times_correct: u32,
    pub times_incorrect: u32,
    /// Rounded percentage of selections that were correct.
    pub percent_correct: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationSuccess {
    pub correct: u32,
    pub total: u32,
}

impl LocationSuccess {
    /// Integer percentage, `None` with no picks.
    pub fn percent(&self) -> Option<u32> {
        (self.total > 0).then(|| 100 * self.correct / self.total)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsPanel {
    pub games_played: u32,
    pub furthest_round: u32,
    /// Most frequently selected team(s), alphabetical on ties.
    pub most_selected: Vec<String>,
    pub most_selected_count: u32,
    /// Teams with enough selections, best success rate first.
    pub team_success: Vec<TeamSuccess>,
    /// Opponents that most often caused an incorrect pick.
    pub bogey_teams: Vec<String>,
    pub bogey_team_losses: u32,
    pub home: LocationSuccess,
    pub away: LocationSuccess,
    /// Round numbers with the most eliminations.
    pub bogey_rounds: Vec<u32>,
    pub bogey_round_count: u32,
}

impl StatsPanel {
    pub fn compute(predictions: &[Prediction]) -> Self {
        if predictions.is_empty() {
            return StatsPanel::default();
        }

        let games: BTreeSet<_> = predictions.iter().map(|p| p.game_id).collect();
        let furthest_round = predictions.iter().map(|p| p.round_number).max().unwrap_or(0);

        let mut selections: BTreeMap<&str, (u32, u32, u32)> = BTreeMap::new();
        let mut losses_to: BTreeMap<&str, u32> = BTreeMap::new();
        let mut eliminations_in: BTreeMap<u32, u32> = BTreeMap::new();
        let mut home = LocationSuccess::default();
        let mut away = LocationSuccess::default();

        for p in predictions {
            let entry = selections.entry(p.team_selected.as_str()).or_default();
            entry.0 += 1;
            match p.correct {
                Some(true) => entry.1 += 1,
                Some(false) => {
                    entry.2 += 1;
                    *losses_to.entry(p.team_opposing.as_str()).or_default() += 1;
                    *eliminations_in.entry(p.round_number).or_default() += 1;
                }
                None => {}
            }

            let loc = match p.team_selected_location {
                TeamLocation::Home => &mut home,
                TeamLocation::Away => &mut away,
            };
            loc.total += 1;
            if p.correct == Some(true) {
                loc.correct += 1;
            }
        }

        let (most_selected, most_selected_count) =
            leaders(selections.iter().map(|(team, s)| (team.to_string(), s.0)));
        let (bogey_teams, bogey_team_losses) =
            leaders(losses_to.iter().map(|(team, n)| (team.to_string(), *n)));
        let (bogey_rounds, bogey_round_count) =
            leaders(eliminations_in.iter().map(|(round, n)| (*round, *n)));

        let mut team_success: Vec<TeamSuccess> = selections
            .iter()
            .filter(|(_, s)| s.0 >= MIN_SELECTIONS_FOR_RATE)
            .map(|(team, &(selected, correct, incorrect))| TeamSuccess {
                team: team.to_string(),
                times_selected: selected,
                times_correct: correct,
                times_incorrect: incorrect,
                percent_correct: (f64::from(correct) / f64::from(selected) * 100.0).round() as u32,
            })
            .collect();
        team_success.sort_by(|a, b| {
            b.percent_correct
                .cmp(&a.percent_correct)
                .then_with(|| a.team.cmp(&b.team))
        });

        StatsPanel {
            games_played: games.len() as u32,
            furthest_round,
            most_selected,
            most_selected_count,
            team_success,
            bogey_teams,
            bogey_team_losses,
            home,
            away,
            bogey_rounds,
            bogey_round_count,
        }
    }

    pub fn most_successful(&self) -> Option<&TeamSuccess> {
        self.team_success.first()
    }

    pub fn least_successful(&self) -> Option<&TeamSuccess> {
        self.team_success.last()
    }
}

/// All keys sharing the maximum count, in input order.
fn leaders<K>(counts: impl Iterator<Item = (K, u32)>) -> (Vec<K>, u32) {
    let mut best = 0;
    let mut keys = Vec::new();
    for (key, count) in counts {
        if count > best {
            best = count;
            keys.clear();
            keys.push(key);
        } else if count == best && count > 0 {
            keys.push(key);
        }
    }
    (keys, best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_support::prediction;

    fn pick(game: i64, round: u32, team: &str, vs: &str, away: bool, correct: Option<bool>) -> Prediction {
        let mut p = prediction(game, round, team, correct);
        p.team_opposing = vs.to_string();
        if away {
            p.team_selected_location = TeamLocation::Away;
        }
        p
    }

    fn history() -> Vec<Prediction> {
        vec![
            pick(1, 1, "Arsenal", "Wolves", false, Some(true)),
            pick(1, 2, "Chelsea", "Spurs", true, Some(false)),
            pick(2, 1, "Arsenal", "Leeds", false, Some(true)),
            pick(2, 2, "Liverpool", "Spurs", true, Some(true)),
            pick(2, 3, "Chelsea", "Fulham", false, Some(false)),
            pick(3, 1, "Arsenal", "Everton", true, Some(false)),
            pick(3, 2, "Chelsea", "Burnley", false, None),
            pick(4, 1, "Liverpool", "Brentford", false, Some(false)),
        ]
    }

    #[test]
    fn empty_history_gives_empty_panel() {
        let panel = StatsPanel::compute(&[]);
        assert_eq!(panel, StatsPanel::default());
        assert!(panel.most_successful().is_none());
        assert_eq!(panel.home.percent(), None);
    }

    #[test]
    fn games_and_furthest_round() {
        let panel = StatsPanel::compute(&history());
        assert_eq!(panel.games_played, 4);
        assert_eq!(panel.furthest_round, 3);
    }

    #[test]
    fn most_selected_ties_are_listed() {
        let panel = StatsPanel::compute(&history());
        assert_eq!(panel.most_selected, vec!["Arsenal", "Chelsea"]);
        assert_eq!(panel.most_selected_count, 3);
    }

    #[test]
    fn success_rates_need_three_selections() {
        let panel = StatsPanel::compute(&history());
        let teams: Vec<&str> = panel.team_success.iter().map(|t| t.team.as_str()).collect();
        assert_eq!(teams, vec!["Arsenal", "Chelsea"]);
        assert_eq!(panel.most_successful().unwrap().percent_correct, 67);
        let chelsea = panel.least_successful().unwrap();
        assert_eq!(chelsea.percent_correct, 0);
        assert_eq!(chelsea.times_incorrect, 2);
    }

    #[test]
    fn bogey_team_and_round() {
        let panel = StatsPanel::compute(&history());
        assert_eq!(panel.bogey_teams, vec!["Brentford", "Everton", "Fulham", "Spurs"]);
        assert_eq!(panel.bogey_team_losses, 1);
        assert_eq!(panel.bogey_rounds, vec![1]);
        assert_eq!(panel.bogey_round_count, 2);
    }

    #[test]
    fn home_and_away_success() {
        let panel = StatsPanel::compute(&history());
        assert_eq!(panel.home, LocationSuccess { correct: 2, total: 5 });
        assert_eq!(panel.away, LocationSuccess { correct: 1, total: 3 });
        assert_eq!(panel.home.percent(), Some(40));
        assert_eq!(panel.away.percent(), Some(33));
    }
}
