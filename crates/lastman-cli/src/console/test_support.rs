// Shared snapshot for console tests.

use chrono::{NaiveDate, TimeZone, Utc};

use lastman_app::protocol::{AppSnapshot, FixtureDay, FixtureLine};
use lastman_core::deadline::DeadlineState;
use lastman_core::history::{GameStatus, PickState};
use lastman_core::model::Team;
use lastman_core::planner::PlanGrid;
use lastman_core::stats::StatsPanel;

pub fn snapshot() -> AppSnapshot {
    AppSnapshot {
        signed_in: true,
        loading: false,
        current_round: 5,
        prediction_round: 6,
        current_game_id: Some(1),
        pick_state: PickState::default(),
        status: GameStatus::NotEntered,
        deadline: DeadlineState::open(),
        weeks: 5,
        teams: vec![
            Team { id: 1, name: "Arsenal".into(), short_name: "ARS".into() },
            Team { id: 13, name: "Man City".into(), short_name: "MCI".into() },
        ],
        plan_grid: PlanGrid::default(),
        planned: Vec::new(),
        week_fixtures: Vec::new(),
        current_game: Vec::new(),
        stats: StatsPanel::default(),
        injuries: Vec::new(),
    }
}

fn line(id: u32, hour: u32, home: &str, away: &str, score: Option<(u32, u32)>) -> FixtureLine {
    FixtureLine {
        fixture_id: id,
        kickoff_time: Some(Utc.with_ymd_and_hms(2025, 1, 18, hour, 0, 0).unwrap()),
        home_team: home.into(),
        away_team: away.into(),
        home_score: score.map(|s| s.0),
        away_score: score.map(|s| s.1),
        finished: score.is_some(),
        home_form: "WWDLW".into(),
        away_form: "LL".into(),
    }
}

/// One matchday: Arsenal v Spurs still to play, Chelsea 2-1 Fulham finished.
pub fn week() -> Vec<FixtureDay> {
    vec![FixtureDay {
        date: NaiveDate::from_ymd_opt(2025, 1, 18).unwrap(),
        fixtures: vec![
            line(1, 15, "Arsenal", "Spurs", None),
            line(2, 17, "Chelsea", "Fulham", Some((2, 1))),
        ],
    }]
}
