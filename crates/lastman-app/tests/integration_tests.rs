// End-to-end game flows through AppState with an in-memory database.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::mpsc;

use lastman_app::app::{self, AppState};
use lastman_app::config::{
    Config, CredentialsConfig, FplConfig, NotificationConfig, PlannerConfig, SessionConfig,
};
use lastman_app::db::Database;
use lastman_app::notify::LogNotifier;
use lastman_app::protocol::{LoadEvent, SubmissionResult, UiUpdate, UserCommand};
use lastman_app::source::{FixtureSource, ReferenceData};
use lastman_core::gate::Rejection;
use lastman_core::history::GameStatus;
use lastman_core::model::{Fixture, Outcome, Team, TeamId};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Fixture source whose current round can be advanced between loads.
struct Season {
    data: Mutex<ReferenceData>,
}

impl Season {
    fn new(current_round: u32) -> Self {
        let teams = vec![
            team(1, "Arsenal"),
            team(2, "Spurs"),
            team(3, "Everton"),
            team(4, "Chelsea"),
        ];
        // Rounds 1-12; every round starts `48h * (round - current)` from now so
        // the next round's deadline is always open.
        let mut fixtures = Vec::new();
        let pairings = [[(1, 2), (3, 4)], [(4, 1), (2, 3)], [(1, 3), (4, 2)]];
        for round in 1..=12u32 {
            let offset = 48 * (i64::from(round) - i64::from(current_round));
            for (i, (home, away)) in pairings[(round as usize) % 3].iter().enumerate() {
                fixtures.push(fixture(round * 10 + i as u32, round, *home, *away, offset));
            }
        }
        Season {
            data: Mutex::new(ReferenceData {
                teams,
                fixtures,
                current_round,
                injuries: Vec::new(),
            }),
        }
    }

    /// Move the season on by one round, keeping the next deadline open.
    fn advance(&self) {
        let mut data = self.data.lock().unwrap();
        data.current_round += 1;
        for f in &mut data.fixtures {
            f.kickoff_time = f.kickoff_time.map(|t| t - Duration::hours(48));
        }
    }
}

#[async_trait]
impl FixtureSource for Season {
    async fn fixtures(&self) -> Result<Vec<Fixture>> {
        Ok(self.data.lock().unwrap().fixtures.clone())
    }
    async fn teams(&self) -> Result<Vec<Team>> {
        Ok(self.data.lock().unwrap().teams.clone())
    }
    async fn current_round(&self) -> Result<u32> {
        Ok(self.data.lock().unwrap().current_round)
    }
}

fn team(id: TeamId, name: &str) -> Team {
    Team {
        id,
        name: name.to_string(),
        short_name: name[..3].to_uppercase(),
    }
}

fn fixture(id: u32, round: u32, home: TeamId, away: TeamId, hours_from_now: i64) -> Fixture {
    Fixture {
        id,
        round,
        home_team_id: home,
        away_team_id: away,
        home_score: None,
        away_score: None,
        started: false,
        finished: false,
        finished_provisional: false,
        kickoff_time: Some(Utc::now() + Duration::hours(hours_from_now)),
        home_difficulty: 3,
        away_difficulty: 3,
    }
}

fn config(user_id: &str) -> Config {
    Config {
        session: SessionConfig {
            user_id: Some(user_id.to_string()),
            email: None,
            league_id: "office".to_string(),
        },
        planner: PlannerConfig { default_weeks: 5 },
        fpl: FplConfig {
            base_url: "http://localhost".to_string(),
            timeout_secs: 1,
        },
        notifications: NotificationConfig::default(),
        credentials: CredentialsConfig::default(),
        db_path: ":memory:".to_string(),
    }
}

struct Game {
    state: AppState,
    db: Arc<Database>,
    season: Arc<Season>,
    load_rx: mpsc::Receiver<LoadEvent>,
}

impl Game {
    fn start(current_round: u32) -> Self {
        let db = Arc::new(Database::open(":memory:").unwrap());
        db.join_league("user-1", "office").unwrap();
        db.start_game("office").unwrap();
        let season = Arc::new(Season::new(current_round));
        let (load_tx, load_rx) = mpsc::channel(16);
        let state = AppState::new(
            config("user-1"),
            season.clone(),
            db.clone(),
            Arc::new(LogNotifier),
            db.clone(),
            load_tx,
        );
        Game {
            state,
            db,
            season,
            load_rx,
        }
    }

    async fn reload(&mut self) {
        self.state.refresh(true);
        let event = self.load_rx.recv().await.unwrap();
        assert_eq!(event.generation(), self.state.refresh_generation);
        match event {
            LoadEvent::Loaded { data, .. } => self.state.apply_loaded(*data),
            LoadEvent::Failed { message, .. } => panic!("load failed: {message}"),
        }
    }

    async fn submit(&mut self, team: &str, outcome: Outcome) -> SubmissionResult {
        self.state.submit(Some(team.to_string()), Some(outcome)).await
    }

    /// Resolve the latest unresolved prediction.
    fn resolve_latest(&self, correct: bool) {
        let predictions = self.db.load_predictions("user-1").unwrap();
        let latest = predictions
            .iter()
            .filter(|p| p.correct.is_none())
            .max_by_key(|p| p.id)
            .expect("an unresolved prediction");
        let (mine, theirs) = if correct { (2, 0) } else { (0, 1) };
        self.db
            .record_result(latest.id, correct, Some(mine), Some(theirs))
            .unwrap();
    }
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn first_pick_then_resolved_correct_marks_team_used() {
    let mut game = Game::start(5);
    game.reload().await;
    assert_eq!(game.state.prediction_round(), 6);

    let result = game.submit("Arsenal", Outcome::Win).await;
    assert!(matches!(result, SubmissionResult::Accepted { .. }), "{result:?}");

    game.resolve_latest(true);
    game.reload().await;

    let state = &game.state.pick_state;
    assert_eq!(state.used_team_names.len(), 1);
    assert!(state.has_used("Arsenal"));
    assert!(!state.is_eliminated);
    assert!(!state.is_pending);
    assert_eq!(state.status(), GameStatus::Active);
}

#[tokio::test]
async fn survive_two_rounds_then_eliminated() {
    let mut game = Game::start(5);
    game.reload().await;

    assert!(matches!(
        game.submit("Arsenal", Outcome::Win).await,
        SubmissionResult::Accepted { .. }
    ));
    game.resolve_latest(true);
    game.season.advance();
    game.reload().await;

    // Same team again is refused before reaching the store.
    assert_eq!(
        game.submit("Arsenal", Outcome::Draw).await,
        SubmissionResult::Rejected(Rejection::TeamAlreadyUsed)
    );

    let second = game.submit("Spurs", Outcome::Draw).await;
    let SubmissionResult::Accepted { summary } = second else {
        panic!("expected acceptance, got {second:?}");
    };
    assert_eq!(summary.round_number, 2);

    game.resolve_latest(false);
    game.season.advance();
    game.reload().await;

    assert_eq!(game.state.pick_state.status(), GameStatus::Eliminated);
    assert_eq!(
        game.submit("Everton", Outcome::Win).await,
        SubmissionResult::Rejected(Rejection::AlreadyEliminated)
    );

    let snapshot = game.state.build_snapshot();
    assert_eq!(snapshot.current_game.len(), 2);
    assert_eq!(snapshot.stats.games_played, 1);
    assert_eq!(snapshot.stats.furthest_round, 2);
    assert_eq!(snapshot.stats.bogey_rounds, vec![2]);
}

#[tokio::test]
async fn new_game_resets_used_teams() {
    let mut game = Game::start(5);
    game.reload().await;
    game.submit("Arsenal", Outcome::Win).await;
    game.resolve_latest(false);
    game.reload().await;
    assert_eq!(game.state.pick_state.status(), GameStatus::Eliminated);

    game.db.start_game("office").unwrap();
    game.reload().await;
    assert_eq!(game.state.pick_state.status(), GameStatus::NotEntered);
    assert!(matches!(
        game.submit("Arsenal", Outcome::Win).await,
        SubmissionResult::Accepted { .. }
    ));

    // History across games feeds the stats panel.
    game.reload().await;
    let stats = game.state.build_snapshot().stats;
    assert_eq!(stats.games_played, 2);
    assert_eq!(stats.most_selected, vec!["Arsenal"]);
    assert_eq!(stats.most_selected_count, 2);
}

#[tokio::test]
async fn user_outside_any_league_cannot_submit() {
    let db = Arc::new(Database::open(":memory:").unwrap());
    let season = Arc::new(Season::new(5));
    let (load_tx, mut load_rx) = mpsc::channel(16);
    let mut state = AppState::new(
        config("drifter"),
        season,
        db.clone(),
        Arc::new(LogNotifier),
        db.clone(),
        load_tx,
    );
    state.refresh(true);
    if let Some(LoadEvent::Loaded { data, .. }) = load_rx.recv().await {
        state.apply_loaded(*data);
    }
    assert_eq!(state.current_game_id, None);
    assert_eq!(
        state.submit(Some("Arsenal".into()), Some(Outcome::Win)).await,
        SubmissionResult::Failed {
            message: "You are not part of a league.".to_string()
        }
    );
}

#[tokio::test]
async fn planner_round_trip_through_event_loop() {
    let game = Game::start(5);
    let (cmd_tx, cmd_rx) = mpsc::channel(16);
    let (ui_tx, mut ui_rx) = mpsc::channel(64);
    let handle = tokio::spawn(app::run(game.load_rx, cmd_rx, ui_tx, game.state));

    async fn next_snapshot(
        ui_rx: &mut mpsc::Receiver<UiUpdate>,
    ) -> Box<lastman_app::protocol::AppSnapshot> {
        loop {
            match ui_rx.recv().await {
                Some(UiUpdate::Snapshot(s)) => return s,
                Some(_) => continue,
                None => panic!("ui channel closed"),
            }
        }
    }

    let first = next_snapshot(&mut ui_rx).await;
    assert_eq!(first.plan_grid.rounds, vec![6, 7, 8, 9, 10]);

    cmd_tx.send(UserCommand::PlanPick { team_id: 3, round: 7 }).await.unwrap();
    let planned = next_snapshot(&mut ui_rx).await;
    assert_eq!(planned.planned, vec![(7, "Everton".to_string())]);

    cmd_tx.send(UserCommand::SetWeeks(10)).await.unwrap();
    let wide = next_snapshot(&mut ui_rx).await;
    assert_eq!(wide.weeks, 10);
    assert_eq!(wide.plan_grid.rounds.len(), 10);
    assert_eq!(game.db.load_num_weeks().unwrap(), Some(10));

    // Toggling the same cell clears it.
    cmd_tx.send(UserCommand::PlanPick { team_id: 3, round: 7 }).await.unwrap();
    let cleared = next_snapshot(&mut ui_rx).await;
    assert!(cleared.planned.is_empty());

    cmd_tx.send(UserCommand::Quit).await.unwrap();
    handle.await.unwrap().unwrap();
}
