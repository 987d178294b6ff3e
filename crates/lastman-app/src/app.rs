// Application state and orchestration logic.
//
// The event loop owns all mutable state. Loads run in spawned tasks and
// report back over a channel tagged with the refresh generation that started
// them, so only the most recent refresh is ever applied.

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use lastman_core::deadline::DeadlineState;
use lastman_core::fixture_index::FixtureIndex;
use lastman_core::gate::{self, PredictionSummary, SubmissionCandidate, Verdict};
use lastman_core::history::{self, PickState};
use lastman_core::model::{
    Fixture, GameId, Injury, Outcome, Prediction, Team, TeamId, MAX_ROUND, MIN_ROUND,
};
use lastman_core::planner::{Horizon, Planner};
use lastman_core::schedule;
use lastman_core::stats::StatsPanel;

use crate::config::Config;
use crate::db::Database;
use crate::notify::Notifier;
use crate::protocol::{
    AppSnapshot, FixtureDay, FixtureLine, FixtureWeek, InjuryLine, LoadEvent, LoadedData,
    PersonalData, SubmissionResult, TeamInjuries, UiUpdate, UserCommand,
};
use crate::source::{FixtureSource, PredictionStore, StoreError};

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

pub struct AppState {
    pub config: Config,
    pub fixture_source: Arc<dyn FixtureSource>,
    pub store: Arc<dyn PredictionStore>,
    pub notifier: Arc<dyn Notifier>,
    /// Local preferences (planner horizon).
    pub db: Arc<Database>,

    pub teams: Vec<Team>,
    pub fixtures: Vec<Fixture>,
    /// Rebuilt whenever `fixtures` or `teams` are replaced.
    pub index: FixtureIndex,
    pub current_round: u32,
    pub injuries: Vec<Injury>,
    pub predictions: Vec<Prediction>,
    pub current_game_id: Option<GameId>,
    pub pick_state: PickState,
    pub planner: Planner,

    pub loading: bool,
    /// Set while a refresh that includes reference data is outstanding, so
    /// a superseding personal-only refresh still fetches it.
    reference_pending: bool,
    pub current_load_task: Option<tokio::task::JoinHandle<()>>,
    /// Incremented by every refresh. Load events carrying an older value are
    /// discarded in `handle_load_event`.
    pub refresh_generation: u64,
    pub load_tx: mpsc::Sender<LoadEvent>,
}

impl AppState {
    pub fn new(
        config: Config,
        fixture_source: Arc<dyn FixtureSource>,
        store: Arc<dyn PredictionStore>,
        notifier: Arc<dyn Notifier>,
        db: Arc<Database>,
        load_tx: mpsc::Sender<LoadEvent>,
    ) -> Self {
        let weeks = match db.load_num_weeks() {
            Ok(Some(saved)) => saved,
            Ok(None) => config.planner.default_weeks,
            Err(e) => {
                warn!("Failed to load planner preference: {e:#}");
                config.planner.default_weeks
            }
        };

        AppState {
            config,
            fixture_source,
            store,
            notifier,
            db,
            teams: Vec::new(),
            fixtures: Vec::new(),
            index: FixtureIndex::default(),
            current_round: MIN_ROUND,
            injuries: Vec::new(),
            predictions: Vec::new(),
            current_game_id: None,
            pick_state: PickState::default(),
            planner: Planner::new(Horizon::new(weeks)),
            loading: false,
            reference_pending: false,
            current_load_task: None,
            refresh_generation: 0,
            load_tx,
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        self.config.session.user_id.as_deref()
    }

    pub fn is_signed_in(&self) -> bool {
        self.user_id().is_some()
    }

    /// The round predictions are currently being made for.
    pub fn prediction_round(&self) -> u32 {
        self.current_round + 1
    }

    pub fn week_fixtures(&self) -> Vec<Fixture> {
        schedule::fixtures_for_round(&self.fixtures, self.prediction_round())
    }

    /// Cancel the current load task if one is running.
    pub fn cancel_load_task(&mut self) {
        if let Some(handle) = self.current_load_task.take() {
            handle.abort();
            debug!("Cancelled previous load task");
        }
    }

    /// Start a new load. Any in-flight load is superseded.
    pub fn refresh(&mut self, include_reference: bool) {
        self.cancel_load_task();
        self.refresh_generation += 1;
        let generation = self.refresh_generation;

        let include_reference = include_reference || self.reference_pending;
        self.reference_pending = include_reference;
        self.loading = true;

        let source = self.fixture_source.clone();
        let store = self.store.clone();
        let user_id = self.config.session.user_id.clone();
        let tx = self.load_tx.clone();

        info!(
            "Refresh generation {} (reference: {})",
            generation, include_reference
        );
        let handle = tokio::spawn(async move {
            let event = match load_data(source, store, user_id, include_reference).await {
                Ok(data) => LoadEvent::Loaded {
                    generation,
                    data: Box::new(data),
                },
                Err(e) => LoadEvent::Failed {
                    generation,
                    message: format!("{e:#}"),
                },
            };
            let _ = tx.send(event).await;
        });
        self.current_load_task = Some(handle);
    }

    /// Apply loaded data and recompute everything derived from it.
    pub fn apply_loaded(&mut self, data: LoadedData) {
        if let Some(reference) = data.reference {
            let mut teams = reference.teams;
            teams.sort_by(|a, b| a.name.cmp(&b.name));
            self.index = FixtureIndex::build(&reference.fixtures, &teams);
            self.teams = teams;
            self.fixtures = reference.fixtures;
            self.current_round = reference.current_round;
            self.injuries = reference.injuries;
            self.reference_pending = false;
            info!(
                "Loaded {} teams, {} fixtures, {} injuries; current round {}",
                self.teams.len(),
                self.fixtures.len(),
                self.injuries.len(),
                self.current_round
            );
        }

        let personal = data.personal.unwrap_or_default();
        self.predictions = personal.predictions;
        self.current_game_id = personal.current_game_id;
        self.pick_state = history::resolve(&self.predictions, self.current_game_id);
        debug!(
            "Pick state: {:?} ({} predictions, game {:?})",
            self.pick_state.status(),
            self.predictions.len(),
            self.current_game_id
        );
    }

    // -----------------------------------------------------------------------
    // Submission
    // -----------------------------------------------------------------------

    /// Gate and store a prediction for the current prediction week.
    ///
    /// The deadline is recomputed here rather than taken from the last
    /// snapshot.
    pub async fn submit(&mut self, team: Option<String>, outcome: Option<Outcome>) -> SubmissionResult {
        let Some(user_id) = self.config.session.user_id.clone() else {
            return SubmissionResult::Failed {
                message: "Sign in to submit a prediction.".to_string(),
            };
        };

        let candidate = SubmissionCandidate {
            team_selected: team,
            outcome,
            round: self.prediction_round(),
        };
        let deadline = DeadlineState::now(&self.week_fixtures());

        if let Verdict::Rejected(reason) =
            gate::submit(&candidate, &self.pick_state, &deadline, &self.index)
        {
            info!("Submission rejected: {:?}", reason);
            return SubmissionResult::Rejected(reason);
        }

        let Some(game_id) = self.current_game_id else {
            return SubmissionResult::Failed {
                message: "You are not part of a league.".to_string(),
            };
        };

        let Some(record) = gate::prepare_record(
            &candidate,
            &self.pick_state,
            &self.index,
            &user_id,
            game_id,
            Utc::now(),
        ) else {
            return SubmissionResult::Rejected(gate::Rejection::NoFixture);
        };

        match self.store.insert_prediction(&record).await {
            Ok(id) => {
                let summary = PredictionSummary::from_record(&record);
                info!(
                    "Stored prediction {} for user={} game={} round={}: {}",
                    id,
                    user_id,
                    game_id,
                    record.round_number,
                    summary.describe()
                );
                self.spawn_notification(&summary);
                SubmissionResult::Accepted { summary }
            }
            Err(StoreError::DuplicateTeam { team, .. }) => {
                info!("Store refused duplicate pick of {}", team);
                SubmissionResult::Rejected(gate::Rejection::TeamAlreadyUsed)
            }
            Err(e) => {
                warn!("Failed to store prediction: {e:#}");
                SubmissionResult::Failed {
                    message: self.fallback_message(),
                }
            }
        }
    }

    fn fallback_message(&self) -> String {
        match &self.config.notifications.fallback_email {
            Some(email) => format!("Failed to submit prediction. Please email your prediction to {email}."),
            None => "Failed to submit prediction. Please send your prediction to the league organiser."
                .to_string(),
        }
    }

    /// Fire-and-forget; a failed notification never affects the submission.
    fn spawn_notification(&self, summary: &PredictionSummary) {
        let Some(email) = self.config.session.email.clone() else {
            debug!("No email configured; skipping notification");
            return;
        };
        let notifier = self.notifier.clone();
        let summary = summary.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.notify_submission(&email, &summary).await {
                warn!("Submission notification failed: {e:#}");
            }
        });
    }

    // -----------------------------------------------------------------------
    // Planner
    // -----------------------------------------------------------------------

    /// Plan `team_id` for `round`. Rounds outside the horizon, locked teams
    /// and teams without a fixture leave the plan unchanged. Locked is
    /// reported before a missing fixture, as in the grid.
    pub fn plan_pick(&mut self, team_id: TeamId, round: u32) -> Result<(), String> {
        if !self.planner.horizon().rounds(self.current_round).contains(&round) {
            return Err(format!("Round {round} is outside the planning window."));
        }
        if self.planner.is_team_locked(&self.index, team_id, &self.pick_state) {
            return Err("That team has already been used in this game.".to_string());
        }
        if self.planner.candidate(&self.index, team_id, round).is_none() {
            return Err("That team has no fixture in that round.".to_string());
        }
        self.planner.pick(team_id, round);
        Ok(())
    }

    pub fn set_weeks(&mut self, weeks: u8) {
        let horizon = Horizon::new(weeks);
        self.planner.set_horizon(horizon);
        if let Err(e) = self.db.save_num_weeks(horizon.weeks()) {
            warn!("Failed to save planner preference: {e:#}");
        }
        info!("Planner horizon set to {} weeks", horizon.weeks());
    }

    // -----------------------------------------------------------------------
    // Snapshot
    // -----------------------------------------------------------------------

    pub fn build_snapshot(&self) -> AppSnapshot {
        let signed_in = self.is_signed_in();
        let prediction_round = self.prediction_round();
        let deadline = DeadlineState::now(&self.week_fixtures());

        let (pick_state, current_game, stats) = if signed_in {
            let mut current: Vec<Prediction> = self
                .predictions
                .iter()
                .filter(|p| Some(p.game_id) == self.current_game_id)
                .cloned()
                .collect();
            current.sort_by_key(|p| p.round_number);
            (
                self.pick_state.clone(),
                current,
                StatsPanel::compute(&self.predictions),
            )
        } else {
            (PickState::default(), Vec::new(), StatsPanel::default())
        };

        let planned = self
            .planner
            .plan()
            .iter()
            .map(|(round, team_id)| (round, self.team_name(team_id)))
            .collect();

        AppSnapshot {
            signed_in,
            loading: self.loading,
            current_round: self.current_round,
            prediction_round,
            current_game_id: self.current_game_id.filter(|_| signed_in),
            status: pick_state.status(),
            pick_state,
            deadline,
            weeks: self.planner.horizon().weeks(),
            teams: self.teams.clone(),
            plan_grid: self
                .planner
                .grid(&self.index, &self.teams, &self.pick_state, self.current_round),
            planned,
            week_fixtures: self.fixture_days(prediction_round),
            current_game,
            stats,
            injuries: self.injury_report(),
        }
    }

    /// Fixtures and results for any gameweek of the season.
    pub fn fixture_week(&self, round: u32) -> Result<FixtureWeek, String> {
        if !(MIN_ROUND..=MAX_ROUND).contains(&round) {
            return Err(format!(
                "Gameweek {round} is outside the season ({MIN_ROUND}-{MAX_ROUND})."
            ));
        }
        Ok(FixtureWeek {
            round,
            days: self.fixture_days(round),
        })
    }

    fn injury_report(&self) -> Vec<TeamInjuries> {
        let mut report: Vec<TeamInjuries> = Vec::new();
        for injury in &self.injuries {
            let line = InjuryLine {
                player: injury.player_name.clone(),
                chance_of_playing: injury.chance_of_playing,
                news: injury.news.clone(),
            };
            match report.iter_mut().find(|t| t.team_id == injury.team_id) {
                Some(team) => team.players.push(line),
                None => report.push(TeamInjuries {
                    team_id: injury.team_id,
                    team: self.team_name(injury.team_id),
                    players: vec![line],
                }),
            }
        }
        report.sort_by(|a, b| a.team.cmp(&b.team));
        for team in &mut report {
            team.players
                .sort_by_key(|p| (p.chance_of_playing.unwrap_or(0), p.player.clone()));
        }
        report
    }

    fn team_name(&self, team_id: TeamId) -> String {
        self.index
            .team(team_id)
            .map(|t| t.name.clone())
            .unwrap_or_else(|| format!("Team {team_id}"))
    }

    fn fixture_days(&self, round: u32) -> Vec<FixtureDay> {
        schedule::group_by_date(&self.fixtures, round)
            .into_iter()
            .map(|(date, fixtures)| FixtureDay {
                date,
                fixtures: fixtures
                    .iter()
                    .map(|f| FixtureLine {
                        fixture_id: f.id,
                        kickoff_time: f.kickoff_time,
                        home_team: self.team_name(f.home_team_id),
                        away_team: self.team_name(f.away_team_id),
                        home_score: f.home_score,
                        away_score: f.away_score,
                        finished: f.finished,
                        home_form: schedule::form_string(&schedule::team_form(
                            &self.fixtures,
                            f.home_team_id,
                            round,
                        )),
                        away_form: schedule::form_string(&schedule::team_form(
                            &self.fixtures,
                            f.away_team_id,
                            round,
                        )),
                    })
                    .collect(),
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Load task
// ---------------------------------------------------------------------------

async fn load_personal(store: &dyn PredictionStore, user_id: &str) -> Result<PersonalData> {
    let (predictions, current_game_id) = futures_util::try_join!(
        store.predictions_for_user(user_id),
        store.current_game_id(user_id)
    )?;
    Ok(PersonalData {
        predictions,
        current_game_id,
    })
}

async fn load_data(
    source: Arc<dyn FixtureSource>,
    store: Arc<dyn PredictionStore>,
    user_id: Option<String>,
    include_reference: bool,
) -> Result<LoadedData> {
    let reference = async {
        if include_reference {
            source.reference().await.map(Some)
        } else {
            Ok(None)
        }
    };
    let personal = async {
        match user_id.as_deref() {
            Some(id) => load_personal(store.as_ref(), id).await.map(Some),
            None => Ok(None),
        }
    };
    let (reference, personal) = futures_util::try_join!(reference, personal)?;
    Ok(LoadedData { reference, personal })
}

// ---------------------------------------------------------------------------
// Main event loop
// ---------------------------------------------------------------------------

/// Run the main application event loop.
///
/// Starts an initial refresh, then listens on two channels using
/// `tokio::select!`:
/// 1. Load events from refresh tasks
/// 2. User commands from the front end
///
/// Pushes UI updates through `ui_tx`.
pub async fn run(
    mut load_rx: mpsc::Receiver<LoadEvent>,
    mut cmd_rx: mpsc::Receiver<UserCommand>,
    ui_tx: mpsc::Sender<UiUpdate>,
    mut state: AppState,
) -> Result<()> {
    info!("Application event loop started");

    state.refresh(true);
    let _ = ui_tx.send(UiUpdate::Loading).await;

    loop {
        tokio::select! {
            event = load_rx.recv() => {
                match event {
                    Some(event) => handle_load_event(&mut state, event, &ui_tx).await,
                    None => {
                        info!("Load channel closed, shutting down");
                        break;
                    }
                }
            }

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(UserCommand::Quit) => {
                        info!("Quit command received, shutting down");
                        break;
                    }
                    Some(cmd) => handle_user_command(&mut state, cmd, &ui_tx).await,
                    None => {
                        info!("Command channel closed, shutting down");
                        break;
                    }
                }
            }
        }
    }

    state.cancel_load_task();
    Ok(())
}

async fn handle_load_event(state: &mut AppState, event: LoadEvent, ui_tx: &mpsc::Sender<UiUpdate>) {
    if event.generation() != state.refresh_generation {
        debug!(
            "Discarding stale load event (event gen: {}, current gen: {})",
            event.generation(),
            state.refresh_generation
        );
        return;
    }

    state.loading = false;
    state.current_load_task = None;
    match event {
        LoadEvent::Loaded { data, .. } => {
            state.apply_loaded(*data);
            let _ = ui_tx
                .send(UiUpdate::Snapshot(Box::new(state.build_snapshot())))
                .await;
        }
        LoadEvent::Failed { message, .. } => {
            warn!("Load failed: {}", message);
            let _ = ui_tx
                .send(UiUpdate::Error(format!("Failed to load data: {message}")))
                .await;
        }
    }
}

async fn handle_user_command(state: &mut AppState, cmd: UserCommand, ui_tx: &mpsc::Sender<UiUpdate>) {
    match cmd {
        UserCommand::Refresh => {
            state.refresh(true);
            let _ = ui_tx.send(UiUpdate::Loading).await;
        }
        UserCommand::PlanPick { team_id, round } => match state.plan_pick(team_id, round) {
            Ok(()) => {
                let _ = ui_tx
                    .send(UiUpdate::Snapshot(Box::new(state.build_snapshot())))
                    .await;
            }
            Err(message) => {
                debug!("Plan pick team={} round={} ignored: {}", team_id, round, message);
                let _ = ui_tx.send(UiUpdate::Error(message)).await;
            }
        },
        UserCommand::ClearPlan => {
            state.planner.clear();
            let _ = ui_tx
                .send(UiUpdate::Snapshot(Box::new(state.build_snapshot())))
                .await;
        }
        UserCommand::SetWeeks(weeks) => {
            state.set_weeks(weeks);
            let _ = ui_tx
                .send(UiUpdate::Snapshot(Box::new(state.build_snapshot())))
                .await;
        }
        UserCommand::BrowseFixtures { round } => {
            let update = match state.fixture_week(round) {
                Ok(week) => UiUpdate::Fixtures(week),
                Err(message) => UiUpdate::Error(message),
            };
            let _ = ui_tx.send(update).await;
        }
        UserCommand::Submit { team, outcome } => {
            let result = state.submit(team, outcome).await;
            let accepted = matches!(result, SubmissionResult::Accepted { .. });
            let _ = ui_tx.send(UiUpdate::SubmissionResult(result)).await;
            if accepted {
                state.refresh(false);
                let _ = ui_tx.send(UiUpdate::Loading).await;
            }
        }
        UserCommand::Quit => {
            // Handled in the main loop
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
