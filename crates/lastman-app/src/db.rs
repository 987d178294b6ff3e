// SQLite persistence: cached reference data, games, predictions and
// client preferences.

use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use lastman_core::model::{
    Fixture, GameId, NewPrediction, Outcome, Prediction, Team, TeamLocation, MIN_ROUND,
};

use crate::source::{FixtureSource, PredictionStore, StoreError};

/// SQLite-backed store for teams, fixtures, league games, predictions and
/// key/value preferences.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Key under which the planner horizon preference is stored.
    pub const NUM_WEEKS_KEY: &'static str = "planner:num_weeks";

    /// Key caching the last known current round from the fixture source.
    const CURRENT_ROUND_KEY: &'static str = "fpl:current_round";

    /// Open (or create) a SQLite database at `path` and ensure all tables
    /// exist. Pass `":memory:"` for an ephemeral in-memory database.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS teams (
                id         INTEGER PRIMARY KEY,
                name       TEXT NOT NULL,
                short_name TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS fixtures (
                id                   INTEGER PRIMARY KEY,
                round                INTEGER NOT NULL,
                home_team_id         INTEGER NOT NULL,
                away_team_id         INTEGER NOT NULL,
                home_score           INTEGER,
                away_score           INTEGER,
                started              INTEGER NOT NULL DEFAULT 0,
                finished             INTEGER NOT NULL DEFAULT 0,
                finished_provisional INTEGER NOT NULL DEFAULT 0,
                kickoff_time         TEXT,
                home_difficulty      INTEGER NOT NULL,
                away_difficulty      INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS games (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                league_id  TEXT NOT NULL,
                started_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE IF NOT EXISTS user_leagues (
                user_id   TEXT PRIMARY KEY,
                league_id TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS predictions (
                id                     INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id                TEXT NOT NULL,
                game_id                INTEGER NOT NULL REFERENCES games(id),
                round_number           INTEGER NOT NULL,
                team_selected          TEXT NOT NULL,
                team_opposing          TEXT NOT NULL,
                team_selected_location TEXT NOT NULL,
                outcome_selected       TEXT NOT NULL,
                correct                INTEGER,
                fpl_round              INTEGER,
                team_selected_score    INTEGER,
                team_opposing_score    INTEGER,
                submitted_at           TEXT NOT NULL,
                UNIQUE(user_id, game_id, team_selected)
            );

            CREATE INDEX IF NOT EXISTS idx_predictions_user ON predictions(user_id);

            CREATE TABLE IF NOT EXISTS preferences (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            ",
        )
        .context("failed to create database schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the database connection.
    ///
    /// Panics if the mutex is poisoned (another thread panicked while
    /// holding the lock).
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    // ------------------------------------------------------------------
    // Preferences (key/value JSON)
    // ------------------------------------------------------------------

    /// Persist a JSON value under `key`, replacing any previous value.
    pub fn save_state(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        let conn = self.conn();
        let json_str = serde_json::to_string(value).context("failed to serialize state value")?;
        conn.execute(
            "INSERT OR REPLACE INTO preferences (key, value) VALUES (?1, ?2)",
            params![key, json_str],
        )
        .context("failed to save state")?;
        Ok(())
    }

    /// Load a previously saved JSON value by `key`.
    pub fn load_state(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let conn = self.conn();
        let json_str: Option<String> = conn
            .query_row(
                "SELECT value FROM preferences WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .context("failed to query preferences")?;

        match json_str {
            Some(s) => {
                let value = serde_json::from_str(&s).context("failed to deserialize state value")?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    pub fn load_num_weeks(&self) -> Result<Option<u8>> {
        let value = self.load_state(Self::NUM_WEEKS_KEY)?;
        Ok(value
            .and_then(|v| v.as_u64())
            .and_then(|n| u8::try_from(n).ok()))
    }

    pub fn save_num_weeks(&self, weeks: u8) -> Result<()> {
        self.save_state(Self::NUM_WEEKS_KEY, &serde_json::Value::from(weeks))
    }

    // ------------------------------------------------------------------
    // Leagues and games
    // ------------------------------------------------------------------

    /// Put `user_id` in `league_id`, replacing any previous membership.
    pub fn join_league(&self, user_id: &str, league_id: &str) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO user_leagues (user_id, league_id) VALUES (?1, ?2)
             ON CONFLICT(user_id) DO UPDATE SET league_id = excluded.league_id",
            params![user_id, league_id],
        )
        .context("failed to join league")?;
        Ok(())
    }

    pub fn league_of(&self, user_id: &str) -> Result<Option<String>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT league_id FROM user_leagues WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )
        .optional()
        .context("failed to query league membership")
    }

    /// Start a new game in a league. Returns the new game id, which becomes
    /// the league's current game.
    pub fn start_game(&self, league_id: &str) -> Result<GameId> {
        let conn = self.conn();
        let id: GameId = conn
            .query_row(
                "INSERT INTO games (league_id) VALUES (?1) RETURNING id",
                params![league_id],
                |row| row.get(0),
            )
            .context("failed to start game")?;
        info!("Started game {} in league {}", id, league_id);
        Ok(id)
    }

    /// Latest game in the user's league, `None` if the user is in no league
    /// or the league has no games.
    pub fn latest_game_for_user(&self, user_id: &str) -> Result<Option<GameId>> {
        let conn = self.conn();
        let id: Option<GameId> = conn
            .query_row(
                "SELECT MAX(g.id) FROM games g
                 JOIN user_leagues ul ON ul.league_id = g.league_id
                 WHERE ul.user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .context("failed to query current game")?;
        Ok(id)
    }

    // ------------------------------------------------------------------
    // Predictions
    // ------------------------------------------------------------------

    /// Insert a prediction row. A second pick of the same team within a game
    /// fails with [`StoreError::DuplicateTeam`].
    pub fn insert_prediction_row(&self, record: &NewPrediction) -> Result<i64, StoreError> {
        let conn = self.conn();
        let result = conn.query_row(
            "INSERT INTO predictions
                (user_id, game_id, round_number, team_selected, team_opposing,
                 team_selected_location, outcome_selected, fpl_round, submitted_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             RETURNING id",
            params![
                record.user_id,
                record.game_id,
                record.round_number,
                record.team_selected,
                record.team_opposing,
                record.team_selected_location.display_str(),
                record.outcome_selected.display_str(),
                record.fpl_round,
                record.submitted_at.to_rfc3339(),
            ],
            |row| row.get(0),
        );

        match result {
            Ok(id) => {
                debug!(
                    "Inserted prediction {} for user={} game={}",
                    id, record.user_id, record.game_id
                );
                Ok(id)
            }
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
            {
                Err(StoreError::DuplicateTeam {
                    team: record.team_selected.clone(),
                    game_id: record.game_id,
                })
            }
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY =>
            {
                Err(StoreError::UnknownGame(record.game_id))
            }
            Err(e) => Err(StoreError::Backend(
                anyhow::Error::new(e).context("failed to insert prediction"),
            )),
        }
    }

    pub fn load_predictions(&self, user_id: &str) -> Result<Vec<Prediction>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT id, user_id, game_id, round_number, team_selected, team_opposing,
                        team_selected_location, outcome_selected, correct, fpl_round,
                        team_selected_score, team_opposing_score
                 FROM predictions WHERE user_id = ?1
                 ORDER BY game_id, round_number",
            )
            .context("failed to prepare load_predictions query")?;

        let rows = stmt
            .query_map(params![user_id], |row| {
                Ok((
                    Prediction {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        game_id: row.get(2)?,
                        round_number: row.get(3)?,
                        team_selected: row.get(4)?,
                        team_opposing: row.get(5)?,
                        team_selected_location: TeamLocation::Home,
                        outcome_selected: Outcome::Win,
                        correct: row.get(8)?,
                        fpl_round: row.get(9)?,
                        team_selected_score: row.get(10)?,
                        team_opposing_score: row.get(11)?,
                    },
                    row.get::<_, String>(6)?,
                    row.get::<_, String>(7)?,
                ))
            })
            .context("failed to query predictions")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map prediction rows")?;

        rows.into_iter()
            .map(|(mut p, location, outcome)| {
                p.team_selected_location = TeamLocation::from_str_location(&location)
                    .with_context(|| format!("prediction {} has a bad location", p.id))?;
                p.outcome_selected = Outcome::from_str_outcome(&outcome)
                    .with_context(|| format!("prediction {} has a bad outcome", p.id))?;
                Ok(p)
            })
            .collect()
    }

    /// Record the final outcome of a prediction. Called by whatever process
    /// resolves results after matches finish.
    pub fn record_result(
        &self,
        prediction_id: i64,
        correct: bool,
        team_selected_score: Option<u32>,
        team_opposing_score: Option<u32>,
    ) -> Result<()> {
        let conn = self.conn();
        let updated = conn
            .execute(
                "UPDATE predictions
                 SET correct = ?2, team_selected_score = ?3, team_opposing_score = ?4
                 WHERE id = ?1",
                params![prediction_id, correct, team_selected_score, team_opposing_score],
            )
            .context("failed to record prediction result")?;
        if updated == 0 {
            anyhow::bail!("no prediction with id {prediction_id}");
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Reference data cache
    // ------------------------------------------------------------------

    /// Replace the cached teams, fixtures and current round in one
    /// transaction.
    pub fn cache_reference(&self, teams: &[Team], fixtures: &[Fixture], current_round: u32) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin cache transaction")?;

        tx.execute("DELETE FROM teams", []).context("failed to clear teams")?;
        tx.execute("DELETE FROM fixtures", []).context("failed to clear fixtures")?;

        for team in teams {
            tx.execute(
                "INSERT INTO teams (id, name, short_name) VALUES (?1, ?2, ?3)",
                params![team.id, team.name, team.short_name],
            )
            .context("failed to cache team")?;
        }

        for f in fixtures {
            tx.execute(
                "INSERT INTO fixtures
                    (id, round, home_team_id, away_team_id, home_score, away_score, started,
                     finished, finished_provisional, kickoff_time, home_difficulty, away_difficulty)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    f.id,
                    f.round,
                    f.home_team_id,
                    f.away_team_id,
                    f.home_score,
                    f.away_score,
                    f.started,
                    f.finished,
                    f.finished_provisional,
                    f.kickoff_time.map(|t| t.to_rfc3339()),
                    f.home_difficulty,
                    f.away_difficulty,
                ],
            )
            .context("failed to cache fixture")?;
        }

        tx.execute(
            "INSERT OR REPLACE INTO preferences (key, value) VALUES (?1, ?2)",
            params![Self::CURRENT_ROUND_KEY, current_round.to_string()],
        )
        .context("failed to cache current round")?;

        tx.commit().context("failed to commit reference cache")?;
        debug!(
            "Cached {} teams, {} fixtures, round {}",
            teams.len(),
            fixtures.len(),
            current_round
        );
        Ok(())
    }

    pub fn load_teams(&self) -> Result<Vec<Team>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT id, name, short_name FROM teams ORDER BY name")
            .context("failed to prepare load_teams query")?;
        let teams = stmt
            .query_map([], |row| {
                Ok(Team {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    short_name: row.get(2)?,
                })
            })
            .context("failed to query teams")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map team rows")?;
        Ok(teams)
    }

    pub fn load_fixtures(&self) -> Result<Vec<Fixture>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT id, round, home_team_id, away_team_id, home_score, away_score, started,
                        finished, finished_provisional, kickoff_time, home_difficulty, away_difficulty
                 FROM fixtures ORDER BY round, kickoff_time, id",
            )
            .context("failed to prepare load_fixtures query")?;
        let rows = stmt
            .query_map([], |row| {
                let kickoff: Option<String> = row.get(9)?;
                Ok((
                    Fixture {
                        id: row.get(0)?,
                        round: row.get(1)?,
                        home_team_id: row.get(2)?,
                        away_team_id: row.get(3)?,
                        home_score: row.get(4)?,
                        away_score: row.get(5)?,
                        started: row.get(6)?,
                        finished: row.get(7)?,
                        finished_provisional: row.get(8)?,
                        kickoff_time: None,
                        home_difficulty: row.get(10)?,
                        away_difficulty: row.get(11)?,
                    },
                    kickoff,
                ))
            })
            .context("failed to query fixtures")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map fixture rows")?;

        rows.into_iter()
            .map(|(mut f, kickoff)| {
                f.kickoff_time = kickoff
                    .map(|s| DateTime::parse_from_rfc3339(&s).map(|t| t.with_timezone(&Utc)))
                    .transpose()
                    .with_context(|| format!("fixture {} has a bad kickoff time", f.id))?;
                Ok(f)
            })
            .collect()
    }

    /// Cached current round, defaulting to the first round when nothing has
    /// been cached yet.
    pub fn cached_current_round(&self) -> Result<u32> {
        let conn = self.conn();
        let value: Option<String> = conn
            .query_row(
                "SELECT value FROM preferences WHERE key = ?1",
                params![Self::CURRENT_ROUND_KEY],
                |row| row.get(0),
            )
            .optional()
            .context("failed to query cached round")?;
        Ok(value
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(MIN_ROUND))
    }
}

// ---------------------------------------------------------------------------
// Collaborator trait implementations
// ---------------------------------------------------------------------------

#[async_trait]
impl PredictionStore for Database {
    async fn predictions_for_user(&self, user_id: &str) -> Result<Vec<Prediction>> {
        self.load_predictions(user_id)
    }

    async fn insert_prediction(&self, record: &NewPrediction) -> Result<i64, StoreError> {
        self.insert_prediction_row(record)
    }

    async fn current_game_id(&self, user_id: &str) -> Result<Option<GameId>> {
        self.latest_game_for_user(user_id)
    }
}

/// Offline fixture source serving whatever was last cached.
#[async_trait]
impl FixtureSource for Database {
    async fn fixtures(&self) -> Result<Vec<Fixture>> {
        self.load_fixtures()
    }

    async fn teams(&self) -> Result<Vec<Team>> {
        self.load_teams()
    }

    async fn current_round(&self) -> Result<u32> {
        self.cached_current_round()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
