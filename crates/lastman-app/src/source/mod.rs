// Collaborator seams: where fixtures come from and where predictions live.

pub mod fpl;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use lastman_core::model::{Fixture, GameId, Injury, NewPrediction, Prediction, Team};

use crate::db::Database;

pub use fpl::FplClient;

/// Read-only fixture and team reference data.
#[async_trait]
pub trait FixtureSource: Send + Sync {
    async fn fixtures(&self) -> Result<Vec<Fixture>>;
    async fn teams(&self) -> Result<Vec<Team>>;
    /// The round currently being played.
    async fn current_round(&self) -> Result<u32>;

    /// Players doubtful or unavailable for the next round. Sources without
    /// squad data report none.
    async fn injuries(&self) -> Result<Vec<Injury>> {
        Ok(Vec::new())
    }

    /// Teams, fixtures, the current round and injuries fetched together.
    async fn reference(&self) -> Result<ReferenceData> {
        let (teams, fixtures, current_round, injuries) = futures_util::try_join!(
            self.teams(),
            self.fixtures(),
            self.current_round(),
            self.injuries()
        )?;
        Ok(ReferenceData {
            teams,
            fixtures,
            current_round,
            injuries,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferenceData {
    pub teams: Vec<Team>,
    pub fixtures: Vec<Fixture>,
    pub current_round: u32,
    pub injuries: Vec<Injury>,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{team} has already been picked in game {game_id}")]
    DuplicateTeam { team: String, game_id: GameId },

    #[error("game {0} does not exist")]
    UnknownGame(GameId),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Durable prediction log. The insert is the authority on the
/// one-team-per-game rule; the gate only checks it in advance.
#[async_trait]
pub trait PredictionStore: Send + Sync {
    async fn predictions_for_user(&self, user_id: &str) -> Result<Vec<Prediction>>;
    async fn insert_prediction(&self, record: &NewPrediction) -> Result<i64, StoreError>;
    async fn current_game_id(&self, user_id: &str) -> Result<Option<GameId>>;
}

// ---------------------------------------------------------------------------
// Cached source
// ---------------------------------------------------------------------------

/// Wraps an upstream source, writing every successful fetch to the database
/// and serving the cached copy when the upstream is unreachable.
pub struct CachedFixtureSource {
    upstream: Arc<dyn FixtureSource>,
    db: Arc<Database>,
}

impl CachedFixtureSource {
    pub fn new(upstream: Arc<dyn FixtureSource>, db: Arc<Database>) -> Self {
        Self { upstream, db }
    }

    /// Fetch everything upstream, falling back to the cache as a whole so
    /// teams and fixtures never come from different snapshots. Injuries are
    /// not cached; the fallback reports none.
    pub async fn load(&self) -> Result<ReferenceData> {
        match self.upstream.reference().await {
            Ok(data) => {
                if let Err(e) = self
                    .db
                    .cache_reference(&data.teams, &data.fixtures, data.current_round)
                {
                    warn!("Failed to cache reference data: {e:#}");
                }
                Ok(data)
            }
            Err(e) => {
                warn!("Fixture source unavailable, using cached data: {e:#}");
                let cached = self.db.reference().await?;
                if cached.fixtures.is_empty() {
                    return Err(e.context("fixture source unavailable and no cached fixtures"));
                }
                info!(
                    "Loaded {} cached fixtures for round {}",
                    cached.fixtures.len(),
                    cached.current_round
                );
                Ok(cached)
            }
        }
    }
}

#[async_trait]
impl FixtureSource for CachedFixtureSource {
    async fn reference(&self) -> Result<ReferenceData> {
        self.load().await
    }

    async fn fixtures(&self) -> Result<Vec<Fixture>> {
        Ok(self.load().await?.fixtures)
    }

    async fn teams(&self) -> Result<Vec<Team>> {
        Ok(self.load().await?.teams)
    }

    async fn current_round(&self) -> Result<u32> {
        Ok(self.load().await?.current_round)
    }

    async fn injuries(&self) -> Result<Vec<Injury>> {
        Ok(self.load().await?.injuries)
    }
}
