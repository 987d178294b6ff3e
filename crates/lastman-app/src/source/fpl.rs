// Fantasy Premier League public API client.
//
// `bootstrap-static/` supplies teams, players and the current event (round);
// `fixtures/` supplies every fixture of the season.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use lastman_core::model::{Fixture, Injury, Team, MIN_ROUND};

use super::FixtureSource;
use crate::config::FplConfig;

/// How long a fetched `bootstrap-static/` payload is reused.
const BOOTSTRAP_TTL: Duration = Duration::from_secs(60);

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
struct Bootstrap {
    events: Vec<EventDto>,
    teams: Vec<TeamDto>,
    #[serde(default)]
    elements: Vec<ElementDto>,
}

#[derive(Debug, Clone, Deserialize)]
struct EventDto {
    id: u32,
    #[serde(default)]
    is_current: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct TeamDto {
    id: u32,
    name: String,
    short_name: String,
}

/// One player. `status` is `a` when available; anything else carries news.
#[derive(Debug, Clone, Deserialize)]
struct ElementDto {
    web_name: String,
    team: u32,
    #[serde(default)]
    status: String,
    chance_of_playing_next_round: Option<u8>,
    #[serde(default)]
    news: String,
}

impl ElementDto {
    fn is_flagged(&self) -> bool {
        let doubtful = self.chance_of_playing_next_round.is_some_and(|c| c < 100);
        let unavailable = self.status != "a" && !self.news.trim().is_empty();
        doubtful || unavailable
    }

    fn into_injury(self) -> Injury {
        Injury {
            player_name: self.web_name,
            team_id: self.team,
            chance_of_playing: self.chance_of_playing_next_round,
            news: self.news.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct FixtureDto {
    id: u32,
    /// Null for fixtures not yet assigned to a round.
    event: Option<u32>,
    team_h: u32,
    team_a: u32,
    team_h_score: Option<u32>,
    team_a_score: Option<u32>,
    #[serde(default)]
    started: Option<bool>,
    #[serde(default)]
    finished: bool,
    #[serde(default)]
    finished_provisional: bool,
    kickoff_time: Option<DateTime<Utc>>,
    team_h_difficulty: u8,
    team_a_difficulty: u8,
}

impl FixtureDto {
    fn into_fixture(self) -> Option<Fixture> {
        let round = self.event?;
        Some(Fixture {
            id: self.id,
            round,
            home_team_id: self.team_h,
            away_team_id: self.team_a,
            home_score: self.team_h_score,
            away_score: self.team_a_score,
            started: self.started.unwrap_or(false),
            finished: self.finished,
            finished_provisional: self.finished_provisional,
            kickoff_time: self.kickoff_time,
            home_difficulty: self.team_h_difficulty,
            away_difficulty: self.team_a_difficulty,
        })
    }
}

fn parse_fixtures(body: &str) -> Result<Vec<Fixture>> {
    let raw: Vec<FixtureDto> = serde_json::from_str(body).context("failed to parse fixtures JSON")?;
    let total = raw.len();
    let fixtures: Vec<Fixture> = raw.into_iter().filter_map(FixtureDto::into_fixture).collect();
    if fixtures.len() < total {
        debug!("Skipped {} fixtures with no round", total - fixtures.len());
    }
    Ok(fixtures)
}

fn injuries(bootstrap: Bootstrap) -> Vec<Injury> {
    bootstrap
        .elements
        .into_iter()
        .filter(ElementDto::is_flagged)
        .map(ElementDto::into_injury)
        .collect()
}

fn current_event(bootstrap: &Bootstrap) -> u32 {
    match bootstrap.events.iter().find(|e| e.is_current) {
        Some(event) => event.id,
        None => {
            debug!("No current event in bootstrap data; using round {}", MIN_ROUND);
            MIN_ROUND
        }
    }
}

// ---------------------------------------------------------------------------
// FplClient
// ---------------------------------------------------------------------------

pub struct FplClient {
    http: reqwest::Client,
    base_url: String,
    bootstrap: Mutex<Option<(Instant, Bootstrap)>>,
}

impl FplClient {
    pub fn new(config: &FplConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            bootstrap: Mutex::new(None),
        })
    }

    async fn get_text(&self, path: &str) -> Result<String> {
        let url = format!("{}/{}", self.base_url, path);
        debug!("GET {}", url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?;
        let status = response.status();
        if !status.is_success() {
            warn!("FPL API returned {} for {}", status, url);
            anyhow::bail!("FPL API returned {status} for {url}");
        }
        response
            .text()
            .await
            .with_context(|| format!("failed to read response body from {url}"))
    }

    /// Bootstrap payload, reused for [`BOOTSTRAP_TTL`] so the teams and
    /// current-round lookups of one load share a single request.
    async fn bootstrap(&self) -> Result<Bootstrap> {
        let mut cached = self.bootstrap.lock().await;
        if let Some((fetched_at, data)) = cached.as_ref() {
            if fetched_at.elapsed() < BOOTSTRAP_TTL {
                return Ok(data.clone());
            }
        }
        let body = self.get_text("bootstrap-static/").await?;
        let data: Bootstrap =
            serde_json::from_str(&body).context("failed to parse bootstrap-static JSON")?;
        *cached = Some((Instant::now(), data.clone()));
        Ok(data)
    }
}

#[async_trait]
impl FixtureSource for FplClient {
    async fn fixtures(&self) -> Result<Vec<Fixture>> {
        let body = self.get_text("fixtures/").await?;
        parse_fixtures(&body)
    }

    async fn teams(&self) -> Result<Vec<Team>> {
        let bootstrap = self.bootstrap().await?;
        Ok(bootstrap
            .teams
            .into_iter()
            .map(|t| Team {
                id: t.id,
                name: t.name,
                short_name: t.short_name,
            })
            .collect())
    }

    async fn current_round(&self) -> Result<u32> {
        let bootstrap = self.bootstrap().await?;
        Ok(current_event(&bootstrap))
    }

    async fn injuries(&self) -> Result<Vec<Injury>> {
        let bootstrap = self.bootstrap().await?;
        Ok(injuries(bootstrap))
    }
}
