// Last Man Standing entry point.
//
// Startup sequence:
// 1. Initialize tracing (log to file, not terminal)
// 2. Load config
// 3. Open database, make sure the user is in a league with a game
// 4. Build collaborators (fixture source, notifier)
// 5. Create mpsc channels and AppState
// 6. Spawn app logic task
// 7. Run the console front end until quit
// 8. Cleanup on exit

mod console;

use std::sync::Arc;

use lastman_app::app;
use lastman_app::config;
use lastman_app::db::Database;
use lastman_app::notify;
use lastman_app::source::{CachedFixtureSource, FixtureSource, FplClient, PredictionStore};

use anyhow::Context;
use tokio::sync::mpsc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing (log to file, not terminal)
    init_tracing()?;
    info!("Last Man Standing starting up");

    // 2. Load config
    let config = config::load_config().context("failed to load configuration")?;
    match &config.session.user_id {
        Some(user) => info!("Config loaded: user={}, league={}", user, config.session.league_id),
        None => info!("Config loaded: signed out"),
    }

    // 3. Open database
    if config.db_path != ":memory:" {
        if let Some(parent) = std::path::Path::new(&config.db_path).parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    let db = Arc::new(Database::open(&config.db_path).context("failed to open database")?);
    info!("Database opened at {}", config.db_path);

    if let Some(user) = &config.session.user_id {
        ensure_membership(&db, user, &config.session.league_id)?;
    }

    // 4. Collaborators
    let fpl = FplClient::new(&config.fpl).context("failed to build FPL client")?;
    let fixture_source: Arc<dyn FixtureSource> =
        Arc::new(CachedFixtureSource::new(Arc::new(fpl), db.clone()));
    let store: Arc<dyn PredictionStore> = db.clone();
    let notifier = notify::build_notifier(&config).context("failed to build notifier")?;

    // 5. Channels and state
    let (load_tx, load_rx) = mpsc::channel(16);
    let (cmd_tx, cmd_rx) = mpsc::channel(64);
    let (ui_tx, ui_rx) = mpsc::channel(64);

    let app_state = app::AppState::new(config, fixture_source, store, notifier, db, load_tx);

    // 6. Spawn app logic task
    let app_handle = tokio::spawn(async move {
        if let Err(e) = app::run(load_rx, cmd_rx, ui_tx, app_state).await {
            error!("Application loop error: {}", e);
        }
    });

    // 7. Console front end (blocks until the user quits or stdin closes)
    if let Err(e) = console::run(ui_rx, cmd_tx).await {
        error!("Console error: {}", e);
    }

    // 8. Cleanup: wait for app task to finish (with timeout)
    let _ = tokio::time::timeout(std::time::Duration::from_secs(5), async {
        let _ = app_handle.await;
    })
    .await;

    info!("Last Man Standing shut down cleanly");
    Ok(())
}

/// Put the configured user in their league, and start the league's first
/// game if it has none.
fn ensure_membership(db: &Database, user_id: &str, league_id: &str) -> anyhow::Result<()> {
    if db.league_of(user_id)?.as_deref() != Some(league_id) {
        db.join_league(user_id, league_id)?;
        info!("User {} joined league {}", user_id, league_id);
    }
    if db.latest_game_for_user(user_id)?.is_none() {
        db.start_game(league_id)?;
    }
    Ok(())
}

/// Initialize tracing to log to a file (not the terminal, which is used by
/// the console).
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("lastman.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("lastman=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
