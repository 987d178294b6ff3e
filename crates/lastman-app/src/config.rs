// Configuration loading and parsing (lastman.toml, credentials.toml).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use lastman_core::planner::{DEFAULT_WEEKS, MAX_WEEKS, MIN_WEEKS};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub session: SessionConfig,
    pub planner: PlannerConfig,
    pub fpl: FplConfig,
    pub notifications: NotificationConfig,
    pub credentials: CredentialsConfig,
    pub db_path: String,
}

// ---------------------------------------------------------------------------
// lastman.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire lastman.toml file.
#[derive(Debug, Clone, Deserialize)]
struct LastmanFile {
    #[serde(default)]
    session: SessionConfig,
    #[serde(default)]
    planner: PlannerConfig,
    fpl: FplConfig,
    #[serde(default)]
    notifications: NotificationConfig,
    #[serde(default)]
    database: DatabaseSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct DatabaseSection {
    /// Empty means "use the platform data directory".
    #[serde(default)]
    path: String,
}

/// Who is using the app. No `user_id` means signed out, which is distinct
/// from a signed-in user who has no predictions yet.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default = "default_league_id")]
    pub league_id: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            user_id: None,
            email: None,
            league_id: default_league_id(),
        }
    }
}

fn default_league_id() -> String {
    "default".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlannerConfig {
    /// Rounds shown before the user has saved a preference.
    #[serde(default = "default_weeks")]
    pub default_weeks: u8,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        PlannerConfig {
            default_weeks: DEFAULT_WEEKS,
        }
    }
}

fn default_weeks() -> u8 {
    DEFAULT_WEEKS
}

#[derive(Debug, Clone, Deserialize)]
pub struct FplConfig {
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationConfig {
    #[serde(default)]
    pub enabled: bool,
    /// HTTP endpoint accepting `{from, to, bcc, subject, html}` JSON.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub bcc: Vec<String>,
    /// Address users are told to email when a submission fails.
    #[serde(default)]
    pub fallback_email: Option<String>,
}

// ---------------------------------------------------------------------------
// credentials.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CredentialsConfig {
    pub notification_api_key: Option<String>,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/lastman.toml` and
/// (optionally) `config/credentials.toml`, relative to `base_dir`.
///
/// Does not copy defaults; `load_config()` does that first.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    // --- lastman.toml (required) ---
    let main_path = config_dir.join("lastman.toml");
    let main_text = read_file(&main_path)?;
    let file: LastmanFile = toml::from_str(&main_text).map_err(|e| ConfigError::ParseError {
        path: main_path.clone(),
        source: e,
    })?;

    // --- credentials.toml (optional) ---
    let credentials_path = config_dir.join("credentials.toml");
    let credentials = if credentials_path.exists() {
        let cred_text = read_file(&credentials_path)?;
        toml::from_str(&cred_text).map_err(|e| ConfigError::ParseError {
            path: credentials_path.clone(),
            source: e,
        })?
    } else {
        CredentialsConfig::default()
    };

    let db_path = if file.database.path.trim().is_empty() {
        default_db_path()?
    } else {
        file.database.path
    };

    let config = Config {
        session: file.session,
        planner: file.planner,
        fpl: file.fpl,
        notifications: file.notifications,
        credentials,
        db_path,
    };

    validate(&config)?;

    Ok(config)
}

/// Ensure all config files exist by copying missing ones from `defaults/`.
/// Returns the list of files that were copied. Skips `.example` files.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.exists() {
        if !config_dir.exists() {
            return Err(ConfigError::DefaultsCopyError {
                message: format!(
                    "neither defaults/ nor config/ directory found in {}; \
                     run from the project root or ensure defaults/ is present",
                    base_dir.display()
                ),
            });
        }
        return Ok(vec![]);
    }

    std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to create config directory: {e}"),
    })?;

    let mut copied = Vec::new();

    let entries = std::fs::read_dir(&defaults_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to read defaults directory: {e}"),
    })?;

    for entry in entries {
        let entry = entry.map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to read defaults entry: {e}"),
        })?;
        let path = entry.path();

        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name() else {
            continue;
        };
        if file_name.to_str().is_some_and(|n| n.ends_with(".example")) {
            continue;
        }
        let target = config_dir.join(file_name);

        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
        {
            Ok(mut dest) => {
                let content = std::fs::read(&path).map_err(|e| ConfigError::DefaultsCopyError {
                    message: format!("failed to read {}: {e}", path.display()),
                })?;
                std::io::Write::write_all(&mut dest, &content).map_err(|e| {
                    ConfigError::DefaultsCopyError {
                        message: format!("failed to write {}: {e}", target.display()),
                    }
                })?;
                copied.push(target);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(e) => {
                return Err(ConfigError::DefaultsCopyError {
                    message: format!("failed to create {}: {e}", target.display()),
                });
            }
        }
    }

    Ok(copied)
}

/// Loads config relative to the current working directory, copying default
/// files into `config/` first.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_files(&cwd)?;
    load_config_from(&cwd)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

/// `<platform data dir>/lastman.db`, e.g. `~/.local/share/lastman/lastman.db`.
fn default_db_path() -> Result<String, ConfigError> {
    let dirs = directories::ProjectDirs::from("uk", "lmsiq", "lastman").ok_or_else(|| {
        ConfigError::ValidationError {
            field: "database.path".into(),
            message: "no home directory found; set an explicit path".into(),
        }
    })?;
    Ok(dirs.data_dir().join("lastman.db").to_string_lossy().into_owned())
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config
        .session
        .user_id
        .as_deref()
        .is_some_and(|id| id.trim().is_empty())
    {
        return Err(ConfigError::ValidationError {
            field: "session.user_id".into(),
            message: "must not be empty; omit it to run signed out".into(),
        });
    }

    if config.session.league_id.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "session.league_id".into(),
            message: "must not be empty".into(),
        });
    }

    let weeks = config.planner.default_weeks;
    if !(MIN_WEEKS..=MAX_WEEKS).contains(&weeks) {
        return Err(ConfigError::ValidationError {
            field: "planner.default_weeks".into(),
            message: format!("must be between {MIN_WEEKS} and {MAX_WEEKS} inclusive, got {weeks}"),
        });
    }

    let url = &config.fpl.base_url;
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(ConfigError::ValidationError {
            field: "fpl.base_url".into(),
            message: format!("must be an http(s) URL, got `{url}`"),
        });
    }

    if config.fpl.timeout_secs == 0 {
        return Err(ConfigError::ValidationError {
            field: "fpl.timeout_secs".into(),
            message: "must be > 0".into(),
        });
    }

    let notifications = &config.notifications;
    if notifications.enabled {
        if notifications.endpoint.is_none() {
            return Err(ConfigError::ValidationError {
                field: "notifications.endpoint".into(),
                message: "required when notifications are enabled".into(),
            });
        }
        if notifications.from.trim().is_empty() {
            return Err(ConfigError::ValidationError {
                field: "notifications.from".into(),
                message: "required when notifications are enabled".into(),
            });
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    /// Workspace root holding `defaults/`, whether tests run from the crate
    /// directory or the workspace root.
    fn project_root() -> PathBuf {
        let cwd = std::env::current_dir().unwrap();
        if cwd.join("defaults").exists() {
            cwd
        } else if cwd.join("../../defaults").exists() {
            cwd.join("../..")
        } else {
            panic!("Cannot locate defaults/ directory from CWD {:?}", cwd);
        }
    }

    /// Fresh scratch directory with a `config/` containing the given files.
    fn scratch_dir(name: &str, files: &[(&str, &str)]) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "lastman_config_test_{name}_{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(dir.join("config")).unwrap();
        for (file, content) in files {
            fs::write(dir.join("config").join(file), content).unwrap();
        }
        dir
    }

    const MINIMAL: &str = r#"
[fpl]
base_url = "https://fantasy.premierleague.com/api"

[database]
path = ":memory:"
"#;

    #[test]
    fn default_files_load() {
        let root = project_root();
        let dir = scratch_dir("defaults", &[]);
        fs::create_dir_all(dir.join("defaults")).unwrap();
        for name in ["lastman.toml", "credentials.toml.example"] {
            fs::copy(root.join("defaults").join(name), dir.join("defaults").join(name)).unwrap();
        }

        let copied = ensure_config_files(&dir).expect("should copy default configs");
        assert_eq!(copied.len(), 1, "only lastman.toml is copied: {copied:?}");
        assert!(!dir.join("config/credentials.toml.example").exists());

        let config = load_config_from(&dir).expect("defaults should load");
        assert_eq!(config.fpl.base_url, "https://fantasy.premierleague.com/api");
        assert_eq!(config.planner.default_weeks, 5);
        assert!(config.session.user_id.is_none());
        assert!(!config.notifications.enabled);
        assert!(config.credentials.notification_api_key.is_none());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn ensure_config_files_does_not_overwrite() {
        let dir = scratch_dir("no_overwrite", &[("lastman.toml", MINIMAL)]);
        fs::create_dir_all(dir.join("defaults")).unwrap();
        fs::write(dir.join("defaults/lastman.toml"), "garbage").unwrap();

        let copied = ensure_config_files(&dir).unwrap();
        assert!(copied.is_empty());
        let kept = fs::read_to_string(dir.join("config/lastman.toml")).unwrap();
        assert_eq!(kept, MINIMAL);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn ensure_config_files_errors_without_any_dirs() {
        let dir = std::env::temp_dir().join(format!("lastman_config_empty_{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        let err = ensure_config_files(&dir).unwrap_err();
        assert!(matches!(err, ConfigError::DefaultsCopyError { .. }));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let dir = scratch_dir("minimal", &[("lastman.toml", MINIMAL)]);
        let config = load_config_from(&dir).unwrap();
        assert_eq!(config.db_path, ":memory:");
        assert_eq!(config.session.league_id, "default");
        assert_eq!(config.fpl.timeout_secs, 10);
        assert_eq!(config.planner.default_weeks, DEFAULT_WEEKS);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn credentials_are_optional_but_read() {
        let dir = scratch_dir(
            "credentials",
            &[
                ("lastman.toml", MINIMAL),
                ("credentials.toml", "notification_api_key = \"re_123\"\n"),
            ],
        );
        let config = load_config_from(&dir).unwrap();
        assert_eq!(config.credentials.notification_api_key.as_deref(), Some("re_123"));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = scratch_dir("missing", &[]);
        let err = load_config_from(&dir).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        let dir = scratch_dir("malformed", &[("lastman.toml", "[fpl\nbase_url = ")]);
        let err = load_config_from(&dir).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn weeks_out_of_range_rejected() {
        let text = format!("{MINIMAL}\n[planner]\ndefault_weeks = 12\n");
        let dir = scratch_dir("weeks", &[("lastman.toml", &text)]);
        match load_config_from(&dir).unwrap_err() {
            ConfigError::ValidationError { field, .. } => assert_eq!(field, "planner.default_weeks"),
            other => panic!("unexpected error: {other}"),
        }
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn empty_user_id_rejected() {
        let text = format!("{MINIMAL}\n[session]\nuser_id = \"  \"\n");
        let dir = scratch_dir("user", &[("lastman.toml", &text)]);
        match load_config_from(&dir).unwrap_err() {
            ConfigError::ValidationError { field, .. } => assert_eq!(field, "session.user_id"),
            other => panic!("unexpected error: {other}"),
        }
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn bad_base_url_rejected() {
        let text = "[fpl]\nbase_url = \"ftp://example.com\"\n[database]\npath = \":memory:\"\n";
        let dir = scratch_dir("url", &[("lastman.toml", text)]);
        match load_config_from(&dir).unwrap_err() {
            ConfigError::ValidationError { field, .. } => assert_eq!(field, "fpl.base_url"),
            other => panic!("unexpected error: {other}"),
        }
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn enabled_notifications_need_endpoint() {
        let text = format!("{MINIMAL}\n[notifications]\nenabled = true\nfrom = \"noreply@example.com\"\n");
        let dir = scratch_dir("notify", &[("lastman.toml", &text)]);
        match load_config_from(&dir).unwrap_err() {
            ConfigError::ValidationError { field, .. } => assert_eq!(field, "notifications.endpoint"),
            other => panic!("unexpected error: {other}"),
        }
        let _ = fs::remove_dir_all(&dir);
    }
}
