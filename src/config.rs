//! Application-level configuration loading: data directory, round limits,
//! team templates and backlog templates.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use indexmap::IndexMap;
use serde::Deserialize;
use tracing::{info, warn};

use crate::dao::{
    models::{BacklogStage, BacklogTask, DEFAULT_PHASE_MINUTES},
    retry::{DEFAULT_MAX_RETRIES, DEFAULT_STEP, RetryPolicy},
};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "STABSSPEL_BACK_CONFIG_PATH";
/// Environment variable that overrides the configured data directory.
const DATA_DIR_ENV: &str = "STABSSPEL_DATA_DIR";
const DEFAULT_DATA_DIR: &str = "speldata";
/// Number of full rounds before the session runs its final short round.
pub const DEFAULT_MAX_ROUND: u32 = 3;
/// Action points every team starts with.
pub const DEFAULT_BASE_POINTS: i32 = 10;
/// Player count from which the extra teams join the exercise.
const EXTENDED_ROSTER_PLAYERS: u32 = 27;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
/// Team that may take part in a session.
pub struct TeamTemplate {
    pub name: String,
    /// The team joins when the session has at least this many players.
    #[serde(default)]
    pub min_players: u32,
    /// Per-team override of [`AppConfig::base_points`].
    #[serde(default)]
    pub base_points: Option<i32>,
}

impl TeamTemplate {
    fn new(name: &str, min_players: u32) -> Self {
        Self {
            name: name.to_string(),
            min_players,
            base_points: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
/// Backlog task layout copied into every new session.
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskTemplate {
    Flat { name: String, required_points: u32 },
    Staged { name: String, stages: Vec<StageTemplate> },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
/// One stage of a [`TaskTemplate::Staged`] task.
pub struct StageTemplate {
    pub name: String,
    pub required_points: u32,
}

impl TaskTemplate {
    /// Instantiate the template with zero progress.
    pub fn instantiate(&self) -> BacklogTask {
        match self {
            TaskTemplate::Flat {
                name,
                required_points,
            } => BacklogTask::Flat {
                name: name.clone(),
                required_points: *required_points,
                spent_points: 0,
                completed: false,
            },
            TaskTemplate::Staged { name, stages } => BacklogTask::Staged {
                name: name.clone(),
                stages: stages
                    .iter()
                    .map(|stage| BacklogStage {
                        name: stage.name.clone(),
                        required_points: stage.required_points,
                        spent_points: 0,
                        completed: false,
                    })
                    .collect(),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
/// Retry settings for the session store.
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_step_ms")]
    pub step_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            step_ms: default_step_ms(),
        }
    }
}

impl RetryConfig {
    /// Linear backoff policy described by this config.
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::linear(self.max_retries, Duration::from_millis(self.step_ms))
    }
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_step_ms() -> u64 {
    DEFAULT_STEP.as_millis() as u64
}

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub max_round: u32,
    pub default_order_minutes: u32,
    pub default_diplomacy_minutes: u32,
    pub base_points: i32,
    pub teams: Vec<TeamTemplate>,
    pub backlog: IndexMap<String, Vec<TaskTemplate>>,
    pub retry: RetryConfig,
    /// When set, admin routes require this value in `x-admin-token`.
    pub admin_token: Option<String>,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        let config = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        teams = app_config.teams.len(),
                        max_round = app_config.max_round,
                        "loaded exercise configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        };

        config.with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        if let Some(dir) = env::var_os(DATA_DIR_ENV).filter(|dir| !dir.is_empty()) {
            self.data_dir = PathBuf::from(dir);
        }
        self
    }

    /// Base points for `team`, honouring per-team overrides.
    pub fn base_points_for(&self, team: &str) -> i32 {
        self.teams
            .iter()
            .find(|template| template.name == team)
            .and_then(|template| template.base_points)
            .unwrap_or(self.base_points)
    }

    /// Backlog templates configured for `team`.
    pub fn backlog_for(&self, team: &str) -> &[TaskTemplate] {
        self.backlog.get(team).map(Vec::as_slice).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            max_round: DEFAULT_MAX_ROUND,
            default_order_minutes: DEFAULT_PHASE_MINUTES,
            default_diplomacy_minutes: DEFAULT_PHASE_MINUTES,
            base_points: DEFAULT_BASE_POINTS,
            teams: default_teams(),
            backlog: default_backlog(),
            retry: RetryConfig::default(),
            admin_token: None,
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
///
/// Every field is optional; missing ones keep their built-in default.
struct RawConfig {
    data_dir: Option<PathBuf>,
    max_round: Option<u32>,
    default_order_minutes: Option<u32>,
    default_diplomacy_minutes: Option<u32>,
    base_points: Option<i32>,
    teams: Option<Vec<TeamTemplate>>,
    backlog: Option<IndexMap<String, Vec<TaskTemplate>>>,
    #[serde(default)]
    retry: RetryConfig,
    admin_token: Option<String>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = AppConfig::default();
        Self {
            data_dir: value.data_dir.unwrap_or(defaults.data_dir),
            max_round: value.max_round.filter(|round| *round > 0).unwrap_or(defaults.max_round),
            default_order_minutes: value
                .default_order_minutes
                .filter(|minutes| *minutes > 0)
                .unwrap_or(defaults.default_order_minutes),
            default_diplomacy_minutes: value
                .default_diplomacy_minutes
                .filter(|minutes| *minutes > 0)
                .unwrap_or(defaults.default_diplomacy_minutes),
            base_points: value.base_points.unwrap_or(defaults.base_points),
            teams: value.teams.unwrap_or(defaults.teams),
            backlog: value.backlog.unwrap_or(defaults.backlog),
            retry: value.retry,
            admin_token: value.admin_token.filter(|token| !token.is_empty()),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Built-in team table: five base teams, four more from 27 players.
fn default_teams() -> Vec<TeamTemplate> {
    let base = ["Alfa", "Bravo", "STT", "FM", "BS"]
        .into_iter()
        .map(|name| TeamTemplate::new(name, 0));
    let extended = ["Media", "SÄPO", "Regeringen", "USA"]
        .into_iter()
        .map(|name| TeamTemplate::new(name, EXTENDED_ROSTER_PLAYERS));
    base.chain(extended).collect()
}

fn flat(name: &str, required_points: u32) -> TaskTemplate {
    TaskTemplate::Flat {
        name: name.to_string(),
        required_points,
    }
}

fn staged(name: &str, stages: &[(&str, u32)]) -> TaskTemplate {
    TaskTemplate::Staged {
        name: name.to_string(),
        stages: stages
            .iter()
            .map(|(stage, required_points)| StageTemplate {
                name: stage.to_string(),
                required_points: *required_points,
            })
            .collect(),
    }
}

/// Built-in backlog table.
fn default_backlog() -> IndexMap<String, Vec<TaskTemplate>> {
    let entries = [
        (
            "Alfa",
            vec![
                staged(
                    "Secure regional infrastructure",
                    &[("Survey", 2), ("Reinforce", 4), ("Hand over", 2)],
                ),
                flat("Establish liaison with STT", 3),
            ],
        ),
        (
            "Bravo",
            vec![
                staged(
                    "Stand up mobile reserve",
                    &[("Recruit", 3), ("Train", 4)],
                ),
                flat("Protect logistics corridor", 4),
            ],
        ),
        (
            "STT",
            vec![
                flat("Harden communication networks", 5),
                flat("Restore backup power", 3),
            ],
        ),
        (
            "FM",
            vec![
                staged(
                    "Influence campaign",
                    &[("Recruit proxies", 3), ("Seed narratives", 3), ("Amplify", 4)],
                ),
                flat("Map critical infrastructure", 3),
            ],
        ),
        (
            "BS",
            vec![
                flat("Expand smuggling routes", 4),
                flat("Infiltrate port authority", 5),
            ],
        ),
        (
            "Media",
            vec![flat("Investigate leaks", 3), flat("Run public briefing", 2)],
        ),
        (
            "SÄPO",
            vec![
                staged(
                    "Counter-intelligence operation",
                    &[("Identify", 3), ("Surveil", 3), ("Arrest", 2)],
                ),
                flat("Vet government staff", 2),
            ],
        ),
        (
            "Regeringen",
            vec![flat("Pass emergency legislation", 5), flat("Coordinate agencies", 3)],
        ),
        (
            "USA",
            vec![flat("Deploy advisory team", 4), flat("Share intelligence", 2)],
        ),
    ];

    entries
        .into_iter()
        .map(|(team, tasks)| (team.to_string(), tasks))
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let raw: RawConfig = serde_json::from_value(json!({
            "max_round": 4,
            "retry": { "max_retries": 5 },
            "admin_token": ""
        }))
        .unwrap();
        let config = AppConfig::from(raw);

        assert_eq!(config.max_round, 4);
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.step_ms, 100);
        assert_eq!(config.teams, default_teams());
        assert_eq!(config.admin_token, None);
    }

    #[test]
    fn zero_durations_are_ignored() {
        let raw: RawConfig =
            serde_json::from_value(json!({ "default_order_minutes": 0, "max_round": 0 })).unwrap();
        let config = AppConfig::from(raw);
        assert_eq!(config.default_order_minutes, DEFAULT_PHASE_MINUTES);
        assert_eq!(config.max_round, DEFAULT_MAX_ROUND);
    }

    #[test]
    fn every_default_team_has_a_backlog() {
        let config = AppConfig::default();
        for team in &config.teams {
            assert!(!config.backlog_for(&team.name).is_empty(), "{}", team.name);
        }
    }

    #[test]
    fn team_override_wins_over_global_base_points() {
        let mut config = AppConfig::default();
        config.teams[0].base_points = Some(15);
        assert_eq!(config.base_points_for("Alfa"), 15);
        assert_eq!(config.base_points_for("Bravo"), DEFAULT_BASE_POINTS);
    }

    #[test]
    fn staged_template_instantiates_without_progress() {
        let task = staged("Task", &[("One", 2), ("Two", 3)]).instantiate();
        let BacklogTask::Staged { stages, .. } = task else {
            panic!("expected staged task");
        };
        assert_eq!(stages.len(), 2);
        assert!(stages.iter().all(|stage| stage.spent_points == 0 && !stage.completed));
    }
}
