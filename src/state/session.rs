//! Session creation and the direct operator edits that bypass the phase cycle.

use indexmap::IndexMap;
use rand::Rng;
use thiserror::Error;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::{
    config::{AppConfig, TeamTemplate},
    dao::models::{
        BacklogTask, PhaseRecord, SCHEMA_VERSION, SessionDocument, TeamScore, TimerState,
    },
    state::tokens::TokenAuthority,
};

/// Operator input for a new session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionParams {
    pub date: String,
    pub location: String,
    pub player_count: u32,
    pub order_minutes: u32,
    pub diplomacy_minutes: u32,
}

/// Why a direct edit was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    #[error("the session has ended")]
    SessionEnded,
    #[error("unknown team `{0}`")]
    UnknownTeam(String),
    #[error("team `{team}` has no task `{task}`")]
    UnknownTask { team: String, task: String },
    #[error("task `{task}` has no stage `{stage}`")]
    UnknownStage { task: String, stage: String },
    #[error("task `{0}` is staged; a stage name is required")]
    MissingStage(String),
    #[error("task `{0}` has no stages")]
    NotStaged(String),
}

/// Teams taking part for `player_count` players, in template order.
pub fn roster_for(templates: &[TeamTemplate], player_count: u32) -> Vec<String> {
    templates
        .iter()
        .filter(|template| template.min_players <= player_count)
        .map(|template| template.name.clone())
        .collect()
}

/// Session id: UTC `YYYYMMDDHHMMSS` plus a short random suffix.
pub fn session_id_at(now_epoch: i64) -> String {
    let at = datetime(now_epoch);
    let suffix: u16 = rand::rng().random();
    format!(
        "{:04}{:02}{:02}{:02}{:02}{:02}-{suffix:04x}",
        at.year(),
        u8::from(at.month()),
        at.day(),
        at.hour(),
        at.minute(),
        at.second(),
    )
}

/// Build a fully initialized session document.
pub fn new_session(
    config: &AppConfig,
    tokens: &TokenAuthority,
    id: String,
    params: SessionParams,
    now_epoch: i64,
) -> SessionDocument {
    let teams = roster_for(&config.teams, params.player_count);

    let scores: IndexMap<String, TeamScore> = teams
        .iter()
        .map(|team| (team.clone(), TeamScore::new(config.base_points_for(team))))
        .collect();
    let backlog: IndexMap<String, Vec<BacklogTask>> = teams
        .iter()
        .map(|team| {
            let tasks = config
                .backlog_for(team)
                .iter()
                .map(|template| template.instantiate())
                .collect();
            (team.clone(), tasks)
        })
        .collect();
    let team_tokens = tokens.generate_all(&id, &teams);

    SessionDocument {
        schema_version: SCHEMA_VERSION,
        revision: 0,
        date: params.date,
        location: params.location,
        player_count: params.player_count,
        created_at: datetime(now_epoch).format(&Rfc3339).unwrap_or_default(),
        round: 1,
        phase: Default::default(),
        history: vec![PhaseRecord::ongoing(1, Default::default())],
        timer: TimerState::with_durations(params.order_minutes, params.diplomacy_minutes),
        scores,
        backlog,
        orders: Default::default(),
        tokens: team_tokens,
        checkboxes: IndexMap::new(),
        ended: false,
        teams,
        id,
    }
}

fn datetime(epoch: i64) -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(epoch).unwrap_or(OffsetDateTime::UNIX_EPOCH)
}

fn ensure_editable(doc: &SessionDocument) -> Result<(), EditError> {
    if doc.ended {
        return Err(EditError::SessionEnded);
    }
    Ok(())
}

fn score_mut<'a>(doc: &'a mut SessionDocument, team: &str) -> Result<&'a mut TeamScore, EditError> {
    ensure_editable(doc)?;
    if !doc.has_team(team) {
        return Err(EditError::UnknownTeam(team.to_string()));
    }
    Ok(doc.scores.entry(team.to_string()).or_default())
}

/// Set a team's current action points.
pub fn set_score(doc: &mut SessionDocument, team: &str, current: i32) -> Result<(), EditError> {
    score_mut(doc, team)?.current = current;
    Ok(())
}

pub fn set_government_support(
    doc: &mut SessionDocument,
    team: &str,
    supported: bool,
) -> Result<(), EditError> {
    score_mut(doc, team)?.government_support = supported;
    Ok(())
}

/// Record a UI acknowledgement. Cleared on every new round.
pub fn set_checkbox(doc: &mut SessionDocument, key: &str, checked: bool) -> Result<(), EditError> {
    ensure_editable(doc)?;
    doc.checkboxes.insert(key.to_string(), checked);
    Ok(())
}

/// Progress on one backlog task, or on one stage of a staged task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BacklogProgress<'a> {
    pub team: &'a str,
    pub task: &'a str,
    pub stage: Option<&'a str>,
    pub spent_points: u32,
    pub completed: bool,
}

pub fn record_backlog_progress(
    doc: &mut SessionDocument,
    progress: BacklogProgress<'_>,
) -> Result<(), EditError> {
    ensure_editable(doc)?;
    let tasks = doc
        .backlog
        .get_mut(progress.team)
        .ok_or_else(|| EditError::UnknownTeam(progress.team.to_string()))?;
    let task = tasks
        .iter_mut()
        .find(|task| task.name() == progress.task)
        .ok_or_else(|| EditError::UnknownTask {
            team: progress.team.to_string(),
            task: progress.task.to_string(),
        })?;

    match (task, progress.stage) {
        (
            BacklogTask::Flat {
                spent_points,
                completed,
                ..
            },
            None,
        ) => {
            *spent_points = progress.spent_points;
            *completed = progress.completed;
        }
        (BacklogTask::Flat { name, .. }, Some(_)) => return Err(EditError::NotStaged(name.clone())),
        (BacklogTask::Staged { name, .. }, None) => return Err(EditError::MissingStage(name.clone())),
        (BacklogTask::Staged { name, stages }, Some(stage_name)) => {
            let stage = stages
                .iter_mut()
                .find(|stage| stage.name == stage_name)
                .ok_or_else(|| EditError::UnknownStage {
                    task: name.clone(),
                    stage: stage_name.to_string(),
                })?;
            stage.spent_points = progress.spent_points;
            stage.completed = progress.completed;
        }
    }
    Ok(())
}
