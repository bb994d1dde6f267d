//! Session lifecycle and the direct edits game control performs outside the
//! phase cycle.

use tracing::{debug, info, warn};

use crate::{
    dao::{
        models::SessionDocument,
        storage::{LoadError, is_valid_session_id},
    },
    dto::{
        admin::{
            ActionResponse, BacklogProgressRequest, CheckboxRequest, ScoreUpdateRequest,
            ScoreUpdateResponse,
        },
        session::{CreateSessionRequest, SessionDetail, SessionSummary, TeamLink, TeamPreview},
    },
    error::ServiceError,
    services::phase_service::timer_view,
    state::{
        AppState, SharedState,
        session::{self, BacklogProgress, SessionParams, new_session, roster_for, session_id_at},
    },
};

/// Attempts at drawing an unused session id before giving up.
const MAX_ID_ATTEMPTS: usize = 8;

/// Project a document into the game control view.
pub fn session_detail(state: &AppState, doc: SessionDocument) -> SessionDetail {
    let team_links = doc
        .tokens
        .iter()
        .map(|(team, token)| TeamLink {
            team: team.clone(),
            token: token.clone(),
            order_path: format!("/team/{}/{}/order", doc.id, token),
        })
        .collect();

    SessionDetail {
        summary: SessionSummary::from(&doc),
        timer: timer_view(state, &doc),
        team_links,
        document: doc,
    }
}

async fn fresh_session_id(state: &AppState, now: i64) -> Result<String, ServiceError> {
    for _ in 0..MAX_ID_ATTEMPTS {
        let candidate = session_id_at(now);
        if let Err(LoadError::NotFound(_)) = state.store().load(&candidate).await {
            return Ok(candidate);
        }
        debug!(session_id = %candidate, "session id already taken; drawing another");
    }
    Err(ServiceError::InvalidState(
        "could not allocate an unused session id".into(),
    ))
}

/// Create and persist a fully initialized session.
pub async fn create_session(
    state: &SharedState,
    request: CreateSessionRequest,
) -> Result<SessionDetail, ServiceError> {
    let config = state.config();
    let now = state.clock().now();
    let id = fresh_session_id(state, now).await?;

    let params = SessionParams {
        date: request.date.trim().to_string(),
        location: request.location.trim().to_string(),
        player_count: request.player_count,
        order_minutes: request.order_minutes.unwrap_or(config.default_order_minutes),
        diplomacy_minutes: request
            .diplomacy_minutes
            .unwrap_or(config.default_diplomacy_minutes),
    };
    let mut doc = new_session(config, state.tokens(), id, params, now);
    state.persist(&mut doc).await?;

    info!(
        session_id = %doc.id,
        players = doc.player_count,
        teams = doc.teams.len(),
        "session created"
    );
    Ok(session_detail(state, doc))
}

/// Store a previously exported document under its own id.
///
/// The document is migrated and brought within the configured limits first.
/// Roster teams without a token get one. An id already in use is refused,
/// including one whose file is unreadable.
pub async fn import_session(
    state: &SharedState,
    document: SessionDocument,
) -> Result<SessionDetail, ServiceError> {
    let mut doc = document.migrate();
    if !is_valid_session_id(&doc.id) {
        return Err(ServiceError::InvalidInput(format!("invalid session id `{}`", doc.id)));
    }
    if doc.teams.is_empty() {
        return Err(ServiceError::InvalidInput("session has no teams".into()));
    }
    state.conform(&mut doc);

    match state.store().load(&doc.id).await {
        Err(LoadError::NotFound(_)) => {}
        Ok(_) | Err(LoadError::Corrupt { .. }) => {
            warn!(session_id = %doc.id, "refusing to import over an existing session");
            return Err(ServiceError::InvalidState(format!(
                "session `{}` already exists",
                doc.id
            )));
        }
    }

    let missing: Vec<String> = doc
        .teams
        .iter()
        .filter(|team| !doc.tokens.contains_key(team.as_str()))
        .cloned()
        .collect();
    if !missing.is_empty() {
        let issued = state.tokens().generate_all(&doc.id, &missing);
        doc.tokens.extend(issued);
    }

    state.persist(&mut doc).await?;
    info!(
        session_id = %doc.id,
        round = doc.round,
        phase = %doc.phase,
        new_tokens = missing.len(),
        "session imported"
    );
    Ok(session_detail(state, doc))
}

/// Roster a session would get for `player_count` players.
pub fn team_preview(state: &AppState, player_count: u32) -> TeamPreview {
    TeamPreview {
        player_count,
        teams: roster_for(&state.config().teams, player_count),
    }
}

/// Summaries of every readable session, ordered by id.
pub async fn list_sessions(state: &SharedState) -> Result<Vec<SessionSummary>, ServiceError> {
    let documents = state.store().list().await?;
    Ok(documents.iter().map(SessionSummary::from).collect())
}

pub async fn get_session(state: &SharedState, id: &str) -> Result<SessionDetail, ServiceError> {
    let doc = state.load_session(id).await?;
    Ok(session_detail(state, doc))
}

pub async fn delete_session(state: &SharedState, id: &str) -> Result<(), ServiceError> {
    if state.store().delete(id).await? {
        info!(session_id = %id, "session deleted");
        Ok(())
    } else {
        Err(ServiceError::NotFound(format!("session `{id}`")))
    }
}

/// Reset progress; tokens and roster are kept.
pub async fn reset_session(state: &SharedState, id: &str) -> Result<SessionDetail, ServiceError> {
    let (doc, ()) = state
        .update_session(id, |doc| {
            state.machine().reset(doc);
            Ok(())
        })
        .await?;
    Ok(session_detail(state, doc))
}

pub async fn update_score(
    state: &SharedState,
    id: &str,
    team: &str,
    request: ScoreUpdateRequest,
) -> Result<ScoreUpdateResponse, ServiceError> {
    let (_, score) = state
        .update_session(id, |doc| {
            if let Some(current) = request.current {
                session::set_score(doc, team, current)?;
            }
            if let Some(supported) = request.government_support {
                session::set_government_support(doc, team, supported)?;
            }
            doc.scores
                .get(team)
                .cloned()
                .ok_or_else(|| ServiceError::InvalidInput(format!("unknown team `{team}`")))
        })
        .await?;

    Ok(ScoreUpdateResponse {
        team: team.to_string(),
        score,
    })
}

pub async fn set_checkbox(
    state: &SharedState,
    id: &str,
    request: CheckboxRequest,
) -> Result<ActionResponse, ServiceError> {
    state
        .update_session(id, |doc| {
            Ok(session::set_checkbox(doc, request.key.trim(), request.checked)?)
        })
        .await?;
    Ok(ActionResponse {
        message: format!("checkbox {} updated", request.key.trim()),
    })
}

pub async fn record_backlog_progress(
    state: &SharedState,
    id: &str,
    request: BacklogProgressRequest,
) -> Result<ActionResponse, ServiceError> {
    state
        .update_session(id, |doc| {
            Ok(session::record_backlog_progress(
                doc,
                BacklogProgress {
                    team: &request.team,
                    task: &request.task,
                    stage: request.stage.as_deref(),
                    spent_points: request.spent_points,
                    completed: request.completed,
                },
            )?)
        })
        .await?;
    Ok(ActionResponse {
        message: format!("progress recorded for {}", request.task),
    })
}
