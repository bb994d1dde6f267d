use axum::{
    Json, Router,
    body::Body,
    extract::{Path, State},
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{get, post, put},
};
use axum_valid::Valid;
use subtle::ConstantTimeEq;

use crate::{
    dao::models::SessionDocument,
    dto::{
        admin::{
            ActionResponse, BacklogProgressRequest, CheckboxRequest, ScoreUpdateRequest,
            ScoreUpdateResponse, TransitionResponse,
        },
        order::RoundOrdersResponse,
        session::{CreateSessionRequest, SessionDetail, SessionSummary, TeamPreview},
        timer::{TimerActionRequest, TimerResponse},
    },
    error::AppError,
    services::{order_service, phase_service, session_service},
    state::SharedState,
};

const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Game control endpoints for creating and driving sessions.
pub fn router(state: SharedState) -> Router<SharedState> {
    Router::new()
        .route("/admin/sessions", get(list_sessions).post(create_session))
        .route("/admin/sessions/import", post(import_session))
        .route("/admin/teams/{player_count}", get(team_preview))
        .route(
            "/admin/sessions/{id}",
            get(get_session).delete(delete_session),
        )
        .route("/admin/sessions/{id}/reset", post(reset_session))
        .route("/admin/sessions/{id}/advance", post(advance_phase))
        .route("/admin/sessions/{id}/new-round", post(new_round))
        .route("/admin/sessions/{id}/end", post(end_session))
        .route(
            "/admin/sessions/{id}/timer",
            get(timer_status).post(timer_action),
        )
        .route(
            "/admin/sessions/{id}/teams/{team}/score",
            put(update_score),
        )
        .route("/admin/sessions/{id}/checkboxes", put(set_checkbox))
        .route("/admin/sessions/{id}/backlog", post(record_backlog_progress))
        .route("/admin/sessions/{id}/orders/{round}", get(round_orders))
        .route_layer(middleware::from_fn_with_state(state, require_admin_token))
}

/// List every stored session.
#[utoipa::path(
    get,
    path = "/admin/sessions",
    tag = "admin",
    params(("X-Admin-Token" = Option<String>, Header, description = "Required when an admin token is configured")),
    responses((status = 200, description = "Stored sessions", body = [SessionSummary]))
)]
pub async fn list_sessions(
    State(state): State<SharedState>,
) -> Result<Json<Vec<SessionSummary>>, AppError> {
    Ok(Json(session_service::list_sessions(&state).await?))
}

/// Create a session; the roster follows from the player count.
#[utoipa::path(
    post,
    path = "/admin/sessions",
    tag = "admin",
    params(("X-Admin-Token" = Option<String>, Header, description = "Required when an admin token is configured")),
    request_body = CreateSessionRequest,
    responses(
        (status = 201, description = "Session created", body = SessionDetail),
        (status = 400, description = "Invalid request"),
    )
)]
pub async fn create_session(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateSessionRequest>>,
) -> Result<(StatusCode, Json<SessionDetail>), AppError> {
    let detail = session_service::create_session(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

/// Store an exported session document under its own id.
#[utoipa::path(
    post,
    path = "/admin/sessions/import",
    tag = "admin",
    params(("X-Admin-Token" = Option<String>, Header, description = "Required when an admin token is configured")),
    request_body(content = serde_json::Value, description = "Session document as returned in `document` by the session endpoint"),
    responses(
        (status = 201, description = "Session imported", body = SessionDetail),
        (status = 400, description = "Invalid id or empty roster"),
        (status = 409, description = "A session with this id already exists"),
    )
)]
pub async fn import_session(
    State(state): State<SharedState>,
    Json(document): Json<SessionDocument>,
) -> Result<(StatusCode, Json<SessionDetail>), AppError> {
    let detail = session_service::import_session(&state, document).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

/// Teams a session would get for a player count.
#[utoipa::path(
    get,
    path = "/admin/teams/{player_count}",
    tag = "admin",
    params(("X-Admin-Token" = Option<String>, Header, description = "Required when an admin token is configured"),
    ("player_count" = u32, Path, description = "Number of players")),
    responses((status = 200, description = "Roster preview", body = TeamPreview))
)]
pub async fn team_preview(
    State(state): State<SharedState>,
    Path(player_count): Path<u32>,
) -> Json<TeamPreview> {
    Json(session_service::team_preview(&state, player_count))
}

/// Retrieve a session with its team links and timer.
#[utoipa::path(
    get,
    path = "/admin/sessions/{id}",
    tag = "admin",
    params(("X-Admin-Token" = Option<String>, Header, description = "Required when an admin token is configured"),
    ("id" = String, Path, description = "Session identifier")),
    responses(
        (status = 200, description = "Session", body = SessionDetail),
        (status = 404, description = "Unknown session"),
    )
)]
pub async fn get_session(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<SessionDetail>, AppError> {
    Ok(Json(session_service::get_session(&state, &id).await?))
}

/// Delete a session and its backup.
#[utoipa::path(
    delete,
    path = "/admin/sessions/{id}",
    tag = "admin",
    params(("X-Admin-Token" = Option<String>, Header, description = "Required when an admin token is configured"),
    ("id" = String, Path, description = "Session identifier")),
    responses((status = 204, description = "Session deleted"))
)]
pub async fn delete_session(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    session_service::delete_session(&state, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Return the session to round 1; tokens stay valid.
#[utoipa::path(
    post,
    path = "/admin/sessions/{id}/reset",
    tag = "admin",
    params(("X-Admin-Token" = Option<String>, Header, description = "Required when an admin token is configured"),
    ("id" = String, Path, description = "Session identifier")),
    responses((status = 200, description = "Session reset", body = SessionDetail))
)]
pub async fn reset_session(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<SessionDetail>, AppError> {
    Ok(Json(session_service::reset_session(&state, &id).await?))
}

/// Move to the next phase.
#[utoipa::path(
    post,
    path = "/admin/sessions/{id}/advance",
    tag = "admin",
    params(("X-Admin-Token" = Option<String>, Header, description = "Required when an admin token is configured"),
    ("id" = String, Path, description = "Session identifier")),
    responses(
        (status = 200, description = "Phase advanced", body = TransitionResponse),
        (status = 409, description = "Session ended or last round reached"),
    )
)]
pub async fn advance_phase(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<TransitionResponse>, AppError> {
    Ok(Json(phase_service::advance(&state, &id).await?))
}

/// Start the next round at its order phase.
#[utoipa::path(
    post,
    path = "/admin/sessions/{id}/new-round",
    tag = "admin",
    params(("X-Admin-Token" = Option<String>, Header, description = "Required when an admin token is configured"),
    ("id" = String, Path, description = "Session identifier")),
    responses(
        (status = 200, description = "New round started", body = TransitionResponse),
        (status = 409, description = "Session ended or last round reached"),
    )
)]
pub async fn new_round(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<TransitionResponse>, AppError> {
    Ok(Json(phase_service::new_round(&state, &id).await?))
}

/// End the session.
#[utoipa::path(
    post,
    path = "/admin/sessions/{id}/end",
    tag = "admin",
    params(("X-Admin-Token" = Option<String>, Header, description = "Required when an admin token is configured"),
    ("id" = String, Path, description = "Session identifier")),
    responses((status = 200, description = "Session ended", body = ActionResponse))
)]
pub async fn end_session(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(phase_service::end_session(&state, &id).await?))
}

/// Start, pause or reset the phase timer.
#[utoipa::path(
    post,
    path = "/admin/sessions/{id}/timer",
    tag = "admin",
    params(("X-Admin-Token" = Option<String>, Header, description = "Required when an admin token is configured"),
    ("id" = String, Path, description = "Session identifier")),
    request_body = TimerActionRequest,
    responses((status = 200, description = "Timer updated", body = TimerResponse))
)]
pub async fn timer_action(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(payload): Json<TimerActionRequest>,
) -> Result<Json<TimerResponse>, AppError> {
    Ok(Json(
        phase_service::timer_action(&state, &id, payload.action).await?,
    ))
}

/// Current timer view.
#[utoipa::path(
    get,
    path = "/admin/sessions/{id}/timer",
    tag = "admin",
    params(("X-Admin-Token" = Option<String>, Header, description = "Required when an admin token is configured"),
    ("id" = String, Path, description = "Session identifier")),
    responses((status = 200, description = "Timer", body = TimerResponse))
)]
pub async fn timer_status(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<TimerResponse>, AppError> {
    Ok(Json(phase_service::timer_status(&state, &id).await?))
}

/// Edit a team's action points or government support.
#[utoipa::path(
    put,
    path = "/admin/sessions/{id}/teams/{team}/score",
    tag = "admin",
    params(("X-Admin-Token" = Option<String>, Header, description = "Required when an admin token is configured"),
    ("id" = String, Path, description = "Session identifier"),
    ("team" = String, Path, description = "Team name")),
    request_body = ScoreUpdateRequest,
    responses((status = 200, description = "Score updated", body = ScoreUpdateResponse))
)]
pub async fn update_score(
    State(state): State<SharedState>,
    Path((id, team)): Path<(String, String)>,
    Valid(Json(payload)): Valid<Json<ScoreUpdateRequest>>,
) -> Result<Json<ScoreUpdateResponse>, AppError> {
    Ok(Json(
        session_service::update_score(&state, &id, &team, payload).await?,
    ))
}

/// Tick or untick a game control checkbox.
#[utoipa::path(
    put,
    path = "/admin/sessions/{id}/checkboxes",
    tag = "admin",
    params(("X-Admin-Token" = Option<String>, Header, description = "Required when an admin token is configured"),
    ("id" = String, Path, description = "Session identifier")),
    request_body = CheckboxRequest,
    responses((status = 200, description = "Checkbox stored", body = ActionResponse))
)]
pub async fn set_checkbox(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Valid(Json(payload)): Valid<Json<CheckboxRequest>>,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(session_service::set_checkbox(&state, &id, payload).await?))
}

/// Record progress on a backlog task.
#[utoipa::path(
    post,
    path = "/admin/sessions/{id}/backlog",
    tag = "admin",
    params(("X-Admin-Token" = Option<String>, Header, description = "Required when an admin token is configured"),
    ("id" = String, Path, description = "Session identifier")),
    request_body = BacklogProgressRequest,
    responses((status = 200, description = "Progress recorded", body = ActionResponse))
)]
pub async fn record_backlog_progress(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Valid(Json(payload)): Valid<Json<BacklogProgressRequest>>,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(
        session_service::record_backlog_progress(&state, &id, payload).await?,
    ))
}

/// Orders of one round, with the teams that have none.
#[utoipa::path(
    get,
    path = "/admin/sessions/{id}/orders/{round}",
    tag = "admin",
    params(("X-Admin-Token" = Option<String>, Header, description = "Required when an admin token is configured"),
    ("id" = String, Path, description = "Session identifier"),
    ("round" = u32, Path, description = "Round number")),
    responses((status = 200, description = "Round orders", body = RoundOrdersResponse))
)]
pub async fn round_orders(
    State(state): State<SharedState>,
    Path((id, round)): Path<(String, u32)>,
) -> Result<Json<RoundOrdersResponse>, AppError> {
    Ok(Json(order_service::round_orders(&state, &id, round).await?))
}

/// Reject admin requests without the configured token. Open when none is configured.
async fn require_admin_token(
    State(state): State<SharedState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let Some(expected) = state.config().admin_token.as_deref() else {
        return Ok(next.run(req).await);
    };

    let provided = req
        .headers()
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::Forbidden("missing admin token header `X-Admin-Token`".into()))?;

    if bool::from(expected.as_bytes().ct_eq(provided.as_bytes())) {
        Ok(next.run(req).await)
    } else {
        Err(AppError::Forbidden("invalid admin token".into()))
    }
}
