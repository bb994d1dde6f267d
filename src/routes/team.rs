use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use axum_valid::Valid;

use crate::{
    dto::{
        order::{OrderAck, OrderRequest, TeamOrderView},
        timer::TimerResponse,
    },
    error::AppError,
    services::order_service,
    state::SharedState,
};

/// Order entry routes; the capability token in the path identifies the team.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/team/{id}/{token}/order", get(team_order))
        .route("/team/{id}/{token}/save_order", post(save_order))
        .route("/team/{id}/{token}/submit_order", post(submit_order))
        .route("/team/{id}/{token}/timer", get(team_timer))
}

#[utoipa::path(
    get,
    path = "/team/{id}/{token}/order",
    tag = "team",
    params(
        ("id" = String, Path, description = "Session identifier"),
        ("token" = String, Path, description = "Team capability token"),
    ),
    responses(
        (status = 200, description = "Order form state for the team", body = TeamOrderView),
        (status = 403, description = "Token does not belong to the session"),
        (status = 404, description = "Unknown session"),
    )
)]
/// Current round, phase and order of the token's team.
pub async fn team_order(
    State(state): State<SharedState>,
    Path((id, token)): Path<(String, String)>,
) -> Result<Json<TeamOrderView>, AppError> {
    Ok(Json(order_service::team_order(&state, &id, &token).await?))
}

#[utoipa::path(
    post,
    path = "/team/{id}/{token}/save_order",
    tag = "team",
    params(
        ("id" = String, Path, description = "Session identifier"),
        ("token" = String, Path, description = "Team capability token"),
    ),
    request_body = OrderRequest,
    responses(
        (status = 200, description = "Draft saved", body = OrderAck),
        (status = 400, description = "Invalid order"),
        (status = 403, description = "Token does not belong to the session"),
        (status = 409, description = "Order already final or phase closed"),
    )
)]
/// Store an editable draft.
pub async fn save_order(
    State(state): State<SharedState>,
    Path((id, token)): Path<(String, String)>,
    Valid(Json(payload)): Valid<Json<OrderRequest>>,
) -> Result<Json<OrderAck>, AppError> {
    Ok(Json(
        order_service::save_order(&state, &id, &token, payload).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/team/{id}/{token}/submit_order",
    tag = "team",
    params(
        ("id" = String, Path, description = "Session identifier"),
        ("token" = String, Path, description = "Team capability token"),
    ),
    request_body = OrderRequest,
    responses(
        (status = 200, description = "Order submitted as final", body = OrderAck),
        (status = 400, description = "Invalid order"),
        (status = 403, description = "Token does not belong to the session"),
        (status = 409, description = "Order already final or phase closed"),
    )
)]
/// Submit the final order; it can no longer be edited afterwards.
pub async fn submit_order(
    State(state): State<SharedState>,
    Path((id, token)): Path<(String, String)>,
    Valid(Json(payload)): Valid<Json<OrderRequest>>,
) -> Result<Json<OrderAck>, AppError> {
    Ok(Json(
        order_service::submit_order(&state, &id, &token, payload).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/team/{id}/{token}/timer",
    tag = "team",
    params(
        ("id" = String, Path, description = "Session identifier"),
        ("token" = String, Path, description = "Team capability token"),
    ),
    responses(
        (status = 200, description = "Phase timer", body = TimerResponse),
        (status = 403, description = "Token does not belong to the session"),
    )
)]
/// Remaining time in the current phase.
pub async fn team_timer(
    State(state): State<SharedState>,
    Path((id, token)): Path<(String, String)>,
) -> Result<Json<TimerResponse>, AppError> {
    Ok(Json(order_service::team_timer(&state, &id, &token).await?))
}
