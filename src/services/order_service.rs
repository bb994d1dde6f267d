//! Order entry for teams holding a capability token, plus the round listing
//! game control reads.

use tracing::{info, warn};

use crate::{
    dao::models::{OrderEntry, OrderPayload, SessionDocument},
    dto::{
        order::{OrderAck, OrderRequest, RoundOrdersResponse, TeamOrder, TeamOrderView},
        timer::TimerResponse,
    },
    error::ServiceError,
    services::phase_service::timer_view,
    state::{AppState, SharedState, orders::Budget},
};

/// Team owning `token` in `doc`.
fn resolve_team(state: &AppState, doc: &SessionDocument, token: &str) -> Result<String, ServiceError> {
    match state.tokens().resolve(doc, token) {
        Some(team) => Ok(team.to_string()),
        None => {
            warn!(session_id = %doc.id, "rejected unknown team token");
            Err(ServiceError::Unauthorized("invalid team token".into()))
        }
    }
}

fn budget(state: &AppState, doc: &SessionDocument, round: u32, team: &str) -> Budget {
    state.ledger().budget(doc, round, team).unwrap_or_default()
}

async fn authorize(
    state: &SharedState,
    id: &str,
    token: &str,
) -> Result<(SessionDocument, String), ServiceError> {
    let doc = state.load_session(id).await?;
    let team = resolve_team(state, &doc, token)?;
    Ok((doc, team))
}

/// Current round, phase, order and timer for the token's team.
pub async fn team_order(
    state: &SharedState,
    id: &str,
    token: &str,
) -> Result<TeamOrderView, ServiceError> {
    let (doc, team) = authorize(state, id, token).await?;
    let order = state.ledger().get(&doc, doc.round, &team).cloned();
    let can_submit = !doc.ended
        && doc.phase.accepts_orders()
        && !order.as_ref().is_some_and(|entry| entry.is_final);

    Ok(TeamOrderView {
        session_id: doc.id.clone(),
        round: doc.round,
        phase: doc.phase,
        can_submit,
        budget: budget(state, &doc, doc.round, &team),
        timer: timer_view(state, &doc),
        teams: doc.teams.clone(),
        order,
        team,
    })
}

async fn write_order(
    state: &SharedState,
    id: &str,
    token: &str,
    request: OrderRequest,
    is_final: bool,
) -> Result<OrderAck, ServiceError> {
    let payload: OrderPayload = request.into();
    let (doc, (team, entry)) = state
        .update_session(id, |doc| {
            let team = resolve_team(state, doc, token)?;
            let entry = if is_final {
                state.ledger().submit_final(doc, &team, payload)?
            } else {
                state.ledger().save_draft(doc, &team, payload)?
            };
            Ok((team, entry))
        })
        .await?;

    info!(
        session_id = %id,
        team = %team,
        round = doc.round,
        is_final,
        activities = entry.payload.activities.len(),
        "order written"
    );

    Ok(OrderAck {
        budget: budget(state, &doc, doc.round, &team),
        round: doc.round,
        is_final: entry.is_final,
        submitted_at: entry.submitted_at,
        team,
    })
}

/// Save the team's order as an editable draft.
pub async fn save_order(
    state: &SharedState,
    id: &str,
    token: &str,
    request: OrderRequest,
) -> Result<OrderAck, ServiceError> {
    write_order(state, id, token, request, false).await
}

/// Submit the team's final order for the round.
pub async fn submit_order(
    state: &SharedState,
    id: &str,
    token: &str,
    request: OrderRequest,
) -> Result<OrderAck, ServiceError> {
    write_order(state, id, token, request, true).await
}

pub async fn team_timer(
    state: &SharedState,
    id: &str,
    token: &str,
) -> Result<TimerResponse, ServiceError> {
    let (doc, _) = authorize(state, id, token).await?;
    Ok(timer_view(state, &doc))
}

/// Every order of `round` with the advisory budget of each team.
pub async fn round_orders(
    state: &SharedState,
    id: &str,
    round: u32,
) -> Result<RoundOrdersResponse, ServiceError> {
    let doc = state.load_session(id).await?;
    let entries = doc.orders.get(&round);

    let orders = entries
        .into_iter()
        .flatten()
        .map(|(team, order): (&String, &OrderEntry)| TeamOrder {
            team: team.clone(),
            order: order.clone(),
            budget: budget(state, &doc, round, team),
        })
        .collect();
    let missing = doc
        .teams
        .iter()
        .filter(|team| !entries.is_some_and(|orders| orders.contains_key(team.as_str())))
        .cloned()
        .collect();

    Ok(RoundOrdersResponse {
        round,
        orders,
        missing,
    })
}
