//! Order entry payloads for the team routes.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    dao::models::{Activity, ActivityKind, OrderEntry, OrderPayload, Phase, TargetArea},
    dto::{
        timer::TimerResponse,
        validation::{validate_not_blank, validate_team_names},
    },
    state::orders::Budget,
};

/// One activity as typed into the order form.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct ActivityInput {
    #[validate(custom(function = "validate_not_blank"))]
    pub action: String,
    #[validate(length(max = 500))]
    #[serde(default)]
    pub purpose: String,
    pub target: TargetArea,
    #[validate(custom(function = "validate_team_names"))]
    #[serde(default)]
    pub affected_teams: Vec<String>,
    pub kind: ActivityKind,
    #[validate(range(max = 100))]
    pub points: u32,
}

impl From<ActivityInput> for Activity {
    fn from(input: ActivityInput) -> Self {
        Self {
            action: input.action.trim().to_string(),
            purpose: input.purpose.trim().to_string(),
            target: input.target,
            affected_teams: input.affected_teams.into_iter().collect(),
            kind: input.kind,
            points: input.points,
        }
    }
}

/// Body of `save_order` and `submit_order`.
#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
pub struct OrderRequest {
    #[validate(length(max = 6), nested)]
    #[serde(default)]
    pub activities: Vec<ActivityInput>,
}

impl From<OrderRequest> for OrderPayload {
    fn from(request: OrderRequest) -> Self {
        Self {
            activities: request.activities.into_iter().map(Into::into).collect(),
        }
    }
}

/// Acknowledgement returned after an order write.
#[derive(Debug, Serialize, ToSchema)]
pub struct OrderAck {
    pub team: String,
    pub round: u32,
    #[serde(rename = "final")]
    pub is_final: bool,
    pub submitted_at: i64,
    pub budget: Budget,
}

/// Everything the order page of one team needs.
#[derive(Debug, Serialize, ToSchema)]
pub struct TeamOrderView {
    pub session_id: String,
    pub team: String,
    pub round: u32,
    pub phase: Phase,
    /// Whether the team may still write this round's order.
    pub can_submit: bool,
    pub order: Option<OrderEntry>,
    pub budget: Budget,
    pub timer: TimerResponse,
    /// Teams that may appear as affected teams.
    pub teams: Vec<String>,
}

/// One team's order in a round listing.
#[derive(Debug, Serialize, ToSchema)]
pub struct TeamOrder {
    pub team: String,
    pub order: OrderEntry,
    pub budget: Budget,
}

/// Every order of one round, for game control.
#[derive(Debug, Serialize, ToSchema)]
pub struct RoundOrdersResponse {
    pub round: u32,
    pub orders: Vec<TeamOrder>,
    /// Roster teams without any entry for the round.
    pub missing: Vec<String>,
}
