//! DTO definitions used by the admin REST API and documentation layer.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    dao::models::{Phase, TeamScore},
    dto::{timer::TimerResponse, validation::validate_not_blank},
};

/// Generic action acknowledgement used by admin endpoints.
#[derive(Debug, Serialize, ToSchema)]
pub struct ActionResponse {
    pub message: String,
}

/// Result of a phase transition.
#[derive(Debug, Serialize, ToSchema)]
pub struct TransitionResponse {
    pub from_round: u32,
    pub from_phase: Phase,
    pub round: u32,
    pub phase: Phase,
    /// Teams whose draft orders were finalized by the transition.
    pub finalized: Vec<String>,
    pub timer: TimerResponse,
}

/// Request to edit a team's score record. Absent fields are left unchanged.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct ScoreUpdateRequest {
    #[validate(range(min = -1000, max = 1000))]
    pub current: Option<i32>,
    pub government_support: Option<bool>,
}

/// Result of a score edit, returning the updated record.
#[derive(Debug, Serialize, ToSchema)]
pub struct ScoreUpdateResponse {
    pub team: String,
    pub score: TeamScore,
}

/// Request to tick or untick a game control checkbox.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CheckboxRequest {
    #[validate(custom(function = "validate_not_blank"), length(max = 100))]
    pub key: String,
    pub checked: bool,
}

/// Request to record progress on a backlog task or one of its stages.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct BacklogProgressRequest {
    #[validate(custom(function = "validate_not_blank"))]
    pub team: String,
    #[validate(custom(function = "validate_not_blank"))]
    pub task: String,
    /// Required for staged tasks, rejected for flat ones.
    pub stage: Option<String>,
    #[validate(range(max = 1000))]
    pub spent_points: u32,
    #[serde(default)]
    pub completed: bool,
}
