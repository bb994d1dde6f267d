//! Session creation and listing payloads.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    dao::models::{Phase, SessionDocument},
    dto::{timer::TimerResponse, validation::validate_not_blank},
};

/// Request to create a session.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateSessionRequest {
    /// Exercise date as shown to participants.
    #[validate(custom(function = "validate_not_blank"))]
    pub date: String,
    #[validate(custom(function = "validate_not_blank"))]
    pub location: String,
    #[validate(range(min = 1, max = 1000))]
    pub player_count: u32,
    /// Defaults to the configured order phase length.
    #[validate(range(min = 1, max = 240))]
    pub order_minutes: Option<u32>,
    /// Defaults to the configured diplomacy phase length.
    #[validate(range(min = 1, max = 240))]
    pub diplomacy_minutes: Option<u32>,
}

/// Minimal projection of a session when listed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct SessionSummary {
    pub id: String,
    pub date: String,
    pub location: String,
    pub player_count: u32,
    pub created_at: String,
    pub round: u32,
    pub phase: Phase,
    pub ended: bool,
}

impl From<&SessionDocument> for SessionSummary {
    fn from(doc: &SessionDocument) -> Self {
        Self {
            id: doc.id.clone(),
            date: doc.date.clone(),
            location: doc.location.clone(),
            player_count: doc.player_count,
            created_at: doc.created_at.clone(),
            round: doc.round,
            phase: doc.phase,
            ended: doc.ended,
        }
    }
}

/// Link handed out to one team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct TeamLink {
    pub team: String,
    pub token: String,
    /// Relative path of the team's order endpoint.
    pub order_path: String,
}

/// Full session view for game control.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionDetail {
    pub summary: SessionSummary,
    pub timer: TimerResponse,
    pub team_links: Vec<TeamLink>,
    /// The stored document as persisted.
    #[schema(value_type = Object)]
    pub document: SessionDocument,
}

/// Teams that would take part for a player count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct TeamPreview {
    pub player_count: u32,
    pub teams: Vec<String>,
}
