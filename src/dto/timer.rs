//! Timer payloads shared by the admin and team routes.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::dao::models::{Phase, TimerStatus};

/// Operator action on the phase timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TimerAction {
    Start,
    Pause,
    Reset,
}

/// Request body of `POST /admin/sessions/{id}/timer`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct TimerActionRequest {
    pub action: TimerAction,
}

/// Derived timer view; computed on every request, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct TimerResponse {
    pub remaining_seconds: i64,
    /// Remaining time as `MM:SS`.
    pub formatted: String,
    pub duration_seconds: i64,
    pub status: TimerStatus,
    pub phase: Phase,
    pub round: u32,
}

/// Format seconds as `MM:SS`; minutes are not wrapped into hours.
pub fn format_mm_ss(seconds: i64) -> String {
    let seconds = seconds.max(0);
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}
