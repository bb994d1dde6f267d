//! Persisted session document.
//!
//! One [`SessionDocument`] holds everything a session needs. Every field past
//! the identity block carries a serde default so documents written by older
//! schema versions still deserialize; [`SessionDocument::migrate`] then fills
//! the structural gaps the defaults cannot express.

use std::{collections::BTreeMap, fmt};

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use utoipa::ToSchema;

/// Schema version written by this build.
pub const SCHEMA_VERSION: u32 = 2;
/// Minutes configured for a timed phase when nothing else is known.
pub const DEFAULT_PHASE_MINUTES: u32 = 10;

/// Stage of a round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Teams write their orders.
    #[default]
    Order,
    /// Teams negotiate; orders may still be edited.
    Diplomacy,
    /// Game control resolves the round. Untimed.
    Result,
}

impl Phase {
    /// Whether the phase has a configured duration.
    pub fn is_timed(self) -> bool {
        matches!(self, Phase::Order | Phase::Diplomacy)
    }

    /// Whether teams may write orders during the phase.
    pub fn accepts_orders(self) -> bool {
        matches!(self, Phase::Order | Phase::Diplomacy)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Phase::Order => "order",
            Phase::Diplomacy => "diplomacy",
            Phase::Result => "result",
        };
        f.write_str(label)
    }
}

/// Status of a phase history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    Ongoing,
    Done,
}

/// One entry of the phase history log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PhaseRecord {
    pub round: u32,
    pub phase: Phase,
    pub status: PhaseStatus,
}

impl PhaseRecord {
    /// Build an ongoing entry for the given round and phase.
    pub fn ongoing(round: u32, phase: Phase) -> Self {
        Self {
            round,
            phase,
            status: PhaseStatus::Ongoing,
        }
    }

    /// Whether the entry is the open one.
    pub fn is_ongoing(&self) -> bool {
        self.status == PhaseStatus::Ongoing
    }
}

/// Run state of the phase timer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TimerStatus {
    #[default]
    Stopped,
    Running,
    Paused,
}

/// Timer fields. Remaining time is always derived from these, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerState {
    pub status: TimerStatus,
    /// Unix seconds at which the current running stretch began.
    pub start_epoch: Option<i64>,
    /// Seconds accumulated by previous running stretches.
    pub elapsed_seconds: i64,
    pub order_minutes: u32,
    pub diplomacy_minutes: u32,
}

impl Default for TimerState {
    fn default() -> Self {
        Self::with_durations(DEFAULT_PHASE_MINUTES, DEFAULT_PHASE_MINUTES)
    }
}

impl TimerState {
    /// Stopped timer with the given per-phase durations.
    pub fn with_durations(order_minutes: u32, diplomacy_minutes: u32) -> Self {
        Self {
            status: TimerStatus::Stopped,
            start_epoch: None,
            elapsed_seconds: 0,
            order_minutes,
            diplomacy_minutes,
        }
    }

    /// Configured minutes for `phase`; untimed phases have none.
    pub fn minutes_for(&self, phase: Phase) -> u32 {
        match phase {
            Phase::Order => self.order_minutes,
            Phase::Diplomacy => self.diplomacy_minutes,
            Phase::Result => 0,
        }
    }
}

/// Action points and government support of one team.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct TeamScore {
    /// Points the team starts with and returns to on reset.
    pub base: i32,
    pub current: i32,
    pub government_support: bool,
}

impl TeamScore {
    /// Fresh score record at the base value.
    pub fn new(base: i32) -> Self {
        Self {
            base,
            current: base,
            government_support: false,
        }
    }
}

/// One stage of a multi-stage backlog task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct BacklogStage {
    pub name: String,
    pub required_points: u32,
    #[serde(default)]
    pub spent_points: u32,
    #[serde(default)]
    pub completed: bool,
}

/// A task on a team's backlog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BacklogTask {
    /// Single step task.
    Flat {
        name: String,
        required_points: u32,
        #[serde(default)]
        spent_points: u32,
        #[serde(default)]
        completed: bool,
    },
    /// Task made of ordered stages.
    Staged {
        name: String,
        stages: Vec<BacklogStage>,
    },
}

impl BacklogTask {
    /// Display name of the task.
    pub fn name(&self) -> &str {
        match self {
            BacklogTask::Flat { name, .. } | BacklogTask::Staged { name, .. } => name,
        }
    }

    /// Zero every progress counter while keeping the task layout.
    pub fn reset_progress(&mut self) {
        match self {
            BacklogTask::Flat {
                spent_points,
                completed,
                ..
            } => {
                *spent_points = 0;
                *completed = false;
            }
            BacklogTask::Staged { stages, .. } => {
                for stage in stages {
                    stage.spent_points = 0;
                    stage.completed = false;
                }
            }
        }
    }
}

/// Whether an activity targets the team's own area or someone else's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TargetArea {
    Own,
    Other,
}

/// Whether an activity builds up or disrupts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Build,
    Disrupt,
}

/// One line of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Activity {
    pub action: String,
    pub purpose: String,
    pub target: TargetArea,
    #[schema(value_type = Vec<String>)]
    pub affected_teams: IndexSet<String>,
    pub kind: ActivityKind,
    pub points: u32,
}

/// Decision payload a team submits for a round.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct OrderPayload {
    #[serde(default)]
    pub activities: Vec<Activity>,
}

impl OrderPayload {
    /// Sum of the points spent across all activities.
    pub fn spent_points(&self) -> u32 {
        self.activities.iter().map(|activity| activity.points).sum()
    }
}

/// Ledger entry for one (round, team) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct OrderEntry {
    pub payload: OrderPayload,
    /// Unix seconds of the latest write.
    pub submitted_at: i64,
    /// Phase during which the latest write happened.
    pub phase: Phase,
    #[serde(rename = "final", default)]
    pub is_final: bool,
    #[serde(default)]
    pub auto_submitted: bool,
}

/// Orders of one round keyed by team name.
pub type RoundOrders = IndexMap<String, OrderEntry>;

/// Complete persisted state of one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDocument {
    #[serde(default)]
    pub schema_version: u32,
    /// Bumped on every save; reserved for compare-and-swap.
    #[serde(default)]
    pub revision: u64,
    pub id: String,
    /// Exercise date as entered by the operator.
    pub date: String,
    pub location: String,
    pub player_count: u32,
    /// RFC 3339 creation timestamp.
    #[serde(default)]
    pub created_at: String,
    pub teams: Vec<String>,
    #[serde(default = "first_round")]
    pub round: u32,
    #[serde(default)]
    pub phase: Phase,
    #[serde(default)]
    pub history: Vec<PhaseRecord>,
    #[serde(default)]
    pub timer: TimerState,
    #[serde(default)]
    pub scores: IndexMap<String, TeamScore>,
    #[serde(default)]
    pub backlog: IndexMap<String, Vec<BacklogTask>>,
    #[serde(default)]
    pub orders: BTreeMap<u32, RoundOrders>,
    #[serde(default)]
    pub tokens: IndexMap<String, String>,
    #[serde(default)]
    pub checkboxes: IndexMap<String, bool>,
    #[serde(default)]
    pub ended: bool,
}

fn first_round() -> u32 {
    1
}

impl SessionDocument {
    /// Whether `team` belongs to the roster.
    pub fn has_team(&self, team: &str) -> bool {
        self.teams.iter().any(|candidate| candidate == team)
    }

    /// The open history entry, if any.
    pub fn ongoing_record(&self) -> Option<&PhaseRecord> {
        self.history.iter().rev().find(|record| record.is_ongoing())
    }

    /// Bring a freshly deserialized document up to the current schema.
    ///
    /// Fills the backlog map for every roster team and repairs the history so
    /// exactly one ongoing entry matches `(round, phase)`. Limits that depend on
    /// configuration are applied by [`SessionDocument::conform`].
    pub fn migrate(mut self) -> Self {
        if self.schema_version < SCHEMA_VERSION {
            debug!(
                session_id = %self.id,
                from = self.schema_version,
                to = SCHEMA_VERSION,
                "upgrading session document schema"
            );
            self.schema_version = SCHEMA_VERSION;
        }

        if self.round == 0 {
            self.round = 1;
        }

        for team in &self.teams {
            self.backlog.entry(team.clone()).or_default();
        }

        self.repair_history();
        self
    }

    /// Bring the document within the configured game: round at most
    /// `max_round + 1`, no Diplomacy from `max_round` on, and a score record
    /// at base points for every roster team.
    pub fn conform(&mut self, max_round: u32, base_points: impl Fn(&str) -> i32) {
        let last_round = max_round + 1;
        if self.round > last_round {
            warn!(
                session_id = %self.id,
                round = self.round,
                last_round,
                "session round beyond the last round; clamping"
            );
            self.round = last_round;
        }
        if self.phase == Phase::Diplomacy && self.round >= max_round {
            warn!(session_id = %self.id, round = self.round, "no diplomacy phase in this round; back to order");
            self.phase = Phase::Order;
        }

        for team in &self.teams {
            self.scores
                .entry(team.clone())
                .or_insert_with(|| TeamScore::new(base_points(team)));
        }

        self.repair_history();
    }

    fn repair_history(&mut self) {
        let (round, phase) = (self.round, self.phase);
        let keep = self
            .history
            .iter()
            .rposition(|record| record.is_ongoing() && record.round == round && record.phase == phase);

        for (index, record) in self.history.iter_mut().enumerate() {
            if record.is_ongoing() && Some(index) != keep {
                record.status = PhaseStatus::Done;
            }
        }

        if keep.is_none() {
            self.history.push(PhaseRecord::ongoing(round, phase));
        }
    }
}
