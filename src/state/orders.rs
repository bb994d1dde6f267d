//! Per-round, per-team order ledger.

use serde::Serialize;
use thiserror::Error;
use tracing::info;
use utoipa::ToSchema;

use crate::{
    dao::models::{OrderEntry, OrderPayload, Phase, SessionDocument},
    state::clock::PhaseClock,
};

/// Maximum number of activities in one order.
pub const MAX_ACTIVITIES: usize = 6;

/// Why an order write was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("orders cannot be written during the {phase} phase")]
    PhaseNotEligible { phase: Phase },
    #[error("the order of {team} for round {round} is final")]
    AlreadyFinal { team: String, round: u32 },
    #[error("unknown team `{0}`")]
    UnknownTeam(String),
    #[error("an order holds at most {MAX_ACTIVITIES} activities, got {count}")]
    TooManyActivities { count: usize },
    #[error("the session has ended")]
    SessionEnded,
}

/// Advisory point budget of a team for one round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct Budget {
    /// The team's current action points.
    pub allotment: i32,
    /// Points spent by the team's order this round.
    pub spent: u32,
    pub over_budget: bool,
}

/// Draft/final order bookkeeping over a [`SessionDocument`].
#[derive(Debug, Clone)]
pub struct OrderLedger {
    clock: PhaseClock,
}

impl OrderLedger {
    pub fn new(clock: PhaseClock) -> Self {
        Self { clock }
    }

    /// Upsert a non-final order for the current round.
    pub fn save_draft(
        &self,
        doc: &mut SessionDocument,
        team: &str,
        payload: OrderPayload,
    ) -> Result<OrderEntry, LedgerError> {
        self.write(doc, team, payload, false)
    }

    /// Upsert and lock the order for the current round.
    pub fn submit_final(
        &self,
        doc: &mut SessionDocument,
        team: &str,
        payload: OrderPayload,
    ) -> Result<OrderEntry, LedgerError> {
        self.write(doc, team, payload, true)
    }

    /// Force every draft of `round` to final. Teams without an entry stay absent.
    pub fn auto_finalize_unsubmitted(&self, doc: &mut SessionDocument, round: u32) -> Vec<String> {
        finalize_pending(doc, round, self.clock.now())
    }

    pub fn get<'a>(&self, doc: &'a SessionDocument, round: u32, team: &str) -> Option<&'a OrderEntry> {
        doc.orders.get(&round)?.get(team)
    }

    /// Points allotted and spent by `team` in `round`. Never enforced.
    pub fn budget(&self, doc: &SessionDocument, round: u32, team: &str) -> Option<Budget> {
        let allotment = doc.scores.get(team)?.current;
        let spent = self
            .get(doc, round, team)
            .map(|entry| entry.payload.spent_points())
            .unwrap_or_default();
        Some(Budget {
            allotment,
            spent,
            over_budget: i64::from(spent) > i64::from(allotment),
        })
    }

    fn write(
        &self,
        doc: &mut SessionDocument,
        team: &str,
        payload: OrderPayload,
        is_final: bool,
    ) -> Result<OrderEntry, LedgerError> {
        if doc.ended {
            return Err(LedgerError::SessionEnded);
        }
        if !doc.phase.accepts_orders() {
            return Err(LedgerError::PhaseNotEligible { phase: doc.phase });
        }
        if !doc.has_team(team) {
            return Err(LedgerError::UnknownTeam(team.to_string()));
        }
        check_payload(doc, &payload)?;

        let round = doc.round;
        let entry = OrderEntry {
            payload,
            submitted_at: self.clock.now(),
            phase: doc.phase,
            is_final,
            auto_submitted: false,
        };

        let orders = doc.orders.entry(round).or_default();
        if orders.get(team).is_some_and(|existing| existing.is_final) {
            return Err(LedgerError::AlreadyFinal {
                team: team.to_string(),
                round,
            });
        }
        orders.insert(team.to_string(), entry.clone());

        Ok(entry)
    }
}

fn check_payload(doc: &SessionDocument, payload: &OrderPayload) -> Result<(), LedgerError> {
    let count = payload.activities.len();
    if count > MAX_ACTIVITIES {
        return Err(LedgerError::TooManyActivities { count });
    }

    let unknown = payload
        .activities
        .iter()
        .flat_map(|activity| activity.affected_teams.iter())
        .find(|team| !doc.has_team(team));
    match unknown {
        Some(team) => Err(LedgerError::UnknownTeam(team.clone())),
        None => Ok(()),
    }
}

/// Promote every draft of `round` to an auto-submitted final order.
///
/// Returns the teams whose orders were promoted.
pub fn finalize_pending(doc: &mut SessionDocument, round: u32, now: i64) -> Vec<String> {
    let Some(orders) = doc.orders.get_mut(&round) else {
        return Vec::new();
    };

    let mut promoted = Vec::new();
    for (team, entry) in orders.iter_mut().filter(|(_, entry)| !entry.is_final) {
        entry.is_final = true;
        entry.auto_submitted = true;
        entry.submitted_at = now;
        promoted.push(team.clone());
    }

    if !promoted.is_empty() {
        info!(session_id = %doc.id, round, teams = ?promoted, "auto-finalized pending orders");
    }
    promoted
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use indexmap::IndexSet;

    use super::*;
    use crate::{
        dao::models::{Activity, ActivityKind, TargetArea},
        state::clock::ManualClock,
        testing::sample_document,
    };

    fn activity(points: u32, affected: &[&str]) -> Activity {
        Activity {
            action: "Patrol the harbour".into(),
            purpose: "Deter smuggling".into(),
            target: TargetArea::Own,
            affected_teams: affected.iter().map(|team| team.to_string()).collect::<IndexSet<_>>(),
            kind: ActivityKind::Build,
            points,
        }
    }

    fn payload(points: &[u32]) -> OrderPayload {
        OrderPayload {
            activities: points.iter().map(|p| activity(*p, &["Bravo"])).collect(),
        }
    }

    fn setup() -> (Arc<ManualClock>, OrderLedger, SessionDocument) {
        let manual = Arc::new(ManualClock::at(2_000));
        let ledger = OrderLedger::new(PhaseClock::new(manual.clone()));
        let mut doc = sample_document("orders", 20);
        doc.orders.clear();
        (manual, ledger, doc)
    }

    #[test]
    fn drafts_can_be_overwritten_until_final() {
        let (manual, ledger, mut doc) = setup();
        ledger.save_draft(&mut doc, "Alfa", payload(&[2])).unwrap();
        manual.advance(5);
        let entry = ledger.save_draft(&mut doc, "Alfa", payload(&[3, 1])).unwrap();
        assert_eq!(entry.submitted_at, 2_005);
        assert!(!entry.is_final);

        ledger.submit_final(&mut doc, "Alfa", payload(&[4])).unwrap();
        let err = ledger.save_draft(&mut doc, "Alfa", payload(&[1])).unwrap_err();
        assert_eq!(
            err,
            LedgerError::AlreadyFinal {
                team: "Alfa".into(),
                round: 1
            }
        );
        let err = ledger.submit_final(&mut doc, "Alfa", payload(&[1])).unwrap_err();
        assert!(matches!(err, LedgerError::AlreadyFinal { .. }));
        assert_eq!(ledger.get(&doc, 1, "Alfa").unwrap().payload, payload(&[4]));
    }

    #[test]
    fn diplomacy_still_accepts_orders_but_result_does_not() {
        let (_manual, ledger, mut doc) = setup();
        doc.phase = Phase::Diplomacy;
        let entry = ledger.save_draft(&mut doc, "Alfa", payload(&[1])).unwrap();
        assert_eq!(entry.phase, Phase::Diplomacy);

        doc.phase = Phase::Result;
        let err = ledger.save_draft(&mut doc, "Bravo", payload(&[1])).unwrap_err();
        assert_eq!(
            err,
            LedgerError::PhaseNotEligible {
                phase: Phase::Result
            }
        );
        assert!(ledger.get(&doc, 1, "Bravo").is_none());
    }

    #[test]
    fn auto_finalize_promotes_drafts_only() {
        let (manual, ledger, mut doc) = setup();
        ledger.save_draft(&mut doc, "Alfa", payload(&[2])).unwrap();
        ledger.submit_final(&mut doc, "STT", payload(&[1])).unwrap();
        manual.advance(60);

        let promoted = ledger.auto_finalize_unsubmitted(&mut doc, 1);
        assert_eq!(promoted, vec!["Alfa".to_string()]);

        let alfa = ledger.get(&doc, 1, "Alfa").unwrap();
        assert!(alfa.is_final);
        assert!(alfa.auto_submitted);
        assert_eq!(alfa.submitted_at, 2_060);

        let stt = ledger.get(&doc, 1, "STT").unwrap();
        assert!(!stt.auto_submitted);
        assert_eq!(stt.submitted_at, 2_000);

        assert!(ledger.get(&doc, 1, "Bravo").is_none());
    }

    #[test]
    fn payload_is_checked_against_the_roster() {
        let (_manual, ledger, mut doc) = setup();
        let mut order = payload(&[1]);
        order.activities.push(activity(1, &["USA"]));
        let err = ledger.save_draft(&mut doc, "Alfa", order).unwrap_err();
        assert_eq!(err, LedgerError::UnknownTeam("USA".into()));

        let err = ledger.save_draft(&mut doc, "USA", payload(&[1])).unwrap_err();
        assert_eq!(err, LedgerError::UnknownTeam("USA".into()));

        let err = ledger
            .save_draft(&mut doc, "Alfa", payload(&[1; MAX_ACTIVITIES + 1]))
            .unwrap_err();
        assert_eq!(err, LedgerError::TooManyActivities { count: 7 });
    }

    #[test]
    fn ended_sessions_refuse_orders() {
        let (_manual, ledger, mut doc) = setup();
        doc.ended = true;
        let err = ledger.save_draft(&mut doc, "Alfa", payload(&[1])).unwrap_err();
        assert_eq!(err, LedgerError::SessionEnded);
    }

    #[test]
    fn budget_is_advisory() {
        let (_manual, ledger, mut doc) = setup();
        let order = ledger.save_draft(&mut doc, "Alfa", payload(&[6, 6])).unwrap();
        assert_eq!(order.payload.spent_points(), 12);

        let budget = ledger.budget(&doc, 1, "Alfa").unwrap();
        assert_eq!(
            budget,
            Budget {
                allotment: 10,
                spent: 12,
                over_budget: true
            }
        );
        assert_eq!(ledger.budget(&doc, 1, "Bravo").unwrap().spent, 0);
        assert!(ledger.budget(&doc, 1, "USA").is_none());
    }
}
