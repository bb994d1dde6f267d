use thiserror::Error;
use tracing::info;

use crate::{
    dao::models::{Phase, PhaseRecord, PhaseStatus, SessionDocument, TimerState, TimerStatus},
    state::{clock::PhaseClock, orders::finalize_pending},
};

/// Error returned when a phase transition cannot be applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    /// The session was ended; only a reset brings it back.
    #[error("the session has ended")]
    SessionEnded,
    /// The transition would start a round past the last one.
    #[error("round {round} is the last round (max round {max_round})")]
    RoundLimitReached {
        /// Round the session is currently in.
        round: u32,
        /// Configured number of full rounds.
        max_round: u32,
    },
}

/// Outcome of a successful transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// Round and phase before the transition.
    pub from: (u32, Phase),
    /// Round and phase after the transition.
    pub to: (u32, Phase),
    /// Teams whose drafts were finalized on the way out.
    pub finalized: Vec<String>,
}

/// Phase and round following `(phase, round)`.
///
/// Before `max_round` the cycle is Order, Diplomacy, Result. From `max_round`
/// on Diplomacy is skipped. The round only increments on Result to Order.
pub fn next_phase(phase: Phase, round: u32, max_round: u32) -> (Phase, u32) {
    match phase {
        Phase::Order if round < max_round => (Phase::Diplomacy, round),
        Phase::Order | Phase::Diplomacy => (Phase::Result, round),
        Phase::Result => (Phase::Order, round + 1),
    }
}

/// Round/phase transitions and their history bookkeeping.
#[derive(Debug, Clone)]
pub struct PhaseStateMachine {
    max_round: u32,
    clock: PhaseClock,
}

impl PhaseStateMachine {
    pub fn new(max_round: u32, clock: PhaseClock) -> Self {
        Self { max_round, clock }
    }

    pub fn max_round(&self) -> u32 {
        self.max_round
    }

    /// Move to the next phase, finalizing pending orders when leaving an order phase.
    pub fn advance(&self, doc: &mut SessionDocument) -> Result<Transition, TransitionError> {
        ensure_active(doc)?;
        let (phase, round) = next_phase(doc.phase, doc.round, self.max_round);
        self.ensure_round_allowed(doc, round)?;
        Ok(self.transition(doc, round, phase))
    }

    /// Operator shortcut to round + 1, Order, from any phase.
    pub fn start_new_round(&self, doc: &mut SessionDocument) -> Result<Transition, TransitionError> {
        ensure_active(doc)?;
        let round = doc.round + 1;
        self.ensure_round_allowed(doc, round)?;
        Ok(self.transition(doc, round, Phase::Order))
    }

    /// Mark the session as ended. Ending twice is harmless.
    pub fn end_session(&self, doc: &mut SessionDocument) {
        if doc.timer.status == TimerStatus::Running {
            self.clock.pause(doc);
        }
        doc.ended = true;
        info!(session_id = %doc.id, round = doc.round, phase = %doc.phase, "session ended");
    }

    /// Reinitialize progress while keeping identity, roster and tokens.
    pub fn reset(&self, doc: &mut SessionDocument) {
        doc.round = 1;
        doc.phase = Phase::Order;
        doc.timer = TimerState::with_durations(doc.timer.order_minutes, doc.timer.diplomacy_minutes);
        doc.history = vec![PhaseRecord::ongoing(1, Phase::Order)];
        doc.ended = false;

        for score in doc.scores.values_mut() {
            score.current = score.base;
            score.government_support = false;
        }
        for task in doc.backlog.values_mut().flatten() {
            task.reset_progress();
        }
        doc.orders.clear();
        doc.checkboxes.clear();

        info!(session_id = %doc.id, "session reset");
    }

    fn ensure_round_allowed(&self, doc: &SessionDocument, round: u32) -> Result<(), TransitionError> {
        if round > self.max_round + 1 {
            return Err(TransitionError::RoundLimitReached {
                round: doc.round,
                max_round: self.max_round,
            });
        }
        Ok(())
    }

    fn transition(&self, doc: &mut SessionDocument, round: u32, phase: Phase) -> Transition {
        let from = (doc.round, doc.phase);
        let finalized = if doc.phase.accepts_orders() {
            finalize_pending(doc, doc.round, self.clock.now())
        } else {
            Vec::new()
        };

        close_ongoing(doc);
        if round != doc.round {
            doc.checkboxes.clear();
            for score in doc.scores.values_mut() {
                score.government_support = false;
            }
        }
        doc.round = round;
        doc.phase = phase;
        self.clock.reset(doc);
        doc.history.push(PhaseRecord::ongoing(round, phase));

        info!(
            session_id = %doc.id,
            from_round = from.0,
            from_phase = %from.1,
            round,
            phase = %phase,
            "phase transition"
        );

        Transition {
            from,
            to: (round, phase),
            finalized,
        }
    }
}

fn ensure_active(doc: &SessionDocument) -> Result<(), TransitionError> {
    if doc.ended {
        Err(TransitionError::SessionEnded)
    } else {
        Ok(())
    }
}

/// Close the most recent ongoing history entry.
fn close_ongoing(doc: &mut SessionDocument) {
    if let Some(record) = doc.history.iter_mut().rev().find(|record| record.is_ongoing()) {
        record.status = PhaseStatus::Done;
    }
}
