//! Phase transitions and timer control driven by game control.

use tracing::info;

use crate::{
    dao::models::SessionDocument,
    dto::{
        admin::{ActionResponse, TransitionResponse},
        timer::{TimerAction, TimerResponse, format_mm_ss},
    },
    error::ServiceError,
    state::{AppState, SharedState, state_machine::Transition},
};

/// Derived timer view of `doc` at the current instant.
pub fn timer_view(state: &AppState, doc: &SessionDocument) -> TimerResponse {
    let clock = state.clock();
    let remaining_seconds = clock.remaining(doc);
    TimerResponse {
        remaining_seconds,
        formatted: format_mm_ss(remaining_seconds),
        duration_seconds: clock.duration_seconds(doc),
        status: doc.timer.status,
        phase: doc.phase,
        round: doc.round,
    }
}

fn transition_response(state: &AppState, doc: &SessionDocument, transition: Transition) -> TransitionResponse {
    TransitionResponse {
        from_round: transition.from.0,
        from_phase: transition.from.1,
        round: transition.to.0,
        phase: transition.to.1,
        finalized: transition.finalized,
        timer: timer_view(state, doc),
    }
}

/// Move the session to its next phase.
pub async fn advance(state: &SharedState, id: &str) -> Result<TransitionResponse, ServiceError> {
    let (doc, transition) = state
        .update_session(id, |doc| Ok(state.machine().advance(doc)?))
        .await?;
    Ok(transition_response(state, &doc, transition))
}

/// Jump to the order phase of the next round.
pub async fn new_round(state: &SharedState, id: &str) -> Result<TransitionResponse, ServiceError> {
    let (doc, transition) = state
        .update_session(id, |doc| Ok(state.machine().start_new_round(doc)?))
        .await?;
    Ok(transition_response(state, &doc, transition))
}

pub async fn end_session(state: &SharedState, id: &str) -> Result<ActionResponse, ServiceError> {
    state
        .update_session(id, |doc| {
            state.machine().end_session(doc);
            Ok(())
        })
        .await?;
    Ok(ActionResponse {
        message: format!("session {id} ended"),
    })
}

/// Start, pause or reset the phase timer.
pub async fn timer_action(
    state: &SharedState,
    id: &str,
    action: TimerAction,
) -> Result<TimerResponse, ServiceError> {
    let (doc, ()) = state
        .update_session(id, |doc| {
            let clock = state.clock();
            match action {
                TimerAction::Start if doc.ended => {
                    return Err(ServiceError::InvalidState("the session has ended".into()));
                }
                TimerAction::Start if !doc.phase.is_timed() => {
                    return Err(ServiceError::InvalidState(format!(
                        "the {} phase has no timer",
                        doc.phase
                    )));
                }
                TimerAction::Start => clock.start(doc),
                TimerAction::Pause => clock.pause(doc),
                TimerAction::Reset => clock.reset(doc),
            }
            Ok(())
        })
        .await?;

    info!(session_id = %id, ?action, remaining = state.clock().remaining(&doc), "timer updated");
    Ok(timer_view(state, &doc))
}

pub async fn timer_status(state: &SharedState, id: &str) -> Result<TimerResponse, ServiceError> {
    let doc = state.load_session(id).await?;
    Ok(timer_view(state, &doc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dao::models::{Phase, TimerStatus},
        testing::{create_test_session, test_state},
    };

    #[tokio::test]
    async fn timer_runs_from_the_wall_clock() {
        let (_dir, clock, state) = test_state().await;
        let id = create_test_session(&state, 20).await.summary.id;

        let started = timer_action(&state, &id, TimerAction::Start).await.unwrap();
        assert_eq!(started.status, TimerStatus::Running);
        assert_eq!(started.formatted, "10:00");

        clock.advance(90);
        let status = timer_status(&state, &id).await.unwrap();
        assert_eq!(status.remaining_seconds, 510);
        assert_eq!(status.formatted, "08:30");

        timer_action(&state, &id, TimerAction::Pause).await.unwrap();
        clock.advance(600);
        assert_eq!(timer_status(&state, &id).await.unwrap().remaining_seconds, 510);
    }

    #[tokio::test]
    async fn advancing_finalizes_and_resets_the_timer() {
        let (_dir, _clock, state) = test_state().await;
        let id = create_test_session(&state, 20).await.summary.id;
        state
            .update_session(&id, |doc| {
                state
                    .ledger()
                    .save_draft(doc, "Alfa", Default::default())
                    .map_err(ServiceError::from)
            })
            .await
            .unwrap();
        timer_action(&state, &id, TimerAction::Start).await.unwrap();

        let transition = advance(&state, &id).await.unwrap();
        assert_eq!((transition.from_round, transition.from_phase), (1, Phase::Order));
        assert_eq!((transition.round, transition.phase), (1, Phase::Diplomacy));
        assert_eq!(transition.finalized, vec!["Alfa".to_string()]);
        assert_eq!(transition.timer.status, TimerStatus::Stopped);

        let transition = new_round(&state, &id).await.unwrap();
        assert_eq!((transition.round, transition.phase), (2, Phase::Order));
    }

    #[tokio::test]
    async fn ended_sessions_are_frozen() {
        let (_dir, _clock, state) = test_state().await;
        let id = create_test_session(&state, 20).await.summary.id;
        end_session(&state, &id).await.unwrap();

        assert!(matches!(
            advance(&state, &id).await,
            Err(ServiceError::InvalidState(_))
        ));
        assert!(matches!(
            timer_action(&state, &id, TimerAction::Start).await,
            Err(ServiceError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn unknown_sessions_are_not_found() {
        let (_dir, _clock, state) = test_state().await;
        assert!(matches!(
            timer_status(&state, "nope").await,
            Err(ServiceError::NotFound(_))
        ));
    }
}
