//! Fixtures shared by the unit tests.

use std::sync::Arc;

use tempfile::TempDir;

use crate::{
    config::AppConfig,
    dto::session::{CreateSessionRequest, SessionDetail},
    services::session_service,
    dao::{
        models::{Activity, ActivityKind, OrderEntry, OrderPayload, Phase, SessionDocument, TargetArea},
        retry::RetryPolicy,
        session_store::file::FileSessionStore,
    },
    state::{
        AppState, SharedState,
        clock::ManualClock,
        session::{SessionParams, new_session},
        tokens::TokenAuthority,
    },
};

/// Epoch all fixtures start from: 2023-11-14T22:13:20Z.
pub const FIXTURE_EPOCH: i64 = 1_700_000_000;

/// Freshly created session with one draft order for Alfa in round 1.
pub fn sample_document(id: &str, player_count: u32) -> SessionDocument {
    let tokens = TokenAuthority::new(Arc::new(ManualClock::at(FIXTURE_EPOCH)));
    let params = SessionParams {
        date: "2025-03-14".into(),
        location: "Kungsängen".into(),
        player_count,
        order_minutes: 10,
        diplomacy_minutes: 10,
    };
    let mut doc = new_session(&AppConfig::default(), &tokens, id.to_string(), params, FIXTURE_EPOCH);

    doc.orders.entry(1).or_default().insert(
        "Alfa".into(),
        OrderEntry {
            payload: OrderPayload {
                activities: vec![Activity {
                    action: "Förstärk bevakningen av hamnen".into(),
                    purpose: "Stoppa smuggling".into(),
                    target: TargetArea::Own,
                    affected_teams: ["Bravo".to_string()].into_iter().collect(),
                    kind: ActivityKind::Build,
                    points: 3,
                }],
            },
            submitted_at: FIXTURE_EPOCH + 60,
            phase: Phase::Order,
            is_final: false,
            auto_submitted: false,
        },
    );
    doc
}

/// Application state over a temporary data directory and a manual clock.
pub async fn test_state() -> (TempDir, Arc<ManualClock>, SharedState) {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = FileSessionStore::open(
        dir.path(),
        RetryPolicy::linear(3, std::time::Duration::from_millis(1)),
    )
    .await
    .expect("open store");
    let clock = Arc::new(ManualClock::at(FIXTURE_EPOCH));
    let config = AppConfig {
        data_dir: dir.path().to_path_buf(),
        ..AppConfig::default()
    };
    let state = AppState::with_clock(config, Arc::new(store), clock.clone());
    (dir, clock, state)
}

/// Create a session through the service layer with default durations.
pub async fn create_test_session(state: &SharedState, player_count: u32) -> SessionDetail {
    let request = CreateSessionRequest {
        date: "2025-03-14".into(),
        location: "Kungsängen".into(),
        player_count,
        order_minutes: None,
        diplomacy_minutes: None,
    };
    session_service::create_session(state, request)
        .await
        .expect("create session")
}
