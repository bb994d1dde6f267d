use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report `ok` while the data directory accepts writes, `degraded` otherwise.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.store().health_check().await {
        Ok(()) => HealthResponse::ok(),
        Err(err) => {
            warn!(error = %err, "storage health check failed");
            HealthResponse::degraded(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_state;

    #[tokio::test]
    async fn writable_store_is_healthy() {
        let (_dir, _clock, state) = test_state().await;
        let health = health_status(&state).await;
        assert_eq!(health.status, "ok");
        assert!(health.storage_writable);
        assert!(health.detail.is_none());
    }

    #[test]
    fn degraded_carries_the_reason() {
        let health = HealthResponse::degraded("read-only file system");
        assert_eq!(health.status, "degraded");
        assert!(!health.storage_writable);
        assert_eq!(
            serde_json::to_value(&health).unwrap()["detail"],
            "read-only file system"
        );
    }
}
