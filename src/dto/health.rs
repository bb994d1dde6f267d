use serde::Serialize;
use utoipa::ToSchema;

/// Body of the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// `ok` or `degraded`.
    pub status: String,
    /// Whether the session data directory accepted a probe write.
    pub storage_writable: bool,
    /// Why the probe failed, if it did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl HealthResponse {
    /// Storage is writable.
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            storage_writable: true,
            detail: None,
        }
    }

    /// Storage rejected the probe; reads may still succeed.
    pub fn degraded(detail: impl Into<String>) -> Self {
        Self {
            status: "degraded".to_string(),
            storage_writable: false,
            detail: Some(detail.into()),
        }
    }
}
