use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::{
    dao::{models::Phase, storage::StorageError},
    state::{orders::LedgerError, session::EditError, state_machine::TransitionError},
};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend failed, possibly after exhausting its retries.
    #[error("storage unavailable")]
    Storage(#[source] StorageError),
    /// Missing or wrong credential.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Orders are not accepted in the current phase.
    #[error("orders are not accepted during the {phase} phase")]
    PhaseNotEligible { phase: Phase },
    /// The team's order for the round is already final.
    #[error("order already submitted: {0}")]
    OrderFinalized(String),
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Operation cannot be performed in the current state.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidId(id) => ServiceError::NotFound(format!("session `{id}`")),
            other => ServiceError::Storage(other),
        }
    }
}

impl From<TransitionError> for ServiceError {
    fn from(err: TransitionError) -> Self {
        ServiceError::InvalidState(err.to_string())
    }
}

impl From<LedgerError> for ServiceError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::PhaseNotEligible { phase } => ServiceError::PhaseNotEligible { phase },
            LedgerError::AlreadyFinal { .. } => ServiceError::OrderFinalized(err.to_string()),
            LedgerError::UnknownTeam(_) | LedgerError::TooManyActivities { .. } => {
                ServiceError::InvalidInput(err.to_string())
            }
            LedgerError::SessionEnded => ServiceError::InvalidState(err.to_string()),
        }
    }
}

impl From<EditError> for ServiceError {
    fn from(err: EditError) -> Self {
        match err {
            EditError::SessionEnded => ServiceError::InvalidState(err.to_string()),
            other => ServiceError::InvalidInput(other.to_string()),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Credential missing or not valid for this resource.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Storage(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::Unauthorized(message) => AppError::Forbidden(message),
            ServiceError::PhaseNotEligible { phase } => AppError::Conflict(format!(
                "orders are not accepted during the {phase} phase"
            )),
            ServiceError::OrderFinalized(message) => AppError::Conflict(message),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::InvalidState(message) => AppError::Conflict(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}
