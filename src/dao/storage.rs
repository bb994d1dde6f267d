use std::error::Error;
use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying medium.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// A transient failure persisted through every retry of the backoff policy.
    #[error("storage operation `{operation}` failed after {attempts} attempts")]
    Exhausted {
        operation: String,
        attempts: u32,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    #[error("failed to serialize session `{id}`")]
    Serialize {
        id: String,
        #[source]
        source: serde_json::Error,
    },
    /// The identifier cannot be mapped onto a storage key.
    #[error("invalid session id `{0}`")]
    InvalidId(String),
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }

    /// Construct an exhausted-retries error for the named operation.
    pub fn exhausted(
        operation: impl Into<String>,
        attempts: u32,
        source: impl Error + Send + Sync + 'static,
    ) -> Self {
        StorageError::Exhausted {
            operation: operation.into(),
            attempts,
            source: Box::new(source),
        }
    }
}

/// Why a document could not be produced by [`load`](crate::dao::session_store::SessionStore::load).
///
/// Both variants mean "no session" for callers; they only differ in how loudly
/// they are logged.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Nothing is stored under the requested identifier.
    #[error("session `{0}` not found")]
    NotFound(String),
    /// The canonical file and its backup are both unreadable.
    #[error("session `{id}` is corrupt: {reason}")]
    Corrupt { id: String, reason: String },
}

const MAX_ID_LENGTH: usize = 64;

/// Session ids are plain file-name fragments: ASCII letters, digits, `-` and `_`.
pub fn is_valid_session_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_ID_LENGTH
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
