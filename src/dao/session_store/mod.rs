pub mod file;

use futures::future::BoxFuture;

use crate::dao::{
    models::SessionDocument,
    storage::{LoadError, StorageResult},
};

/// Abstraction over the persistence layer for session documents.
///
/// A single `save` is atomic: readers observe either the previous document or
/// the new one. Nothing here isolates two concurrent load-modify-save cycles.
pub trait SessionStore: Send + Sync {
    /// Load and migrate the document stored under `id`.
    fn load(&self, id: &str) -> BoxFuture<'static, Result<SessionDocument, LoadError>>;
    /// Atomically replace the document stored under `id`.
    fn save(&self, id: &str, document: &SessionDocument) -> BoxFuture<'static, StorageResult<()>>;
    /// Remove the document; returns whether something was deleted.
    fn delete(&self, id: &str) -> BoxFuture<'static, StorageResult<bool>>;
    /// Every readable document, ordered by id.
    fn list(&self) -> BoxFuture<'static, StorageResult<Vec<SessionDocument>>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
}
