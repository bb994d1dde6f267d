/// Session document model persisted by the stores.
pub mod models;
/// Bounded retry with backoff for storage operations.
pub mod retry;
/// Session persistence abstraction and its file implementation.
pub mod session_store;
/// Storage error types shared by every backend.
pub mod storage;
