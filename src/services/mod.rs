/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Team order entry and round order listings.
pub mod order_service;
/// Phase transitions and timer control.
pub mod phase_service;
/// Session lifecycle and direct edits.
pub mod session_service;
