pub mod admin;
pub mod health;
pub mod order;
pub mod session;
pub mod timer;
pub mod validation;
