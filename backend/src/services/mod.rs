//! Business logic services
//!
//! Services encapsulate business logic and coordinate between
//! repositories and external systems.

pub mod auth;
pub mod notifier;

pub use auth::AuthService;
pub use notifier::{LoginEvent, LoginNotifier, LoginOutcome, NoopNotifier, TracingNotifier};
