//! HTTP route handlers.

pub mod checkout;
pub mod events;
pub mod health;

pub use checkout::{checkout_handler, checkout_routes};
pub use events::{EventAccepted, events_routes, stripe_events_handler};
pub use health::{HealthResponse, health_routes};
