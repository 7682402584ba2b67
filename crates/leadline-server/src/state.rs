//! Application state shared across handlers.

use std::sync::Arc;

use leadline_pipeline::{Pipeline, SharedPipeline};

use crate::checkout::CheckoutProvider;
use crate::config::ServerConfig;

/// Shared checkout provider.
pub type SharedCheckout = Arc<dyn CheckoutProvider>;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// The pipeline every payment event runs.
    pub pipeline: SharedPipeline,

    /// Checkout provider (None if `[checkout]` is not configured).
    pub checkout: Option<SharedCheckout>,

    /// Server configuration.
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Create a new application state.
    pub fn new(pipeline: Pipeline, config: ServerConfig) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            checkout: None,
            config: Arc::new(config),
        }
    }

    /// Attach a checkout provider.
    pub fn with_checkout(mut self, checkout: impl CheckoutProvider + 'static) -> Self {
        self.checkout = Some(Arc::new(checkout));
        self
    }

    /// Attach an already shared checkout provider.
    pub fn with_shared_checkout(mut self, checkout: SharedCheckout) -> Self {
        self.checkout = Some(checkout);
        self
    }
}
