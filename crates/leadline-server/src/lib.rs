//! HTTP surface for Leadline.
//!
//! Two endpoints matter to the outside world:
//!
//! - `GET /stripe-checkout` opens a hosted checkout session and redirects to it
//! - `POST /stripe-events` receives the payment webhook, pulls out the
//!   customer's email and starts an enrichment run in the background
//!
//! plus `GET /health` for liveness checks.
//!
//! # Example
//!
//! ```ignore
//! use leadline_server::{AppState, Server, ServerConfig};
//!
//! let state = AppState::new(pipeline, ServerConfig::new()).with_checkout(stripe);
//! Server::from_state(state).run().await?;
//! ```

pub mod checkout;
pub mod config;
pub mod error;
pub mod logging;
pub mod routes;
pub mod state;

pub use checkout::{
    CheckoutError, CheckoutProvider, StripeCheckout, StripeCheckoutConfig,
};
pub use config::ServerConfig;
pub use error::{ErrorResponse, Result, ServerError};
pub use logging::request_logging_middleware;
pub use routes::{EventAccepted, HealthResponse};
pub use state::{AppState, SharedCheckout};

use std::net::SocketAddr;

use axum::{Router, extract::DefaultBodyLimit, middleware};
use leadline_pipeline::Pipeline;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

/// The Leadline HTTP server.
pub struct Server {
    state: AppState,
}

impl Server {
    /// Create a new server for the given pipeline and configuration.
    pub fn new(pipeline: Pipeline, config: ServerConfig) -> Self {
        Self {
            state: AppState::new(pipeline, config),
        }
    }

    /// Create a server from a pre-built application state.
    pub fn from_state(state: AppState) -> Self {
        Self { state }
    }

    /// Build the router with all routes and middleware.
    pub fn router(&self) -> Router {
        Router::new()
            .merge(routes::health_routes())
            .merge(routes::checkout_routes())
            .merge(routes::events_routes())
            .layer(DefaultBodyLimit::max(self.state.config.max_body_size))
            .layer(middleware::from_fn_with_state(
                self.state.clone(),
                logging::request_logging_middleware,
            ))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Run the server on the configured bind address.
    pub async fn run(self) -> Result<()> {
        let addr = self.state.config.bind_address;
        self.run_on(addr).await
    }

    /// Run the server on a specific address (useful for testing).
    pub async fn run_on(self, addr: SocketAddr) -> Result<()> {
        let router = self.router();

        info!(pipeline = %self.state.pipeline.name(), "Starting server on {}", addr);

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Internal(format!("Failed to bind: {}", e)))?;

        axum::serve(listener, router)
            .await
            .map_err(|e| ServerError::Internal(format!("Server error: {}", e)))?;

        Ok(())
    }

    /// Get the configured bind address.
    pub fn bind_address(&self) -> SocketAddr {
        self.state.config.bind_address
    }
}

#[cfg(test)]
pub(crate) mod test_util {
    use std::sync::Arc;

    use leadline_agent::{ReasoningConfig, ToolRegistry};
    use leadline_llm::MockBackend;
    use leadline_pipeline::{Pipeline, PipelineDefinition, ReasoningDefinition, StepDefinition};

    use crate::{AppState, ServerConfig};

    /// A one-step pipeline over a mock model.
    pub fn test_state() -> AppState {
        let definition = PipelineDefinition::new("test").step(StepDefinition::reasoning(
            ReasoningDefinition::new("Describe {{ args[0] }}"),
        ));
        let pipeline = Pipeline::new(
            definition,
            &ToolRegistry::new(),
            Arc::new(MockBackend::with_text("A company.")),
            ReasoningConfig::default(),
        )
        .unwrap();
        AppState::new(pipeline, ServerConfig::new().with_request_logging(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_server_health_endpoint() {
        let server = Server::from_state(test_util::test_state());

        let response = server
            .router()
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_body_limit_applies_to_events() {
        let mut state = test_util::test_state();
        state.config = std::sync::Arc::new(ServerConfig::new().with_max_body_size(16));
        let server = Server::from_state(state);

        let response = server
            .router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/stripe-events")
                    .body(Body::from(vec![b' '; 64]))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn test_server_config_builder() {
        let config = ServerConfig::new()
            .with_bind_address("0.0.0.0:9000".parse().unwrap())
            .with_request_logging(false);

        assert_eq!(config.bind_address.port(), 9000);
        assert!(!config.request_logging);

        let state = AppState {
            config: std::sync::Arc::new(config),
            ..test_util::test_state()
        };
        assert_eq!(Server::from_state(state).bind_address().port(), 9000);
    }
}
