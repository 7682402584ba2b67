//! Checkout redirect endpoint.

use axum::{Router, extract::State, response::Redirect, routing::get};

use crate::error::{Result, ServerError};
use crate::state::AppState;

/// `GET /stripe-checkout`: open a checkout session and redirect to it.
pub async fn checkout_handler(State(state): State<AppState>) -> Result<Redirect> {
    let checkout = state
        .checkout
        .as_ref()
        .ok_or_else(|| ServerError::Config("checkout is not configured".to_string()))?;

    match checkout.create_session().await {
        Ok(Some(url)) => {
            tracing::info!(url = %url, "Redirecting to checkout");
            Ok(Redirect::temporary(&url))
        }
        Ok(None) => Err(ServerError::CheckoutFailed),
        Err(e) => {
            tracing::error!(error = %e, "Checkout session creation failed");
            Err(ServerError::CheckoutFailed)
        }
    }
}

pub fn checkout_routes() -> Router<AppState> {
    Router::new().route("/stripe-checkout", get(checkout_handler))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkout::{CheckoutError, CheckoutProvider};
    use crate::test_util::test_state;
    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
    };
    use tower::ServiceExt;

    struct FixedCheckout(Option<&'static str>);

    #[async_trait]
    impl CheckoutProvider for FixedCheckout {
        async fn create_session(&self) -> std::result::Result<Option<String>, CheckoutError> {
            Ok(self.0.map(str::to_string))
        }
    }

    struct FailingCheckout;

    #[async_trait]
    impl CheckoutProvider for FailingCheckout {
        async fn create_session(&self) -> std::result::Result<Option<String>, CheckoutError> {
            Err(CheckoutError::Rejected {
                status: 401,
                message: "Invalid API Key".into(),
            })
        }
    }

    async fn get_checkout(state: AppState) -> axum::response::Response {
        checkout_routes()
            .with_state(state)
            .oneshot(
                Request::builder()
                    .uri("/stripe-checkout")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    async fn message(response: axum::response::Response) -> String {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        json["message"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_redirects_to_session_url() {
        let state = test_state().with_checkout(FixedCheckout(Some("https://checkout.test/s/1")));
        let response = get_checkout(state).await;

        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "https://checkout.test/s/1"
        );
    }

    #[tokio::test]
    async fn test_missing_url_is_500() {
        let response = get_checkout(test_state().with_checkout(FixedCheckout(None))).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(message(response).await, "Failed to create checkout session");
    }

    #[tokio::test]
    async fn test_provider_error_is_500() {
        let response = get_checkout(test_state().with_checkout(FailingCheckout)).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(message(response).await, "Failed to create checkout session");
    }

    #[tokio::test]
    async fn test_unconfigured_checkout_is_500() {
        let response = get_checkout(test_state()).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
