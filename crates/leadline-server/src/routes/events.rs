//! Payment webhook endpoint.
//!
//! Each accepted event starts one pipeline run in its own task and the
//! handler answers immediately. Run failures are logged, never returned.

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    routing::post,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, ServerError};
use crate::state::AppState;

/// Body returned when an event has been accepted.
#[derive(Debug, Serialize, Deserialize)]
pub struct EventAccepted {
    pub status: String,
    pub email: String,
}

/// Pull the customer email out of a payment event.
pub fn extract_email(event: &Value) -> Result<&str> {
    event
        .pointer("/data/object/email")
        .and_then(Value::as_str)
        .filter(|email| !email.trim().is_empty())
        .ok_or_else(|| ServerError::BadRequest("event has no data.object.email".to_string()))
}

/// `POST /stripe-events`: start an enrichment run for the paying customer.
pub async fn stripe_events_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<EventAccepted>)> {
    let event: Value = serde_json::from_slice(&body)
        .map_err(|e| ServerError::BadRequest(format!("invalid JSON: {}", e)))?;
    let email = extract_email(&event)?.trim().to_string();

    tracing::info!(
        event_type = event.get("type").and_then(serde_json::Value::as_str).unwrap_or("unknown"),
        email = %email,
        "Payment event received"
    );

    let pipeline = state.pipeline.clone();
    let argument = email.clone();
    tokio::spawn(async move {
        match pipeline.run(argument).await {
            Ok(result) => {
                tracing::info!(run_id = %result.run_id, "Enrichment run finished");
            }
            Err(e) => {
                tracing::error!(
                    step = %e.step_id,
                    position = e.position,
                    error = %e,
                    "Enrichment run failed"
                );
            }
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(EventAccepted {
            status: "accepted".to_string(),
            email,
        }),
    ))
}

pub fn events_routes() -> Router<AppState> {
    Router::new().route("/stripe-events", post(stripe_events_handler))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::test_state;
    use axum::{body::Body, http::Request};
    use serde_json::json;
    use tower::ServiceExt;

    async fn post_event(body: impl Into<Body>) -> axum::response::Response {
        events_routes()
            .with_state(test_state())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/stripe-events")
                    .header("content-type", "application/json")
                    .body(body.into())
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    #[test]
    fn test_extract_email() {
        let event = json!({"type": "checkout.session.completed", "data": {"object": {"email": "a@b.com"}}});
        assert_eq!(extract_email(&event).unwrap(), "a@b.com");

        assert!(extract_email(&json!({"data": {"object": {}}})).is_err());
        assert!(extract_email(&json!({"data": {"object": {"email": 42}}})).is_err());
        assert!(extract_email(&json!({"data": {"object": {"email": " "}}})).is_err());
        assert!(extract_email(&json!({})).is_err());
    }

    #[tokio::test]
    async fn test_event_accepted() {
        let body = json!({"data": {"object": {"email": "a@b.com"}}}).to_string();
        let response = post_event(body).await;

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let accepted: EventAccepted = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(accepted.email, "a@b.com");
    }

    #[tokio::test]
    async fn test_event_without_email_is_400() {
        let body = json!({"data": {"object": {"customer": "cus_1"}}}).to_string();
        assert_eq!(post_event(body).await.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_invalid_json_is_400() {
        assert_eq!(post_event("not json").await.status(), StatusCode::BAD_REQUEST);
    }
}
