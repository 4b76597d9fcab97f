//! HTTP request handlers

use super::twiml;
use super::types::{ErrorResponse, HealthResponse};
use super::ws::relay_socket;
use super::AppState;
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Call answer: the provider fetches this when a call connects
        .route("/twiml", any(answer_call))
        // Relay WebSocket opened by the provider
        .route("/ws", get(relay_socket))
        .route("/health", get(health))
        .route("/version", get(get_version))
        .with_state(state)
}

async fn answer_call(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let domain = match &state.voice.public_domain {
        Some(domain) => domain.clone(),
        None => headers
            .get(header::HOST)
            .and_then(|h| h.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                AppError::Internal(
                    "No public domain configured and request has no Host header".to_string(),
                )
            })?,
    };

    tracing::info!(domain = %domain, "Answering call");
    let body = twiml::render(&state.voice, &domain);
    Ok(([(header::CONTENT_TYPE, "text/xml")], body).into_response())
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        active_calls: state.store.len().await,
        model: state.llm.model_id().to_string(),
    })
}

async fn get_version() -> &'static str {
    concat!("voice-relay ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

enum AppError {
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        tracing::warn!(status = %status, error = %message, "Request failed");
        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VoiceConfig;
    use crate::conversation::{ConversationStore, DuplicateSetupPolicy};
    use crate::relay::testing::ScriptedLlm;
    use crate::relay::SessionContext;
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    fn state(public_domain: Option<&str>) -> AppState {
        AppState {
            store: Arc::new(ConversationStore::new(
                "be brief",
                DuplicateSetupPolicy::Overwrite,
            )),
            llm: Arc::new(ScriptedLlm::new()),
            voice: Arc::new(VoiceConfig {
                public_domain: public_domain.map(str::to_string),
                tts_provider: "ElevenLabs".to_string(),
                voice: "v1".to_string(),
                welcome_greeting: "Hello & welcome".to_string(),
            }),
            session: SessionContext::default(),
            fragment_timeout: Duration::from_secs(5),
        }
    }

    async fn call(app: Router, request: Request<Body>) -> (StatusCode, Option<String>, String) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, content_type, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_twiml_uses_host_header() {
        let request = Request::builder()
            .uri("/twiml")
            .header(header::HOST, "abc.ngrok.app")
            .body(Body::empty())
            .unwrap();
        let (status, content_type, body) = call(create_router(state(None)), request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type.as_deref(), Some("text/xml"));
        assert!(body.contains(r#"url="wss://abc.ngrok.app/ws""#));
        assert!(body.contains(r#"welcomeGreeting="Hello &amp; welcome""#));
    }

    #[tokio::test]
    async fn test_twiml_post_prefers_configured_domain() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/twiml")
            .header(header::HOST, "internal:8080")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("CallSid=CA1&From=%2B15550001"))
            .unwrap();
        let (status, _, body) =
            call(create_router(state(Some("relay.example.com"))), request).await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(r#"url="wss://relay.example.com/ws""#));
    }

    #[tokio::test]
    async fn test_twiml_accepts_any_method() {
        let request = Request::builder()
            .method(Method::PUT)
            .uri("/twiml")
            .header(header::HOST, "abc.ngrok.app")
            .body(Body::empty())
            .unwrap();
        let (status, content_type, body) = call(create_router(state(None)), request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type.as_deref(), Some("text/xml"));
        assert!(body.contains(r#"url="wss://abc.ngrok.app/ws""#));
    }

    #[tokio::test]
    async fn test_twiml_without_domain_fails() {
        let request = Request::builder().uri("/twiml").body(Body::empty()).unwrap();
        let (status, _, body) = call(create_router(state(None)), request).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.contains("Host header"));
    }

    #[tokio::test]
    async fn test_health_reports_active_calls() {
        let state = state(None);
        state.store.create("CA1").await.unwrap();
        state.store.create("CA2").await.unwrap();

        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, _, body) = call(create_router(state), request).await;

        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "status": "ok", "active_calls": 2, "model": "scripted" })
        );
    }

    #[tokio::test]
    async fn test_version() {
        let request = Request::builder().uri("/version").body(Body::empty()).unwrap();
        let (status, _, body) = call(create_router(state(None)), request).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.starts_with("voice-relay "));
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let request = Request::builder().uri("/nope").body(Body::empty()).unwrap();
        let (status, _, _) = call(create_router(state(None)), request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
