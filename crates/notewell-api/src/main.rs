//! notewell-api - HTTP function endpoints for notewell
//!
//! Hosts the two serverless-style functions the client calls for AI work:
//! `POST /functions/ai-assist` and `POST /functions/generate-flashcards`.
//! Both proxy to the AI text service through `notewell-inference` and reply
//! with the function envelope the client expects: `{result}` /
//! `{flashcards}` on success, `{error}` with status 500 on any failure.
//! Failures here are always recoverable for the caller; nothing ends the
//! editing session.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info};

use notewell_core::Difficulty;
use notewell_inference::{
    assist, generate_flashcards, AssistAction, GeneratedFlashcard, TextServiceClient,
};

#[derive(Clone)]
struct AppState {
    ai: Arc<TextServiceClient>,
}

// =============================================================================
// REQUEST / RESPONSE ENVELOPES
// =============================================================================

#[derive(Debug, Deserialize)]
struct AssistRequest {
    action: AssistAction,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    prompt: Option<String>,
}

#[derive(Debug, Serialize)]
struct AssistResponse {
    result: String,
}

#[derive(Debug, Deserialize)]
struct FlashcardsRequest {
    content: String,
    #[serde(default)]
    difficulty: Difficulty,
}

#[derive(Debug, Serialize)]
struct FlashcardsResponse {
    flashcards: Vec<GeneratedFlashcard>,
}

// Every failure maps to the original functions' envelope: status 500 with
// `{error}`. The client treats the body message as user-surfaceable.
fn error_response(err: notewell_core::Error) -> Response {
    error!(error = %err, "function call failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": err.to_string() })),
    )
        .into_response()
}

// =============================================================================
// HANDLERS
// =============================================================================

async fn ai_assist(
    State(state): State<AppState>,
    Json(req): Json<AssistRequest>,
) -> Response {
    match assist(
        &state.ai,
        req.action,
        req.content.as_deref(),
        req.prompt.as_deref(),
    )
    .await
    {
        Ok(result) => Json(AssistResponse { result }).into_response(),
        Err(err) => error_response(err),
    }
}

async fn flashcards(
    State(state): State<AppState>,
    Json(req): Json<FlashcardsRequest>,
) -> Response {
    match generate_flashcards(&state.ai, &req.content, req.difficulty).await {
        Ok(cards) => Json(FlashcardsResponse { flashcards: cards }).into_response(),
        Err(err) => error_response(err),
    }
}

// =============================================================================
// ROUTER AND STARTUP
// =============================================================================

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/functions/ai-assist", post(ai_assist))
        .route("/functions/generate-flashcards", post(flashcards))
        .layer(TraceLayer::new_for_http())
        .layer(
            // The functions are called cross-origin from any client deployment;
            // the browser preflights with authorization/apikey headers.
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::POST, Method::OPTIONS])
                .allow_headers([
                    header::AUTHORIZATION,
                    header::CONTENT_TYPE,
                    HeaderName::from_static("x-client-info"),
                    HeaderName::from_static("apikey"),
                ]),
        )
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "notewell_api=debug,tower_http=debug".into());
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let ai = TextServiceClient::from_env()?;
    let app = build_router(AppState { ai: Arc::new(ai) });

    let host = std::env::var("NOTEWELL_API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = std::env::var("NOTEWELL_API_PORT").unwrap_or_else(|_| "8787".to_string());
    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use notewell_inference::TextServiceConfig;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    // Serve the router on an ephemeral port against a mocked AI gateway.
    async fn serve(gateway: &MockServer) -> String {
        let state = AppState {
            ai: Arc::new(TextServiceClient::new(TextServiceConfig {
                base_url: gateway.uri(),
                api_key: "test-key".into(),
                model: "test/model".into(),
                timeout_secs: 5,
            })),
        };
        let router = build_router(state);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn completion(content: &str) -> serde_json::Value {
        json!({ "choices": [{ "message": { "role": "assistant", "content": content } }] })
    }

    #[tokio::test]
    async fn test_ai_assist_returns_result_envelope() {
        let gateway = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(completion("<p>Polished.</p>")),
            )
            .mount(&gateway)
            .await;
        let base = serve(&gateway).await;

        let resp = reqwest::Client::new()
            .post(format!("{base}/functions/ai-assist"))
            .json(&json!({ "action": "improve", "content": "rough draft" }))
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), 200);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["result"], "<p>Polished.</p>");
    }

    #[tokio::test]
    async fn test_ai_assist_empty_content_yields_error_envelope() {
        let gateway = MockServer::start().await;
        let base = serve(&gateway).await;

        let resp = reqwest::Client::new()
            .post(format!("{base}/functions/ai-assist"))
            .json(&json!({ "action": "summarize", "content": "" }))
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), 500);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().contains("content is required"));
        // Nothing was sent upstream.
        assert!(gateway.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_gateway_failure_yields_error_envelope() {
        let gateway = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&gateway)
            .await;
        let base = serve(&gateway).await;

        let resp = reqwest::Client::new()
            .post(format!("{base}/functions/ai-assist"))
            .json(&json!({ "action": "expand", "content": "text" }))
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), 500);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_generate_flashcards_returns_batch() {
        let gateway = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(
                r#"[{"question":"Q1?","answer":"A1"},{"question":"Q2?","answer":"A2"}]"#,
            )))
            .mount(&gateway)
            .await;
        let base = serve(&gateway).await;

        let resp = reqwest::Client::new()
            .post(format!("{base}/functions/generate-flashcards"))
            .json(&json!({ "content": "study notes", "difficulty": "hard" }))
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), 200);
        let body: serde_json::Value = resp.json().await.unwrap();
        let cards = body["flashcards"].as_array().unwrap();
        assert_eq!(cards.len(), 2);
        assert_eq!(cards[0]["question"], "Q1?");
    }

    #[tokio::test]
    async fn test_preflight_allows_any_origin() {
        let gateway = MockServer::start().await;
        let base = serve(&gateway).await;

        let resp = reqwest::Client::new()
            .request(
                reqwest::Method::OPTIONS,
                format!("{base}/functions/ai-assist"),
            )
            .header("Origin", "https://notes.example.app")
            .header("Access-Control-Request-Method", "POST")
            .header("Access-Control-Request-Headers", "content-type")
            .send()
            .await
            .unwrap();

        assert_eq!(
            resp.headers()
                .get("access-control-allow-origin")
                .and_then(|v| v.to_str().ok()),
            Some("*")
        );
    }
}
