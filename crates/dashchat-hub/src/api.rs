//! REST API server: the backend the dashboard frontend talks to.
//!
//! Endpoints:
//! - POST /gemini-response: Run a prompt through the model and tools
//! - GET  /chartdata: Static chart sample
//! - GET  /denguecluster: Dengue cluster GeoJSON
//! - GET  /rainfallstations: Rainfall readings as GeoJSON points
//! - GET  /supabase-info: Conversation history
//! - GET  /tools: Advertised tool declarations
//! - GET  /health: Health check (never behind auth)

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    middleware,
    response::Json,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use dashchat_core::conversation::{ConversationLog, ConversationTurn};
use dashchat_core::error::DashChatError;
use dashchat_core::orchestrator::Orchestrator;
use dashchat_core::provider::LlmProvider;

use crate::geodata::{self, ChartRow, GeoDataClient};
use crate::middleware::{auth_middleware, logging_middleware};

/// Shared API state. Read-only once built, so requests run concurrently.
pub struct ApiState {
    pub orchestrator: Orchestrator,
    pub provider: Box<dyn LlmProvider>,
    pub log: Arc<dyn ConversationLog>,
    pub geodata: GeoDataClient,
}

type SharedState = Arc<ApiState>;

// ─── Request/Response types ────────────────────────────────

#[derive(Deserialize)]
pub struct PromptRequest {
    pub text: String,
}

#[derive(Serialize)]
pub struct PromptResponse {
    pub result: String,
}

#[derive(Serialize)]
pub struct ChartResponse {
    pub chart_data: Vec<ChartRow>,
}

#[derive(Serialize)]
pub struct HistoryResponse {
    pub history: Vec<ConversationTurn>,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
}

/// Model and transport failures are the upstream's fault (502); anything
/// else is ours (500).
fn prompt_error_status(e: &DashChatError) -> StatusCode {
    if e.is_upstream() {
        StatusCode::BAD_GATEWAY
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

// ─── Handlers ──────────────────────────────────────────────

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn tools(State(state): State<SharedState>) -> Json<Value> {
    let declarations: Vec<Value> = state
        .orchestrator
        .tools
        .schemas()
        .iter()
        .map(|s| s.to_declaration())
        .collect();
    Json(json!({ "tools": declarations }))
}

async fn gemini_response(
    State(state): State<SharedState>,
    Json(req): Json<PromptRequest>,
) -> Result<Json<PromptResponse>, ApiError> {
    let prompt = req.text.trim();
    if prompt.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "'text' must not be empty"));
    }

    match state
        .orchestrator
        .process(state.provider.as_ref(), state.log.as_ref(), prompt)
        .await
    {
        Ok(result) => Ok(Json(PromptResponse { result })),
        Err(e) => {
            error!("Prompt failed: {}", e);
            Err(api_error(prompt_error_status(&e), e.to_string()))
        }
    }
}

async fn chart_data() -> Json<ChartResponse> {
    Json(ChartResponse {
        chart_data: geodata::chart_data(),
    })
}

async fn dengue_cluster(State(state): State<SharedState>) -> Result<Json<Value>, ApiError> {
    state.geodata.dengue_clusters().await.map(Json).map_err(|e| {
        error!("Dengue cluster fetch failed: {}", e);
        api_error(StatusCode::INTERNAL_SERVER_ERROR, upstream_message(e))
    })
}

async fn rainfall_stations(State(state): State<SharedState>) -> Result<Json<Value>, ApiError> {
    state.geodata.rainfall_stations().await.map(Json).map_err(|e| {
        error!("Rainfall fetch failed: {}", e);
        api_error(StatusCode::INTERNAL_SERVER_ERROR, upstream_message(e))
    })
}

async fn supabase_info(State(state): State<SharedState>) -> Result<Json<HistoryResponse>, ApiError> {
    state
        .log
        .history()
        .await
        .map(|history| Json(HistoryResponse { history }))
        .map_err(|e| {
            error!("History fetch failed: {}", e);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        })
}

/// Geodata errors are reported with the upstream's own message.
fn upstream_message(e: DashChatError) -> String {
    match e {
        DashChatError::Upstream(message) => message,
        other => other.to_string(),
    }
}

// ─── Server builder ────────────────────────────────────────

/// Build the API router. `api_key` of None leaves every route open.
pub fn build_router(state: SharedState, api_key: Option<String>) -> Router {
    let protected = Router::new()
        .route("/gemini-response", post(gemini_response))
        .route("/chartdata", get(chart_data))
        .route("/denguecluster", get(dengue_cluster))
        .route("/rainfallstations", get(rainfall_stations))
        .route("/supabase-info", get(supabase_info))
        .route("/tools", get(tools))
        .route_layer(middleware::from_fn_with_state(
            Arc::new(api_key),
            auth_middleware,
        ));

    Router::new()
        .route("/health", get(health))
        .merge(protected)
        .layer(middleware::from_fn(logging_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the API server.
pub async fn start_server(
    state: ApiState,
    host: &str,
    port: u16,
    api_key: Option<String>,
) -> anyhow::Result<()> {
    if api_key.is_some() {
        info!("API key auth enabled");
    }
    let app = build_router(Arc::new(state), api_key);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("🌐 API server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use dashchat_core::conversation::InMemoryLog;
    use dashchat_core::error::Result;
    use dashchat_core::message::{ModelReply, ToolCallRequest};
    use dashchat_core::provider::GenerateRequest;
    use dashchat_core::tool::ToolRegistry;
    use std::sync::Mutex;
    use tower::ServiceExt;

    use crate::tools::{UpstreamClient, WeatherTool};

    /// Replies from a script; an exhausted script is a provider failure.
    struct ScriptedProvider {
        replies: Mutex<Vec<ModelReply>>,
    }

    impl ScriptedProvider {
        fn new(mut replies: Vec<ModelReply>) -> Self {
            replies.reverse();
            Self {
                replies: Mutex::new(replies),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        fn model(&self) -> &str {
            "scripted-1"
        }

        async fn generate(&self, _request: GenerateRequest) -> Result<ModelReply> {
            self.replies
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| DashChatError::Provider("quota exceeded".into()))
        }
    }

    fn state(replies: Vec<ModelReply>, log: Arc<InMemoryLog>) -> SharedState {
        let mut tools = ToolRegistry::new();
        tools.register(WeatherTool::new());
        Arc::new(ApiState {
            orchestrator: Orchestrator::new(tools),
            provider: Box::new(ScriptedProvider::new(replies)),
            log,
            // Nothing listens here; geodata routes fail fast.
            geodata: GeoDataClient::new(
                UpstreamClient::from_secs(1),
                "http://127.0.0.1:9",
                "http://127.0.0.1:9",
            ),
        })
    }

    async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_prompt_with_tool_round_trip() {
        let log = Arc::new(InMemoryLog::new());
        let router = build_router(
            state(
                vec![
                    ModelReply::FunctionCall(ToolCallRequest::new(
                        "get_current_weather",
                        json!({ "location": "Tokyo" }),
                    )),
                    ModelReply::FinalText("It's mild in Tokyo.".into()),
                ],
                log.clone(),
            ),
            None,
        );

        let (status, body) = send(
            router,
            post_json("/gemini-response", json!({ "text": "What's the weather in Tokyo?" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "result": "It's mild in Tokyo." }));
        assert_eq!(log.len(), 2);
    }

    #[tokio::test]
    async fn test_model_failure_is_bad_gateway() {
        let log = Arc::new(InMemoryLog::new());
        let router = build_router(state(vec![], log.clone()), None);

        let (status, body) = send(router, post_json("/gemini-response", json!({ "text": "hi" }))).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body["error"].as_str().unwrap().contains("quota exceeded"));
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn test_bad_prompt_bodies() {
        let router = build_router(state(vec![], Arc::new(InMemoryLog::new())), None);
        let (status, _) = send(router.clone(), post_json("/gemini-response", json!({ "text": "  " }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(router, post_json("/gemini-response", json!({ "prompt": "hi" }))).await;
        assert!(status.is_client_error());
    }

    #[tokio::test]
    async fn test_chartdata_and_tools() {
        let router = build_router(state(vec![], Arc::new(InMemoryLog::new())), None);

        let (status, body) = send(router.clone(), Request::get("/chartdata").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["chart_data"].as_array().unwrap().len(), 4);
        assert_eq!(body["chart_data"][3]["name"], "T1-R1W1");

        let (status, body) = send(router, Request::get("/tools").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["tools"][0]["name"], "get_current_weather");
    }

    #[tokio::test]
    async fn test_history_endpoint() {
        let log = Arc::new(InMemoryLog::new());
        log.record("first", "one").await.unwrap();
        log.record("second", "two").await.unwrap();
        let router = build_router(state(vec![], log), None);

        let (status, body) = send(router, Request::get("/supabase-info").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        let history = body["history"].as_array().unwrap();
        assert_eq!(history.len(), 4);
        assert_eq!(history[0]["role"], "user");
        assert_eq!(history[0]["text"], "first");
        assert_eq!(history[1]["role"], "bot");
        assert_eq!(history[1]["prompt_id"], history[0]["prompt_id"]);
    }

    #[tokio::test]
    async fn test_geodata_failure_is_500() {
        let router = build_router(state(vec![], Arc::new(InMemoryLog::new())), None);
        let (status, body) = send(router, Request::get("/rainfallstations").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_auth_guards_all_but_health() {
        let router = build_router(
            state(vec![], Arc::new(InMemoryLog::new())),
            Some("s3cret".into()),
        );

        let (status, _) = send(router.clone(), Request::get("/chartdata").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(
            router.clone(),
            Request::get("/chartdata")
                .header("x-api-key", "s3cret")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(router, Request::get("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }
}
