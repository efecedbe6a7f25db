// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! HTTP routes
//!
//! Thin handlers over [`GatewayContext`]: liveness, per-resource ping probes
//! and demo endpoints for the language-model and outbound HTTP clients.
//! Everything is nested under `api_prefix` and answers with the
//! [`ApiResponse`] envelope.

use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderValue, Request, Response, Uri};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, info_span, warn, Span};

use super::envelope::{ApiError, ApiResponse, ApiResult};
use crate::application::context::GatewayContext;
use crate::infrastructure::resources::object_storage::DEFAULT_TOKEN_TTL;

const HTTPBIN_IP_URL: &str = "https://httpbin.org/ip";
const PING_OBJECT_KEY: &str = "relaygate/ping";
const REQUEST_ID_HEADER: &str = "x-request-id";

type AppState = Arc<GatewayContext>;

/// Full application router with middleware applied.
pub fn router(ctx: Arc<GatewayContext>) -> Router {
    let prefix = ctx.config().route_prefix();
    let cors = cors_layer(&ctx.config().cors_origins);

    let api = Router::new()
        .route("/health", get(health))
        .route("/infra/ping/mysql", get(ping_mysql))
        .route("/infra/ping/redis", get(ping_redis))
        .route("/infra/ping/mongo", get(ping_mongo))
        .route("/infra/ping/doris", get(ping_doris))
        .route("/infra/ping/es", get(ping_es))
        .route("/infra/ping/qiniu", get(ping_object_storage))
        .route("/demo/llm/chat", post(chat_default))
        .route("/demo/llm/chat/{provider}", post(chat_with_provider))
        .route("/demo/llm/vision", post(vision))
        .route("/demo/http/ip", get(outbound_ip));

    let routes = if prefix.is_empty() {
        api
    } else {
        Router::new().nest(&prefix, api)
    };

    routes.fallback(not_found).with_state(ctx).layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(access_span)
                    .on_request(())
                    .on_response(|response: &Response<Body>, latency: Duration, span: &Span| {
                        if span.is_disabled() {
                            return;
                        }
                        info!(
                            status = response.status().as_u16(),
                            elapsed_ms = latency.as_millis() as u64,
                            "Request completed"
                        );
                    }),
            )
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(cors),
    )
}

/// Access-log span; health probes get none so they stay out of the log.
fn access_span(request: &Request<Body>) -> Span {
    let path = request.uri().path();
    if path.ends_with("/health") {
        return Span::none();
    }
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-");
    info_span!("http", method = %request.method(), path = %path, request_id = %request_id)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.iter().any(|o| o.trim() == "*") {
        return layer.allow_origin(Any);
    }
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin.trim()) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring malformed CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(parsed))
}

async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(uri.path().to_string())
}

#[derive(Debug, Serialize)]
struct ResourceStatus {
    name: String,
    kind: String,
    configured: bool,
    state: crate::domain::resource::SlotState,
}

async fn health(State(ctx): State<AppState>) -> ApiResult<Value> {
    let mut resources = Vec::new();
    for resource in ctx.lifecycle().resources() {
        resources.push(ResourceStatus {
            name: resource.name().to_string(),
            kind: resource.kind().to_string(),
            configured: resource.is_configured(),
            state: resource.state().await,
        });
    }
    let config = ctx.config();
    Ok(ApiResponse::success(json!({
        "status": "ok",
        "app": config.app_name,
        "env": config.env.as_str(),
        "version": env!("CARGO_PKG_VERSION"),
        "resources": resources,
    })))
}

fn ping_reply(slot: &str, ok: bool) -> ApiResponse<Value> {
    ApiResponse::success(json!({ "slot": slot, "ok": ok }))
}

async fn ping_mysql(State(ctx): State<AppState>) -> ApiResult<Value> {
    let ok = ctx.mysql().main().ping().await?;
    Ok(ping_reply("mysql.main", ok))
}

async fn ping_redis(State(ctx): State<AppState>) -> ApiResult<Value> {
    let reply = ctx.redis().ping().await?;
    Ok(ApiResponse::success(json!({
        "slot": "redis.main",
        "ok": reply.eq_ignore_ascii_case("PONG"),
        "reply": reply,
    })))
}

async fn ping_mongo(State(ctx): State<AppState>) -> ApiResult<Value> {
    let ok = ctx.mongo_primary().ping().await?;
    Ok(ping_reply("mongo.primary", ok))
}

async fn ping_doris(State(ctx): State<AppState>) -> ApiResult<Value> {
    let ok = ctx.doris().query().ping().await?;
    Ok(ping_reply("doris.query", ok))
}

async fn ping_es(State(ctx): State<AppState>) -> ApiResult<Value> {
    let client = ctx.search().await?;
    let cluster_name = client.cluster_name().await?;
    Ok(ApiResponse::success(json!({
        "slot": "es.main",
        "ok": true,
        "cluster_name": cluster_name,
    })))
}

/// Object storage has no server to reach; signing a token proves the
/// credentials are loaded.
async fn ping_object_storage(State(ctx): State<AppState>) -> ApiResult<Value> {
    let signer = ctx.object_storage().await?;
    signer.upload_token(PING_OBJECT_KEY, DEFAULT_TOKEN_TTL)?;
    Ok(ApiResponse::success(json!({
        "slot": "object_storage.main",
        "ok": true,
        "bucket": signer.bucket(),
        "sample_url": signer.build_url(PING_OBJECT_KEY),
    })))
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub prompt: String,
    #[serde(default)]
    pub user: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatReply {
    pub provider: String,
    pub answer: String,
}

async fn chat_default(
    State(ctx): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> ApiResult<ChatReply> {
    chat(&ctx, None, payload).await
}

async fn chat_with_provider(
    State(ctx): State<AppState>,
    Path(provider): Path<String>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> ApiResult<ChatReply> {
    chat(&ctx, Some(&provider), payload).await
}

async fn chat(
    ctx: &GatewayContext,
    provider: Option<&str>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> ApiResult<ChatReply> {
    let Json(request) = payload?;
    if request.prompt.trim().is_empty() {
        return Err(ApiError::validation("prompt must not be empty"));
    }

    let client = ctx.llm(provider)?;
    let answer = client.chat(&request.prompt, request.user.as_deref()).await?;
    Ok(ApiResponse::success(ChatReply {
        provider: client.provider().to_string(),
        answer,
    }))
}

fn default_vision_prompt() -> String {
    "Describe this image".to_string()
}

#[derive(Debug, Deserialize)]
pub struct VisionRequest {
    pub image_url: String,
    #[serde(default = "default_vision_prompt")]
    pub prompt: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub system_prompt: Option<String>,
}

async fn vision(
    State(ctx): State<AppState>,
    payload: Result<Json<VisionRequest>, JsonRejection>,
) -> ApiResult<ChatReply> {
    let Json(request) = payload?;
    if request.image_url.trim().is_empty() {
        return Err(ApiError::validation("image_url must not be empty"));
    }

    let client = ctx.vision_llm()?;
    let answer = client
        .analyze_image(
            &request.image_url,
            &request.prompt,
            request.user.as_deref(),
            request.system_prompt.as_deref(),
        )
        .await?;
    Ok(ApiResponse::success(ChatReply {
        provider: client.provider().to_string(),
        answer,
    }))
}

async fn outbound_ip(State(ctx): State<AppState>) -> ApiResult<Value> {
    let response = ctx.http().get(HTTPBIN_IP_URL).await?;
    Ok(ApiResponse::success(response.json()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::GatewayConfig;
    use crate::domain::tunnel::{TunnelBroker, TunnelError, TunnelKey};
    use crate::presentation::envelope::{BUSINESS_ERROR, NOT_FOUND, VALIDATION_ERROR};
    use async_trait::async_trait;
    use axum::http::StatusCode;
    use http_body_util::BodyExt;
    use std::net::SocketAddr;
    use tower::ServiceExt;

    struct NoTunnels;

    #[async_trait]
    impl TunnelBroker for NoTunnels {
        async fn acquire(&self, _key: &TunnelKey) -> Result<SocketAddr, TunnelError> {
            Err(TunnelError::PolicyDisabled)
        }

        async fn release_all(&self) {}
    }

    fn app(config: GatewayConfig) -> Router {
        let ctx = GatewayContext::with_broker(config, Arc::new(NoTunnels)).unwrap();
        router(Arc::new(ctx))
    }

    async fn call(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_lists_resources() {
        let (status, body) = call(
            app(GatewayConfig::default()),
            Request::get("/api/health").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["code"], 0);
        assert_eq!(body["data"]["status"], "ok");
        let names: Vec<&str> = body["data"]["resources"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|r| r["name"].as_str())
            .collect();
        assert!(names.contains(&"mysql.main"));
        assert!(names.contains(&"es.main"));
    }

    #[tokio::test]
    async fn test_unconfigured_ping_is_business_error() {
        let (status, body) = call(
            app(GatewayConfig::default()),
            Request::get("/api/infra/ping/redis").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["code"], BUSINESS_ERROR);
        assert!(body["msg"].as_str().unwrap().contains("REDIS__URL"));
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        let (status, body) = call(
            app(GatewayConfig::default()),
            Request::get("/api/nope").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], NOT_FOUND);
    }

    #[tokio::test]
    async fn test_malformed_body_is_validation_error() {
        let (status, body) = call(
            app(GatewayConfig::default()),
            post_json("/api/demo/llm/chat", r#"{"user": "u1"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], VALIDATION_ERROR);

        let (status, _) = call(
            app(GatewayConfig::default()),
            post_json("/api/demo/llm/chat", r#"{"prompt": "   "}"#),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_unknown_provider_is_business_error() {
        let (status, body) = call(
            app(GatewayConfig::default()),
            post_json("/api/demo/llm/chat/unknown", r#"{"prompt": "hi"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["code"], BUSINESS_ERROR);
        assert!(body["msg"].as_str().unwrap().contains("unknown"));
    }

    #[tokio::test]
    async fn test_chat_round_trip_through_provider() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices":[{"message":{"role":"assistant","content":"pong"}}]}"#)
            .create_async()
            .await;

        let mut config = GatewayConfig::default();
        config.llm.provider = "openai".to_string();
        config.llm.openai.base_url = Some(format!("{}/v1", server.url()));
        config.llm.openai.api_key = Some("sk-test".to_string());
        config.llm.openai.model = Some("gpt-4o-mini".to_string());

        let (status, body) = call(app(config), post_json("/api/demo/llm/chat", r#"{"prompt": "ping"}"#)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["code"], 0);
        assert_eq!(body["data"]["provider"], "openai");
        assert_eq!(body["data"]["answer"], "pong");
    }

    #[tokio::test]
    async fn test_request_id_is_propagated_or_generated() {
        let response = app(GatewayConfig::default())
            .oneshot(
                Request::get("/api/health")
                    .header(REQUEST_ID_HEADER, "req-42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.headers()[REQUEST_ID_HEADER], "req-42");

        let response = app(GatewayConfig::default())
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let generated = response.headers()[REQUEST_ID_HEADER].to_str().unwrap();
        assert!(uuid::Uuid::parse_str(generated).is_ok());
    }

    #[tokio::test]
    async fn test_root_prefix_serves_routes_unnested() {
        let config = GatewayConfig {
            api_prefix: "/".to_string(),
            ..GatewayConfig::default()
        };
        config.validate().unwrap();
        let (status, body) = call(app(config), Request::get("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["code"], 0);
    }

    #[tokio::test]
    async fn test_trailing_slash_prefix_is_accepted_and_mounted() {
        let config = GatewayConfig {
            api_prefix: "api/".to_string(),
            ..GatewayConfig::default()
        };
        config.validate().unwrap();
        let (status, _) = call(app(config), Request::get("/api/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
    }
}
