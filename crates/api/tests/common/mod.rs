//! Shared fixtures for API integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use adslot_api::auth::jwt::{generate_access_token, JwtConfig};
use adslot_api::config::{SchedulerConfig, ServerConfig};
use adslot_api::router::build_app_router;
use adslot_api::state::AppState;
use adslot_core::roles::{ROLE_ADMIN, ROLE_USER};
use adslot_core::types::DbId;
use adslot_db::models::ad::{Ad, CreateAd};
use adslot_db::repositories::AdRepo;
use adslot_engine::{EngineConfig, FeaturedEngine};
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use sqlx::PgPool;
use tower::ServiceExt;

pub const ADMIN_ID: DbId = 1;
pub const OWNER_ID: DbId = 10;
pub const OTHER_USER_ID: DbId = 11;
pub const SCHEDULER_TOKEN: &str = "test-scheduler-token";

fn jwt_config() -> JwtConfig {
    JwtConfig {
        secret: "test-secret-that-is-long-enough-for-hmac".to_string(),
        access_token_expiry_mins: 15,
    }
}

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        app_env: "test".to_string(),
        jwt: jwt_config(),
        scheduler: SchedulerConfig::new(Some(SCHEDULER_TOKEN), false, "test").unwrap(),
        engine: EngineConfig::default(),
        sweep_interval_secs: 3600,
        sweep_in_process: false,
    }
}

/// Build the full application router over `pool`, exactly as `main.rs` does.
pub fn build_test_app(pool: PgPool) -> Router {
    build_app_with_config(pool, test_config())
}

pub fn build_app_with_config(pool: PgPool, config: ServerConfig) -> Router {
    let engine = FeaturedEngine::new(pool.clone(), &config.engine);
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        engine,
    };
    build_app_router(state, &config)
}

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

pub fn admin_token() -> String {
    generate_access_token(ADMIN_ID, ROLE_ADMIN, Some("admin@example.com"), &jwt_config()).unwrap()
}

pub fn user_token(user_id: DbId) -> String {
    generate_access_token(user_id, ROLE_USER, None, &jwt_config()).unwrap()
}

// ---------------------------------------------------------------------------
// Seeding
// ---------------------------------------------------------------------------

/// Insert an ad owned by [`OWNER_ID`].
pub async fn seed_ad(pool: &PgPool, category_id: DbId, status: &str) -> Ad {
    AdRepo::create(
        pool,
        &CreateAd {
            user_id: OWNER_ID,
            category_id,
            title: format!("Ad in category {category_id}"),
            status: Some(status.to_string()),
        },
    )
    .await
    .unwrap()
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn send(
    app: Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, None, None).await
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    send(app, Method::GET, uri, Some(token), None).await
}

pub async fn post_json_auth(
    app: Router,
    uri: &str,
    token: &str,
    body: serde_json::Value,
) -> Response<Body> {
    send(app, Method::POST, uri, Some(token), Some(body)).await
}

pub async fn post_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    send(app, Method::POST, uri, Some(token), None).await
}

pub async fn put_json_auth(
    app: Router,
    uri: &str,
    token: &str,
    body: serde_json::Value,
) -> Response<Body> {
    send(app, Method::PUT, uri, Some(token), Some(body)).await
}

/// POST to the sweep trigger with an optional scheduler token.
pub async fn post_sweep(app: Router, scheduler_token: Option<&str>) -> Response<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/featured/sweep");
    if let Some(token) = scheduler_token {
        builder = builder.header("x-scheduler-token", token);
    }
    app.oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap()
}
