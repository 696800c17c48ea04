//! api-server — HTTP API for the postr record-management workspace.
//!
//! Exposes user and post endpoints over JSON and supports local dev with:
//! - Storage: SQLite (file, default) or in-memory when STORAGE_PROVIDER=memory.
//! - Logging: JSON lines in production, pretty output when APP_ENV=development.
//! - CORS: Configurable via CORS_ALLOW_ORIGIN (origin string) for frontends.
//!
//! Run:
//! ```bash
//! # pretty logs; PORT optional
//! APP_ENV=development cargo run -p api-server
//!
//! # in-memory storage (data lost on restart)
//! STORAGE_PROVIDER=memory cargo run -p api-server
//! ```
//!
//! Configuration: See `config.rs` for all environment variables.

mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::http::HeaderValue;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use domain::adapters::memory_store::InMemoryStore;
use domain::service::{PostService, UserService};
use domain::{
    Clock, DomainError, IdGenerator, NewPost, NewUser, Post, PostStore, StoreError, User,
    UserLookup, UserStore,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// Local store abstraction supporting sqlite (feature-gated) or memory.
enum StoreKind {
    Memory(InMemoryStore),
    #[cfg(feature = "sqlite")]
    Sqlite(sqlite_adapter::SqliteStore),
}

#[derive(Clone)]
struct AnyStore {
    kind: Arc<StoreKind>,
}

impl AnyStore {
    fn memory() -> Self {
        Self {
            kind: Arc::new(StoreKind::Memory(InMemoryStore::new())),
        }
    }

    #[cfg(feature = "sqlite")]
    fn sqlite(path: &std::path::Path) -> Result<Self, StoreError> {
        Ok(Self {
            kind: Arc::new(StoreKind::Sqlite(sqlite_adapter::SqliteStore::new(path)?)),
        })
    }
}

impl UserLookup for AnyStore {
    fn exists(&self, id: &str) -> Result<bool, StoreError> {
        match &*self.kind {
            StoreKind::Memory(s) => s.exists(id),
            #[cfg(feature = "sqlite")]
            StoreKind::Sqlite(s) => s.exists(id),
        }
    }
}

impl UserStore for AnyStore {
    fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        match &*self.kind {
            StoreKind::Memory(s) => s.insert_user(user),
            #[cfg(feature = "sqlite")]
            StoreKind::Sqlite(s) => s.insert_user(user),
        }
    }

    fn get(&self, id: &str) -> Result<Option<User>, StoreError> {
        match &*self.kind {
            StoreKind::Memory(s) => s.get(id),
            #[cfg(feature = "sqlite")]
            StoreKind::Sqlite(s) => s.get(id),
        }
    }

    fn count(&self) -> Result<u64, StoreError> {
        match &*self.kind {
            StoreKind::Memory(s) => s.count(),
            #[cfg(feature = "sqlite")]
            StoreKind::Sqlite(s) => s.count(),
        }
    }

    fn list(&self, offset: u64, limit: u64) -> Result<Vec<User>, StoreError> {
        match &*self.kind {
            StoreKind::Memory(s) => s.list(offset, limit),
            #[cfg(feature = "sqlite")]
            StoreKind::Sqlite(s) => s.list(offset, limit),
        }
    }
}

impl PostStore for AnyStore {
    fn insert_post(&self, post: &Post) -> Result<(), StoreError> {
        match &*self.kind {
            StoreKind::Memory(s) => s.insert_post(post),
            #[cfg(feature = "sqlite")]
            StoreKind::Sqlite(s) => s.insert_post(post),
        }
    }

    fn list_by_user(&self, user_id: &str) -> Result<Vec<Post>, StoreError> {
        match &*self.kind {
            StoreKind::Memory(s) => s.list_by_user(user_id),
            #[cfg(feature = "sqlite")]
            StoreKind::Sqlite(s) => s.list_by_user(user_id),
        }
    }

    fn delete(&self, id: &str) -> Result<(), StoreError> {
        match &*self.kind {
            StoreKind::Memory(s) => PostStore::delete(s, id),
            #[cfg(feature = "sqlite")]
            StoreKind::Sqlite(s) => PostStore::delete(s, id),
        }
    }
}

#[derive(Clone)]
struct StdClock;
impl Clock for StdClock {
    fn now(&self) -> std::time::SystemTime {
        std::time::SystemTime::now()
    }
}

#[derive(Clone)]
struct UuidIds;
impl IdGenerator for UuidIds {
    fn next_id(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

type UserSvc = UserService<AnyStore, UuidIds, StdClock>;
type PostSvc = PostService<AnyStore, AnyStore, UuidIds, StdClock>;

#[derive(Clone)]
struct AppState {
    users: Arc<UserSvc>,
    posts: Arc<PostSvc>,
}

impl AppState {
    fn new(store: AnyStore) -> Self {
        Self {
            users: Arc::new(UserService::new(store.clone(), UuidIds, StdClock)),
            posts: Arc::new(PostService::new(store.clone(), store, UuidIds, StdClock)),
        }
    }
}

#[tokio::main]
async fn main() {
    // Load and validate config first (fail fast on misconfiguration)
    let cfg = match config::Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    init_tracing(&cfg);

    let store = match build_store(&cfg) {
        Ok(s) => s,
        Err(e) => {
            error!(err = %e, "failed to initialize storage");
            std::process::exit(1);
        }
    };
    let state = AppState::new(store);

    let mut app = router(state);

    // CORS - already validated in Config::from_env()
    let cors = if cfg.cors_allow_origin == HeaderValue::from_static("*") {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::list([cfg.cors_allow_origin]))
            .allow_methods([
                axum::http::Method::GET,
                axum::http::Method::POST,
                axum::http::Method::DELETE,
                axum::http::Method::OPTIONS,
            ])
            .allow_headers([axum::http::header::CONTENT_TYPE])
    };
    app = app.layer(cors);

    let addr: SocketAddr = ([0, 0, 0, 0], cfg.port).into();
    info!(%addr, "api-server listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("bind port");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

fn router(state: AppState) -> Router {
    // Request ID header name
    let x_request_id = axum::http::HeaderName::from_static("x-request-id");

    Router::new()
        .route("/users", post(create_user).get(list_users))
        .route("/users/count", get(count_users))
        .route("/users/:id", get(get_user))
        .route("/posts", post(create_post))
        // GET takes a user id, DELETE a post id; they share the one segment.
        .route("/posts/:id", get(list_posts).delete(delete_post))
        .layer(PropagateRequestIdLayer::new(x_request_id.clone()))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            }),
        )
        .layer(SetRequestIdLayer::new(x_request_id, MakeRequestUuid))
        .with_state(state)
}

fn init_tracing(cfg: &config::Config) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);
    match cfg.app_env {
        config::AppEnv::Production => {
            registry
                .with(
                    fmt::layer()
                        .json()
                        .with_target(true)
                        .with_timer(fmt::time::SystemTime)
                        .with_writer(std::io::stdout),
                )
                .init();
        }
        config::AppEnv::Development => {
            registry
                .with(
                    fmt::layer()
                        .pretty()
                        .with_target(true)
                        .with_writer(std::io::stdout),
                )
                .init();
        }
    }
}

// Construct a store instance based on config and feature flags. A sqlite
// open failure is fatal for the caller: degrading to in-memory storage would
// silently drop persistence.
fn build_store(cfg: &config::Config) -> Result<AnyStore, StoreError> {
    match cfg.storage_provider {
        #[cfg(feature = "sqlite")]
        config::StorageProvider::Sqlite => {
            let store = AnyStore::sqlite(&cfg.db_path)?;
            info!(path = %cfg.db_path.display(), "sqlite storage ready");
            Ok(store)
        }
        _ => Ok(AnyStore::memory()),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("sigterm handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}

#[derive(Deserialize)]
struct CreateUserReq {
    #[serde(default)]
    firstname: String,
    #[serde(default)]
    lastname: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    street: String,
    #[serde(default)]
    city: String,
    #[serde(default)]
    state: String,
    #[serde(default)]
    zipcode: String,
}

#[derive(Deserialize)]
struct CreatePostReq {
    #[serde(default, rename = "userId")]
    user_id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    body: String,
}

// Query params arrive as strings; anything unparsable falls back to the
// defaults while explicit non-positive numbers are rejected by the service.
#[derive(Deserialize)]
struct ListQuery {
    #[serde(rename = "pageNumber")]
    page_number: Option<String>,
    #[serde(rename = "pageSize")]
    page_size: Option<String>,
}

#[derive(Serialize)]
struct UserOut {
    id: String,
    firstname: String,
    lastname: String,
    email: String,
    street: String,
    city: String,
    state: String,
    zipcode: String,
    #[serde(rename = "createdAt")]
    created_at: String,
}

#[derive(Serialize)]
struct PostOut {
    id: String,
    #[serde(rename = "userId")]
    user_id: String,
    title: String,
    body: String,
    #[serde(rename = "createdAt")]
    created_at: String,
}

fn user_to_out(user: User) -> UserOut {
    UserOut {
        id: user.id,
        firstname: user.firstname,
        lastname: user.lastname,
        email: user.email,
        street: user.street,
        city: user.city,
        state: user.state,
        zipcode: user.zipcode,
        created_at: http_common::system_time_to_rfc3339(user.created_at),
    }
}

fn post_to_out(post: Post) -> PostOut {
    PostOut {
        id: post.id,
        user_id: post.user_id,
        title: post.title,
        body: post.body,
        created_at: http_common::system_time_to_rfc3339(post.created_at),
    }
}

fn error_response(op: &str, err: &DomainError) -> Response {
    let status = StatusCode::from_u16(http_common::status_for(err))
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        error!(code = err.code(), "{} failed", op);
    } else {
        warn!(code = err.code(), "{} rejected", op);
    }
    (status, Json(http_common::error_body(err))).into_response()
}

fn rejected_body(op: &str, rejection: &JsonRejection) -> Response {
    warn!(reason = %rejection, "{}: malformed request body", op);
    error_response(op, &DomainError::InvalidInput(None))
}

async fn create_user(
    State(state): State<AppState>,
    body: Result<Json<CreateUserReq>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(rej) => return rejected_body("create user", &rej),
    };
    let input = NewUser {
        firstname: body.firstname,
        lastname: body.lastname,
        email: body.email,
        street: body.street,
        city: body.city,
        state: body.state,
        zipcode: body.zipcode,
    };
    match state.users.create(input) {
        Ok(user) => {
            info!(id = %user.id, "user created");
            (
                StatusCode::CREATED,
                Json(http_common::success(
                    "User created successfully",
                    json!(user_to_out(user)),
                )),
            )
                .into_response()
        }
        Err(err) => error_response("create user", &err),
    }
}

async fn list_users(State(state): State<AppState>, Query(q): Query<ListQuery>) -> Response {
    let page_number = q
        .page_number
        .as_deref()
        .and_then(|s| s.parse::<i64>().ok())
        .unwrap_or(1);
    let page_size = q
        .page_size
        .as_deref()
        .and_then(|s| s.parse::<i64>().ok())
        .unwrap_or(10);

    match state.users.list(page_number, page_size) {
        Ok(page) => {
            let users: Vec<UserOut> = page.users.into_iter().map(user_to_out).collect();
            (
                StatusCode::OK,
                Json(http_common::success_paginated(
                    "Users listed successfully",
                    json!(users),
                    &page.pagination,
                )),
            )
                .into_response()
        }
        Err(err) => error_response("list users", &err),
    }
}

async fn count_users(State(state): State<AppState>) -> Response {
    match state.users.count() {
        Ok(count) => (
            StatusCode::OK,
            Json(http_common::success(
                "Users counted successfully",
                json!({ "count": count }),
            )),
        )
            .into_response(),
        Err(err) => error_response("count users", &err),
    }
}

async fn get_user(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.users.get(&id) {
        Ok(user) => (
            StatusCode::OK,
            Json(http_common::success(
                "User retrieved successfully",
                json!(user_to_out(user)),
            )),
        )
            .into_response(),
        Err(err) => error_response("get user", &err),
    }
}

async fn create_post(
    State(state): State<AppState>,
    body: Result<Json<CreatePostReq>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(rej) => return rejected_body("create post", &rej),
    };
    let input = NewPost {
        user_id: body.user_id.trim().to_string(),
        title: body.title.trim().to_string(),
        body: body.body.trim().to_string(),
    };
    match state.posts.create(input) {
        Ok(post) => {
            info!(id = %post.id, user_id = %post.user_id, "post created");
            (
                StatusCode::CREATED,
                Json(http_common::success(
                    "Post created successfully",
                    json!(post_to_out(post)),
                )),
            )
                .into_response()
        }
        Err(err) => error_response("create post", &err),
    }
}

async fn list_posts(State(state): State<AppState>, Path(user_id): Path<String>) -> Response {
    match state.posts.list(&user_id) {
        Ok(posts) => {
            let posts: Vec<PostOut> = posts.into_iter().map(post_to_out).collect();
            (
                StatusCode::OK,
                Json(http_common::success(
                    "Posts listed successfully",
                    json!(posts),
                )),
            )
                .into_response()
        }
        Err(err) => error_response("list posts", &err),
    }
}

async fn delete_post(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.posts.delete(&id) {
        Ok(()) => {
            info!(%id, "post deleted");
            StatusCode::NO_CONTENT.into_response()
        }
        Err(err) => error_response("delete post", &err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::util::ServiceExt;

    fn app() -> Router {
        router(AppState::new(AnyStore::memory()))
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn build_store_fails_on_unopenable_db_path() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "x").unwrap();
        let cfg = config::Config {
            port: 0,
            app_env: config::AppEnv::Development,
            storage_provider: config::StorageProvider::Sqlite,
            db_path: blocker.join("sub").join("app.db"),
            cors_allow_origin: HeaderValue::from_static("*"),
        };
        // No silent fallback to memory: the caller must see the failure.
        assert!(build_store(&cfg).is_err());
    }

    const VALID_USER: &str = r#"{
        "firstname": "Ada",
        "lastname": "Lovelace",
        "email": "ada@example.com",
        "street": "12 Analytical Way",
        "city": "London",
        "state": "LDN",
        "zipcode": "NW1"
    }"#;

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn create_valid_user(router: &Router) -> String {
        let req = Request::builder()
            .method("POST")
            .uri("/users")
            .header("content-type", "application/json")
            .body(Body::from(VALID_USER))
            .unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body = body_json(resp).await;
        body["data"]["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn create_and_fetch_user_flow() {
        let router = app();
        let id = create_valid_user(&router).await;
        assert!(!id.is_empty());

        let resp = router
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/users/{id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["status"], "success");
        assert_eq!(body["data"]["email"], "ada@example.com");

        let resp = router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/users/count")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["data"]["count"], 1);
    }

    #[tokio::test]
    async fn create_user_with_invalid_fields_returns_400() {
        let router = app();
        let req = Request::builder()
            .method("POST")
            .uri("/users")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"firstname": "A"}"#))
            .unwrap();
        let resp = router.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = body_json(resp).await;
        assert_eq!(body["status"], "error");
        assert_eq!(body["code"], "APP-400");
        assert!(body["fieldErrors"]["email"].is_string());
        assert!(body["fieldErrors"]["firstname"].is_string());
    }

    #[tokio::test]
    async fn malformed_json_body_returns_400() {
        let router = app();
        let req = Request::builder()
            .method("POST")
            .uri("/users")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let resp = router.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = body_json(resp).await;
        assert_eq!(body["code"], "APP-400");
    }

    #[tokio::test]
    async fn get_missing_user_returns_404() {
        let router = app();
        let resp = router
            .oneshot(
                Request::builder()
                    .uri("/users/no-such-id")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body = body_json(resp).await;
        assert_eq!(body["code"], "USR-404001");
    }

    #[tokio::test]
    async fn list_users_paginates() {
        let router = app();
        for _ in 0..3 {
            create_valid_user(&router).await;
        }

        let resp = router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/users?pageNumber=2&pageSize=2")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
        assert_eq!(body["pagination"]["current_page"], 2);
        assert_eq!(body["pagination"]["total_pages"], 2);
        assert_eq!(body["pagination"]["total_size"], 3);
    }

    #[tokio::test]
    async fn list_users_defaults_bad_paging_params() {
        let router = app();
        create_valid_user(&router).await;

        // Unparsable params fall back to page 1 / size 10
        let resp = router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/users?pageNumber=abc&pageSize=xyz")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        // Explicit non-positive params are rejected
        let resp = router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/users?pageNumber=0&pageSize=-1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = body_json(resp).await;
        assert_eq!(body["code"], "APP-400");
    }

    #[tokio::test]
    async fn post_lifecycle_flow() {
        let router = app();
        let user_id = create_valid_user(&router).await;

        let req = Request::builder()
            .method("POST")
            .uri("/posts")
            .header("content-type", "application/json")
            .body(Body::from(format!(
                r#"{{"userId": "{user_id}", "title": "  Hello  ", "body": "First post"}}"#
            )))
            .unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body = body_json(resp).await;
        let post_id = body["data"]["id"].as_str().unwrap().to_string();
        // Title arrives trimmed
        assert_eq!(body["data"]["title"], "Hello");

        let resp = router
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/posts/{user_id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);

        let resp = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/posts/{post_id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        // Second delete of the same post is a 404
        let resp = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/posts/{post_id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body = body_json(resp).await;
        assert_eq!(body["code"], "PST-404001");
    }

    #[tokio::test]
    async fn create_post_for_missing_user_returns_404() {
        let router = app();
        let req = Request::builder()
            .method("POST")
            .uri("/posts")
            .header("content-type", "application/json")
            .body(Body::from(
                r#"{"userId": "ghost", "title": "T", "body": "B"}"#,
            ))
            .unwrap();
        let resp = router.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body = body_json(resp).await;
        assert_eq!(body["code"], "USR-404001");
    }
}
