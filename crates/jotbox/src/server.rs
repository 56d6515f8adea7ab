//! HTTP API for the triage workflow.
//!
//! The core contract is transport-agnostic; this module hosts it over
//! JSON HTTP for the capture UI and external triggers (cron hitting
//! `POST /triage`).
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/items` | Capture a new pending item |
//! | `GET`  | `/items` | List items, optionally filtered by state |
//! | `GET`  | `/items/{id}` | Fetch a single item |
//! | `POST` | `/items/{id}/triage` | Classify one item |
//! | `POST` | `/triage` | Run a triage batch (`{"ids": [...]}` or `{}`) |
//! | `POST` | `/items/{id}/approve` | Approve with optional overrides |
//! | `POST` | `/items/{id}/reject` | Reject the suggestion |
//! | `POST` | `/items/{id}/reset` | Reset a failed item to pending |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "invalid_state", "message": "item … is done, expected awaiting_approval" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `invalid_state`
//! (409), `conflict` (409), `classification_failed` (502), `internal`
//! (500).

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use jotbox_core::approval::Approvals;
use jotbox_core::models::{Bucket, Item, Overrides, Suggestion, TriageStatus};
use jotbox_core::store::ItemStore;
use jotbox_core::triage::{BatchReport, TriageEngine, TriageOptions, TriageOutcome};
use jotbox_core::Error;

use crate::classifier::create_classifier;
use crate::config::Config;
use crate::sqlite_store::{self, SqliteItemStore};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    store: Arc<dyn ItemStore>,
    engine: Arc<TriageEngine>,
    approvals: Arc<Approvals>,
    default_owner: String,
}

/// Starts the HTTP server on the address configured in `[server].bind`.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pool = sqlite_store::open_pool(&config.db).await?;
    let store: Arc<dyn ItemStore> = Arc::new(SqliteItemStore::new(pool));
    let classifier = create_classifier(&config.classifier)?;

    let engine = Arc::new(TriageEngine::new(
        store.clone(),
        classifier,
        TriageOptions {
            batch_size: config.triage.batch_size,
            context_limit: config.triage.context_limit,
        },
    ));
    let approvals = Arc::new(Approvals::new(store.clone()));

    let state = AppState {
        store,
        engine,
        approvals,
        default_owner: config.capture.owner.clone(),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(handle_health))
        .route("/items", post(handle_create_item).get(handle_list_items))
        .route("/items/{id}", get(handle_get_item))
        .route("/items/{id}/triage", post(handle_triage_item))
        .route("/items/{id}/approve", post(handle_approve))
        .route("/items/{id}/reject", post(handle_reject))
        .route("/items/{id}/reset", post(handle_reset))
        .route("/triage", post(handle_triage_batch))
        .layer(cors)
        .with_state(state);

    println!("jotbox server listening on http://{}", config.server.bind);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        let (status, code) = match &err {
            Error::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            Error::InvalidState { .. } => (StatusCode::CONFLICT, "invalid_state"),
            Error::Conflict { .. } => (StatusCode::CONFLICT, "conflict"),
            Error::Classification(_) => (StatusCode::BAD_GATEWAY, "classification_failed"),
            Error::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };
        AppError {
            status,
            code,
            message: err.to_string(),
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /items ============

#[derive(Deserialize)]
struct CreateItemRequest {
    body: String,
    bucket: Option<Bucket>,
    owner: Option<String>,
    /// Opaque structured content (rich text, attachment references).
    content: Option<serde_json::Value>,
}

async fn handle_create_item(
    State(state): State<AppState>,
    Json(req): Json<CreateItemRequest>,
) -> Result<(StatusCode, Json<Item>), AppError> {
    if req.body.trim().is_empty() {
        return Err(bad_request("body must not be empty"));
    }
    let owner = req.owner.unwrap_or_else(|| state.default_owner.clone());
    let mut item = Item::new(owner, req.body);
    item.bucket = req.bucket;
    item.content_json = req.content.map(|c| c.to_string());

    state.store.insert(&item).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

// ============ GET /items ============

#[derive(Deserialize)]
struct ListParams {
    state: Option<TriageStatus>,
    limit: Option<usize>,
}

#[derive(Serialize)]
struct ItemListResponse {
    items: Vec<Item>,
}

async fn handle_list_items(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<ItemListResponse>, AppError> {
    let items = state
        .store
        .list(params.state, params.limit.unwrap_or(50))
        .await?;
    Ok(Json(ItemListResponse { items }))
}

// ============ GET /items/{id} ============

async fn handle_get_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Item>, AppError> {
    Ok(Json(state.store.get(&id).await?))
}

// ============ POST /items/{id}/triage ============

#[derive(Serialize)]
struct TriageOneResponse {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    suggestion: Option<Suggestion>,
}

async fn handle_triage_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TriageOneResponse>, AppError> {
    let response = match state.engine.triage_one(&id).await? {
        TriageOutcome::Classified(suggestion) => TriageOneResponse {
            status: "ok",
            suggestion: Some(suggestion),
        },
        TriageOutcome::AlreadyTriaged => TriageOneResponse {
            status: "already_triaged",
            suggestion: None,
        },
    };
    Ok(Json(response))
}

// ============ POST /triage ============

#[derive(Deserialize, Default)]
struct TriageBatchRequest {
    #[serde(default)]
    ids: Option<Vec<String>>,
}

async fn handle_triage_batch(
    State(state): State<AppState>,
    Json(req): Json<TriageBatchRequest>,
) -> Result<Json<BatchReport>, AppError> {
    let report = state.engine.triage_batch(req.ids.as_deref()).await?;
    Ok(Json(report))
}

// ============ POST /items/{id}/approve ============

async fn handle_approve(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(overrides): Json<Overrides>,
) -> Result<Json<Item>, AppError> {
    Ok(Json(state.approvals.approve(&id, &overrides).await?))
}

// ============ POST /items/{id}/reject ============

async fn handle_reject(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Item>, AppError> {
    Ok(Json(state.approvals.reject(&id).await?))
}

// ============ POST /items/{id}/reset ============

async fn handle_reset(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Item>, AppError> {
    Ok(Json(state.approvals.reset(&id).await?))
}
