//! HTTP/JSON transport
//!
//! # API Endpoints
//!
//! ## Public
//!
//! - `GET /api/health`: liveness check
//! - `GET /metrics`: Prometheus text format
//! - `POST /api/students`: submit a camp application (rate limited)
//! - `POST /api/contact`: submit a contact message (rate limited)
//!
//! ## Admin
//!
//! Require `Authorization: Bearer <token>` when an admin token is configured.
//!
//! - `GET /api/students`, `GET /api/messages`: list, with optional
//!   `?sort=<created_at|id|status|field>&order=<asc|desc>` (newest first by default)
//! - `GET /api/students/{id}`, `GET /api/messages/{id}`
//! - `PUT /api/students/{id}/status`, `PUT /api/messages/{id}/status`:
//!   body `{"status": "confirmed"}`
//! - `DELETE /api/students/{id}`, `DELETE /api/messages/{id}`
//!
//! ### Submission Response
//!
//! ```json
//! {
//!   "success": true,
//!   "message": "Registration successful",
//!   "id": "STU0001",
//!   "record": { "id": "STU0001", "status": "pending", "created_at": "...", "email": "..." }
//! }
//! ```
//!
//! Errors use the body described in [`crate::types`].

use super::Transport;
use crate::metrics::{Metrics, Outcome};
use crate::types::{
    ApiError, CreatedResponse, HealthResponse, ListParams, StatusUpdate, UpdatedResponse,
};
use anyhow::Context;
use async_trait::async_trait;
use axum::extract::rejection::JsonRejection;
use axum::extract::{ConnectInfo, FromRequestParts, Path, Query, Request, State};
use axum::http::request::Parts;
use axum::http::{StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use campstore::{
    Fields, Patch, Record, Registry, SlidingWindowLimiter, SortKey, SortOrder, ValidationError,
    validate,
};
use serde_json::Value;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

pub const APPLICANTS: &str = "applicants";
pub const MESSAGES: &str = "messages";

/// HTTP transport implementation
pub struct HttpTransport {
    addr: SocketAddr,
}

impl HttpTransport {
    pub fn new(host: &str, port: u16) -> anyhow::Result<Self> {
        let addr = format!("{host}:{port}")
            .parse()
            .with_context(|| format!("invalid listen address {host}:{port}"))?;
        Ok(Self { addr })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn start(self, state: Arc<AppState>) -> anyhow::Result<()> {
        let app = router(state);

        tracing::info!("HTTP server listening on {}", self.addr);

        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

/// State shared by every request
pub struct AppState {
    pub registry: Registry,
    pub limiter: SlidingWindowLimiter,
    pub metrics: Metrics,
    admin_token: Option<String>,
    trust_forwarded_for: bool,
}

impl AppState {
    pub fn new(registry: Registry, limiter: SlidingWindowLimiter) -> Self {
        AppState {
            registry,
            limiter,
            metrics: Metrics::new(),
            admin_token: None,
            trust_forwarded_for: false,
        }
    }

    /// Require this bearer token on admin routes
    pub fn admin_token(mut self, token: Option<String>) -> Self {
        self.admin_token = token;
        self
    }

    /// Key clients by the first `X-Forwarded-For` entry instead of the peer address
    pub fn trust_forwarded_for(mut self, trust: bool) -> Self {
        self.trust_forwarded_for = trust;
        self
    }
}

/// Build the application router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/metrics", get(metrics))
        .route("/api/students", post(create_student).get(list_students))
        .route("/api/students/{id}", get(get_student).delete(delete_student))
        .route("/api/students/{id}/status", put(update_student_status))
        .route("/api/contact", post(create_message))
        .route("/api/messages", get(list_messages))
        .route("/api/messages/{id}", get(get_message).delete(delete_message))
        .route("/api/messages/{id}/status", put(update_message_status))
        .layer(middleware::from_fn_with_state(state.clone(), track_metrics))
        .with_state(state)
}

/// Rate-limit key of the calling client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientKey(pub String);

impl FromRequestParts<Arc<AppState>> for ClientKey {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        if state.trust_forwarded_for {
            let forwarded = parts
                .headers
                .get("x-forwarded-for")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
                .map(str::trim)
                .filter(|v| !v.is_empty());
            if let Some(client) = forwarded {
                return Ok(ClientKey(client.to_string()));
            }
        }

        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string());
        Ok(ClientKey(peer))
    }
}

/// Proof that the request carries the admin token, if one is configured
pub struct Admin;

impl FromRequestParts<Arc<AppState>> for Admin {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let Some(expected) = &state.admin_token else {
            return Ok(Admin);
        };

        let provided = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));

        match provided {
            Some(token) if constant_time_eq(token.trim().as_bytes(), expected.as_bytes()) => {
                Ok(Admin)
            }
            Some(_) => {
                tracing::warn!(path = %parts.uri.path(), "Invalid admin token provided");
                Err(ApiError::Unauthorized)
            }
            None => {
                tracing::debug!(path = %parts.uri.path(), "No admin token in Authorization header");
                Err(ApiError::Unauthorized)
            }
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

async fn track_metrics(State(state): State<Arc<AppState>>, request: Request, next: Next) -> Response {
    let start = Instant::now();
    let response = next.run(request).await;
    let latency_us = start.elapsed().as_micros() as u64;
    state
        .metrics
        .record_request(Outcome::from_status(response.status().as_u16()), latency_us);
    response
}

/// Run a store operation on the blocking pool
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> campstore::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(ApiError::from)
}

fn admit(state: &AppState, client: &ClientKey) -> Result<(), ApiError> {
    let decision = state.limiter.check(&client.0);
    if decision.allowed {
        return Ok(());
    }

    tracing::info!(client = %client.0, "Submission rate limited");
    Err(ApiError::RateLimited {
        retry_after: (decision.retry_after.as_secs_f64().ceil() as u64).max(1),
    })
}

fn form_fields(body: Result<Json<Value>, JsonRejection>) -> Result<Fields, ApiError> {
    match body {
        Ok(Json(Value::Object(fields))) => Ok(fields),
        Ok(Json(_)) => Err(ApiError::BadRequest("expected a JSON object".to_string())),
        Err(rejection) => Err(ApiError::BadRequest(rejection.body_text())),
    }
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        message: "campstore is running".to_string(),
    })
}

async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.metrics.update_active_keys(state.limiter.active_keys());
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.export_prometheus(),
    )
}

async fn submit(
    state: Arc<AppState>,
    client: ClientKey,
    body: Result<Json<Value>, JsonRejection>,
    collection: &'static str,
    validator: fn(&Fields) -> Result<Fields, ValidationError>,
    message: &'static str,
) -> Result<(StatusCode, Json<CreatedResponse>), ApiError> {
    admit(&state, &client)?;

    let fields = validator(&form_fields(body)?)?;
    let record = {
        let state = Arc::clone(&state);
        blocking(move || state.registry.create(collection, fields)).await?
    };

    tracing::info!(collection, id = %record.id, client = %client.0, "Submission stored");
    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            success: true,
            message: message.to_string(),
            id: record.id.clone(),
            record,
        }),
    ))
}

async fn list_records(
    state: Arc<AppState>,
    collection: &'static str,
    params: ListParams,
) -> Result<Json<Vec<Record>>, ApiError> {
    let key: SortKey = params
        .sort
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().unwrap_or_default())
        .unwrap_or_default();
    let order = params
        .order
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(str::parse::<SortOrder>)
        .transpose()
        .map_err(ApiError::BadRequest)?
        .unwrap_or_default();

    let records = blocking(move || state.registry.list_by(collection, &key, order)).await?;
    Ok(Json(records))
}

async fn get_record(
    state: Arc<AppState>,
    collection: &'static str,
    id: String,
) -> Result<Json<Record>, ApiError> {
    let record = blocking(move || state.registry.get(collection, &id)).await?;
    Ok(Json(record))
}

async fn update_status(
    state: Arc<AppState>,
    collection: &'static str,
    id: String,
    body: Result<Json<StatusUpdate>, JsonRejection>,
) -> Result<Json<UpdatedResponse>, ApiError> {
    let Json(update) = body.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    let status = update
        .status
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ValidationError::Missing("status".to_string()))?;

    let record =
        blocking(move || state.registry.update(collection, &id, Patch::status(status))).await?;

    tracing::info!(collection, id = %record.id, status = %record.status, "Status updated");
    Ok(Json(UpdatedResponse {
        success: true,
        message: format!("Status updated to {}", record.status),
        record,
    }))
}

async fn delete_record(
    state: Arc<AppState>,
    collection: &'static str,
    id: String,
) -> Result<StatusCode, ApiError> {
    let deleted = id.clone();
    blocking(move || state.registry.delete(collection, &id)).await?;

    tracing::info!(collection, id = %deleted, "Record deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn create_student(
    State(state): State<Arc<AppState>>,
    client: ClientKey,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<CreatedResponse>), ApiError> {
    submit(
        state,
        client,
        body,
        APPLICANTS,
        validate::validate_applicant,
        "Registration successful",
    )
    .await
}

async fn list_students(
    State(state): State<Arc<AppState>>,
    _admin: Admin,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Record>>, ApiError> {
    list_records(state, APPLICANTS, params).await
}

async fn get_student(
    State(state): State<Arc<AppState>>,
    _admin: Admin,
    Path(id): Path<String>,
) -> Result<Json<Record>, ApiError> {
    get_record(state, APPLICANTS, id).await
}

async fn update_student_status(
    State(state): State<Arc<AppState>>,
    _admin: Admin,
    Path(id): Path<String>,
    body: Result<Json<StatusUpdate>, JsonRejection>,
) -> Result<Json<UpdatedResponse>, ApiError> {
    update_status(state, APPLICANTS, id, body).await
}

async fn delete_student(
    State(state): State<Arc<AppState>>,
    _admin: Admin,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    delete_record(state, APPLICANTS, id).await
}

async fn create_message(
    State(state): State<Arc<AppState>>,
    client: ClientKey,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<CreatedResponse>), ApiError> {
    submit(
        state,
        client,
        body,
        MESSAGES,
        validate::validate_message,
        "Message sent",
    )
    .await
}

async fn list_messages(
    State(state): State<Arc<AppState>>,
    _admin: Admin,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Record>>, ApiError> {
    list_records(state, MESSAGES, params).await
}

async fn get_message(
    State(state): State<Arc<AppState>>,
    _admin: Admin,
    Path(id): Path<String>,
) -> Result<Json<Record>, ApiError> {
    get_record(state, MESSAGES, id).await
}

async fn update_message_status(
    State(state): State<Arc<AppState>>,
    _admin: Admin,
    Path(id): Path<String>,
    body: Result<Json<StatusUpdate>, JsonRejection>,
) -> Result<Json<UpdatedResponse>, ApiError> {
    update_status(state, MESSAGES, id, body).await
}

async fn delete_message(
    State(state): State<Arc<AppState>>,
    _admin: Admin,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    delete_record(state, MESSAGES, id).await
}
