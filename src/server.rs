//! HTTP front door
//!
//! | Method | Path      | Description                                   |
//! |--------|-----------|-----------------------------------------------|
//! | `POST` | `/chat`   | `{"message": "..."}` → `{"response": "..."}`  |
//! | `POST` | `/index`  | Reconcile the notes directory, returns report |
//! | `GET`  | `/health` | Health check (returns version)                |
//!
//! Errors are `{"error": {"code", "message"}}`. Empty or otherwise invalid
//! requests are 400, everything else that fails is 500.

use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::indexer::IndexReport;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

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
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        if err.is_client_error() {
            AppError {
                status: StatusCode::BAD_REQUEST,
                code: "bad_request".to_string(),
                message: err.to_string(),
            }
        } else {
            error!("Request failed: {}", err);
            AppError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                code: "internal_error".to_string(),
                message: err.to_string(),
            }
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/chat", post(handle_chat))
        .route("/index", post(handle_index))
        .route("/health", get(handle_health))
        .with_state(state)
}

/// Bind `addr` and serve until Ctrl-C
pub async fn serve(engine: Arc<Engine>, addr: &str) -> Result<()> {
    let app = router(AppState { engine });

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;

    Ok(())
}

async fn handle_chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> std::result::Result<Json<ChatResponse>, AppError> {
    let outcome = state.engine.ask(&request.message).await?;
    Ok(Json(ChatResponse {
        response: outcome.into_response(),
    }))
}

async fn handle_index(
    State(state): State<AppState>,
) -> std::result::Result<Json<IndexReport>, AppError> {
    let report = state.engine.indexer().run().await?;
    Ok(Json(report))
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
