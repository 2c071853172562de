//! HTTP surface for the chat orchestrator
//!
//! A thin axum wrapper over [`Orchestrator`]: one route in, one route shape
//! out. Callers distinguish failure only by the presence of the `error`
//! field, not by taxonomy.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use toolbridge_core::{Orchestrator, TurnRequest, TurnResponse};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        format!("{}:{}", self.host, self.port)
            .parse()
            .unwrap_or_else(|_| SocketAddr::from(([127, 0, 0, 1], self.port)))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

/// Uniform failure body
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Wrapper mapping every core failure to the uniform error response
struct AppError(toolbridge_core::Error);

impl From<toolbridge_core::Error> for AppError {
    fn from(error: toolbridge_core::Error) -> Self {
        Self(error)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        tracing::error!("turn failed: {}", self.0);
        let body = Json(ErrorBody {
            error: self.0.to_string(),
        });
        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }
}

/// Build the router for the chat surface
pub fn router(orchestrator: Arc<Orchestrator>) -> Router {
    Router::new()
        .route("/api/chat", post(chat_turn))
        .with_state(orchestrator)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

async fn chat_turn(
    State(orchestrator): State<Arc<Orchestrator>>,
    Json(request): Json<TurnRequest>,
) -> Result<Json<TurnResponse>, AppError> {
    let response = orchestrator.run_turn(request).await?;
    Ok(Json(response))
}

/// Bind and serve until the process exits
pub async fn serve(config: ServerConfig, orchestrator: Arc<Orchestrator>) -> anyhow::Result<()> {
    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("chat surface listening on http://{}", addr);

    axum::serve(listener, router(orchestrator)).await?;
    Ok(())
}
