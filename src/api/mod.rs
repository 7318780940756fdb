//! HTTP server for the murmur gateway

pub mod websocket;

use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::PipelineConfig;
use crate::models::Models;
use crate::pipeline::{ResponseGenerator, TurnController};
use crate::Result;

/// Shared state for API handlers
#[derive(Debug, Clone)]
pub struct ApiState {
    /// Detection and pacing parameters for every connection
    pub config: Arc<PipelineConfig>,
    /// Collaborators loaded at startup
    pub models: Arc<Models>,
    /// Reply table
    pub responder: Arc<ResponseGenerator>,
}

impl ApiState {
    /// Build state with the default reply table
    #[must_use]
    pub fn new(config: PipelineConfig, models: Models) -> Self {
        Self {
            config: Arc::new(config),
            models: Arc::new(models),
            responder: Arc::new(ResponseGenerator::default()),
        }
    }

    /// Replace the reply table
    #[must_use]
    pub fn with_responder(mut self, responder: ResponseGenerator) -> Self {
        self.responder = Arc::new(responder);
        self
    }

    /// Turn controller sharing this state
    #[must_use]
    pub fn turn_controller(&self) -> TurnController {
        TurnController::with_responder(
            Arc::clone(&self.config),
            Arc::clone(&self.models),
            Arc::clone(&self.responder),
        )
    }
}

/// API server
pub struct ApiServer {
    state: Arc<ApiState>,
    host: String,
    port: u16,
}

impl ApiServer {
    /// Create a server for the given state and bind address
    #[must_use]
    pub fn new(state: ApiState, host: impl Into<String>, port: u16) -> Self {
        Self {
            state: Arc::new(state),
            host: host.into(),
            port,
        }
    }

    /// Build the router with all routes
    pub fn router(&self) -> Router {
        let router = Router::new().nest("/ws", websocket::router(self.state.clone()));

        // Browser clients are served from other origins
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        router.layer(cors).layer(TraceLayer::new_for_http())
    }

    /// Run the API server
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        let addr = format!("{}:{}", self.host, self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::Error::Config(format!("failed to bind {addr}: {e}")))?;

        tracing::info!(host = %self.host, port = self.port, "API server listening");
        self.serve(listener).await
    }

    /// Serve on an already-bound listener
    ///
    /// # Errors
    ///
    /// Returns error if the server stops with an IO failure
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        axum::serve(listener, self.router())
            .await
            .map_err(|e| crate::Error::Config(format!("API server error: {e}")))?;

        Ok(())
    }
}
