//! Real-time subscriber API
//!
//! WebSocket endpoint through which viewers receive monitor summaries and
//! room-scoped analytics in real time.
//!
//! ## Architecture
//!
//! - **Axum** web framework with Tower middleware
//! - **Broadcaster** fan-out bridged onto each connection
//! - **Token authentication** once at handshake time
//!
//! ## Endpoints
//!
//! - `WS /socket` - Real-time event stream (join/leave monitor rooms)

#[cfg(feature = "api")]
pub mod websocket;

use std::net::SocketAddr;
#[cfg(feature = "api")]
use std::sync::Arc;

#[cfg(feature = "api")]
use axum::{Router, routing::get};
use tracing::info;

#[cfg(feature = "api")]
use crate::broadcast::Broadcaster;

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Bind address (e.g., "0.0.0.0:8080")
    pub bind_addr: SocketAddr,

    /// Optional handshake authentication token
    pub auth_token: Option<String>,

    /// Enable CORS for browser dashboards
    pub enable_cors: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".parse().unwrap(),
            auth_token: None,
            enable_cors: true,
        }
    }
}

/// Shared state passed to the WebSocket handler
#[cfg(feature = "api")]
#[derive(Clone)]
pub struct ApiState {
    /// Fan-out hub the connections subscribe to
    pub broadcaster: Arc<Broadcaster>,

    /// Expected handshake token; `None` disables authentication
    pub auth_token: Option<String>,
}

/// Spawn the API server
///
/// Starts an Axum server in a background task and returns its local address.
#[cfg(feature = "api")]
pub async fn spawn_api_server(config: ApiConfig, state: ApiState) -> anyhow::Result<SocketAddr> {
    use tower_http::cors::{Any, CorsLayer};
    use tower_http::trace::TraceLayer;

    info!("starting API server on {}", config.bind_addr);

    let mut app = Router::new()
        .route("/socket", get(websocket::websocket_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if config.enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        app = app.layer(cors);
    }

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    let addr = listener.local_addr()?;

    info!("API server listening on {}", addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("API server error: {}", e);
        }
    });

    Ok(addr)
}
