//! `BridgeServer`: axum HTTP + `WebSocket` server around one [`Broker`].

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::response::{Html, IntoResponse, Json, Response};
use axum::routing::get;
use mmbridge_broker::Broker;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::ServerConfig;
use crate::errors::ServerError;
use crate::expiry;
use crate::health::{self, HealthResponse};
use crate::shutdown::ShutdownCoordinator;
use crate::signer_page::SIGNER_PAGE;
use crate::websocket::handler::{Liveness, serve_connection};

/// Shared state accessible from axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Request broker.
    pub broker: Arc<Broker>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
    /// Heartbeat timing for new connections.
    pub liveness: Liveness,
    /// Max inbound message size in bytes.
    pub max_message_size: usize,
}

/// The bridge server.
pub struct BridgeServer {
    config: ServerConfig,
    broker: Arc<Broker>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
}

impl BridgeServer {
    /// Create a server with an empty broker.
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            broker: Arc::new(Broker::new()),
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
        }
    }

    /// Build the axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            broker: self.broker.clone(),
            shutdown: self.shutdown.clone(),
            start_time: self.start_time,
            liveness: Liveness {
                interval: self.config.heartbeat_interval(),
                timeout: self.config.heartbeat_timeout(),
            },
            max_message_size: self.config.max_message_size,
        };

        Router::new()
            .route("/", get(root_handler))
            .route("/ws", get(root_handler))
            .route("/health", get(health_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// Bind and start serving in the background.
    ///
    /// Returns the bound address and the serve task. A serve failure after
    /// startup is logged and fires the shutdown token.
    pub async fn listen(&self) -> Result<(SocketAddr, JoinHandle<()>), ServerError> {
        let addr = self.config.bind_addr()?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = listener.local_addr()?;

        let sweeper = self.config.pending_request_ttl().map(|ttl| {
            info!(ttl_secs = ttl.as_secs(), "request expiry enabled");
            expiry::spawn_expiry_task(self.broker.clone(), ttl, self.shutdown.token())
        });

        let router = self.router();
        let shutdown = self.shutdown.clone();
        let token = self.shutdown.token();
        let handle = tokio::spawn(async move {
            let served = axum::serve(listener, router)
                .with_graceful_shutdown(token.cancelled_owned())
                .await;
            if let Err(e) = served {
                error!(error = %e, "server stopped unexpectedly");
                shutdown.shutdown();
            }
            if let Some(sweeper) = sweeper {
                let _ = sweeper.await;
            }
        });

        info!(%local_addr, "bridge listening");
        Ok((local_addr, handle))
    }

    /// Stop accepting, close every connection, and discard queued and
    /// outstanding requests.
    pub fn stop(&self) {
        self.shutdown.shutdown();
        self.broker.reset();
        info!("bridge stopped");
    }

    /// Get the broker.
    pub fn broker(&self) -> &Arc<Broker> {
        &self.broker
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// GET / and /ws: a bridge connection when upgrading, the signer page otherwise.
async fn root_handler(
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    State(state): State<AppState>,
) -> Response {
    let Ok(ws) = upgrade else {
        return Html(SIGNER_PAGE).into_response();
    };
    let broker = state.broker.clone();
    let closer = state.shutdown.child_token();
    let liveness = state.liveness;
    ws.max_message_size(state.max_message_size)
        .on_upgrade(move |socket| serve_connection(socket, broker, liveness, closer))
        .into_response()
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(state.start_time, state.broker.stats()))
}
