//! Server execution logic.

use std::sync::Arc;

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::config::HubConfig;
use crate::usecase::ReapStaleConnectionsUseCase;

use super::{
    handler::{
        get_connections, get_conversation_members, get_typing_users, health_check,
        websocket_handler,
    },
    signal::shutdown_signal,
    state::AppState,
    sweeper::{spawn_liveness_sweeper, spawn_typing_sweeper},
};

/// Conversation hub server
///
/// This struct encapsulates the wired-up application state and provides
/// methods to run the server.
///
/// # Example
///
/// ```ignore
/// let server = Server::new(app_state, reap_usecase, HubConfig::default());
/// server.run("127.0.0.1".to_string(), 8080).await?;
/// ```
pub struct Server {
    /// Shared application state（ハンドラが使う usecase 一式）
    state: Arc<AppState>,
    /// ReapStaleConnectionsUseCase（生存監視のユースケース）
    reap_usecase: Arc<ReapStaleConnectionsUseCase>,
    /// Hub のタイミング設定
    config: HubConfig,
}

impl Server {
    /// Create a new Server instance
    pub fn new(
        state: Arc<AppState>,
        reap_usecase: Arc<ReapStaleConnectionsUseCase>,
        config: HubConfig,
    ) -> Self {
        Self {
            state,
            reap_usecase,
            config,
        }
    }

    /// Run the conversation hub server
    ///
    /// # Arguments
    ///
    /// * `host` - The host address to bind to (e.g., "127.0.0.1")
    /// * `port` - The port number to bind to (e.g., 8080)
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind to the specified address
    /// or if there's an error during server execution.
    pub async fn run(self, host: String, port: u16) -> Result<(), Box<dyn std::error::Error>> {
        // Start the two periodic sweeps. They are independently scheduled so
        // a stall in one never delays the other; both die with the process.
        let liveness_sweeper = spawn_liveness_sweeper(
            self.reap_usecase.clone(),
            self.config.sweep_interval,
            self.config.heartbeat_timeout,
        );
        let typing_sweeper = spawn_typing_sweeper(
            self.state.set_typing_usecase.clone(),
            self.config.sweep_interval,
        );

        // Define handlers
        let app = Router::new()
            // WebSocket エンドポイント
            .route("/ws/chat", get(websocket_handler))
            // HTTP エンドポイント（診断・読み取りパス）
            .route("/api/health", get(health_check))
            .route("/api/connections", get(get_connections))
            .route(
                "/api/conversations/{conversation_id}/members",
                get(get_conversation_members),
            )
            .route(
                "/api/conversations/{conversation_id}/typing",
                get(get_typing_users),
            )
            .layer(TraceLayer::new_for_http())
            .with_state(self.state);

        // Bind the server to the host and port
        let bind_addr = format!("{}:{}", host, port);
        let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

        // Start the server
        tracing::info!(
            "Conversation hub listening on {}",
            listener.local_addr()?
        );
        tracing::info!("Connect to: ws://{}/ws/chat", bind_addr);
        tracing::info!("Press Ctrl+C to shutdown gracefully");

        // Set up graceful shutdown signal handler
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        liveness_sweeper.abort();
        typing_sweeper.abort();
        tracing::info!("Server shutdown complete");

        Ok(())
    }
}
