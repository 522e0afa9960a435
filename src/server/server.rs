use std::error::Error;
use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Router,
};
use tokio::net::TcpListener;
use tracing::info;

use super::routes;
use crate::chat::service::ChatService;
use crate::llm::ModelManager;

/// Shared handler state: the chat service plus direct access to the model
/// manager for the health surface.
pub struct AppState {
    pub chat: ChatService,
    pub manager: Arc<ModelManager>,
}

/// HTTP server exposing the chat backend.
pub struct ApiServer {
    state: Arc<AppState>,
    host: String,
    port: u16,
}

impl ApiServer {
    pub fn new(state: AppState, host: String, port: u16) -> Self {
        info!("Creating new API server on {}:{}", host, port);
        Self {
            state: Arc::new(state),
            host,
            port,
        }
    }

    pub async fn start(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let app = Router::new()
            .route("/api/health", get(routes::health))
            .route(
                "/api/conversations",
                post(routes::create_conversation).get(routes::list_conversations),
            )
            .route(
                "/api/conversations/{id}",
                delete(routes::delete_conversation),
            )
            .route(
                "/api/conversations/{id}/messages",
                post(routes::send_message).get(routes::get_messages),
            )
            .with_state(Arc::clone(&self.state));

        info!("Starting server on {}:{}", self.host, self.port);
        let listener = TcpListener::bind((self.host.as_str(), self.port)).await?;

        info!("Server started successfully");
        axum::serve(listener, app).await?;
        Ok(())
    }
}
