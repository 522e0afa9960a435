use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use tracing::{error, info};

use super::server::AppState;
use super::types::{
    ChatResponse, CreateConversationResponse, DeleteResponse, ErrorResponse, HealthResponse,
    ListConversationsResponse, MessagesResponse, SendMessageRequest,
};
use crate::chat::service::MessageOverrides;

/// Reports service liveness and whether a model is ready to generate.
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        model_loaded: state.manager.is_model_loaded(),
    })
}

/// Creates a new empty conversation.
pub async fn create_conversation(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.chat.store().create_conversation() {
        Ok(conversation_id) => (
            StatusCode::OK,
            Json(CreateConversationResponse {
                success: true,
                conversation_id,
            }),
        )
            .into_response(),
        Err(e) => {
            error!("Error creating conversation: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(e.to_string())),
            )
                .into_response()
        }
    }
}

/// Lists the ids of all stored conversations.
pub async fn list_conversations(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(ListConversationsResponse {
        success: true,
        conversations: state.chat.store().list_conversations(),
    })
}

/// Deletes a conversation. Missing conversations report `success: false`
/// rather than an error, matching the store contract.
pub async fn delete_conversation(
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<String>,
) -> impl IntoResponse {
    let success = state.chat.store().delete_conversation(&conversation_id);
    Json(DeleteResponse { success })
}

/// Returns the full message history of a conversation.
pub async fn get_messages(
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<String>,
) -> impl IntoResponse {
    Json(MessagesResponse {
        success: true,
        messages: state.chat.store().get_messages(&conversation_id, None),
    })
}

/// Accepts one user message and replies with the generated assistant turn.
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<String>,
    Json(request): Json<SendMessageRequest>,
) -> impl IntoResponse {
    let message = request.message.trim();
    if message.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("Message cannot be empty")),
        )
            .into_response();
    }

    info!("Processing message for conversation {}", conversation_id);

    let overrides = MessageOverrides {
        temperature: request.temperature,
        max_length: request.max_length,
    };

    match state
        .chat
        .process_message(&conversation_id, message, overrides)
        .await
    {
        Ok(reply) => (
            StatusCode::OK,
            Json(ChatResponse {
                success: true,
                response: reply.response,
                conversation_id: reply.conversation_id,
                metadata: reply.metadata,
            }),
        )
            .into_response(),
        Err(e) => {
            error!("Error processing message: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(e.to_string())),
            )
                .into_response()
        }
    }
}
