//! HTTP API endpoint handlers.
//!
//! Introspection endpoints for diagnostics, plus the typing-state read path
//! a fresh page load uses without an active WebSocket connection. None of
//! these are security-sensitive.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;

use shoudan_shared::time::timestamp_to_rfc3339;

use crate::{
    domain::{ConnectionRegistry, ConversationId, MembershipIndex, UserId},
    ui::state::AppState,
};

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Get identities with a live connection
pub async fn get_connections(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let users: Vec<String> = state
        .registry
        .connected_users()
        .await
        .into_iter()
        .map(UserId::into_string)
        .collect();

    Json(serde_json::json!({ "connections": users }))
}

/// Get the identities currently present in a conversation's room
pub async fn get_conversation_members(
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<String>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let conversation_id =
        ConversationId::try_from(conversation_id).map_err(|_| StatusCode::BAD_REQUEST)?;

    let members: Vec<String> = state
        .membership
        .members_of(&conversation_id)
        .await
        .into_iter()
        .map(UserId::into_string)
        .collect();

    Ok(Json(serde_json::json!({
        "conversationId": conversation_id.as_str(),
        "members": members,
    })))
}

/// Query parameters for the typing-state read path
#[derive(Debug, Deserialize)]
pub struct TypingQuery {
    /// Identity to exclude from the result (normally the requester)
    #[serde(default)]
    pub exclude: Option<String>,
}

/// Get who is currently typing in a conversation
///
/// Served from the durable mirror so it works without an active WebSocket
/// connection; only records active within the freshness window are returned.
pub async fn get_typing_users(
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<String>,
    Query(query): Query<TypingQuery>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let conversation_id =
        ConversationId::try_from(conversation_id).map_err(|_| StatusCode::BAD_REQUEST)?;
    let exclude = match query.exclude {
        Some(raw) => Some(UserId::try_from(raw).map_err(|_| StatusCode::BAD_REQUEST)?),
        None => None,
    };

    let records = state
        .set_typing_usecase
        .typing_users(&conversation_id, exclude.as_ref())
        .await
        .map_err(|e| {
            tracing::error!("Failed to read typing state: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    let typing_users: Vec<serde_json::Value> = records
        .into_iter()
        .map(|record| {
            serde_json::json!({
                "userId": record.user_id.as_str(),
                "isTyping": record.is_typing,
                "lastActivity": timestamp_to_rfc3339(record.last_activity.value()),
            })
        })
        .collect();

    Ok(Json(serde_json::json!({
        "conversationId": conversation_id.as_str(),
        "typingUsers": typing_users,
    })))
}
