//! Agent inbox: conversations, replies, status changes and the live feed.

use axum::{
    Json, Router,
    extract::{Path, Query, State, ws::WebSocketUpgrade},
    http::StatusCode,
    response::Response,
    routing::{get, post},
};
use serde::Deserialize;
use tracing::instrument;

use spareline_core::{ChatConversationId, ChatStatus, Permission};

use crate::error::AppError;
use crate::middleware::StaffUser;
use crate::models::chat::{ChatConversation, ChatMessage};
use crate::routes::chat::{PostMessageRequest, run_socket};
use crate::services::chat::{ChatAccess, ChatService};
use crate::state::AppState;

/// Build the agent chat router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/chat/conversations", get(list))
        .route("/chat/conversations/{id}/messages", get(messages).post(reply))
        .route("/chat/conversations/{id}/status", post(set_status))
        .route("/chat/ws", get(feed))
}

#[derive(Debug, Deserialize)]
pub struct InboxQuery {
    pub status: Option<ChatStatus>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: ChatStatus,
}

async fn list(
    StaffUser(user): StaffUser,
    State(state): State<AppState>,
    Query(query): Query<InboxQuery>,
) -> Result<Json<Vec<ChatConversation>>, AppError> {
    user.require(Permission::ManageChat)?;
    let conversations = ChatService::new(state.pool(), state.chat())
        .list(query.status)
        .await?;
    Ok(Json(conversations))
}

async fn messages(
    StaffUser(user): StaffUser,
    State(state): State<AppState>,
    Path(id): Path<ChatConversationId>,
) -> Result<Json<Vec<ChatMessage>>, AppError> {
    user.require(Permission::ManageChat)?;
    let chat = ChatService::new(state.pool(), state.chat());
    let conversation = chat.authorize(id, ChatAccess::Agent(user.id)).await?;
    Ok(Json(chat.messages(conversation.id).await?))
}

#[instrument(skip_all, fields(agent_id = %user.id, conversation_id = %id))]
async fn reply(
    StaffUser(user): StaffUser,
    State(state): State<AppState>,
    Path(id): Path<ChatConversationId>,
    Json(req): Json<PostMessageRequest>,
) -> Result<(StatusCode, Json<ChatMessage>), AppError> {
    user.require(Permission::ManageChat)?;
    let access = ChatAccess::Agent(user.id);
    let chat = ChatService::new(state.pool(), state.chat());
    let conversation = chat.authorize(id, access).await?;
    let message = chat.post(&conversation, access, &req.body).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

#[instrument(skip_all, fields(agent_id = %user.id, conversation_id = %id, status = req.status.as_str()))]
async fn set_status(
    StaffUser(user): StaffUser,
    State(state): State<AppState>,
    Path(id): Path<ChatConversationId>,
    Json(req): Json<StatusRequest>,
) -> Result<Json<ChatConversation>, AppError> {
    user.require(Permission::ManageChat)?;
    let conversation = ChatService::new(state.pool(), state.chat())
        .set_status(id, req.status)
        .await?;
    tracing::info!("Conversation status changed");
    Ok(Json(conversation))
}

/// Every chat event, for agent dashboards. Replies go through the HTTP
/// endpoint, so client frames are ignored.
async fn feed(
    StaffUser(user): StaffUser,
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> Result<Response, AppError> {
    user.require(Permission::ManageChat)?;
    let events = state.chat().subscribe_agents();
    tracing::debug!(agent_id = %user.id, "Agent feed connected");
    Ok(ws.on_upgrade(move |socket| run_socket(socket, events, None)))
}
