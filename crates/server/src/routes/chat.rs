//! Storefront chat widget: start a conversation, exchange messages, and
//! follow the conversation over a WebSocket.

use axum::{
    Json,
    extract::{
        Path, Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::instrument;
use uuid::Uuid;

use spareline_core::{ChatConversationId, Email};

use crate::db::UserRepository;
use crate::error::AppError;
use crate::middleware::OptionalAuth;
use crate::models::CurrentUser;
use crate::models::chat::{ChatConversation, ChatEvent, ChatMessage, StartedConversation};
use crate::services::chat::{ChatAccess, ChatService};
use crate::state::AppState;

const MAX_VISITOR_NAME_LENGTH: usize = 100;

#[derive(Debug, Deserialize)]
pub struct StartConversationRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct PostMessageRequest {
    pub body: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct VisitorQuery {
    pub token: Option<Uuid>,
}

/// A token wins over the session so guests who later sign in keep access.
fn visitor_access(
    current: Option<&CurrentUser>,
    token: Option<Uuid>,
) -> Result<ChatAccess, AppError> {
    match (token, current) {
        (Some(token), _) => Ok(ChatAccess::Token(token)),
        (None, Some(user)) => Ok(ChatAccess::Owner(user.id)),
        (None, None) => Err(AppError::NotFound("conversation not found".to_owned())),
    }
}

fn guest_identity(req: &StartConversationRequest) -> Result<(String, Option<String>), AppError> {
    let name = req.name.as_deref().map(str::trim).unwrap_or_default();
    if name.is_empty() {
        return Err(AppError::BadRequest("name is required".to_owned()));
    }
    if name.chars().count() > MAX_VISITOR_NAME_LENGTH {
        return Err(AppError::BadRequest(format!(
            "name must be at most {MAX_VISITOR_NAME_LENGTH} characters"
        )));
    }
    let email = match req.email.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
        Some(raw) => Some(
            Email::parse(raw)
                .map_err(|e| AppError::BadRequest(e.to_string()))?
                .into_inner(),
        ),
        None => None,
    };
    Ok((name.to_owned(), email))
}

/// POST /api/chat/conversations
#[instrument(skip_all)]
pub async fn start(
    State(state): State<AppState>,
    OptionalAuth(current): OptionalAuth,
    Json(req): Json<StartConversationRequest>,
) -> Result<(StatusCode, Json<StartedConversation>), AppError> {
    let user = match &current {
        Some(current) => UserRepository::new(state.pool()).get_by_id(current.id).await?,
        None => None,
    };
    let (name, email) = match &user {
        Some(user) => (user.display_name(), Some(user.email.as_str().to_owned())),
        None => guest_identity(&req)?,
    };

    let (conversation, message) = ChatService::new(state.pool(), state.chat())
        .start(user.as_ref().map(|u| u.id), &name, email.as_deref(), &req.message)
        .await?;

    let visitor_token = conversation.visitor_token;
    Ok((
        StatusCode::CREATED,
        Json(StartedConversation {
            conversation,
            visitor_token,
            messages: vec![message],
        }),
    ))
}

async fn authorize(
    state: &AppState,
    id: ChatConversationId,
    current: Option<&CurrentUser>,
    token: Option<Uuid>,
) -> Result<(ChatConversation, ChatAccess), AppError> {
    let access = visitor_access(current, token)?;
    let conversation = ChatService::new(state.pool(), state.chat())
        .authorize(id, access)
        .await?;
    Ok((conversation, access))
}

/// GET /api/chat/conversations/{id}/messages
pub async fn messages(
    State(state): State<AppState>,
    OptionalAuth(current): OptionalAuth,
    Path(id): Path<ChatConversationId>,
    Query(query): Query<VisitorQuery>,
) -> Result<Json<Vec<ChatMessage>>, AppError> {
    let (conversation, _) = authorize(&state, id, current.as_ref(), query.token).await?;
    let messages = ChatService::new(state.pool(), state.chat())
        .messages(conversation.id)
        .await?;
    Ok(Json(messages))
}

/// POST /api/chat/conversations/{id}/messages
pub async fn post_message(
    State(state): State<AppState>,
    OptionalAuth(current): OptionalAuth,
    Path(id): Path<ChatConversationId>,
    Query(query): Query<VisitorQuery>,
    Json(req): Json<PostMessageRequest>,
) -> Result<(StatusCode, Json<ChatMessage>), AppError> {
    let (conversation, access) = authorize(&state, id, current.as_ref(), query.token).await?;
    let message = ChatService::new(state.pool(), state.chat())
        .post(&conversation, access, &req.body)
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// GET /api/chat/conversations/{id}/ws
///
/// Access is checked before the upgrade so rejected sockets get a plain
/// HTTP error.
pub async fn socket(
    State(state): State<AppState>,
    OptionalAuth(current): OptionalAuth,
    Path(id): Path<ChatConversationId>,
    Query(query): Query<VisitorQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, AppError> {
    let (conversation, access) = authorize(&state, id, current.as_ref(), query.token).await?;
    let events = state.chat().subscribe_room(conversation.id);
    let hub = state.chat().clone();
    let sender = SocketSender {
        state,
        conversation,
        access,
    };
    Ok(ws.on_upgrade(move |socket| async move {
        run_socket(socket, events, Some(sender)).await;
        hub.prune_idle();
    }))
}

/// Posts client text frames into one conversation.
pub(crate) struct SocketSender {
    pub state: AppState,
    pub conversation: ChatConversation,
    pub access: ChatAccess,
}

impl SocketSender {
    async fn post(&self, body: &str) -> Result<ChatMessage, AppError> {
        ChatService::new(self.state.pool(), self.state.chat())
            .post(&self.conversation, self.access, body)
            .await
    }
}

/// Forward broadcast events to the socket until either side hangs up.
///
/// Without a `sender`, client text frames are ignored.
pub(crate) async fn run_socket(
    socket: WebSocket,
    mut events: broadcast::Receiver<ChatEvent>,
    sender: Option<SocketSender>,
) {
    let (mut outgoing, mut incoming) = socket.split();
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    let Ok(json) = serde_json::to_string(&event) else {
                        continue;
                    };
                    if outgoing.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Chat socket lagged behind");
                }
                Err(RecvError::Closed) => break,
            },
            frame = incoming.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    let Some(sender) = &sender else {
                        continue;
                    };
                    // The posted message comes back through the room.
                    if let Err(err) = sender.post(text.as_str()).await {
                        let reply = serde_json::json!({
                            "type": "error",
                            "error": err.public_message(),
                        });
                        if outgoing.send(Message::Text(reply.to_string().into())).await.is_err() {
                            break;
                        }
                    }
                }
                Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use spareline_core::{UserId, UserRole};

    use super::*;

    fn customer() -> CurrentUser {
        CurrentUser {
            id: UserId::new(9),
            email: Email::parse("ana@example.com").unwrap(),
            role: UserRole::Customer,
        }
    }

    #[test]
    fn test_token_takes_precedence_over_session() {
        let token = Uuid::new_v4();
        let user = customer();
        assert!(matches!(
            visitor_access(Some(&user), Some(token)).unwrap(),
            ChatAccess::Token(t) if t == token
        ));
        assert!(matches!(
            visitor_access(Some(&user), None).unwrap(),
            ChatAccess::Owner(id) if id == user.id
        ));
        assert_eq!(
            visitor_access(None, None).unwrap_err().status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_guest_identity() {
        let req = StartConversationRequest {
            name: Some("  Ana ".to_owned()),
            email: Some(" ".to_owned()),
            message: "Hi".to_owned(),
        };
        assert_eq!(guest_identity(&req).unwrap(), ("Ana".to_owned(), None));

        let nameless = StartConversationRequest {
            name: None,
            email: None,
            message: "Hi".to_owned(),
        };
        assert!(guest_identity(&nameless).is_err());

        let bad_email = StartConversationRequest {
            name: Some("Ana".to_owned()),
            email: Some("not-an-email".to_owned()),
            message: "Hi".to_owned(),
        };
        assert_eq!(
            guest_identity(&bad_email).unwrap_err().status(),
            StatusCode::BAD_REQUEST
        );
    }
}
