//! Live-chat models and the events pushed over WebSockets.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use spareline_core::{ChatConversationId, ChatMessageId, ChatSender, ChatStatus, UserId};

/// Maximum characters in one chat message.
pub const MAX_MESSAGE_LENGTH: usize = 4000;

/// A support conversation started from the storefront widget.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ChatConversation {
    pub id: ChatConversationId,
    pub user_id: Option<UserId>,
    pub visitor_name: String,
    pub visitor_email: Option<String>,
    /// Grants a guest access to this conversation only.
    #[serde(skip)]
    pub visitor_token: Uuid,
    pub status: ChatStatus,
    pub assigned_to: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

/// Conversation plus the guest token, returned once at creation.
#[derive(Debug, Clone, Serialize)]
pub struct StartedConversation {
    #[serde(flatten)]
    pub conversation: ChatConversation,
    pub visitor_token: Uuid,
    pub messages: Vec<ChatMessage>,
}

/// A single message in a conversation.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ChatMessage {
    pub id: ChatMessageId,
    pub conversation_id: ChatConversationId,
    pub sender: ChatSender,
    pub sender_user_id: Option<UserId>,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Event broadcast to conversation rooms and the agent feed.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    ConversationStarted {
        conversation: ChatConversation,
    },
    Message {
        message: ChatMessage,
    },
    Status {
        conversation_id: ChatConversationId,
        status: ChatStatus,
    },
}

impl ChatEvent {
    /// Conversation the event belongs to.
    #[must_use]
    pub const fn conversation_id(&self) -> ChatConversationId {
        match self {
            Self::ConversationStarted { conversation } => conversation.id,
            Self::Message { message } => message.conversation_id,
            Self::Status {
                conversation_id, ..
            } => *conversation_id,
        }
    }
}

/// Trim a message body and enforce length limits.
///
/// # Errors
///
/// Returns a message when the body is blank or too long.
pub fn clean_message_body(body: &str) -> Result<String, String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Err("message cannot be empty".to_owned());
    }
    if trimmed.chars().count() > MAX_MESSAGE_LENGTH {
        return Err(format!(
            "message must be at most {MAX_MESSAGE_LENGTH} characters"
        ));
    }
    Ok(trimmed.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_message_body() {
        assert_eq!(clean_message_body("  hi there \n").as_deref(), Ok("hi there"));
        assert!(clean_message_body("   ").is_err());
        assert!(clean_message_body(&"x".repeat(MAX_MESSAGE_LENGTH + 1)).is_err());
        assert!(clean_message_body(&"x".repeat(MAX_MESSAGE_LENGTH)).is_ok());
    }

    #[test]
    fn test_event_json_is_tagged() {
        let event = ChatEvent::Status {
            conversation_id: ChatConversationId::new(5),
            status: ChatStatus::Resolved,
        };
        let json = serde_json::to_value(&event).unwrap_or_default();
        assert_eq!(json["type"], "status");
        assert_eq!(json["conversation_id"], 5);
        assert_eq!(json["status"], "resolved");
        assert_eq!(event.conversation_id(), ChatConversationId::new(5));
    }
}
