//! Database operations for live-chat conversations and messages.

use sqlx::PgPool;

use spareline_core::{ChatConversationId, ChatSender, ChatStatus, UserId};

use super::RepositoryError;
use crate::models::chat::{ChatConversation, ChatMessage};

const CONVERSATION_COLUMNS: &str = "id, user_id, visitor_name, visitor_email, visitor_token, \
     status, assigned_to, created_at, updated_at, closed_at";

const MESSAGE_COLUMNS: &str = "id, conversation_id, sender, sender_user_id, body, created_at";

/// A message about to be stored.
#[derive(Debug, Clone, Copy)]
pub struct NewMessage<'a> {
    pub conversation_id: ChatConversationId,
    pub sender: ChatSender,
    pub sender_user_id: Option<UserId>,
    pub body: &'a str,
}

/// Repository for chat database operations.
pub struct ChatRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ChatRepository<'a> {
    /// Create a new chat repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Open a conversation.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn create_conversation(
        &self,
        user_id: Option<UserId>,
        visitor_name: &str,
        visitor_email: Option<&str>,
    ) -> Result<ChatConversation, RepositoryError> {
        let conversation = sqlx::query_as::<_, ChatConversation>(&format!(
            r"
            INSERT INTO shop.chat_conversations (user_id, visitor_name, visitor_email)
            VALUES ($1, $2, $3)
            RETURNING {CONVERSATION_COLUMNS}
            "
        ))
        .bind(user_id)
        .bind(visitor_name)
        .bind(visitor_email)
        .fetch_one(self.pool)
        .await?;
        Ok(conversation)
    }

    /// Get a conversation by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_conversation(
        &self,
        id: ChatConversationId,
    ) -> Result<Option<ChatConversation>, RepositoryError> {
        let conversation = sqlx::query_as::<_, ChatConversation>(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM shop.chat_conversations WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(conversation)
    }

    /// Conversations for the agent inbox, most recently active first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_conversations(
        &self,
        status: Option<ChatStatus>,
    ) -> Result<Vec<ChatConversation>, RepositoryError> {
        let conversations = sqlx::query_as::<_, ChatConversation>(&format!(
            r"
            SELECT {CONVERSATION_COLUMNS} FROM shop.chat_conversations
            WHERE ($1::shop.chat_status IS NULL OR status = $1)
            ORDER BY updated_at DESC
            LIMIT 200
            "
        ))
        .bind(status)
        .fetch_all(self.pool)
        .await?;
        Ok(conversations)
    }

    /// All messages in a conversation, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn messages(&self, id: ChatConversationId) -> Result<Vec<ChatMessage>, RepositoryError> {
        let messages = sqlx::query_as::<_, ChatMessage>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM shop.chat_messages WHERE conversation_id = $1 ORDER BY id"
        ))
        .bind(id)
        .fetch_all(self.pool)
        .await?;
        Ok(messages)
    }

    /// Append a message to an active conversation.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` for an unknown conversation and
    /// `RepositoryError::Conflict` if it is no longer active.
    pub async fn add_message(&self, new: NewMessage<'_>) -> Result<ChatMessage, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let message = sqlx::query_as::<_, ChatMessage>(&format!(
            r"
            INSERT INTO shop.chat_messages (conversation_id, sender, sender_user_id, body)
            SELECT id, $2, $3, $4 FROM shop.chat_conversations
            WHERE id = $1 AND status = 'active'
            RETURNING {MESSAGE_COLUMNS}
            "
        ))
        .bind(new.conversation_id)
        .bind(new.sender)
        .bind(new.sender_user_id)
        .bind(new.body)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(message) = message else {
            let exists: bool = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM shop.chat_conversations WHERE id = $1)",
            )
            .bind(new.conversation_id)
            .fetch_one(&mut *tx)
            .await?;
            return Err(if exists {
                RepositoryError::Conflict("conversation is not active".to_owned())
            } else {
                RepositoryError::NotFound
            });
        };

        sqlx::query("UPDATE shop.chat_conversations SET updated_at = NOW() WHERE id = $1")
            .bind(new.conversation_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(message)
    }

    /// Record a system message regardless of conversation status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn add_system_message(
        &self,
        id: ChatConversationId,
        body: &str,
    ) -> Result<ChatMessage, RepositoryError> {
        let message = sqlx::query_as::<_, ChatMessage>(&format!(
            r"
            INSERT INTO shop.chat_messages (conversation_id, sender, body)
            VALUES ($1, 'system', $2)
            RETURNING {MESSAGE_COLUMNS}
            "
        ))
        .bind(id)
        .bind(body)
        .fetch_one(self.pool)
        .await?;
        Ok(message)
    }

    /// Assign an agent if nobody owns the conversation yet.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn assign_if_unassigned(
        &self,
        id: ChatConversationId,
        agent: UserId,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE shop.chat_conversations SET assigned_to = $2 WHERE id = $1 AND assigned_to IS NULL",
        )
        .bind(id)
        .bind(agent)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Change conversation status if the current status allows it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` for an unknown conversation and
    /// `RepositoryError::Conflict` for a disallowed move.
    pub async fn set_status(
        &self,
        id: ChatConversationId,
        target: ChatStatus,
    ) -> Result<ChatConversation, RepositoryError> {
        let sources: Vec<String> = ChatStatus::sources_of(target)
            .into_iter()
            .map(|s| s.as_str().to_owned())
            .collect();

        let updated = sqlx::query_as::<_, ChatConversation>(&format!(
            r"
            UPDATE shop.chat_conversations
            SET status = $2,
                closed_at = CASE WHEN $2 = 'closed'::shop.chat_status THEN NOW() ELSE closed_at END,
                updated_at = NOW()
            WHERE id = $1 AND status::text = ANY($3)
            RETURNING {CONVERSATION_COLUMNS}
            "
        ))
        .bind(id)
        .bind(target)
        .bind(&sources)
        .fetch_optional(self.pool)
        .await?;

        if let Some(conversation) = updated {
            return Ok(conversation);
        }
        match self.get_conversation(id).await? {
            Some(current) => Err(RepositoryError::Conflict(format!(
                "conversation is {} and cannot move to {target}",
                current.status
            ))),
            None => Err(RepositoryError::NotFound),
        }
    }
}
