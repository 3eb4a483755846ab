//! Live chat: persistence plus in-process fan-out of events.
//!
//! Every conversation has a broadcast room that visitor sockets subscribe
//! to, and all events are also sent to a single agent feed. Slow subscribers
//! miss lagged events instead of holding up publishers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use sqlx::PgPool;
use tokio::sync::broadcast;
use tracing::instrument;
use uuid::Uuid;

use spareline_core::{ChatConversationId, ChatSender, ChatStatus, UserId};

use crate::db::ChatRepository;
use crate::db::chat::NewMessage;
use crate::error::AppError;
use crate::models::chat::{ChatConversation, ChatEvent, ChatMessage, clean_message_body};

/// Buffered events per channel before slow receivers start lagging.
const CHANNEL_CAPACITY: usize = 64;

/// In-process pub/sub for chat events.
#[derive(Clone)]
pub struct ChatHub {
    rooms: Arc<Mutex<HashMap<ChatConversationId, broadcast::Sender<ChatEvent>>>>,
    agents: broadcast::Sender<ChatEvent>,
}

impl Default for ChatHub {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatHub {
    #[must_use]
    pub fn new() -> Self {
        let (agents, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            rooms: Arc::new(Mutex::new(HashMap::new())),
            agents,
        }
    }

    /// Receive events for one conversation.
    #[must_use]
    pub fn subscribe_room(&self, id: ChatConversationId) -> broadcast::Receiver<ChatEvent> {
        let mut rooms = self.rooms.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        rooms.retain(|_, room| room.receiver_count() > 0);
        rooms
            .entry(id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Receive every event, for agents.
    #[must_use]
    pub fn subscribe_agents(&self) -> broadcast::Receiver<ChatEvent> {
        self.agents.subscribe()
    }

    /// Send an event to its room and the agent feed.
    pub fn publish(&self, event: &ChatEvent) {
        let id = event.conversation_id();
        {
            let mut rooms = self.rooms.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            if let Some(room) = rooms.get(&id) {
                if room.receiver_count() == 0 {
                    rooms.remove(&id);
                } else {
                    // Only fails when every receiver has gone away.
                    let _ = room.send(event.clone());
                }
            }
        }
        let _ = self.agents.send(event.clone());
    }

    /// Drop rooms whose last subscriber has gone away.
    pub fn prune_idle(&self) {
        self.rooms
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .retain(|_, room| room.receiver_count() > 0);
    }

    /// Rooms currently held, with or without subscribers.
    #[must_use]
    pub fn room_count(&self) -> usize {
        self.rooms
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    /// Rooms with at least one subscriber.
    #[must_use]
    pub fn active_rooms(&self) -> usize {
        self.rooms
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .values()
            .filter(|room| room.receiver_count() > 0)
            .count()
    }
}

/// Who is allowed into a conversation.
#[derive(Debug, Clone, Copy)]
pub enum ChatAccess {
    /// Staff with `ManageChat`.
    Agent(UserId),
    /// The signed-in customer who started it.
    Owner(UserId),
    /// A guest holding the visitor token.
    Token(Uuid),
}

/// Chat operations that persist and then publish.
pub struct ChatService<'a> {
    repo: ChatRepository<'a>,
    hub: &'a ChatHub,
}

impl<'a> ChatService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, hub: &'a ChatHub) -> Self {
        Self {
            repo: ChatRepository::new(pool),
            hub,
        }
    }

    /// Open a conversation with its first visitor message.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for a blank name or message.
    #[instrument(skip(self, visitor_email, first_message))]
    pub async fn start(
        &self,
        user_id: Option<UserId>,
        visitor_name: &str,
        visitor_email: Option<&str>,
        first_message: &str,
    ) -> Result<(ChatConversation, ChatMessage), AppError> {
        let visitor_name = visitor_name.trim();
        if visitor_name.is_empty() {
            return Err(AppError::BadRequest("name is required".to_owned()));
        }
        let body = clean_message_body(first_message).map_err(AppError::BadRequest)?;

        let conversation = self
            .repo
            .create_conversation(user_id, visitor_name, visitor_email)
            .await?;
        let message = self
            .repo
            .add_message(NewMessage {
                conversation_id: conversation.id,
                sender: ChatSender::Visitor,
                sender_user_id: user_id,
                body: &body,
            })
            .await?;

        tracing::info!(conversation_id = %conversation.id, "Chat conversation started");
        self.hub.publish(&ChatEvent::ConversationStarted {
            conversation: conversation.clone(),
        });
        self.hub.publish(&ChatEvent::Message {
            message: message.clone(),
        });
        Ok((conversation, message))
    }

    /// Load a conversation if `access` may see it.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for unknown ids and for callers without
    /// access, so guessing ids reveals nothing.
    pub async fn authorize(
        &self,
        id: ChatConversationId,
        access: ChatAccess,
    ) -> Result<ChatConversation, AppError> {
        let conversation = self
            .repo
            .get_conversation(id)
            .await?
            .ok_or_else(|| AppError::NotFound("conversation not found".to_owned()))?;

        let allowed = match access {
            ChatAccess::Agent(_) => true,
            ChatAccess::Owner(user_id) => conversation.user_id == Some(user_id),
            ChatAccess::Token(token) => conversation.visitor_token == token,
        };
        if allowed {
            Ok(conversation)
        } else {
            Err(AppError::NotFound("conversation not found".to_owned()))
        }
    }

    /// All messages of a conversation.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the query fails.
    pub async fn messages(&self, id: ChatConversationId) -> Result<Vec<ChatMessage>, AppError> {
        Ok(self.repo.messages(id).await?)
    }

    /// Agent inbox.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the query fails.
    pub async fn list(&self, status: Option<ChatStatus>) -> Result<Vec<ChatConversation>, AppError> {
        Ok(self.repo.list_conversations(status).await?)
    }

    /// Post a message as the visitor or an agent. Agents are assigned to
    /// unowned conversations on first reply.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for an invalid body and
    /// `AppError::Database` (409) if the conversation is not active.
    #[instrument(skip(self, body))]
    pub async fn post(
        &self,
        conversation: &ChatConversation,
        access: ChatAccess,
        body: &str,
    ) -> Result<ChatMessage, AppError> {
        let body = clean_message_body(body).map_err(AppError::BadRequest)?;
        let (sender, sender_user_id) = match access {
            ChatAccess::Agent(agent) => {
                self.repo.assign_if_unassigned(conversation.id, agent).await?;
                (ChatSender::Agent, Some(agent))
            }
            ChatAccess::Owner(user_id) => (ChatSender::Visitor, Some(user_id)),
            ChatAccess::Token(_) => (ChatSender::Visitor, conversation.user_id),
        };

        let message = self
            .repo
            .add_message(NewMessage {
                conversation_id: conversation.id,
                sender,
                sender_user_id,
                body: &body,
            })
            .await?;

        self.hub.publish(&ChatEvent::Message {
            message: message.clone(),
        });
        Ok(message)
    }

    /// Change status, record a system message and notify subscribers.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` (404/409) for unknown conversations or
    /// disallowed moves.
    #[instrument(skip(self))]
    pub async fn set_status(
        &self,
        id: ChatConversationId,
        status: ChatStatus,
    ) -> Result<ChatConversation, AppError> {
        let conversation = self.repo.set_status(id, status).await?;
        let notice = match status {
            ChatStatus::Active => "Conversation reopened",
            ChatStatus::Resolved => "Conversation marked as resolved",
            ChatStatus::Closed => "Conversation closed",
        };
        let message = self.repo.add_system_message(id, notice).await?;

        self.hub.publish(&ChatEvent::Status {
            conversation_id: id,
            status,
        });
        self.hub.publish(&ChatEvent::Message { message });
        Ok(conversation)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use spareline_core::ChatMessageId;

    use super::*;

    fn message(conversation: i32) -> ChatEvent {
        ChatEvent::Message {
            message: ChatMessage {
                id: ChatMessageId::new(1),
                conversation_id: ChatConversationId::new(conversation),
                sender: ChatSender::Visitor,
                sender_user_id: None,
                body: "Do you have this in stock?".to_owned(),
                created_at: chrono::Utc::now(),
            },
        }
    }

    #[tokio::test]
    async fn test_room_and_agent_feed_receive_events() {
        let hub = ChatHub::new();
        let mut room = hub.subscribe_room(ChatConversationId::new(1));
        let mut other_room = hub.subscribe_room(ChatConversationId::new(2));
        let mut agents = hub.subscribe_agents();

        hub.publish(&message(1));

        assert_eq!(room.recv().await.unwrap().conversation_id(), ChatConversationId::new(1));
        assert_eq!(agents.recv().await.unwrap().conversation_id(), ChatConversationId::new(1));
        assert!(other_room.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_abandoned_rooms_are_dropped() {
        let hub = ChatHub::new();
        let room = hub.subscribe_room(ChatConversationId::new(7));
        assert_eq!(hub.active_rooms(), 1);
        drop(room);
        hub.publish(&message(7));
        assert_eq!(hub.active_rooms(), 0);
    }

    #[test]
    fn test_disconnected_rooms_do_not_accumulate() {
        let hub = ChatHub::new();
        for id in 0..1000 {
            let room = hub.subscribe_room(ChatConversationId::new(id));
            drop(room);
        }
        // Each subscribe sweeps the rooms left behind by earlier sockets.
        assert_eq!(hub.room_count(), 1);

        hub.prune_idle();
        assert_eq!(hub.room_count(), 0);
    }

    #[test]
    fn test_prune_keeps_rooms_with_listeners() {
        let hub = ChatHub::new();
        let _live = hub.subscribe_room(ChatConversationId::new(1));
        drop(hub.subscribe_room(ChatConversationId::new(2)));

        hub.prune_idle();
        assert_eq!(hub.room_count(), 1);
        assert_eq!(hub.active_rooms(), 1);
    }

    #[tokio::test]
    async fn test_slow_subscriber_lags_instead_of_blocking() {
        let hub = ChatHub::new();
        let mut agents = hub.subscribe_agents();
        for _ in 0..(CHANNEL_CAPACITY + 10) {
            hub.publish(&message(3));
        }
        assert!(matches!(
            agents.recv().await,
            Err(broadcast::error::RecvError::Lagged(_))
        ));
    }
}
