use crate::attachment::ImageAttachment;
use crate::backend::{HistoryProvider, ReplyGenerator};
use crate::models::{Author, Chatroom, Message};
use crate::storage::{JsonFile, StorageError};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const CONVERSATIONS_FILE: &str = "conversations.json";

#[derive(Debug, Error)]
pub enum ConversationError {
    #[error("Failed to load older messages: {0}")]
    History(#[from] anyhow::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedConversations {
    chatrooms: Vec<Chatroom>,
    messages: Vec<Message>,
}

#[derive(Debug, Default)]
struct ConversationState {
    chatrooms: Vec<Chatroom>,
    messages: Vec<Message>,
    current: Option<Uuid>,
    /// Pages of older history already fetched, per room.
    pages_loaded: HashMap<Uuid, u32>,
    /// Replies still being generated, per room.
    pending_replies: HashMap<Uuid, usize>,
}

impl ConversationState {
    fn room_mut(&mut self, id: Uuid) -> Option<&mut Chatroom> {
        self.chatrooms.iter_mut().find(|room| room.id == id)
    }

    fn has_room(&self, id: Uuid) -> bool {
        self.chatrooms.iter().any(|room| room.id == id)
    }

    fn finish_reply(&mut self, id: Uuid) {
        if let Some(count) = self.pending_replies.get_mut(&id) {
            *count -= 1;
            if *count == 0 {
                self.pending_replies.remove(&id);
            }
        }
    }
}

/// A posted user message whose reply is still owed.
/// Pass it to [`ConversationStore::complete_reply`] or the room keeps typing.
#[must_use]
#[derive(Debug)]
pub struct PendingReply {
    pub sent: Message,
}

/// The user's message and, if one was produced, the assistant's answer.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub sent: Message,
    pub reply: Option<Message>,
}

pub struct ConversationStore {
    replies: Arc<dyn ReplyGenerator>,
    history: Arc<dyn HistoryProvider>,
    room_latency: Duration,
    state: RwLock<ConversationState>,
    file: JsonFile<PersistedConversations>,
    /// Held from snapshot to write so saves land in order.
    saving: Mutex<()>,
}

impl ConversationStore {
    pub async fn open(
        data_dir: &Path,
        replies: Arc<dyn ReplyGenerator>,
        history: Arc<dyn HistoryProvider>,
        room_latency: Duration,
    ) -> Result<Arc<Self>, ConversationError> {
        let file: JsonFile<PersistedConversations> =
            JsonFile::new(data_dir, CONVERSATIONS_FILE);
        let saved = file.load().await?.unwrap_or_default();
        info!(
            "Loaded {} chatrooms and {} messages",
            saved.chatrooms.len(),
            saved.messages.len()
        );

        Ok(Arc::new(Self {
            replies,
            history,
            room_latency,
            state: RwLock::new(ConversationState {
                chatrooms: saved.chatrooms,
                messages: saved.messages,
                ..Default::default()
            }),
            file,
            saving: Mutex::new(()),
        }))
    }

    /// A page of older history shorter than this means there is nothing further back.
    pub fn page_size(&self) -> usize {
        self.history.page_size()
    }

    /// Most recently created first.
    pub async fn chatrooms(&self) -> Vec<Chatroom> {
        self.state.read().await.chatrooms.clone()
    }

    pub async fn chatroom(&self, id: Uuid) -> Option<Chatroom> {
        let state = self.state.read().await;
        state.chatrooms.iter().find(|room| room.id == id).cloned()
    }

    pub async fn current_chatroom(&self) -> Option<Chatroom> {
        let state = self.state.read().await;
        let id = state.current?;
        state.chatrooms.iter().find(|room| room.id == id).cloned()
    }

    pub async fn is_typing(&self, chatroom_id: Uuid) -> bool {
        self.state
            .read()
            .await
            .pending_replies
            .contains_key(&chatroom_id)
    }

    pub async fn create_chatroom(&self, title: &str) -> Chatroom {
        tokio::time::sleep(self.room_latency).await;

        let room = Chatroom::new(title);
        self.state.write().await.chatrooms.insert(0, room.clone());
        info!("Created chatroom {} ({})", room.id, room.title);

        self.persist().await;
        room
    }

    /// Removes the room and every message in it. Returns `false` if it was already gone.
    pub async fn delete_chatroom(&self, id: Uuid) -> bool {
        tokio::time::sleep(self.room_latency).await;

        let removed = {
            let mut state = self.state.write().await;
            let before = state.chatrooms.len();
            state.chatrooms.retain(|room| room.id != id);
            if state.chatrooms.len() == before {
                false
            } else {
                state.messages.retain(|msg| msg.chatroom_id != id);
                state.pages_loaded.remove(&id);
                state.pending_replies.remove(&id);
                if state.current == Some(id) {
                    state.current = None;
                }
                true
            }
        };

        if removed {
            info!("Deleted chatroom {}", id);
            self.persist().await;
        } else {
            debug!("Chatroom {} already deleted", id);
        }
        removed
    }

    /// Makes `id` the active room, or clears the selection if it doesn't exist.
    pub async fn select_chatroom(&self, id: Uuid) -> Option<Chatroom> {
        let mut state = self.state.write().await;
        let room = state.chatrooms.iter().find(|room| room.id == id).cloned();
        state.current = room.as_ref().map(|room| room.id);
        room
    }

    /// The room's messages, oldest first. Resets its history cursor.
    pub async fn load_messages(&self, chatroom_id: Uuid) -> Vec<Message> {
        self.state.write().await.pages_loaded.remove(&chatroom_id);
        self.messages(chatroom_id).await
    }

    /// The room's messages, oldest first, leaving the history cursor alone.
    pub async fn messages(&self, chatroom_id: Uuid) -> Vec<Message> {
        let state = self.state.read().await;
        let mut messages: Vec<Message> = state
            .messages
            .iter()
            .filter(|msg| msg.chatroom_id == chatroom_id)
            .cloned()
            .collect();
        messages.sort_by_key(|msg| msg.timestamp);
        messages
    }

    /// Fetches the next page of older messages for the room.
    ///
    /// A page shorter than the provider's page size means there is nothing
    /// further back. Unknown rooms yield an empty page.
    pub async fn load_more_messages(
        &self,
        chatroom_id: Uuid,
    ) -> Result<Vec<Message>, ConversationError> {
        let (page, before) = {
            let state = self.state.read().await;
            if !state.has_room(chatroom_id) {
                return Ok(Vec::new());
            }
            let page = state.pages_loaded.get(&chatroom_id).copied().unwrap_or(0) + 1;
            let before = state
                .messages
                .iter()
                .filter(|msg| msg.chatroom_id == chatroom_id)
                .map(|msg| msg.timestamp)
                .min()
                .unwrap_or_else(Utc::now);
            (page, before)
        };

        let older = self.history.older(chatroom_id, page, before).await?;

        {
            let mut state = self.state.write().await;
            let Some(room) = state.room_mut(chatroom_id) else {
                debug!("Chatroom {} deleted while loading history", chatroom_id);
                return Ok(Vec::new());
            };
            room.message_count += older.len();
            let newer = std::mem::take(&mut state.messages);
            state.messages = older.iter().cloned().chain(newer).collect();
            *state.pages_loaded.entry(chatroom_id).or_insert(0) += 1;
        }

        debug!(
            "Loaded page {} ({} messages) for chatroom {}",
            page,
            older.len(),
            chatroom_id
        );
        if !older.is_empty() {
            self.persist().await;
        }
        Ok(older)
    }

    /// Appends the user's message right away, then waits for the assistant's
    /// reply. The room shows as typing for exactly that wait.
    ///
    /// Returns `None` if the room doesn't exist.
    pub async fn send_message(
        &self,
        chatroom_id: Uuid,
        content: &str,
        image: Option<ImageAttachment>,
    ) -> Option<Exchange> {
        let pending = self.post_message(chatroom_id, content, image).await?;
        let sent = pending.sent.clone();
        let reply = self.complete_reply(pending).await;
        Some(Exchange { sent, reply })
    }

    /// First half of [`ConversationStore::send_message`]: records the user's
    /// message and marks the room as typing.
    pub async fn post_message(
        &self,
        chatroom_id: Uuid,
        content: &str,
        image: Option<ImageAttachment>,
    ) -> Option<PendingReply> {
        let sent = Message::new(chatroom_id, Author::User, content).with_image(image);

        {
            let mut state = self.state.write().await;
            let Some(room) = state.room_mut(chatroom_id) else {
                warn!("Dropping message for unknown chatroom {}", chatroom_id);
                return None;
            };
            room.record_messages(1, sent.timestamp);
            state.messages.push(sent.clone());
            *state.pending_replies.entry(chatroom_id).or_insert(0) += 1;
        }
        self.persist().await;

        Some(PendingReply { sent })
    }

    /// Second half: waits for the reply and appends it, unless the room was
    /// deleted in the meantime.
    pub async fn complete_reply(&self, pending: PendingReply) -> Option<Message> {
        let chatroom_id = pending.sent.chatroom_id;
        let reply = match self.replies.reply(&pending.sent).await {
            Ok(text) => Some(Message::new(chatroom_id, Author::Assistant, &text)),
            Err(e) => {
                error!("Reply generation failed for {}: {}", chatroom_id, e);
                None
            }
        };

        let reply = {
            let mut state = self.state.write().await;
            state.finish_reply(chatroom_id);
            match reply {
                Some(reply) if state.has_room(chatroom_id) => {
                    if let Some(room) = state.room_mut(chatroom_id) {
                        room.record_messages(1, reply.timestamp);
                    }
                    state.messages.push(reply.clone());
                    Some(reply)
                }
                Some(_) => {
                    debug!("Chatroom {} deleted before reply arrived", chatroom_id);
                    None
                }
                None => None,
            }
        };
        if reply.is_some() {
            self.persist().await;
        }
        reply
    }

    pub async fn flush(&self) -> Result<(), ConversationError> {
        let _saving = self.saving.lock().await;
        let snapshot = {
            let state = self.state.read().await;
            PersistedConversations {
                chatrooms: state.chatrooms.clone(),
                messages: state.messages.clone(),
            }
        };
        self.file.save(&snapshot).await?;
        Ok(())
    }

    async fn persist(&self) {
        if let Err(e) = self.flush().await {
            error!("Failed to save conversations: {}", e);
        }
    }
}
