use crate::conversation::ConversationStore;
use crate::forms::{ChatroomTitle, FormErrors};
use crate::models::Chatroom;
use crate::notify::{Notifier, Toast};
use crate::route::Route;
use crate::session::SessionStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

/// Case-insensitive substring match on titles, keeping store order.
pub fn filter_chatrooms(rooms: Vec<Chatroom>, query: &str) -> Vec<Chatroom> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return rooms;
    }
    rooms
        .into_iter()
        .filter(|room| room.title.to_lowercase().contains(&query))
        .collect()
}

pub struct DashboardView {
    session: Arc<SessionStore>,
    conversations: Arc<ConversationStore>,
    notifier: Arc<dyn Notifier>,
    debounce: Duration,
    typed: String,
    typed_at: Option<Instant>,
    applied: String,
}

impl DashboardView {
    pub fn new(
        session: Arc<SessionStore>,
        conversations: Arc<ConversationStore>,
        notifier: Arc<dyn Notifier>,
        debounce: Duration,
    ) -> Self {
        Self {
            session,
            conversations,
            notifier,
            debounce,
            typed: String::new(),
            typed_at: None,
            applied: String::new(),
        }
    }

    pub fn set_query(&mut self, query: &str) {
        self.typed = query.to_string();
        self.typed_at = Some(Instant::now());
    }

    /// The query the list is filtered by. Lags typing by the debounce interval.
    pub fn query(&mut self) -> &str {
        if let Some(at) = self.typed_at
            && at.elapsed() >= self.debounce
        {
            self.applied = self.typed.clone();
            self.typed_at = None;
        }
        &self.applied
    }

    /// Waits out the debounce interval so the typed query takes effect.
    pub async fn settle(&mut self) {
        if let Some(at) = self.typed_at {
            tokio::time::sleep_until(at + self.debounce).await;
        }
        self.query();
    }

    pub async fn chatrooms(&mut self) -> Vec<Chatroom> {
        let query = self.query().to_string();
        filter_chatrooms(self.conversations.chatrooms().await, &query)
    }

    pub fn empty_text(&self) -> &'static str {
        if self.typed.trim().is_empty() {
            "No chatrooms yet"
        } else {
            "No chatrooms found"
        }
    }

    pub async fn create(&self, title: &str) -> Result<Chatroom, FormErrors> {
        let title = ChatroomTitle::parse(title)?;
        let room = self.conversations.create_chatroom(title.as_str()).await;
        self.notifier.notify(Toast::success(
            "Chatroom Created",
            format!("\"{}\" has been created successfully.", room.title),
        ));
        Ok(room)
    }

    pub async fn delete(&self, id: Uuid) -> bool {
        let removed = self.conversations.delete_chatroom(id).await;
        self.notifier.notify(Toast::success(
            "Chatroom Deleted",
            "The chatroom has been successfully deleted.",
        ));
        removed
    }

    pub async fn logout(&self) -> Route {
        self.session.logout().await;
        self.notifier.notify(Toast::success(
            "Logged Out",
            "You have been successfully logged out.",
        ));
        Route::Login
    }
}
