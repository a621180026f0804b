use crate::attachment::ImageAttachment;
use crate::conversation::{ConversationStore, Exchange};
use crate::forms::{FormErrors, MessageDraft};
use crate::models::{Chatroom, Message};
use crate::notify::{Notifier, Toast};
use crate::route::Route;
use crate::session::SessionStore;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

/// One open chatroom. Dropping the view closes it, and sends that finish
/// afterwards no longer report back.
pub struct ChatView {
    conversations: Arc<ConversationStore>,
    notifier: Arc<dyn Notifier>,
    chatroom: Chatroom,
    messages: Vec<Message>,
    has_more: bool,
    open: Arc<AtomicBool>,
    exchanges_tx: mpsc::UnboundedSender<Exchange>,
    exchanges_rx: mpsc::UnboundedReceiver<Exchange>,
}

impl ChatView {
    /// Opens the room, or returns the route to show instead.
    pub async fn open(
        session: &SessionStore,
        conversations: Arc<ConversationStore>,
        notifier: Arc<dyn Notifier>,
        chatroom_id: Uuid,
    ) -> Result<Self, Route> {
        if !session.is_authenticated().await {
            return Err(Route::Landing);
        }

        let Some(chatroom) = conversations.select_chatroom(chatroom_id).await else {
            warn!("Chatroom {} not found", chatroom_id);
            return Err(Route::Dashboard);
        };
        let messages = conversations.load_messages(chatroom_id).await;
        let (exchanges_tx, exchanges_rx) = mpsc::unbounded_channel();

        Ok(Self {
            conversations,
            notifier,
            chatroom,
            messages,
            has_more: true,
            open: Arc::new(AtomicBool::new(true)),
            exchanges_tx,
            exchanges_rx,
        })
    }

    pub fn chatroom(&self) -> &Chatroom {
        &self.chatroom
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub async fn is_typing(&self) -> bool {
        self.conversations.is_typing(self.chatroom.id).await
    }

    /// Re-reads the room from the store.
    pub async fn refresh(&mut self) {
        if let Some(room) = self.conversations.chatroom(self.chatroom.id).await {
            self.chatroom = room;
        }
        self.messages = self.conversations.messages(self.chatroom.id).await;
    }

    /// Loads one more page of older messages. Returns how many arrived.
    pub async fn load_older(&mut self) -> usize {
        if !self.has_more {
            return 0;
        }

        match self.conversations.load_more_messages(self.chatroom.id).await {
            Ok(page) => {
                if page.len() < self.conversations.page_size() {
                    debug!("History for {} exhausted", self.chatroom.id);
                    self.has_more = false;
                }
                let loaded = page.len();
                self.refresh().await;
                loaded
            }
            Err(e) => {
                warn!("Loading history for {} failed: {}", self.chatroom.id, e);
                self.notifier
                    .notify(Toast::error("Failed to load more messages."));
                0
            }
        }
    }

    pub async fn send_text(
        &mut self,
        text: &str,
    ) -> Result<Option<JoinHandle<()>>, FormErrors> {
        let draft = MessageDraft::new(text, None)?;
        Ok(self
            .send(draft, "Message Sent", "Your message has been sent.")
            .await)
    }

    pub async fn send_image(&mut self, path: &Path, max_bytes: u64) -> Option<JoinHandle<()>> {
        let image = match ImageAttachment::from_file(path, max_bytes).await {
            Ok(image) => image,
            Err(e) => {
                warn!("Rejected attachment {}: {}", path.display(), e);
                self.notifier
                    .notify(Toast::error("Failed to send image. Please try again."));
                return None;
            }
        };
        let draft = MessageDraft::new("", Some(image)).ok()?;
        self.send(draft, "Image Sent", "Your image has been sent.")
            .await
    }

    /// Waits for the next finished send from this view.
    pub async fn next_exchange(&mut self) -> Option<Exchange> {
        self.exchanges_rx.recv().await
    }

    pub fn close(&self) {
        self.open.store(false, Ordering::Release);
    }

    /// Appends the user's message before returning; the reply is awaited in
    /// the background.
    async fn send(
        &mut self,
        draft: MessageDraft,
        title: &'static str,
        description: &'static str,
    ) -> Option<JoinHandle<()>> {
        let Some(pending) = self
            .conversations
            .post_message(self.chatroom.id, &draft.text, draft.image)
            .await
        else {
            self.notifier
                .notify(Toast::error("Failed to send message. Please try again."));
            return None;
        };
        self.refresh().await;

        let conversations = self.conversations.clone();
        let notifier = self.notifier.clone();
        let open = self.open.clone();
        let exchanges = self.exchanges_tx.clone();

        Some(tokio::spawn(async move {
            let sent = pending.sent.clone();
            let reply = conversations.complete_reply(pending).await;

            if !open.load(Ordering::Acquire) {
                debug!("Chat view for {} closed, dropping result", sent.chatroom_id);
                return;
            }
            notifier.notify(Toast::success(title, description));
            let _ = exchanges.send(Exchange { sent, reply });
        }))
    }
}

impl Drop for ChatView {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Latency;
    use crate::conversation::testing::open_store;
    use crate::notify::testing::RecordingNotifier;
    use crate::session::testing::SpyOtp;
    use std::time::Duration;

    struct Fixture {
        _dir: tempfile::TempDir,
        session: Arc<SessionStore>,
        conversations: Arc<ConversationStore>,
        notifier: Arc<RecordingNotifier>,
    }

    async fn fixture(logged_in: bool) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let otp = Arc::new(SpyOtp::default());
        let session = SessionStore::open(dir.path(), otp.clone(), Duration::ZERO, "User")
            .await
            .unwrap();
        if logged_in {
            session.send_otp("+15551234567", None).await.unwrap();
            let code = otp.last_code().unwrap();
            session
                .verify_otp("+15551234567", &code, None)
                .await
                .unwrap();
        }
        let latency = Latency {
            reply_min: Duration::from_millis(1000),
            reply_max: Duration::from_millis(3000),
            ..Latency::none()
        };
        let conversations = open_store(dir.path(), &latency).await;
        Fixture {
            _dir: dir,
            session,
            conversations,
            notifier: Arc::new(RecordingNotifier::default()),
        }
    }

    async fn open(f: &Fixture, id: Uuid) -> Result<ChatView, Route> {
        ChatView::open(&f.session, f.conversations.clone(), f.notifier.clone(), id).await
    }

    #[tokio::test(start_paused = true)]
    async fn anonymous_users_are_redirected() {
        let f = fixture(false).await;
        let room = f.conversations.create_chatroom("Room").await;
        assert!(matches!(open(&f, room.id).await, Err(Route::Landing)));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_room_goes_back_to_dashboard() {
        let f = fixture(true).await;
        assert!(matches!(
            open(&f, Uuid::new_v4()).await,
            Err(Route::Dashboard)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn trip_planning_example() {
        let f = fixture(true).await;
        let room = f.conversations.create_chatroom("Trip Planning").await;
        let mut view = open(&f, room.id).await.unwrap();

        let handle = view.send_text("Hello").await.unwrap().unwrap();
        assert_eq!(view.messages().len(), 1);
        assert!(view.messages()[0].is_user());
        assert!(view.is_typing().await);

        let exchange = view.next_exchange().await.unwrap();
        handle.await.unwrap();
        assert!(exchange.reply.is_some());
        assert!(!view.is_typing().await);

        view.refresh().await;
        assert_eq!(view.messages().len(), 2);
        assert_eq!(view.chatroom().message_count, 2);
        assert_eq!(f.notifier.last().unwrap().title, "Message Sent");
    }

    #[tokio::test(start_paused = true)]
    async fn blank_text_is_rejected() {
        let f = fixture(true).await;
        let room = f.conversations.create_chatroom("Room").await;
        let mut view = open(&f, room.id).await.unwrap();
        assert!(view.send_text("   ").await.is_err());
        assert!(view.messages().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn image_send_reads_file() {
        let f = fixture(true).await;
        let room = f.conversations.create_chatroom("Photos").await;
        let mut view = open(&f, room.id).await.unwrap();

        let path = f._dir.path().join("cat.png");
        std::fs::write(&path, b"\x89PNG").unwrap();
        let handle = view.send_image(&path, 1024).await.unwrap();
        handle.await.unwrap();

        view.refresh().await;
        let image = view.messages()[0].image.as_ref().unwrap();
        assert_eq!(image.mime, "image/png");
        assert_eq!(f.notifier.last().unwrap().title, "Image Sent");

        let missing = f._dir.path().join("nope.png");
        assert!(view.send_image(&missing, 1024).await.is_none());
        assert_eq!(
            f.notifier.last().unwrap().description,
            "Failed to send image. Please try again."
        );
    }

    #[tokio::test(start_paused = true)]
    async fn load_older_stops_after_short_page() {
        let f = fixture(true).await;
        let room = f.conversations.create_chatroom("History").await;
        let mut view = open(&f, room.id).await.unwrap();

        let mut requests = 0;
        while view.has_more() {
            view.load_older().await;
            requests += 1;
        }
        assert_eq!(requests, 4);
        assert_eq!(view.messages().len(), 30);
        assert!(
            view.messages()
                .windows(2)
                .all(|w| w[0].timestamp <= w[1].timestamp)
        );

        // No further requests once exhausted.
        assert_eq!(view.load_older().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn closed_view_ignores_late_reply() {
        let f = fixture(true).await;
        let room = f.conversations.create_chatroom("Room").await;
        let mut view = open(&f, room.id).await.unwrap();

        let handle = view.send_text("Hello").await.unwrap().unwrap();
        drop(view);
        handle.await.unwrap();

        // The store still records the exchange; the view just doesn't announce it.
        assert_eq!(f.conversations.messages(room.id).await.len(), 2);
        assert!(f.notifier.toasts().is_empty());
    }
}
