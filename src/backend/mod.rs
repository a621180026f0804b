//! Collaborators the stores depend on.
//!
//! Everything behind these traits is simulated: codes are logged instead of
//! texted, replies come from a canned pool and older history is fabricated.
//! A real backend slots in by implementing the same traits.

mod countries;
mod history;
mod otp;
mod replies;

use crate::models::Message;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub use countries::{Country, StaticCountries};
pub use history::SyntheticHistory;
pub use otp::MockOtp;
pub use replies::{CANNED_REPLIES, CannedReplies};

#[async_trait]
pub trait OtpService: Send + Sync {
    /// Delivers a fresh code to `phone` and hands it back for verification.
    async fn send(&self, phone: &str) -> Result<String>;
}

#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    async fn reply(&self, prompt: &Message) -> Result<String>;
}

#[async_trait]
pub trait HistoryProvider: Send + Sync {
    /// Page `page` (1-based) of messages older than `before`.
    /// A page shorter than [`HistoryProvider::page_size`] means the history is exhausted.
    async fn older(
        &self,
        chatroom_id: Uuid,
        page: u32,
        before: DateTime<Utc>,
    ) -> Result<Vec<Message>>;

    fn page_size(&self) -> usize;
}

#[async_trait]
pub trait CountryProvider: Send + Sync {
    async fn countries(&self) -> Result<Vec<Country>>;
}
