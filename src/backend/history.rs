use super::HistoryProvider;
use crate::models::{Author, Message};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use uuid::Uuid;

/// Fabricates older messages one minute apart, `pages` pages deep.
pub struct SyntheticHistory {
    latency: Duration,
    page_size: usize,
    pages: u32,
}

impl SyntheticHistory {
    pub fn new(latency: Duration, page_size: usize, pages: u32) -> Self {
        Self {
            latency,
            page_size,
            pages,
        }
    }
}

#[async_trait]
impl HistoryProvider for SyntheticHistory {
    async fn older(
        &self,
        chatroom_id: Uuid,
        page: u32,
        before: DateTime<Utc>,
    ) -> Result<Vec<Message>> {
        tokio::time::sleep(self.latency).await;

        if page == 0 || page > self.pages {
            return Ok(Vec::new());
        }

        let offset = (page as usize - 1) * self.page_size;
        let messages = (0..self.page_size)
            .map(|i| {
                let author = if rand::random_bool(0.5) {
                    Author::User
                } else {
                    Author::Assistant
                };
                let content = format!("This is an older message {}", offset + i + 1);
                let timestamp = before - chrono::Duration::minutes(i as i64 + 1);
                Message::new(chatroom_id, author, &content).at(timestamp)
            })
            .collect();

        Ok(messages)
    }

    fn page_size(&self) -> usize {
        self.page_size
    }
}
