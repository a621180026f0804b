use super::ReplyGenerator;
use crate::models::Message;
use anyhow::Result;
use async_trait::async_trait;
use rand::Rng;
use rand::seq::IndexedRandom;
use std::time::Duration;
use tracing::debug;

pub const CANNED_REPLIES: [&str; 10] = [
    "That's an interesting question! Let me think about that for a moment.",
    "I understand what you're asking. Here's my perspective on that topic.",
    "Great point! I'd like to add some thoughts to what you've shared.",
    "That's a fascinating topic. Let me provide you with some insights.",
    "I appreciate you sharing that with me. Here's what I think about it.",
    "That's a thoughtful question. Let me break this down for you.",
    "I see what you mean. Here's how I would approach that situation.",
    "That's definitely worth exploring further. Let me share some ideas.",
    "Interesting perspective! I have some thoughts that might be helpful.",
    "That's a complex topic. Let me try to explain it in a simple way.",
];

/// Picks a canned reply after a random "thinking" delay in `[min, max)`.
pub struct CannedReplies {
    min: Duration,
    max: Duration,
}

impl CannedReplies {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self { min, max }
    }

    fn thinking_time(&self) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        rand::rng().random_range(self.min..self.max)
    }
}

#[async_trait]
impl ReplyGenerator for CannedReplies {
    async fn reply(&self, prompt: &Message) -> Result<String> {
        let delay = self.thinking_time();
        debug!("Replying to {} in {:?}", prompt.id, delay);
        tokio::time::sleep(delay).await;

        let reply = CANNED_REPLIES
            .choose(&mut rand::rng())
            .copied()
            .unwrap_or(CANNED_REPLIES[0]);
        Ok(reply.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Author;
    use uuid::Uuid;

    #[test]
    fn thinking_time_stays_in_range() {
        let replies = CannedReplies::new(Duration::from_millis(1000), Duration::from_millis(3000));
        for _ in 0..200 {
            let t = replies.thinking_time();
            assert!(t >= Duration::from_millis(1000) && t < Duration::from_millis(3000));
        }
    }

    #[test]
    fn degenerate_range_uses_minimum() {
        let replies = CannedReplies::new(Duration::from_millis(50), Duration::from_millis(50));
        assert_eq!(replies.thinking_time(), Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn reply_comes_from_pool() {
        let replies = CannedReplies::new(Duration::from_millis(1000), Duration::from_millis(3000));
        let prompt = Message::new(Uuid::new_v4(), Author::User, "Hello");

        let start = tokio::time::Instant::now();
        let reply = replies.reply(&prompt).await.unwrap();

        assert!(CANNED_REPLIES.contains(&reply.as_str()));
        assert!(start.elapsed() >= Duration::from_millis(1000));
        assert!(start.elapsed() < Duration::from_millis(3000));
    }
}
