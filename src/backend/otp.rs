use super::OtpService;
use anyhow::Result;
use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;
use tracing::info;

pub struct MockOtp {
    latency: Duration,
}

impl MockOtp {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }

    fn generate() -> String {
        rand::rng().random_range(100_000..1_000_000u32).to_string()
    }
}

#[async_trait]
impl OtpService for MockOtp {
    async fn send(&self, phone: &str) -> Result<String> {
        tokio::time::sleep(self.latency).await;

        let code = Self::generate();
        // Stand-in for SMS delivery.
        info!("OTP for {}: {}", phone, code);
        Ok(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_six_digits() {
        for _ in 0..200 {
            let code = MockOtp::generate();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
            assert_ne!(code.as_bytes()[0], b'0');
        }
    }

    #[tokio::test(start_paused = true)]
    async fn send_waits_for_latency() {
        let otp = MockOtp::new(Duration::from_secs(1));
        let start = tokio::time::Instant::now();
        otp.send("+15551234567").await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(1));
    }
}
