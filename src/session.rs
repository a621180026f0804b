use crate::backend::OtpService;
use crate::models::User;
use crate::storage::{JsonFile, StorageError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const SESSION_FILE: &str = "session.json";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Invalid OTP")]
    InvalidCode,
    #[error("Failed to send OTP: {0}")]
    Delivery(#[from] anyhow::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Anonymous,
    CodeSent,
    Authenticated,
}

/// Only the user survives a restart; a pending code never does.
#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedSession {
    user: Option<User>,
}

#[derive(Debug, Default)]
struct SessionState {
    user: Option<User>,
    pending_otp: Option<String>,
}

pub struct SessionStore {
    otp: Arc<dyn OtpService>,
    verify_latency: Duration,
    default_name: String,
    state: RwLock<SessionState>,
    file: JsonFile<PersistedSession>,
    /// Held from snapshot to write so saves land in order.
    saving: Mutex<()>,
}

impl SessionStore {
    pub async fn open(
        data_dir: &Path,
        otp: Arc<dyn OtpService>,
        verify_latency: Duration,
        default_name: &str,
    ) -> Result<Arc<Self>, SessionError> {
        let file: JsonFile<PersistedSession> = JsonFile::new(data_dir, SESSION_FILE);
        let user = file.load().await?.unwrap_or_default().user;

        match &user {
            Some(user) => info!("Restored session for {}", user.phone),
            None => info!("No saved session, starting logged out"),
        }

        Ok(Arc::new(Self {
            otp,
            verify_latency,
            default_name: default_name.to_string(),
            state: RwLock::new(SessionState {
                user,
                pending_otp: None,
            }),
            file,
            saving: Mutex::new(()),
        }))
    }

    pub async fn user(&self) -> Option<User> {
        self.state.read().await.user.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.state.read().await.user.is_some()
    }

    pub async fn status(&self) -> SessionStatus {
        let state = self.state.read().await;
        if state.user.is_some() {
            SessionStatus::Authenticated
        } else if state.pending_otp.is_some() {
            SessionStatus::CodeSent
        } else {
            SessionStatus::Anonymous
        }
    }

    /// Sends a fresh code. Any earlier pending code stops being valid.
    pub async fn send_otp(&self, phone: &str, name: Option<&str>) -> Result<(), SessionError> {
        debug!("Sending OTP to {} (name: {:?})", phone, name);
        let code = self.otp.send(phone).await?;

        let mut state = self.state.write().await;
        if state.pending_otp.replace(code).is_some() {
            debug!("Previous OTP for {} invalidated", phone);
        }
        Ok(())
    }

    /// Checks `code` against the code pending when the call is made; a resend
    /// during the round trip doesn't reject it. `name` is used for sign-ups;
    /// log-ins get the default name.
    pub async fn verify_otp(
        &self,
        phone: &str,
        code: &str,
        name: Option<&str>,
    ) -> Result<User, SessionError> {
        let expected = self.state.read().await.pending_otp.clone();
        tokio::time::sleep(self.verify_latency).await;

        if expected.as_deref() != Some(code) {
            warn!("Invalid OTP entered for {}", phone);
            return Err(SessionError::InvalidCode);
        }

        let user = {
            let mut state = self.state.write().await;

            let name = name
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .unwrap_or(&self.default_name);
            let user = User {
                id: Uuid::new_v4(),
                name: name.to_string(),
                phone: phone.to_string(),
            };

            state.user = Some(user.clone());
            state.pending_otp = None;
            user
        };

        info!("User {} signed in as {}", user.phone, user.name);
        self.persist().await;
        Ok(user)
    }

    pub async fn logout(&self) {
        {
            let mut state = self.state.write().await;
            state.user = None;
            state.pending_otp = None;
        }
        info!("Logged out");
        self.persist().await;
    }

    pub async fn flush(&self) -> Result<(), SessionError> {
        let _saving = self.saving.lock().await;
        let snapshot = PersistedSession {
            user: self.state.read().await.user.clone(),
        };
        self.file.save(&snapshot).await?;
        Ok(())
    }

    async fn persist(&self) {
        if let Err(e) = self.flush().await {
            error!("Failed to save session: {}", e);
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::SpyOtp;
    use super::*;
    use crate::backend::MockOtp;

    const PHONE: &str = "+15551234567";

    async fn store(dir: &Path, otp: Arc<dyn OtpService>) -> Arc<SessionStore> {
        SessionStore::open(dir, otp, Duration::from_secs(1), "User")
            .await
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn send_then_verify_authenticates() {
        let dir = tempfile::tempdir().unwrap();
        let otp = Arc::new(SpyOtp::default());
        let session = store(dir.path(), otp.clone()).await;
        assert_eq!(session.status().await, SessionStatus::Anonymous);

        session.send_otp(PHONE, None).await.unwrap();
        assert_eq!(session.status().await, SessionStatus::CodeSent);

        let code = otp.last_code().unwrap();
        let user = session.verify_otp(PHONE, &code, None).await.unwrap();

        assert_eq!(user.phone, PHONE);
        assert_eq!(user.name, "User");
        assert_eq!(session.status().await, SessionStatus::Authenticated);
        assert_eq!(session.user().await, Some(user));
    }

    #[tokio::test(start_paused = true)]
    async fn wrong_code_keeps_session_anonymous() {
        let dir = tempfile::tempdir().unwrap();
        let otp = Arc::new(SpyOtp::default());
        let session = store(dir.path(), otp.clone()).await;

        session.send_otp(PHONE, None).await.unwrap();
        let result = session.verify_otp(PHONE, "999999", None).await;

        assert!(matches!(result, Err(SessionError::InvalidCode)));
        assert!(!session.is_authenticated().await);
        assert_eq!(session.status().await, SessionStatus::CodeSent);

        // Retry with the right code still works.
        let code = otp.last_code().unwrap();
        assert!(session.verify_otp(PHONE, &code, None).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn verify_without_send_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let session = store(dir.path(), Arc::new(SpyOtp::default())).await;
        assert!(matches!(
            session.verify_otp(PHONE, "100001", None).await,
            Err(SessionError::InvalidCode)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn resend_invalidates_previous_code() {
        let dir = tempfile::tempdir().unwrap();
        let otp = Arc::new(SpyOtp::default());
        let session = store(dir.path(), otp.clone()).await;

        session.send_otp(PHONE, None).await.unwrap();
        let first = otp.last_code().unwrap();
        session.send_otp(PHONE, None).await.unwrap();
        let second = otp.last_code().unwrap();
        assert_ne!(first, second);

        assert!(matches!(
            session.verify_otp(PHONE, &first, None).await,
            Err(SessionError::InvalidCode)
        ));
        assert!(session.verify_otp(PHONE, &second, None).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn resend_during_verify_keeps_submitted_code() {
        let dir = tempfile::tempdir().unwrap();
        let otp = Arc::new(SpyOtp::default());
        let session = store(dir.path(), otp.clone()).await;

        session.send_otp(PHONE, None).await.unwrap();
        let code = otp.last_code().unwrap();
        let verify = tokio::spawn({
            let session = session.clone();
            async move { session.verify_otp(PHONE, &code, None).await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        session.send_otp(PHONE, None).await.unwrap();

        let user = verify.await.unwrap().unwrap();
        assert_eq!(user.phone, PHONE);
        assert_eq!(session.status().await, SessionStatus::Authenticated);
    }

    #[tokio::test(start_paused = true)]
    async fn signup_name_is_used() {
        let dir = tempfile::tempdir().unwrap();
        let otp = Arc::new(SpyOtp::default());
        let session = store(dir.path(), otp.clone()).await;

        session.send_otp(PHONE, Some("Ada")).await.unwrap();
        let code = otp.last_code().unwrap();
        let user = session.verify_otp(PHONE, &code, Some("Ada")).await.unwrap();
        assert_eq!(user.name, "Ada");
    }

    #[tokio::test(start_paused = true)]
    async fn code_cannot_be_reused_after_success() {
        let dir = tempfile::tempdir().unwrap();
        let otp = Arc::new(SpyOtp::default());
        let session = store(dir.path(), otp.clone()).await;

        session.send_otp(PHONE, None).await.unwrap();
        let code = otp.last_code().unwrap();
        session.verify_otp(PHONE, &code, None).await.unwrap();
        session.logout().await;

        assert!(matches!(
            session.verify_otp(PHONE, &code, None).await,
            Err(SessionError::InvalidCode)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn user_survives_restart_but_pending_code_does_not() {
        let dir = tempfile::tempdir().unwrap();
        let otp = Arc::new(SpyOtp::default());

        let session = store(dir.path(), otp.clone()).await;
        session.send_otp(PHONE, None).await.unwrap();
        let code = otp.last_code().unwrap();
        let user = session.verify_otp(PHONE, &code, None).await.unwrap();
        drop(session);

        let restored = store(dir.path(), otp.clone()).await;
        assert_eq!(restored.user().await, Some(user));

        restored.logout().await;
        restored.send_otp(PHONE, None).await.unwrap();
        drop(restored);

        let restored = store(dir.path(), otp).await;
        assert_eq!(restored.status().await, SessionStatus::Anonymous);
    }

    #[tokio::test(start_paused = true)]
    async fn logout_clears_user_and_pending_code() {
        let dir = tempfile::tempdir().unwrap();
        let otp = Arc::new(SpyOtp::default());
        let session = store(dir.path(), otp.clone()).await;

        session.send_otp(PHONE, None).await.unwrap();
        let code = otp.last_code().unwrap();
        session.verify_otp(PHONE, &code, None).await.unwrap();
        session.send_otp(PHONE, None).await.unwrap();

        session.logout().await;
        assert_eq!(session.status().await, SessionStatus::Anonymous);
    }

    #[tokio::test(start_paused = true)]
    async fn mock_otp_roundtrip_for_many_phones() {
        let dir = tempfile::tempdir().unwrap();
        let session = store(dir.path(), Arc::new(MockOtp::new(Duration::from_secs(1)))).await;

        for phone in ["+15550000000", "+447700900123", "+819012345678"] {
            session.send_otp(phone, None).await.unwrap();
            let code = session.state.read().await.pending_otp.clone().unwrap();
            let user = session.verify_otp(phone, &code, None).await.unwrap();
            assert_eq!(user.phone, phone);
            session.logout().await;
        }
    }
}
