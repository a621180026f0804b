use crate::forms::{FormErrors, LoginForm, OtpCode, SignupForm};
use crate::models::User;
use crate::notify::{Notifier, Toast};
use crate::route::Route;
use crate::session::{SessionError, SessionStore};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Error)]
pub enum FlowError {
    #[error(transparent)]
    Form(#[from] FormErrors),
    #[error("Resend available in {}s", remaining.as_secs())]
    ResendLocked { remaining: Duration },
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Validates the login form, sends a code and returns where to go next.
pub async fn start_login(
    session: &SessionStore,
    notifier: &dyn Notifier,
    form: &LoginForm,
) -> Result<Route, FlowError> {
    let phone = form.validate()?;

    if let Err(e) = session.send_otp(phone.as_str(), None).await {
        notifier.notify(Toast::error("Failed to send OTP. Please try again."));
        return Err(e.into());
    }
    notifier.notify(Toast::success(
        "OTP Sent",
        "Please check your phone for the verification code.",
    ));

    Ok(Route::Verify {
        phone: phone.to_string(),
        name: None,
        signup: false,
    })
}

pub async fn start_signup(
    session: &SessionStore,
    notifier: &dyn Notifier,
    form: &SignupForm,
) -> Result<Route, FlowError> {
    let signup = form.validate()?;

    if let Err(e) = session
        .send_otp(signup.phone.as_str(), Some(&signup.name))
        .await
    {
        notifier.notify(Toast::error("Failed to send OTP. Please try again."));
        return Err(e.into());
    }
    notifier.notify(Toast::success(
        "OTP Sent",
        "Please check your phone for the verification code.",
    ));

    Ok(Route::Verify {
        phone: signup.phone.to_string(),
        name: Some(signup.name),
        signup: true,
    })
}

/// State behind the code entry screen: who is verifying and when a resend
/// becomes available.
#[derive(Debug, Clone)]
pub struct VerifyFlow {
    phone: String,
    name: Option<String>,
    is_signup: bool,
    cooldown: Duration,
    resend_at: Instant,
}

impl VerifyFlow {
    pub fn new(phone: &str, name: Option<&str>, is_signup: bool, cooldown: Duration) -> Self {
        Self {
            phone: phone.to_string(),
            name: name.map(str::to_string),
            is_signup,
            cooldown,
            resend_at: Instant::now() + cooldown,
        }
    }

    pub fn from_route(route: &Route, cooldown: Duration) -> Option<Self> {
        match route {
            Route::Verify {
                phone,
                name,
                signup,
            } => Some(Self::new(phone, name.as_deref(), *signup, cooldown)),
            _ => None,
        }
    }

    pub fn phone(&self) -> &str {
        &self.phone
    }

    /// Time left before a resend is allowed.
    pub fn remaining(&self) -> Duration {
        self.resend_at.saturating_duration_since(Instant::now())
    }

    pub fn can_resend(&self) -> bool {
        self.remaining().is_zero()
    }

    pub async fn submit(
        &self,
        session: &SessionStore,
        notifier: &dyn Notifier,
        input: &str,
    ) -> Result<User, FlowError> {
        let code = OtpCode::parse(input)?;
        let name = if self.is_signup {
            self.name.as_deref()
        } else {
            None
        };

        match session.verify_otp(&self.phone, code.as_str(), name).await {
            Ok(user) => {
                let description = if self.is_signup {
                    "Account created successfully!"
                } else {
                    "Logged in successfully!"
                };
                notifier.notify(Toast::success("Success", description));
                Ok(user)
            }
            Err(e) => {
                notifier.notify(Toast::error("Invalid OTP. Please try again."));
                Err(e.into())
            }
        }
    }

    pub async fn resend(
        &mut self,
        session: &SessionStore,
        notifier: &dyn Notifier,
    ) -> Result<(), FlowError> {
        let remaining = self.remaining();
        if !remaining.is_zero() {
            debug!("Resend requested {:?} early", remaining);
            return Err(FlowError::ResendLocked { remaining });
        }

        let name = if self.is_signup {
            self.name.as_deref()
        } else {
            None
        };
        if let Err(e) = session.send_otp(&self.phone, name).await {
            notifier.notify(Toast::error("Failed to resend OTP. Please try again."));
            return Err(e.into());
        }

        self.resend_at = Instant::now() + self.cooldown;
        notifier.notify(Toast::success(
            "OTP Resent",
            "A new OTP has been sent to your phone.",
        ));
        Ok(())
    }
}
