//! Typed, validated user input.
//!
//! Each constructor either returns a value that is known to be well formed or
//! a [`FormErrors`] listing every field that failed.

use crate::attachment::ImageAttachment;
use std::fmt;
use thiserror::Error;

pub const MIN_PHONE_DIGITS: usize = 10;
pub const MIN_NAME_CHARS: usize = 2;
pub const MAX_TITLE_CHARS: usize = 50;
pub const MAX_MESSAGE_CHARS: usize = 1000;
pub const OTP_LENGTH: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: &'static str,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Error)]
#[error("{}", join(.0))]
pub struct FormErrors(pub Vec<FieldError>);

fn join(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl FormErrors {
    fn push(&mut self, field: &'static str, message: &'static str) {
        self.0.push(FieldError { field, message });
    }

    pub fn field(&self, field: &str) -> Option<&'static str> {
        self.0.iter().find(|e| e.field == field).map(|e| e.message)
    }

    fn into_result<T>(self, value: impl FnOnce() -> T) -> Result<T, FormErrors> {
        if self.0.is_empty() {
            Ok(value())
        } else {
            Err(self)
        }
    }
}

/// Dial code plus national number, e.g. `+15551234567`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    pub fn new(dial_code: &str, digits: &str) -> Result<Self, FormErrors> {
        let mut errors = FormErrors::default();
        check_phone(&mut errors, dial_code, digits);
        errors.into_result(|| Self(format!("{}{}", dial_code.trim(), digits)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn check_phone(errors: &mut FormErrors, dial_code: &str, digits: &str) {
    if dial_code.trim().is_empty() {
        errors.push("country_code", "Please select a country");
    }
    if digits.chars().count() < MIN_PHONE_DIGITS {
        errors.push("phone_number", "Phone number must be at least 10 digits");
    }
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        errors.push("phone_number", "Phone number must contain only digits");
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoginForm {
    pub country_code: String,
    pub phone_number: String,
}

impl LoginForm {
    pub fn validate(&self) -> Result<PhoneNumber, FormErrors> {
        PhoneNumber::new(&self.country_code, &self.phone_number)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SignupForm {
    pub name: String,
    pub country_code: String,
    pub phone_number: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signup {
    pub name: String,
    pub phone: PhoneNumber,
}

impl SignupForm {
    pub fn validate(&self) -> Result<Signup, FormErrors> {
        let mut errors = FormErrors::default();
        let name = self.name.trim();
        if name.chars().count() < MIN_NAME_CHARS {
            errors.push("name", "Name must be at least 2 characters");
        }
        check_phone(&mut errors, &self.country_code, &self.phone_number);

        errors.into_result(|| Signup {
            name: name.to_string(),
            phone: PhoneNumber(format!(
                "{}{}",
                self.country_code.trim(),
                self.phone_number
            )),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpCode(String);

impl OtpCode {
    pub fn parse(input: &str) -> Result<Self, FormErrors> {
        let code = input.trim();
        let mut errors = FormErrors::default();
        if code.len() != OTP_LENGTH || !code.chars().all(|c| c.is_ascii_digit()) {
            errors.push("otp", "OTP must be 6 digits");
        }
        errors.into_result(|| Self(code.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatroomTitle(String);

impl ChatroomTitle {
    pub fn parse(input: &str) -> Result<Self, FormErrors> {
        let title = input.trim();
        let mut errors = FormErrors::default();
        if title.is_empty() {
            errors.push("title", "Title is required");
        } else if title.chars().count() > MAX_TITLE_CHARS {
            errors.push("title", "Title must be less than 50 characters");
        }
        errors.into_result(|| Self(title.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Text and/or image ready to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageDraft {
    pub text: String,
    pub image: Option<ImageAttachment>,
}

impl MessageDraft {
    pub fn new(text: &str, image: Option<ImageAttachment>) -> Result<Self, FormErrors> {
        let text = text.trim();
        let mut errors = FormErrors::default();
        if text.is_empty() && image.is_none() {
            errors.push("message", "Message cannot be empty");
        } else if text.chars().count() > MAX_MESSAGE_CHARS {
            errors.push("message", "Message must be at most 1000 characters");
        }
        errors.into_result(|| Self {
            text: text.to_string(),
            image,
        })
    }
}
