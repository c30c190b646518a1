//! Client-side form validation.
//!
//! Forms are checked before anything is sent. Every failing field is
//! reported with a user-facing message, in field order.

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

use crate::models::NewTeamMember;

/// Minimum password length accepted by the login form
const MIN_PASSWORD_LENGTH: usize = 6;

/// Minimum phone number length accepted by the member form
const MIN_PHONE_LENGTH: usize = 10;

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(
        r"^[A-Za-z0-9_'+\-.]*[A-Za-z0-9_+\-]@([A-Za-z0-9][A-Za-z0-9\-]*\.)+[A-Za-z]{2,}$"
    )
    .expect("email pattern is valid");
}

/// A single failed check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

#[derive(Error, Debug, Clone, PartialEq, Eq, Default)]
#[error("Invalid input ({})", summarize(.errors))]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    fn add(&mut self, field: &'static str, message: &str) {
        self.errors.push(FieldError {
            field,
            message: message.to_string(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Message for `field`, if it failed
    pub fn get(&self, field: &str) -> Option<&str> {
        self.errors
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }

    fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

fn summarize(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Whether `email` looks like a deliverable address
pub fn is_valid_email(email: &str) -> bool {
    !email.starts_with('.') && !email.contains("..") && EMAIL_RE.is_match(email)
}

#[derive(Debug, Clone, Default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

impl LoginForm {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        if self.username.is_empty() {
            errors.add("username", "Username is required");
        }
        if self.password.chars().count() < MIN_PASSWORD_LENGTH {
            errors.add("password", "Password must be at least 6 characters");
        }
        errors.into_result()
    }
}

impl NewTeamMember {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        if self.first_name.is_empty() {
            errors.add("first_name", "First name is required");
        }
        if self.last_name.is_empty() {
            errors.add("last_name", "Last name is required");
        }
        if self.phone_number.chars().count() < MIN_PHONE_LENGTH {
            errors.add("phone_number", "Invalid phone number");
        }
        if !is_valid_email(&self.email) {
            errors.add("email", "Invalid email address");
        }
        errors.into_result()
    }
}
