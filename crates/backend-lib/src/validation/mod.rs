// ============================
// crates/backend-lib/src/validation/mod.rs
// ============================
//! Request validation module.

use authgate_common::{LoginRequest, RegisterRequest};
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321 SMTP limit
const MAX_PASSWORD_LENGTH: usize = 128;
const MAX_FIELD_LENGTH: usize = 100;

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
        .unwrap_or_else(|e| panic!("email pattern is a valid regex: {e}"))
});

/// Possible validation errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("{0} is too long")]
    TooLong(&'static str),

    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    #[error("Invalid password: {0}")]
    InvalidPassword(String),
}

/// Result type for validation operations
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Trim and lower-case an email so it can be used as an identity key
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Validate an email address
pub fn validate_email(email: &str) -> ValidationResult<&str> {
    if email.is_empty() {
        return Err(ValidationError::Missing("email"));
    }

    if email.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::InvalidEmail(format!(
            "Email cannot exceed {MAX_EMAIL_LENGTH} characters"
        )));
    }

    if !EMAIL_REGEX.is_match(email) {
        return Err(ValidationError::InvalidEmail(
            "Email format is invalid".to_string(),
        ));
    }

    Ok(email)
}

/// Validate a new password against the configured minimum length
pub fn validate_password(password: &str, min_length: usize) -> ValidationResult<&str> {
    if password.is_empty() {
        return Err(ValidationError::Missing("password"));
    }

    let length = password.chars().count();
    if length < min_length {
        return Err(ValidationError::InvalidPassword(format!(
            "Password must be at least {min_length} characters"
        )));
    }

    if length > MAX_PASSWORD_LENGTH {
        return Err(ValidationError::InvalidPassword(format!(
            "Password cannot exceed {MAX_PASSWORD_LENGTH} characters"
        )));
    }

    Ok(password)
}

fn required<'a>(field: &'static str, value: &'a str) -> ValidationResult<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Missing(field));
    }
    if trimmed.chars().count() > MAX_FIELD_LENGTH {
        return Err(ValidationError::TooLong(field));
    }
    Ok(trimmed)
}

/// Registration input after validation and normalization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub role: String,
}

/// Validate a register body; the password is checked but not copied
pub fn validate_registration(
    req: &RegisterRequest,
    min_password_length: usize,
) -> ValidationResult<Registration> {
    let name = required("name", &req.name)?;
    let email = normalize_email(&req.email);
    validate_email(&email)?;
    validate_password(&req.password, min_password_length)?;
    let role = required("role", &req.role)?;

    Ok(Registration {
        name: name.to_string(),
        email,
        role: role.to_string(),
    })
}

/// Validate a login body, returning the normalized email
///
/// Only presence is checked: the password policy may have changed since
/// the identity registered.
pub fn validate_login(req: &LoginRequest) -> ValidationResult<String> {
    let email = normalize_email(&req.email);
    validate_email(&email)?;
    if req.password.is_empty() {
        return Err(ValidationError::Missing("password"));
    }
    Ok(email)
}
