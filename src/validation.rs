//! Local input validation. Failures here are surfaced inline and never reach
//! the network.

use crate::error::{ServiceError, ServiceResult};

pub const MAX_TITLE_LENGTH: usize = 200;
pub const MAX_CONTENT_LENGTH: usize = 100_000;
pub const MAX_CATEGORY_NAME_LENGTH: usize = 64;
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Password strength buckets from the registration flow. The score counts
/// satisfied requirements: length, uppercase, lowercase, digit, special.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PasswordStrength {
    Weak,
    Fair,
    Good,
    Strong,
}

pub fn password_strength(password: &str) -> PasswordStrength {
    let mut score = 0u8;
    if password.len() >= MIN_PASSWORD_LENGTH {
        score += 1;
    }
    if password.chars().any(|ch| ch.is_ascii_uppercase()) {
        score += 1;
    }
    if password.chars().any(|ch| ch.is_ascii_lowercase()) {
        score += 1;
    }
    if password.chars().any(|ch| ch.is_ascii_digit()) {
        score += 1;
    }
    if password
        .chars()
        .any(|ch| "!@#$%^&*(),.?\":{}|<>".contains(ch))
    {
        score += 1;
    }
    match score {
        0 | 1 => PasswordStrength::Weak,
        2 | 3 => PasswordStrength::Fair,
        4 => PasswordStrength::Good,
        _ => PasswordStrength::Strong,
    }
}

pub fn validate_email(email: &str) -> ServiceResult<()> {
    let trimmed = email.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::validation("email", "email is required"));
    }
    let mut parts = trimmed.splitn(2, '@');
    let local = parts.next().unwrap_or_default();
    let domain = parts.next().unwrap_or_default();
    let valid = !local.is_empty()
        && !domain.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !trimmed.chars().any(char::is_whitespace);
    if valid {
        Ok(())
    } else {
        Err(ServiceError::validation(
            "email",
            "please enter a valid email address",
        ))
    }
}

pub fn validate_password(password: &str) -> ServiceResult<()> {
    if password.is_empty() {
        return Err(ServiceError::validation("password", "password is required"));
    }
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(ServiceError::validation(
            "password",
            format!("password must be at least {MIN_PASSWORD_LENGTH} characters"),
        ));
    }
    if password_strength(password) < PasswordStrength::Fair {
        return Err(ServiceError::validation(
            "password",
            "password is too weak; mix cases, digits or symbols",
        ));
    }
    Ok(())
}

pub fn validate_note_fields(title: &str, content: &str) -> ServiceResult<()> {
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(ServiceError::validation(
            "title",
            format!("title exceeds {MAX_TITLE_LENGTH} characters"),
        ));
    }
    if content.chars().count() > MAX_CONTENT_LENGTH {
        return Err(ServiceError::validation(
            "content",
            format!("content exceeds {MAX_CONTENT_LENGTH} characters"),
        ));
    }
    Ok(())
}

pub fn validate_category_name(name: &str) -> ServiceResult<()> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::validation("name", "category name is required"));
    }
    if trimmed.chars().count() > MAX_CATEGORY_NAME_LENGTH {
        return Err(ServiceError::validation(
            "name",
            format!("category name exceeds {MAX_CATEGORY_NAME_LENGTH} characters"),
        ));
    }
    Ok(())
}
