//! Input validation functions
//!
//! This module provides validation utilities for user input.
//! Uses both custom validators and the `validator` crate for derive macros.

use std::sync::OnceLock;

fn username_regex() -> &'static regex_lite::Regex {
    static RE: OnceLock<regex_lite::Regex> = OnceLock::new();
    RE.get_or_init(|| {
        regex_lite::Regex::new(r"^[A-Za-z0-9_.\-]+$").expect("username pattern is valid")
    })
}

/// Validate username format
pub fn validate_username(username: &str) -> Result<(), String> {
    if username.is_empty() {
        return Err("Username cannot be empty".to_string());
    }
    if username.len() > 50 {
        return Err("Username too long".to_string());
    }
    if !username_regex().is_match(username) {
        return Err("Username may only contain letters, digits, '.', '_' and '-'".to_string());
    }
    Ok(())
}

/// Validate password strength
pub fn validate_password(password: &str) -> Result<(), String> {
    let length = password.chars().count();
    if length < 8 {
        return Err("Password must be at least 8 characters".to_string());
    }
    if length > 128 {
        return Err("Password too long".to_string());
    }
    Ok(())
}

/// Validation error with field context
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
    pub display_label: String,
}

/// Map technical field names to user-friendly display labels
pub fn get_field_display_label(field_name: &str) -> &str {
    match field_name {
        "username" => "Username",
        "password" => "Password",
        "current_password" => "Current Password",
        "new_password" => "New Password",
        "refresh_token" => "Refresh Token",
        "first_name" => "First Name",
        "last_name" => "Last Name",
        "email" => "Email",
        _ => field_name,
    }
}

impl ValidationError {
    pub fn new(field: &str, message: &str) -> Self {
        Self {
            field: field.to_string(),
            message: message.to_string(),
            display_label: get_field_display_label(field).to_string(),
        }
    }

    /// Format as user-friendly error message
    pub fn user_message(&self) -> String {
        format!("{}: {}", self.display_label, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case("admin")]
    #[case("john.doe")]
    #[case("user_01-x")]
    fn test_valid_usernames(#[case] username: &str) {
        assert!(validate_username(username).is_ok());
    }

    #[rstest]
    #[case("")]
    #[case("has space")]
    #[case("semi;colon")]
    #[case("emoji🙂")]
    fn test_invalid_usernames(#[case] username: &str) {
        assert!(validate_username(username).is_err());
    }

    #[test]
    fn test_username_too_long() {
        let name = "a".repeat(51);
        assert_eq!(validate_username(&name), Err("Username too long".to_string()));
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("12345678").is_ok());
        assert!(validate_password("1234567").is_err());
        assert!(validate_password(&"x".repeat(129)).is_err());
    }

    #[rstest]
    #[case("éééé", false)]
    #[case("éééééééé", true)]
    #[case("пароль12", true)]
    #[case("🔑🔑🔑🔑🔑🔑🔑", false)]
    fn test_validate_password_counts_characters(#[case] password: &str, #[case] ok: bool) {
        assert_eq!(validate_password(password).is_ok(), ok);
    }

    #[test]
    fn test_long_multibyte_password_within_limit() {
        assert!(validate_password(&"é".repeat(100)).is_ok());
        assert!(validate_password(&"é".repeat(128)).is_ok());
        assert!(validate_password(&"é".repeat(129)).is_err());
    }

    #[test]
    fn test_validation_error_uses_display_label() {
        let err = ValidationError::new("new_password", "must be at least 8 characters");
        assert_eq!(err.field, "new_password");
        assert_eq!(err.user_message(), "New Password: must be at least 8 characters");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_password_length_valid(len in 8usize..=128) {
            let password: String = (0..len).map(|_| 'a').collect();
            prop_assert!(validate_password(&password).is_ok());
        }

        #[test]
        fn prop_short_password_rejected(len in 0usize..8) {
            let password: String = (0..len).map(|_| 'a').collect();
            prop_assert!(validate_password(&password).is_err());
        }
    }
}
