//! API request and response types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// API error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

/// Error detail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Only present on rate-limited responses
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seconds_remaining: Option<u64>,
}

/// Login request
///
/// Missing fields deserialize as empty so they fail validation, not parsing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// User without sensitive information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: String,
    pub username: String,
    pub email: String,
    pub first_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Successful login response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: PublicUser,
}

/// Authentication tokens response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// Refresh token request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

/// Password change request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Profile update request
///
/// Missing fields deserialize as empty so they fail validation, not parsing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 100, message = "First name is required"))]
    pub first_name: String,
    #[validate(length(max = 100, message = "Last name too long"))]
    pub last_name: Option<String>,
    #[validate(email(message = "A valid email address is required"))]
    pub email: String,
}

/// Plain acknowledgement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Non-sensitive view of the access-token signing secret
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretInfo {
    pub current_secret_created_at: DateTime<Utc>,
    pub next_rotation_at: DateTime<Utc>,
    pub has_previous_secret: bool,
    pub rotation_interval_days: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_request_requires_both_fields() {
        let req = LoginRequest {
            username: "".to_string(),
            password: "secret".to_string(),
        };
        assert!(req.validate().is_err());

        let req = LoginRequest {
            username: "admin".to_string(),
            password: "".to_string(),
        };
        assert!(req.validate().is_err());

        let req = LoginRequest {
            username: "admin".to_string(),
            password: "secret".to_string(),
        };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_update_profile_request_validation() {
        let req: UpdateProfileRequest =
            serde_json::from_str(r#"{"first_name":"Ada","email":"ada@example.com"}"#).unwrap();
        assert!(req.validate().is_ok());
        assert!(req.last_name.is_none());

        let missing: UpdateProfileRequest = serde_json::from_str(r#"{"email":"ada@example.com"}"#).unwrap();
        assert!(missing.validate().is_err());

        let bad_email = UpdateProfileRequest {
            email: "not-an-email".to_string(),
            ..req
        };
        assert!(bad_email.validate().is_err());
    }

    #[test]
    fn test_error_detail_omits_seconds_when_absent() {
        let body = ErrorResponse {
            error: ErrorDetail {
                code: "UNAUTHORIZED".to_string(),
                message: "Invalid credentials".to_string(),
                field: None,
                seconds_remaining: None,
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json["error"].get("seconds_remaining").is_none());
    }

    #[test]
    fn test_public_user_skips_missing_last_name() {
        let now = Utc::now();
        let user = PublicUser {
            id: "1".to_string(),
            username: "admin".to_string(),
            email: "admin@example.com".to_string(),
            first_name: "Ada".to_string(),
            last_name: None,
            is_admin: true,
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("last_name").is_none());
        assert_eq!(json["is_admin"], true);
    }
}
