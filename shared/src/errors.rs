//! Error types for the Folio application

use std::time::Duration;
use thiserror::Error;

/// Why a token failed verification
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    /// Signature did not match any accepted secret
    #[error("invalid signature")]
    InvalidSignature,

    /// Outside its validity window (`exp` passed or `nbf` not yet reached)
    #[error("token expired")]
    Expired,

    /// Not a decodable token, wrong algorithm, or wrong token type
    #[error("malformed token")]
    Malformed,
}

/// Authentication error types
///
/// Only `RateLimited` carries information meant for the end user. Everything
/// else is rendered generically by the transport layer.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Unknown user or wrong password; the two are never distinguished
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Failure inside the auth machinery (bad stored hash, signing failure, store outage)
    #[error("Authentication error: {0}")]
    System(String),

    #[error("Too many failed login attempts, retry in {}s", .retry_after.as_secs())]
    RateLimited { retry_after: Duration },

    #[error("Invalid token: {0}")]
    TokenInvalid(#[from] TokenError),

    /// The OS random source failed; salts and secrets must not be produced
    #[error("Random source unavailable: {0}")]
    RandomSource(String),
}

impl AuthError {
    /// Build a `System` error from anything displayable
    pub fn system(err: impl std::fmt::Display) -> Self {
        AuthError::System(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_credentials_message_is_generic() {
        assert_eq!(AuthError::InvalidCredentials.to_string(), "Invalid credentials");
    }

    #[test]
    fn test_rate_limited_reports_seconds() {
        let err = AuthError::RateLimited {
            retry_after: Duration::from_secs(30),
        };
        assert_eq!(err.to_string(), "Too many failed login attempts, retry in 30s");
    }

    #[test]
    fn test_token_error_converts() {
        let err: AuthError = TokenError::Expired.into();
        assert!(matches!(err, AuthError::TokenInvalid(TokenError::Expired)));
    }
}
