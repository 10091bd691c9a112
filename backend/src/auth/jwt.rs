//! JWT token generation and validation with signing secret rotation
//!
//! Access tokens are signed (HS256) with a rotating secret. The manager holds
//! the current secret and the one it replaced; verification tries the
//! current secret first and falls back to the previous one, so tokens issued
//! just before a rotation stay valid until they expire. A second rotation
//! discards that previous secret for good.
//!
//! Refresh tokens use a separate, static secret from configuration.

use crate::tasks::PeriodicTask;
use argon2::password_hash::rand_core::{OsRng, RngCore};
use chrono::{DateTime, Duration, Utc};
use folio_shared::{AuthError, SecretInfo, TokenError};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

/// Size of generated signing secrets
pub const SECRET_LEN: usize = 32;

/// Token kind, carried in the claims so one cannot stand in for the other
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// JWT claims
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    #[serde(rename = "user_id")]
    pub subject_id: String,
    #[serde(rename = "username")]
    pub display_name: String,
    #[serde(rename = "is_admin")]
    pub is_privileged: bool,
    pub token_type: TokenType,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Not before (Unix timestamp)
    pub nbf: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

/// Pre-computed JWT keys for efficient token operations
struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl JwtKeys {
    fn from_secret(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }
}

/// A signing secret and when it was installed
#[derive(Clone)]
struct SigningSecret {
    keys: Arc<JwtKeys>,
    created_at: DateTime<Utc>,
}

impl SigningSecret {
    fn new(secret: &[u8], created_at: DateTime<Utc>) -> Self {
        Self {
            keys: Arc::new(JwtKeys::from_secret(secret)),
            created_at,
        }
    }
}

/// Current and previous secrets; always read and replaced together
struct SecretPair {
    current: SigningSecret,
    previous: Option<SigningSecret>,
}

/// JWT manager configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub access_token_expiry_secs: i64,
    pub refresh_token_expiry_secs: i64,
    pub rotation_interval: std::time::Duration,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            access_token_expiry_secs: 86_400,
            refresh_token_expiry_secs: 604_800,
            rotation_interval: std::time::Duration::from_secs(7 * 24 * 60 * 60),
        }
    }
}

/// Issues and verifies tokens, rotating the access-token secret over time
pub struct JwtManager {
    secrets: RwLock<SecretPair>,
    refresh_keys: JwtKeys,
    config: JwtConfig,
    rotator: Mutex<Option<PeriodicTask>>,
}

impl JwtManager {
    /// Create a manager whose first access secret comes from configuration
    ///
    /// Call [`start`](Self::start) to enable background rotation.
    pub fn new(access_secret: &[u8], refresh_secret: &[u8], config: JwtConfig) -> Self {
        Self {
            secrets: RwLock::new(SecretPair {
                current: SigningSecret::new(access_secret, Utc::now()),
                previous: None,
            }),
            refresh_keys: JwtKeys::from_secret(refresh_secret),
            config,
            rotator: Mutex::new(None),
        }
    }

    /// Spawn the rotation check, which runs every half rotation interval
    ///
    /// Must be called within a Tokio runtime context.
    pub fn start(self: &Arc<Self>) {
        let mut slot = self.rotator.lock();
        if slot.is_some() {
            return;
        }

        let weak = Arc::downgrade(self);
        *slot = Some(PeriodicTask::spawn(
            "jwt-secret-rotation",
            self.config.rotation_interval / 2,
            move || {
                let weak = weak.clone();
                async move {
                    if let Some(manager) = weak.upgrade() {
                        if let Err(e) = manager.rotate_if_due() {
                            error!(error = %e, "Failed to rotate JWT secrets");
                        }
                    }
                }
            },
        ));
    }

    /// Stop background rotation
    pub async fn shutdown(&self) {
        let task = self.rotator.lock().take();
        if let Some(task) = task {
            task.shutdown().await;
        }
    }

    fn rotation_interval(&self) -> Duration {
        Duration::from_std(self.config.rotation_interval).unwrap_or_else(|_| Duration::weeks(1))
    }

    /// Rotate if the current secret is at least one rotation interval old
    pub fn rotate_if_due(&self) -> Result<bool, AuthError> {
        self.rotate_if_due_at(Utc::now())
    }

    pub fn rotate_if_due_at(&self, now: DateTime<Utc>) -> Result<bool, AuthError> {
        let created_at = self.secrets.read().current.created_at;
        if now - created_at < self.rotation_interval() {
            return Ok(false);
        }
        self.rotate_at(now)?;
        Ok(true)
    }

    /// Install a freshly generated secret, demoting the current one to previous
    pub fn rotate(&self) -> Result<(), AuthError> {
        self.rotate_at(Utc::now())
    }

    fn rotate_at(&self, now: DateTime<Utc>) -> Result<(), AuthError> {
        let mut bytes = [0u8; SECRET_LEN];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| AuthError::RandomSource(e.to_string()))?;
        let fresh = SigningSecret::new(&bytes, now);

        {
            let mut secrets = self.secrets.write();
            let old = std::mem::replace(&mut secrets.current, fresh);
            secrets.previous = Some(old);
        }

        metrics::counter!("auth_secret_rotations_total").increment(1);
        info!(
            rotation_time = %now,
            next_rotation = %(now + self.rotation_interval()),
            "JWT secrets rotated successfully"
        );
        Ok(())
    }

    fn build_claims(
        subject_id: &str,
        display_name: &str,
        is_privileged: bool,
        token_type: TokenType,
        expiry_secs: i64,
    ) -> TokenClaims {
        let now = Utc::now();
        TokenClaims {
            subject_id: subject_id.to_string(),
            display_name: display_name.to_string(),
            is_privileged,
            token_type,
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: (now + Duration::seconds(expiry_secs)).timestamp(),
        }
    }

    /// Generate an access token signed with the current secret
    pub fn issue_access_token(
        &self,
        subject_id: &str,
        display_name: &str,
        is_privileged: bool,
    ) -> Result<String, AuthError> {
        let claims = Self::build_claims(
            subject_id,
            display_name,
            is_privileged,
            TokenType::Access,
            self.config.access_token_expiry_secs,
        );
        let keys = Arc::clone(&self.secrets.read().current.keys);
        sign(&claims, &keys)
    }

    /// Generate a refresh token signed with the refresh secret
    pub fn issue_refresh_token(
        &self,
        subject_id: &str,
        display_name: &str,
        is_privileged: bool,
    ) -> Result<String, AuthError> {
        let claims = Self::build_claims(
            subject_id,
            display_name,
            is_privileged,
            TokenType::Refresh,
            self.config.refresh_token_expiry_secs,
        );
        sign(&claims, &self.refresh_keys)
    }

    /// Validate an access token against the current, then the previous secret
    pub fn verify_access_token(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let (current, previous) = {
            let secrets = self.secrets.read();
            (
                Arc::clone(&secrets.current.keys),
                secrets.previous.as_ref().map(|p| Arc::clone(&p.keys)),
            )
        };

        match verify(token, &current, TokenType::Access) {
            Err(TokenError::InvalidSignature) => {
                let previous = previous.ok_or(TokenError::InvalidSignature)?;
                let claims = verify(token, &previous, TokenType::Access)?;
                info!("JWT token verified with previous secret");
                Ok(claims)
            }
            result => result,
        }
    }

    /// Validate a refresh token
    pub fn verify_refresh_token(&self, token: &str) -> Result<TokenClaims, TokenError> {
        verify(token, &self.refresh_keys, TokenType::Refresh)
    }

    /// Get access token expiry in seconds
    #[inline]
    pub fn access_token_expiry_secs(&self) -> i64 {
        self.config.access_token_expiry_secs
    }

    /// Non-sensitive information about the signing secrets
    pub fn secret_info(&self) -> SecretInfo {
        let secrets = self.secrets.read();
        let interval = self.rotation_interval();
        SecretInfo {
            current_secret_created_at: secrets.current.created_at,
            next_rotation_at: secrets.current.created_at + interval,
            has_previous_secret: secrets.previous.is_some(),
            rotation_interval_days: interval.num_days(),
        }
    }
}

fn sign(claims: &TokenClaims, keys: &JwtKeys) -> Result<String, AuthError> {
    encode(&Header::new(Algorithm::HS256), claims, &keys.encoding).map_err(|e| {
        AuthError::System(format!("failed to sign {:?} token: {}", claims.token_type, e))
    })
}

fn verify(token: &str, keys: &JwtKeys, expected: TokenType) -> Result<TokenClaims, TokenError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_nbf = true;
    validation.leeway = 0;

    let data = decode::<TokenClaims>(token, &keys.decoding, &validation).map_err(|e| {
        match e.kind() {
            ErrorKind::InvalidSignature => TokenError::InvalidSignature,
            ErrorKind::ExpiredSignature | ErrorKind::ImmatureSignature => TokenError::Expired,
            _ => TokenError::Malformed,
        }
    })?;

    if data.claims.token_type != expected {
        return Err(TokenError::Malformed);
    }
    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_manager() -> JwtManager {
        JwtManager::new(b"test-secret", b"test-refresh-secret", JwtConfig::default())
    }

    fn sign_with_current(manager: &JwtManager, claims: &TokenClaims) -> String {
        let keys = Arc::clone(&manager.secrets.read().current.keys);
        sign(claims, &keys).unwrap()
    }

    #[test]
    fn test_issue_and_verify_access_token() {
        let manager = create_test_manager();
        let token = manager.issue_access_token("user-1", "admin", true).unwrap();
        let claims = manager.verify_access_token(&token).unwrap();

        assert_eq!(claims.subject_id, "user-1");
        assert_eq!(claims.display_name, "admin");
        assert!(claims.is_privileged);
        assert_eq!(claims.token_type, TokenType::Access);
        assert_eq!(claims.iat, claims.nbf);
        assert_eq!(claims.exp - claims.iat, 86_400);
    }

    #[test]
    fn test_claims_use_wire_names() {
        let claims = JwtManager::build_claims("u", "n", false, TokenType::Access, 60);
        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json["user_id"], "u");
        assert_eq!(json["username"], "n");
        assert_eq!(json["is_admin"], false);
        assert_eq!(json["token_type"], "access");
    }

    #[test]
    fn test_issue_and_verify_refresh_token() {
        let manager = create_test_manager();
        let token = manager.issue_refresh_token("user-1", "admin", false).unwrap();
        let claims = manager.verify_refresh_token(&token).unwrap();

        assert_eq!(claims.token_type, TokenType::Refresh);
        assert_eq!(claims.exp - claims.iat, 604_800);
    }

    #[test]
    fn test_refresh_token_is_not_an_access_token() {
        let manager = create_test_manager();
        let refresh = manager.issue_refresh_token("user-1", "admin", false).unwrap();
        // Signed with a different secret altogether
        assert_eq!(
            manager.verify_access_token(&refresh),
            Err(TokenError::InvalidSignature)
        );

        let access = manager.issue_access_token("user-1", "admin", false).unwrap();
        assert_eq!(
            manager.verify_refresh_token(&access),
            Err(TokenError::InvalidSignature)
        );
    }

    #[test]
    fn test_wrong_token_type_is_malformed() {
        let manager = create_test_manager();
        let claims = JwtManager::build_claims("u", "n", false, TokenType::Refresh, 60);
        let token = sign_with_current(&manager, &claims);
        assert_eq!(manager.verify_access_token(&token), Err(TokenError::Malformed));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let manager = create_test_manager();
        let other = JwtManager::new(b"wrong-secret-key", b"x", JwtConfig::default());
        let token = other.issue_access_token("user-1", "admin", true).unwrap();

        assert_eq!(
            manager.verify_access_token(&token),
            Err(TokenError::InvalidSignature)
        );
    }

    #[test]
    fn test_garbage_is_malformed() {
        let manager = create_test_manager();
        assert_eq!(
            manager.verify_access_token("invalid.token.here"),
            Err(TokenError::Malformed)
        );
        assert_eq!(manager.verify_access_token(""), Err(TokenError::Malformed));
    }

    #[test]
    fn test_expired_token_rejected() {
        let manager = create_test_manager();
        let mut claims = JwtManager::build_claims("u", "n", false, TokenType::Access, 60);
        claims.iat -= 7200;
        claims.nbf -= 7200;
        claims.exp = claims.iat + 60;
        let token = sign_with_current(&manager, &claims);

        assert_eq!(manager.verify_access_token(&token), Err(TokenError::Expired));
    }

    #[test]
    fn test_not_yet_valid_token_rejected() {
        let manager = create_test_manager();
        let mut claims = JwtManager::build_claims("u", "n", false, TokenType::Access, 60);
        claims.nbf += 3600;
        claims.exp += 7200;
        let token = sign_with_current(&manager, &claims);

        assert_eq!(manager.verify_access_token(&token), Err(TokenError::Expired));
    }

    #[test]
    fn test_grace_window_spans_exactly_one_rotation() {
        let manager = create_test_manager();
        let token = manager.issue_access_token("user-1", "admin", true).unwrap();

        manager.rotate().unwrap();
        assert!(manager.secret_info().has_previous_secret);
        assert_eq!(
            manager.verify_access_token(&token).unwrap().subject_id,
            "user-1"
        );

        manager.rotate().unwrap();
        assert_eq!(
            manager.verify_access_token(&token),
            Err(TokenError::InvalidSignature)
        );
    }

    #[test]
    fn test_new_tokens_use_rotated_secret() {
        let manager = create_test_manager();
        manager.rotate().unwrap();
        let token = manager.issue_access_token("user-2", "editor", false).unwrap();
        manager.rotate().unwrap();
        // Still within the grace window
        assert!(manager.verify_access_token(&token).is_ok());
    }

    #[test]
    fn test_refresh_secret_does_not_rotate() {
        let manager = create_test_manager();
        let token = manager.issue_refresh_token("user-1", "admin", true).unwrap();
        manager.rotate().unwrap();
        manager.rotate().unwrap();
        assert!(manager.verify_refresh_token(&token).is_ok());
    }

    #[test]
    fn test_rotate_if_due() {
        let manager = create_test_manager();
        let now = Utc::now();

        assert!(!manager.rotate_if_due_at(now + Duration::days(6)).unwrap());
        assert!(!manager.secret_info().has_previous_secret);

        assert!(manager.rotate_if_due_at(now + Duration::days(7)).unwrap());
        let info = manager.secret_info();
        assert!(info.has_previous_secret);
        assert_eq!(info.current_secret_created_at, now + Duration::days(7));

        // Clock restarted from the rotation
        assert!(!manager.rotate_if_due_at(now + Duration::days(8)).unwrap());
    }

    #[test]
    fn test_secret_info() {
        let manager = create_test_manager();
        let info = manager.secret_info();
        assert_eq!(info.rotation_interval_days, 7);
        assert!(!info.has_previous_secret);
        assert_eq!(
            info.next_rotation_at - info.current_secret_created_at,
            Duration::days(7)
        );
    }

    #[tokio::test]
    async fn test_start_and_shutdown() {
        let manager = Arc::new(create_test_manager());
        manager.start();
        manager.shutdown().await;
        assert!(manager.rotator.lock().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_verify_during_rotation() {
        let manager = Arc::new(create_test_manager());
        let token = manager.issue_access_token("user-1", "admin", true).unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let manager = Arc::clone(&manager);
            let token = token.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..50 {
                    assert!(manager.verify_access_token(&token).is_ok());
                }
            }));
        }
        manager.rotate().unwrap();

        for handle in handles {
            handle.await.unwrap();
        }
    }
}
