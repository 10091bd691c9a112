//! Authentication service
//!
//! Composes the user store, password hashing, token issuance and login
//! notifications. Lockout checks are applied by the caller around
//! [`AuthService::login`]; the pass-through helpers below exist so the
//! transport layer only ever talks to this service.
//!
//! # Performance
//!
//! Password hashing and verification run on the blocking thread pool.

use crate::auth::{
    BlockStatus, BruteForceProtector, JwtManager, PasswordService, TokenClaims,
};
use crate::repositories::UserStore;
use crate::services::notifier::{dispatch, LoginEvent, LoginNotifier};
use folio_shared::{AuthError, AuthTokens, LoginResponse, PublicUser, UpdateProfileRequest};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const TOKEN_TYPE: &str = "Bearer";

/// Authentication orchestrator
pub struct AuthService {
    users: Arc<dyn UserStore>,
    jwt: Arc<JwtManager>,
    protector: Arc<BruteForceProtector>,
    notifier: Arc<dyn LoginNotifier>,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        jwt: Arc<JwtManager>,
        protector: Arc<BruteForceProtector>,
        notifier: Arc<dyn LoginNotifier>,
    ) -> Self {
        Self {
            users,
            jwt,
            protector,
            notifier,
        }
    }

    pub fn jwt(&self) -> &Arc<JwtManager> {
        &self.jwt
    }

    pub fn protector(&self) -> &Arc<BruteForceProtector> {
        &self.protector
    }

    fn notify_failure(&self, identifier: &str, client_ip: &str, user_agent: &str, reason: &str) {
        dispatch(
            &self.notifier,
            LoginEvent::failure(identifier, client_ip, user_agent, reason),
        );
    }

    /// Authenticate a login attempt and issue a token pair
    ///
    /// Unknown users and wrong passwords both yield `InvalidCredentials`.
    /// Every outcome is reported to the notifier.
    pub async fn login(
        &self,
        identifier: &str,
        password: &str,
        client_ip: &str,
        user_agent: &str,
    ) -> Result<LoginResponse, AuthError> {
        debug!(identifier, client_ip, "Login attempt");

        let result = self.authenticate(identifier, password, client_ip, user_agent).await;
        let outcome = match &result {
            Ok(_) => "success",
            Err(AuthError::InvalidCredentials) => "invalid_credentials",
            Err(_) => "error",
        };
        metrics::counter!("auth_login_total", "outcome" => outcome).increment(1);
        result
    }

    async fn authenticate(
        &self,
        identifier: &str,
        password: &str,
        client_ip: &str,
        user_agent: &str,
    ) -> Result<LoginResponse, AuthError> {
        let user = match self.users.get_credential(identifier).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                self.notify_failure(identifier, client_ip, user_agent, "User not found");
                warn!(identifier, client_ip, "Login failed: user not found");
                return Err(AuthError::InvalidCredentials);
            }
            Err(e) => {
                self.notify_failure(identifier, client_ip, user_agent, "User lookup error");
                error!(error = %e, identifier, "Login failed: user lookup error");
                return Err(AuthError::system(e));
            }
        };

        let valid = match PasswordService::verify_async(password.to_string(), user.password.clone())
            .await
        {
            Ok(valid) => valid,
            Err(e) => {
                self.notify_failure(
                    identifier,
                    client_ip,
                    user_agent,
                    "Password verification error",
                );
                error!(error = %e, user_id = %user.id, "Login failed: password verification error");
                return Err(e.into());
            }
        };

        if !valid {
            self.notify_failure(identifier, client_ip, user_agent, "Invalid password");
            warn!(identifier, client_ip, "Login failed: invalid credentials");
            return Err(AuthError::InvalidCredentials);
        }

        let subject = user.id.to_string();
        let access_token = self
            .jwt
            .issue_access_token(&subject, &user.username, user.is_admin)
            .map_err(|e| {
                self.notify_failure(identifier, client_ip, user_agent, "Token generation error");
                error!(error = %e, "Login failed: token generation error");
                e
            })?;
        let refresh_token = self
            .jwt
            .issue_refresh_token(&subject, &user.username, user.is_admin)
            .map_err(|e| {
                self.notify_failure(
                    identifier,
                    client_ip,
                    user_agent,
                    "Refresh token generation error",
                );
                error!(error = %e, "Login failed: refresh token generation error");
                e
            })?;

        dispatch(
            &self.notifier,
            LoginEvent::success(identifier, client_ip, user_agent),
        );
        info!(
            user_id = %user.id,
            username = %user.username,
            is_admin = user.is_admin,
            "Login successful"
        );

        Ok(LoginResponse {
            access_token,
            refresh_token,
            token_type: TOKEN_TYPE.to_string(),
            expires_in: self.jwt.access_token_expiry_secs(),
            user: user.to_public(),
        })
    }

    /// Exchange a refresh token for a fresh token pair
    pub async fn refresh(&self, refresh_token: &str) -> Result<AuthTokens, AuthError> {
        let claims = self.jwt.verify_refresh_token(refresh_token)?;
        let user_id = Uuid::parse_str(&claims.subject_id)
            .map_err(|_| AuthError::TokenInvalid(folio_shared::TokenError::Malformed))?;

        // Re-load so revoked admin rights or deleted users take effect
        let user = self
            .users
            .find_by_id(user_id)
            .await
            .map_err(AuthError::system)?
            .ok_or(AuthError::InvalidCredentials)?;

        let subject = user.id.to_string();
        Ok(AuthTokens {
            access_token: self
                .jwt
                .issue_access_token(&subject, &user.username, user.is_admin)?,
            refresh_token: self
                .jwt
                .issue_refresh_token(&subject, &user.username, user.is_admin)?,
            token_type: TOKEN_TYPE.to_string(),
            expires_in: self.jwt.access_token_expiry_secs(),
        })
    }

    pub async fn get_profile(&self, user_id: Uuid) -> Result<PublicUser, AuthError> {
        debug!(%user_id, "Getting user profile");
        let user = self
            .users
            .find_by_id(user_id)
            .await
            .map_err(AuthError::system)?
            .ok_or(AuthError::InvalidCredentials)?;
        Ok(user.to_public())
    }

    /// Overwrite the caller's name and email
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        profile: &UpdateProfileRequest,
    ) -> Result<PublicUser, AuthError> {
        let user = self
            .users
            .update_profile(user_id, profile)
            .await
            .map_err(AuthError::system)?
            .ok_or(AuthError::InvalidCredentials)?;

        info!(%user_id, "Profile updated");
        Ok(user.to_public())
    }

    /// Change a password after verifying the current one
    ///
    /// A wrong current password is reported as `InvalidCredentials`.
    pub async fn update_password(
        &self,
        user_id: Uuid,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let user = self
            .users
            .find_by_id(user_id)
            .await
            .map_err(AuthError::system)?
            .ok_or(AuthError::InvalidCredentials)?;

        if !self.verify_password(current_password, &user.password).await? {
            warn!(%user_id, "Password change rejected: current password is incorrect");
            return Err(AuthError::InvalidCredentials);
        }

        let hash = self.hash_password(new_password).await?;
        let updated = self
            .users
            .update_password_hash(user_id, &hash)
            .await
            .map_err(AuthError::system)?;
        if !updated {
            return Err(AuthError::InvalidCredentials);
        }

        info!(%user_id, "Password updated successfully");
        Ok(())
    }

    /// Hash a password into its canonical encoded form
    pub async fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let hash = PasswordService::hash_async(password.to_string()).await?;
        Ok(hash.to_string())
    }

    pub async fn verify_password(&self, password: &str, encoded: &str) -> Result<bool, AuthError> {
        Ok(PasswordService::verify_async(password.to_string(), encoded.to_string()).await?)
    }

    pub fn is_login_blocked(&self, client_ip: &str, identifier: &str) -> BlockStatus {
        self.protector.is_blocked(client_ip, identifier)
    }

    /// Fails with `RateLimited` while either scope is blocked
    ///
    /// A blocked attempt is reported to the notifier like any other failure.
    pub fn check_login_allowed(
        &self,
        client_ip: &str,
        identifier: &str,
        user_agent: &str,
    ) -> Result<(), AuthError> {
        self.protector.check(client_ip, identifier).map_err(|e| {
            self.notify_failure(
                identifier,
                client_ip,
                user_agent,
                "Blocked: too many failed attempts",
            );
            metrics::counter!("auth_login_total", "outcome" => "blocked").increment(1);
            e
        })
    }

    pub fn record_login_failure(&self, client_ip: &str, identifier: &str) {
        self.protector.record_failure(client_ip, identifier);
    }

    pub fn record_login_success(&self, client_ip: &str, identifier: &str) {
        self.protector.record_success(client_ip, identifier);
    }

    pub fn issue_access_token(&self, user: &PublicUser) -> Result<String, AuthError> {
        self.jwt
            .issue_access_token(&user.id, &user.username, user.is_admin)
    }

    pub fn issue_refresh_token(&self, user: &PublicUser) -> Result<String, AuthError> {
        self.jwt
            .issue_refresh_token(&user.id, &user.username, user.is_admin)
    }

    /// Verify an access token
    pub fn verify_token(&self, token: &str) -> Result<TokenClaims, AuthError> {
        Ok(self.jwt.verify_access_token(token)?)
    }
}
