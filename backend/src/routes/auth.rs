//! Authentication routes
//!
//! Login is wrapped by the lockout tracker: a blocked (ip, username) pair is
//! rejected before any credential work (and still reported to the login
//! notifier), and the outcome of every attempt that reaches the auth service
//! is recorded against both scopes.

use crate::auth::ClientInfo;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::{extract::State, routing::post, Json, Router};
use folio_shared::{AuthTokens, LoginRequest, LoginResponse, RefreshTokenRequest};
use tracing::warn;
use validator::Validate;

/// Create auth routes
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/refresh", post(refresh_token))
}

/// Login with username and password
///
/// POST /api/v1/auth/login
async fn login(
    State(state): State<AppState>,
    client: ClientInfo,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    if req.validate().is_err() {
        return Err(ApiError::validation("Username and password are required"));
    }

    let auth = state.auth();
    auth.check_login_allowed(&client.ip, &req.username, &client.user_agent)
        .map_err(|e| {
            warn!(client_ip = %client.ip, username = %req.username, "Login blocked");
            e
        })?;

    match auth
        .login(&req.username, &req.password, &client.ip, &client.user_agent)
        .await
    {
        Ok(response) => {
            auth.record_login_success(&client.ip, &req.username);
            Ok(Json(response))
        }
        Err(e) => {
            auth.record_login_failure(&client.ip, &req.username);
            Err(e.into())
        }
    }
}

/// Refresh access token
///
/// POST /api/v1/auth/refresh
async fn refresh_token(
    State(state): State<AppState>,
    Json(req): Json<RefreshTokenRequest>,
) -> ApiResult<Json<AuthTokens>> {
    if req.refresh_token.is_empty() {
        return Err(ApiError::validation("Refresh token is required"));
    }
    let tokens = state.auth().refresh(&req.refresh_token).await?;
    Ok(Json(tokens))
}
