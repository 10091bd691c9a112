//! Admin routes
//!
//! Every handler takes an [`AdminUser`], so requests without a valid access
//! token get 401 and non-admin tokens get 403.

use crate::auth::AdminUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::{
    extract::State,
    routing::{get, put},
    Json, Router,
};
use folio_shared::{
    validation::{validate_password, ValidationError},
    AuthError, MessageResponse, PublicUser, SecretInfo, UpdatePasswordRequest,
    UpdateProfileRequest,
};
use validator::Validate;

/// Create admin routes
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/profile", get(get_profile).put(update_profile))
        .route("/profile/password", put(update_password))
        .route("/auth/secret-info", get(secret_info))
}

/// GET /api/v1/admin/profile
async fn get_profile(
    State(state): State<AppState>,
    AdminUser(user): AdminUser,
) -> ApiResult<Json<PublicUser>> {
    let profile = state.auth().get_profile(user.user_id()?).await?;
    Ok(Json(profile))
}

/// PUT /api/v1/admin/profile
async fn update_profile(
    State(state): State<AppState>,
    AdminUser(user): AdminUser,
    Json(mut req): Json<UpdateProfileRequest>,
) -> ApiResult<Json<PublicUser>> {
    req.first_name = req.first_name.trim().to_string();
    req.email = req.email.trim().to_string();
    req.last_name = req
        .last_name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty());
    req.validate()?;

    let profile = state.auth().update_profile(user.user_id()?, &req).await?;
    Ok(Json(profile))
}

/// PUT /api/v1/admin/profile/password
async fn update_password(
    State(state): State<AppState>,
    AdminUser(user): AdminUser,
    Json(req): Json<UpdatePasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    if req.current_password.is_empty() {
        return Err(ValidationError::new("current_password", "Current password is required").into());
    }
    validate_password(&req.new_password)
        .map_err(|msg| ApiError::from(ValidationError::new("new_password", &msg)))?;

    match state
        .auth()
        .update_password(user.user_id()?, &req.current_password, &req.new_password)
        .await
    {
        Ok(()) => Ok(Json(MessageResponse::new("Password updated successfully"))),
        Err(AuthError::InvalidCredentials) => Err(ValidationError::new(
            "current_password",
            "Current password is incorrect",
        )
        .into()),
        Err(e) => Err(e.into()),
    }
}

/// GET /api/v1/admin/auth/secret-info
async fn secret_info(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Json<SecretInfo> {
    Json(state.jwt().secret_info())
}
