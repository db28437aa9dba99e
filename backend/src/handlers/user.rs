//! Staff account handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use shared::{Action, Resource};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::services::user::{CreateUserInput, UpdateUserInput, UserAccount, UserService};
use crate::AppState;

/// List staff accounts
pub async fn list_users(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> AppResult<Json<Vec<UserAccount>>> {
    user.require(Resource::User, Action::View)?;
    let users = UserService::new(state.db.clone()).list_users().await?;
    Ok(Json(users))
}

/// Create a staff account
pub async fn create_user(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(input): Json<CreateUserInput>,
) -> AppResult<(StatusCode, Json<UserAccount>)> {
    user.require(Resource::User, Action::Create)?;
    let account = UserService::new(state.db.clone()).create_user(input).await?;
    Ok((StatusCode::CREATED, Json(account)))
}

/// Update a staff account
pub async fn update_user(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(user_id): Path<Uuid>,
    Json(input): Json<UpdateUserInput>,
) -> AppResult<Json<UserAccount>> {
    user.require(Resource::User, Action::Edit)?;
    if user_id == user.user_id && input.is_active == Some(false) {
        return Err(AppError::invalid_field(
            "is_active",
            "You cannot deactivate your own account",
        ));
    }
    let account = UserService::new(state.db.clone())
        .update_user(user_id, input)
        .await?;
    Ok(Json(account))
}
