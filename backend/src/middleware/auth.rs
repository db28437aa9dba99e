//! Authentication middleware
//!
//! JWT authentication and permission checks

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use shared::{Action, Resource, UserRole};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::auth::decode_access_token;
use crate::AppState;

/// Authenticated user information extracted from JWT
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: UserRole,
    pub permissions: Vec<String>,
}

impl AuthUser {
    /// Check if user has a specific permission
    pub fn has_permission(&self, resource: Resource, action: Action) -> bool {
        let permission = format!("{}:{}", resource.as_str(), action.as_str());
        self.permissions.contains(&permission)
    }

    /// Fail with `InsufficientPermissions` unless the permission is held
    pub fn require(&self, resource: Resource, action: Action) -> AppResult<()> {
        if self.has_permission(resource, action) {
            Ok(())
        } else {
            tracing::warn!(
                user_id = %self.user_id,
                "Permission denied: requires {}:{}",
                resource.as_str(),
                action.as_str()
            );
            Err(AppError::InsufficientPermissions)
        }
    }
}

/// Authentication middleware that validates bearer tokens
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::Unauthorized {
            message: "Missing or invalid Authorization header".to_string(),
            message_ru: "Отсутствует или неверен заголовок Authorization".to_string(),
        })?;

    let claims = decode_access_token(token, &state.config.jwt.secret)?;

    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::InvalidToken)?;
    let role = UserRole::parse(&claims.role).ok_or(AppError::InvalidToken)?;

    request.extensions_mut().insert(AuthUser {
        user_id,
        role,
        permissions: claims.permissions,
    });

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: UserRole) -> AuthUser {
        AuthUser {
            user_id: Uuid::new_v4(),
            role,
            permissions: role.permission_strings(),
        }
    }

    #[test]
    fn bartender_can_sell_but_not_edit_catalog() {
        let bartender = user(UserRole::Bartender);
        assert!(bartender.require(Resource::Order, Action::Create).is_ok());
        assert!(matches!(
            bartender.require(Resource::Product, Action::Edit),
            Err(AppError::InsufficientPermissions)
        ));
    }

    #[test]
    fn admin_can_do_everything() {
        let admin = user(UserRole::Admin);
        for resource in Resource::ALL {
            for action in Action::ALL {
                assert!(admin.has_permission(resource, action));
            }
        }
    }
}
