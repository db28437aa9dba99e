//! Staff account management

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::{validate_password, validate_username, UserRole};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::services::auth::hash_password;

/// User service
#[derive(Clone)]
pub struct UserService {
    db: PgPool,
}

/// Staff account without credentials
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct UserAccount {
    pub id: Uuid,
    pub username: String,
    pub name: String,
    pub role: String,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating an account
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserInput {
    pub username: String,
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    pub password: String,
    pub role: UserRole,
}

/// Input for updating an account
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUserInput {
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
    pub password: Option<String>,
}

const USER_COLUMNS: &str =
    "id, username, name, role, is_active, last_login_at, created_at, updated_at";

impl UserService {
    /// Create a new UserService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// List all accounts
    pub async fn list_users(&self) -> AppResult<Vec<UserAccount>> {
        let users = sqlx::query_as::<_, UserAccount>(&format!(
            "SELECT {} FROM users ORDER BY username",
            USER_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?;
        Ok(users)
    }

    /// Create an account
    pub async fn create_user(&self, input: CreateUserInput) -> AppResult<UserAccount> {
        input.validate()?;
        let username = input.username.trim().to_lowercase();
        validate_username(&username).map_err(|m| AppError::invalid_field("username", m))?;
        validate_password(&input.password).map_err(|m| AppError::invalid_field("password", m))?;

        let password_hash = hash_password(&input.password)?;

        let user = sqlx::query_as::<_, UserAccount>(&format!(
            r#"
            INSERT INTO users (username, name, password_hash, role)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(&username)
        .bind(input.name.trim())
        .bind(&password_hash)
        .bind(input.role.as_str())
        .fetch_one(&self.db)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                AppError::DuplicateEntry("username".to_string())
            }
            _ => AppError::DatabaseError(e),
        })?;

        tracing::info!(user_id = %user.id, username = %user.username, role = %user.role, "User created");
        Ok(user)
    }

    /// Update name, role, status or password. Deactivating an account
    /// revokes its refresh tokens.
    pub async fn update_user(&self, user_id: Uuid, input: UpdateUserInput) -> AppResult<UserAccount> {
        input.validate()?;

        let password_hash = match input.password.as_deref() {
            Some(password) => {
                validate_password(password).map_err(|m| AppError::invalid_field("password", m))?;
                Some(hash_password(password)?)
            }
            None => None,
        };

        let mut tx = self.db.begin().await?;

        let user = sqlx::query_as::<_, UserAccount>(&format!(
            r#"
            UPDATE users
            SET name = COALESCE($1, name),
                role = COALESCE($2, role),
                is_active = COALESCE($3, is_active),
                password_hash = COALESCE($4, password_hash),
                updated_at = NOW()
            WHERE id = $5
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(input.name.as_deref().map(str::trim))
        .bind(input.role.map(|r| r.as_str()))
        .bind(input.is_active)
        .bind(&password_hash)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("User".to_string()))?;

        if !user.is_active || password_hash.is_some() {
            sqlx::query(
                "UPDATE refresh_tokens SET revoked_at = NOW() WHERE user_id = $1 AND revoked_at IS NULL",
            )
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::info!(%user_id, role = %user.role, active = user.is_active, "User updated");
        Ok(user)
    }
}
