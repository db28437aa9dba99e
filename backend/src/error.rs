//! Error handling for the bar POS server
//!
//! Provides consistent error responses in English and Russian

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::ledger::LedgerError;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication errors
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    #[error("Unauthorized: {message}")]
    Unauthorized { message: String, message_ru: String },

    // Validation errors
    #[error("Validation error: {message}")]
    Validation {
        field: String,
        message: String,
        message_ru: String,
    },

    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    #[error("Conflict: {message}")]
    Conflict {
        resource: String,
        message: String,
        message_ru: String,
    },

    #[error("Resource not found: {0}")]
    NotFound(String),

    // State and stock errors
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Insufficient stock for {product}: requested {requested}, available {available}")]
    InsufficientStock {
        product: String,
        requested: i64,
        available: i64,
    },

    #[error("Invalid item index {index} (order has {len} items)")]
    InvalidIndex { index: usize, len: usize },

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl AppError {
    /// Validation failure on a single field, with the same text in both languages
    pub fn invalid_field(field: &str, message: &str) -> Self {
        AppError::Validation {
            field: field.to_string(),
            message: message.to_string(),
            message_ru: message.to_string(),
        }
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InvalidState(status) => {
                AppError::InvalidState(format!("order is already {}", status))
            }
            LedgerError::InsufficientStock {
                product_name,
                requested,
                available,
                ..
            } => AppError::InsufficientStock {
                product: product_name,
                requested,
                available,
            },
            LedgerError::InvalidIndex { index, len } => AppError::InvalidIndex { index, len },
            LedgerError::UnknownProduct(id) => AppError::NotFound(format!("Product {}", id)),
            LedgerError::InvalidQuantity(_) => AppError::Validation {
                field: "quantity".to_string(),
                message: "Quantity must be positive".to_string(),
                message_ru: "Количество должно быть положительным".to_string(),
            },
            LedgerError::QuantityTooLarge(_) => AppError::Validation {
                field: "quantity".to_string(),
                message: "Quantity is too large".to_string(),
                message_ru: "Слишком большое количество".to_string(),
            },
            LedgerError::InactiveProduct { product_name, .. } => AppError::Validation {
                field: "product_id".to_string(),
                message: format!("{} is no longer sold", product_name),
                message_ru: format!("{} снят с продажи", product_name),
            },
            LedgerError::PaymentMethodRequired => AppError::Validation {
                field: "payment_method".to_string(),
                message: "Payment method is required to complete an order".to_string(),
                message_ru: "Для закрытия заказа укажите способ оплаты".to_string(),
            },
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let field = errors
            .field_errors()
            .keys()
            .next()
            .map(|f| f.to_string())
            .unwrap_or_default();
        AppError::Validation {
            message: format!("Invalid value for {}", field),
            message_ru: format!("Некорректное значение поля {}", field),
            field,
        }
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message_en: String,
    pub message_ru: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = match &self {
            AppError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail {
                    code: "INVALID_CREDENTIALS".to_string(),
                    message_en: "Invalid username or password".to_string(),
                    message_ru: "Неверное имя пользователя или пароль".to_string(),
                    field: None,
                },
            ),
            AppError::TokenExpired => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail {
                    code: "TOKEN_EXPIRED".to_string(),
                    message_en: "Token has expired".to_string(),
                    message_ru: "Срок действия токена истёк".to_string(),
                    field: None,
                },
            ),
            AppError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail {
                    code: "INVALID_TOKEN".to_string(),
                    message_en: "Invalid token".to_string(),
                    message_ru: "Недействительный токен".to_string(),
                    field: None,
                },
            ),
            AppError::InsufficientPermissions => (
                StatusCode::FORBIDDEN,
                ErrorDetail {
                    code: "INSUFFICIENT_PERMISSIONS".to_string(),
                    message_en: "You do not have permission to perform this action".to_string(),
                    message_ru: "Недостаточно прав для выполнения действия".to_string(),
                    field: None,
                },
            ),
            AppError::Unauthorized {
                message,
                message_ru,
            } => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail {
                    code: "UNAUTHORIZED".to_string(),
                    message_en: message.clone(),
                    message_ru: message_ru.clone(),
                    field: None,
                },
            ),
            AppError::Validation {
                field,
                message,
                message_ru,
            } => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    code: "VALIDATION_ERROR".to_string(),
                    message_en: message.clone(),
                    message_ru: message_ru.clone(),
                    field: Some(field.clone()),
                },
            ),
            AppError::DuplicateEntry(field) => (
                StatusCode::CONFLICT,
                ErrorDetail {
                    code: "DUPLICATE_ENTRY".to_string(),
                    message_en: format!("A record with this {} already exists", field),
                    message_ru: format!("Запись с таким значением {} уже существует", field),
                    field: Some(field.clone()),
                },
            ),
            AppError::Conflict {
                resource,
                message,
                message_ru,
            } => (
                StatusCode::CONFLICT,
                ErrorDetail {
                    code: "CONFLICT".to_string(),
                    message_en: message.clone(),
                    message_ru: message_ru.clone(),
                    field: Some(resource.clone()),
                },
            ),
            AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                ErrorDetail {
                    code: "NOT_FOUND".to_string(),
                    message_en: format!("{} not found", resource),
                    message_ru: format!("Не найдено: {}", resource),
                    field: None,
                },
            ),
            AppError::InvalidState(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail {
                    code: "INVALID_STATE".to_string(),
                    message_en: format!("Operation not allowed: {}", msg),
                    message_ru: format!("Операция невозможна: {}", msg),
                    field: None,
                },
            ),
            AppError::InsufficientStock {
                product,
                requested,
                available,
            } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail {
                    code: "INSUFFICIENT_STOCK".to_string(),
                    message_en: format!(
                        "Not enough {}: requested {}, available {}",
                        product, requested, available
                    ),
                    message_ru: format!(
                        "Недостаточно товара «{}»: запрошено {}, доступно {}",
                        product, requested, available
                    ),
                    field: Some("quantity".to_string()),
                },
            ),
            AppError::InvalidIndex { index, len } => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    code: "INVALID_INDEX".to_string(),
                    message_en: format!("Item {} does not exist; order has {} items", index, len),
                    message_ru: format!("Позиции {} нет; в заказе {} позиций", index, len),
                    field: Some("index".to_string()),
                },
            ),
            AppError::DatabaseError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "DATABASE_ERROR".to_string(),
                    message_en: "A database error occurred".to_string(),
                    message_ru: "Ошибка базы данных".to_string(),
                    field: None,
                },
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "INTERNAL_ERROR".to_string(),
                    message_en: msg.clone(),
                    message_ru: "Внутренняя ошибка сервера".to_string(),
                    field: None,
                },
            ),
            AppError::InternalError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "INTERNAL_ERROR".to_string(),
                    message_en: "An internal server error occurred".to_string(),
                    message_ru: "Внутренняя ошибка сервера".to_string(),
                    field: None,
                },
            ),
        };

        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::warn!("Request rejected: {}", self);
        }

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use shared::OrderStatus;
    use uuid::Uuid;

    #[test]
    fn ledger_errors_map_to_http_statuses() {
        let cases = [
            (
                LedgerError::InvalidState(OrderStatus::Completed),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                LedgerError::InsufficientStock {
                    product_id: Uuid::new_v4(),
                    product_name: "Mojito".to_string(),
                    requested: 4,
                    available: 3,
                },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                LedgerError::InvalidIndex { index: 5, len: 2 },
                StatusCode::BAD_REQUEST,
            ),
            (
                LedgerError::UnknownProduct(Uuid::new_v4()),
                StatusCode::NOT_FOUND,
            ),
            (LedgerError::PaymentMethodRequired, StatusCode::BAD_REQUEST),
            (LedgerError::QuantityTooLarge(4_294_967_294), StatusCode::BAD_REQUEST),
            (
                LedgerError::InactiveProduct {
                    product_id: Uuid::new_v4(),
                    product_name: "Cider".to_string(),
                },
                StatusCode::BAD_REQUEST,
            ),
        ];

        for (err, expected) in cases {
            let response = AppError::from(err).into_response();
            assert_eq!(response.status(), expected);
        }
    }

    #[test]
    fn insufficient_stock_message_names_available_quantity() {
        let err = AppError::from(LedgerError::InsufficientStock {
            product_id: Uuid::new_v4(),
            product_name: "Mojito".to_string(),
            requested: 4,
            available: 3,
        });
        assert!(err.to_string().contains("available 3"));
    }
}
