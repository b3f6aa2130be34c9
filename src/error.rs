//! Error handling for the HTTP layer

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::config::ConfigError;
use crate::pricing::error::{ErrorKind, PricingError, ValidationError};
use crate::pricing::responses::PricingErrorResponse;

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Pricing(#[from] PricingError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Pricing(err.into())
    }
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Pricing(err) => err.kind(),
            _ => ErrorKind::Internal,
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            AppError::Pricing(PricingError::Conflict { number, attempts }) => {
                Some(json!({ "order_number": number, "attempts": attempts }))
            }
            AppError::Pricing(
                PricingError::NotFound { entity, id } | PricingError::Inactive { entity, id },
            ) => Some(json!({ "entity": entity, "id": id })),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let status = match kind {
            ErrorKind::Validation => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = if kind == ErrorKind::Internal {
            tracing::error!("Internal error: {}", self);
            "Internal error".to_string()
        } else {
            tracing::warn!("Request rejected ({}): {}", kind.as_str(), self);
            self.to_string()
        };

        let body = PricingErrorResponse {
            error_type: kind.as_str().to_string(),
            message,
            details: self.details(),
        };
        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AppError::from(ValidationError::EmptyLine), StatusCode::UNPROCESSABLE_ENTITY),
            (
                AppError::Pricing(PricingError::Conflict {
                    number: "2025-00003".to_string(),
                    attempts: 3,
                }),
                StatusCode::CONFLICT,
            ),
            (
                AppError::Pricing(PricingError::NotFound {
                    entity: "order",
                    id: Uuid::nil(),
                }),
                StatusCode::NOT_FOUND,
            ),
            (
                AppError::Database(sqlx::Error::PoolTimedOut),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn test_conflict_details_name_the_number() {
        let err = AppError::Pricing(PricingError::Conflict {
            number: "2025-00003".to_string(),
            attempts: 3,
        });
        let details = err.details().unwrap();
        assert_eq!(details["order_number"], "2025-00003");
        assert_eq!(details["attempts"], 3);
    }
}
