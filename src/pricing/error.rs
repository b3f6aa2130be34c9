//! Pricing engine error types.

use thiserror::Error;
use uuid::Uuid;

use super::models::OrderStatus;

/// Stable classification callers switch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Conflict,
    NotFound,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation_error",
            ErrorKind::Conflict => "conflict_error",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Internal => "internal_error",
        }
    }
}

/// Malformed input. Surfaced verbatim to the operator, never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("at least one quantity (full, half or child) must be informed")]
    EmptyLine,

    #[error("quantity exceeds the maximum of {max}")]
    QuantityTooLarge { max: u32 },

    #[error("child age {age} is outside the allowed range 0..=17")]
    AgeOutOfRange { age: i32 },

    #[error("{provided} child age(s) informed for {declared} child passenger(s)")]
    AgeCountMismatch { declared: u32, provided: usize },

    #[error("service requires a minimum age of {minimum}; a child aged {age} does not qualify")]
    BelowMinimumAge { age: i32, minimum: i32 },

    #[error("service '{service}' does not accept half-price entries")]
    HalfPriceNotAccepted { service: String },

    #[error("{provided} justification(s) informed for {declared} half-price passenger(s)")]
    JustificationCountMismatch { declared: u32, provided: usize },

    #[error("unknown half-price justification '{0}'")]
    UnknownJustification(String),

    #[error("service '{service}' does not belong to the selected category")]
    CategoryMismatch { service: String },

    #[error("{field} must be {requirement}")]
    InvalidCatalogEntry {
        field: &'static str,
        requirement: &'static str,
    },

    #[error("{min_field} ({min}) is greater than {max_field} ({max})")]
    InvertedBracket {
        min_field: &'static str,
        min: i32,
        max_field: &'static str,
        max: i32,
    },

    #[error("transfer quantity must be at least 1")]
    EmptyTransfer,

    #[error("order is {status} and can no longer be changed")]
    OrderNotEditable { status: OrderStatus },

    #[error("end date comes before start date")]
    InvertedPeriod,

    #[error("'{0}' is not a valid order number")]
    InvalidOrderNumber(String),

    #[error("order numbers for {year} are exhausted")]
    SequenceExhausted { year: i32 },
}

/// Errors raised by an `OrderStore` implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("unique constraint violated: {0}")]
    Conflict(String),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("storage backend failure: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => StoreError::NotFound(err.to_string()),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::Conflict(db.message().to_string())
            }
            _ => StoreError::Backend(err.to_string()),
        }
    }
}

/// Pricing engine error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PricingError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("order number {number} is already taken after {attempts} attempt(s)")]
    Conflict { number: String, attempts: u32 },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("{entity} {id} is inactive")]
    Inactive { entity: &'static str, id: Uuid },

    #[error("record not found: {0}")]
    MissingRecord(String),

    #[error("duplicate record: {0}")]
    Duplicate(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl PricingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PricingError::Validation(_) => ErrorKind::Validation,
            PricingError::Conflict { .. } => ErrorKind::Conflict,
            PricingError::NotFound { .. }
            | PricingError::Inactive { .. }
            | PricingError::MissingRecord(_) => ErrorKind::NotFound,
            PricingError::Duplicate(_) => ErrorKind::Conflict,
            PricingError::Storage(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn not_found(entity: &'static str, id: Uuid) -> Self {
        PricingError::NotFound { entity, id }
    }
}

impl From<StoreError> for PricingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(record) => PricingError::MissingRecord(record),
            StoreError::Conflict(constraint) => PricingError::Duplicate(constraint),
            StoreError::Backend(message) => PricingError::Storage(message),
        }
    }
}

pub type PricingResult<T> = std::result::Result<T, PricingError>;
