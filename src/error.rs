use crate::domain::account::AccountId;
use crate::domain::operation::OperationStatus;
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error(
        "invalid transition for operation {operation}: expected status {expected}, found {actual}"
    )]
    InvalidTransition {
        operation: Uuid,
        expected: OperationStatus,
        actual: OperationStatus,
    },

    #[error(
        "insufficient balance on account {account}: balance {balance}, requested debit {requested}"
    )]
    InsufficientBalance {
        account: AccountId,
        balance: Decimal,
        requested: Decimal,
    },

    #[error("operation {operation} is already assigned to validator {validator}")]
    AlreadyAssigned {
        operation: Uuid,
        validator: AccountId,
    },

    #[error("no commission tier matches amount {amount}")]
    NoTierMatch { amount: Decimal },

    #[error("amount {amount} is outside the commission rule bounds")]
    OutOfRange { amount: Decimal },

    #[error("overlapping commission tiers: {0}")]
    OverlappingTiers(String),

    #[error("missing field: {0}")]
    MissingField(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
