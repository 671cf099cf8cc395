use loyalty_common::MinorUnits;
use thiserror::Error;

use crate::{
    db::traits::LedgerError,
    db_types::{InvalidOrderNumber, OrderId},
};

#[derive(Debug, Clone, Error)]
pub enum OrderFlowError {
    #[error("{0}")]
    InvalidOrderId(#[from] InvalidOrderNumber),
    #[error("Order {0} has already been submitted by this user")]
    AlreadySubmitted(OrderId),
    #[error("Order {0} has already been submitted by another user")]
    OwnedByAnotherUser(OrderId),
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<LedgerError> for OrderFlowError {
    fn from(e: LedgerError) -> Self {
        OrderFlowError::DatabaseError(e.to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum AccountApiError {
    #[error("{0}")]
    InvalidOrderId(#[from] InvalidOrderNumber),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Insufficient funds. Requested {requested}, but only {available} is available")]
    InsufficientFunds { available: MinorUnits, requested: MinorUnits },
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<LedgerError> for AccountApiError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::InsufficientFunds { available, requested } => {
                AccountApiError::InsufficientFunds { available, requested }
            },
            LedgerError::InvalidAmount(a) => AccountApiError::InvalidAmount(a.to_string()),
            e => AccountApiError::DatabaseError(e.to_string()),
        }
    }
}
