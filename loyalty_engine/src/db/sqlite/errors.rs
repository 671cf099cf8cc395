use loyalty_common::MinorUnits;
use thiserror::Error;

use crate::{db::traits::LedgerError, db_types::OrderId};

#[derive(Debug, Error)]
pub enum SqliteDatabaseError {
    #[error("Database connection error: {0}")]
    DriverError(#[from] sqlx::Error),
    #[error("Database migration error: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Insufficient funds. Requested {requested}, but only {available} is available")]
    InsufficientFunds { available: MinorUnits, requested: MinorUnits },
    #[error("Invalid amount: {0}")]
    InvalidAmount(MinorUnits),
}

impl From<SqliteDatabaseError> for LedgerError {
    fn from(e: SqliteDatabaseError) -> Self {
        match e {
            SqliteDatabaseError::OrderNotFound(id) => LedgerError::OrderNotFound(id),
            SqliteDatabaseError::InsufficientFunds { available, requested } => {
                LedgerError::InsufficientFunds { available, requested }
            },
            SqliteDatabaseError::InvalidAmount(a) => LedgerError::InvalidAmount(a),
            e => LedgerError::DatabaseError(e.to_string()),
        }
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        LedgerError::DatabaseError(e.to_string())
    }
}
