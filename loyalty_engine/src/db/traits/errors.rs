use loyalty_common::MinorUnits;
use thiserror::Error;

use crate::db_types::{OrderId, OrderStatusType};

#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Insufficient funds. Requested {requested}, but only {available} is available")]
    InsufficientFunds { available: MinorUnits, requested: MinorUnits },
    #[error("Invalid amount: {0}")]
    InvalidAmount(MinorUnits),
    #[error("An order cannot be moved to {0} by a plain status update")]
    InvalidStatusUpdate(OrderStatusType),
}
