use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::db_types::{Balance, Withdrawal};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalanceResult {
    #[serde(with = "rust_decimal::serde::float")]
    pub current: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub withdrawn: Decimal,
}

impl From<Balance> for BalanceResult {
    fn from(balance: Balance) -> Self {
        Self { current: balance.current.to_decimal(), withdrawn: balance.withdrawn.to_decimal() }
    }
}

/// A request to spend points against an order.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WithdrawalRequest {
    /// The order number the points are spent against. It does not have to be an order the user submitted.
    pub order: String,
    pub sum: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WithdrawalResult {
    pub order: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub sum: Decimal,
    pub processed_at: DateTime<Utc>,
}

impl From<Withdrawal> for WithdrawalResult {
    fn from(w: Withdrawal) -> Self {
        Self { order: w.order_id.as_str().to_string(), sum: w.amount.to_decimal(), processed_at: w.processed_at }
    }
}
