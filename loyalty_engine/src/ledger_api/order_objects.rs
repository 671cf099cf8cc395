use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::db_types::{Order, OrderStatusType};

/// An order as presented to its owner. Amounts are in currency units.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderResult {
    pub number: String,
    pub status: OrderStatusType,
    /// Only present once the order is `PROCESSED`.
    #[serde(with = "rust_decimal::serde::float_option", skip_serializing_if = "Option::is_none")]
    pub accrual: Option<Decimal>,
    pub uploaded_at: DateTime<Utc>,
}

impl From<Order> for OrderResult {
    fn from(order: Order) -> Self {
        let accrual = (order.status == OrderStatusType::Processed).then(|| order.accrual.to_decimal());
        Self { number: order.order_id.as_str().to_string(), status: order.status, accrual, uploaded_at: order.uploaded_at }
    }
}
