use loyalty_common::MinorUnits;

use crate::db_types::Order;

/// Emitted once an order has been settled as `PROCESSED` and its accrual credited to the owner.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderCreditedEvent {
    pub order: Order,
    pub amount: MinorUnits,
}

impl OrderCreditedEvent {
    pub fn new(order: Order) -> Self {
        let amount = order.accrual;
        Self { order, amount }
    }
}

/// Emitted when the accrual oracle declares an order `INVALID`.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRejectedEvent {
    pub order: Order,
}

impl OrderRejectedEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

