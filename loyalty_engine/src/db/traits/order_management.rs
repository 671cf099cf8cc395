use std::future::Future;

use loyalty_common::MinorUnits;

use crate::{
    db::traits::{AccrualRecordResult, InsertOrderResult, LedgerError},
    db_types::{AccrualUpdate, NewOrder, Order, OrderId},
};

/// The `OrderManagement` trait defines the behaviour for storing orders and recording what the accrual oracle says
/// about them.
///
/// Every write that changes an order's status is guarded: an order in a terminal status (`INVALID` or `PROCESSED`) is
/// never modified again, and the backend reports [`AccrualRecordResult::AlreadyFinal`] instead.
pub trait OrderManagement {
    fn fetch_order_by_order_id(
        &self,
        order_id: &OrderId,
    ) -> impl Future<Output = Result<Option<Order>, LedgerError>> + Send;

    /// Stores a new order in the `NEW` status. If the order number already exists, the existing order is returned
    /// untouched.
    fn insert_order(&self, order: NewOrder) -> impl Future<Output = Result<InsertOrderResult, LedgerError>> + Send;

    /// Records a non-crediting status change (`REGISTERED`, `PROCESSING` or `INVALID`).
    ///
    /// Any other status is refused with [`LedgerError::InvalidStatusUpdate`]. Use
    /// [`settle_processed_order`](Self::settle_processed_order) to move an order to `PROCESSED`.
    fn update_order_status_and_accrual(
        &self,
        order_id: &OrderId,
        update: AccrualUpdate,
    ) -> impl Future<Output = Result<AccrualRecordResult, LedgerError>> + Send;

    /// Moves the order to `PROCESSED`, stores the accrual and credits the owner's balance in one atomic step.
    /// An order can only be settled once.
    fn settle_processed_order(
        &self,
        order_id: &OrderId,
        accrual: MinorUnits,
    ) -> impl Future<Output = Result<AccrualRecordResult, LedgerError>> + Send;

    /// All orders owned by the user, oldest upload first.
    fn fetch_orders_for_user(&self, user_id: i64) -> impl Future<Output = Result<Vec<Order>, LedgerError>> + Send;

    /// Orders that have not reached a terminal status, oldest first, starting after the order `after`.
    ///
    /// Pass the last order of one page as `after` to fetch the next. `None` starts from the oldest unsettled order.
    fn fetch_unsettled_orders(
        &self,
        after: Option<&OrderId>,
        limit: i64,
    ) -> impl Future<Output = Result<Vec<Order>, LedgerError>> + Send;
}
