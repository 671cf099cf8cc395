use crate::db_types::Order;

#[derive(Debug, Clone)]
pub enum InsertOrderResult {
    Inserted(Order),
    /// The order number was already known. The stored order, with its original owner, is returned.
    AlreadyExists(Order),
}

/// The result of recording an oracle verdict against an order.
#[derive(Debug, Clone)]
pub enum AccrualRecordResult {
    /// The order was updated. For `PROCESSED` orders, the owner has been credited in the same transaction.
    Recorded(Order),
    /// The order had already reached a terminal status. Nothing was changed.
    AlreadyFinal(Order),
}

