use std::future::Future;

use crate::db::traits::{BalanceManagement, LedgerError, OrderManagement};

/// The highest level of behaviour a storage backend has to offer to act as the loyalty ledger store.
///
/// The store is shared between the HTTP handlers and every reconciliation task, so implementations are cheap to
/// clone and safe to use from many tasks at once.
pub trait LedgerDatabase: OrderManagement + BalanceManagement + Clone + Send + Sync + 'static {
    /// The URL of the database
    fn url(&self) -> &str;

    fn close(&mut self) -> impl Future<Output = Result<(), LedgerError>> + Send {
        async { Ok(()) }
    }
}
