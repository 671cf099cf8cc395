//! Loyalty Ledger Engine
//!
//! Users earn loyalty points for the orders they submit. How many points an order earns is decided by an external
//! accrual oracle, which is polled asynchronously. This library contains the core logic of the ledger. It is
//! transport-agnostic: the HTTP surface lives in the server crate.
//!
//! The library is divided into three main sections:
//! 1. The ledger store ([`mod@db`]). The traits in [`db::traits`] define what a storage backend must provide. SQLite
//!    is the supported backend. Crediting a processed order and debiting a withdrawal are atomic at this layer.
//! 2. The accrual engine ([`mod@accrual`]). Submitted orders are queued, batched and reconciled against the accrual
//!    oracle until they reach a final status.
//! 3. The public API ([`OrderFlowApi`] and [`AccountApi`]). This is what request handlers call.
//!
//! The engine also publishes events when an order is credited or rejected. Hooks can subscribe to these with the
//! [`events`] module.
pub mod accrual;
pub mod db;
pub mod db_types;
pub mod events;
pub mod helpers;
mod ledger_api;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use db::sqlite::{SqliteDatabase, SqliteDatabaseError};
pub use db::traits::{
    AccrualRecordResult,
    BalanceManagement,
    InsertOrderResult,
    LedgerDatabase,
    LedgerError,
    OrderManagement,
};
pub use ledger_api::{
    account_objects,
    accounts_api::AccountApi,
    errors::{AccountApiError, OrderFlowError},
    order_flow_api::OrderFlowApi,
    order_objects,
};
