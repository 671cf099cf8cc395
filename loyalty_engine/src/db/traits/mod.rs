//! #  Ledger store interfaces.
//!
//! This module defines the contracts that storage *backends* must fulfil to act as the loyalty ledger store.
//!
//! * [`OrderManagement`] stores orders and records the accrual oracle's verdicts on them. Settling a `PROCESSED`
//!   order and crediting its owner happen in a single transaction.
//! * [`BalanceManagement`] keeps track of point balances and withdrawals.
//! * [`LedgerDatabase`] ties the two together and is what the accrual engine and the public APIs are generic over.
//!
//! All methods return futures that are `Send`, so that they can be driven from spawned tokio tasks.
mod balance_management;
mod data_objects;
mod errors;
mod ledger_database;
mod order_management;

pub use balance_management::BalanceManagement;
pub use data_objects::{AccrualRecordResult, InsertOrderResult};
pub use errors::LedgerError;
pub use ledger_database::LedgerDatabase;
pub use order_management::OrderManagement;
