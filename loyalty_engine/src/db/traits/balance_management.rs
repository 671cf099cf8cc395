use std::future::Future;

use loyalty_common::MinorUnits;

use crate::{
    db::traits::LedgerError,
    db_types::{Balance, NewWithdrawal, Withdrawal},
};

/// Balance bookkeeping. The `current` balance of a user can never become negative.
pub trait BalanceManagement {
    /// Creates an empty balance row for the user if there isn't one yet.
    fn open_balance(&self, user_id: i64) -> impl Future<Output = Result<(), LedgerError>> + Send;

    /// Users without a balance row have a zero balance.
    fn fetch_balance(&self, user_id: i64) -> impl Future<Output = Result<Balance, LedgerError>> + Send;

    fn credit_balance(&self, user_id: i64, amount: MinorUnits) -> impl Future<Output = Result<(), LedgerError>> + Send;

    /// Atomically checks the available balance, debits it and records the withdrawal. Fails with
    /// [`LedgerError::InsufficientFunds`] without changing anything if the balance does not cover the amount.
    fn debit_balance_and_record_withdrawal(
        &self,
        withdrawal: NewWithdrawal,
    ) -> impl Future<Output = Result<Withdrawal, LedgerError>> + Send;

    /// All withdrawals made by the user, oldest first.
    fn fetch_withdrawals(&self, user_id: i64) -> impl Future<Output = Result<Vec<Withdrawal>, LedgerError>> + Send;
}
