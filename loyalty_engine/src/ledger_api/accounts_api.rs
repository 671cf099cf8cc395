//! Read and withdrawal API for user point balances.

use std::fmt::Debug;

use log::*;
use loyalty_common::MinorUnits;

use crate::{
    db::traits::{BalanceManagement, OrderManagement},
    db_types::{NewOrder, NewWithdrawal, OrderId, Withdrawal},
    ledger_api::{
        account_objects::{BalanceResult, WithdrawalRequest, WithdrawalResult},
        errors::AccountApiError,
        order_objects::OrderResult,
    },
};

pub struct AccountApi<B> {
    db: B,
}

impl<B: Debug> Debug for AccountApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AccountApi ({:?})", self.db)
    }
}

impl<B> AccountApi<B>
where B: OrderManagement + BalanceManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    /// Creates an empty balance for a newly registered user. Calling this for an existing user does nothing.
    pub async fn open_balance(&self, user_id: i64) -> Result<(), AccountApiError> {
        self.db.open_balance(user_id).await?;
        Ok(())
    }

    /// The user's orders, oldest first.
    pub async fn orders_for_user(&self, user_id: i64) -> Result<Vec<OrderResult>, AccountApiError> {
        let orders = self.db.fetch_orders_for_user(user_id).await?;
        Ok(orders.into_iter().map(OrderResult::from).collect())
    }

    pub async fn balance_for_user(&self, user_id: i64) -> Result<BalanceResult, AccountApiError> {
        let balance = self.db.fetch_balance(user_id).await?;
        Ok(balance.into())
    }

    /// Spends points against an order number. The amount is rounded to the nearest minor unit and must be positive.
    pub async fn withdraw(&self, user_id: i64, request: WithdrawalRequest) -> Result<Withdrawal, AccountApiError> {
        let order_id = request.order.parse::<OrderId>()?;
        let amount =
            MinorUnits::from_decimal(request.sum).map_err(|e| AccountApiError::InvalidAmount(e.to_string()))?;
        if !amount.is_positive() {
            return Err(AccountApiError::InvalidAmount(format!("{} is not a positive amount", request.sum)));
        }
        let withdrawal = self.db.debit_balance_and_record_withdrawal(NewWithdrawal::new(user_id, order_id, amount)).await?;
        info!("💸️ User {user_id} spent {amount} against order {}", withdrawal.order_id);
        Ok(withdrawal)
    }

    /// The user's withdrawals, oldest first.
    pub async fn withdrawals_for_user(&self, user_id: i64) -> Result<Vec<WithdrawalResult>, AccountApiError> {
        let withdrawals = self.db.fetch_withdrawals(user_id).await?;
        Ok(withdrawals.into_iter().map(WithdrawalResult::from).collect())
    }
}
