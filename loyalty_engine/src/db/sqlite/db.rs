use std::fmt::Debug;

use log::*;
use loyalty_common::MinorUnits;
use sqlx::{migrate, SqlitePool};

use super::{balances, db_url, new_pool, orders, withdrawals, SqliteDatabaseError};
use crate::{
    db::traits::{
        AccrualRecordResult,
        BalanceManagement,
        InsertOrderResult,
        LedgerDatabase,
        LedgerError,
        OrderManagement,
    },
    db_types::{AccrualUpdate, Balance, NewOrder, NewWithdrawal, Order, OrderId, Withdrawal},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object, using the `DATABASE_URI` environment variable (or the default) as the URL.
    pub async fn new(max_connections: u32) -> Result<Self, SqliteDatabaseError> {
        let url = db_url();
        SqliteDatabase::new_with_url(&url, max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, SqliteDatabaseError> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    /// Brings the schema up to date. Safe to call on every start-up.
    pub async fn run_migrations(&self) -> Result<(), SqliteDatabaseError> {
        migrate!("./src/db/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl OrderManagement for SqliteDatabase {
    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_order_id(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn insert_order(&self, order: NewOrder) -> Result<InsertOrderResult, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let result = orders::idempotent_insert(order, &mut conn).await?;
        Ok(result)
    }

    async fn update_order_status_and_accrual(
        &self,
        order_id: &OrderId,
        update: AccrualUpdate,
    ) -> Result<AccrualRecordResult, LedgerError> {
        if !update.status.is_uncredited_update() {
            warn!("🗃️ Refusing to move order {order_id} to {} without settling it", update.status);
            return Err(LedgerError::InvalidStatusUpdate(update.status));
        }
        let mut conn = self.pool.acquire().await?;
        let result = orders::update_order_status(order_id, update, &mut conn).await?;
        Ok(result)
    }

    /// In a single atomic transaction,
    /// * moves the order to `PROCESSED` and stores the accrual, unless it is already in a terminal status,
    /// * adds the accrual to the owner's current balance.
    ///
    /// If the order was already final, the transaction is rolled back and the balance is not touched. This is what
    /// guarantees that an order is credited at most once.
    async fn settle_processed_order(
        &self,
        order_id: &OrderId,
        accrual: MinorUnits,
    ) -> Result<AccrualRecordResult, LedgerError> {
        if accrual.is_negative() {
            return Err(LedgerError::InvalidAmount(accrual));
        }
        let mut tx = self.pool.begin().await?;
        let result = orders::mark_processed(order_id, accrual, &mut tx).await?;
        if let AccrualRecordResult::Recorded(order) = &result {
            balances::credit(order.user_id, accrual, &mut tx).await?;
            tx.commit().await?;
            info!("🗃️ Order {order_id} is PROCESSED. Credited {accrual} to user {}", order.user_id);
        }
        Ok(result)
    }

    async fn fetch_orders_for_user(&self, user_id: i64) -> Result<Vec<Order>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let result = orders::fetch_orders_for_user(user_id, &mut conn).await?;
        Ok(result)
    }

    async fn fetch_unsettled_orders(&self, after: Option<&OrderId>, limit: i64) -> Result<Vec<Order>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let result = orders::fetch_unsettled_orders(after, limit, &mut conn).await?;
        Ok(result)
    }
}

impl BalanceManagement for SqliteDatabase {
    async fn open_balance(&self, user_id: i64) -> Result<(), LedgerError> {
        let mut conn = self.pool.acquire().await?;
        balances::open_balance(user_id, &mut conn).await?;
        Ok(())
    }

    async fn fetch_balance(&self, user_id: i64) -> Result<Balance, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let balance = balances::fetch_balance(user_id, &mut conn).await?;
        Ok(balance)
    }

    async fn credit_balance(&self, user_id: i64, amount: MinorUnits) -> Result<(), LedgerError> {
        let mut conn = self.pool.acquire().await?;
        balances::credit(user_id, amount, &mut conn).await?;
        Ok(())
    }

    async fn debit_balance_and_record_withdrawal(&self, withdrawal: NewWithdrawal) -> Result<Withdrawal, LedgerError> {
        if !withdrawal.amount.is_positive() {
            return Err(LedgerError::InvalidAmount(withdrawal.amount));
        }
        let mut tx = self.pool.begin().await?;
        let user_id = withdrawal.user_id;
        let requested = withdrawal.amount;
        if !balances::try_debit(user_id, requested, &mut tx).await? {
            let available = balances::fetch_balance(user_id, &mut tx).await?.current;
            debug!("🗃️ User {user_id} cannot withdraw {requested}. Available: {available}");
            return Err(LedgerError::InsufficientFunds { available, requested });
        }
        let record = withdrawals::insert_withdrawal(withdrawal, &mut tx).await?;
        tx.commit().await?;
        Ok(record)
    }

    async fn fetch_withdrawals(&self, user_id: i64) -> Result<Vec<Withdrawal>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let result = withdrawals::fetch_withdrawals(user_id, &mut conn).await?;
        Ok(result)
    }
}

impl LedgerDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn close(&mut self) -> Result<(), LedgerError> {
        self.pool.close().await;
        Ok(())
    }
}
