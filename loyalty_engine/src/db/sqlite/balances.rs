use log::{debug, trace};
use loyalty_common::MinorUnits;
use sqlx::SqliteConnection;

use crate::{db::sqlite::SqliteDatabaseError, db_types::Balance};

pub async fn open_balance(user_id: i64, conn: &mut SqliteConnection) -> Result<(), SqliteDatabaseError> {
    let result = sqlx::query("INSERT INTO balances (user_id, current, withdrawn) VALUES ($1, 0, 0) ON CONFLICT (user_id) DO NOTHING")
        .bind(user_id)
        .execute(conn)
        .await?;
    if result.rows_affected() > 0 {
        debug!("🗃️ Opened a new balance for user {user_id}");
    }
    Ok(())
}

/// Fetches the balance for the user. A user without a balance row has a zero balance.
pub async fn fetch_balance(user_id: i64, conn: &mut SqliteConnection) -> Result<Balance, SqliteDatabaseError> {
    let balance = sqlx::query_as::<_, Balance>("SELECT user_id, current, withdrawn FROM balances WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(conn)
        .await?;
    Ok(balance.unwrap_or_else(|| Balance::empty(user_id)))
}

/// Adds `amount` to the user's current balance, creating the balance row if necessary.
pub async fn credit(user_id: i64, amount: MinorUnits, conn: &mut SqliteConnection) -> Result<(), SqliteDatabaseError> {
    if amount.is_negative() {
        return Err(SqliteDatabaseError::InvalidAmount(amount));
    }
    sqlx::query(
        r#"
            INSERT INTO balances (user_id, current, withdrawn) VALUES ($1, $2, 0)
            ON CONFLICT (user_id) DO UPDATE SET current = current + excluded.current
        "#,
    )
    .bind(user_id)
    .bind(amount)
    .execute(conn)
    .await?;
    trace!("🗃️ Credited {amount} to user {user_id}");
    Ok(())
}

/// Moves `amount` from the user's current balance to their withdrawn total, but only if the current balance covers it.
/// Returns false, leaving the balance untouched, if it does not.
///
/// The check and the update are a single statement, so concurrent debits cannot both pass the check.
pub async fn try_debit(user_id: i64, amount: MinorUnits, conn: &mut SqliteConnection) -> Result<bool, SqliteDatabaseError> {
    let result = sqlx::query(
        r#"
            UPDATE balances SET current = current - $1, withdrawn = withdrawn + $1
            WHERE user_id = $2 AND current >= $1
        "#,
    )
    .bind(amount)
    .bind(user_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}
