use chrono::Utc;
use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db::sqlite::SqliteDatabaseError,
    db_types::{NewWithdrawal, Withdrawal},
};

pub async fn insert_withdrawal(
    withdrawal: NewWithdrawal,
    conn: &mut SqliteConnection,
) -> Result<Withdrawal, SqliteDatabaseError> {
    let record = sqlx::query_as::<_, Withdrawal>(
        r#"
            INSERT INTO withdrawals (user_id, order_id, amount, processed_at) VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, order_id, amount, processed_at;
        "#,
    )
    .bind(withdrawal.user_id)
    .bind(&withdrawal.order_id)
    .bind(withdrawal.amount)
    .bind(Utc::now())
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Recorded withdrawal #{} of {} for user {}", record.id, record.amount, record.user_id);
    Ok(record)
}

pub async fn fetch_withdrawals(user_id: i64, conn: &mut SqliteConnection) -> Result<Vec<Withdrawal>, SqliteDatabaseError> {
    let withdrawals = sqlx::query_as::<_, Withdrawal>(
        "SELECT id, user_id, order_id, amount, processed_at FROM withdrawals WHERE user_id = $1 ORDER BY id ASC",
    )
    .bind(user_id)
    .fetch_all(conn)
    .await?;
    Ok(withdrawals)
}
