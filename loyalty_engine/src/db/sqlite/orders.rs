use chrono::Utc;
use log::{debug, trace};
use loyalty_common::MinorUnits;
use sqlx::SqliteConnection;

use crate::{
    db::{
        sqlite::SqliteDatabaseError,
        traits::{AccrualRecordResult, InsertOrderResult},
    },
    db_types::{AccrualUpdate, NewOrder, Order, OrderId, OrderStatusType},
};

const ORDER_COLUMNS: &str = "order_id, user_id, accrual, status, uploaded_at, updated_at";

/// Inserts the order if its order number is not known yet. Otherwise, the stored order is returned, whoever owns it.
///
/// This is a single statement, so two concurrent submissions of the same number cannot both insert.
pub async fn idempotent_insert(
    order: NewOrder,
    conn: &mut SqliteConnection,
) -> Result<InsertOrderResult, SqliteDatabaseError> {
    let now = Utc::now();
    let inserted = sqlx::query_as::<_, Order>(&format!(
        r#"
            INSERT INTO orders (order_id, user_id, accrual, status, uploaded_at, updated_at)
            VALUES ($1, $2, 0, 'NEW', $3, $3)
            ON CONFLICT (order_id) DO NOTHING
            RETURNING {ORDER_COLUMNS};
        "#
    ))
    .bind(&order.order_id)
    .bind(order.user_id)
    .bind(now)
    .fetch_optional(&mut *conn)
    .await?;
    if let Some(order) = inserted {
        debug!("🗃️ Order {} has been saved for user {}", order.order_id, order.user_id);
        return Ok(InsertOrderResult::Inserted(order));
    }
    let existing = fetch_order_by_order_id(&order.order_id, conn)
        .await?
        .ok_or_else(|| SqliteDatabaseError::OrderNotFound(order.order_id.clone()))?;
    trace!("🗃️ Order {} already exists. Owner: {}", existing.order_id, existing.user_id);
    Ok(InsertOrderResult::AlreadyExists(existing))
}

pub async fn fetch_order_by_order_id(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, SqliteDatabaseError> {
    let order = sqlx::query_as::<_, Order>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE order_id = $1"))
        .bind(order_id)
        .fetch_optional(conn)
        .await?;
    Ok(order)
}

/// Orders are returned in upload order. The rowid increases with every insert, so it doubles as the upload sequence.
pub async fn fetch_orders_for_user(user_id: i64, conn: &mut SqliteConnection) -> Result<Vec<Order>, SqliteDatabaseError> {
    let orders = sqlx::query_as::<_, Order>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY rowid ASC"
    ))
    .bind(user_id)
    .fetch_all(conn)
    .await?;
    Ok(orders)
}

/// Unsettled orders uploaded after `after`, oldest first. With no `after`, the page starts at the oldest order.
pub async fn fetch_unsettled_orders(
    after: Option<&OrderId>,
    limit: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, SqliteDatabaseError> {
    let orders = sqlx::query_as::<_, Order>(&format!(
        r#"
            SELECT {ORDER_COLUMNS} FROM orders
            WHERE status IN ('NEW', 'REGISTERED', 'PROCESSING')
              AND rowid > COALESCE((SELECT rowid FROM orders WHERE order_id = $1), 0)
            ORDER BY rowid ASC
            LIMIT $2
        "#
    ))
    .bind(after)
    .bind(limit)
    .fetch_all(conn)
    .await?;
    Ok(orders)
}

/// Writes the new status and accrual, unless the order is already final. Returns `None` if no row was updated.
async fn update_unless_final(
    order_id: &OrderId,
    update: AccrualUpdate,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, SqliteDatabaseError> {
    let order = sqlx::query_as::<_, Order>(&format!(
        r#"
            UPDATE orders SET status = $1, accrual = $2, updated_at = $3
            WHERE order_id = $4 AND status NOT IN ('INVALID', 'PROCESSED')
            RETURNING {ORDER_COLUMNS};
        "#
    ))
    .bind(update.status)
    .bind(update.accrual)
    .bind(Utc::now())
    .bind(order_id)
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

/// Records a status change. Terminal orders are left alone, and `AlreadyFinal` is returned with their current state.
pub async fn update_order_status(
    order_id: &OrderId,
    update: AccrualUpdate,
    conn: &mut SqliteConnection,
) -> Result<AccrualRecordResult, SqliteDatabaseError> {
    match update_unless_final(order_id, update, conn).await? {
        Some(order) => {
            debug!("🗃️ Order {order_id} is now {}", order.status);
            Ok(AccrualRecordResult::Recorded(order))
        },
        None => already_final(order_id, conn).await,
    }
}

/// Marks the order as `PROCESSED` with the given accrual. This is not atomic on its own; callers credit the balance on
/// the same transaction, passing `&mut *tx` as the connection.
pub async fn mark_processed(
    order_id: &OrderId,
    accrual: MinorUnits,
    conn: &mut SqliteConnection,
) -> Result<AccrualRecordResult, SqliteDatabaseError> {
    let update = AccrualUpdate::new(OrderStatusType::Processed, accrual);
    match update_unless_final(order_id, update, conn).await? {
        Some(order) => Ok(AccrualRecordResult::Recorded(order)),
        None => already_final(order_id, conn).await,
    }
}

async fn already_final(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<AccrualRecordResult, SqliteDatabaseError> {
    let order = fetch_order_by_order_id(order_id, conn)
        .await?
        .ok_or_else(|| SqliteDatabaseError::OrderNotFound(order_id.clone()))?;
    debug!("🗃️ Order {order_id} is already {}. Leaving it alone.", order.status);
    Ok(AccrualRecordResult::AlreadyFinal(order))
}
