use std::fmt::Debug;

use log::*;

use crate::{
    accrual::{IntakeError, IntakeQueue, Offer, PushPolicy, QueueEntry},
    db::traits::{InsertOrderResult, OrderManagement},
    db_types::{NewOrder, Order, OrderId},
    ledger_api::errors::OrderFlowError,
};

/// `OrderFlowApi` accepts order submissions from users and feeds them into the accrual pipeline.
pub struct OrderFlowApi<B> {
    db: B,
    intake: IntakeQueue,
    policy: PushPolicy,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi ({:?})", self.policy)
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B, intake: IntakeQueue, policy: PushPolicy) -> Self {
        Self { db, intake, policy }
    }
}

impl<B> OrderFlowApi<B>
where B: OrderManagement
{
    /// Submits an order number on behalf of a user.
    ///
    /// The number must pass the Luhn check. Order numbers are unique across all users: a number that has been
    /// submitted before results in [`OrderFlowError::AlreadySubmitted`] or [`OrderFlowError::OwnedByAnotherUser`],
    /// and is not queued again.
    ///
    /// A new order is stored as `NEW` before it is offered to the intake queue. If the queue cannot take it under the
    /// configured push policy, the submission still succeeds; the recovery sweep picks the order up later.
    pub async fn submit_order(&self, user_id: i64, order_number: &str) -> Result<Order, OrderFlowError> {
        let order_id = order_number.parse::<OrderId>()?;
        if let Some(existing) = self.db.fetch_order_by_order_id(&order_id).await? {
            return Err(Self::conflict(user_id, existing));
        }
        let order = match self.db.insert_order(NewOrder::new(order_id, user_id)).await? {
            InsertOrderResult::Inserted(order) => order,
            // Someone else got there between the check and the insert
            InsertOrderResult::AlreadyExists(existing) => return Err(Self::conflict(user_id, existing)),
        };
        info!("📥️ User {user_id} submitted order {}", order.order_id);
        self.enqueue(&order).await;
        Ok(order)
    }

    fn conflict(user_id: i64, existing: Order) -> OrderFlowError {
        if existing.user_id == user_id {
            OrderFlowError::AlreadySubmitted(existing.order_id)
        } else {
            OrderFlowError::OwnedByAnotherUser(existing.order_id)
        }
    }

    async fn enqueue(&self, order: &Order) {
        match self.intake.push(QueueEntry::from(order), self.policy).await {
            Ok(Offer::Queued) => trace!("📥️ Order {} is on the intake queue", order.order_id),
            Ok(Offer::AlreadyTracked) => trace!("📥️ Order {} was already in the pipeline", order.order_id),
            Err(e @ IntakeError::Closed(_)) => warn!("📥️ {e}. The recovery sweep will pick it up on the next start."),
            Err(e) => info!("📥️ {e}. The recovery sweep will pick it up."),
        }
    }
}
