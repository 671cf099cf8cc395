use std::{sync::Mutex, time::Duration};

use log::*;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::{
    accrual::{
        config::PushPolicy,
        intake::{IntakeError, IntakeQueue, Offer, QueueEntry},
    },
    db::traits::{LedgerDatabase, LedgerError},
    db_types::OrderId,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Unsettled orders found in this page of the ledger.
    pub found: usize,
    /// Orders put on the intake queue.
    pub queued: usize,
    /// Orders that were already queued or being reconciled.
    pub in_flight: usize,
    /// Orders left for the next sweep because the queue was full.
    pub deferred: usize,
}

/// Periodically offers every unsettled order in the ledger to the intake queue.
///
/// This recovers orders that were left behind: orders that were still queued when the process stopped, orders whose
/// oracle attempts were all used up, and orders whose outcome could not be recorded. The sweep never waits for room
/// on the queue. Whatever does not fit is left for the next run.
///
/// Each run reads at most `limit` orders. The sweep remembers where the last run stopped and carries on from there, so
/// a backlog of long-running orders at the head of the ledger cannot hide the orders behind it. A short page means the
/// end of the ledger was reached, and the next run starts again from the oldest unsettled order.
pub struct RecoverySweep<B> {
    db: B,
    intake: IntakeQueue,
    interval: Duration,
    limit: i64,
    cursor: Mutex<Option<OrderId>>,
}

impl<B: LedgerDatabase> RecoverySweep<B> {
    pub fn new(db: B, intake: IntakeQueue, interval: Duration, limit: i64) -> Self {
        Self { db, intake, interval, limit, cursor: Mutex::new(None) }
    }

    /// Runs a sweep straight away, and then every `interval` until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut timer = interval(self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("🧹️ Recovery sweep started. Interval: {:?}", self.interval);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = timer.tick() => match self.sweep_once().await {
                    Ok(report) if report.found > 0 => info!(
                        "🧹️ Recovery sweep: {} unsettled orders. {} queued, {} in flight, {} deferred",
                        report.found, report.queued, report.in_flight, report.deferred
                    ),
                    Ok(_) => trace!("🧹️ Recovery sweep found no unsettled orders"),
                    Err(e) => error!("🧹️ Error running the recovery sweep: {e}"),
                },
            }
        }
        info!("🧹️ Recovery sweep has stopped");
    }

    pub async fn sweep_once(&self) -> Result<SweepReport, LedgerError> {
        let after = self.cursor.lock().map(|c| (*c).clone()).unwrap_or_default();
        let orders = self.db.fetch_unsettled_orders(after.as_ref(), self.limit).await?;
        let mut report = SweepReport { found: orders.len(), ..Default::default() };
        // Where the next run starts. A full page continues from its last order, a short one wraps around.
        let mut next = if orders.len() as i64 >= self.limit { orders.last().map(|o| o.order_id.clone()) } else { None };
        for (i, order) in orders.iter().enumerate() {
            match self.intake.push(QueueEntry::from(order), PushPolicy::Reject).await {
                Ok(Offer::Queued) => report.queued += 1,
                Ok(Offer::AlreadyTracked) => report.in_flight += 1,
                Err(IntakeError::Full(_)) | Err(IntakeError::TimedOut(_)) => {
                    report.deferred = orders.len() - i;
                    next = if i == 0 { after } else { Some(orders[i - 1].order_id.clone()) };
                    break;
                },
                Err(IntakeError::Closed(_)) => {
                    debug!("🧹️ The intake queue is closed. Abandoning the sweep.");
                    report.deferred = orders.len() - i;
                    break;
                },
            }
        }
        if let Ok(mut cursor) = self.cursor.lock() {
            *cursor = next;
        }
        Ok(report)
    }
}
