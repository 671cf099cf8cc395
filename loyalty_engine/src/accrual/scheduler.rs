use std::time::Duration;

use log::*;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::{
    accrual::{
        intake::{IntakeReceiver, QueueEntry},
        oracle::AccrualOracle,
        reconciler::Reconciler,
    },
    db::traits::LedgerDatabase,
};

/// Collects entries from the intake queue into batches and hands them to the reconciler.
///
/// A batch is dispatched as soon as it is full, or when the flush timer fires with at least one entry pending.
/// Dispatching never waits for the reconciliation to finish.
pub struct BatchScheduler<B, O> {
    receiver: IntakeReceiver,
    reconciler: Reconciler<B, O>,
    batch_size: usize,
    flush_interval: Duration,
}

impl<B, O> BatchScheduler<B, O>
where
    B: LedgerDatabase,
    O: AccrualOracle,
{
    pub fn new(receiver: IntakeReceiver, reconciler: Reconciler<B, O>, batch_size: usize, flush_interval: Duration) -> Self {
        Self { receiver, reconciler, batch_size: batch_size.max(1), flush_interval }
    }

    /// Runs until `shutdown` is cancelled or every producer of the intake queue is gone. Entries that were not
    /// dispatched by then are released, so that the recovery sweep can pick them up on the next start.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!("🗓️ Batch scheduler started. Batch size: {}, flush interval: {:?}", self.batch_size, self.flush_interval);
        let mut ticker = interval(self.flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut pending = Vec::with_capacity(self.batch_size);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("🗓️ Batch scheduler received the shutdown signal");
                    break;
                },
                entry = self.receiver.recv() => match entry {
                    Some(entry) => {
                        trace!("🗓️ Order {} joined the pending batch", entry.order_id);
                        pending.push(entry);
                        if pending.len() >= self.batch_size {
                            self.dispatch(&mut pending);
                        }
                    },
                    None => {
                        info!("🗓️ The intake queue has no producers left");
                        break;
                    },
                },
                _ = ticker.tick() => {
                    if !pending.is_empty() {
                        self.dispatch(&mut pending);
                    }
                },
            }
        }
        for entry in pending.drain(..) {
            self.receiver.release(&entry.order_id);
        }
        self.receiver.close();
        info!("🗓️ Batch scheduler has stopped");
    }

    fn dispatch(&self, pending: &mut Vec<QueueEntry>) {
        let batch = std::mem::replace(pending, Vec::with_capacity(self.batch_size));
        debug!("🗓️ Dispatching a batch of {} orders", batch.len());
        self.reconciler.dispatch(batch);
    }
}
