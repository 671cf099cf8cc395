use std::{cmp::min, sync::Arc, time::Duration};

use log::*;
use loyalty_common::MinorUnits;
use tokio::sync::Semaphore;
use tokio_util::task::TaskTracker;

use crate::{
    accrual::{
        config::AccrualEngineConfig,
        intake::{IntakeQueue, QueueEntry},
        oracle::{AccrualClientError, AccrualOracle, AccrualVerdict},
    },
    db::traits::{AccrualRecordResult, LedgerDatabase, LedgerError},
    db_types::{AccrualUpdate, OrderStatusType},
    events::{EventProducers, OrderCreditedEvent, OrderRejectedEvent},
};

/// How a single reconciliation cycle for an order ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The order reached `PROCESSED` and its owner was credited.
    Credited(MinorUnits),
    /// The order reached `INVALID`.
    Rejected,
    /// The order is not final yet and went back on the queue.
    Requeued(OrderStatusType),
    /// Another reconciliation already settled the order.
    AlreadyFinal(OrderStatusType),
    /// Every oracle attempt failed.
    Exhausted { requeued: bool },
    /// The oracle answered, but the answer could not be stored.
    PersistenceFailed { requeued: bool },
    /// The intake queue was closed before the order could go back on it.
    Dropped,
}

#[derive(Debug, Clone, Copy)]
struct RetryPolicy {
    max_attempts: u32,
    backoff: Duration,
    max_rate_limit_wait: Duration,
    requeue_on_exhausted: bool,
}

impl RetryPolicy {
    fn delay_after(&self, attempt: u32, error: &AccrualClientError) -> Duration {
        match error {
            AccrualClientError::RateLimited { retry_after } => min(*retry_after, self.max_rate_limit_wait),
            _ => self.backoff * attempt,
        }
    }
}

/// Polls the accrual oracle for each dispatched order and records the outcome.
///
/// Every order is reconciled on its own task. At most `max_concurrency` tasks talk to the oracle or the ledger at any
/// one time, no matter how many batches have been dispatched. A task holds its permit until the outcome has been
/// recorded, and gives it back before waiting for room on the intake queue.
pub struct Reconciler<B, O> {
    db: B,
    oracle: Arc<O>,
    intake: IntakeQueue,
    producers: EventProducers,
    permits: Arc<Semaphore>,
    tasks: TaskTracker,
    policy: RetryPolicy,
}

impl<B: Clone, O> Clone for Reconciler<B, O> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            oracle: Arc::clone(&self.oracle),
            intake: self.intake.clone(),
            producers: self.producers.clone(),
            permits: Arc::clone(&self.permits),
            tasks: self.tasks.clone(),
            policy: self.policy,
        }
    }
}

impl<B, O> Reconciler<B, O>
where
    B: LedgerDatabase,
    O: AccrualOracle,
{
    pub fn new(
        db: B,
        oracle: Arc<O>,
        intake: IntakeQueue,
        producers: EventProducers,
        config: &AccrualEngineConfig,
        tasks: TaskTracker,
    ) -> Self {
        let policy = RetryPolicy {
            max_attempts: config.max_attempts.max(1),
            backoff: config.retry_backoff,
            max_rate_limit_wait: config.max_rate_limit_wait,
            requeue_on_exhausted: config.requeue_on_exhausted,
        };
        let permits = Arc::new(Semaphore::new(config.max_concurrency.max(1)));
        Self { db, oracle, intake, producers, permits, tasks, policy }
    }

    /// Spawns one task per entry and returns immediately.
    pub fn dispatch(&self, batch: Vec<QueueEntry>) {
        for entry in batch {
            let reconciler = self.clone();
            self.tasks.spawn(async move {
                reconciler.reconcile(entry).await;
            });
        }
    }

    /// Runs one reconciliation cycle for the entry. The entry is either requeued or released by the time this
    /// returns.
    pub async fn reconcile(&self, entry: QueueEntry) -> ReconcileOutcome {
        let Ok(permit) = Arc::clone(&self.permits).acquire_owned().await else {
            warn!("🔄️ Reconciler permits have been closed. Dropping order {}", entry.order_id);
            self.intake.release(&entry.order_id);
            return ReconcileOutcome::Dropped;
        };
        let outcome = match self.poll_oracle(&entry).await {
            Some(verdict) => self.record(&entry, verdict).await,
            None => ReconcileOutcome::Exhausted { requeued: self.policy.requeue_on_exhausted },
        };
        drop(permit);
        self.finish(entry, outcome).await
    }

    /// Calls the oracle until it gives a usable answer or the attempt budget runs out.
    async fn poll_oracle(&self, entry: &QueueEntry) -> Option<AccrualVerdict> {
        let max = self.policy.max_attempts;
        for attempt in 1..=max {
            let result = self.oracle.lookup(&entry.order_id).await.and_then(AccrualVerdict::from_lookup);
            match result {
                Ok(verdict) => {
                    trace!("🔄️ Oracle verdict for order {} (attempt {attempt}): {verdict:?}", entry.order_id);
                    return Some(verdict);
                },
                Err(e) => {
                    warn!("🔄️ Accrual lookup for order {} failed (attempt {attempt}/{max}). {e}", entry.order_id);
                    if attempt < max {
                        let delay = self.policy.delay_after(attempt, &e);
                        if !delay.is_zero() {
                            tokio::time::sleep(delay).await;
                        }
                    }
                },
            }
        }
        warn!("🔄️ Giving up on order {} for this cycle after {max} failed attempts", entry.order_id);
        None
    }

    async fn record(&self, entry: &QueueEntry, verdict: AccrualVerdict) -> ReconcileOutcome {
        let (status, accrual) = match verdict {
            AccrualVerdict::NotRegistered => {
                debug!("🔄️ The oracle does not know order {} yet", entry.order_id);
                return ReconcileOutcome::Requeued(entry.status);
            },
            AccrualVerdict::Unrecognised(s) => {
                warn!("🔄️ The oracle reported unknown status '{s}' for order {}. Will ask again.", entry.order_id);
                return ReconcileOutcome::Requeued(entry.status);
            },
            AccrualVerdict::Outcome { status, accrual } => (status, accrual),
        };
        let result = match status {
            OrderStatusType::Processed => self.db.settle_processed_order(&entry.order_id, accrual).await,
            status => self.db.update_order_status_and_accrual(&entry.order_id, AccrualUpdate::new(status, accrual)).await,
        };
        match result {
            Ok(AccrualRecordResult::Recorded(order)) => match order.status {
                OrderStatusType::Processed => {
                    let amount = order.accrual;
                    self.producers.publish_order_credited(OrderCreditedEvent::new(order));
                    ReconcileOutcome::Credited(amount)
                },
                OrderStatusType::Invalid => {
                    info!("🔄️ Order {} was rejected by the accrual system", entry.order_id);
                    self.producers.publish_order_rejected(OrderRejectedEvent::new(order));
                    ReconcileOutcome::Rejected
                },
                status => {
                    debug!("🔄️ Order {} is {status}. It will be polled again.", entry.order_id);
                    ReconcileOutcome::Requeued(status)
                },
            },
            Ok(AccrualRecordResult::AlreadyFinal(order)) => ReconcileOutcome::AlreadyFinal(order.status),
            Err(e) => {
                self.log_persistence_error(entry, status, &e);
                ReconcileOutcome::PersistenceFailed { requeued: !status.is_terminal() }
            },
        }
    }

    fn log_persistence_error(&self, entry: &QueueEntry, status: OrderStatusType, e: &LedgerError) {
        error!(
            "🔄️ Could not record status {status} for order {} of user {}. It stays {} for now. {e}",
            entry.order_id, entry.user_id, entry.status
        );
    }

    /// Requeues or releases the entry, depending on the outcome.
    async fn finish(&self, mut entry: QueueEntry, outcome: ReconcileOutcome) -> ReconcileOutcome {
        let requeue = match outcome {
            ReconcileOutcome::Requeued(status) => {
                entry.status = status;
                true
            },
            ReconcileOutcome::Exhausted { requeued } | ReconcileOutcome::PersistenceFailed { requeued } => requeued,
            _ => false,
        };
        if !requeue {
            self.intake.release(&entry.order_id);
            return outcome;
        }
        let order_id = entry.order_id.clone();
        match self.intake.requeue(entry).await {
            Ok(()) => {
                trace!("📥️ Order {order_id} is back on the intake queue");
                outcome
            },
            Err(e) => {
                info!("📥️ {e}");
                ReconcileOutcome::Dropped
            },
        }
    }
}
