use std::sync::Arc;

use log::*;
use tokio::task::JoinHandle;
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use crate::{
    accrual::{
        config::{AccrualEngineConfig, PushPolicy},
        intake::{intake_queue, IntakeQueue},
        oracle::AccrualOracle,
        reconciler::Reconciler,
        scheduler::BatchScheduler,
        sweep::RecoverySweep,
    },
    db::traits::LedgerDatabase,
    events::EventProducers,
    OrderFlowApi,
};

pub struct AccrualEngine;

impl AccrualEngine {
    /// Starts the batch scheduler and the recovery sweep on the current tokio runtime.
    pub fn start<B, O>(db: B, oracle: O, config: AccrualEngineConfig, producers: EventProducers) -> AccrualEngineHandle
    where
        B: LedgerDatabase,
        O: AccrualOracle,
    {
        let config = config.normalised();
        let (intake, receiver) = intake_queue(config.queue_capacity);
        let shutdown = CancellationToken::new();
        let tasks = TaskTracker::new();
        let reconciler = Reconciler::new(db.clone(), Arc::new(oracle), intake.clone(), producers, &config, tasks.clone());
        let scheduler = BatchScheduler::new(receiver, reconciler, config.batch_size, config.flush_interval);
        let scheduler = tokio::spawn(scheduler.run(shutdown.clone()));
        let sweep = RecoverySweep::new(db, intake.clone(), config.sweep_interval, config.sweep_limit);
        let sweep = tokio::spawn(sweep.run(shutdown.clone()));
        info!(
            "🔄️ Accrual engine started. Queue capacity: {}, max concurrency: {}, attempts per cycle: {}",
            config.queue_capacity, config.max_concurrency, config.max_attempts
        );
        AccrualEngineHandle { intake, submit_policy: config.submit_policy, shutdown, scheduler, sweep, tasks }
    }
}

/// Controls a running [`AccrualEngine`].
pub struct AccrualEngineHandle {
    intake: IntakeQueue,
    submit_policy: PushPolicy,
    shutdown: CancellationToken,
    scheduler: JoinHandle<()>,
    sweep: JoinHandle<()>,
    tasks: TaskTracker,
}

impl AccrualEngineHandle {
    pub fn intake(&self) -> &IntakeQueue {
        &self.intake
    }

    pub fn submit_policy(&self) -> PushPolicy {
        self.submit_policy
    }

    /// An order submission API that feeds this engine.
    pub fn order_flow_api<B: LedgerDatabase>(&self, db: B) -> OrderFlowApi<B> {
        OrderFlowApi::new(db, self.intake.clone(), self.submit_policy)
    }

    /// Stops the scheduler and the sweep, then waits for every reconciliation that is still running.
    pub async fn shutdown(self) {
        info!("🔄️ Shutting down the accrual engine");
        self.shutdown.cancel();
        if let Err(e) = self.scheduler.await {
            error!("🔄️ The batch scheduler did not shut down cleanly. {e}");
        }
        if let Err(e) = self.sweep.await {
            error!("🔄️ The recovery sweep did not shut down cleanly. {e}");
        }
        self.tasks.close();
        if !self.tasks.is_empty() {
            info!("🔄️ Waiting for {} reconciliations to finish", self.tasks.len());
        }
        self.tasks.wait().await;
        info!("🔄️ Accrual engine has stopped");
    }
}
