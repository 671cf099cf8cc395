//! The order accrual reconciliation engine.
//!
//! Submitted orders travel through the following pipeline:
//!
//! 1. The [`IntakeQueue`] is a bounded channel of [`QueueEntry`] handles. Order submission and the reconciler push
//!    onto it.
//! 2. The [`BatchScheduler`] is the only consumer. It groups entries into batches, flushed by size or by timer.
//! 3. The [`Reconciler`] polls the [`AccrualOracle`] for every order in a batch on its own task, records the verdict
//!    in the ledger, credits `PROCESSED` orders and requeues orders that are not final yet.
//! 4. The [`RecoverySweep`] periodically re-offers unsettled orders from the ledger, so that nothing is stranded by a
//!    restart or a run of oracle failures.
//!
//! [`AccrualEngine::start`] wires everything together and returns an [`AccrualEngineHandle`] that stops it again.
mod config;
mod engine;
mod http_client;
mod intake;
mod oracle;
mod reconciler;
mod scheduler;
mod sweep;

pub use config::{AccrualEngineConfig, PushPolicy};
pub use engine::{AccrualEngine, AccrualEngineHandle};
pub use http_client::{AccrualClient, DEFAULT_RETRY_AFTER};
pub use intake::{intake_queue, IntakeError, IntakeQueue, IntakeReceiver, Offer, QueueEntry};
pub use oracle::{AccrualClientError, AccrualOracle, AccrualResponse, AccrualStatus, AccrualVerdict};
pub use reconciler::{ReconcileOutcome, Reconciler};
pub use scheduler::BatchScheduler;
pub use sweep::{RecoverySweep, SweepReport};

#[cfg(test)]
mod tests;
