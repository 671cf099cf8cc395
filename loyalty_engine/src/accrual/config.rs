use std::time::Duration;

pub const DEFAULT_QUEUE_CAPACITY: usize = 20;
pub const DEFAULT_BATCH_SIZE: usize = 50;
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(3);
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_MAX_CONCURRENCY: usize = 50;
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_SWEEP_LIMIT: i64 = 1_000;
/// Upper bound on how long a reconciler honours a `Retry-After` from the oracle.
pub const DEFAULT_MAX_RATE_LIMIT_WAIT: Duration = Duration::from_secs(60);

/// What a producer does when the intake queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushPolicy {
    /// Wait until there is room.
    Block,
    /// Wait at most this long, then give up.
    Timeout(Duration),
    /// Give up straight away.
    Reject,
}

#[derive(Debug, Clone)]
pub struct AccrualEngineConfig {
    pub queue_capacity: usize,
    pub batch_size: usize,
    pub flush_interval: Duration,
    /// Oracle calls per order and reconciliation cycle.
    pub max_attempts: u32,
    /// The wait before attempt `n + 1` is `n * retry_backoff`. Zero retries immediately.
    pub retry_backoff: Duration,
    pub max_rate_limit_wait: Duration,
    /// Reconciler tasks allowed to talk to the oracle at the same time, across all batches.
    pub max_concurrency: usize,
    /// Applies to order submission. Re-queues from the reconciler always block.
    pub submit_policy: PushPolicy,
    /// Put an order back on the queue straight away when all attempts fail, instead of leaving it to the sweep.
    pub requeue_on_exhausted: bool,
    pub sweep_interval: Duration,
    /// Maximum number of unsettled orders loaded by one sweep.
    pub sweep_limit: i64,
}

impl Default for AccrualEngineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            batch_size: DEFAULT_BATCH_SIZE,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_backoff: Duration::ZERO,
            max_rate_limit_wait: DEFAULT_MAX_RATE_LIMIT_WAIT,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            submit_policy: PushPolicy::Reject,
            requeue_on_exhausted: false,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            sweep_limit: DEFAULT_SWEEP_LIMIT,
        }
    }
}

impl AccrualEngineConfig {
    /// Replaces zero sizes, which would stall the pipeline, with the smallest workable value.
    pub fn normalised(mut self) -> Self {
        self.queue_capacity = self.queue_capacity.max(1);
        self.batch_size = self.batch_size.max(1);
        self.max_attempts = self.max_attempts.max(1);
        self.max_concurrency = self.max_concurrency.max(1);
        self.sweep_limit = self.sweep_limit.max(1);
        if self.flush_interval.is_zero() {
            self.flush_interval = Duration::from_millis(1);
        }
        if self.sweep_interval.is_zero() {
            self.sweep_interval = DEFAULT_SWEEP_INTERVAL;
        }
        self
    }
}
