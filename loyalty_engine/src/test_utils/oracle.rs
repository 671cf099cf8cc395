//! An in-process accrual oracle whose replies are scripted per order.
use std::{
    collections::{HashMap, VecDeque},
    str::FromStr,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

use rust_decimal::Decimal;

use crate::{
    accrual::{AccrualClientError, AccrualOracle, AccrualResponse, AccrualStatus},
    db_types::OrderId,
};

pub type OracleReply = Result<Option<AccrualResponse>, AccrualClientError>;

pub fn processed(order: &str, accrual: &str) -> OracleReply {
    let accrual = Decimal::from_str(accrual).expect("Invalid accrual in test script");
    Ok(Some(AccrualResponse::new(order, AccrualStatus::Processed, Some(accrual))))
}

pub fn processing(order: &str) -> OracleReply {
    Ok(Some(AccrualResponse::new(order, AccrualStatus::Processing, None)))
}

pub fn registered(order: &str) -> OracleReply {
    Ok(Some(AccrualResponse::new(order, AccrualStatus::Registered, None)))
}

pub fn invalid(order: &str) -> OracleReply {
    Ok(Some(AccrualResponse::new(order, AccrualStatus::Invalid, None)))
}

pub fn not_registered() -> OracleReply {
    Ok(None)
}

pub fn transient() -> OracleReply {
    Err(AccrualClientError::Transport("connection refused".into()))
}

/// Replies with the scripted replies for each order, in order. Once an order's script runs out, every further call
/// fails with a transport error.
#[derive(Default)]
pub struct ScriptedOracle {
    scripts: Mutex<HashMap<String, VecDeque<OracleReply>>>,
    calls: Mutex<HashMap<String, usize>>,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every lookup takes at least this long.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Appends replies to the script for the order.
    pub fn script(&self, order: &str, replies: Vec<OracleReply>) {
        self.scripts.lock().unwrap().entry(order.to_string()).or_default().extend(replies);
    }

    pub fn calls(&self, order: &str) -> usize {
        self.calls.lock().unwrap().get(order).copied().unwrap_or(0)
    }

    /// The highest number of lookups that were running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn next_reply(&self, order: &str) -> OracleReply {
        *self.calls.lock().unwrap().entry(order.to_string()).or_default() += 1;
        self.scripts
            .lock()
            .unwrap()
            .get_mut(order)
            .and_then(|replies| replies.pop_front())
            .unwrap_or_else(|| Err(AccrualClientError::Transport(format!("no scripted reply for {order}"))))
    }
}

impl AccrualOracle for ScriptedOracle {
    async fn lookup(&self, order_id: &OrderId) -> Result<Option<AccrualResponse>, AccrualClientError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let reply = self.next_reply(order_id.as_str());
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        reply
    }
}
