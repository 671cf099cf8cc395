//! The intake queue is the bounded channel that feeds the batch scheduler.
//!
//! Besides the channel itself, the queue keeps track of every order id it currently owns. An order is owned from the
//! moment it is pushed until its reconciler finishes with it without requeueing. Offers for an owned order are
//! ignored, so the recovery sweep can re-offer unsettled orders without polling the same order twice at once.
use std::{
    collections::HashSet,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use log::*;
use thiserror::Error;
use tokio::sync::mpsc::{
    self,
    error::{SendTimeoutError, TrySendError},
};

use crate::{
    accrual::config::PushPolicy,
    db_types::{Order, OrderId, OrderStatusType},
};

/// The in-memory handle for an order travelling through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    pub order_id: OrderId,
    pub user_id: i64,
    pub status: OrderStatusType,
}

impl QueueEntry {
    pub fn new(order_id: OrderId, user_id: i64, status: OrderStatusType) -> Self {
        Self { order_id, user_id, status }
    }
}

impl From<&Order> for QueueEntry {
    fn from(order: &Order) -> Self {
        Self::new(order.order_id.clone(), order.user_id, order.status)
    }
}

#[derive(Debug, Clone, Error)]
pub enum IntakeError {
    #[error("The intake queue is full. Order {} was not queued", .0.order_id)]
    Full(QueueEntry),
    #[error("Timed out waiting for room in the intake queue. Order {} was not queued", .0.order_id)]
    TimedOut(QueueEntry),
    #[error("The intake queue has been closed. Order {} was not queued", .0.order_id)]
    Closed(QueueEntry),
}

impl IntakeError {
    pub fn entry(&self) -> &QueueEntry {
        match self {
            Self::Full(e) | Self::TimedOut(e) | Self::Closed(e) => e,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    Queued,
    /// The order is already queued or being reconciled. Nothing was pushed.
    AlreadyTracked,
}

type Tracked = Arc<Mutex<HashSet<OrderId>>>;

fn lock(tracked: &Tracked) -> MutexGuard<'_, HashSet<OrderId>> {
    tracked.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The producer side of the intake queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct IntakeQueue {
    sender: mpsc::Sender<QueueEntry>,
    tracked: Tracked,
}

/// The consumer side of the intake queue. There is exactly one, owned by the batch scheduler.
#[derive(Debug)]
pub struct IntakeReceiver {
    receiver: mpsc::Receiver<QueueEntry>,
    tracked: Tracked,
}

pub fn intake_queue(capacity: usize) -> (IntakeQueue, IntakeReceiver) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    let tracked = Tracked::default();
    (IntakeQueue { sender, tracked: tracked.clone() }, IntakeReceiver { receiver, tracked })
}

impl IntakeQueue {
    /// Offers a new entry to the queue. If the order is already owned by the queue, nothing happens. Otherwise, the
    /// entry is pushed according to `policy`. If the push fails, the order is no longer owned by the queue.
    pub async fn push(&self, entry: QueueEntry, policy: PushPolicy) -> Result<Offer, IntakeError> {
        if !lock(&self.tracked).insert(entry.order_id.clone()) {
            trace!("📥️ Order {} is already in the pipeline", entry.order_id);
            return Ok(Offer::AlreadyTracked);
        }
        let result = match policy {
            PushPolicy::Block => self.sender.send(entry).await.map_err(|e| IntakeError::Closed(e.0)),
            PushPolicy::Timeout(timeout) => self.sender.send_timeout(entry, timeout).await.map_err(|e| match e {
                SendTimeoutError::Timeout(e) => IntakeError::TimedOut(e),
                SendTimeoutError::Closed(e) => IntakeError::Closed(e),
            }),
            PushPolicy::Reject => self.sender.try_send(entry).map_err(|e| match e {
                TrySendError::Full(e) => IntakeError::Full(e),
                TrySendError::Closed(e) => IntakeError::Closed(e),
            }),
        };
        match result {
            Ok(()) => Ok(Offer::Queued),
            Err(e) => {
                self.release(&e.entry().order_id);
                Err(e)
            },
        }
    }

    /// Puts an entry that the queue already owns back on the queue, waiting for room if necessary. If the queue is
    /// closed, ownership is given up.
    pub async fn requeue(&self, entry: QueueEntry) -> Result<(), IntakeError> {
        lock(&self.tracked).insert(entry.order_id.clone());
        if let Err(e) = self.sender.send(entry).await {
            self.release(&e.0.order_id);
            return Err(IntakeError::Closed(e.0));
        }
        Ok(())
    }

    /// Gives up ownership of the order. It can be offered again afterwards.
    pub fn release(&self, order_id: &OrderId) {
        lock(&self.tracked).remove(order_id);
    }

    pub fn is_tracked(&self, order_id: &OrderId) -> bool {
        lock(&self.tracked).contains(order_id)
    }

    /// The number of orders owned by the queue, whether they are waiting in it or being reconciled.
    pub fn tracked_count(&self) -> usize {
        lock(&self.tracked).len()
    }

    /// Entries waiting in the channel.
    pub fn len(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.sender.max_capacity()
    }
}

impl IntakeReceiver {
    pub async fn recv(&mut self) -> Option<QueueEntry> {
        self.receiver.recv().await
    }

    pub fn release(&self, order_id: &OrderId) {
        lock(&self.tracked).remove(order_id);
    }

    /// Closes the channel and gives up ownership of everything still waiting in it.
    pub fn close(&mut self) {
        self.receiver.close();
        let mut dropped = 0;
        while let Ok(entry) = self.receiver.try_recv() {
            self.release(&entry.order_id);
            dropped += 1;
        }
        if dropped > 0 {
            info!("📥️ Intake queue closed with {dropped} entries still waiting. The recovery sweep will pick them up.");
        }
    }
}
