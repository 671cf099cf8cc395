//! Best-effort delivery of engine events to hooks.
//!
//! Each hook owns a bounded buffer. Reconcilers publish into it without waiting: when a hook falls behind and its
//! buffer is full, the event is logged and dropped, so a slow hook never holds up crediting. Each event is handled on
//! its own task.
use std::{future::Future, pin::Pin, sync::Arc};

use log::*;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::task::TaskTracker;

pub type Handler<E> = Arc<dyn Fn(E) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// The receiving end of one hook.
pub struct EventHandler<E: Send + Sync + 'static> {
    inbox: mpsc::Receiver<E>,
    sender: mpsc::Sender<E>,
    handler: Handler<E>,
}

impl<E: Send + Sync + 'static> EventHandler<E> {
    pub fn new(buffer_size: usize, handler: Handler<E>) -> Self {
        let (sender, inbox) = mpsc::channel(buffer_size.max(1));
        Self { inbox, sender, handler }
    }

    pub fn subscribe(&self) -> EventProducer<E> {
        EventProducer { sender: self.sender.clone() }
    }

    /// Handles events until the last producer is dropped, then waits for the jobs still running.
    pub async fn start_handler(self) {
        let Self { mut inbox, sender, handler } = self;
        drop(sender);
        let jobs = TaskTracker::new();
        while let Some(event) = inbox.recv().await {
            let handler = Arc::clone(&handler);
            jobs.spawn(async move { (handler)(event).await });
        }
        jobs.close();
        jobs.wait().await;
        debug!("📬️ Event hook has stopped");
    }
}

#[derive(Clone)]
pub struct EventProducer<E: Send + Sync> {
    sender: mpsc::Sender<E>,
}

impl<E: Send + Sync> EventProducer<E> {
    /// Returns `false` if the event was dropped.
    pub fn publish_event(&self, event: E) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!("📬️ An event hook is falling behind. Dropping an event.");
                false
            },
            Err(TrySendError::Closed(_)) => {
                trace!("📬️ Event hook has stopped. Dropping an event.");
                false
            },
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicI64, Ordering};

    use super::*;

    fn summing_handler(total: Arc<AtomicI64>) -> Handler<i64> {
        Arc::new(move |points| {
            let total = Arc::clone(&total);
            Box::pin(async move {
                total.fetch_add(points, Ordering::SeqCst);
            })
        })
    }

    #[tokio::test]
    async fn events_from_all_producers_are_handled() {
        let total = Arc::new(AtomicI64::new(0));
        let hook = EventHandler::new(16, summing_handler(Arc::clone(&total)));
        let a = hook.subscribe();
        let b = hook.subscribe();
        for points in [500, 250] {
            assert!(a.publish_event(points));
        }
        assert!(b.publish_event(1_000));
        drop((a, b));
        hook.start_handler().await;
        assert_eq!(total.load(Ordering::SeqCst), 1_750);
    }

    #[tokio::test]
    async fn a_full_hook_drops_events_instead_of_waiting() {
        let total = Arc::new(AtomicI64::new(0));
        let hook = EventHandler::new(2, summing_handler(Arc::clone(&total)));
        let producer = hook.subscribe();
        assert!(producer.publish_event(1));
        assert!(producer.publish_event(2));
        assert!(!producer.publish_event(4));
        drop(producer);
        hook.start_handler().await;
        assert_eq!(total.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn publishing_to_a_stopped_hook_is_harmless() {
        let hook = EventHandler::new(2, summing_handler(Arc::new(AtomicI64::new(0))));
        let producer = hook.subscribe();
        drop(hook);
        assert!(!producer.publish_event(7));
    }
}
