use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{EventHandler, EventProducer, Handler, OrderCreditedEvent, OrderRejectedEvent};

#[derive(Default, Clone)]
pub struct EventProducers {
    pub order_credited_producer: Vec<EventProducer<OrderCreditedEvent>>,
    pub order_rejected_producer: Vec<EventProducer<OrderRejectedEvent>>,
}

impl EventProducers {
    pub fn publish_order_credited(&self, event: OrderCreditedEvent) {
        for producer in &self.order_credited_producer {
            producer.publish_event(event.clone());
        }
    }

    pub fn publish_order_rejected(&self, event: OrderRejectedEvent) {
        for producer in &self.order_rejected_producer {
            producer.publish_event(event.clone());
        }
    }
}

pub struct EventHandlers {
    pub on_order_credited: Option<EventHandler<OrderCreditedEvent>>,
    pub on_order_rejected: Option<EventHandler<OrderRejectedEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_order_credited = hooks.on_order_credited.map(|f| EventHandler::new(buffer_size, f));
        let on_order_rejected = hooks.on_order_rejected.map(|f| EventHandler::new(buffer_size, f));
        Self { on_order_credited, on_order_rejected }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_order_credited {
            result.order_credited_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_order_rejected {
            result.order_rejected_producer.push(handler.subscribe());
        }
        result
    }

    /// Spawns a task for every configured handler. Each task ends once all of its producers have been dropped.
    pub fn start_handlers(self) {
        if let Some(handler) = self.on_order_credited {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_order_rejected {
            tokio::spawn(handler.start_handler());
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_order_credited: Option<Handler<OrderCreditedEvent>>,
    pub on_order_rejected: Option<Handler<OrderRejectedEvent>>,
}

impl EventHooks {
    pub fn on_order_credited<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderCreditedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_order_credited = Some(Arc::new(f));
        self
    }

    pub fn on_order_rejected<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderRejectedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_order_rejected = Some(Arc::new(f));
        self
    }
}
