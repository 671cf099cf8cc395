//! Engine events and the hooks that react to them.
mod channel;
mod event_types;
mod hooks;

pub use channel::{EventHandler, EventProducer, Handler};
pub use event_types::{OrderCreditedEvent, OrderRejectedEvent};
pub use hooks::{EventHandlers, EventHooks, EventProducers};
