//! Demultiplexes named push events into the handlers registered for them.

use std::collections::HashMap;

use serde_json::Value;
use shared::{error::PayloadError, protocol::{parse_payload, RawPushEvent}};
use tracing::{trace, warn};

pub type MessageHandler<S> = Box<dyn FnMut(&mut S, &Value) -> anyhow::Result<()> + Send>;

#[derive(Debug)]
pub enum DispatchOutcome {
    /// No handler is registered for the event name.
    Unhandled,
    Delivered { handlers: usize, failures: usize },
    Malformed(PayloadError),
}

/// Handlers receive the owner's state mutably, so dispatch is serial by construction.
pub struct EventBridge<S> {
    handlers: HashMap<String, Vec<MessageHandler<S>>>,
}

impl<S> Default for EventBridge<S> {
    fn default() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }
}

impl<S> EventBridge<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes `handler` to `event_type`. Handlers of one type run in registration order.
    pub fn handle_message<F>(&mut self, event_type: impl Into<String>, handler: F)
    where
        F: FnMut(&mut S, &Value) -> anyhow::Result<()> + Send + 'static,
    {
        self.handlers
            .entry(event_type.into())
            .or_default()
            .push(Box::new(handler));
    }

    pub fn is_subscribed(&self, event_type: &str) -> bool {
        self.handlers
            .get(event_type)
            .is_some_and(|handlers| !handlers.is_empty())
    }

    pub fn dispatch(&mut self, state: &mut S, event: &RawPushEvent) -> DispatchOutcome {
        let Some(handlers) = self.handlers.get_mut(&event.event) else {
            trace!(event = %event.event, "no handler for push event");
            return DispatchOutcome::Unhandled;
        };

        let payload = match parse_payload(&event.event, &event.data) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(event = %event.event, "dropping push event: {err}");
                return DispatchOutcome::Malformed(err);
            }
        };

        let mut failures = 0;
        for (index, handler) in handlers.iter_mut().enumerate() {
            if let Err(err) = handler(state, &payload) {
                failures += 1;
                warn!(event = %event.event, handler = index, "push event handler failed: {err:#}");
            }
        }

        DispatchOutcome::Delivered {
            handlers: handlers.len(),
            failures,
        }
    }
}

#[cfg(test)]
#[path = "tests/bridge_tests.rs"]
mod tests;
