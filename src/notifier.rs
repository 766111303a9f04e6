//! Re-publication of relation events as a single `ClusterChanged` signal.

use tracing::{debug, trace};

use crate::bus::RelationEvent;
use crate::metrics;

/// Shared cluster state may have changed. Carries no payload: subscribers
/// re-read whatever they care about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusterChanged;

type Handler = Box<dyn FnMut(&ClusterChanged) + Send>;

/// Fans relation events out to local subscribers.
///
/// Every trigger produces exactly one emission, delivered synchronously to
/// each subscriber in registration order.
#[derive(Default)]
pub struct ChangeNotifier {
    handlers: Vec<Handler>,
}

impl std::fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("subscribers", &self.handlers.len())
            .finish()
    }
}

impl ChangeNotifier {
    /// Create a notifier with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for future `ClusterChanged` emissions.
    pub fn subscribe<F>(&mut self, handler: F)
    where
        F: FnMut(&ClusterChanged) + Send + 'static,
    {
        self.handlers.push(Box::new(handler));
        trace!(subscribers = self.handlers.len(), "subscriber registered");
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.handlers.len()
    }

    /// Handle a relation trigger. Both created and changed map to one emission.
    pub fn on_relation_event(&mut self, event: RelationEvent) {
        match event {
            RelationEvent::Created | RelationEvent::Changed => {
                debug!(trigger = event.as_str(), "cluster changed");
                self.emit(event.as_str());
            }
        }
    }

    fn emit(&mut self, trigger: &'static str) {
        let signal = ClusterChanged;
        for handler in &mut self.handlers {
            handler(&signal);
        }
        metrics::record_cluster_changed(trigger, self.handlers.len());
    }
}
