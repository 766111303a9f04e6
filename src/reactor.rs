//! Single-threaded event loop for one cluster member.
//!
//! Relation events from the platform and local events (workload lifecycle,
//! config changes, actions) are dispatched one at a time, each to completion
//! before the next.

use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::actions::{ActionError, ActionHandler, ActionRequest};
use crate::bus::RelationEvent;
use crate::metrics;
use crate::notifier::ChangeNotifier;
use crate::orchestrator::Orchestrator;

/// Local events delivered to the reactor.
#[derive(Debug)]
pub enum Event {
    /// The workload container is up.
    WorkloadReady,
    /// The unit's default remote servers changed.
    ConfigChanged(Vec<String>),
    /// An operator action.
    Action {
        /// The request to run.
        request: ActionRequest,
        /// Where to send the outcome, if anyone is waiting.
        reply: Option<oneshot::Sender<Result<(), ActionError>>>,
    },
}

impl Event {
    fn as_str(&self) -> &'static str {
        match self {
            Event::WorkloadReady => "workload_ready",
            Event::ConfigChanged(_) => "config_changed",
            Event::Action { .. } => "action",
        }
    }
}

/// Event loop wiring the notifier, orchestrator and action handler together.
pub struct Reactor {
    notifier: ChangeNotifier,
    orchestrator: Arc<Orchestrator>,
    actions: ActionHandler,
}

impl Reactor {
    /// Create a reactor. The orchestrator is subscribed to cluster changes.
    pub fn new(orchestrator: Arc<Orchestrator>, actions: ActionHandler) -> Self {
        let mut notifier = ChangeNotifier::new();
        let subscriber = orchestrator.clone();
        notifier.subscribe(move |_| {
            if let Err(e) = subscriber.on_cluster_changed() {
                error!("Failed to reconcile cluster state: {}", e);
            }
        });

        Self {
            notifier,
            orchestrator,
            actions,
        }
    }

    /// The notifier, for registering additional subscribers.
    pub fn notifier_mut(&mut self) -> &mut ChangeNotifier {
        &mut self.notifier
    }

    /// Dispatch one relation event.
    pub fn dispatch_relation(&mut self, event: RelationEvent) {
        metrics::record_event(event.as_str());
        self.notifier.on_relation_event(event);
    }

    /// Dispatch one local event.
    pub fn dispatch(&mut self, event: Event) {
        metrics::record_event(event.as_str());
        match event {
            Event::WorkloadReady => {
                if let Err(e) = self.orchestrator.on_workload_ready() {
                    error!("Failed to apply config on workload start: {}", e);
                }
            }
            Event::ConfigChanged(remote_servers) => {
                if let Err(e) = self.orchestrator.on_config_changed(remote_servers) {
                    error!("Failed to apply config change: {}", e);
                }
            }
            Event::Action { request, reply } => {
                let result = self.actions.handle(request);
                if let Some(reply) = reply {
                    // Requester may have gone away.
                    let _ = reply.send(result);
                }
            }
        }
    }

    /// Apply every relation event already queued.
    pub fn drain_relation(&mut self, relation_rx: &mut UnboundedReceiver<RelationEvent>) -> usize {
        let mut drained = 0;
        while let Ok(event) = relation_rx.try_recv() {
            self.dispatch_relation(event);
            drained += 1;
        }
        drained
    }

    /// Run until shutdown is requested or the local event queue closes.
    ///
    /// Relation events already queued when the local queue closes are still
    /// dispatched.
    pub async fn run(
        mut self,
        mut relation_rx: UnboundedReceiver<RelationEvent>,
        mut events_rx: UnboundedReceiver<Event>,
        shutdown: CancellationToken,
    ) {
        info!("reactor started");

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("reactor received shutdown signal");
                    break;
                }

                Some(event) = relation_rx.recv() => {
                    self.dispatch_relation(event);
                }

                event = events_rx.recv() => {
                    match event {
                        Some(event) => self.dispatch(event),
                        None => {
                            let drained = self.drain_relation(&mut relation_rx);
                            debug!(drained, "event queue closed");
                            break;
                        }
                    }
                }
            }
        }

        info!("reactor stopped");
    }
}
