//! Metrics instrumentation for knot-cluster.
//!
//! All metrics are prefixed with `knot_cluster.`

use metrics::{counter, gauge};

/// Kind of shared-state update.
#[derive(Debug, Clone, Copy)]
pub enum UpdateKind {
    /// Zone resource records (merge).
    Records,
    /// Zone remote servers (replace).
    Remotes,
}

impl UpdateKind {
    fn as_str(self) -> &'static str {
        match self {
            UpdateKind::Records => "records",
            UpdateKind::Remotes => "remotes",
        }
    }
}

/// Record an attempted update of shared state. `error` is the error kind
/// label, or `None` on success.
pub fn record_update(kind: UpdateKind, error: Option<&'static str>) {
    counter!(
        "knot_cluster.store.update.count",
        "kind" => kind.as_str(),
        "result" => error.unwrap_or("success")
    )
    .increment(1);
}

/// Record a `ClusterChanged` emission and how many subscribers saw it.
pub fn record_cluster_changed(trigger: &'static str, subscribers: usize) {
    counter!("knot_cluster.notifier.emit.count", "trigger" => trigger).increment(1);
    gauge!("knot_cluster.notifier.subscribers").set(subscribers as f64);
}

/// Record a push of zone configuration to the workload.
pub fn record_workload_push(kind: UpdateKind, ok: bool) {
    counter!(
        "knot_cluster.workload.push.count",
        "kind" => kind.as_str(),
        "result" => if ok { "success" } else { "error" }
    )
    .increment(1);
}

/// Record the size of the state observed during a reconcile.
pub fn record_state_counts(record_zones: usize, remote_zones: usize) {
    gauge!("knot_cluster.state.record_zones.count").set(record_zones as f64);
    gauge!("knot_cluster.state.remote_zones.count").set(remote_zones as f64);
}

/// Record the outcome of an action request.
pub fn record_action(action: &'static str, ok: bool) {
    counter!(
        "knot_cluster.action.count",
        "action" => action,
        "result" => if ok { "success" } else { "failed" }
    )
    .increment(1);
}

/// Record a reactor event dispatch.
pub fn record_event(event: &'static str) {
    counter!("knot_cluster.reactor.event.count", "event" => event).increment(1);
}
