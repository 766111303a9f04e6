//! Reconciles the local workload with cluster state.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::error::ClusterError;
use crate::metrics::{self, UpdateKind};
use crate::state::ClusterStateStore;
use crate::workload::{remote_name, WorkloadSink};

/// Result of handling a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconcile {
    /// The workload is not ready yet; nothing was pushed.
    Skipped,
    /// The unit's default remote servers were pushed; no zone was touched.
    ConfigApplied,
    /// Configuration was pushed for this many zones.
    Applied {
        /// Zones whose records were pushed.
        record_zones: usize,
        /// Zones whose remotes were pushed.
        remote_zones: usize,
    },
}

/// Pushes the full cluster state to the workload on every change.
pub struct Orchestrator {
    store: ClusterStateStore,
    sink: Arc<dyn WorkloadSink>,
    workload_ready: AtomicBool,
    remote_servers: RwLock<Vec<String>>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("workload_ready", &self.is_workload_ready())
            .field("remote_servers", &*self.remote_servers.read())
            .finish()
    }
}

impl Orchestrator {
    /// Create an orchestrator. `remote_servers` are the unit's default
    /// remote servers, applied once the workload is ready.
    pub fn new(
        store: ClusterStateStore,
        sink: Arc<dyn WorkloadSink>,
        remote_servers: Vec<String>,
    ) -> Self {
        Self {
            store,
            sink,
            workload_ready: AtomicBool::new(false),
            remote_servers: RwLock::new(remote_servers),
        }
    }

    /// The store this orchestrator reads from.
    pub fn store(&self) -> &ClusterStateStore {
        &self.store
    }

    /// Whether the workload has been started.
    pub fn is_workload_ready(&self) -> bool {
        self.workload_ready.load(Ordering::SeqCst)
    }

    /// The workload came up: mark it ready and apply the default config.
    pub fn on_workload_ready(&self) -> Result<(), ClusterError> {
        self.workload_ready.store(true, Ordering::SeqCst);
        info!("workload ready");
        self.apply_config()
    }

    /// The unit's default remote servers changed.
    pub fn on_config_changed(&self, remote_servers: Vec<String>) -> Result<Reconcile, ClusterError> {
        *self.remote_servers.write() = remote_servers;
        if !self.is_workload_ready() {
            debug!("config changed before workload ready, deferring");
            return Ok(Reconcile::Skipped);
        }
        self.apply_config()?;
        Ok(Reconcile::ConfigApplied)
    }

    /// Shared state may have moved: re-read both maps and push every zone.
    pub fn on_cluster_changed(&self) -> Result<Reconcile, ClusterError> {
        if !self.is_workload_ready() {
            debug!("cluster changed before workload ready, skipping");
            return Ok(Reconcile::Skipped);
        }

        let zone_records = self.store.zone_records()?;
        for (zone, records) in &zone_records {
            let result = self.sink.set_zone(zone, records);
            metrics::record_workload_push(UpdateKind::Records, result.is_ok());
            result?;
        }

        let zone_remotes = self.store.zone_remotes()?;
        for (zone, remotes) in &zone_remotes {
            self.push_zone_remotes(zone, remotes)?;
        }

        metrics::record_state_counts(zone_records.len(), zone_remotes.len());
        debug!(
            record_zones = zone_records.len(),
            remote_zones = zone_remotes.len(),
            "reconciled workload with cluster state"
        );
        Ok(Reconcile::Applied {
            record_zones: zone_records.len(),
            remote_zones: zone_remotes.len(),
        })
    }

    /// Push one zone's remote servers to the workload.
    pub fn push_zone_remotes(&self, zone: &str, remotes: &[String]) -> Result<(), ClusterError> {
        let result = self.sink.set_zone_remotes(zone, &remote_name(zone), remotes);
        metrics::record_workload_push(UpdateKind::Remotes, result.is_ok());
        if let Err(e) = &result {
            error!(zone, "failed to set zone remotes: {}", e);
        }
        result
    }

    fn apply_config(&self) -> Result<(), ClusterError> {
        let remote_servers = self.remote_servers.read().clone();
        self.sink.apply_config(&remote_servers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::PeerRelation;
    use crate::state::ResourceRecord;
    use crate::workload::TracingSink;
    use serde_json::json;

    fn orchestrator() -> (PeerRelation, Orchestrator) {
        let relation = PeerRelation::new("knot-cluster");
        let (bus, _rx) = relation.join("knot/0");
        relation.elect("knot/0");
        relation.establish();
        let bus = Arc::new(bus);
        let store = ClusterStateStore::new(bus.clone(), bus);
        let orchestrator = Orchestrator::new(store, Arc::new(TracingSink), vec![]);
        (relation, orchestrator)
    }

    #[test]
    fn test_skips_until_workload_ready() {
        let (_relation, orchestrator) = orchestrator();
        assert_eq!(orchestrator.on_cluster_changed().unwrap(), Reconcile::Skipped);
        assert_eq!(
            orchestrator.on_config_changed(vec!["1.1.1.1".into()]).unwrap(),
            Reconcile::Skipped
        );
    }

    #[test]
    fn test_config_change_after_ready_is_applied() {
        let (_relation, orchestrator) = orchestrator();
        orchestrator.on_workload_ready().unwrap();

        assert_eq!(
            orchestrator.on_config_changed(vec!["1.1.1.1".into()]).unwrap(),
            Reconcile::ConfigApplied
        );
    }

    #[test]
    fn test_counts_zones_after_ready() {
        let (_relation, orchestrator) = orchestrator();
        let store = orchestrator.store().clone();
        store
            .update_zone_records("a.test", vec![ResourceRecord::new("a.test", 60, "A", "10.0.0.1")])
            .unwrap();
        store.update_zone_records("b.test", vec![]).unwrap();
        store.update_zone_remotes(Some("a.test"), &json!(["10.1.1.1"])).unwrap();

        orchestrator.on_workload_ready().unwrap();

        assert_eq!(
            orchestrator.on_cluster_changed().unwrap(),
            Reconcile::Applied {
                record_zones: 2,
                remote_zones: 1
            }
        );
    }
}
