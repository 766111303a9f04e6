//! Shared test infrastructure for cluster integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedReceiver;

use knot_cluster::bus::{MemberBus, PeerRelation, RelationEvent};
use knot_cluster::error::ClusterError;
use knot_cluster::state::{ClusterStateStore, ResourceRecord};
use knot_cluster::workload::WorkloadSink;
use knot_cluster::{ActionHandler, Orchestrator, Reactor};

// --- Constants ---

pub const RELATION: &str = "knot-cluster";
pub const ZONE: &str = "example.com";

// --- RecordingSink ---

/// One call made into the workload sink.
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    Config(Vec<String>),
    Zone(String, Vec<ResourceRecord>),
    Remotes(String, String, Vec<String>),
}

/// Captures every workload push for inspection in tests.
#[derive(Default)]
pub struct RecordingSink {
    applied: Mutex<Vec<Applied>>,
    fail: Mutex<bool>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Everything applied so far.
    pub fn applied(&self) -> Vec<Applied> {
        self.applied.lock().clone()
    }

    /// Forget what has been applied.
    pub fn clear(&self) {
        self.applied.lock().clear();
    }

    /// Make every subsequent call fail.
    pub fn fail_from_now(&self) {
        *self.fail.lock() = true;
    }

    fn push(&self, applied: Applied) -> Result<(), ClusterError> {
        if *self.fail.lock() {
            return Err(ClusterError::Workload("knotc conf-commit failed".into()));
        }
        self.applied.lock().push(applied);
        Ok(())
    }
}

impl WorkloadSink for RecordingSink {
    fn apply_config(&self, remote_servers: &[String]) -> Result<(), ClusterError> {
        self.push(Applied::Config(remote_servers.to_vec()))
    }

    fn set_zone(&self, zone: &str, records: &[ResourceRecord]) -> Result<(), ClusterError> {
        self.push(Applied::Zone(zone.to_string(), records.to_vec()))
    }

    fn set_zone_remotes(
        &self,
        zone: &str,
        remote_name: &str,
        remote_servers: &[String],
    ) -> Result<(), ClusterError> {
        self.push(Applied::Remotes(
            zone.to_string(),
            remote_name.to_string(),
            remote_servers.to_vec(),
        ))
    }
}

// --- Members ---

/// A cluster member with its reactor and relation event queue.
pub struct TestMember {
    pub bus: Arc<MemberBus>,
    pub store: ClusterStateStore,
    pub sink: Arc<RecordingSink>,
    pub orchestrator: Arc<Orchestrator>,
    pub reactor: Reactor,
    pub events: UnboundedReceiver<RelationEvent>,
}

impl TestMember {
    /// Dispatch every queued relation event. Returns how many were handled.
    pub fn pump(&mut self) -> usize {
        self.reactor.drain_relation(&mut self.events)
    }
}

/// Join `unit` to `relation` and wire up a full member around it.
pub fn join(relation: &PeerRelation, unit: &str) -> TestMember {
    let (bus, events) = relation.join(unit);
    let bus = Arc::new(bus);
    let store = ClusterStateStore::new(bus.clone(), bus.clone());
    let sink = RecordingSink::new();
    let orchestrator = Arc::new(Orchestrator::new(store.clone(), sink.clone(), vec![]));
    let actions = ActionHandler::new(bus.clone(), orchestrator.clone());
    let reactor = Reactor::new(orchestrator.clone(), actions);
    TestMember {
        bus,
        store,
        sink,
        orchestrator,
        reactor,
        events,
    }
}

/// An established relation with a leader (`knot/0`) and one follower
/// (`knot/1`), both with ready workloads and empty sinks.
pub fn leader_and_follower() -> (PeerRelation, TestMember, TestMember) {
    let relation = PeerRelation::new(RELATION);
    let mut leader = join(&relation, "knot/0");
    let mut follower = join(&relation, "knot/1");
    relation.elect("knot/0");
    leader.orchestrator.on_workload_ready().unwrap();
    follower.orchestrator.on_workload_ready().unwrap();
    relation.establish();
    leader.pump();
    follower.pump();
    leader.sink.clear();
    follower.sink.clear();
    (relation, leader, follower)
}

// --- Record helpers ---

pub fn a_record(rdata: &str) -> ResourceRecord {
    ResourceRecord::new(ZONE, 3600, "A", rdata)
}
