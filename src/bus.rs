//! Shared state bus between cluster members.
//!
//! The platform provides a per-application key-value channel ("peer
//! relation") that every member can read and only the leader can write.
//! The core talks to it through [`SharedStateBus`] and asks about leadership
//! through [`Leadership`]; both are injected so tests and the demo binary can
//! run against the in-memory [`PeerRelation`].

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, trace};

use crate::error::ClusterError;

/// Notification delivered by the platform to every member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationEvent {
    /// The peer channel was created.
    Created,
    /// A value within the peer channel changed.
    Changed,
}

impl RelationEvent {
    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationEvent::Created => "created",
            RelationEvent::Changed => "changed",
        }
    }
}

/// Application-scoped key-value channel shared by all members.
pub trait SharedStateBus: Send + Sync {
    /// Current raw value stored under `key`.
    fn get(&self, key: &str) -> Option<String>;

    /// Write `value` under `key`. Only the leader's writes are accepted by the
    /// platform.
    fn set(&self, key: &str, value: String) -> Result<(), ClusterError>;

    /// Whether the channel itself has been established.
    fn exists(&self) -> bool;
}

/// Trusted leadership signal from the platform.
pub trait Leadership: Send + Sync {
    /// Whether the local member currently holds leadership.
    fn is_leader(&self) -> bool;
}

/// In-memory model of the platform's peer relation.
///
/// Cloning yields another handle to the same relation.
#[derive(Debug, Clone)]
pub struct PeerRelation {
    inner: Arc<RwLock<RelationInner>>,
}

#[derive(Debug)]
struct RelationInner {
    name: String,
    established: bool,
    /// Application data bag.
    data: HashMap<String, String>,
    leader: Option<String>,
    members: Vec<Member>,
}

#[derive(Debug)]
struct Member {
    unit: String,
    events: UnboundedSender<RelationEvent>,
}

impl RelationInner {
    fn broadcast(&mut self, event: RelationEvent) {
        // Members whose receiver is gone have departed.
        self.members.retain(|m| m.events.send(event).is_ok());
        trace!(event = event.as_str(), members = self.members.len(), "broadcast relation event");
    }
}

impl PeerRelation {
    /// Create a relation that has not been established yet.
    pub fn new(name: &str) -> Self {
        Self {
            inner: Arc::new(RwLock::new(RelationInner {
                name: name.to_string(),
                established: false,
                data: HashMap::new(),
                leader: None,
                members: Vec::new(),
            })),
        }
    }

    /// Relation name.
    pub fn name(&self) -> String {
        self.inner.read().name.clone()
    }

    /// Add a member. Returns its bus handle and the receiver of the relation
    /// events the platform will deliver to it.
    pub fn join(&self, unit: &str) -> (MemberBus, UnboundedReceiver<RelationEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.write();
        inner.members.push(Member {
            unit: unit.to_string(),
            events: tx,
        });
        debug!(unit, relation = %inner.name, "member joined");
        (
            MemberBus {
                unit: unit.to_string(),
                relation: self.clone(),
            },
            rx,
        )
    }

    /// Create the channel and notify every member. Idempotent.
    pub fn establish(&self) {
        let mut inner = self.inner.write();
        if inner.established {
            return;
        }
        inner.established = true;
        info!(relation = %inner.name, "peer relation established");
        inner.broadcast(RelationEvent::Created);
    }

    /// Hand leadership to `unit`.
    pub fn elect(&self, unit: &str) {
        let mut inner = self.inner.write();
        info!(unit, "leader elected");
        inner.leader = Some(unit.to_string());
    }

    /// Current leader, if any.
    pub fn leader(&self) -> Option<String> {
        self.inner.read().leader.clone()
    }

    /// Names of the current members.
    pub fn members(&self) -> Vec<String> {
        self.inner.read().members.iter().map(|m| m.unit.clone()).collect()
    }
}

/// A member's view of the [`PeerRelation`].
#[derive(Debug, Clone)]
pub struct MemberBus {
    unit: String,
    relation: PeerRelation,
}

impl MemberBus {
    /// Name of the member this handle belongs to.
    pub fn unit(&self) -> &str {
        &self.unit
    }
}

impl SharedStateBus for MemberBus {
    fn get(&self, key: &str) -> Option<String> {
        let inner = self.relation.inner.read();
        if !inner.established {
            return None;
        }
        inner.data.get(key).cloned()
    }

    fn set(&self, key: &str, value: String) -> Result<(), ClusterError> {
        let mut inner = self.relation.inner.write();
        if !inner.established {
            return Err(ClusterError::State(format!(
                "peer relation {} does not exist",
                inner.name
            )));
        }
        if inner.leader.as_deref() != Some(self.unit.as_str()) {
            return Err(ClusterError::Permission(format!(
                "{} cannot write application data as a non-leader unit",
                self.unit
            )));
        }
        debug!(unit = %self.unit, key, bytes = value.len(), "writing application data");
        inner.data.insert(key.to_string(), value);
        inner.broadcast(RelationEvent::Changed);
        Ok(())
    }

    fn exists(&self) -> bool {
        self.relation.inner.read().established
    }
}

impl Leadership for MemberBus {
    fn is_leader(&self) -> bool {
        self.relation.leader().as_deref() == Some(self.unit.as_str())
    }
}
