//! Knot Cluster - shared zone state for a clustered Knot DNS service.
//!
//! Members of the cluster ("units") share zone configuration through a
//! platform-provided peer relation. Exactly one member, the leader, may write
//! to it. Every write is announced to all members, which then re-read the
//! whole state and push it to their local DNS workload.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                         knot-cluster                          │
//! │                                                               │
//! │  actions ──▶ ClusterStateStore ──set──▶ SharedStateBus        │
//! │  (leader)      ▲        │                    │                │
//! │                │ get    │           created / changed         │
//! │                │        │                    ▼                │
//! │           Orchestrator ◀── ClusterChanged ── ChangeNotifier   │
//! │                │                                              │
//! │                ▼                                              │
//! │          WorkloadSink (knotd)                                 │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Shared state
//!
//! - `zone-records`: `{zone: [{owner, ttl, type, rdata}, ...]}`, extended on
//!   every update
//! - `zone-remotes`: `{zone: [address, ...]}`, replaced on every update
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use knot_cluster::{ClusterStateStore, PeerRelation, ResourceRecord};
//! use std::sync::Arc;
//!
//! let relation = PeerRelation::new("knot-cluster");
//! let (bus, _events) = relation.join("knot/0");
//! relation.elect("knot/0");
//! relation.establish();
//!
//! let bus = Arc::new(bus);
//! let store = ClusterStateStore::new(bus.clone(), bus);
//! store.update_zone_records(
//!     "example.com",
//!     vec![ResourceRecord::new("example.com", 3600, "A", "1.2.3.4")],
//! )?;
//! ```

#![warn(missing_docs)]

pub mod actions;
pub mod bus;
pub mod config;
pub mod error;
pub mod metrics;
pub mod notifier;
pub mod orchestrator;
pub mod reactor;
pub mod state;
pub mod telemetry;
pub mod workload;

// Re-export main types
pub use actions::{ActionError, ActionHandler, ActionRequest};
pub use bus::{Leadership, MemberBus, PeerRelation, RelationEvent, SharedStateBus};
pub use config::{ClusterConfig, Config, TelemetryConfig};
pub use error::ClusterError;
pub use notifier::{ChangeNotifier, ClusterChanged};
pub use orchestrator::{Orchestrator, Reconcile};
pub use reactor::{Event, Reactor};
pub use state::{ClusterStateStore, ResourceRecord, ZoneRecordSet, ZoneRemoteSet};
pub use workload::{TracingSink, WorkloadSink};
