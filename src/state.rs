//! Cluster-wide zone state kept in the shared bus.
//!
//! Two JSON objects live under independent keys:
//! - `zone-records`: zone -> resource records, extended on every update
//! - `zone-remotes`: zone -> remote server addresses, replaced on every update
//!
//! Only the leader may write. Reads require the peer channel to exist.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use crate::bus::{Leadership, SharedStateBus};
use crate::error::ClusterError;
use crate::metrics::{self, UpdateKind};

/// Bus key holding the zone -> records map.
pub const ZONE_RECORDS_KEY: &str = "zone-records";

/// Bus key holding the zone -> remotes map.
pub const ZONE_REMOTES_KEY: &str = "zone-remotes";

/// A DNS resource record as stored in the shared state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRecord {
    /// Owner name.
    pub owner: String,
    /// TTL in seconds.
    pub ttl: u32,
    /// Record type (A, AAAA, CNAME, TXT, ...).
    #[serde(rename = "type")]
    pub rtype: String,
    /// Record data.
    pub rdata: String,
}

impl ResourceRecord {
    /// Create a new resource record.
    pub fn new(owner: &str, ttl: u32, rtype: &str, rdata: &str) -> Self {
        Self {
            owner: owner.to_string(),
            ttl,
            rtype: rtype.to_string(),
            rdata: rdata.to_string(),
        }
    }
}

/// Zone -> ordered resource records.
pub type ZoneRecordSet = BTreeMap<String, Vec<ResourceRecord>>;

/// Zone -> ordered remote server addresses.
pub type ZoneRemoteSet = BTreeMap<String, Vec<String>>;

/// Leader-gated store over the shared bus.
#[derive(Clone)]
pub struct ClusterStateStore {
    bus: Arc<dyn SharedStateBus>,
    leadership: Arc<dyn Leadership>,
}

impl std::fmt::Debug for ClusterStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterStateStore")
            .field("established", &self.is_established())
            .finish()
    }
}

impl ClusterStateStore {
    /// Create a store over the given bus and leadership capability.
    pub fn new(bus: Arc<dyn SharedStateBus>, leadership: Arc<dyn Leadership>) -> Self {
        Self { bus, leadership }
    }

    /// Whether the underlying peer channel exists.
    pub fn is_established(&self) -> bool {
        self.bus.exists()
    }

    /// Add `records` to `zone`, creating the zone if needed.
    ///
    /// An existing non-empty record list is extended; an absent or empty one
    /// is set. Duplicates are kept.
    pub fn update_zone_records(
        &self,
        zone: &str,
        records: Vec<ResourceRecord>,
    ) -> Result<(), ClusterError> {
        let result = self.try_update_zone_records(zone, records);
        metrics::record_update(UpdateKind::Records, result.as_ref().err().map(ClusterError::kind));
        result
    }

    fn try_update_zone_records(
        &self,
        zone: &str,
        records: Vec<ResourceRecord>,
    ) -> Result<(), ClusterError> {
        self.ensure_leader("cannot update zones from a non-leader unit")?;

        // `null` entries decode as empty lists.
        let stored: BTreeMap<String, Option<Vec<ResourceRecord>>> =
            self.load(ZONE_RECORDS_KEY)?;
        let mut zone_records: ZoneRecordSet = stored
            .into_iter()
            .map(|(zone, records)| (zone, records.unwrap_or_default()))
            .collect();

        let added = records.len();
        if zone_records.is_empty() {
            zone_records.insert(zone.to_string(), records);
        } else {
            match zone_records.get_mut(zone) {
                Some(existing) if !existing.is_empty() => existing.extend(records),
                _ => {
                    zone_records.insert(zone.to_string(), records);
                }
            }
        }

        let total = zone_records.get(zone).map_or(0, Vec::len);
        self.store(ZONE_RECORDS_KEY, &zone_records)?;
        debug!(zone, added, total, "updated zone records");
        Ok(())
    }

    /// All zones and their records.
    pub fn zone_records(&self) -> Result<ZoneRecordSet, ClusterError> {
        self.ensure_established("unable to retrieve zone records")?;
        let stored: BTreeMap<String, Option<Vec<ResourceRecord>>> =
            self.load(ZONE_RECORDS_KEY)?;
        Ok(stored
            .into_iter()
            .map(|(zone, records)| (zone, records.unwrap_or_default()))
            .collect())
    }

    /// Replace the remote servers for `zone`.
    ///
    /// `zone` must be present and non-empty and `remotes` must be a JSON
    /// array of strings. An empty array is accepted.
    pub fn update_zone_remotes(&self, zone: Option<&str>, remotes: &Value) -> Result<(), ClusterError> {
        let result = self.try_update_zone_remotes(zone, remotes);
        metrics::record_update(UpdateKind::Remotes, result.as_ref().err().map(ClusterError::kind));
        result
    }

    fn try_update_zone_remotes(&self, zone: Option<&str>, remotes: &Value) -> Result<(), ClusterError> {
        self.ensure_leader("cannot update zone proxies from a non-leader unit")?;

        let zone = match zone {
            Some(zone) if !zone.is_empty() => zone,
            other => {
                return Err(ClusterError::InvalidArgument(format!(
                    "invalid zone parameter specified: {other:?}"
                )))
            }
        };
        let remotes = parse_remotes(remotes)?;

        let mut zone_remotes: ZoneRemoteSet = self.load(ZONE_REMOTES_KEY)?;
        debug!(zone, remotes = remotes.len(), "replacing zone remotes");
        zone_remotes.insert(zone.to_string(), remotes);
        self.store(ZONE_REMOTES_KEY, &zone_remotes)
    }

    /// All zones and their remote servers.
    pub fn zone_remotes(&self) -> Result<ZoneRemoteSet, ClusterError> {
        self.ensure_established("unable to retrieve zone remotes")?;
        self.load(ZONE_REMOTES_KEY)
    }

    fn ensure_leader(&self, message: &str) -> Result<(), ClusterError> {
        if self.leadership.is_leader() {
            Ok(())
        } else {
            Err(ClusterError::Permission(message.to_string()))
        }
    }

    fn ensure_established(&self, message: &str) -> Result<(), ClusterError> {
        if self.is_established() {
            Ok(())
        } else {
            Err(ClusterError::State(format!(
                "{message} - peer relation does not exist"
            )))
        }
    }

    /// Decode the blob under `key`; absent or empty means an empty map.
    fn load<T>(&self, key: &'static str) -> Result<BTreeMap<String, T>, ClusterError>
    where
        T: DeserializeOwned,
    {
        match self.bus.get(key) {
            Some(raw) if !raw.is_empty() => {
                serde_json::from_str(&raw).map_err(|source| ClusterError::Json { key, source })
            }
            _ => Ok(BTreeMap::new()),
        }
    }

    fn store<T: Serialize>(&self, key: &'static str, value: &T) -> Result<(), ClusterError> {
        let encoded =
            serde_json::to_string(value).map_err(|source| ClusterError::Json { key, source })?;
        self.bus.set(key, encoded)
    }
}

/// Accept a JSON array of strings; anything else is an invalid argument.
fn parse_remotes(remotes: &Value) -> Result<Vec<String>, ClusterError> {
    let items = remotes.as_array().ok_or_else(|| {
        ClusterError::InvalidArgument(format!(
            "remote servers must be a list, got: {}",
            json_kind(remotes)
        ))
    })?;

    items
        .iter()
        .map(|item| {
            item.as_str().map(str::to_string).ok_or_else(|| {
                ClusterError::InvalidArgument(format!(
                    "remote server entries must be strings, got: {}",
                    json_kind(item)
                ))
            })
        })
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}
