//! Operator actions that mutate cluster state.
//!
//! Every action checks leadership itself before calling into the store, so
//! a non-leader gets a clear action failure rather than a store error.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::bus::Leadership;
use crate::error::ClusterError;
use crate::metrics;
use crate::orchestrator::Orchestrator;
use crate::state::ResourceRecord;

/// An action request, tagged by its `action` name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum ActionRequest {
    /// Create a zone without records.
    AddZone {
        /// Zone to add.
        zone: String,
    },
    /// Add one resource record to a zone.
    SetZone {
        /// Zone to modify.
        zone: String,
        /// Owner name.
        owner: String,
        /// TTL in seconds.
        ttl: u32,
        /// Record type.
        #[serde(rename = "type")]
        rtype: String,
        /// Record data.
        rdata: String,
    },
    /// Replace the remote servers a zone is proxied to.
    SetZoneRemotes {
        /// Zone to proxy.
        #[serde(default)]
        zone: Option<String>,
        /// List of remote server addresses.
        #[serde(rename = "remote-servers", default)]
        remote_servers: Value,
    },
}

impl ActionRequest {
    /// Action name as exposed to operators.
    pub fn name(&self) -> &'static str {
        match self {
            ActionRequest::AddZone { .. } => "add-zone",
            ActionRequest::SetZone { .. } => "set-zone",
            ActionRequest::SetZoneRemotes { .. } => "set-zone-remotes",
        }
    }
}

/// Why an action failed.
#[derive(Debug, Error)]
pub enum ActionError {
    /// The local unit is not the leader.
    #[error("Cannot run this action on a non-leader unit.")]
    NotLeader,

    /// The peer relation has not been created yet.
    #[error("Cannot run this action before the cluster relation is created.")]
    NotEstablished,

    /// The store rejected the update.
    #[error(transparent)]
    Cluster(#[from] ClusterError),
}

/// Runs action requests against the cluster state.
#[derive(Clone)]
pub struct ActionHandler {
    leadership: Arc<dyn Leadership>,
    orchestrator: Arc<Orchestrator>,
}

impl ActionHandler {
    /// Create a handler.
    pub fn new(leadership: Arc<dyn Leadership>, orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            leadership,
            orchestrator,
        }
    }

    /// Run one action to completion.
    pub fn handle(&self, request: ActionRequest) -> Result<(), ActionError> {
        let action = request.name();
        let result = self.dispatch(request);
        metrics::record_action(action, result.is_ok());
        match &result {
            Ok(()) => info!(action, "action completed"),
            Err(ActionError::NotLeader) => {
                warn!("Did not execute {} as this is not a leader unit.", action)
            }
            Err(ActionError::NotEstablished) => {
                warn!(
                    "Did not execute {} as the peer relation has not been created yet.",
                    action
                )
            }
            Err(e) => warn!(action, "action failed: {}", e),
        }
        result
    }

    fn dispatch(&self, request: ActionRequest) -> Result<(), ActionError> {
        if !self.leadership.is_leader() {
            return Err(ActionError::NotLeader);
        }
        let store = self.orchestrator.store();

        match request {
            ActionRequest::AddZone { zone } => {
                store.update_zone_records(&zone, Vec::new())?;
            }
            ActionRequest::SetZone {
                zone,
                owner,
                ttl,
                rtype,
                rdata,
            } => {
                let rr = ResourceRecord {
                    owner,
                    ttl,
                    rtype,
                    rdata,
                };
                store.update_zone_records(&zone, vec![rr])?;
            }
            ActionRequest::SetZoneRemotes {
                zone,
                remote_servers,
            } => {
                if !store.is_established() {
                    return Err(ActionError::NotEstablished);
                }
                store.update_zone_remotes(zone.as_deref(), &remote_servers)?;

                // The leader applies its own remotes right away; peers pick
                // them up on the next cluster change.
                if let Some(zone) = zone.as_deref() {
                    let remotes = store.zone_remotes()?.remove(zone).unwrap_or_default();
                    self.orchestrator.push_zone_remotes(zone, &remotes)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_add_zone() {
        let req: ActionRequest =
            serde_json::from_value(json!({"action": "add-zone", "zone": "example.com"})).unwrap();
        assert_eq!(
            req,
            ActionRequest::AddZone {
                zone: "example.com".into()
            }
        );
        assert_eq!(req.name(), "add-zone");
    }

    #[test]
    fn test_parse_set_zone() {
        let req: ActionRequest = serde_json::from_value(json!({
            "action": "set-zone",
            "zone": "example.com",
            "owner": "www.example.com",
            "ttl": 300,
            "type": "CNAME",
            "rdata": "example.com."
        }))
        .unwrap();
        match req {
            ActionRequest::SetZone { ttl, rtype, .. } => {
                assert_eq!(ttl, 300);
                assert_eq!(rtype, "CNAME");
            }
            other => panic!("unexpected request: {other:?}"),
        }
    }

    #[test]
    fn test_parse_set_zone_remotes_keeps_raw_value() {
        let req: ActionRequest = serde_json::from_value(json!({
            "action": "set-zone-remotes",
            "zone": "example.com",
            "remote-servers": "10.0.0.1"
        }))
        .unwrap();
        assert_eq!(
            req,
            ActionRequest::SetZoneRemotes {
                zone: Some("example.com".into()),
                remote_servers: json!("10.0.0.1"),
            }
        );
    }

    #[test]
    fn test_parse_set_zone_remotes_missing_fields() {
        let req: ActionRequest =
            serde_json::from_value(json!({"action": "set-zone-remotes"})).unwrap();
        assert_eq!(
            req,
            ActionRequest::SetZoneRemotes {
                zone: None,
                remote_servers: Value::Null,
            }
        );
    }

    #[test]
    fn test_parse_unknown_action_fails() {
        let res: Result<ActionRequest, _> =
            serde_json::from_value(json!({"action": "drop-zone", "zone": "example.com"}));
        assert!(res.is_err());
    }

    #[test]
    fn test_action_error_messages() {
        assert_eq!(
            ActionError::NotLeader.to_string(),
            "Cannot run this action on a non-leader unit."
        );
        assert_eq!(
            ActionError::NotEstablished.to_string(),
            "Cannot run this action before the cluster relation is created."
        );
    }
}
