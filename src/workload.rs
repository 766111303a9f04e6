//! Workload sink: where reconciled zone configuration is applied.
//!
//! The sink is external. The core pushes full state into it and does not
//! learn whether the workload actually applied it.

use tracing::info;

use crate::error::ClusterError;
use crate::state::ResourceRecord;

/// Applies configuration to the local DNS workload.
pub trait WorkloadSink: Send + Sync {
    /// Apply the unit-wide default remote servers.
    fn apply_config(&self, remote_servers: &[String]) -> Result<(), ClusterError>;

    /// Set the full record list for a zone.
    fn set_zone(&self, zone: &str, records: &[ResourceRecord]) -> Result<(), ClusterError>;

    /// Proxy `zone` to `remote_servers`, registered under `remote_name`.
    fn set_zone_remotes(
        &self,
        zone: &str,
        remote_name: &str,
        remote_servers: &[String],
    ) -> Result<(), ClusterError>;
}

/// Name under which the remotes of `zone` are registered in the workload.
pub fn remote_name(zone: &str) -> String {
    format!("{}_remote", zone.to_lowercase())
}

/// Sink that only logs what would be applied.
#[derive(Debug, Default, Clone)]
pub struct TracingSink;

impl WorkloadSink for TracingSink {
    fn apply_config(&self, remote_servers: &[String]) -> Result<(), ClusterError> {
        info!(remote_servers = ?remote_servers, "apply config");
        Ok(())
    }

    fn set_zone(&self, zone: &str, records: &[ResourceRecord]) -> Result<(), ClusterError> {
        info!(zone, records = records.len(), "set zone");
        for rr in records {
            info!(
                zone,
                owner = %rr.owner,
                ttl = rr.ttl,
                rtype = %rr.rtype,
                rdata = %rr.rdata,
                "zone record"
            );
        }
        Ok(())
    }

    fn set_zone_remotes(
        &self,
        zone: &str,
        remote_name: &str,
        remote_servers: &[String],
    ) -> Result<(), ClusterError> {
        info!(zone, remote_name, remote_servers = ?remote_servers, "set zone remotes");
        Ok(())
    }
}
