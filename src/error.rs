//! Error types for knot-cluster.

use thiserror::Error;

/// Errors that can occur while coordinating cluster state.
#[derive(Debug, Error)]
pub enum ClusterError {
    /// Mutation attempted by a member that is not the leader.
    #[error("permission denied: {0}")]
    Permission(String),

    /// The shared peer channel has not been established yet.
    #[error("invalid state: {0}")]
    State(String),

    /// Malformed caller input.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A stored blob could not be decoded or a value could not be encoded.
    #[error("JSON error under `{key}`: {source}")]
    Json {
        /// Bus key holding the offending blob.
        key: &'static str,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// The workload sink refused or failed to apply configuration.
    #[error("workload error: {0}")]
    Workload(String),
}

impl ClusterError {
    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ClusterError::Permission(_) => "permission",
            ClusterError::State(_) => "state",
            ClusterError::InvalidArgument(_) => "invalid_argument",
            ClusterError::Json { .. } => "json",
            ClusterError::Workload(_) => "workload",
        }
    }
}
