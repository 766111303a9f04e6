//! Configuration types for knot-cluster.

use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};

/// Prefix of environment overrides, e.g. `KNOT_CLUSTER__CLUSTER__LEADER=true`.
pub const ENV_PREFIX: &str = "KNOT_CLUSTER";

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Cluster membership configuration.
    #[serde(default)]
    pub cluster: ClusterConfig,

    /// Telemetry configuration.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Cluster membership configuration for this unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Unit name (e.g., "knot/0").
    pub unit_name: String,

    /// Name of the peer relation carrying shared state.
    #[serde(default = "default_relation_name")]
    pub relation_name: String,

    /// Whether this unit holds leadership when it starts.
    #[serde(default)]
    pub leader: bool,

    /// Establish the peer relation immediately on start.
    #[serde(default = "default_establish")]
    pub establish_on_start: bool,

    /// Default remote servers applied to the workload outside of any zone.
    ///
    /// Accepts a list or a whitespace-separated string ("1.1.1.1 8.8.8.8").
    #[serde(default, deserialize_with = "deserialize_remote_servers")]
    pub remote_servers: Vec<String>,
}

/// Telemetry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level filter (e.g., "info", "debug", "knot_cluster=debug,warn").
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Prometheus metrics exporter address.
    #[serde(default)]
    pub prometheus_addr: Option<std::net::SocketAddr>,
}

impl Config {
    /// Load from an optional TOML file overlaid with `KNOT_CLUSTER__*`
    /// environment variables.
    pub fn load(path: &Path) -> Result<Self, ::config::ConfigError> {
        Self::load_from(path, None)
    }

    /// `env` replaces the process environment when set.
    fn load_from(
        path: &Path,
        env: Option<::config::Map<String, String>>,
    ) -> Result<Self, ::config::ConfigError> {
        ::config::Config::builder()
            .add_source(::config::File::from(path).required(false))
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true)
                    .source(env),
            )
            .build()?
            .try_deserialize()
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            prometheus_addr: None,
        }
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            unit_name: "knot/0".to_string(),
            relation_name: default_relation_name(),
            leader: false,
            establish_on_start: default_establish(),
            remote_servers: Vec::new(),
        }
    }
}

impl ClusterConfig {
    /// Parse a whitespace-separated remote server list, as accepted by the
    /// `remote-servers` unit option.
    pub fn parse_remote_servers(raw: &str) -> Vec<String> {
        raw.split_whitespace().map(str::to_string).collect()
    }
}

fn deserialize_remote_servers<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RemoteServers {
        Joined(String),
        List(Vec<String>),
    }

    Ok(match RemoteServers::deserialize(deserializer)? {
        RemoteServers::Joined(raw) => ClusterConfig::parse_remote_servers(&raw),
        RemoteServers::List(servers) => servers,
    })
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_relation_name() -> String {
    "knot-cluster".to_string()
}

fn default_establish() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_remote_servers_splits_on_whitespace() {
        let servers = ClusterConfig::parse_remote_servers("1.1.1.1  8.8.8.8\n9.9.9.9");
        assert_eq!(servers, vec!["1.1.1.1", "8.8.8.8", "9.9.9.9"]);
    }

    #[test]
    fn test_parse_remote_servers_empty() {
        assert!(ClusterConfig::parse_remote_servers("   ").is_empty());
    }

    #[test]
    fn test_cluster_config_defaults_from_json() {
        let config: ClusterConfig = serde_json::from_str(r#"{"unit_name":"knot/1"}"#).unwrap();
        assert_eq!(config.unit_name, "knot/1");
        assert_eq!(config.relation_name, "knot-cluster");
        assert!(!config.leader);
        assert!(config.establish_on_start);
        assert!(config.remote_servers.is_empty());
    }

    #[test]
    fn test_remote_servers_accepts_string_or_list() {
        let joined: ClusterConfig =
            serde_json::from_str(r#"{"unit_name":"knot/0","remote_servers":"1.1.1.1 8.8.8.8"}"#)
                .unwrap();
        let listed: ClusterConfig =
            serde_json::from_str(r#"{"unit_name":"knot/0","remote_servers":["1.1.1.1","8.8.8.8"]}"#)
                .unwrap();
        assert_eq!(joined.remote_servers, vec!["1.1.1.1", "8.8.8.8"]);
        assert_eq!(listed.remote_servers, joined.remote_servers);
    }

    #[test]
    fn test_load_remote_servers_from_env() {
        let env = ::config::Map::from([
            (
                "KNOT_CLUSTER__CLUSTER__UNIT_NAME".to_string(),
                "knot/2".to_string(),
            ),
            (
                "KNOT_CLUSTER__CLUSTER__REMOTE_SERVERS".to_string(),
                "1.1.1.1 8.8.8.8".to_string(),
            ),
            ("KNOT_CLUSTER__CLUSTER__LEADER".to_string(), "true".to_string()),
        ]);

        let config = Config::load_from(Path::new("does-not-exist.toml"), Some(env)).unwrap();
        assert_eq!(config.cluster.unit_name, "knot/2");
        assert!(config.cluster.leader);
        assert_eq!(config.cluster.remote_servers, vec!["1.1.1.1", "8.8.8.8"]);
        assert_eq!(config.telemetry.log_level, "info");
    }
}
