//! Process configuration: CLI flags for identity/networking, an optional
//! TOML file for tuning knobs, defaults filling whatever neither supplies
//! (§6).

use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use serde::Deserialize;

use replication::strategy::ReplicationStrategyKind;

const DEFAULT_REPLICATION_FACTOR: usize = 3;
const DEFAULT_VIRTUAL_NODES: u32 = 150;
const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 2000;
const DEFAULT_FAILURE_THRESHOLD_MS: u64 = 10_000;
const DEFAULT_PEER_REQUEST_TIMEOUT_MS: u64 = 3000;

/// Tuning knobs loadable from a TOML file. Every field is optional so a
/// partial file only overrides what it names.
#[derive(Debug, Default, Deserialize)]
struct TuningFile {
    replication_factor: Option<usize>,
    virtual_nodes: Option<u32>,
    heartbeat_interval_ms: Option<u64>,
    failure_threshold_ms: Option<u64>,
    peer_request_timeout_ms: Option<u64>,
    strategy: Option<String>,
}

/// A single node's process configuration (§6 table).
#[derive(Parser, Debug)]
#[command(name = "ringkv", about = "Replicated key-value node over a consistent-hash ring")]
pub struct CliConfig {
    /// Cluster-unique short identifier for this node, e.g. "A".
    #[arg(long)]
    pub node_id: String,

    /// Address the peer-to-peer wire listener binds to.
    #[arg(long)]
    pub bind_addr: SocketAddr,

    /// Address the HTTP adapter listens on.
    #[arg(long, default_value = "127.0.0.1:8080")]
    pub http_addr: SocketAddr,

    /// Bootstrap peer addresses to contact on startup, tried in order.
    #[arg(long = "seed", value_name = "ADDR")]
    pub seeds: Vec<SocketAddr>,

    /// Optional TOML file supplying the tuning parameters below.
    #[arg(long)]
    pub config_file: Option<PathBuf>,

    #[arg(long)]
    replication_factor: Option<usize>,
    #[arg(long)]
    virtual_nodes: Option<u32>,
    #[arg(long)]
    heartbeat_interval_ms: Option<u64>,
    #[arg(long)]
    failure_threshold_ms: Option<u64>,
    #[arg(long)]
    peer_request_timeout_ms: Option<u64>,
    #[arg(long)]
    strategy: Option<String>,
}

/// Resolved tuning parameters, after merging CLI flags over a config file
/// over built-in defaults.
#[derive(Debug, Clone, Copy)]
pub struct Tuning {
    pub replication_factor: usize,
    pub virtual_nodes: u32,
    pub heartbeat_interval_ms: u64,
    pub failure_threshold_ms: u64,
    pub peer_request_timeout_ms: u64,
}

impl CliConfig {
    /// Merges the optional TOML file under this config's CLI flags,
    /// CLI flags winning on any field present in both.
    pub fn tuning(&self) -> anyhow::Result<Tuning> {
        let file = match &self.config_file {
            Some(path) => {
                let text = fs::read_to_string(path)?;
                toml::from_str(&text)?
            }
            None => TuningFile::default(),
        };

        Ok(Tuning {
            replication_factor: self
                .replication_factor
                .or(file.replication_factor)
                .unwrap_or(DEFAULT_REPLICATION_FACTOR),
            virtual_nodes: self
                .virtual_nodes
                .or(file.virtual_nodes)
                .unwrap_or(DEFAULT_VIRTUAL_NODES),
            heartbeat_interval_ms: self
                .heartbeat_interval_ms
                .or(file.heartbeat_interval_ms)
                .unwrap_or(DEFAULT_HEARTBEAT_INTERVAL_MS),
            failure_threshold_ms: self
                .failure_threshold_ms
                .or(file.failure_threshold_ms)
                .unwrap_or(DEFAULT_FAILURE_THRESHOLD_MS),
            peer_request_timeout_ms: self
                .peer_request_timeout_ms
                .or(file.peer_request_timeout_ms)
                .unwrap_or(DEFAULT_PEER_REQUEST_TIMEOUT_MS),
        })
    }

    pub fn strategy_kind(&self) -> anyhow::Result<ReplicationStrategyKind> {
        let file_strategy = match &self.config_file {
            Some(path) => {
                let text = fs::read_to_string(path)?;
                toml::from_str::<TuningFile>(&text)?.strategy
            }
            None => None,
        };

        let name = self
            .strategy
            .clone()
            .or(file_strategy)
            .unwrap_or_else(|| "simple".to_string());
        ReplicationStrategyKind::parse(&name)
            .ok_or_else(|| anyhow::anyhow!("unknown replication strategy: {name}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_no_file_and_no_flags() {
        let config = CliConfig {
            node_id: "A".into(),
            bind_addr: "127.0.0.1:9000".parse().unwrap(),
            http_addr: "127.0.0.1:8080".parse().unwrap(),
            seeds: Vec::new(),
            config_file: None,
            replication_factor: None,
            virtual_nodes: None,
            heartbeat_interval_ms: None,
            failure_threshold_ms: None,
            peer_request_timeout_ms: None,
            strategy: None,
        };

        let tuning = config.tuning().unwrap();
        assert_eq!(tuning.replication_factor, 3);
        assert_eq!(tuning.virtual_nodes, 150);
        assert_eq!(tuning.heartbeat_interval_ms, 2000);
        assert_eq!(tuning.failure_threshold_ms, 10_000);
        assert_eq!(tuning.peer_request_timeout_ms, 3000);
    }

    #[test]
    fn cli_flag_overrides_default() {
        let config = CliConfig {
            node_id: "A".into(),
            bind_addr: "127.0.0.1:9000".parse().unwrap(),
            http_addr: "127.0.0.1:8080".parse().unwrap(),
            seeds: Vec::new(),
            config_file: None,
            replication_factor: Some(5),
            virtual_nodes: None,
            heartbeat_interval_ms: None,
            failure_threshold_ms: None,
            peer_request_timeout_ms: None,
            strategy: None,
        };

        assert_eq!(config.tuning().unwrap().replication_factor, 5);
    }
}
