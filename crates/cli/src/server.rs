//! Process bootstrap: wires a `Coordinator` to its peer listener, its
//! heartbeat ticker, and the HTTP adapter, then runs until one of them
//! exits (§6.5 process contract).

use std::sync::Arc;

use corelib::clock::SystemClock;
use corelib::node::NodeId;
use corelib::ring::HashRing;
use corelib::store::LocalStore;
use replication::Coordinator;
use streaming::{FailureDetector, PeerTable};
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::config::CliConfig;
use crate::http;

pub async fn run(config: CliConfig) -> anyhow::Result<()> {
    let tuning = config.tuning()?;
    let strategy = config.strategy_kind()?.build(tuning.replication_factor);

    let local_id = NodeId::new(config.node_id.clone());
    let clock = Arc::new(SystemClock);
    let ring = Arc::new(HashRing::new());
    let store = Arc::new(LocalStore::new());
    let peers = Arc::new(PeerTable::new());
    let failure_detector = Arc::new(FailureDetector::new(
        local_id.clone(),
        clock.clone(),
        ring.clone(),
        peers.clone(),
        std::time::Duration::from_millis(tuning.heartbeat_interval_ms),
        std::time::Duration::from_millis(tuning.failure_threshold_ms),
    ));

    let coordinator = Arc::new(Coordinator::new(
        local_id.clone(),
        config.bind_addr,
        clock,
        ring,
        store,
        peers,
        failure_detector.clone(),
        strategy,
        tuning.virtual_nodes,
    ));

    // Seed the ring with this node's own entry before anyone can reach us.
    coordinator.add_node(local_id.clone(), config.bind_addr).await?;

    if !config.seeds.is_empty() {
        coordinator.join(&config.seeds).await.map_err(|e| {
            error!(error = %e, seeds = ?config.seeds, "no seed accepted the join request");
            e
        })?;
        info!(seeds = ?config.seeds, "joined cluster");
    }

    let listener = TcpListener::bind(config.bind_addr).await?;
    info!(addr = %config.bind_addr, node_id = %local_id, "peer listener bound");

    let accept_coordinator = coordinator.clone();
    let accept_loop = tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, peer_addr)) => {
                    info!(%peer_addr, "accepted peer connection");
                    let coordinator = accept_coordinator.clone();
                    tokio::spawn(async move { coordinator.accept_link(stream).await });
                }
                Err(e) => {
                    error!(error = %e, "peer listener accept failed");
                }
            }
        }
    });

    let tick_interval = std::time::Duration::from_millis(tuning.heartbeat_interval_ms);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tick_interval);
        loop {
            interval.tick().await;
            failure_detector.tick();
        }
    });

    info!(addr = %config.http_addr, "http adapter listening");
    tokio::select! {
        result = http::serve(config.http_addr, coordinator) => result?,
        result = accept_loop => { result?; }
    }

    Ok(())
}
