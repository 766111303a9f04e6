//! knot-cluster binary entry point.
//!
//! Runs a single cluster member against an in-memory peer relation. Action
//! requests are read from stdin as JSON lines and their outcome is written to
//! stdout; workload applies are logged.

use clap::Parser;
use knot_cluster::{
    telemetry, ActionHandler, ActionRequest, ClusterStateStore, Config, Event, Orchestrator,
    PeerRelation, Reactor, TracingSink,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Leader-gated shared zone state for a clustered Knot DNS service.
#[derive(Parser, Debug)]
#[command(name = "knot-cluster")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (TOML).
    #[arg(short, long, default_value = "knot-cluster.toml")]
    config: PathBuf,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Load configuration
    let config = Config::load(&args.config)?;

    telemetry::init(&config.telemetry).map_err(|e| e as Box<dyn std::error::Error>)?;

    let cluster = config.cluster;
    info!(config_file = %args.config.display(), "Starting knot-cluster");

    let relation = PeerRelation::new(&cluster.relation_name);
    let (bus, relation_rx) = relation.join(&cluster.unit_name);
    if cluster.leader {
        relation.elect(&cluster.unit_name);
    }
    if cluster.establish_on_start {
        relation.establish();
    }
    info!(
        unit = bus.unit(),
        relation = %relation.name(),
        leader = ?relation.leader(),
        "Joined peer relation"
    );

    let bus = Arc::new(bus);
    let store = ClusterStateStore::new(bus.clone(), bus.clone());
    let orchestrator = Arc::new(Orchestrator::new(
        store,
        Arc::new(TracingSink),
        cluster.remote_servers.clone(),
    ));
    let actions = ActionHandler::new(bus, orchestrator.clone());
    let reactor = Reactor::new(orchestrator, actions);

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    events_tx.send(Event::WorkloadReady)?;

    // Setup graceful shutdown
    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown signal received");
            }
            shutdown.cancel();
        }
    });

    tokio::spawn(read_actions(events_tx));

    reactor.run(relation_rx, events_rx, shutdown).await;

    info!("knot-cluster shutdown complete");
    Ok(())
}

/// Forward JSON action requests from stdin to the reactor and print results.
async fn read_actions(events_tx: mpsc::UnboundedSender<Event>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Ok(Some(line)) = lines.next_line().await {
        if line.trim().is_empty() {
            continue;
        }

        let outcome = match serde_json::from_str::<ActionRequest>(&line) {
            Ok(request) => {
                let action = request.name();
                let (reply_tx, reply_rx) = oneshot::channel();
                let event = Event::Action {
                    request,
                    reply: Some(reply_tx),
                };
                if events_tx.send(event).is_err() {
                    break;
                }
                match reply_rx.await {
                    Ok(Ok(())) => serde_json::json!({"action": action, "status": "completed"}),
                    Ok(Err(e)) => serde_json::json!({
                        "action": action,
                        "status": "failed",
                        "message": e.to_string(),
                    }),
                    Err(_) => break,
                }
            }
            Err(e) => {
                warn!("Ignoring malformed action request: {}", e);
                serde_json::json!({"status": "failed", "message": e.to_string()})
            }
        };

        let mut out = outcome.to_string();
        out.push('\n');
        if stdout.write_all(out.as_bytes()).await.is_err() {
            break;
        }
        let _ = stdout.flush().await;
    }
}
