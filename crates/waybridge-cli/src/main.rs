//! `waybridge` – robot teleoperation relay.
//!
//! Boot order:
//!
//! 1. Initialise `tracing` from `RUST_LOG` (JSON logs with
//!    `WAYBRIDGE_LOG_FORMAT=json`).
//! 2. Load the TOML config (first CLI argument, `WAYBRIDGE_CONFIG`, or
//!    `waybridge.toml`); fall back to the built-in site defaults and apply
//!    `WAYBRIDGE_*` overrides.
//! 3. Bring up the bus bridge and any configured auxiliary links; each
//!    reconnects forever on its own poll interval.
//! 4. Serve the HTTP gateway until Ctrl-C.

mod config;

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use waybridge_gateway::GatewayServer;
use waybridge_link::{Connection, SerialLink, TcpClientLink, TcpServerLink};
use waybridge_ros::{Commander, RosBridge};
use waybridge_types::{LinkConfig, LinkKind};

#[tokio::main]
async fn main() {
    init_tracing();

    let path = config::config_path();
    let mut cfg = match config::load_from(&path) {
        Ok(Some(cfg)) => {
            info!(path = %path.display(), "config loaded");
            cfg
        }
        Ok(None) => {
            info!(path = %path.display(), "no config file, using built-in defaults");
            config::RelayConfig::default()
        }
        Err(e) => {
            error!(error = %e, "config error, using built-in defaults");
            config::RelayConfig::default()
        }
    };
    config::apply_env_overrides(&mut cfg);

    if cfg.robot.kind != LinkKind::Bus {
        warn!(kind = ?cfg.robot.kind, "robot link kind is not 'bus'; treating it as one");
    }

    // ── Robot bus link ────────────────────────────────────────────────────
    let bridge = Arc::new(RosBridge::connect(&cfg.robot, cfg.topics.clone()));
    let commander = Arc::new(Commander::new(Arc::clone(&bridge), cfg.waypoints.clone()));

    // ── Auxiliary raw links ───────────────────────────────────────────────
    // Held for the process lifetime; dropping a Connection would stop its
    // reconnect loop.
    let _aux: Vec<Connection> = cfg.aux_links.iter().filter_map(spawn_aux_link).collect();

    // ── HTTP gateway ──────────────────────────────────────────────────────
    let gateway = GatewayServer::new(commander).with_port(cfg.gateway_port);
    info!(
        robot = %cfg.robot.name,
        bus = %format!("{}:{}", cfg.robot.address, cfg.robot.port),
        gateway_port = cfg.gateway_port,
        "waybridge starting"
    );

    tokio::select! {
        result = gateway.run() => {
            if let Err(e) = result {
                error!(error = %e, "gateway failed");
                std::process::exit(1);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C received, shutting down");
        }
    }
}

/// Spawn one auxiliary link and a logger draining its received events.
fn spawn_aux_link(link_cfg: &LinkConfig) -> Option<Connection> {
    let conn = match link_cfg.kind {
        LinkKind::TcpClient => Connection::spawn(link_cfg, TcpClientLink::new(link_cfg)),
        LinkKind::TcpServer => Connection::spawn(link_cfg, TcpServerLink::new(link_cfg)),
        LinkKind::Serial => Connection::spawn(link_cfg, SerialLink::new(link_cfg)),
        LinkKind::Bus => {
            warn!(link = %link_cfg.name, "auxiliary bus links are not supported, skipping");
            return None;
        }
    };

    let name = link_cfg.name.clone();
    let mut rx = conn.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(chunk) => debug!(link = %name, bytes = chunk.len(), "aux link data"),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    warn!(link = %name, lagged_by = n, "aux link logger lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    Some(conn)
}

fn init_tracing() {
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    if std::env::var("WAYBRIDGE_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .compact()
            .init();
    }
}
