//! Relay configuration – robot link descriptor, channel table, waypoint
//! table, gateway port. Loaded from a TOML file with `WAYBRIDGE_*`
//! environment overrides; every field has a working default so the relay
//! starts without any file at all.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use waybridge_types::{
    LinkConfig, LinkKind, Quaternion, TopicTable, Vector3, Waypoint, WaypointTable,
};

/// Complete relay configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// TCP port of the HTTP gateway.
    #[serde(default = "default_gateway_port")]
    pub gateway_port: u16,

    /// The robot's bus-bridge link.
    #[serde(default = "default_robot")]
    pub robot: LinkConfig,

    /// Bus channel names.
    #[serde(default)]
    pub topics: TopicTable,

    /// Named waypoint table: place → waypoint → pose.
    #[serde(default = "default_waypoints")]
    pub waypoints: WaypointTable,

    /// Additional raw links (TCP client/server, serial) to keep alive
    /// alongside the bus, e.g. an IMU serial feed.
    #[serde(default)]
    pub aux_links: Vec<LinkConfig>,
}

fn default_gateway_port() -> u16 {
    9999
}

fn default_robot() -> LinkConfig {
    LinkConfig {
        name: "Robot Team Test".to_string(),
        address: "192.168.0.211".to_string(),
        port: "9090".to_string(),
        kind: LinkKind::Bus,
        poll_interval_secs: 5,
    }
}

fn default_waypoints() -> WaypointTable {
    let mut table = WaypointTable::default();
    table.insert(
        "f1",
        "homerobot",
        Waypoint {
            position: Vector3::new(0.0, 0.0, 0.0),
            orientation: Quaternion::identity(),
        },
    );
    // Stored verbatim from the site calibration sheet.
    table.insert(
        "f1",
        "cleanroomrobot",
        Waypoint {
            position: Vector3::new(2.7, 5.0, 0.0),
            orientation: Quaternion::new(0.0, 0.0, 90.0, 1.0),
        },
    );
    table.insert(
        "f1",
        "exitrobot",
        Waypoint {
            position: Vector3::new(-4.0, 5.75, 0.0),
            orientation: Quaternion::identity(),
        },
    );
    table
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            gateway_port: default_gateway_port(),
            robot: default_robot(),
            topics: TopicTable::default(),
            waypoints: default_waypoints(),
            aux_links: Vec::new(),
        }
    }
}

/// Resolve the config file path: first CLI argument, then
/// `WAYBRIDGE_CONFIG`, then `waybridge.toml` in the working directory.
pub fn config_path() -> PathBuf {
    std::env::args()
        .nth(1)
        .or_else(|| std::env::var("WAYBRIDGE_CONFIG").ok())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("waybridge.toml"))
}

/// Load the config from `path`. Returns `Ok(None)` when the file does not
/// exist; env overrides are applied either way by the caller.
pub fn load_from(path: &Path) -> Result<Option<RelayConfig>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let cfg: RelayConfig =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    Ok(Some(cfg))
}

/// Apply `WAYBRIDGE_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `WAYBRIDGE_PORT` | `gateway_port` |
/// | `WAYBRIDGE_ROBOT_ADDR` | `robot.address` |
/// | `WAYBRIDGE_ROBOT_PORT` | `robot.port` |
pub fn apply_env_overrides(cfg: &mut RelayConfig) {
    if let Ok(v) = std::env::var("WAYBRIDGE_PORT")
        && let Ok(port) = v.parse::<u16>()
    {
        cfg.gateway_port = port;
    }
    if let Ok(v) = std::env::var("WAYBRIDGE_ROBOT_ADDR") {
        cfg.robot.address = v;
    }
    if let Ok(v) = std::env::var("WAYBRIDGE_ROBOT_PORT") {
        cfg.robot.port = v;
    }
}

/// Save the config to `path`, creating parent directories as needed.
pub fn save_to(cfg: &RelayConfig, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    fs::write(path, raw).map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))
}
