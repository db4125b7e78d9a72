use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Kind of physical or logical link a [`LinkConfig`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LinkKind {
    /// Outbound TCP socket to `address:port`.
    TcpClient,
    /// Listening TCP socket on `port`, accepting any number of peers.
    TcpServer,
    /// Local serial device at `/dev/<port>`, 115200 baud.
    Serial,
    /// rosbridge websocket session to `ws://address:port`.
    Bus,
}

/// Descriptor of one link to the robot. Immutable, supplied at construction
/// from the configuration file.
///
/// `port` is a string on purpose: for TCP links it is a port number, for
/// serial links it is the device name under `/dev` (e.g. `"ttyUSB0"`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    pub name: String,
    pub address: String,
    pub port: String,
    pub kind: LinkKind,
    /// Fixed delay between reconnect attempts, in seconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

fn default_poll_interval() -> u64 {
    10
}

/// Named channel identifiers on the robot's message bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicTable {
    #[serde(default = "default_cmd_vel")]
    pub cmd_vel: String,
    #[serde(default = "default_pose")]
    pub pose: String,
    #[serde(default = "default_odom")]
    pub odom: String,
    #[serde(default = "default_move_base")]
    pub move_base: String,
    #[serde(default = "default_move_base_result")]
    pub move_base_result: String,
}

fn default_cmd_vel() -> String {
    "/cmd_vel".to_string()
}
fn default_pose() -> String {
    "/amcl_pose".to_string()
}
fn default_odom() -> String {
    "/odom".to_string()
}
fn default_move_base() -> String {
    "/move_base".to_string()
}
fn default_move_base_result() -> String {
    "/move_base/result".to_string()
}

impl Default for TopicTable {
    fn default() -> Self {
        Self {
            cmd_vel: default_cmd_vel(),
            pose: default_pose(),
            odom: default_odom(),
            move_base: default_move_base(),
            move_base_result: default_move_base_result(),
        }
    }
}

/// 3D position in the map frame, metres.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl Vector3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Orientation quaternion (x, y, z, w).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,
    #[serde(default = "quat_w_identity")]
    pub w: f64,
}

fn quat_w_identity() -> f64 {
    1.0
}

impl Quaternion {
    pub fn new(x: f64, y: f64, z: f64, w: f64) -> Self {
        Self { x, y, z, w }
    }

    /// The no-rotation quaternion (0, 0, 0, 1).
    pub fn identity() -> Self {
        Self::new(0.0, 0.0, 0.0, 1.0)
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::identity()
    }
}

/// A preconfigured navigation target: position + orientation in the map
/// frame, addressed by a place/waypoint name pair in the [`WaypointTable`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub position: Vector3,
    pub orientation: Quaternion,
}

/// Two-level waypoint mapping: place name → waypoint name → [`Waypoint`].
///
/// Lookup of an unknown place or waypoint name fails with
/// [`BridgeError::UnknownWaypoint`] rather than yielding an undefined value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WaypointTable(pub HashMap<String, HashMap<String, Waypoint>>);

impl WaypointTable {
    pub fn get(&self, place: &str, waypoint: &str) -> Result<&Waypoint, BridgeError> {
        self.0
            .get(place)
            .and_then(|p| p.get(waypoint))
            .ok_or_else(|| BridgeError::UnknownWaypoint {
                place: place.to_string(),
                waypoint: waypoint.to_string(),
            })
    }

    pub fn insert(&mut self, place: &str, waypoint: &str, wp: Waypoint) {
        self.0
            .entry(place.to_string())
            .or_default()
            .insert(waypoint.to_string(), wp);
    }
}

/// Last-known robot telemetry snapshot.
///
/// Pose fields (`x`, `y`, `orientation_deg`) are overwritten only by the
/// pose subscription; velocity fields only by the odometry subscription.
/// `battery` and `time_remain` keep their construction defaults until a
/// battery feed exists.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RobotState {
    pub x: f64,
    pub y: f64,
    /// Yaw in degrees, in (-180, 180].
    pub orientation_deg: f64,
    pub linear_vel: f64,
    pub angular_vel: f64,
    pub battery: f64,
    pub time_remain: f64,
}

impl Default for RobotState {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            orientation_deg: 0.0,
            linear_vel: 0.0,
            angular_vel: 0.0,
            battery: 50.0,
            time_remain: 13.0,
        }
    }
}

/// The queryable fields of [`RobotState`], by wire name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateField {
    X,
    Y,
    Orientation,
    LinearVel,
    AngularVel,
    Battery,
    TimeRemain,
}

impl StateField {
    /// Read this field out of a [`RobotState`] snapshot.
    pub fn read(self, state: &RobotState) -> f64 {
        match self {
            StateField::X => state.x,
            StateField::Y => state.y,
            StateField::Orientation => state.orientation_deg,
            StateField::LinearVel => state.linear_vel,
            StateField::AngularVel => state.angular_vel,
            StateField::Battery => state.battery,
            StateField::TimeRemain => state.time_remain,
        }
    }
}

impl FromStr for StateField {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "x" => Ok(StateField::X),
            "y" => Ok(StateField::Y),
            "orientation" => Ok(StateField::Orientation),
            "linear_vel" => Ok(StateField::LinearVel),
            "angular_vel" => Ok(StateField::AngularVel),
            "battery" => Ok(StateField::Battery),
            "time_remain" => Ok(StateField::TimeRemain),
            other => Err(BridgeError::UnknownStateField(other.to_string())),
        }
    }
}

/// Error type spanning link failures, bus-session faults, and operator
/// input that names things which do not exist.
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Link failure: {0}")]
    Link(String),

    #[error("Bus session is not connected")]
    NotConnected,

    #[error("Unknown state field: {0}")]
    UnknownStateField(String),

    #[error("Unknown waypoint: {place}:{waypoint}")]
    UnknownWaypoint { place: String, waypoint: String },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for BridgeError {
    fn from(e: std::io::Error) -> Self {
        BridgeError::Link(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_config_kebab_case_kind() {
        let toml = r#"
            name = "Robot Team Test"
            address = "192.168.0.211"
            port = "9090"
            kind = "bus"
            poll_interval_secs = 5
        "#;
        let cfg: LinkConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.kind, LinkKind::Bus);
        assert_eq!(cfg.poll_interval_secs, 5);
    }

    #[test]
    fn link_config_poll_interval_defaults() {
        let toml = r#"
            name = "imu"
            address = "127.0.0.1"
            port = "ttyUSB0"
            kind = "serial"
        "#;
        let cfg: LinkConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.poll_interval_secs, 10);
    }

    #[test]
    fn topic_table_defaults() {
        let topics = TopicTable::default();
        assert_eq!(topics.cmd_vel, "/cmd_vel");
        assert_eq!(topics.pose, "/amcl_pose");
        assert_eq!(topics.odom, "/odom");
        assert_eq!(topics.move_base, "/move_base");
        assert_eq!(topics.move_base_result, "/move_base/result");
    }

    #[test]
    fn waypoint_table_lookup_and_miss() {
        let mut table = WaypointTable::default();
        table.insert(
            "f1",
            "homerobot",
            Waypoint {
                position: Vector3::default(),
                orientation: Quaternion::identity(),
            },
        );

        assert!(table.get("f1", "homerobot").is_ok());
        let err = table.get("f1", "basement").unwrap_err();
        assert!(
            matches!(err, BridgeError::UnknownWaypoint { ref place, ref waypoint }
                if place == "f1" && waypoint == "basement"),
            "expected UnknownWaypoint, got: {err:?}"
        );
        assert!(matches!(
            table.get("f2", "homerobot"),
            Err(BridgeError::UnknownWaypoint { .. })
        ));
    }

    #[test]
    fn waypoint_deserializes_with_partial_fields() {
        // Orientation `w` defaults to 1 so a bare `z` entry stays a valid
        // wire quaternion.
        let json = r#"{"position": {"x": 2.7, "y": 5.0}, "orientation": {"z": 90.0}}"#;
        let wp: Waypoint = serde_json::from_str(json).unwrap();
        assert!((wp.position.x - 2.7).abs() < f64::EPSILON);
        assert!((wp.position.z - 0.0).abs() < f64::EPSILON);
        assert!((wp.orientation.w - 1.0).abs() < f64::EPSILON);
        assert!((wp.orientation.z - 90.0).abs() < f64::EPSILON);
    }

    #[test]
    fn robot_state_defaults() {
        let state = RobotState::default();
        assert!((state.battery - 50.0).abs() < f64::EPSILON);
        assert!((state.time_remain - 13.0).abs() < f64::EPSILON);
        assert!((state.x).abs() < f64::EPSILON);
        assert!((state.orientation_deg).abs() < f64::EPSILON);
    }

    #[test]
    fn state_field_parses_all_wire_names() {
        for (name, expected) in [
            ("x", StateField::X),
            ("y", StateField::Y),
            ("orientation", StateField::Orientation),
            ("linear_vel", StateField::LinearVel),
            ("angular_vel", StateField::AngularVel),
            ("battery", StateField::Battery),
            ("time_remain", StateField::TimeRemain),
        ] {
            assert_eq!(name.parse::<StateField>().unwrap(), expected);
        }
    }

    #[test]
    fn state_field_rejects_unknown_name() {
        let err = "voltage".parse::<StateField>().unwrap_err();
        assert!(matches!(err, BridgeError::UnknownStateField(ref f) if f == "voltage"));
    }

    #[test]
    fn state_field_reads_named_field() {
        let state = RobotState {
            linear_vel: 0.25,
            ..RobotState::default()
        };
        assert!((StateField::LinearVel.read(&state) - 0.25).abs() < f64::EPSILON);
        assert!((StateField::Battery.read(&state) - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn bridge_error_display() {
        let err = BridgeError::UnknownWaypoint {
            place: "f1".to_string(),
            waypoint: "dock".to_string(),
        };
        assert!(err.to_string().contains("f1:dock"));

        let err2 = BridgeError::Link("connection refused".to_string());
        assert!(err2.to_string().contains("connection refused"));
    }
}
