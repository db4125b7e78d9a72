//! rosbridge v2 wire frames.
//!
//! Outbound frames are built with `serde_json::json!`; inbound telemetry is
//! deserialized into the small typed shapes below. Only the fields this
//! relay reads are modelled — rosbridge tolerates the rest.

use serde::Deserialize;
use serde_json::{Value, json};

use waybridge_types::{Quaternion, Vector3};

/// Frame id used for every navigation goal.
pub const MAP_FRAME: &str = "map";

pub const TWIST_TYPE: &str = "geometry_msgs/Twist";
pub const POSE_TYPE: &str = "geometry_msgs/PoseWithCovarianceStamped";
pub const ODOM_TYPE: &str = "nav_msgs/Odometry";
pub const MOVE_BASE_RESULT_TYPE: &str = "move_base_msgs/MoveBaseActionResult";
pub const MOVE_BASE_ACTION: &str = "move_base_msgs/MoveBaseAction";

// ---------------------------------------------------------------------------
// Outbound frames
// ---------------------------------------------------------------------------

pub fn subscribe(topic: &str, msg_type: &str) -> Value {
    json!({
        "op": "subscribe",
        "topic": topic,
        "type": msg_type
    })
}

pub fn advertise(topic: &str, msg_type: &str) -> Value {
    json!({
        "op": "advertise",
        "topic": topic,
        "type": msg_type
    })
}

pub fn publish(topic: &str, msg: Value) -> Value {
    json!({
        "op": "publish",
        "topic": topic,
        "msg": msg
    })
}

/// `geometry_msgs/Twist` body for a planar velocity command.
pub fn twist(linear_x: f64, angular_z: f64) -> Value {
    json!({
        "linear":  { "x": linear_x, "y": 0.0, "z": 0.0 },
        "angular": { "x": 0.0, "y": 0.0, "z": angular_z }
    })
}

/// Navigation goal body: a stamped target pose in the map frame.
pub fn nav_goal(position: Vector3, orientation: Quaternion) -> Value {
    json!({
        "target_pose": {
            "header": { "frame_id": MAP_FRAME },
            "pose": {
                "position":    { "x": position.x, "y": position.y, "z": position.z },
                "orientation": { "x": orientation.x, "y": orientation.y,
                                 "z": orientation.z, "w": orientation.w }
            }
        }
    })
}

/// Wrap a goal body the way an action client publishes it on
/// `<server>/goal`: the body plus a stamped goal id.
pub fn action_goal(goal_id: &str, stamp_secs: i64, stamp_nsecs: u32, goal: Value) -> Value {
    json!({
        "goal_id": {
            "stamp": { "secs": stamp_secs, "nsecs": stamp_nsecs },
            "id": goal_id
        },
        "goal": goal
    })
}

// ---------------------------------------------------------------------------
// Inbound frames
// ---------------------------------------------------------------------------

/// Envelope of every frame the bus sends us.
#[derive(Debug, Deserialize)]
pub struct InboundFrame {
    pub op: String,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub msg: Value,
}

/// `geometry_msgs/PoseWithCovarianceStamped`, reduced to the pose we read.
#[derive(Debug, Deserialize)]
pub struct PoseStamped {
    pub pose: PoseWithCovariance,
}

#[derive(Debug, Deserialize)]
pub struct PoseWithCovariance {
    pub pose: Pose,
}

#[derive(Debug, Deserialize)]
pub struct Pose {
    pub position: Vector3,
    pub orientation: Quaternion,
}

/// `nav_msgs/Odometry`, reduced to the twist we read.
#[derive(Debug, Deserialize)]
pub struct OdometryMsg {
    pub twist: TwistWithCovariance,
}

#[derive(Debug, Deserialize)]
pub struct TwistWithCovariance {
    pub twist: Twist,
}

#[derive(Debug, Deserialize)]
pub struct Twist {
    pub linear: Vector3,
    pub angular: Vector3,
}

/// `move_base_msgs/MoveBaseActionResult`, reduced to the status we log.
#[derive(Debug, Deserialize)]
pub struct ActionResultMsg {
    #[serde(default)]
    pub status: ActionStatus,
}

#[derive(Debug, Default, Deserialize)]
pub struct ActionStatus {
    #[serde(default)]
    pub status: i32,
    #[serde(default)]
    pub text: String,
}
