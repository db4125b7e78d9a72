//! Operator intents → bus traffic.
//!
//! [`Commander`] owns the named-waypoint table and turns the four operator
//! operations (joystick velocity, custom waypoint, named waypoint, state
//! query) into publishes and action goals on the [`RosBridge`]. Input that
//! names something that does not exist (waypoint, state field) fails with
//! the matching lookup error; magnitudes are forwarded unclamped.

use std::sync::Arc;

use tracing::info;

use waybridge_types::{BridgeError, Quaternion, Vector3, WaypointTable};

use crate::bridge::RosBridge;
use crate::protocol;

/// Fixed scale-down between operator speed units and published velocity.
const SPEED_DIVISOR: f64 = 3.0;

/// Decompose a joystick heading into the velocity component pair
/// `(adj_x, adj_z)`.
///
/// The sign of the angular component encodes the robot's local-frame
/// convention: headings outside [90°, 270°] flip it. The rule is a robot
/// constant, kept exactly as calibrated.
pub fn velocity_components(angular_deg: f64) -> (f64, f64) {
    let rad = angular_deg.to_radians();
    let adj_x = rad.cos();
    let mut adj_z = rad.sin();
    if !(90.0..=270.0).contains(&angular_deg) {
        adj_z = -adj_z;
    }
    (adj_x, adj_z)
}

/// Operator-facing command surface.
pub struct Commander {
    bridge: Arc<RosBridge>,
    waypoints: WaypointTable,
}

impl Commander {
    pub fn new(bridge: Arc<RosBridge>, waypoints: WaypointTable) -> Self {
        Self { bridge, waypoints }
    }

    /// Publish a velocity command composed from a joystick deflection.
    ///
    /// `linear` is the operator speed, `angular_deg` the stick heading in
    /// degrees. No bounds are applied to either.
    pub async fn joystick(&self, linear: f64, angular_deg: f64) -> Result<(), BridgeError> {
        let (adj_x, adj_z) = velocity_components(angular_deg);
        let linear_x = adj_x * linear / SPEED_DIVISOR;
        let angular_z = adj_z * linear / SPEED_DIVISOR;

        info!(linear, angular_deg, linear_x, angular_z, "joystick command");
        self.bridge
            .publish(
                &self.bridge.topics().cmd_vel,
                protocol::TWIST_TYPE,
                protocol::twist(linear_x, angular_z),
            )
            .await
    }

    /// Dispatch an ad-hoc navigation goal to `(x, y)` on the map, facing
    /// the identity orientation.
    pub async fn goto_custom(&self, x: f64, y: f64) -> Result<String, BridgeError> {
        info!(x, y, "custom waypoint command");
        self.send_nav_goal(Vector3::new(x, y, 0.0), Quaternion::identity())
            .await
    }

    /// Dispatch the configured waypoint `place:waypoint`.
    ///
    /// # Errors
    ///
    /// [`BridgeError::UnknownWaypoint`] when the name pair is not in the
    /// table; nothing is sent in that case.
    pub async fn goto_named(&self, place: &str, waypoint: &str) -> Result<String, BridgeError> {
        let wp = *self.waypoints.get(place, waypoint)?;
        info!(place, waypoint, "named waypoint command");
        self.send_nav_goal(wp.position, wp.orientation).await
    }

    /// Read one named field from the state cache.
    pub fn state_field(&self, name: &str) -> Result<f64, BridgeError> {
        let field = name.parse()?;
        Ok(self.bridge.cache().get(field))
    }

    /// Externally visible bus session flag.
    pub fn connected(&self) -> bool {
        self.bridge.is_connected()
    }

    async fn send_nav_goal(
        &self,
        position: Vector3,
        orientation: Quaternion,
    ) -> Result<String, BridgeError> {
        self.bridge
            .send_goal(
                &self.bridge.topics().move_base,
                protocol::MOVE_BASE_ACTION,
                protocol::nav_goal(position, orientation),
            )
            .await
    }
}
