//! Last-known robot state, fed by the bus subscriptions.
//!
//! Pose fields are written only by the pose handler and velocity fields
//! only by the odometry handler, so the two channels never race on the same
//! field. Readers take a whole-snapshot copy under the lock.

use std::sync::RwLock;

use nalgebra::UnitQuaternion;

use waybridge_types::{Quaternion, RobotState, StateField, Vector3};

/// Telemetry values are truncated to four decimal digits on the wire side.
fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

/// Yaw (rotation about the vertical axis) of `q`, in degrees, via the
/// standard ZYX Euler decomposition.
pub fn yaw_degrees(q: Quaternion) -> f64 {
    let uq = UnitQuaternion::from_quaternion(nalgebra::Quaternion::new(q.w, q.x, q.y, q.z));
    let (_roll, _pitch, yaw) = uq.euler_angles();
    yaw.to_degrees()
}

/// Cache of the last-known [`RobotState`] snapshot.
#[derive(Debug, Default)]
pub struct StateCache {
    inner: RwLock<RobotState>,
}

impl StateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whole-state copy.
    pub fn snapshot(&self) -> RobotState {
        match self.inner.read() {
            Ok(guard) => *guard,
            // A writer can only poison the lock by panicking mid-write of
            // plain floats; the value is still a usable snapshot.
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Read one named field.
    pub fn get(&self, field: StateField) -> f64 {
        field.read(&self.snapshot())
    }

    /// Pose-channel handler: overwrite position and orientation.
    pub fn apply_pose(&self, position: Vector3, orientation: Quaternion) {
        let yaw = yaw_degrees(orientation);
        let mut state = match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.x = round4(position.x);
        state.y = round4(position.y);
        state.orientation_deg = yaw;
    }

    /// Odometry-channel handler: overwrite the velocity pair.
    pub fn apply_odom(&self, linear_x: f64, angular_z: f64) {
        let mut state = match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.linear_vel = round4(linear_x);
        state.angular_vel = round4(angular_z);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Pure yaw rotation of `deg` degrees: (0, 0, sin(θ/2), cos(θ/2)).
    fn yaw_quat(deg: f64) -> Quaternion {
        let half = deg.to_radians() / 2.0;
        Quaternion::new(0.0, 0.0, half.sin(), half.cos())
    }

    #[test]
    fn yaw_extraction_round_trips_pure_yaw_rotations() {
        // Sweep the open-closed interval (-180, 180].
        let mut deg = -179.0;
        while deg <= 180.0 {
            let yaw = yaw_degrees(yaw_quat(deg));
            assert!(
                (yaw - deg).abs() < 1e-6,
                "yaw for {deg}° came back as {yaw}°"
            );
            deg += 1.0;
        }
    }

    #[test]
    fn yaw_of_identity_is_zero() {
        assert!(yaw_degrees(Quaternion::identity()).abs() < 1e-9);
    }

    #[test]
    fn yaw_matches_atan2_formula_for_general_rotation() {
        // A rotation with all four components populated.
        let q = Quaternion::new(0.1, 0.2, 0.3, 0.9273618495495704);
        let expected = (2.0 * (q.w * q.z + q.x * q.y))
            .atan2(1.0 - 2.0 * (q.y * q.y + q.z * q.z))
            .to_degrees();
        assert!((yaw_degrees(q) - expected).abs() < 1e-9);
    }

    #[test]
    fn defaults_until_telemetry_arrives() {
        let cache = StateCache::new();
        assert!((cache.get(StateField::Battery) - 50.0).abs() < f64::EPSILON);
        assert!((cache.get(StateField::TimeRemain) - 13.0).abs() < f64::EPSILON);
        assert!(cache.get(StateField::X).abs() < f64::EPSILON);
    }

    #[test]
    fn pose_update_leaves_other_channels_untouched() {
        let cache = StateCache::new();
        cache.apply_pose(Vector3::new(1.23456789, -2.00004, 0.0), yaw_quat(90.0));

        let state = cache.snapshot();
        assert!((state.x - 1.2346).abs() < 1e-12);
        assert!((state.y - (-2.0)).abs() < 1e-12);
        assert!((state.orientation_deg - 90.0).abs() < 1e-6);
        // Velocity and battery fields belong to other channels.
        assert!(state.linear_vel.abs() < f64::EPSILON);
        assert!((state.battery - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn odom_update_truncates_to_four_decimals() {
        let cache = StateCache::new();
        cache.apply_odom(0.333333, -0.100049);

        let state = cache.snapshot();
        assert!((state.linear_vel - 0.3333).abs() < 1e-12);
        assert!((state.angular_vel - (-0.1)).abs() < 1e-12);
        // Pose fields stay at their defaults.
        assert!(state.x.abs() < f64::EPSILON);
        assert!(state.orientation_deg.abs() < f64::EPSILON);
    }
}
