//! `waybridge-ros` – The Bus Bridge
//!
//! Talks rosbridge JSON over a websocket kept alive by
//! [`waybridge-link`][waybridge_link], and translates between operator
//! intent and bus traffic.
//!
//! # Modules
//!
//! - [`protocol`] – rosbridge v2 frame construction (`subscribe`,
//!   `advertise`, `publish`, action goals) and the typed shapes of the
//!   inbound telemetry messages.
//! - [`bridge`] – [`RosBridge`], the websocket [`Link`][waybridge_link::Link]
//!   variant with a publish/subscribe/action-goal client API.
//! - [`state`] – [`StateCache`], the last-known robot snapshot fed by the
//!   pose and odometry subscriptions, including quaternion→yaw extraction.
//! - [`commander`] – [`Commander`], the operator-facing operations
//!   (joystick velocity, custom/named waypoints, state query).

pub mod bridge;
pub mod commander;
pub mod protocol;
pub mod state;

pub use bridge::RosBridge;
pub use commander::Commander;
pub use state::StateCache;
