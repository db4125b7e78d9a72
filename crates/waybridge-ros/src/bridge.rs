//! [`RosBridge`] – the bus-bridge connection variant.
//!
//! One websocket session to the robot's rosbridge endpoint, supervised by a
//! [`Connection`] exactly like the raw links: a failed handshake or a dead
//! session drops the externally visible state flag and the fixed-interval
//! retry applies. On every successful session the bridge first subscribes to
//! the telemetry channels, then pumps
//!
//! * outbound command frames from a process-lifetime queue (the underlying
//!   client handle is created once; reconnects reuse it), and
//! * inbound bus frames, dispatched by topic into the [`StateCache`] and
//!   re-emitted as raw received events.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{info, warn};
use uuid::Uuid;

use waybridge_link::{Connection, Link, LinkSink, LinkState};
use waybridge_types::{BridgeError, LinkConfig, TopicTable};

use crate::protocol;
use crate::state::StateCache;

/// Dispatch budget for one action goal, handshake included.
pub const ACTION_HANDSHAKE_TIMEOUT: Duration = Duration::from_millis(1000);

/// The websocket [`Link`] variant. Owns the session-independent halves of
/// the bridge: the command queue receiver and the state cache.
struct BusLink {
    endpoint: String,
    topics: TopicTable,
    cache: Arc<StateCache>,
    cmd_rx: mpsc::UnboundedReceiver<String>,
}

#[async_trait]
impl Link for BusLink {
    fn kind(&self) -> &'static str {
        "bus"
    }

    async fn run(&mut self, sink: &LinkSink) -> BridgeError {
        let url = format!("ws://{}", self.endpoint);
        let (ws, _) = match connect_async(url.as_str()).await {
            Ok(ok) => ok,
            Err(e) => return BridgeError::Link(e.to_string()),
        };
        info!(url = %url, "bus session established");
        let (mut ws_tx, mut ws_rx) = ws.split();

        // Telemetry subscriptions go out before the session is announced,
        // so no command frame can get ahead of them.
        let subscriptions = [
            protocol::subscribe(&self.topics.pose, protocol::POSE_TYPE),
            protocol::subscribe(&self.topics.odom, protocol::ODOM_TYPE),
            protocol::subscribe(&self.topics.move_base_result, protocol::MOVE_BASE_RESULT_TYPE),
        ];
        for frame in subscriptions {
            if let Err(e) = ws_tx.send(Message::Text(frame.to_string().into())).await {
                return BridgeError::Link(e.to_string());
            }
        }
        sink.connected();

        loop {
            tokio::select! {
                // Outbound: command frames queued by RosBridge.
                cmd = self.cmd_rx.recv() => {
                    match cmd {
                        Some(frame) => {
                            if let Err(e) = ws_tx.send(Message::Text(frame.into())).await {
                                return BridgeError::Link(e.to_string());
                            }
                        }
                        None => return BridgeError::Link("command queue closed".to_string()),
                    }
                }
                // Inbound: bus frames.
                msg = ws_rx.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            self.dispatch(text.as_str());
                            sink.received(text.as_bytes().to_vec());
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            return BridgeError::Link("bus closed the session".to_string());
                        }
                        Some(Err(e)) => return BridgeError::Link(e.to_string()),
                        _ => {}
                    }
                }
            }
        }
    }
}

impl BusLink {
    /// Route one inbound frame by topic. Frames that are not `publish`, or
    /// arrive on channels we do not consume, are ignored.
    fn dispatch(&self, text: &str) {
        let Ok(frame) = serde_json::from_str::<protocol::InboundFrame>(text) else {
            return;
        };
        if frame.op != "publish" {
            return;
        }

        if frame.topic == self.topics.pose {
            match serde_json::from_value::<protocol::PoseStamped>(frame.msg) {
                Ok(msg) => {
                    let pose = msg.pose.pose;
                    self.cache.apply_pose(pose.position, pose.orientation);
                }
                Err(e) => warn!(topic = %frame.topic, error = %e, "malformed pose message"),
            }
        } else if frame.topic == self.topics.odom {
            match serde_json::from_value::<protocol::OdometryMsg>(frame.msg) {
                Ok(msg) => {
                    let twist = msg.twist.twist;
                    self.cache.apply_odom(twist.linear.x, twist.angular.z);
                }
                Err(e) => warn!(topic = %frame.topic, error = %e, "malformed odometry message"),
            }
        } else if frame.topic == self.topics.move_base_result {
            match serde_json::from_value::<protocol::ActionResultMsg>(frame.msg) {
                Ok(msg) => info!(
                    status = msg.status.status,
                    text = %msg.status.text,
                    "navigation result"
                ),
                Err(e) => warn!(topic = %frame.topic, error = %e, "malformed result message"),
            }
        }
    }
}

/// Publish/subscribe/action-goal client for the robot's message bus.
pub struct RosBridge {
    connection: Connection,
    cmd_tx: mpsc::UnboundedSender<String>,
    cache: Arc<StateCache>,
    topics: TopicTable,
}

impl RosBridge {
    /// Build the bridge and start connecting immediately.
    pub fn connect(config: &LinkConfig, topics: TopicTable) -> Self {
        let cache = Arc::new(StateCache::new());
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        let link = BusLink {
            endpoint: format!("{}:{}", config.address, config.port),
            topics: topics.clone(),
            cache: Arc::clone(&cache),
            cmd_rx,
        };
        let connection = Connection::spawn(config, link);

        Self {
            connection,
            cmd_tx,
            cache,
            topics,
        }
    }

    pub fn topics(&self) -> &TopicTable {
        &self.topics
    }

    pub fn cache(&self) -> &StateCache {
        &self.cache
    }

    /// Externally visible session flag.
    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    pub fn state(&self) -> watch::Receiver<LinkState> {
        self.connection.state()
    }

    /// Raw inbound bus frames, as delivered by the session.
    pub fn frames(&self) -> broadcast::Receiver<Vec<u8>> {
        self.connection.subscribe()
    }

    /// Publish `msg` on `topic`.
    ///
    /// Each publish is preceded by an advertise for its topic; the bus
    /// treats repeats as no-ops and this keeps a reconnected session valid
    /// without per-session bookkeeping.
    ///
    /// # Errors
    ///
    /// [`BridgeError::NotConnected`] while no bus session is up.
    pub async fn publish(&self, topic: &str, msg_type: &str, msg: Value) -> Result<(), BridgeError> {
        self.enqueue(protocol::advertise(topic, msg_type))?;
        self.enqueue(protocol::publish(topic, msg))
    }

    /// Send an action goal to `server` and return the generated goal id.
    ///
    /// The goal is published on `<server>/goal` with message type
    /// `<action>Goal`, wrapped with a stamped goal id the way an action
    /// client does. Dispatch is bounded by [`ACTION_HANDSHAKE_TIMEOUT`].
    pub async fn send_goal(
        &self,
        server: &str,
        action: &str,
        goal: Value,
    ) -> Result<String, BridgeError> {
        let goal_topic = format!("{server}/goal");
        let goal_type = format!("{action}Goal");
        let goal_id = format!("goal_{}", Uuid::new_v4());

        let stamp = chrono::Utc::now();
        let frame = protocol::action_goal(
            &goal_id,
            stamp.timestamp(),
            stamp.timestamp_subsec_nanos(),
            goal,
        );

        tokio::time::timeout(
            ACTION_HANDSHAKE_TIMEOUT,
            self.publish(&goal_topic, &goal_type, frame),
        )
        .await
        .map_err(|_| BridgeError::Link("action goal dispatch timed out".to_string()))??;

        Ok(goal_id)
    }

    fn enqueue(&self, frame: Value) -> Result<(), BridgeError> {
        if !self.is_connected() {
            return Err(BridgeError::NotConnected);
        }
        self.cmd_tx
            .send(frame.to_string())
            .map_err(|_| BridgeError::NotConnected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::{TcpListener, TcpStream};
    use tokio_tungstenite::{WebSocketStream, accept_async};

    use waybridge_types::LinkKind;

    fn make_config(port: u16) -> LinkConfig {
        LinkConfig {
            name: "Robot Team Test".to_string(),
            address: "127.0.0.1".to_string(),
            port: port.to_string(),
            kind: LinkKind::Bus,
            poll_interval_secs: 1,
        }
    }

    async fn wait_connected(bridge: &RosBridge) {
        let mut state = bridge.state();
        tokio::time::timeout(Duration::from_secs(5), async {
            while *state.borrow() != LinkState::Connected {
                state.changed().await.expect("state channel closed");
            }
        })
        .await
        .expect("bridge never connected");
    }

    async fn next_text(ws: &mut WebSocketStream<TcpStream>) -> Value {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for frame")
            .expect("session ended")
            .expect("websocket error");
        match msg {
            Message::Text(text) => serde_json::from_str(text.as_str()).expect("invalid json"),
            other => panic!("expected text frame, got {other:?}"),
        }
    }

    /// Accept one session and return it with the three subscription frames
    /// already consumed.
    async fn accept_session(listener: &TcpListener) -> (WebSocketStream<TcpStream>, Vec<Value>) {
        let (stream, _) = tokio::time::timeout(Duration::from_secs(5), listener.accept())
            .await
            .expect("timed out waiting for session")
            .expect("accept failed");
        let mut ws = accept_async(stream).await.expect("ws handshake");
        let mut subs = Vec::new();
        for _ in 0..3 {
            subs.push(next_text(&mut ws).await);
        }
        (ws, subs)
    }

    #[tokio::test]
    async fn session_subscribes_to_telemetry_channels() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let bridge = RosBridge::connect(&make_config(port), TopicTable::default());

        let (_ws, subs) = accept_session(&listener).await;
        wait_connected(&bridge).await;

        let topics: Vec<&str> = subs
            .iter()
            .map(|f| f["topic"].as_str().unwrap())
            .collect();
        assert!(subs.iter().all(|f| f["op"] == "subscribe"));
        assert_eq!(topics, vec!["/amcl_pose", "/odom", "/move_base/result"]);
    }

    #[tokio::test]
    async fn pose_frame_updates_cache() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let bridge = RosBridge::connect(&make_config(port), TopicTable::default());

        let (mut ws, _) = accept_session(&listener).await;
        wait_connected(&bridge).await;

        // Pure 90° yaw.
        let half = 45f64.to_radians();
        let pose = serde_json::json!({
            "op": "publish",
            "topic": "/amcl_pose",
            "msg": {
                "pose": {
                    "pose": {
                        "position": { "x": 1.23456789, "y": 5.0, "z": 0.0 },
                        "orientation": { "x": 0.0, "y": 0.0, "z": half.sin(), "w": half.cos() }
                    }
                }
            }
        });
        ws.send(Message::Text(pose.to_string().into())).await.unwrap();

        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let state = bridge.cache().snapshot();
                if (state.x - 1.2346).abs() < 1e-9 {
                    assert!((state.y - 5.0).abs() < 1e-9);
                    assert!((state.orientation_deg - 90.0).abs() < 1e-6);
                    // Odometry and battery fields are other channels'.
                    assert!(state.linear_vel.abs() < f64::EPSILON);
                    assert!((state.battery - 50.0).abs() < f64::EPSILON);
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("cache never saw the pose frame");
    }

    #[tokio::test]
    async fn publish_sends_advertise_then_publish() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let bridge = RosBridge::connect(&make_config(port), TopicTable::default());

        let (mut ws, _) = accept_session(&listener).await;
        wait_connected(&bridge).await;

        bridge
            .publish("/cmd_vel", protocol::TWIST_TYPE, protocol::twist(1.0, 0.0))
            .await
            .unwrap();

        let advertise = next_text(&mut ws).await;
        assert_eq!(advertise["op"], "advertise");
        assert_eq!(advertise["topic"], "/cmd_vel");
        assert_eq!(advertise["type"], protocol::TWIST_TYPE);

        let publish = next_text(&mut ws).await;
        assert_eq!(publish["op"], "publish");
        assert_eq!(publish["topic"], "/cmd_vel");
        assert_eq!(publish["msg"]["linear"]["x"], 1.0);
    }

    #[tokio::test]
    async fn send_goal_publishes_wrapped_goal_frame() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let bridge = RosBridge::connect(&make_config(port), TopicTable::default());

        let (mut ws, _) = accept_session(&listener).await;
        wait_connected(&bridge).await;

        let goal_id = bridge
            .send_goal(
                "/move_base",
                protocol::MOVE_BASE_ACTION,
                protocol::nav_goal(
                    waybridge_types::Vector3::new(2.0, -1.0, 0.0),
                    waybridge_types::Quaternion::identity(),
                ),
            )
            .await
            .unwrap();
        assert!(goal_id.starts_with("goal_"));

        let advertise = next_text(&mut ws).await;
        assert_eq!(advertise["topic"], "/move_base/goal");
        assert_eq!(advertise["type"], "move_base_msgs/MoveBaseActionGoal");

        let publish = next_text(&mut ws).await;
        assert_eq!(publish["op"], "publish");
        assert_eq!(publish["topic"], "/move_base/goal");
        assert_eq!(publish["msg"]["goal_id"]["id"], goal_id.as_str());
        let pose = &publish["msg"]["goal"]["target_pose"];
        assert_eq!(pose["header"]["frame_id"], "map");
        assert_eq!(pose["pose"]["position"]["x"], 2.0);
        assert_eq!(pose["pose"]["orientation"]["w"], 1.0);
    }

    #[tokio::test]
    async fn publish_while_disconnected_is_rejected() {
        // A port nothing listens on.
        let probe = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = probe.local_addr().unwrap().port();
        drop(probe);

        let bridge = RosBridge::connect(&make_config(port), TopicTable::default());
        let err = bridge
            .publish("/cmd_vel", protocol::TWIST_TYPE, protocol::twist(0.0, 0.0))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::NotConnected));
    }

    #[tokio::test]
    async fn session_drop_flips_flag_and_reconnects() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let bridge = RosBridge::connect(&make_config(port), TopicTable::default());

        let (ws, _) = accept_session(&listener).await;
        wait_connected(&bridge).await;

        // Kill the session server-side.
        drop(ws);

        let mut state = bridge.state();
        tokio::time::timeout(Duration::from_secs(5), async {
            while *state.borrow() != LinkState::Disconnected {
                state.changed().await.expect("state channel closed");
            }
        })
        .await
        .expect("flag never dropped");

        // The supervisor retries on its fixed interval and comes back.
        let (_ws2, subs) = accept_session(&listener).await;
        wait_connected(&bridge).await;
        assert_eq!(subs.len(), 3);
        assert!(bridge.is_connected());
    }
}
