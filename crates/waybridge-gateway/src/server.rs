//! [`GatewayServer`] – HTTP endpoint for the relay operations.
//!
//! Routes:
//!
//! | Route | Params | Effect |
//! |---|---|---|
//! | `/` | — | liveness banner |
//! | `/state` | `field` | cached state field as text |
//! | `/waypoint/custom` | `x`, `y` | dispatch ad-hoc navigation goal |
//! | `/waypoint` | `place`, `waypoint` | dispatch configured navigation goal |
//! | `/joystick` | `linear`, `angular` | publish velocity command |
//!
//! Place and waypoint names are lowercased before lookup. Numeric params
//! are parsed here at the boundary; anything unparseable answers with the
//! operation's failure text instead of forwarding garbage to the robot.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info, warn};

use waybridge_ros::Commander;
use waybridge_types::BridgeError;

/// Default TCP port of the gateway.
pub const DEFAULT_PORT: u16 = 9999;

const REQUEST_HEAD_LIMIT: usize = 2048;

/// HTTP server bridging operators to a [`Commander`].
pub struct GatewayServer {
    commander: Arc<Commander>,
    port: u16,
}

impl GatewayServer {
    /// Create a server on the [`DEFAULT_PORT`].
    pub fn new(commander: Arc<Commander>) -> Self {
        Self {
            commander,
            port: DEFAULT_PORT,
        }
    }

    /// Override the listening port (builder-style).
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Bind and serve until a fatal listener error.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Link`] if the listener cannot bind.
    pub async fn run(self) -> Result<(), BridgeError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr).await?;
        info!(port = self.port, "gateway listening");
        self.serve(listener).await
    }

    /// Serve on an already-bound listener.
    pub async fn serve(self, listener: TcpListener) -> Result<(), BridgeError> {
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let commander = Arc::clone(&self.commander);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, &commander).await {
                            warn!(peer = %peer, error = %e, "client error");
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "accept error");
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Per-connection handler
// ---------------------------------------------------------------------------

async fn handle_connection(
    mut stream: TcpStream,
    commander: &Commander,
) -> Result<(), BridgeError> {
    let mut buf = [0u8; REQUEST_HEAD_LIMIT];
    let n = stream.read(&mut buf).await?;
    let head = String::from_utf8_lossy(&buf[..n]);

    let (status, body) = match parse_request_line(&head) {
        Some((method, path, query)) => respond(commander, method, path, query).await,
        None => (400, "Malformed request".to_string()),
    };

    let reason = match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        _ => "Internal Server Error",
    };
    let response = format!(
        "HTTP/1.1 {status} {reason}\r\n\
         Content-Type: text/html; charset=utf-8\r\n\
         Access-Control-Allow-Origin: *\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n\
         {body}",
        body.len(),
    );
    stream.write_all(response.as_bytes()).await?;
    Ok(())
}

/// Split the request head into method, path, and raw query string.
fn parse_request_line(head: &str) -> Option<(&str, &str, &str)> {
    let line = head.lines().next()?;
    let mut parts = line.split_whitespace();
    let method = parts.next()?;
    let target = parts.next()?;
    let (path, query) = match target.split_once('?') {
        Some((p, q)) => (p, q),
        None => (target, ""),
    };
    Some((method, path, query))
}

/// Decode `a=1&b=2` query strings.
fn parse_query(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            let key = urlencoding::decode(key).ok()?.into_owned();
            let value = urlencoding::decode(value).ok()?.into_owned();
            Some((key, value))
        })
        .collect()
}

/// Route one request to the commander and produce `(status, body)`.
async fn respond(
    commander: &Commander,
    method: &str,
    path: &str,
    query: &str,
) -> (u16, String) {
    if method != "GET" {
        return (400, "Only GET is supported".to_string());
    }
    let params = parse_query(query);

    match path {
        "/" => (200, "Waybridge relay server.".to_string()),

        "/state" => match params.get("field") {
            Some(field) => match commander.state_field(field) {
                Ok(value) => (200, value.to_string()),
                Err(e) => (200, format!("Error on reading state: {e}")),
            },
            None => (400, "Missing query param: field".to_string()),
        },

        "/waypoint/custom" => {
            let coords = params
                .get("x")
                .zip(params.get("y"))
                .and_then(|(x, y)| Some((x.parse::<f64>().ok()?, y.parse::<f64>().ok()?)));
            match coords {
                Some((x, y)) => {
                    info!(x, y, "custom waypoint request");
                    match commander.goto_custom(x, y).await {
                        Ok(_) => (
                            200,
                            format!("Your waypoint command to ({x},{y}) is successfully dispatched!"),
                        ),
                        Err(e) => {
                            warn!(error = %e, "custom waypoint dispatch failed");
                            (200, format!("Error on dispatching the waypoint command to ({x},{y})"))
                        }
                    }
                }
                None => (400, "Missing or non-numeric query params: x, y".to_string()),
            }
        }

        "/waypoint" => match params.get("place").zip(params.get("waypoint")) {
            Some((place, waypoint)) => {
                let place = place.to_lowercase();
                let waypoint = waypoint.to_lowercase();
                info!(place = %place, waypoint = %waypoint, "named waypoint request");
                match commander.goto_named(&place, &waypoint).await {
                    Ok(_) => (
                        200,
                        format!("Your waypoint command to {place}:{waypoint} is successfully dispatched!"),
                    ),
                    Err(e) => {
                        warn!(error = %e, "named waypoint dispatch failed");
                        (200, format!("Error on dispatching the waypoint command to {place}:{waypoint}"))
                    }
                }
            }
            None => (400, "Missing query params: place, waypoint".to_string()),
        },

        "/joystick" => {
            let deflection = params
                .get("linear")
                .zip(params.get("angular"))
                .and_then(|(l, a)| Some((l.parse::<f64>().ok()?, a.parse::<f64>().ok()?)));
            match deflection {
                Some((linear, angular)) => {
                    info!(linear, angular, "joystick request");
                    match commander.joystick(linear, angular).await {
                        Ok(()) => (
                            200,
                            format!(
                                "Your joystick command is successfully dispatched!, Linear: {linear}, Angular: {angular}"
                            ),
                        ),
                        Err(e) => {
                            warn!(error = %e, "joystick dispatch failed");
                            (200, "Error on dispatching the joystick command".to_string())
                        }
                    }
                }
                None => (
                    400,
                    "Missing or non-numeric query params: linear, angular".to_string(),
                ),
            }
        }

        _ => (404, "Not found".to_string()),
    }
}
