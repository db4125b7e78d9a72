//! Raw TCP link variants.
//!
//! [`TcpClientLink`] dials out to the robot; [`TcpServerLink`] listens and
//! lets any number of robot-side peers dial in. Both forward raw chunks as
//! received events and leave framing to the consumer.

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tracing::info;

use waybridge_types::{BridgeError, LinkConfig};

use crate::connection::{Link, LinkSink};

const READ_BUF_SIZE: usize = 4096;

/// Outbound TCP socket to `address:port`.
pub struct TcpClientLink {
    endpoint: String,
}

impl TcpClientLink {
    pub fn new(config: &LinkConfig) -> Self {
        Self {
            endpoint: format!("{}:{}", config.address, config.port),
        }
    }
}

#[async_trait]
impl Link for TcpClientLink {
    fn kind(&self) -> &'static str {
        "tcp-client"
    }

    async fn run(&mut self, sink: &LinkSink) -> BridgeError {
        let mut stream = match TcpStream::connect(&self.endpoint).await {
            Ok(stream) => stream,
            Err(e) => return e.into(),
        };
        info!(endpoint = %self.endpoint, "tcp-client connection established");
        sink.connected();

        pump(&mut stream, sink).await
    }
}

/// Listening TCP socket on `port`.
///
/// Accepts any number of inbound peers and forwards each peer's chunks on
/// the shared received channel. A bind failure (address already in use
/// included) or an accept failure ends the session; the per-peer reader
/// tasks die with it.
pub struct TcpServerLink {
    addr: String,
}

impl TcpServerLink {
    pub fn new(config: &LinkConfig) -> Self {
        Self {
            addr: format!("0.0.0.0:{}", config.port),
        }
    }

    /// Listen on an explicit address instead of `0.0.0.0:<port>`.
    pub fn bound_to(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }
}

#[async_trait]
impl Link for TcpServerLink {
    fn kind(&self) -> &'static str {
        "tcp-server"
    }

    async fn run(&mut self, sink: &LinkSink) -> BridgeError {
        let listener = match TcpListener::bind(&self.addr).await {
            Ok(listener) => listener,
            Err(e) => return e.into(),
        };
        info!(addr = %self.addr, "tcp-server listening");
        sink.connected();

        let mut readers: JoinSet<()> = JoinSet::new();
        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((mut stream, peer)) => {
                            info!(peer = %peer, "peer connected to tcp-server");
                            let sink = sink.clone();
                            readers.spawn(async move {
                                let err = pump(&mut stream, &sink).await;
                                info!(peer = %peer, reason = %err, "peer disconnected");
                            });
                        }
                        Err(e) => return e.into(),
                    }
                }
                // Reap finished peer readers; a single peer dropping is not
                // a session failure.
                Some(_) = readers.join_next(), if !readers.is_empty() => {}
            }
        }
    }
}

/// Forward chunks from `stream` until it fails or the peer closes.
async fn pump(stream: &mut TcpStream, sink: &LinkSink) -> BridgeError {
    let mut buf = [0u8; READ_BUF_SIZE];
    loop {
        match stream.read(&mut buf).await {
            Ok(0) => return BridgeError::Link("peer closed the connection".to_string()),
            Ok(n) => sink.received(buf[..n].to_vec()),
            Err(e) => return e.into(),
        }
    }
}
