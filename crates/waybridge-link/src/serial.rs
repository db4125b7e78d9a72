//! Serial device link.
//!
//! Opens `/dev/<port>` at the fixed robot baud rate and forwards incoming
//! bytes as received events. The device handle lives inside one session, so
//! a failed open or a read error simply hands the retry decision back to the
//! [`Connection`][crate::connection::Connection] supervisor.

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio_serial::SerialPortBuilderExt;
use tracing::info;

use waybridge_types::{BridgeError, LinkConfig};

use crate::connection::{Link, LinkSink};

/// All robot-side serial peripherals speak 115200.
const BAUD_RATE: u32 = 115_200;

const READ_BUF_SIZE: usize = 1024;

/// Local serial device at `/dev/<port>`.
pub struct SerialLink {
    device: String,
}

impl SerialLink {
    pub fn new(config: &LinkConfig) -> Self {
        Self {
            device: format!("/dev/{}", config.port),
        }
    }
}

#[async_trait]
impl Link for SerialLink {
    fn kind(&self) -> &'static str {
        "serial"
    }

    async fn run(&mut self, sink: &LinkSink) -> BridgeError {
        let mut port = match tokio_serial::new(&self.device, BAUD_RATE).open_native_async() {
            Ok(port) => port,
            Err(e) => return BridgeError::Link(e.to_string()),
        };
        info!(device = %self.device, baud = BAUD_RATE, "serial connection established");
        sink.connected();

        let mut buf = [0u8; READ_BUF_SIZE];
        loop {
            match port.read(&mut buf).await {
                Ok(0) => return BridgeError::Link("serial device closed".to_string()),
                Ok(n) => sink.received(buf[..n].to_vec()),
                Err(e) => return e.into(),
            }
        }
    }
}
