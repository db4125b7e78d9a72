//! `waybridge-link` – The Connection Layer
//!
//! Keeps a single link to the robot alive forever, whatever the link is made
//! of, without caring about the bytes it carries.
//!
//! # Modules
//!
//! - [`connection`] – the [`Link`] capability trait, the [`Connection`]
//!   supervisor with its fixed-interval reconnect loop, and the
//!   [`LinkSink`] that fans inbound payloads out on a Tokio broadcast
//!   channel.
//! - [`tcp`] – [`TcpClientLink`] (outbound socket) and [`TcpServerLink`]
//!   (listening socket accepting any number of peers).
//! - [`serial`] – [`SerialLink`] for local serial devices at 115200 baud.

pub mod connection;
pub mod serial;
pub mod tcp;

pub use connection::{Connection, Link, LinkSink, LinkState};
pub use serial::SerialLink;
pub use tcp::{TcpClientLink, TcpServerLink};
