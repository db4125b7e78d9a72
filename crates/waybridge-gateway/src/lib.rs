//! `waybridge-gateway` – HTTP surface for operators.
//!
//! A small hand-rolled HTTP/1.1 server exposing the four relay operations
//! over `GET` with query strings. Every response is human-readable text;
//! command failures are caught here and turned into a generic error
//! message, never a structured code.

pub mod server;

pub use server::GatewayServer;
