//! Squeeze Control - remote control client for Logitech Media Server
//!
//! Keeps one connection to the server's CLI (TCP port 9090), steers one
//! player on it and turns the server's push lines into typed events.
//!
//! This library provides:
//! - The wire codec and line parsers for the CLI protocol
//! - A session manager with connection generations and a serialized connect worker
//! - Observer and host-hook traits for presentation and power management
//! - A broadcast event bus for hosts that want more than one listener

pub mod bus;
pub mod config;
pub mod error;
pub mod hooks;
pub mod players;
pub mod protocol;
pub mod session;
pub mod sink;
pub mod state;

pub use error::{AddressError, ProtocolError};
pub use session::SessionManager;
pub use sink::{EventSink, ObserverToken};
