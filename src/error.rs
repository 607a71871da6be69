//! Error types surfaced by the protocol parsers and the session API.
//!
//! Transport failures are deliberately absent here: they only ever show up as
//! a `connected = false` transition on the event sink.

use thiserror::Error;

/// A `host[:port]` server address that could not be parsed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("server address is empty")]
    Empty,
    #[error("invalid port in server address '{0}'")]
    InvalidPort(String),
}

/// A push line that could not be interpreted
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("expected key/value separator in status token {index}: {token}")]
    StatusToken { index: usize, token: String },
    #[error("expected key/value separator in player list token: {0}")]
    PlayerListToken(String),
}
