//! Mock servers for session integration testing
//!
//! These mock servers simulate the LMS CLI so the full connect, handshake
//! and push flow can be tested without a real server.

pub mod lms_cli;

pub use lms_cli::MockCliServer;
