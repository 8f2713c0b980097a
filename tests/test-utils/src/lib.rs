//! Shared test support for the FamVest client crates
//!
//! - recording doubles for the wire and notification seams
//! - an in-process STOMP broker speaking WebSocket, plus one that stalls
//! - factories and rstest fixtures for portfolio rows and ticks
//! - async wait helpers

pub mod broker;
pub mod factories;
pub mod fixtures;
pub mod helpers;
pub mod recorders;
pub mod stalling;

pub use broker::*;
pub use factories::*;
pub use fixtures::*;
pub use helpers::*;
pub use recorders::*;
pub use stalling::*;
