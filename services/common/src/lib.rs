//! Common types and plumbing shared by the FamVest client services
//!
//! Holds the domain records exchanged with the backend, the STOMP wire codec,
//! the fan-out event bus, configuration, and the shared error taxonomy.

pub mod auth;
pub mod config;
pub mod constants;
pub mod errors;
pub mod event_bus;
pub mod notify;
pub mod stomp;
pub mod types;
pub mod wire;

pub use auth::*;
pub use config::*;
pub use constants::*;
pub use errors::*;
pub use event_bus::*;
pub use notify::*;
pub use types::*;
pub use wire::*;
