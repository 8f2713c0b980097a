//! Live connection to the FamVest broker
//!
//! One STOMP session over a raw WebSocket carries two inbound queues, tick
//! batches and order updates, plus outbound subscribe/unsubscribe messages.

pub mod connection;
pub mod routing;

pub use connection::TransportConnection;
pub use routing::{FrameRouter, Route};
