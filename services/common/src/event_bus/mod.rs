//! Fan-out event bus for live client data
//!
//! One bus per message kind (tick batches, order updates). Every listener
//! attached at publish time receives every message; there is no buffering for
//! late listeners and no backpressure on the publisher. Listeners that fall
//! behind the channel capacity skip the lost messages and keep going.
//!
//! Listeners may narrow what they see by supplying a key set at subscribe time
//! (see [`Keyed`]), so a view only wakes for the instruments it renders.

pub mod bus;
pub mod metrics;

use rustc_hash::FxHashSet;
use std::fmt::Debug;
use std::hash::Hash;

pub use bus::{FanOutBus, FilteredListener, Listener};
pub use metrics::{BusMetrics, BusMetricsSnapshot};

/// Core message trait for all bus messages
pub trait BusMessage: Send + Sync + Clone + Debug + 'static {
    /// Topic used for logging and metrics
    fn topic(&self) -> &str;
}

/// Messages that can be narrowed to a listener's key set
pub trait Keyed: BusMessage {
    /// Key the listener filters on
    type Key: Copy + Eq + Hash + Send + Sync + Debug + 'static;

    /// Restrict the message to `keys`
    ///
    /// Returns `None` when nothing in the message is of interest.
    fn narrow(&self, keys: &FxHashSet<Self::Key>) -> Option<Self>;
}
