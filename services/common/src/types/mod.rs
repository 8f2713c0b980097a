//! Domain records exchanged with the FamVest backend

pub mod accounts;
pub mod lenient;
pub mod orders;
pub mod portfolio;
pub mod tick;

pub use accounts::*;
pub use orders::*;
pub use portfolio::*;
pub use tick::*;
