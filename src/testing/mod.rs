//! Testing Utilities Module
//!
//! In-memory stand-ins for the chains and the clock, plus assertions over
//! cross-chain ownership. Enabled for unit tests and behind the `testing`
//! feature for integration tests.
//!
//! ## Submodules
//!
//! - `sim` - Simulated asset/linker contracts and relay
//! - `clock` - Sleepers that return immediately
//! - `assertions` - Ownership assertions

pub mod assertions;
pub mod clock;
pub mod sim;

// Re-export commonly used items
pub use assertions::*;
pub use clock::RecordingSleeper;
pub use sim::{RelayMessage, SimNetwork, SimWorld};
