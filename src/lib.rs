//! Contact Plan Manager Library
//!
//! Parses declarative contact plans (timed link-parameter windows between
//! node pairs) and drives them as a discrete-event schedule against a
//! link controller. The production controller shapes the veth links of an
//! emulation session with `tc netem`.

// Use mimalloc as the global allocator for tests (non-Windows only)
#[cfg(not(windows))]
#[cfg(test)]
#[global_allocator]
static ALLOC: mimalloc::MiMalloc = mimalloc::MiMalloc;

pub mod contact;
pub mod controller;
pub mod error;
pub mod plan;
pub mod scheduler;

// Test helpers module - available when test-internals feature is enabled
#[cfg(any(test, feature = "test-internals"))]
pub mod test_helpers;

#[cfg(test)]
pub mod tests;

// Re-export commonly used items
pub use contact::{Contact, ContactId, ContactState, NodeId};
pub use controller::{FULL_LOSS_PERCENT, LinkController, LinkId, NetemController};
pub use error::{Error, Result};
pub use plan::ContactPlan;
pub use scheduler::{RunOutcome, Scheduler};
