//! Event feed implementations for Tidings.
//!
//! - [`MemoryFeed`]: in-process feed with deterministic keys and timestamps,
//!   used by tests and the demo binary
//! - [`ChaoticFeed`]: wrapper that injects seeded failures into any feed

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod chaotic;
mod memory;

pub use chaotic::ChaoticFeed;
pub use memory::{MemoryFeed, MemoryFeedConfig};
