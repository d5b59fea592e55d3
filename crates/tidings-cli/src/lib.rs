//! Tidings demo session.
//!
//! Drives the sync engine against an in-memory feed with seeded traffic and
//! optional fault injection, then reports what the UI would show.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod error;
mod simulation;
mod summary;

pub use error::RuntimeError;
pub use simulation::{SimulationConfig, simulate};
pub use summary::{ChannelSummary, Summary, render};
