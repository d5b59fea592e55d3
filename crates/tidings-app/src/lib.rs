//! Sync engine for Tidings.
//!
//! Splits the engine into a pure state machine and the async shell that
//! drives it:
//!
//! - [`SyncEngine`]: consumes UI commands and [`EngineEvent`]s, produces
//!   [`EngineAction`]s. Owns the registry, message log and notification
//!   tracker.
//! - [`Runtime`]: single task that executes actions against an
//!   [`tidings_core::EventFeed`] and feeds results back.
//! - [`SyncHandle`]: cloneable async API for the UI.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod action;
mod config;
mod engine;
mod event;
mod runtime;

pub use action::EngineAction;
pub use config::{EngineConfig, RuntimeConfig};
pub use engine::{MAX_QUEUED_ERRORS, SyncEngine};
pub use event::EngineEvent;
pub use runtime::{Runtime, SyncHandle};
