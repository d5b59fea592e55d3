//! End-of-run summary and its text rendering.

use std::fmt::Write as _;

use serde::Serialize;
use tidings_core::ChannelId;

/// Final state of one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelSummary {
    /// Channel identifier.
    pub id: ChannelId,
    /// Display name.
    pub name: String,
    /// Messages in the engine's log.
    pub messages: usize,
    /// Unread badge.
    pub unread: u64,
    /// Whether this channel was selected at the end.
    pub active: bool,
}

/// Final state of a simulation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    /// Channels in first-seen order.
    pub channels: Vec<ChannelSummary>,
    /// Unread count across all channels.
    pub total_unread: u64,
    /// Errors the engine queued for the UI.
    pub errors: Vec<String>,
    /// Feed operations failed on purpose.
    pub injected_failures: usize,
}

/// Render a summary as a plain-text table. The active channel is starred.
pub fn render(summary: &Summary) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "{:<12}{:>9}{:>7}", "channel", "messages", "unread");
    for channel in &summary.channels {
        let marker = if channel.active { " *" } else { "" };
        let _ = writeln!(
            out,
            "{:<12}{:>9}{:>7}{marker}",
            channel.name, channel.messages, channel.unread
        );
    }

    let _ = writeln!(out, "total unread: {}", summary.total_unread);
    let _ = writeln!(out, "injected failures: {}", summary.injected_failures);
    let _ = writeln!(out, "errors: {}", summary.errors.len());
    for error in &summary.errors {
        let _ = writeln!(out, "- {error}");
    }
    out
}
