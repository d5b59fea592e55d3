//! Unread-notification tracking.
//!
//! Derives a per-channel unread counter from cardinality reports (the feed
//! reporting "channel X now holds N messages") and channel switches.
//!
//! # State machine
//!
//! Each channel is either [`NotificationState::Uninitialized`] or
//! [`NotificationState::Tracking`]:
//!
//! - The first cardinality report sets the baseline (`total_seen =
//!   last_known_total = N`) and never produces unread messages, so a channel
//!   that appears with history does not light up a stale badge.
//! - Later reports for the active channel move both totals to `N`; viewing a
//!   channel suppresses accrual.
//! - Later reports for an inactive channel add the positive delta against
//!   `last_known_total` to the counter. A non-positive delta leaves the
//!   counter alone; `last_known_total` always follows the report.
//! - Switching to a channel clears its counter and moves `total_seen` up to
//!   `last_known_total`.
//!
//! Channel states are disjoint: nothing here couples one channel's counter to
//! another's.

use std::collections::HashMap;

use crate::ChannelId;

/// Counters of a channel that has been observed at least once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Counters {
    /// Item count when the channel was last cleared (viewed).
    pub total_seen: u64,
    /// Item count at the most recent report.
    pub last_known_total: u64,
    /// Items inserted while the channel was inactive since it was last
    /// viewed.
    pub unread_count: u64,
}

/// Notification state of one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NotificationState {
    /// Known channel, no cardinality reported yet.
    #[default]
    Uninitialized,
    /// At least one cardinality report received.
    Tracking(Counters),
}

impl NotificationState {
    /// Unread count. Zero until the channel is tracked.
    pub fn unread_count(&self) -> u64 {
        match self {
            Self::Uninitialized => 0,
            Self::Tracking(counters) => counters.unread_count,
        }
    }
}

/// Which branch a cardinality report took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// First report for the channel; baseline recorded.
    Baseline,
    /// Report for the active channel; totals moved, nothing counted.
    Suppressed,
    /// Report for an inactive channel that grew by `delta`.
    Counted {
        /// Newly unread items.
        delta: u64,
    },
    /// Report for an inactive channel that did not grow.
    Unchanged,
}

/// Per-channel unread counters.
#[derive(Debug, Clone, Default)]
pub struct NotificationTracker {
    /// Channel ID → notification state
    states: HashMap<ChannelId, NotificationState>,
    /// Channel whose reports are not counted
    active: Option<ChannelId>,
}

impl NotificationTracker {
    /// Create a tracker with no channels and nothing active.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a channel seen for the first time.
    ///
    /// No-op for channels already known; their counters are kept.
    pub fn on_channel_first_seen(&mut self, channel_id: &ChannelId) {
        self.states.entry(channel_id.clone()).or_default();
    }

    /// Apply a cardinality report for `channel_id`.
    ///
    /// Channels never registered are created on the spot, so a report that
    /// races ahead of registration is still a baseline.
    pub fn on_cardinality_observed(
        &mut self,
        channel_id: &ChannelId,
        current_total: u64,
    ) -> Observation {
        let is_active = self.active.as_ref() == Some(channel_id);
        let state = self.states.entry(channel_id.clone()).or_default();

        match *state {
            NotificationState::Uninitialized => {
                *state = NotificationState::Tracking(Counters {
                    total_seen: current_total,
                    last_known_total: current_total,
                    unread_count: 0,
                });
                Observation::Baseline
            },
            NotificationState::Tracking(ref mut counters) if is_active => {
                counters.total_seen = current_total;
                counters.last_known_total = current_total;
                counters.unread_count = 0;
                Observation::Suppressed
            },
            NotificationState::Tracking(ref mut counters) => {
                let delta = current_total.saturating_sub(counters.last_known_total);
                counters.last_known_total = current_total;

                if delta > 0 {
                    counters.unread_count = counters.unread_count.saturating_add(delta);
                    Observation::Counted { delta }
                } else {
                    Observation::Unchanged
                }
            },
        }
    }

    /// Make `channel_id` the active channel and clear its badge.
    ///
    /// The previously active channel needs nothing: it starts accruing on
    /// its next report simply because it is no longer active. Clearing a
    /// channel that is not tracked yet is a no-op.
    pub fn on_channel_switch(&mut self, channel_id: &ChannelId) {
        self.active = Some(channel_id.clone());

        if let Some(NotificationState::Tracking(counters)) = self.states.get_mut(channel_id) {
            counters.unread_count = 0;
            counters.total_seen = counters.last_known_total;
        }
    }

    /// Unread count of a channel. Zero for unknown or untracked channels.
    pub fn unread_count(&self, channel_id: &ChannelId) -> u64 {
        self.states.get(channel_id).map_or(0, NotificationState::unread_count)
    }

    /// Sum of unread counts across all channels.
    pub fn total_unread(&self) -> u64 {
        self.states.values().map(NotificationState::unread_count).sum()
    }

    /// State of a channel. `None` if never seen.
    pub fn state(&self, channel_id: &ChannelId) -> Option<&NotificationState> {
        self.states.get(channel_id)
    }

    /// Channel whose reports are currently suppressed.
    pub fn active(&self) -> Option<&ChannelId> {
        self.active.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> ChannelId {
        ChannelId::new(s)
    }

    #[test]
    fn unread_scenario_from_baseline_to_clear() {
        let mut tracker = NotificationTracker::new();
        let c1 = id("C1");
        tracker.on_channel_switch(&id("C0"));
        tracker.on_channel_first_seen(&c1);

        assert_eq!(tracker.on_cardinality_observed(&c1, 3), Observation::Baseline);
        assert_eq!(tracker.unread_count(&c1), 0);

        assert_eq!(tracker.on_cardinality_observed(&c1, 5), Observation::Counted { delta: 2 });
        assert_eq!(tracker.unread_count(&c1), 2);

        tracker.on_channel_switch(&c1);
        assert_eq!(tracker.unread_count(&c1), 0);

        assert_eq!(tracker.on_cardinality_observed(&c1, 5), Observation::Suppressed);
        assert_eq!(tracker.unread_count(&c1), 0);
    }

    #[test]
    fn untracked_channel_reports_zero() {
        let mut tracker = NotificationTracker::new();
        tracker.on_channel_first_seen(&id("C1"));

        assert_eq!(tracker.state(&id("C1")), Some(&NotificationState::Uninitialized));
        assert_eq!(tracker.unread_count(&id("C1")), 0);
        assert_eq!(tracker.unread_count(&id("never-seen")), 0);
    }

    #[test]
    fn shrinking_total_does_not_count() {
        let mut tracker = NotificationTracker::new();
        let c1 = id("C1");
        tracker.on_cardinality_observed(&c1, 4);
        tracker.on_cardinality_observed(&c1, 6);

        assert_eq!(tracker.on_cardinality_observed(&c1, 5), Observation::Unchanged);
        assert_eq!(tracker.unread_count(&c1), 2);

        // Growth is measured from the last report, not the peak
        assert_eq!(tracker.on_cardinality_observed(&c1, 7), Observation::Counted { delta: 2 });
        assert_eq!(tracker.unread_count(&c1), 4);
    }

    #[test]
    fn switch_to_untracked_channel_is_noop_clear() {
        let mut tracker = NotificationTracker::new();
        tracker.on_channel_first_seen(&id("C1"));

        tracker.on_channel_switch(&id("C1"));
        assert_eq!(tracker.state(&id("C1")), Some(&NotificationState::Uninitialized));
        assert_eq!(tracker.active(), Some(&id("C1")));
    }

    #[test]
    fn previous_channel_accrues_after_switch() {
        let mut tracker = NotificationTracker::new();
        let (c1, c2) = (id("C1"), id("C2"));
        tracker.on_channel_switch(&c1);
        tracker.on_cardinality_observed(&c1, 1);
        tracker.on_cardinality_observed(&c1, 2);
        assert_eq!(tracker.unread_count(&c1), 0);

        tracker.on_channel_switch(&c2);
        tracker.on_cardinality_observed(&c1, 4);
        assert_eq!(tracker.unread_count(&c1), 2);
    }

    #[test]
    fn switch_clear_sets_total_seen() {
        let mut tracker = NotificationTracker::new();
        let c1 = id("C1");
        tracker.on_cardinality_observed(&c1, 1);
        tracker.on_cardinality_observed(&c1, 9);

        tracker.on_channel_switch(&c1);
        assert_eq!(
            tracker.state(&c1),
            Some(&NotificationState::Tracking(Counters {
                total_seen: 9,
                last_known_total: 9,
                unread_count: 0,
            }))
        );
    }

    #[test]
    fn channels_are_independent() {
        let mut tracker = NotificationTracker::new();
        let (c1, c2) = (id("C1"), id("C2"));
        tracker.on_cardinality_observed(&c1, 0);
        tracker.on_cardinality_observed(&c2, 0);

        tracker.on_cardinality_observed(&c1, 3);
        tracker.on_cardinality_observed(&c2, 1);

        assert_eq!(tracker.unread_count(&c1), 3);
        assert_eq!(tracker.unread_count(&c2), 1);
        assert_eq!(tracker.total_unread(), 4);

        tracker.on_channel_switch(&c1);
        assert_eq!(tracker.unread_count(&c2), 1);
    }

    #[test]
    fn empty_channel_counts_its_first_message() {
        let mut tracker = NotificationTracker::new();
        let c1 = id("C1");
        tracker.on_channel_switch(&id("C0"));
        tracker.on_channel_first_seen(&c1);

        // An empty channel is tracked with a baseline of zero
        assert_eq!(tracker.on_cardinality_observed(&c1, 0), Observation::Baseline);
        assert_eq!(
            tracker.state(&c1),
            Some(&NotificationState::Tracking(Counters::default()))
        );
        assert_eq!(tracker.unread_count(&c1), 0);

        assert_eq!(tracker.on_cardinality_observed(&c1, 1), Observation::Counted { delta: 1 });
        assert_eq!(tracker.unread_count(&c1), 1);
    }
}
