//! Property-based tests for NotificationTracker
//!
//! These tests verify the unread-counter laws for arbitrary cardinality
//! sequences and arbitrary interleavings across channels.

use proptest::prelude::*;
use tidings_core::{ChannelId, NotificationState, NotificationTracker};

/// Operation applied to a tracker with a handful of channels.
#[derive(Debug, Clone)]
enum Op {
    Observe { channel: u8, total: u64 },
    Switch { channel: u8 },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0u8..4, 0u64..200).prop_map(|(channel, total)| Op::Observe { channel, total }),
        1 => (0u8..4).prop_map(|channel| Op::Switch { channel }),
    ]
}

fn channel(n: u8) -> ChannelId {
    ChannelId::new(format!("c{n}"))
}

fn sum_of_positive_deltas(totals: &[u64]) -> u64 {
    totals.windows(2).map(|w| w[1].saturating_sub(w[0])).sum()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Property: unread equals the sum of positive deltas on a channel that
    /// is never active
    #[test]
    fn prop_unread_is_sum_of_positive_deltas(totals in prop::collection::vec(0u64..1000, 1..40)) {
        let mut tracker = NotificationTracker::new();
        let c1 = channel(1);
        tracker.on_channel_switch(&channel(0));

        for total in &totals {
            tracker.on_cardinality_observed(&c1, *total);
        }

        prop_assert_eq!(tracker.unread_count(&c1), sum_of_positive_deltas(&totals));
    }

    /// Property: switching to a channel always clears its badge
    #[test]
    fn prop_switch_clears_unread(totals in prop::collection::vec(0u64..1000, 0..40)) {
        let mut tracker = NotificationTracker::new();
        let c1 = channel(1);

        for total in &totals {
            tracker.on_cardinality_observed(&c1, *total);
        }

        tracker.on_channel_switch(&c1);
        prop_assert_eq!(tracker.unread_count(&c1), 0);
    }

    /// Property: the active channel never shows unread messages
    #[test]
    fn prop_active_channel_has_no_unread(ops in prop::collection::vec(op_strategy(), 0..100)) {
        let mut tracker = NotificationTracker::new();

        for op in ops {
            match op {
                Op::Observe { channel: n, total } => {
                    tracker.on_cardinality_observed(&channel(n), total);
                },
                Op::Switch { channel: n } => tracker.on_channel_switch(&channel(n)),
            }

            if let Some(active) = tracker.active().cloned() {
                prop_assert_eq!(tracker.unread_count(&active), 0);
            }
        }
    }

    /// Property: reports for other channels never change a channel's counter
    #[test]
    fn prop_channels_are_independent(
        own in prop::collection::vec(0u64..1000, 1..20),
        noise in prop::collection::vec((2u8..4, 0u64..1000), 0..40),
    ) {
        let mut isolated = NotificationTracker::new();
        let mut interleaved = NotificationTracker::new();
        let c1 = channel(1);

        let mut noise = noise.into_iter();
        for total in own {
            isolated.on_cardinality_observed(&c1, total);
            interleaved.on_cardinality_observed(&c1, total);

            if let Some((n, other_total)) = noise.next() {
                interleaved.on_cardinality_observed(&channel(n), other_total);
            }
        }

        prop_assert_eq!(isolated.unread_count(&c1), interleaved.unread_count(&c1));
        prop_assert_eq!(isolated.state(&c1), interleaved.state(&c1));
    }

    /// Property: the first report is always a zero-unread baseline
    #[test]
    fn prop_first_report_is_baseline(total in any::<u64>(), active in any::<bool>()) {
        let mut tracker = NotificationTracker::new();
        let c1 = channel(1);
        tracker.on_channel_first_seen(&c1);
        if active {
            tracker.on_channel_switch(&c1);
        }

        tracker.on_cardinality_observed(&c1, total);

        prop_assert!(matches!(tracker.state(&c1), Some(NotificationState::Tracking(_))));
        prop_assert_eq!(tracker.unread_count(&c1), 0);
    }
}
