//! Fault-injecting feed wrapper
//!
//! Wraps another [`EventFeed`] and fails a configurable fraction of snapshot
//! loads, subscriptions and writes. Failures are drawn from a seeded LCG, so
//! a chaos run replays exactly under the same seed.

#![allow(clippy::disallowed_types, reason = "Locking simple RNG state")]

use std::{
    future::Future,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use tidings_core::{
    ChannelId, EventFeed, FeedError, FeedSink, InsertionKey, NewChannel, NewMessage, RawEvent,
    SubscriptionHandle, Watch,
};

const INJECTED: &str = "chaotic failure injection";

/// Feed wrapper that randomly injects failures
///
/// `unsubscribe` always goes through: teardown must not be able to leak a
/// subscription.
#[derive(Clone)]
pub struct ChaoticFeed<F: EventFeed> {
    inner: F,
    /// Failure rate (0.0 = never fail, 1.0 = always fail)
    failure_rate: f64,
    rng: Arc<Mutex<ChaoticRng>>,
    operation_count: Arc<AtomicUsize>,
    injected_count: Arc<AtomicUsize>,
}

/// Linear congruential generator (Numerical Recipes constants).
struct ChaoticRng {
    state: u64,
}

impl ChaoticRng {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Next value in [0.0, 1.0)
    fn next(&mut self) -> f64 {
        const A: u64 = 1_664_525;
        const C: u64 = 1_013_904_223;
        const M: u64 = 1u64 << 32;

        self.state = (A.wrapping_mul(self.state).wrapping_add(C)) % M;
        (self.state as f64) / (M as f64)
    }
}

impl<F: EventFeed> ChaoticFeed<F> {
    /// Wrap `inner` with the default seed.
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn new(inner: F, failure_rate: f64) -> Self {
        Self::with_seed(inner, failure_rate, 0x1234_5678_9ABC_DEF0)
    }

    /// Wrap `inner` with an explicit seed for reproducible chaos.
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn with_seed(inner: F, failure_rate: f64, seed: u64) -> Self {
        assert!(
            (0.0..=1.0).contains(&failure_rate),
            "failure_rate must be between 0.0 and 1.0, got {failure_rate}"
        );

        Self {
            inner,
            failure_rate,
            rng: Arc::new(Mutex::new(ChaoticRng::new(seed))),
            operation_count: Arc::new(AtomicUsize::new(0)),
            injected_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Wrapped feed (for driving traffic and checking state after chaos).
    pub fn inner(&self) -> &F {
        &self.inner
    }

    /// Fallible operations attempted so far.
    pub fn operation_count(&self) -> usize {
        self.operation_count.load(Ordering::Relaxed)
    }

    /// Operations that were failed on purpose.
    pub fn injected_count(&self) -> usize {
        self.injected_count.load(Ordering::Relaxed)
    }

    /// Count an operation and decide whether it fails.
    fn should_fail(&self) -> bool {
        self.operation_count.fetch_add(1, Ordering::Relaxed);

        #[allow(clippy::expect_used)]
        let fail =
            self.rng.lock().expect("ChaoticRng mutex poisoned").next() < self.failure_rate;

        if fail {
            self.injected_count.fetch_add(1, Ordering::Relaxed);
        }
        fail
    }
}

impl<F: EventFeed> EventFeed for ChaoticFeed<F> {
    fn load_snapshot(
        &self,
        channel_id: &ChannelId,
    ) -> impl Future<Output = Result<Vec<RawEvent>, FeedError>> + Send {
        let fail = self.should_fail();
        let load = self.inner.load_snapshot(channel_id);

        async move {
            if fail {
                tracing::debug!("injecting snapshot failure");
                return Err(FeedError::Unavailable(INJECTED.to_string()));
            }
            load.await
        }
    }

    fn subscribe(&self, watch: &Watch, sink: FeedSink) -> Result<SubscriptionHandle, FeedError> {
        if self.should_fail() {
            tracing::debug!(?watch, "injecting subscribe failure");
            return Err(FeedError::Unavailable(INJECTED.to_string()));
        }
        self.inner.subscribe(watch, sink)
    }

    fn unsubscribe(&self, handle: SubscriptionHandle) {
        self.inner.unsubscribe(handle);
    }

    fn create_channel(
        &self,
        fields: NewChannel,
    ) -> impl Future<Output = Result<ChannelId, FeedError>> + Send {
        let fail = self.should_fail();
        let create = self.inner.create_channel(fields);

        async move {
            if fail {
                return Err(FeedError::WriteRejected(INJECTED.to_string()));
            }
            create.await
        }
    }

    fn push_message(
        &self,
        channel_id: &ChannelId,
        message: NewMessage,
    ) -> impl Future<Output = Result<InsertionKey, FeedError>> + Send {
        let fail = self.should_fail();
        let push = self.inner.push_message(channel_id, message);

        async move {
            if fail {
                return Err(FeedError::WriteRejected(INJECTED.to_string()));
            }
            push.await
        }
    }
}
