#![allow(clippy::disallowed_types, reason = "Synchronous in-memory operations only")]

use std::{
    collections::{BTreeMap, HashMap},
    future::{self, Future},
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use tidings_core::{
    Channel, ChannelId, EventFeed, FeedError, FeedEvent, FeedSink, InsertionKey, NewChannel,
    NewMessage, RawEvent, SubscriptionHandle, Watch,
};

/// Behavior knobs for [`MemoryFeed`].
#[derive(Debug, Clone)]
pub struct MemoryFeedConfig {
    /// Replay existing messages to new `Messages` subscribers, emulating the
    /// at-least-once redelivery of a reconnecting realtime database.
    pub replay_on_subscribe: bool,
    /// Delay before a snapshot load reads the log. The snapshot reflects the
    /// log at the end of the delay.
    pub snapshot_delay: Option<Duration>,
    /// Timestamp assigned to the first message, in milliseconds.
    pub clock_start_millis: i64,
    /// Clock advance per message, in milliseconds.
    pub clock_step_millis: i64,
}

impl Default for MemoryFeedConfig {
    fn default() -> Self {
        Self {
            replay_on_subscribe: false,
            snapshot_delay: None,
            clock_start_millis: 1_700_000_000_000,
            clock_step_millis: 1_000,
        }
    }
}

/// In-memory event feed for testing, simulation and the demo binary
///
/// Channels and messages live in a `Vec`/`HashMap` behind an
/// `Arc<Mutex<..>>`, so clones share one feed. Keys and timestamps are
/// assigned from counters, which makes runs reproducible. Notifications are
/// pushed synchronously while the lock is held, in subscription order.
#[derive(Clone, Default)]
pub struct MemoryFeed {
    inner: Arc<Mutex<MemoryFeedInner>>,
}

#[derive(Default)]
struct MemoryFeedInner {
    config: MemoryFeedConfig,

    /// Channels in creation order
    channels: Vec<Channel>,

    /// Messages per channel in feed order. Every known channel has an entry
    messages: HashMap<ChannelId, Vec<RawEvent>>,

    /// Live subscriptions, ordered by handle for deterministic delivery
    subscriptions: BTreeMap<SubscriptionHandle, Subscription>,

    next_subscription: u64,
    next_channel: u64,
    next_key: u64,
    clock_millis: i64,
}

struct Subscription {
    watch: Watch,
    sink: FeedSink,
}

impl MemoryFeedInner {
    fn channel_exists(&self, channel_id: &ChannelId) -> bool {
        self.messages.contains_key(channel_id)
    }

    fn cardinality(&self, channel_id: &ChannelId) -> u64 {
        self.messages.get(channel_id).map_or(0, |events| events.len() as u64)
    }

    fn add_channel(&mut self, channel: Channel) {
        if self.channel_exists(&channel.id) {
            return;
        }

        self.messages.insert(channel.id.clone(), Vec::new());
        self.channels.push(channel.clone());

        self.notify(
            |watch| matches!(watch, Watch::Channels),
            |subscription| FeedEvent::ChannelAdded { subscription, channel: channel.clone() },
        );
    }

    fn append(
        &mut self,
        channel_id: &ChannelId,
        message: NewMessage,
    ) -> Result<InsertionKey, FeedError> {
        if !self.channel_exists(channel_id) {
            return Err(FeedError::WriteRejected(format!("unknown channel {channel_id}")));
        }

        let key = InsertionKey::new(format!("m{:010}", self.next_key));
        self.next_key += 1;

        let timestamp = self.config.clock_start_millis + self.clock_millis;
        self.clock_millis += self.config.clock_step_millis;

        let event =
            RawEvent { key: key.clone(), timestamp, author: message.author, body: message.body };
        let events = self.messages.entry(channel_id.clone()).or_default();
        events.push(event.clone());
        let total = events.len() as u64;

        self.notify(
            |watch| matches!(watch, Watch::Messages(id) if id == channel_id),
            |subscription| FeedEvent::Inserted {
                subscription,
                channel_id: channel_id.clone(),
                event: event.clone(),
            },
        );
        self.notify(
            |watch| matches!(watch, Watch::Cardinality(id) if id == channel_id),
            |subscription| FeedEvent::Cardinality {
                subscription,
                channel_id: channel_id.clone(),
                total,
            },
        );

        Ok(key)
    }

    /// Push an event to every subscription matching `wants`.
    ///
    /// Subscriptions whose receiver is gone are dropped.
    fn notify(
        &mut self,
        wants: impl Fn(&Watch) -> bool,
        event: impl Fn(SubscriptionHandle) -> FeedEvent,
    ) {
        self.subscriptions.retain(|handle, subscription| {
            if !wants(&subscription.watch) {
                return true;
            }
            let delivered = subscription.sink.send(event(*handle)).is_ok();
            if !delivered {
                tracing::debug!(%handle, "dropping subscription with closed sink");
            }
            delivered
        });
    }

    /// Initial notifications a new subscription receives.
    fn initial_events(&self, handle: SubscriptionHandle, watch: &Watch) -> Vec<FeedEvent> {
        match watch {
            Watch::Channels => self
                .channels
                .iter()
                .map(|channel| FeedEvent::ChannelAdded {
                    subscription: handle,
                    channel: channel.clone(),
                })
                .collect(),
            Watch::Cardinality(channel_id) => vec![FeedEvent::Cardinality {
                subscription: handle,
                channel_id: channel_id.clone(),
                total: self.cardinality(channel_id),
            }],
            Watch::Messages(channel_id) if self.config.replay_on_subscribe => self
                .messages
                .get(channel_id)
                .into_iter()
                .flatten()
                .map(|event| FeedEvent::Inserted {
                    subscription: handle,
                    channel_id: channel_id.clone(),
                    event: event.clone(),
                })
                .collect(),
            Watch::Messages(_) => Vec::new(),
        }
    }
}

impl MemoryFeed {
    /// Create an empty feed with default behavior.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty feed with the given behavior.
    pub fn with_config(config: MemoryFeedConfig) -> Self {
        let inner = MemoryFeedInner { config, ..MemoryFeedInner::default() };
        Self { inner: Arc::new(Mutex::new(inner)) }
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned. This is acceptable for test
    /// code.
    #[allow(clippy::expect_used)]
    fn lock(&self) -> MutexGuard<'_, MemoryFeedInner> {
        self.inner.lock().expect("Mutex poisoned")
    }

    /// Create a channel with a feed-assigned id.
    pub fn create(&self, fields: NewChannel) -> ChannelId {
        let mut inner = self.lock();

        let id = ChannelId::new(format!("c{:04}", inner.next_channel));
        inner.next_channel += 1;

        let channel = Channel {
            id: id.clone(),
            name: fields.name,
            details: fields.details,
            created_by: fields.created_by,
        };
        inner.add_channel(channel);
        id
    }

    /// Append a message, as another client writing to the feed would.
    pub fn append(
        &self,
        channel_id: &ChannelId,
        message: NewMessage,
    ) -> Result<InsertionKey, FeedError> {
        self.lock().append(channel_id, message)
    }

    /// Re-send every stored message of a channel to its `Messages`
    /// subscribers, as a reconnecting feed would.
    pub fn redeliver(&self, channel_id: &ChannelId) {
        let mut inner = self.lock();
        let events = inner.messages.get(channel_id).cloned().unwrap_or_default();

        for event in events {
            inner.notify(
                |watch| matches!(watch, Watch::Messages(id) if id == channel_id),
                |subscription| FeedEvent::Inserted {
                    subscription,
                    channel_id: channel_id.clone(),
                    event: event.clone(),
                },
            );
        }
    }

    /// Fail a live subscription: push an error event and drop it.
    pub fn fail_subscription(&self, handle: SubscriptionHandle, reason: &str) {
        let mut inner = self.lock();
        if let Some(subscription) = inner.subscriptions.remove(&handle) {
            let _ = subscription.sink.send(FeedEvent::Error {
                subscription: handle,
                watch: subscription.watch,
                error: FeedError::Unavailable(reason.to_string()),
            });
        }
    }

    /// Handles of live subscriptions watching `watch`.
    pub fn subscriptions_for(&self, watch: &Watch) -> Vec<SubscriptionHandle> {
        self.lock()
            .subscriptions
            .iter()
            .filter(|(_, subscription)| &subscription.watch == watch)
            .map(|(handle, _)| *handle)
            .collect()
    }

    /// Number of live subscriptions.
    ///
    /// Useful for checking that teardown released everything.
    pub fn subscription_count(&self) -> usize {
        self.lock().subscriptions.len()
    }

    /// Number of messages stored for a channel.
    pub fn message_count(&self, channel_id: &ChannelId) -> usize {
        self.lock().cardinality(channel_id) as usize
    }

    /// Channels in creation order.
    pub fn channels(&self) -> Vec<Channel> {
        self.lock().channels.clone()
    }
}

impl EventFeed for MemoryFeed {
    fn load_snapshot(
        &self,
        channel_id: &ChannelId,
    ) -> impl Future<Output = Result<Vec<RawEvent>, FeedError>> + Send {
        let feed = self.clone();
        let channel_id = channel_id.clone();
        let delay = self.lock().config.snapshot_delay;

        async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            let events = feed.lock().messages.get(&channel_id).cloned().unwrap_or_default();
            Ok(events)
        }
    }

    fn subscribe(&self, watch: &Watch, sink: FeedSink) -> Result<SubscriptionHandle, FeedError> {
        let mut inner = self.lock();

        let handle = SubscriptionHandle::new(inner.next_subscription);
        inner.next_subscription += 1;

        for event in inner.initial_events(handle, watch) {
            if sink.send(event).is_err() {
                return Err(FeedError::Unavailable("subscriber sink is closed".to_string()));
            }
        }

        inner.subscriptions.insert(handle, Subscription { watch: watch.clone(), sink });
        Ok(handle)
    }

    fn unsubscribe(&self, handle: SubscriptionHandle) {
        self.lock().subscriptions.remove(&handle);
    }

    fn create_channel(
        &self,
        fields: NewChannel,
    ) -> impl Future<Output = Result<ChannelId, FeedError>> + Send {
        future::ready(Ok(self.create(fields)))
    }

    fn push_message(
        &self,
        channel_id: &ChannelId,
        message: NewMessage,
    ) -> impl Future<Output = Result<InsertionKey, FeedError>> + Send {
        future::ready(self.append(channel_id, message))
    }
}
