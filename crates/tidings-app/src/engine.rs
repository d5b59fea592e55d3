//! Sync engine state machine.
//!
//! This module defines [`SyncEngine`], which owns the channel registry,
//! message log and notification tracker, and decides which subscriptions and
//! snapshot loads must exist. It never touches the feed: UI commands and
//! [`EngineEvent`]s go in, [`EngineAction`]s come out, and the runtime
//! executes them.
//!
//! # Subscriptions
//!
//! - One channel-list watch, started by [`SyncEngine::start`].
//! - One cardinality watch per attached channel, kept for the engine's
//!   lifetime so inactive channels accrue unread counts.
//! - One message watch, for the active channel only.
//!
//! # Snapshot loads
//!
//! Activating a channel subscribes its message watch first, then loads its
//! history under a fresh generation. Inserts that arrive while the load is in
//! flight are buffered and replayed through the dedup path once the snapshot
//! has been applied. A result whose generation is not the channel's current
//! one is discarded, so a switch away can never be overwritten by a late
//! load.

use std::collections::{HashMap, VecDeque};

use tidings_core::{
    ActiveChannel, Channel, ChannelId, ChannelKind, ChannelRegistry, FeedError, FeedEvent,
    Message, MessageBody, MessageLog, NotificationTracker, Observation, RawEvent,
    SubscriptionHandle, SyncError, Watch,
};

use crate::{EngineAction, EngineConfig, EngineEvent};

/// Errors kept for the UI before the oldest is dropped.
pub const MAX_QUEUED_ERRORS: usize = 32;

/// Lifecycle of one engine-owned subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Subscription {
    /// Requested, handle not known yet.
    Pending,
    /// Established.
    Live(SubscriptionHandle),
}

impl Subscription {
    fn handle(self) -> Option<SubscriptionHandle> {
        match self {
            Self::Pending => None,
            Self::Live(handle) => Some(handle),
        }
    }

    fn is(self, handle: SubscriptionHandle) -> bool {
        self == Self::Live(handle)
    }
}

#[derive(Debug, Clone)]
enum Phase {
    /// Snapshot in flight. Live inserts wait in `buffered`.
    Loading { generation: u64, buffered: Vec<RawEvent> },
    /// Snapshot applied; inserts go straight to the log.
    Live,
}

/// Message watch of the active channel.
#[derive(Debug, Clone)]
struct MessageWatch {
    channel_id: ChannelId,
    subscription: Subscription,
    phase: Phase,
}

impl MessageWatch {
    fn loading_generation(&self) -> Option<u64> {
        match self.phase {
            Phase::Loading { generation, .. } => Some(generation),
            Phase::Live => None,
        }
    }
}

/// Sync engine state machine.
///
/// Pure state machine that processes commands and events and produces
/// actions. No I/O dependencies - fully testable without a runtime.
#[derive(Debug, Clone)]
pub struct SyncEngine {
    config: EngineConfig,
    registry: ChannelRegistry,
    log: MessageLog,
    tracker: NotificationTracker,
    /// Kind of the active selection.
    active_kind: ChannelKind,
    /// Channel-list watch. `None` before `start` and after teardown.
    channel_list: Option<Subscription>,
    /// Channel ID → cardinality watch
    cardinality: HashMap<ChannelId, Subscription>,
    /// Message watch of the active channel. `None` when it is not syncing.
    messages: Option<MessageWatch>,
    next_generation: u64,
    /// Whether the first attach has happened.
    first_attach_seen: bool,
    /// Errors waiting for the UI. Distinct, at most `MAX_QUEUED_ERRORS`.
    errors: VecDeque<SyncError>,
}

impl SyncEngine {
    /// Create an engine with no channels and no subscriptions.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            registry: ChannelRegistry::new(),
            log: MessageLog::new(),
            tracker: NotificationTracker::new(),
            active_kind: ChannelKind::Public,
            channel_list: None,
            cardinality: HashMap::new(),
            messages: None,
            next_generation: 1,
            first_attach_seen: false,
            errors: VecDeque::new(),
        }
    }

    /// Subscribe to the channel list.
    ///
    /// No-op while the watch exists.
    pub fn start(&mut self) -> Vec<EngineAction> {
        if self.channel_list.is_some() {
            return vec![];
        }
        self.channel_list = Some(Subscription::Pending);
        vec![EngineAction::Subscribe { watch: Watch::Channels }]
    }

    /// Register a channel and make sure it is watched.
    ///
    /// New channels get a cardinality watch. The very first attached channel
    /// is selected when nothing is active and auto-selection is enabled. An
    /// active channel whose log is not syncing starts a snapshot load; this
    /// is how a failed load is retried.
    pub fn attach_channel(&mut self, channel: Channel) -> Vec<EngineAction> {
        let channel_id = channel.id.clone();
        let mut actions = Vec::new();

        if self.registry.add_channel(channel) {
            tracing::debug!(%channel_id, "channel attached");
            self.tracker.on_channel_first_seen(&channel_id);
            actions.push(EngineAction::Changed);
        }

        if !self.cardinality.contains_key(&channel_id) {
            self.cardinality.insert(channel_id.clone(), Subscription::Pending);
            let watch = Watch::Cardinality(channel_id.clone());
            actions.push(EngineAction::Subscribe { watch });
        }

        if !self.first_attach_seen {
            self.first_attach_seen = true;
            if self.config.auto_select_first && self.registry.active().is_none() {
                tracing::info!(%channel_id, "auto-selecting first channel");
                actions.extend(self.activate(&channel_id, ChannelKind::Public));
                return actions;
            }
        }

        if self.registry.is_active(&channel_id) && !self.is_syncing(&channel_id) {
            actions.extend(self.start_sync(&channel_id));
        }
        actions
    }

    /// Make `channel_id` the active channel.
    ///
    /// Re-selecting the active channel clears its badge and keeps its
    /// message watch. Selecting another channel releases the previous
    /// channel's message watch and cancels its in-flight load.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotFound`] if the channel was never attached.
    pub fn switch_channel(
        &mut self,
        channel_id: &ChannelId,
        kind: ChannelKind,
    ) -> Result<Vec<EngineAction>, SyncError> {
        if !self.registry.contains(channel_id) {
            return Err(SyncError::NotFound(channel_id.clone()));
        }

        if self.registry.is_active(channel_id) {
            self.active_kind = kind;
            self.tracker.on_channel_switch(channel_id);

            let mut actions = vec![EngineAction::Changed];
            if !self.is_syncing(channel_id) {
                actions.extend(self.start_sync(channel_id));
            }
            return Ok(actions);
        }

        Ok(self.activate(channel_id, kind))
    }

    /// Release every subscription and cancel in-flight loads.
    ///
    /// Registry, logs and counters stay readable.
    pub fn detach_all(&mut self) -> Vec<EngineAction> {
        let mut actions = self.release_messages();

        if let Some(handle) = self.channel_list.take().and_then(Subscription::handle) {
            actions.push(EngineAction::Unsubscribe { handle });
        }

        let mut cardinality: Vec<_> = self.cardinality.drain().collect();
        cardinality.sort_by(|(a, _), (b, _)| a.cmp(b));
        actions.extend(
            cardinality
                .into_iter()
                .filter_map(|(_, subscription)| subscription.handle())
                .map(|handle| EngineAction::Unsubscribe { handle }),
        );

        tracing::info!(released = actions.len(), "detached from feed");
        actions.push(EngineAction::Changed);
        actions
    }

    /// Process an event and return actions.
    pub fn handle(&mut self, event: EngineEvent) -> Vec<EngineAction> {
        match event {
            EngineEvent::Feed(event) => self.handle_feed(event),
            EngineEvent::Subscribed { watch, handle } => self.on_subscribed(&watch, handle),
            EngineEvent::SubscribeFailed { watch, error } => {
                tracing::warn!(?watch, %error, "subscribe failed");
                self.on_watch_failed(&watch, None, error)
            },
            EngineEvent::SnapshotLoaded { channel_id, generation, result } => {
                self.on_snapshot_loaded(&channel_id, generation, result)
            },
        }
    }

    /// Check that `body` may be sent to `channel_id`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotFound`] for unknown channels and
    /// [`SyncError::Invalid`] for blank bodies.
    pub fn validate_message(
        &self,
        channel_id: &ChannelId,
        body: &MessageBody,
    ) -> Result<(), SyncError> {
        if !self.registry.contains(channel_id) {
            return Err(SyncError::NotFound(channel_id.clone()));
        }
        body.validate()
    }

    /// Known channels in first-seen order.
    pub fn channels(&self) -> impl ExactSizeIterator<Item = &Channel> + '_ {
        self.registry.channels()
    }

    /// Messages of a channel in feed order. Empty when never loaded.
    pub fn messages(&self, channel_id: &ChannelId) -> &[Message] {
        self.log.messages(channel_id)
    }

    /// Messages of the active channel. Empty when nothing is active.
    pub fn active_messages(&self) -> &[Message] {
        match self.registry.active() {
            Some(channel_id) => self.log.messages(channel_id),
            None => &[],
        }
    }

    /// Current selection.
    pub fn active_channel(&self) -> Option<ActiveChannel> {
        self.registry
            .active()
            .map(|channel_id| ActiveChannel { id: channel_id.clone(), kind: self.active_kind })
    }

    /// Unread count of a channel. Zero for unknown channels.
    pub fn unread_count(&self, channel_id: &ChannelId) -> u64 {
        self.tracker.unread_count(channel_id)
    }

    /// Unread count across all channels.
    pub fn total_unread(&self) -> u64 {
        self.tracker.total_unread()
    }

    /// Generation of the in-flight snapshot load of `channel_id`, if any.
    pub fn loading_generation(&self, channel_id: &ChannelId) -> Option<u64> {
        self.messages
            .as_ref()
            .filter(|watch| &watch.channel_id == channel_id)
            .and_then(MessageWatch::loading_generation)
    }

    /// Whether `channel_id` has an applied snapshot and a live message watch.
    pub fn is_live(&self, channel_id: &ChannelId) -> bool {
        self.messages.as_ref().is_some_and(|watch| {
            &watch.channel_id == channel_id && matches!(watch.phase, Phase::Live)
        })
    }

    /// Drain errors queued for the UI, oldest first.
    ///
    /// An error equal to one already queued is not queued again, and past
    /// [`MAX_QUEUED_ERRORS`] the oldest entry is dropped.
    pub fn take_errors(&mut self) -> Vec<SyncError> {
        Vec::from(std::mem::take(&mut self.errors))
    }

    /// Whether the engine holds or is waiting for any subscription.
    pub fn is_attached(&self) -> bool {
        self.channel_list.is_some() || !self.cardinality.is_empty() || self.messages.is_some()
    }

    fn is_syncing(&self, channel_id: &ChannelId) -> bool {
        self.messages.as_ref().is_some_and(|watch| &watch.channel_id == channel_id)
    }

    fn activate(&mut self, channel_id: &ChannelId, kind: ChannelKind) -> Vec<EngineAction> {
        let mut actions = self.release_messages();

        if let Err(err) = self.registry.set_active(channel_id) {
            // Callers check membership first
            tracing::error!(%channel_id, %err, "activating unknown channel");
            return actions;
        }
        self.active_kind = kind;
        self.tracker.on_channel_switch(channel_id);
        tracing::info!(%channel_id, ?kind, "channel activated");

        actions.extend(self.start_sync(channel_id));
        actions.push(EngineAction::Changed);
        actions
    }

    fn start_sync(&mut self, channel_id: &ChannelId) -> Vec<EngineAction> {
        let generation = self.next_generation;
        self.next_generation += 1;

        self.messages = Some(MessageWatch {
            channel_id: channel_id.clone(),
            subscription: Subscription::Pending,
            phase: Phase::Loading { generation, buffered: Vec::new() },
        });
        tracing::debug!(%channel_id, generation, "starting snapshot load");

        vec![
            EngineAction::Subscribe { watch: Watch::Messages(channel_id.clone()) },
            EngineAction::LoadSnapshot { channel_id: channel_id.clone(), generation },
        ]
    }

    /// Drop the active channel's message watch, cancelling its load.
    fn release_messages(&mut self) -> Vec<EngineAction> {
        let Some(watch) = self.messages.take() else {
            return vec![];
        };

        let mut actions = Vec::new();
        if let Some(handle) = watch.subscription.handle() {
            actions.push(EngineAction::Unsubscribe { handle });
        }
        if let Some(generation) = watch.loading_generation() {
            tracing::debug!(channel_id = %watch.channel_id, generation, "cancelling snapshot load");
            actions.push(EngineAction::CancelSnapshot {
                channel_id: watch.channel_id.clone(),
                generation,
            });
            actions.push(EngineAction::SnapshotSettled {
                channel_id: watch.channel_id.clone(),
                generation,
                result: Err(SyncError::Cancelled(watch.channel_id)),
            });
        }
        actions
    }

    fn handle_feed(&mut self, event: FeedEvent) -> Vec<EngineAction> {
        match event {
            FeedEvent::ChannelAdded { subscription, channel } => {
                if !self.channel_list.is_some_and(|current| current.is(subscription)) {
                    tracing::trace!(%subscription, "dropping event from stale channel watch");
                    return vec![];
                }
                self.attach_channel(channel)
            },
            FeedEvent::Inserted { subscription, channel_id, event } => {
                self.on_inserted(subscription, channel_id, event)
            },
            FeedEvent::Cardinality { subscription, channel_id, total } => {
                let current = self.cardinality.get(&channel_id).copied();
                if !current.is_some_and(|current| current.is(subscription)) {
                    tracing::trace!(%subscription, %channel_id, "dropping stale cardinality");
                    return vec![];
                }
                match self.tracker.on_cardinality_observed(&channel_id, total) {
                    Observation::Counted { delta } => {
                        tracing::debug!(%channel_id, delta, total, "unread messages");
                        vec![EngineAction::Changed]
                    },
                    Observation::Baseline | Observation::Suppressed | Observation::Unchanged => {
                        vec![]
                    },
                }
            },
            FeedEvent::Error { subscription, watch, error } => {
                tracing::warn!(%subscription, ?watch, %error, "subscription failed");
                self.on_watch_failed(&watch, Some(subscription), error)
            },
        }
    }

    fn on_inserted(
        &mut self,
        subscription: SubscriptionHandle,
        channel_id: ChannelId,
        event: RawEvent,
    ) -> Vec<EngineAction> {
        let Some(watch) = self.messages.as_mut() else {
            return vec![];
        };
        if !watch.subscription.is(subscription) || watch.channel_id != channel_id {
            tracing::trace!(%subscription, %channel_id, "dropping insert from stale watch");
            return vec![];
        }

        match &mut watch.phase {
            Phase::Loading { buffered, .. } => {
                buffered.push(event);
                vec![]
            },
            Phase::Live => {
                let message = event.into_message(channel_id.clone());
                if self.log.append_live(&channel_id, message) {
                    vec![EngineAction::Changed]
                } else {
                    tracing::trace!(%channel_id, "duplicate insert ignored");
                    vec![]
                }
            },
        }
    }

    fn on_subscribed(&mut self, watch: &Watch, handle: SubscriptionHandle) -> Vec<EngineAction> {
        let slot = match watch {
            Watch::Channels => self.channel_list.as_mut(),
            Watch::Cardinality(channel_id) => self.cardinality.get_mut(channel_id),
            Watch::Messages(channel_id) => self
                .messages
                .as_mut()
                .filter(|current| &current.channel_id == channel_id)
                .map(|current| &mut current.subscription),
        };

        match slot {
            Some(slot) if *slot == Subscription::Pending => {
                *slot = Subscription::Live(handle);
                vec![]
            },
            _ => {
                tracing::debug!(%handle, ?watch, "releasing unwanted subscription");
                vec![EngineAction::Unsubscribe { handle }]
            },
        }
    }

    /// A watch died, either at subscribe time (`handle` is `None`) or later.
    fn on_watch_failed(
        &mut self,
        watch: &Watch,
        handle: Option<SubscriptionHandle>,
        error: FeedError,
    ) -> Vec<EngineAction> {
        let owns = |current: Subscription| match handle {
            Some(handle) => current.is(handle),
            None => current == Subscription::Pending,
        };

        match watch {
            Watch::Channels => {
                if !self.channel_list.is_some_and(owns) {
                    return vec![];
                }
                self.channel_list = None;
                self.report(SyncError::ChannelListUnavailable(error.to_string()));
                vec![EngineAction::Changed]
            },
            Watch::Cardinality(channel_id) => {
                if !self.cardinality.get(channel_id).copied().is_some_and(owns) {
                    return vec![];
                }
                self.cardinality.remove(channel_id);
                self.report(SyncError::from_feed(channel_id, error));
                vec![EngineAction::Changed]
            },
            Watch::Messages(channel_id) => {
                let current = self.messages.as_ref().is_some_and(|watch| {
                    &watch.channel_id == channel_id && owns(watch.subscription)
                });
                if !current {
                    return vec![];
                }
                self.fail_sync(channel_id, error)
            },
        }
    }

    fn on_snapshot_loaded(
        &mut self,
        channel_id: &ChannelId,
        generation: u64,
        result: Result<Vec<RawEvent>, FeedError>,
    ) -> Vec<EngineAction> {
        if self.loading_generation(channel_id) != Some(generation) {
            tracing::debug!(%channel_id, generation, "discarding stale snapshot");
            return vec![];
        }

        let events = match result {
            Ok(events) => events,
            Err(error) => {
                tracing::warn!(%channel_id, generation, %error, "snapshot load failed");
                return self.fail_sync(channel_id, error);
            },
        };

        let Some(watch) = self.messages.as_mut() else {
            return vec![];
        };
        let buffered = match std::mem::replace(&mut watch.phase, Phase::Live) {
            Phase::Loading { buffered, .. } => buffered,
            Phase::Live => Vec::new(),
        };

        let kept = self.log.load_snapshot(
            channel_id,
            events.into_iter().map(|event| event.into_message(channel_id.clone())),
        );
        let replayed = buffered
            .into_iter()
            .filter(|event| {
                self.log.append_live(channel_id, event.clone().into_message(channel_id.clone()))
            })
            .count();
        let total = self.log.len(channel_id);
        tracing::info!(%channel_id, generation, kept, replayed, total, "snapshot applied");

        vec![
            EngineAction::SnapshotSettled {
                channel_id: channel_id.clone(),
                generation,
                result: Ok(()),
            },
            EngineAction::Changed,
        ]
    }

    /// Tear down the active channel's sync after a feed failure.
    ///
    /// A failed load leaves the log empty. A watch that dies after the
    /// snapshot was applied keeps the log; re-attaching resyncs it.
    fn fail_sync(&mut self, channel_id: &ChannelId, error: FeedError) -> Vec<EngineAction> {
        let Some(watch) = self.messages.take() else {
            return vec![];
        };

        let mut actions = Vec::new();
        if let Some(handle) = watch.subscription.handle() {
            actions.push(EngineAction::Unsubscribe { handle });
        }

        let err = SyncError::from_feed(channel_id, error);
        if let Some(generation) = watch.loading_generation() {
            self.log.load_snapshot(channel_id, std::iter::empty());
            actions.push(EngineAction::CancelSnapshot {
                channel_id: channel_id.clone(),
                generation,
            });
            actions.push(EngineAction::SnapshotSettled {
                channel_id: channel_id.clone(),
                generation,
                result: Err(err.clone()),
            });
        }
        self.report(err);

        actions.push(EngineAction::Changed);
        actions
    }

    fn report(&mut self, err: SyncError) {
        if self.errors.contains(&err) {
            tracing::debug!(error = %err, "sync error already queued");
            return;
        }
        if self.errors.len() >= MAX_QUEUED_ERRORS
            && let Some(dropped) = self.errors.pop_front()
        {
            tracing::debug!(error = %dropped, "error queue full, dropping oldest");
        }

        tracing::warn!(error = %err, "sync error queued");
        self.errors.push_back(err);
    }
}

#[cfg(test)]
mod tests {
    use tidings_core::{Author, Creator};

    use super::*;

    fn channel(id: &str) -> Channel {
        Channel {
            id: id.into(),
            name: format!("#{id}"),
            details: String::new(),
            created_by: Creator { name: "ada".into(), avatar: String::new() },
        }
    }

    fn raw(key: &str) -> RawEvent {
        RawEvent {
            key: key.into(),
            timestamp: 0,
            author: Author { id: "u1".into(), name: "ada".into(), avatar: String::new() },
            body: MessageBody::Text(format!("body {key}")),
        }
    }

    fn keys(messages: &[Message]) -> Vec<&str> {
        messages.iter().map(|m| m.key.as_str()).collect()
    }

    /// Acknowledge every subscribe with consecutive handles.
    fn ack(engine: &mut SyncEngine, actions: &[EngineAction], next: &mut u64) -> Vec<EngineAction> {
        let mut follow_up = Vec::new();
        for action in actions {
            if let EngineAction::Subscribe { watch } = action {
                let handle = SubscriptionHandle::new(*next);
                *next += 1;
                follow_up.extend(
                    engine.handle(EngineEvent::Subscribed { watch: watch.clone(), handle }),
                );
            }
        }
        follow_up
    }

    fn snapshot_generation(actions: &[EngineAction]) -> Option<u64> {
        actions.iter().find_map(|action| match action {
            EngineAction::LoadSnapshot { generation, .. } => Some(*generation),
            _ => None,
        })
    }

    fn handle_for(engine: &SyncEngine, channel_id: &str) -> SubscriptionHandle {
        engine
            .messages
            .as_ref()
            .filter(|watch| watch.channel_id.as_str() == channel_id)
            .and_then(|watch| watch.subscription.handle())
            .unwrap()
    }

    #[test]
    fn first_attach_auto_selects_and_subscribes_before_loading() {
        let mut engine = SyncEngine::new(EngineConfig::default());
        let actions = engine.attach_channel(channel("c1"));

        let subscribe = actions
            .iter()
            .position(|a| matches!(a, EngineAction::Subscribe { watch: Watch::Messages(_) }))
            .unwrap();
        let load =
            actions.iter().position(|a| matches!(a, EngineAction::LoadSnapshot { .. })).unwrap();
        assert!(subscribe < load);
        let cardinality = Watch::Cardinality("c1".into());
        assert!(actions.contains(&EngineAction::Subscribe { watch: cardinality }));
        assert_eq!(engine.active_channel().map(|a| a.id), Some("c1".into()));
    }

    #[test]
    fn auto_select_can_be_disabled() {
        let mut engine = SyncEngine::new(EngineConfig { auto_select_first: false });
        let actions = engine.attach_channel(channel("c1"));

        assert!(engine.active_channel().is_none());
        assert!(snapshot_generation(&actions).is_none());
    }

    #[test]
    fn only_the_first_attach_auto_selects() {
        let mut engine = SyncEngine::new(EngineConfig::default());
        engine.attach_channel(channel("c1"));
        engine.attach_channel(channel("c2"));

        assert_eq!(engine.active_channel().map(|a| a.id), Some("c1".into()));
    }

    #[test]
    fn inserts_during_load_are_replayed_after_snapshot() {
        let mut engine = SyncEngine::new(EngineConfig::default());
        let mut next = 1;
        let actions = engine.attach_channel(channel("c1"));
        ack(&mut engine, &actions, &mut next);
        let generation = snapshot_generation(&actions).unwrap();
        let handle = handle_for(&engine, "c1");

        // k2 lands after the snapshot was read, k1 is in both
        for key in ["k1", "k2"] {
            engine.handle(EngineEvent::Feed(FeedEvent::Inserted {
                subscription: handle,
                channel_id: "c1".into(),
                event: raw(key),
            }));
        }
        assert!(engine.messages(&"c1".into()).is_empty());

        let actions = engine.handle(EngineEvent::SnapshotLoaded {
            channel_id: "c1".into(),
            generation,
            result: Ok(vec![raw("k0"), raw("k1")]),
        });

        assert_eq!(keys(engine.messages(&"c1".into())), ["k0", "k1", "k2"]);
        assert!(engine.is_live(&"c1".into()));
        assert!(actions.contains(&EngineAction::SnapshotSettled {
            channel_id: "c1".into(),
            generation,
            result: Ok(()),
        }));
    }

    #[test]
    fn failed_snapshot_leaves_empty_log_and_queues_error() {
        let mut engine = SyncEngine::new(EngineConfig::default());
        let mut next = 1;
        let actions = engine.attach_channel(channel("c1"));
        ack(&mut engine, &actions, &mut next);
        let generation = snapshot_generation(&actions).unwrap();
        let handle = handle_for(&engine, "c1");

        let actions = engine.handle(EngineEvent::SnapshotLoaded {
            channel_id: "c1".into(),
            generation,
            result: Err(FeedError::Unavailable("offline".into())),
        });

        assert!(engine.messages(&"c1".into()).is_empty());
        assert!(engine.loading_generation(&"c1".into()).is_none());
        assert!(actions.contains(&EngineAction::Unsubscribe { handle }));
        assert_eq!(
            engine.take_errors(),
            [SyncError::FeedUnavailable { channel_id: "c1".into(), reason: "offline".into() }]
        );
        assert!(engine.take_errors().is_empty());
    }

    #[test]
    fn repeated_errors_are_queued_once() {
        let mut engine = SyncEngine::new(EngineConfig::default());
        let outage = SyncError::FeedUnavailable { channel_id: "c1".into(), reason: "down".into() };

        engine.report(outage.clone());
        engine.report(SyncError::NotFound("c2".into()));
        engine.report(outage.clone());

        assert_eq!(engine.take_errors(), [outage, SyncError::NotFound("c2".into())]);
    }

    #[test]
    fn error_queue_drops_oldest_when_full() {
        let mut engine = SyncEngine::new(EngineConfig::default());
        for n in 0..MAX_QUEUED_ERRORS + 3 {
            engine.report(SyncError::NotFound(format!("c{n}").into()));
        }

        let errors = engine.take_errors();
        assert_eq!(errors.len(), MAX_QUEUED_ERRORS);
        assert_eq!(errors[0], SyncError::NotFound("c3".into()));
        assert_eq!(
            errors.last(),
            Some(&SyncError::NotFound(format!("c{}", MAX_QUEUED_ERRORS + 2).into()))
        );
    }

    #[test]
    fn reattach_retries_failed_load() {
        let mut engine = SyncEngine::new(EngineConfig::default());
        let actions = engine.attach_channel(channel("c1"));
        let generation = snapshot_generation(&actions).unwrap();
        engine.handle(EngineEvent::SnapshotLoaded {
            channel_id: "c1".into(),
            generation,
            result: Err(FeedError::Unavailable("offline".into())),
        });

        let retry = engine.attach_channel(channel("c1"));
        let second = snapshot_generation(&retry).unwrap();
        assert!(second > generation);
    }

    #[test]
    fn switch_cancels_inflight_load_and_discards_late_result() {
        let mut engine = SyncEngine::new(EngineConfig::default());
        let mut next = 1;
        let actions = engine.attach_channel(channel("c1"));
        ack(&mut engine, &actions, &mut next);
        let generation = snapshot_generation(&actions).unwrap();
        let actions = engine.attach_channel(channel("c2"));
        ack(&mut engine, &actions, &mut next);

        let actions = engine.switch_channel(&"c2".into(), ChannelKind::Public).unwrap();
        let cancel = EngineAction::CancelSnapshot { channel_id: "c1".into(), generation };
        assert!(actions.contains(&cancel));
        assert!(actions.contains(&EngineAction::SnapshotSettled {
            channel_id: "c1".into(),
            generation,
            result: Err(SyncError::Cancelled("c1".into())),
        }));

        let late = engine.handle(EngineEvent::SnapshotLoaded {
            channel_id: "c1".into(),
            generation,
            result: Ok(vec![raw("k1")]),
        });
        assert!(late.is_empty());
        assert!(engine.messages(&"c1".into()).is_empty());
    }

    #[test]
    fn switch_to_unknown_channel_is_not_found() {
        let mut engine = SyncEngine::new(EngineConfig::default());
        let err = engine.switch_channel(&"nope".into(), ChannelKind::Public).unwrap_err();
        assert_eq!(err, SyncError::NotFound("nope".into()));
    }

    #[test]
    fn reselecting_active_channel_keeps_watch() {
        let mut engine = SyncEngine::new(EngineConfig::default());
        let mut next = 1;
        let actions = engine.attach_channel(channel("c1"));
        ack(&mut engine, &actions, &mut next);
        let generation = snapshot_generation(&actions).unwrap();
        engine.handle(EngineEvent::SnapshotLoaded {
            channel_id: "c1".into(),
            generation,
            result: Ok(vec![]),
        });

        let actions = engine.switch_channel(&"c1".into(), ChannelKind::Private).unwrap();
        assert_eq!(actions, [EngineAction::Changed]);
        assert_eq!(engine.active_channel().map(|a| a.kind), Some(ChannelKind::Private));
    }

    #[test]
    fn stale_handles_are_ignored() {
        let mut engine = SyncEngine::new(EngineConfig::default());
        let mut next = 1;
        let actions = engine.attach_channel(channel("c1"));
        ack(&mut engine, &actions, &mut next);
        let generation = snapshot_generation(&actions).unwrap();
        engine.handle(EngineEvent::SnapshotLoaded {
            channel_id: "c1".into(),
            generation,
            result: Ok(vec![]),
        });

        let actions = engine.handle(EngineEvent::Feed(FeedEvent::Inserted {
            subscription: SubscriptionHandle::new(999),
            channel_id: "c1".into(),
            event: raw("k1"),
        }));
        assert!(actions.is_empty());
        assert!(engine.messages(&"c1".into()).is_empty());

        let actions = engine.handle(EngineEvent::Feed(FeedEvent::Cardinality {
            subscription: SubscriptionHandle::new(999),
            channel_id: "c1".into(),
            total: 10,
        }));
        assert!(actions.is_empty());
    }

    #[test]
    fn late_subscription_for_unwanted_watch_is_released() {
        let mut engine = SyncEngine::new(EngineConfig::default());
        let handle = SubscriptionHandle::new(7);

        let watch = Watch::Messages("c1".into());
        let actions = engine.handle(EngineEvent::Subscribed { watch, handle });
        assert_eq!(actions, [EngineAction::Unsubscribe { handle }]);
    }

    #[test]
    fn subscribe_failure_fails_the_load() {
        let mut engine = SyncEngine::new(EngineConfig::default());
        let actions = engine.attach_channel(channel("c1"));
        let generation = snapshot_generation(&actions).unwrap();

        let actions = engine.handle(EngineEvent::SubscribeFailed {
            watch: Watch::Messages("c1".into()),
            error: FeedError::Unavailable("refused".into()),
        });

        let cancel = EngineAction::CancelSnapshot { channel_id: "c1".into(), generation };
        assert!(actions.contains(&cancel));
        assert!(matches!(engine.take_errors().as_slice(), [SyncError::FeedUnavailable { .. }]));
    }

    #[test]
    fn detach_all_releases_every_handle() {
        let mut engine = SyncEngine::new(EngineConfig::default());
        let mut next = 1;
        let actions = engine.start();
        ack(&mut engine, &actions, &mut next);
        for id in ["c1", "c2"] {
            let actions = engine.attach_channel(channel(id));
            ack(&mut engine, &actions, &mut next);
        }
        assert!(engine.is_attached());

        let released: Vec<_> = engine
            .detach_all()
            .into_iter()
            .filter_map(|action| match action {
                EngineAction::Unsubscribe { handle } => Some(handle.get()),
                _ => None,
            })
            .collect();

        // channel list, two cardinality watches, one message watch
        assert_eq!(released.len(), 4);
        assert!(!engine.is_attached());
        assert_eq!(engine.channels().len(), 2);
    }

    #[test]
    fn validate_message_checks_channel_and_body() {
        let mut engine = SyncEngine::new(EngineConfig::default());
        engine.attach_channel(channel("c1"));

        assert_eq!(
            engine.validate_message(&"c9".into(), &MessageBody::Text("hi".into())),
            Err(SyncError::NotFound("c9".into()))
        );
        assert_eq!(
            engine.validate_message(&"c1".into(), &MessageBody::Text(" ".into())),
            Err(SyncError::invalid("message", "add a message"))
        );
        assert!(engine.validate_message(&"c1".into(), &MessageBody::Text("hi".into())).is_ok());
    }
}
