//! Async runtime for the sync engine.
//!
//! The [`Runtime`] owns the [`SyncEngine`] and is its only caller. It runs as
//! a single task that drains three queues:
//! - Feed notifications pushed onto the engine's sink
//! - Snapshot load results from spawned load tasks
//! - Commands from [`SyncHandle`]s
//!
//! Feed notifications are always drained first so a query issued after an
//! insert observes it. Actions the engine returns are executed before the
//! next input is taken; subscribe outcomes are fed straight back in.

use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
};

use tidings_core::{
    ActiveChannel, Author, Channel, ChannelId, ChannelKind, EventFeed, FeedEvent, FeedSink,
    InsertionKey, Message, MessageBody, NewChannel, NewMessage, SyncError,
};
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
};

use crate::{EngineAction, EngineEvent, RuntimeConfig, SyncEngine};

type Reply<T> = oneshot::Sender<T>;

/// Requests sent from a [`SyncHandle`] to the runtime task.
enum Command {
    Attach {
        channel: Channel,
        reply: Reply<Result<(), SyncError>>,
    },
    Select {
        channel_id: ChannelId,
        kind: ChannelKind,
        reply: Reply<Result<(), SyncError>>,
    },
    SendMessage {
        channel_id: ChannelId,
        body: MessageBody,
        reply: Reply<Result<InsertionKey, SyncError>>,
    },
    CreateChannel { fields: NewChannel, reply: Reply<Result<ChannelId, SyncError>> },
    ActiveMessages { reply: Reply<Vec<Message>> },
    ChannelMessages { channel_id: ChannelId, reply: Reply<Vec<Message>> },
    Channels { reply: Reply<Vec<Channel>> },
    ActiveChannel { reply: Reply<Option<ActiveChannel>> },
    UnreadCount { channel_id: ChannelId, reply: Reply<u64> },
    TotalUnread { reply: Reply<u64> },
    TakeErrors { reply: Reply<Vec<SyncError>> },
    DetachAll { reply: Reply<()> },
    Shutdown { reply: Reply<()> },
}

/// Runtime that drives a [`SyncEngine`] against an [`EventFeed`].
///
/// Created together with its [`SyncHandle`] by [`Runtime::new`]; spawn
/// [`Runtime::run`] on a tokio runtime.
pub struct Runtime<F: EventFeed> {
    feed: Arc<F>,
    engine: SyncEngine,
    user: Author,
    commands: mpsc::Receiver<Command>,
    feed_sink: FeedSink,
    feed_events: mpsc::UnboundedReceiver<FeedEvent>,
    snapshot_sink: mpsc::UnboundedSender<EngineEvent>,
    snapshots: mpsc::UnboundedReceiver<EngineEvent>,
    /// Generation → in-flight load task
    loads: HashMap<u64, JoinHandle<()>>,
    /// Generation → callers waiting for it to settle
    waiters: HashMap<u64, Vec<Reply<Result<(), SyncError>>>>,
    revision: watch::Sender<u64>,
}

impl<F: EventFeed> Runtime<F> {
    /// Create a runtime and the handle that talks to it.
    pub fn new(feed: F, config: RuntimeConfig) -> (Self, SyncHandle) {
        let (command_tx, commands) = mpsc::channel(config.command_buffer.max(1));
        let (feed_sink, feed_events) = mpsc::unbounded_channel();
        let (snapshot_sink, snapshots) = mpsc::unbounded_channel();
        let (revision, changes) = watch::channel(0);

        let runtime = Self {
            feed: Arc::new(feed),
            engine: SyncEngine::new(config.engine),
            user: config.user,
            commands,
            feed_sink,
            feed_events,
            snapshot_sink,
            snapshots,
            loads: HashMap::new(),
            waiters: HashMap::new(),
            revision,
        };
        (runtime, SyncHandle { commands: command_tx, changes })
    }

    /// Run until [`SyncHandle::shutdown`] is called or every handle is
    /// dropped. Subscriptions are released before returning.
    pub async fn run(mut self) {
        tracing::info!("sync runtime started");
        let actions = self.engine.start();
        self.execute(actions);

        loop {
            tokio::select! {
                biased;

                Some(event) = self.feed_events.recv() => {
                    let actions = self.engine.handle(EngineEvent::Feed(event));
                    self.execute(actions);
                },
                Some(event) = self.snapshots.recv() => {
                    if let EngineEvent::SnapshotLoaded { generation, .. } = &event {
                        self.loads.remove(generation);
                    }
                    let actions = self.engine.handle(event);
                    self.execute(actions);
                },
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown { reply }) => {
                        self.teardown();
                        let _ = reply.send(());
                        break;
                    },
                    Some(command) => self.handle_command(command),
                    None => {
                        self.teardown();
                        break;
                    },
                },
            }
        }

        tracing::info!("sync runtime stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Attach { channel, reply } => {
                let channel_id = channel.id.clone();
                let actions = self.engine.attach_channel(channel);
                self.wait_for_settle(&channel_id, reply);
                self.execute(actions);
            },
            Command::Select { channel_id, kind, reply } => {
                match self.engine.switch_channel(&channel_id, kind) {
                    Ok(actions) => {
                        self.wait_for_settle(&channel_id, reply);
                        self.execute(actions);
                    },
                    Err(err) => {
                        let _ = reply.send(Err(err));
                    },
                }
            },
            Command::SendMessage { channel_id, body, reply } => {
                if let Err(err) = self.engine.validate_message(&channel_id, &body) {
                    let _ = reply.send(Err(err));
                    return;
                }
                let message = NewMessage { author: self.user.clone(), body };
                self.spawn_send(channel_id, message, reply);
            },
            Command::CreateChannel { fields, reply } => {
                if let Err(err) = fields.validate() {
                    let _ = reply.send(Err(err));
                    return;
                }
                self.spawn_create(fields, reply);
            },
            Command::ActiveMessages { reply } => {
                let _ = reply.send(self.engine.active_messages().to_vec());
            },
            Command::ChannelMessages { channel_id, reply } => {
                let _ = reply.send(self.engine.messages(&channel_id).to_vec());
            },
            Command::Channels { reply } => {
                let _ = reply.send(self.engine.channels().cloned().collect());
            },
            Command::ActiveChannel { reply } => {
                let _ = reply.send(self.engine.active_channel());
            },
            Command::UnreadCount { channel_id, reply } => {
                let _ = reply.send(self.engine.unread_count(&channel_id));
            },
            Command::TotalUnread { reply } => {
                let _ = reply.send(self.engine.total_unread());
            },
            Command::TakeErrors { reply } => {
                let _ = reply.send(self.engine.take_errors());
            },
            Command::DetachAll { reply } => {
                self.teardown();
                let _ = reply.send(());
            },
            Command::Shutdown { reply } => {
                // Intercepted by the run loop before dispatch
                self.teardown();
                let _ = reply.send(());
            },
        }
    }

    /// Reply once the channel's in-flight load settles, or now if none is.
    fn wait_for_settle(&mut self, channel_id: &ChannelId, reply: Reply<Result<(), SyncError>>) {
        match self.engine.loading_generation(channel_id) {
            Some(generation) => self.waiters.entry(generation).or_default().push(reply),
            None => {
                let _ = reply.send(Ok(()));
            },
        }
    }

    fn teardown(&mut self) {
        let actions = self.engine.detach_all();
        self.execute(actions);

        for (generation, task) in self.loads.drain() {
            tracing::debug!(generation, "aborting orphaned snapshot load");
            task.abort();
        }
    }

    /// Execute engine actions, feeding synchronous outcomes back in.
    fn execute(&mut self, actions: Vec<EngineAction>) {
        let mut pending = VecDeque::from(actions);
        let mut changed = false;

        while let Some(action) = pending.pop_front() {
            match action {
                EngineAction::Subscribe { watch } => {
                    let event = match self.feed.subscribe(&watch, self.feed_sink.clone()) {
                        Ok(handle) => {
                            tracing::debug!(%handle, ?watch, "subscribed");
                            EngineEvent::Subscribed { watch, handle }
                        },
                        Err(error) => EngineEvent::SubscribeFailed { watch, error },
                    };
                    pending.extend(self.engine.handle(event));
                },
                EngineAction::Unsubscribe { handle } => {
                    tracing::debug!(%handle, "unsubscribed");
                    self.feed.unsubscribe(handle);
                },
                EngineAction::LoadSnapshot { channel_id, generation } => {
                    self.spawn_load(channel_id, generation);
                },
                EngineAction::CancelSnapshot { channel_id, generation } => {
                    if let Some(task) = self.loads.remove(&generation) {
                        tracing::debug!(%channel_id, generation, "snapshot load aborted");
                        task.abort();
                    }
                },
                EngineAction::SnapshotSettled { generation, result, .. } => {
                    for reply in self.waiters.remove(&generation).unwrap_or_default() {
                        let _ = reply.send(result.clone());
                    }
                },
                EngineAction::Changed => changed = true,
            }
        }

        if changed {
            self.revision.send_modify(|revision| *revision += 1);
        }
    }

    fn spawn_load(&mut self, channel_id: ChannelId, generation: u64) {
        let feed = Arc::clone(&self.feed);
        let sink = self.snapshot_sink.clone();

        let task = tokio::spawn(async move {
            let result = feed.load_snapshot(&channel_id).await;
            let _ = sink.send(EngineEvent::SnapshotLoaded { channel_id, generation, result });
        });
        self.loads.insert(generation, task);
    }

    fn spawn_send(
        &self,
        channel_id: ChannelId,
        message: NewMessage,
        reply: Reply<Result<InsertionKey, SyncError>>,
    ) {
        let feed = Arc::clone(&self.feed);

        tokio::spawn(async move {
            let result = feed
                .push_message(&channel_id, message)
                .await
                .map_err(SyncError::from_write);
            match &result {
                Ok(key) => tracing::debug!(%channel_id, %key, "message sent"),
                Err(err) => tracing::warn!(%channel_id, %err, "send failed"),
            }
            let _ = reply.send(result);
        });
    }

    fn spawn_create(&self, fields: NewChannel, reply: Reply<Result<ChannelId, SyncError>>) {
        let feed = Arc::clone(&self.feed);

        tokio::spawn(async move {
            let result = feed.create_channel(fields).await.map_err(SyncError::from_write);
            match &result {
                Ok(channel_id) => tracing::info!(%channel_id, "channel created"),
                Err(err) => tracing::warn!(%err, "create channel failed"),
            }
            let _ = reply.send(result);
        });
    }
}

/// Cloneable UI-facing API of a running [`Runtime`].
///
/// Every method returns [`SyncError::Closed`] once the runtime has stopped.
#[derive(Clone)]
pub struct SyncHandle {
    commands: mpsc::Sender<Command>,
    changes: watch::Receiver<u64>,
}

impl SyncHandle {
    async fn request<T>(
        &self,
        command: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, SyncError> {
        let (reply, response) = oneshot::channel();
        self.commands.send(command(reply)).await.map_err(|_| SyncError::Closed)?;
        response.await.map_err(|_| SyncError::Closed)
    }

    /// Messages of the active channel in feed order.
    pub async fn active_channel_messages(&self) -> Result<Vec<Message>, SyncError> {
        self.request(|reply| Command::ActiveMessages { reply }).await
    }

    /// Messages of any channel in feed order. Empty when never loaded.
    pub async fn channel_messages(
        &self,
        channel_id: &ChannelId,
    ) -> Result<Vec<Message>, SyncError> {
        let channel_id = channel_id.clone();
        self.request(|reply| Command::ChannelMessages { channel_id, reply }).await
    }

    /// Known channels in first-seen order.
    pub async fn channels(&self) -> Result<Vec<Channel>, SyncError> {
        self.request(|reply| Command::Channels { reply }).await
    }

    /// Current selection, if any.
    pub async fn active_channel(&self) -> Result<Option<ActiveChannel>, SyncError> {
        self.request(|reply| Command::ActiveChannel { reply }).await
    }

    /// Unread count of a channel. Zero for unknown channels.
    pub async fn unread_count(&self, channel_id: &ChannelId) -> Result<u64, SyncError> {
        let channel_id = channel_id.clone();
        self.request(|reply| Command::UnreadCount { channel_id, reply }).await
    }

    /// Unread count across all channels, for an app-wide badge.
    pub async fn total_unread(&self) -> Result<u64, SyncError> {
        self.request(|reply| Command::TotalUnread { reply }).await
    }

    /// Select a public channel and wait for its history to load.
    ///
    /// # Errors
    ///
    /// - [`SyncError::NotFound`] if the channel is unknown
    /// - [`SyncError::FeedUnavailable`] if the history could not be loaded
    /// - [`SyncError::Cancelled`] if another selection superseded this one
    pub async fn select_channel(&self, channel_id: &ChannelId) -> Result<(), SyncError> {
        self.select(channel_id, ChannelKind::Public).await
    }

    /// Select an attached channel as a private conversation.
    ///
    /// Same semantics as [`SyncHandle::select_channel`].
    pub async fn select_private_channel(&self, channel_id: &ChannelId) -> Result<(), SyncError> {
        self.select(channel_id, ChannelKind::Private).await
    }

    async fn select(&self, channel_id: &ChannelId, kind: ChannelKind) -> Result<(), SyncError> {
        let channel_id = channel_id.clone();
        self.request(|reply| Command::Select { channel_id, kind, reply }).await?
    }

    /// Register a channel. If it is (or becomes) active, waits for its
    /// history to load. Attaching the active channel again retries a failed
    /// load.
    pub async fn attach_channel(&self, channel: Channel) -> Result<(), SyncError> {
        self.request(|reply| Command::Attach { channel, reply }).await?
    }

    /// Send a message as the configured user.
    ///
    /// The message shows up in the log when the feed delivers it back.
    pub async fn send_message(
        &self,
        channel_id: &ChannelId,
        body: MessageBody,
    ) -> Result<InsertionKey, SyncError> {
        let channel_id = channel_id.clone();
        self.request(|reply| Command::SendMessage { channel_id, body, reply }).await?
    }

    /// Create a channel. It appears in [`SyncHandle::channels`] once the
    /// channel list reports it.
    pub async fn create_channel(&self, fields: NewChannel) -> Result<ChannelId, SyncError> {
        self.request(|reply| Command::CreateChannel { fields, reply }).await?
    }

    /// Drain errors queued since the last call.
    pub async fn take_errors(&self) -> Result<Vec<SyncError>, SyncError> {
        self.request(|reply| Command::TakeErrors { reply }).await
    }

    /// Release every subscription. State stays readable.
    pub async fn detach_all(&self) -> Result<(), SyncError> {
        self.request(|reply| Command::DetachAll { reply }).await
    }

    /// Release every subscription and stop the runtime.
    pub async fn shutdown(&self) -> Result<(), SyncError> {
        self.request(|reply| Command::Shutdown { reply }).await
    }

    /// Revision counter, bumped on every observable state change.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.changes.clone()
    }
}
