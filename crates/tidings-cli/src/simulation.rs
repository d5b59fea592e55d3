//! Simulated chat session.
//!
//! Other users post into random channels of an in-memory feed while a local
//! user hops between channels and occasionally replies. Traffic is drawn
//! from a seeded ChaCha RNG and feed failures from the chaotic wrapper's
//! seeded LCG, so a seed names a session.

use std::time::Duration;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tidings_app::{EngineConfig, Runtime, RuntimeConfig};
use tidings_core::{Author, ChannelId, Creator, MessageBody, NewChannel, NewMessage, SyncError};
use tidings_feed::{ChaoticFeed, MemoryFeed, MemoryFeedConfig};

use crate::{ChannelSummary, RuntimeError, Summary};

const CHANNEL_NAMES: [&str; 6] = ["general", "random", "dev", "ops", "design", "support"];

/// Probability that the local user switches channel after a message.
const SWITCH_PROBABILITY: f64 = 0.15;

/// Probability that the local user replies after a message.
const REPLY_PROBABILITY: f64 = 0.1;

/// Simulation parameters.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Number of channels.
    pub channels: usize,
    /// Number of messages posted by other users.
    pub messages: usize,
    /// Seed for traffic and failure injection.
    pub seed: u64,
    /// Fraction of feed operations that fail.
    pub failure_rate: f64,
    /// Simulated snapshot latency.
    pub snapshot_delay: Option<Duration>,
    /// Redeliver existing messages on subscribe.
    pub replay_on_subscribe: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            channels: 4,
            messages: 50,
            seed: 42,
            failure_rate: 0.0,
            snapshot_delay: None,
            replay_on_subscribe: true,
        }
    }
}

impl SimulationConfig {
    /// Reject parameters the simulation cannot run with.
    pub fn validate(&self) -> Result<(), RuntimeError> {
        if self.channels == 0 {
            return Err(RuntimeError::InvalidArgument {
                name: "channels",
                reason: "at least one channel is required".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.failure_rate) {
            return Err(RuntimeError::InvalidArgument {
                name: "failure-rate",
                reason: format!("must be between 0.0 and 1.0, got {}", self.failure_rate),
            });
        }
        Ok(())
    }
}

fn channel_name(index: usize) -> String {
    match CHANNEL_NAMES.get(index) {
        Some(name) => (*name).to_string(),
        None => format!("channel-{index}"),
    }
}

/// Run a session and return the engine's final state.
pub async fn simulate(config: &SimulationConfig) -> Result<Summary, RuntimeError> {
    config.validate()?;

    let memory = MemoryFeed::with_config(MemoryFeedConfig {
        replay_on_subscribe: config.replay_on_subscribe,
        snapshot_delay: config.snapshot_delay,
        ..MemoryFeedConfig::default()
    });
    let founder = Creator { name: "admin".to_string(), avatar: String::new() };
    let channels: Vec<ChannelId> = (0..config.channels)
        .map(|index| {
            let name = channel_name(index);
            memory.create(NewChannel {
                details: format!("talk about {name}"),
                name,
                created_by: founder.clone(),
            })
        })
        .collect();

    let feed = ChaoticFeed::with_seed(memory.clone(), config.failure_rate, config.seed);
    let runtime_config = RuntimeConfig {
        engine: EngineConfig { auto_select_first: true },
        user: Author { id: "me".to_string(), name: "me".to_string(), avatar: String::new() },
        ..RuntimeConfig::default()
    };
    let (runtime, handle) = Runtime::new(feed.clone(), runtime_config);
    let task = tokio::spawn(runtime.run());

    let others: Vec<Author> = ["ada", "grace", "linus"]
        .into_iter()
        .map(|name| Author { id: name.to_string(), name: name.to_string(), avatar: String::new() })
        .collect();
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);

    tracing::info!(channels = channels.len(), messages = config.messages, "simulation started");

    for round in 0..config.messages {
        let target = &channels[rng.gen_range(0..channels.len())];
        let author = others[rng.gen_range(0..others.len())].clone();
        let body = MessageBody::Text(format!("message {round} from {}", author.name));
        if let Err(err) = memory.append(target, NewMessage { author, body }) {
            tracing::warn!(%target, %err, "append failed");
        }

        if rng.gen_bool(SWITCH_PROBABILITY) {
            let next = &channels[rng.gen_range(0..channels.len())];
            match handle.select_channel(next).await {
                Ok(()) => tracing::debug!(channel_id = %next, "switched channel"),
                Err(SyncError::Closed) => return Err(SyncError::Closed.into()),
                Err(err) => tracing::warn!(channel_id = %next, %err, "switch failed"),
            }
        }

        if rng.gen_bool(REPLY_PROBABILITY)
            && let Some(active) = handle.active_channel().await?
        {
            let body = MessageBody::Text(format!("reply {round}"));
            if let Err(err) = handle.send_message(&active.id, body).await {
                tracing::warn!(channel_id = %active.id, %err, "reply failed");
            }
        }
    }

    let active = handle.active_channel().await?.map(|active| active.id);
    let mut summaries = Vec::new();
    for channel in handle.channels().await? {
        let messages = handle.channel_messages(&channel.id).await?.len();
        let unread = handle.unread_count(&channel.id).await?;
        summaries.push(ChannelSummary {
            active: active.as_ref() == Some(&channel.id),
            id: channel.id,
            name: channel.name,
            messages,
            unread,
        });
    }
    let total_unread = handle.total_unread().await?;
    let errors = handle.take_errors().await?.iter().map(ToString::to_string).collect();

    handle.shutdown().await?;
    task.await?;

    tracing::info!(injected = feed.injected_count(), "simulation finished");
    Ok(Summary {
        channels: summaries,
        total_unread,
        errors,
        injected_failures: feed.injected_count(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn clean_run_has_no_errors() {
        let config = SimulationConfig { channels: 3, messages: 40, ..SimulationConfig::default() };
        let summary = simulate(&config).await.unwrap();

        assert_eq!(summary.channels.len(), 3);
        assert_eq!(summary.injected_failures, 0);
        assert!(summary.errors.is_empty());
        assert_eq!(summary.channels.iter().filter(|channel| channel.active).count(), 1);

        for channel in &summary.channels {
            if channel.active {
                assert_eq!(channel.unread, 0);
            }
        }
        let unread: u64 = summary.channels.iter().map(|channel| channel.unread).sum();
        assert_eq!(summary.total_unread, unread);
    }

    #[tokio::test]
    async fn chaotic_run_completes() {
        let config = SimulationConfig { failure_rate: 0.3, seed: 7, ..SimulationConfig::default() };
        let summary = simulate(&config).await.unwrap();

        assert!(summary.injected_failures > 0);
        assert!(summary.channels.iter().filter(|channel| channel.active).all(|c| c.unread == 0));
    }

    #[tokio::test]
    async fn invalid_config_is_rejected() {
        let config = SimulationConfig { failure_rate: 2.0, ..SimulationConfig::default() };
        assert!(matches!(
            simulate(&config).await,
            Err(RuntimeError::InvalidArgument { name: "failure-rate", .. })
        ));

        let config = SimulationConfig { channels: 0, ..SimulationConfig::default() };
        assert!(matches!(
            simulate(&config).await,
            Err(RuntimeError::InvalidArgument { name: "channels", .. })
        ));
    }

    #[test]
    fn channel_names_fall_back_to_numbers() {
        assert_eq!(channel_name(0), "general");
        assert_eq!(channel_name(7), "channel-7");
    }
}
