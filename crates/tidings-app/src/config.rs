//! Engine and runtime configuration.

use tidings_core::Author;

/// Sync engine behavior.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Select the first attached channel when nothing is active yet.
    pub auto_select_first: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { auto_select_first: true }
    }
}

/// Runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Engine behavior.
    pub engine: EngineConfig,
    /// Capacity of the UI command queue.
    pub command_buffer: usize,
    /// Local user. Author of every message sent through the runtime.
    pub user: Author,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            command_buffer: 64,
            user: Author {
                id: "local".to_string(),
                name: "anonymous".to_string(),
                avatar: String::new(),
            },
        }
    }
}
