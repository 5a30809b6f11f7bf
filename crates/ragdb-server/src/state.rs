//! Shared application state.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use ragdb_chat::{BotConfig, Generator};
use ragdb_core::RagConfig;
use ragdb_runtime::RagManager;

/// Shared application state accessible from all route handlers.
pub struct AppState {
    pub config: RagConfig,
    pub manager: Arc<RagManager>,
    pub bot_config: RwLock<BotConfig>,
    generator: RwLock<Arc<dyn Generator>>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        config: RagConfig,
        manager: Arc<RagManager>,
        bot_config: BotConfig,
        generator: Arc<dyn Generator>,
    ) -> Self {
        Self {
            config,
            manager,
            bot_config: RwLock::new(bot_config),
            generator: RwLock::new(generator),
            started_at: Instant::now(),
        }
    }

    /// Current generator. Handlers clone it out so no lock is held across
    /// the generation request.
    pub fn generator(&self) -> Arc<dyn Generator> {
        Arc::clone(&self.generator.read())
    }

    pub fn replace_generator(&self, generator: Arc<dyn Generator>) {
        *self.generator.write() = generator;
    }
}
