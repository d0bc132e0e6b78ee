//! Ambient state every handler needs: the bot's own identity and the
//! transport handle. Initialized once before the event loop starts and
//! cleaned up after it stops; reading outside that window is a programming
//! error and fails immediately instead of operating on empty state.

use crate::napcat::{BotClient, BotIdentity};
use crate::types::error::{BotError, Result};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

struct ContextInner {
    identity: BotIdentity,
    client: Arc<dyn BotClient>,
}

#[derive(Default)]
pub struct DispatchContext {
    inner: RwLock<Option<ContextInner>>,
}

impl DispatchContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set identity and transport handle. Calling again replaces both
    /// (e.g. after a reconnect); the last call wins.
    pub async fn initialize(&self, identity: BotIdentity, client: Arc<dyn BotClient>) {
        debug!(bot_id = identity.user_id, "Dispatch context initialized");
        *self.inner.write().await = Some(ContextInner { identity, client });
    }

    /// Clear both fields; accessors fail until the next `initialize`.
    pub async fn cleanup(&self) {
        debug!("Dispatch context cleared");
        *self.inner.write().await = None;
    }

    pub async fn is_initialized(&self) -> bool {
        self.inner.read().await.is_some()
    }

    pub async fn identity(&self) -> Result<BotIdentity> {
        self.inner
            .read()
            .await
            .as_ref()
            .map(|inner| inner.identity.clone())
            .ok_or(BotError::ContextNotInitialized)
    }

    pub async fn client(&self) -> Result<Arc<dyn BotClient>> {
        self.inner
            .read()
            .await
            .as_ref()
            .map(|inner| Arc::clone(&inner.client))
            .ok_or(BotError::ContextNotInitialized)
    }
}
