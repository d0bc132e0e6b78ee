//! Ordered registry of handler types.
//!
//! Registration is an explicit list assembled at startup
//! (`handlers::builtin_registry`), not a side effect of module loading.
//! Order matters: the dispatcher tries handlers in registration order and
//! the first claim wins.

use crate::handlers::{CommandInfo, Handler};
use crate::state::AppState;
use crate::types::error::Result;
use crate::types::event::ChatKind;
use std::sync::Arc;
use tracing::debug;

/// Which chats a handler's commands are available in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatScope {
    Group,
    Private,
    Both,
}

impl ChatScope {
    pub fn allows(self, kind: ChatKind) -> bool {
        match self {
            Self::Both => true,
            Self::Group => kind == ChatKind::Group,
            Self::Private => kind == ChatKind::Private,
        }
    }
}

pub type CommandsFn = Box<dyn Fn() -> Vec<&'static CommandInfo> + Send + Sync>;
pub type ConstructFn = Box<dyn Fn(&Arc<AppState>) -> Result<Arc<dyn Handler>> + Send + Sync>;

/// Description of one handler type: identity, metadata, its declared
/// command table, and a constructor the dispatcher calls lazily.
pub struct HandlerSpec {
    /// Unique handler name; the registry and the instance cache key on it.
    pub name: &'static str,
    pub category: &'static str,
    pub chat_scope: ChatScope,
    /// Declared commands, for the catalog.
    pub commands: CommandsFn,
    pub construct: ConstructFn,
}

/// Append-only, ordered list of handler specs.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: Vec<HandlerSpec>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent insert: a spec whose name is already present is absorbed
    /// without error and without changing the existing order.
    pub fn register(&mut self, spec: HandlerSpec) {
        if self.handlers.iter().any(|h| h.name == spec.name) {
            debug!(handler = spec.name, "Duplicate handler registration ignored");
            return;
        }
        self.handlers.push(spec);
    }

    /// All registered specs, in registration order.
    pub fn all(&self) -> &[HandlerSpec] {
        &self.handlers
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
