//! Shared application state, built once at startup and threaded explicitly
//! into the dispatcher and every handler constructor.

use crate::config::Config;
use crate::db::essence_store::EssenceStore;
use crate::dispatch::catalog::CommandCatalog;
use crate::dispatch::context::DispatchContext;
use std::sync::Arc;

pub struct AppState {
    pub config: Arc<Config>,
    pub context: DispatchContext,
    pub catalog: CommandCatalog,
    pub essence_store: EssenceStore,
}

impl AppState {
    pub fn new(config: Config, essence_store: EssenceStore) -> Self {
        Self {
            config: Arc::new(config),
            context: DispatchContext::new(),
            catalog: CommandCatalog::new(),
            essence_store,
        }
    }
}
