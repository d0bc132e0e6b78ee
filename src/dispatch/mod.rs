//! Command-dispatch core: handler registry, command catalog, dispatch
//! context and the per-event dispatcher.

pub mod catalog;
pub mod context;
pub mod dispatcher;
pub mod registry;

pub use catalog::{CatalogEntry, CommandCatalog};
pub use context::DispatchContext;
pub use dispatcher::{CommandDispatcher, DispatchOutcome};
pub use registry::{ChatScope, HandlerRegistry, HandlerSpec};
