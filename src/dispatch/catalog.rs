//! Flattened, queryable catalog of every declared command.
//!
//! Built once from the registry's static command tables; immutable for the
//! rest of the process. Queries fail loudly before initialization rather
//! than returning an empty catalog that would mask a startup-order bug.

use crate::dispatch::registry::{ChatScope, HandlerRegistry};
use crate::types::error::{BotError, Result};
use std::collections::BTreeMap;
use std::sync::OnceLock;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct CatalogEntry {
    /// Lower-cased command alias; unique across the whole catalog.
    pub command: String,
    pub usage: &'static str,
    pub description: &'static str,
    pub category: &'static str,
    pub chat_scope: ChatScope,
    /// Handler that owns this alias; reported when a collision overwrites.
    pub handler: &'static str,
}

#[derive(Default)]
pub struct CommandCatalog {
    entries: OnceLock<BTreeMap<String, CatalogEntry>>,
}

impl CommandCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the catalog from the registry. Idempotent: second and later
    /// calls are no-ops. A command alias declared by two handler types is
    /// resolved last-registered-wins, with a warning naming both sides.
    pub fn initialize(&self, registry: &HandlerRegistry) {
        if self.entries.get().is_some() {
            return;
        }
        if registry.is_empty() {
            warn!("Building command catalog from an empty registry");
        }

        let mut entries = BTreeMap::new();
        for spec in registry.all() {
            for command_info in (spec.commands)() {
                for alias in command_info.names {
                    let command = alias.to_lowercase();
                    let entry = CatalogEntry {
                        command: command.clone(),
                        usage: command_info.usage,
                        description: command_info.description,
                        category: spec.category,
                        chat_scope: spec.chat_scope,
                        handler: spec.name,
                    };
                    if let Some(previous) = entries.insert(command, entry) {
                        warn!(
                            command = %previous.command,
                            previous_handler = previous.handler,
                            new_handler = spec.name,
                            "Command alias collision, later registration wins"
                        );
                    }
                }
            }
        }

        info!(commands = entries.len(), "Command catalog initialized");
        let _ = self.entries.set(entries);
    }

    pub fn is_initialized(&self) -> bool {
        self.entries.get().is_some()
    }

    fn built(&self) -> Result<&BTreeMap<String, CatalogEntry>> {
        self.entries.get().ok_or(BotError::CatalogNotInitialized)
    }

    /// Every command, keyed by its lower-cased alias.
    pub fn all_commands(&self) -> Result<&BTreeMap<String, CatalogEntry>> {
        self.built()
    }

    pub fn commands_by_category(&self, category: &str) -> Result<Vec<&CatalogEntry>> {
        Ok(self
            .built()?
            .values()
            .filter(|entry| entry.category == category)
            .collect())
    }

    /// Distinct categories, sorted.
    pub fn categories(&self) -> Result<Vec<&'static str>> {
        let mut categories: Vec<_> = self.built()?.values().map(|e| e.category).collect();
        categories.sort_unstable();
        categories.dedup();
        Ok(categories)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::registry::{ChatScope, HandlerSpec};
    use crate::handlers::test_support::noop_spec;
    use crate::handlers::CommandInfo;

    static PING_A: CommandInfo = CommandInfo {
        names: &["ping", "Echo"],
        usage: "ping",
        description: "first handler",
    };
    static PING_B: CommandInfo = CommandInfo {
        names: &["PING"],
        usage: "ping",
        description: "second handler",
    };

    fn with_commands(
        name: &'static str,
        category: &'static str,
        chat_scope: ChatScope,
        info: &'static CommandInfo,
    ) -> HandlerSpec {
        let mut spec = noop_spec(name, chat_scope);
        spec.category = category;
        spec.commands = Box::new(move || vec![info]);
        spec
    }

    fn two_handler_registry() -> HandlerRegistry {
        let mut registry = HandlerRegistry::new();
        registry.register(with_commands("a", "net", ChatScope::Both, &PING_A));
        registry.register(with_commands("b", "net", ChatScope::Group, &PING_B));
        registry
    }

    #[test]
    fn test_queries_fail_before_initialize() {
        let catalog = CommandCatalog::new();
        assert!(matches!(
            catalog.all_commands(),
            Err(BotError::CatalogNotInitialized)
        ));
        assert!(matches!(
            catalog.commands_by_category("help"),
            Err(BotError::CatalogNotInitialized)
        ));
        assert!(matches!(
            catalog.categories(),
            Err(BotError::CatalogNotInitialized)
        ));
    }

    #[test]
    fn test_aliases_are_lowercased_one_entry_each() {
        let catalog = CommandCatalog::new();
        catalog.initialize(&two_handler_registry());

        let commands = catalog.all_commands().unwrap();
        assert!(commands.contains_key("echo"));
        assert!(commands.contains_key("ping"));
        assert!(!commands.contains_key("Echo"));
    }

    #[test]
    fn test_cross_handler_collision_last_registered_wins() {
        let catalog = CommandCatalog::new();
        catalog.initialize(&two_handler_registry());

        let entry = &catalog.all_commands().unwrap()["ping"];
        assert_eq!(entry.handler, "b");
        assert_eq!(entry.description, "second handler");
        assert_eq!(entry.chat_scope, ChatScope::Group);
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let catalog = CommandCatalog::new();
        catalog.initialize(&two_handler_registry());
        let before = catalog.all_commands().unwrap().len();

        // A second initialize with a different registry must not rebuild.
        catalog.initialize(&HandlerRegistry::new());
        assert_eq!(catalog.all_commands().unwrap().len(), before);
        assert!(catalog.is_initialized());
    }

    #[test]
    fn test_categories_sorted_and_deduped() {
        let catalog = CommandCatalog::new();
        catalog.initialize(&two_handler_registry());
        assert_eq!(catalog.categories().unwrap(), vec!["net"]);

        let by_category = catalog.commands_by_category("net").unwrap();
        assert_eq!(by_category.len(), 2);
        assert!(catalog.commands_by_category("missing").unwrap().is_empty());
    }
}
