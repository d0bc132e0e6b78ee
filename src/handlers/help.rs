//! `help` command: renders the command catalog.

use crate::dispatch::catalog::CatalogEntry;
use crate::dispatch::registry::{ChatScope, HandlerSpec};
use crate::handlers::{reply_text, CommandBinding, CommandFuture, CommandInfo, CommandTable, Handler};
use crate::state::AppState;
use crate::types::error::{BotError, Result};
use crate::types::event::{ChatKind, Event};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

pub struct HelpHandler {
    state: Arc<AppState>,
    table: CommandTable<Self>,
}

impl HelpHandler {
    const BINDINGS: &'static [CommandBinding<HelpHandler>] = &[CommandBinding {
        info: CommandInfo {
            names: &["help", "帮助"],
            usage: "help [category]",
            description: "List available commands, optionally only one category",
        },
        run: HelpHandler::run_help,
    }];

    pub fn spec() -> HandlerSpec {
        HandlerSpec {
            name: "help",
            category: "help",
            chat_scope: ChatScope::Both,
            commands: Box::new(|| Self::BINDINGS.iter().map(|b| &b.info).collect()),
            construct: Box::new(|state| Ok(Arc::new(HelpHandler::new(Arc::clone(state))))),
        }
    }

    pub fn new(state: Arc<AppState>) -> Self {
        Self {
            state,
            table: CommandTable::new(Self::BINDINGS),
        }
    }

    fn run_help<'a>(&'a self, event: &'a Event, args: &'a [String]) -> CommandFuture<'a> {
        Box::pin(self.cmd_help(event, args))
    }

    async fn cmd_help(&self, event: &Event, args: &[String]) -> Result<()> {
        let kind = event.chat_kind().ok_or(BotError::UnsupportedEvent)?;
        debug!(category = ?args.first(), "Rendering help");

        // A broken catalog is reported to the chat instead of silently
        // dropping the command.
        let text = match self.render(kind, args.first().map(String::as_str)) {
            Ok(text) => text,
            Err(e) => format!("Failed to collect help information: {e}"),
        };

        let client = self.state.context.client().await?;
        reply_text(client.as_ref(), event, text).await
    }

    /// Build the help text for one chat kind: only commands whose handler
    /// scope covers `kind`, grouped by category.
    fn render(&self, kind: ChatKind, category: Option<&str>) -> Result<String> {
        let text = match category {
            Some(wanted) => {
                let entries: Vec<&CatalogEntry> = self
                    .state
                    .catalog
                    .commands_by_category(wanted)?
                    .into_iter()
                    .filter(|entry| entry.chat_scope.allows(kind))
                    .collect();
                if entries.is_empty() {
                    let mut text = format!("Unknown category: {wanted}\nAvailable categories:\n");
                    for name in self.state.catalog.categories()? {
                        let usable = self
                            .state
                            .catalog
                            .commands_by_category(name)?
                            .iter()
                            .any(|entry| entry.chat_scope.allows(kind));
                        if usable {
                            text.push_str(&format!("- {name}\n"));
                        }
                    }
                    text
                } else {
                    let mut text = format!("Commands in category '{wanted}':\n");
                    for entry in entries {
                        text.push_str(&format_entry(entry));
                    }
                    text
                }
            }
            None => {
                let mut by_category: BTreeMap<&str, Vec<&CatalogEntry>> = BTreeMap::new();
                for entry in self.state.catalog.all_commands()?.values() {
                    if entry.chat_scope.allows(kind) {
                        by_category.entry(entry.category).or_default().push(entry);
                    }
                }
                let mut text = String::from("Available commands:\n");
                for (name, entries) in &by_category {
                    text.push_str(&format!("\n[{name}]\n"));
                    for entry in entries {
                        text.push_str(&format_entry(entry));
                    }
                }
                text
            }
        };
        Ok(text)
    }
}

fn format_entry(entry: &CatalogEntry) -> String {
    let mut line = format!("- {}", entry.command);
    if !entry.usage.is_empty() {
        line.push_str(&format!(" (usage: {})", entry.usage));
    }
    if !entry.description.is_empty() {
        line.push_str(&format!(": {}", entry.description));
    }
    line.push('\n');
    line
}

#[async_trait]
impl Handler for HelpHandler {
    async fn handle(&self, event: &Event, command: &str, args: &[String]) -> Result<bool> {
        self.table.dispatch(self, event, command, args).await
    }
}
