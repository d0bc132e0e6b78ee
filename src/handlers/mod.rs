//! Handler base: command declaration tables and the `Handler` contract.
//!
//! A handler type declares its commands as a static table of
//! [`CommandBinding`]s (alias list, display strings, bound method). At
//! construction it builds a [`CommandTable`] mapping each lower-cased alias
//! to its binding; `handle` is a lookup plus an invocation, nothing more.

pub mod essence;
pub mod help;

use crate::dispatch::registry::HandlerRegistry;
use crate::napcat::BotClient;
use crate::types::error::{BotError, Result};
use crate::types::event::{Event, Segment};
use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

pub type CommandFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// Display metadata of one declared command.
#[derive(Debug)]
pub struct CommandInfo {
    /// Case-insensitive aliases; all map to the same method.
    pub names: &'static [&'static str],
    pub usage: &'static str,
    pub description: &'static str,
}

/// One declared command of handler type `H`: metadata plus the bound
/// method, as a plain fn pointer so tables can live in consts.
pub struct CommandBinding<H: ?Sized> {
    pub info: CommandInfo,
    pub run: for<'a> fn(&'a H, &'a Event, &'a [String]) -> CommandFuture<'a>,
}

/// Per-instance lookup table from normalized alias to binding.
pub struct CommandTable<H: ?Sized + 'static> {
    bindings: HashMap<String, &'static CommandBinding<H>>,
}

impl<H: ?Sized + 'static> CommandTable<H> {
    /// Build the alias map. Within one handler an alias declared twice is
    /// resolved last-declared-wins; collisions across handler types are the
    /// dispatcher's business, not this table's.
    pub fn new(bindings: &'static [CommandBinding<H>]) -> Self {
        let mut map = HashMap::new();
        for binding in bindings {
            for alias in binding.info.names {
                map.insert(alias.to_lowercase(), binding);
            }
        }
        Self { bindings: map }
    }

    /// Look up `command` (case-insensitive) and invoke its method with
    /// `(event, args)`. Returns whether the command was claimed; method
    /// errors propagate unmodified. Non-message events are rejected even
    /// though the dispatcher filters them earlier.
    pub async fn dispatch(
        &self,
        handler: &H,
        event: &Event,
        command: &str,
        args: &[String],
    ) -> Result<bool> {
        if event.chat_kind().is_none() {
            return Ok(false);
        }
        match self.bindings.get(&command.to_lowercase()) {
            Some(binding) => {
                (binding.run)(handler, event, args).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Contract every handler type implements.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Claim and execute `command`, or decline with `Ok(false)` and no side
    /// effects.
    async fn handle(&self, event: &Event, command: &str, args: &[String]) -> Result<bool>;
}

/// Send `message` back to wherever `event` came from.
pub async fn reply(client: &dyn BotClient, event: &Event, message: Vec<Segment>) -> Result<()> {
    match event {
        Event::Group(group) => client.send_group_message(group.group_id, message).await,
        Event::Private(private) => client.send_private_message(private.user_id, message).await,
        Event::Meta(_) | Event::Other(_) => Err(BotError::UnsupportedEvent),
    }
}

pub async fn reply_text(
    client: &dyn BotClient,
    event: &Event,
    text: impl Into<String> + Send,
) -> Result<()> {
    reply(client, event, vec![Segment::text(text)]).await
}

/// The explicit registration list. Adding a handler module means adding
/// one line here; order is dispatch order.
pub fn builtin_registry() -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    registry.register(help::HelpHandler::spec());
    registry.register(essence::EssenceHandler::spec());
    registry
}

#[cfg(test)]
pub mod test_support {
    //! Probe handlers for registry/dispatcher tests.

    use super::*;
    use crate::dispatch::registry::{ChatScope, HandlerSpec};
    use crate::state::AppState;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Per-spec counters observed by tests.
    #[derive(Clone, Default)]
    pub struct SpecProbe {
        pub constructions: Arc<AtomicUsize>,
        pub claims: Arc<AtomicUsize>,
    }

    impl SpecProbe {
        pub fn constructions(&self) -> usize {
            self.constructions.load(Ordering::SeqCst)
        }

        pub fn claims(&self) -> usize {
            self.claims.load(Ordering::SeqCst)
        }
    }

    struct ProbeHandler {
        /// Command this handler claims; `None` claims nothing.
        command: Option<&'static str>,
        claims: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Handler for ProbeHandler {
        async fn handle(&self, event: &Event, command: &str, _args: &[String]) -> Result<bool> {
            if event.chat_kind().is_none() {
                return Ok(false);
            }
            match self.command {
                Some(mine) if command.to_lowercase() == mine => {
                    self.claims.fetch_add(1, Ordering::SeqCst);
                    Ok(true)
                }
                _ => Ok(false),
            }
        }
    }

    fn probe_spec(
        name: &'static str,
        chat_scope: ChatScope,
        command: Option<&'static str>,
    ) -> (HandlerSpec, SpecProbe) {
        let probe = SpecProbe::default();
        let constructions = Arc::clone(&probe.constructions);
        let claims = Arc::clone(&probe.claims);
        let spec = HandlerSpec {
            name,
            category: "general",
            chat_scope,
            commands: Box::new(Vec::new),
            construct: Box::new(move |_: &Arc<AppState>| {
                constructions.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new(ProbeHandler {
                    command,
                    claims: Arc::clone(&claims),
                }) as Arc<dyn Handler>)
            }),
        };
        (spec, probe)
    }

    /// Spec whose handler claims exactly `command`.
    pub fn claiming_spec(
        name: &'static str,
        chat_scope: ChatScope,
        command: &'static str,
    ) -> (HandlerSpec, SpecProbe) {
        probe_spec(name, chat_scope, Some(command))
    }

    /// Spec whose handler declines every command.
    pub fn counting_spec(name: &'static str, chat_scope: ChatScope) -> (HandlerSpec, SpecProbe) {
        probe_spec(name, chat_scope, None)
    }

    /// Spec whose construction always fails.
    pub fn failing_construct_spec(
        name: &'static str,
        chat_scope: ChatScope,
    ) -> (HandlerSpec, SpecProbe) {
        let probe = SpecProbe::default();
        let constructions = Arc::clone(&probe.constructions);
        let spec = HandlerSpec {
            name,
            category: "general",
            chat_scope,
            commands: Box::new(Vec::new),
            construct: Box::new(move |_: &Arc<AppState>| {
                constructions.fetch_add(1, Ordering::SeqCst);
                Err(BotError::config("construction failed"))
            }),
        };
        (spec, probe)
    }

    /// Minimal spec with no commands and a handler that declines all.
    pub fn noop_spec(name: &'static str, chat_scope: ChatScope) -> HandlerSpec {
        probe_spec(name, chat_scope, None).0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::event::{PrivateMessageEvent, Sender};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TableHandler {
        hits: AtomicUsize,
        last: std::sync::Mutex<String>,
    }

    impl TableHandler {
        fn new() -> Self {
            Self {
                hits: AtomicUsize::new(0),
                last: std::sync::Mutex::new(String::new()),
            }
        }

        fn record<'a>(&'a self, _event: &'a Event, _args: &'a [String]) -> CommandFuture<'a> {
            Box::pin(async move {
                self.hits.fetch_add(1, Ordering::SeqCst);
                *self.last.lock().unwrap() = "record".to_string();
                Ok(())
            })
        }

        fn record_shadowed<'a>(&'a self, _event: &'a Event, _args: &'a [String]) -> CommandFuture<'a> {
            Box::pin(async move {
                *self.last.lock().unwrap() = "shadowed".to_string();
                Ok(())
            })
        }

        fn fail<'a>(&'a self, _event: &'a Event, _args: &'a [String]) -> CommandFuture<'a> {
            Box::pin(async move { Err(BotError::config("boom")) })
        }

        const BINDINGS: &'static [CommandBinding<TableHandler>] = &[
            CommandBinding {
                info: CommandInfo {
                    names: &["Ping", "p"],
                    usage: "ping",
                    description: "",
                },
                run: TableHandler::record,
            },
            CommandBinding {
                info: CommandInfo {
                    names: &["ping"],
                    usage: "",
                    description: "shadows the first alias",
                },
                run: TableHandler::record_shadowed,
            },
            CommandBinding {
                info: CommandInfo {
                    names: &["fail"],
                    usage: "",
                    description: "",
                },
                run: TableHandler::fail,
            },
        ];
    }

    fn private_event() -> Event {
        Event::Private(PrivateMessageEvent {
            user_id: 1,
            message_id: 1,
            message: vec![],
            sender: Sender::default(),
            time: 0,
        })
    }

    #[tokio::test]
    async fn test_lookup_is_case_insensitive() {
        let handler = TableHandler::new();
        let table = CommandTable::new(TableHandler::BINDINGS);

        let claimed = table
            .dispatch(&handler, &private_event(), "P", &[])
            .await
            .unwrap();
        assert!(claimed);
        assert_eq!(handler.hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_within_handler_collision_last_declared_wins() {
        let handler = TableHandler::new();
        let table = CommandTable::new(TableHandler::BINDINGS);

        // "ping" is declared by both bindings; the later one owns it, the
        // earlier one keeps its other alias.
        table
            .dispatch(&handler, &private_event(), "PING", &[])
            .await
            .unwrap();
        assert_eq!(*handler.last.lock().unwrap(), "shadowed");
        assert_eq!(handler.hits.load(Ordering::SeqCst), 0);

        table
            .dispatch(&handler, &private_event(), "p", &[])
            .await
            .unwrap();
        assert_eq!(handler.hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_command_declined_without_side_effects() {
        let handler = TableHandler::new();
        let table = CommandTable::new(TableHandler::BINDINGS);

        let claimed = table
            .dispatch(&handler, &private_event(), "nope", &[])
            .await
            .unwrap();
        assert!(!claimed);
        assert_eq!(handler.hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_non_message_event_rejected() {
        let handler = TableHandler::new();
        let table = CommandTable::new(TableHandler::BINDINGS);

        let event = Event::Meta(serde_json::json!({}));
        let claimed = table.dispatch(&handler, &event, "ping", &[]).await.unwrap();
        assert!(!claimed);
    }

    #[tokio::test]
    async fn test_method_errors_propagate() {
        let handler = TableHandler::new();
        let table = CommandTable::new(TableHandler::BINDINGS);

        let err = table
            .dispatch(&handler, &private_event(), "fail", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, BotError::Config { .. }));
    }

    #[test]
    fn test_builtin_registry_order() {
        let registry = builtin_registry();
        let names: Vec<_> = registry.all().iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["help", "essence"]);
    }
}
