//! Per-event dispatch: eligibility, command extraction, ordered routing.

use crate::dispatch::registry::{HandlerRegistry, HandlerSpec};
use crate::handlers::Handler;
use crate::state::AppState;
use crate::types::error::Result;
use crate::types::event::{ChatKind, Event, Segment};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Terminal state of dispatching one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Exactly one handler accepted the command.
    Claimed,
    /// Not addressed to the bot, no text, or no handler recognized the
    /// command. Not an error; the bot stays silent.
    Unclaimed,
}

pub struct CommandDispatcher {
    registry: Arc<HandlerRegistry>,
    state: Arc<AppState>,
    /// Lazily constructed handler instances, one per spec for the process
    /// lifetime. The mutex is held across construction so a concurrent
    /// first access cannot build two instances of the same handler.
    instances: Mutex<HashMap<&'static str, Arc<dyn Handler>>>,
}

impl CommandDispatcher {
    pub fn new(registry: Arc<HandlerRegistry>, state: Arc<AppState>) -> Self {
        // The catalog is a prerequisite of the help command; building it
        // here keeps dispatcher construction the single setup point, as
        // catalog initialization is idempotent anyway.
        state.catalog.initialize(&registry);
        debug!(handlers = registry.len(), "Command dispatcher ready");
        Self {
            registry,
            state,
            instances: Mutex::new(HashMap::new()),
        }
    }

    /// Route one inbound event. Handler errors are not caught here; the
    /// event loop decides how to isolate one event's failure from the next.
    pub async fn dispatch(&self, event: &Event) -> Result<DispatchOutcome> {
        let Some(kind) = event.chat_kind() else {
            return Ok(DispatchOutcome::Unclaimed);
        };

        let identity = self.state.context.identity().await?;
        let bot_id = identity.user_id.to_string();

        if kind == ChatKind::Group && !mentions(event.segments(), &bot_id) {
            return Ok(DispatchOutcome::Unclaimed);
        }

        let Some((command, args)) = extract_command(event, &bot_id) else {
            return Ok(DispatchOutcome::Unclaimed);
        };
        debug!(command = %command, args = args.len(), "Dispatching command");

        for spec in self.registry.all() {
            if !spec.chat_scope.allows(kind) {
                continue;
            }
            let handler = self.instance(spec).await?;
            if handler.handle(event, &command, &args).await? {
                debug!(command = %command, handler = spec.name, "Command claimed");
                return Ok(DispatchOutcome::Claimed);
            }
        }
        Ok(DispatchOutcome::Unclaimed)
    }

    /// Fetch the cached instance for a spec, constructing it on first use.
    /// A failed construction caches nothing and surfaces the error.
    async fn instance(&self, spec: &HandlerSpec) -> Result<Arc<dyn Handler>> {
        let mut instances = self.instances.lock().await;
        if let Some(handler) = instances.get(spec.name) {
            return Ok(Arc::clone(handler));
        }
        let handler = (spec.construct)(&self.state)?;
        instances.insert(spec.name, Arc::clone(&handler));
        debug!(handler = spec.name, "Handler instance constructed");
        Ok(handler)
    }
}

/// True if any segment mentions the given account.
fn mentions(segments: &[Segment], bot_id: &str) -> bool {
    segments
        .iter()
        .any(|segment| matches!(segment, Segment::At { qq } if qq == bot_id))
}

/// Flatten the message into command + args.
///
/// Private messages contribute every text segment. Group messages
/// contribute only text segments occurring after the first mention of the
/// bot; text before the mention and non-text segments are ignored.
fn extract_command(event: &Event, bot_id: &str) -> Option<(String, Vec<String>)> {
    let mut buffer = String::new();
    match event {
        Event::Private(private) => {
            for segment in &private.message {
                if let Segment::Text { text } = segment {
                    buffer.push_str(text);
                }
            }
        }
        Event::Group(group) => {
            let mut after_mention = false;
            for segment in &group.message {
                match segment {
                    Segment::At { qq } if qq == bot_id => after_mention = true,
                    Segment::Text { text } if after_mention => buffer.push_str(text),
                    _ => {}
                }
            }
        }
        Event::Meta(_) | Event::Other(_) => return None,
    }

    let mut parts = buffer.split_whitespace();
    let command = parts.next()?.to_string();
    let args = parts.map(str::to_string).collect();
    Some((command, args))
}
