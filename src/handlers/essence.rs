//! Essence-message commands: snapshot the group's essence list into the
//! local store, append individual messages, and browse a snapshot as a
//! forward bundle.

use crate::db::essence_store::{DateFilter, EssenceQuery, NewEssenceMessage, StoredEssenceMessage};
use crate::dispatch::registry::{ChatScope, HandlerSpec};
use crate::handlers::{reply_text, CommandBinding, CommandFuture, CommandInfo, CommandTable, Handler};
use crate::napcat::{BotClient, ForwardNode};
use crate::state::AppState;
use crate::types::error::{BotError, Result};
use crate::types::event::{Event, GroupMessageEvent, Segment};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

/// Result count used when the caller gives no filter at all.
const DEFAULT_LIST_LIMIT: i64 = 10;
/// Result count used when a filter is given without an explicit count.
const FILTERED_LIST_LIMIT: i64 = 100;

pub struct EssenceHandler {
    state: Arc<AppState>,
    table: CommandTable<Self>,
}

impl EssenceHandler {
    const BINDINGS: &'static [CommandBinding<EssenceHandler>] = &[
        CommandBinding {
            info: CommandInfo {
                names: &["备份精华", "backup-essence"],
                usage: "backup-essence",
                description: "Snapshot the group's essence list into the local store",
            },
            run: EssenceHandler::run_backup,
        },
        CommandBinding {
            info: CommandInfo {
                names: &["添加精华", "add-essence"],
                usage: "add-essence (while replying to a message)",
                description: "Append the replied-to message to the current backup",
            },
            run: EssenceHandler::run_add,
        },
        CommandBinding {
            info: CommandInfo {
                names: &["查看精华", "list-essence"],
                usage: "list-essence [date|qq|count] [count|-1]",
                description: "Browse the current backup as a forward bundle",
            },
            run: EssenceHandler::run_list,
        },
    ];

    pub fn spec() -> HandlerSpec {
        HandlerSpec {
            name: "essence",
            category: "essence",
            chat_scope: ChatScope::Group,
            commands: Box::new(|| Self::BINDINGS.iter().map(|b| &b.info).collect()),
            construct: Box::new(|state| Ok(Arc::new(EssenceHandler::new(Arc::clone(state))))),
        }
    }

    pub fn new(state: Arc<AppState>) -> Self {
        Self {
            state,
            table: CommandTable::new(Self::BINDINGS),
        }
    }

    fn run_backup<'a>(&'a self, event: &'a Event, args: &'a [String]) -> CommandFuture<'a> {
        Box::pin(self.cmd_backup(event, args))
    }

    fn run_add<'a>(&'a self, event: &'a Event, args: &'a [String]) -> CommandFuture<'a> {
        Box::pin(self.cmd_add(event, args))
    }

    fn run_list<'a>(&'a self, event: &'a Event, args: &'a [String]) -> CommandFuture<'a> {
        Box::pin(self.cmd_list(event, args))
    }

    async fn cmd_backup(&self, event: &Event, _args: &[String]) -> Result<()> {
        let group = group_of(event)?;
        let client = self.state.context.client().await?;

        reply_text(
            client.as_ref(),
            event,
            "Backing up the essence list, this may take a moment...",
        )
        .await?;

        let essence = client.get_essence_messages(group.group_id).await?;
        if essence.is_empty() {
            return reply_text(
                client.as_ref(),
                event,
                "This group has no essence messages to back up.",
            )
            .await;
        }

        let mut rows = Vec::with_capacity(essence.len());
        for msg in &essence {
            rows.push(NewEssenceMessage {
                message_id: msg.message_id.to_string(),
                message_seq: msg.msg_seq.to_string(),
                sender_id: msg.sender_id.to_string(),
                sender_nick: msg.sender_nick.clone(),
                operator_id: msg.operator_id.to_string(),
                operator_nick: msg.operator_nick.clone(),
                operator_time: msg.operator_time,
                content: serde_json::to_string(&msg.content)?,
            });
        }

        let text = match self.state.essence_store.replace_backup(group.group_id, &rows).await {
            Ok(summary) => {
                info!(
                    group_id = group.group_id,
                    backup_id = summary.backup_id,
                    stored = summary.stored,
                    carried_over = summary.carried_over,
                    "Essence backup finished"
                );
                if summary.carried_over > 0 {
                    format!(
                        "Backed up {} essence messages ({} carried over from the previous backup).",
                        summary.stored, summary.carried_over
                    )
                } else {
                    format!("Backed up {} essence messages.", summary.stored)
                }
            }
            Err(e) => {
                warn!(group_id = group.group_id, error = %e, "Essence backup failed");
                format!("Backup failed: {e}")
            }
        };
        reply_text(client.as_ref(), event, text).await
    }

    async fn cmd_add(&self, event: &Event, _args: &[String]) -> Result<()> {
        let group = group_of(event)?;
        let client = self.state.context.client().await?;

        let Some(reply_id) = replied_message_id(event) else {
            return reply_text(
                client.as_ref(),
                event,
                "Reply to the message you want to add, then send this command again.",
            )
            .await;
        };

        let Some(backup) = self.state.essence_store.current_backup(group.group_id).await? else {
            return reply_text(
                client.as_ref(),
                event,
                "This group has no backup yet. Run backup-essence first.",
            )
            .await;
        };

        let detail = match client.get_message(&reply_id).await {
            Ok(detail) => detail,
            Err(e) => {
                warn!(message_id = %reply_id, error = %e, "Failed to fetch replied message");
                return reply_text(
                    client.as_ref(),
                    event,
                    format!("Could not fetch the replied message: {e}"),
                )
                .await;
            }
        };

        // Manual additions credit the message's own sender as operator.
        let row = NewEssenceMessage {
            message_id: detail.message_id.to_string(),
            message_seq: detail.message_seq.to_string(),
            sender_id: detail.sender.user_id.to_string(),
            sender_nick: detail.sender.nickname.clone(),
            operator_id: detail.sender.user_id.to_string(),
            operator_nick: detail.sender.nickname.clone(),
            operator_time: now_unix(),
            content: serde_json::to_string(&detail.message)?,
        };
        self.state
            .essence_store
            .add_message(backup.id, group.group_id, &row)
            .await?;
        info!(
            group_id = group.group_id,
            backup_id = backup.id,
            message_id = detail.message_id,
            "Message added to essence backup"
        );

        reply_text(
            client.as_ref(),
            event,
            format!("Added message {} to the current backup.", detail.message_id),
        )
        .await
    }

    async fn cmd_list(&self, event: &Event, args: &[String]) -> Result<()> {
        let group = group_of(event)?;
        let client = self.state.context.client().await?;

        let Some(backup) = self.state.essence_store.current_backup(group.group_id).await? else {
            return reply_text(
                client.as_ref(),
                event,
                "This group has no backup yet. Run backup-essence first.",
            )
            .await;
        };

        let query = parse_query(args);
        let messages = self
            .state
            .essence_store
            .query_messages(backup.id, group.group_id, &query)
            .await?;
        if messages.is_empty() {
            return reply_text(
                client.as_ref(),
                event,
                "No essence messages match that filter.",
            )
            .await;
        }

        let nodes = messages.iter().map(forward_node).collect();
        client.send_group_forward(group.group_id, nodes).await
    }
}

fn group_of(event: &Event) -> Result<&GroupMessageEvent> {
    match event {
        Event::Group(group) => Ok(group),
        _ => Err(BotError::UnsupportedEvent),
    }
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Message id of the first reply segment, if the command quoted one.
fn replied_message_id(event: &Event) -> Option<String> {
    event.segments().iter().find_map(|segment| match segment {
        Segment::Reply { id } => Some(id.clone()),
        _ => None,
    })
}

fn forward_node(message: &StoredEssenceMessage) -> ForwardNode {
    // Stored content is the serialized segment list; fall back to showing
    // it raw if an old row holds something else.
    let content = serde_json::from_str(&message.content)
        .unwrap_or_else(|_| vec![Segment::text(message.content.clone())]);
    let name = if message.sender_nick.is_empty() {
        message.sender_id.clone()
    } else {
        message.sender_nick.clone()
    };
    ForwardNode {
        name,
        uin: message.sender_id.clone(),
        content,
        time: message.operator_time,
    }
}

/// Parse `list-essence` arguments.
///
/// The first argument is one of: a date (`2025.2.7` for a day, `2025.2`
/// for a month, `2025` for a year), a result count up to 100, or a sender
/// qq. The second argument overrides the count; `-1` removes the cap.
fn parse_query(args: &[String]) -> EssenceQuery {
    let mut query = EssenceQuery {
        limit: Some(DEFAULT_LIST_LIMIT),
        ..Default::default()
    };

    if let Some(first) = args.first() {
        match first.matches('.').count() {
            2 => match normalize_date(first, 3) {
                Some(date) => {
                    query.date = Some(DateFilter::Day(date));
                    query.limit = Some(FILTERED_LIST_LIMIT);
                }
                None => query.sender_id = Some(first.clone()),
            },
            1 => match normalize_date(first, 2) {
                Some(date) => {
                    query.date = Some(DateFilter::Month(date));
                    query.limit = Some(FILTERED_LIST_LIMIT);
                }
                None => query.sender_id = Some(first.clone()),
            },
            _ => {
                if first.len() == 4 && first.chars().all(|c| c.is_ascii_digit()) {
                    query.date = Some(DateFilter::Year(first.clone()));
                    query.limit = Some(FILTERED_LIST_LIMIT);
                } else {
                    match first.parse::<i64>() {
                        Ok(n) if (1..=FILTERED_LIST_LIMIT).contains(&n) => query.limit = Some(n),
                        _ => {
                            query.sender_id = Some(first.clone());
                            query.limit = Some(FILTERED_LIST_LIMIT);
                        }
                    }
                }
            }
        }
    }

    if let Some(second) = args.get(1) {
        if second == "-1" {
            query.limit = None;
        } else if let Ok(n) = second.parse::<i64>() {
            if (1..=FILTERED_LIST_LIMIT).contains(&n) {
                query.limit = Some(n);
            }
        }
    }

    query
}

/// Dot-separated date to the `YYYY-MM-DD` shape SQLite compares against,
/// with short components zero-padded. `parts` is 2 for months, 3 for days.
fn normalize_date(raw: &str, parts: usize) -> Option<String> {
    let pieces: Vec<&str> = raw.split('.').collect();
    if pieces.len() != parts {
        return None;
    }
    let mut out = Vec::with_capacity(parts);
    for (i, piece) in pieces.iter().enumerate() {
        if piece.is_empty() || !piece.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        if i == 0 {
            if piece.len() != 4 {
                return None;
            }
            out.push((*piece).to_string());
        } else {
            if piece.len() > 2 {
                return None;
            }
            out.push(format!("{:0>2}", piece));
        }
    }
    Some(out.join("-"))
}

#[async_trait]
impl Handler for EssenceHandler {
    async fn handle(&self, event: &Event, command: &str, args: &[String]) -> Result<bool> {
        self.table.dispatch(self, event, command, args).await
    }
}
