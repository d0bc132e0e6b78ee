//! NapCat (OneBot v11) transport boundary.
//!
//! Handlers never talk to the socket directly; they go through the
//! [`BotClient`] trait so tests can substitute a fake transport. The real
//! implementation lives in [`client::NapcatClient`].

pub mod client;
#[cfg(test)]
pub mod test_support;

pub use client::NapcatClient;

use crate::types::error::Result;
use crate::types::event::{Segment, Sender};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// The bot's own account, as reported by `get_login_info`. The dispatcher
/// matches group mentions against `user_id`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BotIdentity {
    pub user_id: i64,
    #[serde(default)]
    pub nickname: String,
}

/// One entry of `get_essence_msg_list`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EssenceMsg {
    #[serde(default)]
    pub sender_id: i64,
    #[serde(default)]
    pub sender_nick: String,
    #[serde(default)]
    pub operator_id: i64,
    #[serde(default)]
    pub operator_nick: String,
    #[serde(default)]
    pub operator_time: i64,
    #[serde(default)]
    pub message_id: i64,
    #[serde(default)]
    pub msg_seq: i64,
    /// NapCat includes the original segments; absent on some versions.
    #[serde(default)]
    pub content: Vec<Segment>,
}

/// Result of `get_msg` for a single message id.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageDetail {
    pub message_id: i64,
    #[serde(default)]
    pub message_seq: i64,
    #[serde(default)]
    pub sender: Sender,
    #[serde(default)]
    pub message: Vec<Segment>,
    #[serde(default)]
    pub time: i64,
}

/// One node of a forward-message bundle (`send_group_forward_msg`).
#[derive(Debug, Clone, Serialize)]
pub struct ForwardNode {
    pub name: String,
    pub uin: String,
    pub content: Vec<Segment>,
    pub time: i64,
}

/// Message-send and query primitives the handlers rely on.
#[async_trait]
pub trait BotClient: Send + Sync {
    async fn get_login_info(&self) -> Result<BotIdentity>;

    async fn send_group_message(&self, group_id: i64, message: Vec<Segment>) -> Result<()>;

    async fn send_private_message(&self, user_id: i64, message: Vec<Segment>) -> Result<()>;

    async fn get_essence_messages(&self, group_id: i64) -> Result<Vec<EssenceMsg>>;

    async fn get_message(&self, message_id: &str) -> Result<MessageDetail>;

    async fn send_group_forward(&self, group_id: i64, nodes: Vec<ForwardNode>) -> Result<()>;
}
