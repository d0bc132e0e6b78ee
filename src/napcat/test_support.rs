//! Fake transport for handler and dispatcher tests.

use crate::napcat::{BotClient, BotIdentity, EssenceMsg, ForwardNode, MessageDetail};
use crate::types::error::{BotError, Result};
use crate::types::event::Segment;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Group { group_id: i64, message: Vec<Segment> },
    Private { user_id: i64, message: Vec<Segment> },
}

/// Records every outbound call; serves canned essence lists and message
/// lookups.
pub struct MockClient {
    user_id: i64,
    pub essence: Mutex<Vec<EssenceMsg>>,
    pub known_messages: Mutex<HashMap<String, MessageDetail>>,
    pub sent: Mutex<Vec<Sent>>,
    pub forwards: Mutex<Vec<(i64, Vec<ForwardNode>)>>,
}

impl MockClient {
    pub fn new(user_id: i64) -> Self {
        Self {
            user_id,
            essence: Mutex::new(Vec::new()),
            known_messages: Mutex::new(HashMap::new()),
            sent: Mutex::new(Vec::new()),
            forwards: Mutex::new(Vec::new()),
        }
    }

    /// Plain text of every reply sent so far, in order.
    pub fn sent_texts(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|sent| {
                let message = match sent {
                    Sent::Group { message, .. } => message,
                    Sent::Private { message, .. } => message,
                };
                message
                    .iter()
                    .filter_map(|segment| match segment {
                        Segment::Text { text } => Some(text.as_str()),
                        _ => None,
                    })
                    .collect::<String>()
            })
            .collect()
    }

    pub fn forward_count(&self) -> usize {
        self.forwards.lock().unwrap().len()
    }
}

#[async_trait]
impl BotClient for MockClient {
    async fn get_login_info(&self) -> Result<BotIdentity> {
        Ok(BotIdentity {
            user_id: self.user_id,
            nickname: "mock-bot".to_string(),
        })
    }

    async fn send_group_message(&self, group_id: i64, message: Vec<Segment>) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push(Sent::Group { group_id, message });
        Ok(())
    }

    async fn send_private_message(&self, user_id: i64, message: Vec<Segment>) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push(Sent::Private { user_id, message });
        Ok(())
    }

    async fn get_essence_messages(&self, _group_id: i64) -> Result<Vec<EssenceMsg>> {
        Ok(self.essence.lock().unwrap().clone())
    }

    async fn get_message(&self, message_id: &str) -> Result<MessageDetail> {
        self.known_messages
            .lock()
            .unwrap()
            .get(message_id)
            .cloned()
            .ok_or_else(|| BotError::api("get_msg", 1404, "message not found"))
    }

    async fn send_group_forward(&self, group_id: i64, nodes: Vec<ForwardNode>) -> Result<()> {
        self.forwards.lock().unwrap().push((group_id, nodes));
        Ok(())
    }
}
