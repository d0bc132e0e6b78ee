//! OneBot v11 event and message-segment model.
//!
//! NapCat delivers events as JSON objects discriminated by `post_type` and
//! `message_type`. Only group and private message events are modeled as
//! typed structs; everything else is kept raw so the dispatcher can reject
//! it without this module having to know every event family.

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Value};

/// One element of a message. OneBot messages are ordered segment arrays,
/// e.g. `[{"type":"at","data":{"qq":"123"}},{"type":"text","data":{"text":"help"}}]`.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Text {
        text: String,
    },
    At {
        qq: String,
    },
    Reply {
        id: String,
    },
    /// Any segment type this bot does not interpret (image, face, ...),
    /// kept as the raw `{"type": ..., "data": ...}` object so it survives
    /// storage and re-sending unmodified.
    Unknown(Value),
}

impl Segment {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn at(qq: impl Into<String>) -> Self {
        Self::At { qq: qq.into() }
    }

    pub fn reply(id: impl Into<String>) -> Self {
        Self::Reply { id: id.into() }
    }
}

/// NapCat is inconsistent about numeric ids: `qq` and reply `id` arrive as
/// either JSON strings or numbers depending on the packager version.
fn id_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// Hand-rolled instead of a tagged derive: an unmodeled segment type must
// not fail the parse of the whole message, and its payload must round-trip.
impl<'de> Deserialize<'de> for Segment {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        let data = value.get("data");
        match value.get("type").and_then(Value::as_str) {
            Some("text") => {
                let text = data
                    .and_then(|d| d.get("text"))
                    .and_then(Value::as_str)
                    .ok_or_else(|| DeError::missing_field("text"))?
                    .to_string();
                Ok(Segment::Text { text })
            }
            Some("at") => {
                let qq = id_string(data.and_then(|d| d.get("qq")))
                    .ok_or_else(|| DeError::missing_field("qq"))?;
                Ok(Segment::At { qq })
            }
            Some("reply") => {
                let id = id_string(data.and_then(|d| d.get("id")))
                    .ok_or_else(|| DeError::missing_field("id"))?;
                Ok(Segment::Reply { id })
            }
            _ => Ok(Segment::Unknown(value)),
        }
    }
}

impl Serialize for Segment {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Segment::Text { text } => {
                json!({"type": "text", "data": {"text": text}}).serialize(serializer)
            }
            Segment::At { qq } => json!({"type": "at", "data": {"qq": qq}}).serialize(serializer),
            Segment::Reply { id } => {
                json!({"type": "reply", "data": {"id": id}}).serialize(serializer)
            }
            Segment::Unknown(value) => value.serialize(serializer),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sender {
    #[serde(default)]
    pub user_id: i64,
    #[serde(default)]
    pub nickname: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMessageEvent {
    pub group_id: i64,
    pub user_id: i64,
    pub message_id: i64,
    #[serde(default)]
    pub message: Vec<Segment>,
    #[serde(default)]
    pub sender: Sender,
    #[serde(default)]
    pub time: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrivateMessageEvent {
    pub user_id: i64,
    pub message_id: i64,
    #[serde(default)]
    pub message: Vec<Segment>,
    #[serde(default)]
    pub sender: Sender,
    #[serde(default)]
    pub time: i64,
}

/// Which chat a message event came from. Used for handler scope filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatKind {
    Group,
    Private,
}

/// An inbound transport event.
#[derive(Debug, Clone)]
pub enum Event {
    Group(GroupMessageEvent),
    Private(PrivateMessageEvent),
    /// Heartbeats and lifecycle notifications (`post_type = "meta_event"`).
    Meta(serde_json::Value),
    /// Notices, requests and anything else the bot does not handle.
    Other(serde_json::Value),
}

impl Event {
    /// Classify and decode one raw event object from the wire.
    pub fn from_value(value: serde_json::Value) -> Result<Event, serde_json::Error> {
        let post_type = value.get("post_type").and_then(|v| v.as_str());
        match post_type {
            Some("message") => {
                let message_type = value.get("message_type").and_then(|v| v.as_str());
                match message_type {
                    Some("group") => Ok(Event::Group(serde_json::from_value(value)?)),
                    Some("private") => Ok(Event::Private(serde_json::from_value(value)?)),
                    _ => Ok(Event::Other(value)),
                }
            }
            Some("meta_event") => Ok(Event::Meta(value)),
            _ => Ok(Event::Other(value)),
        }
    }

    /// Chat kind for message events; `None` for everything else.
    pub fn chat_kind(&self) -> Option<ChatKind> {
        match self {
            Event::Group(_) => Some(ChatKind::Group),
            Event::Private(_) => Some(ChatKind::Private),
            Event::Meta(_) | Event::Other(_) => None,
        }
    }

    /// Message segments for message events; empty for everything else.
    pub fn segments(&self) -> &[Segment] {
        match self {
            Event::Group(e) => &e.message,
            Event::Private(e) => &e.message,
            Event::Meta(_) | Event::Other(_) => &[],
        }
    }
}
