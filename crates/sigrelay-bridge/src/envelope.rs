//! Wire shapes of packets pushed by the bridge's receive endpoint.
//!
//! Only the sender, display name and timestamp are required. The data and
//! typing payloads, the reaction and each attachment are kept as raw JSON
//! and decoded one at a time, so a malformed part is skipped on its own
//! instead of sinking the packet.

use serde::de::{DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::Value;

/// Top-level packet: `{"envelope": {...}, "account": "..."}`.
#[derive(Debug, Deserialize)]
pub struct Packet {
    pub envelope: Envelope,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub source_number: String,
    pub source_name: String,
    pub timestamp: u64,
    #[serde(default)]
    pub data_message: Option<Value>,
    #[serde(default)]
    pub typing_message: Option<Value>,
}

/// A data payload. A malformed `groupInfo` fails the whole payload, since
/// its events could not be routed to the right conversation.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataMessage {
    #[serde(default, deserialize_with = "lenient")]
    pub message: Option<String>,
    #[serde(default)]
    pub reaction: Option<Value>,
    #[serde(default)]
    pub attachments: Option<Value>,
    #[serde(default)]
    pub group_info: Option<GroupInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupInfo {
    #[serde(default)]
    pub group_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reaction {
    #[serde(default)]
    pub emoji: Option<String>,
    #[serde(default)]
    pub is_remove: Option<bool>,
    #[serde(default)]
    pub target_author_number: Option<String>,
    #[serde(default)]
    pub target_sent_timestamp: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub filename: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub content_type: Option<String>,
}

/// A typing payload. A malformed `groupId` fails it for the same reason as
/// `groupInfo` above.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingMessage {
    #[serde(default, deserialize_with = "lenient")]
    pub action: Option<String>,
    #[serde(default)]
    pub group_id: Option<String>,
}

impl DataMessage {
    pub fn group_id(&self) -> Option<&str> {
        self.group_info.as_ref().and_then(|g| g.group_id.as_deref())
    }

    /// Raw attachment entries. A non-array value counts as none.
    pub fn attachments(&self) -> &[Value] {
        self.attachments
            .as_ref()
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

impl Reaction {
    pub fn is_remove(&self) -> bool {
        self.is_remove.unwrap_or(false)
    }
}

/// Read a field as `T`, treating a value of the wrong type as absent.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Attachment ids are strings, but numeric ids are accepted too.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}
