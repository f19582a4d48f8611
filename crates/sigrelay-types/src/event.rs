//! Normalized events exchanged between the bridge adapter and the router.
//!
//! Inbound packets are decoded into these, and outbound events built by the
//! router are serialized from them. The variant set is closed: adding an
//! outbound kind means adding a variant and one match arm in the sender.

use crate::address::{Address, Target};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// How long a consumer should keep a typing indicator before clearing it.
pub const TYPING_TIMEOUT: Duration = Duration::from_secs(15);

/// The account that produced an inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventSender {
    /// Backend address of the sender.
    pub user_id: Address,
    /// Display name reported by the bridge.
    pub display_name: String,
}

/// Reference to the message a reaction points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedEvent {
    /// Author of the reacted-to message.
    pub user_id: Address,
    /// Timestamp identifying the reacted-to message.
    pub event_id: u64,
    /// Conversation the reacted-to message lives in.
    pub target: Target,
}

/// Where the bytes of a media event come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource {
    /// Content already in memory.
    Inline(Bytes),
    /// Content fetched on demand from a URL.
    Remote(String),
}

/// An image, video or generic file attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Media {
    pub source: MediaSource,
    /// Original filename, if the sender supplied one.
    pub name: Option<String>,
    /// MIME type, if known.
    pub mimetype: Option<String>,
}

impl Media {
    /// Remote media identified by a download URL.
    pub fn remote(url: impl Into<String>, name: Option<String>, mimetype: Option<String>) -> Self {
        Self {
            source: MediaSource::Remote(url.into()),
            name,
            mimetype,
        }
    }

    /// In-memory media.
    pub fn inline(bytes: impl Into<Bytes>, mimetype: Option<String>) -> Self {
        Self {
            source: MediaSource::Inline(bytes.into()),
            name: None,
            mimetype,
        }
    }

    /// Download URL, when the content is remote.
    pub fn url(&self) -> Option<&str> {
        match &self.source {
            MediaSource::Remote(url) => Some(url),
            MediaSource::Inline(_) => None,
        }
    }
}

/// Media category selected from a MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
    File,
}

impl MediaKind {
    /// `image/*` is an image, `video/*` a video, anything else (or nothing) a file.
    pub fn from_mimetype(mimetype: Option<&str>) -> Self {
        let top_level = mimetype.and_then(|m| m.split('/').next()).unwrap_or("");
        match top_level {
            "image" => MediaKind::Image,
            "video" => MediaKind::Video,
            _ => MediaKind::File,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Image => write!(f, "image"),
            MediaKind::Video => write!(f, "video"),
            MediaKind::File => write!(f, "file"),
        }
    }
}

/// The payload variants of a normalized event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// A plain text message.
    Message { text: String },
    /// A reaction to an earlier message. An empty emoji means removal.
    Reaction { emoji: String, linked: LinkedEvent },
    /// Typing indicator started (`trigger = true`) or stopped.
    Typing { trigger: bool, timeout: Duration },
    Image(Media),
    Video(Media),
    File(Media),
}

impl EventKind {
    /// Wrap media in the variant matching `kind`.
    pub fn media(kind: MediaKind, media: Media) -> Self {
        match kind {
            MediaKind::Image => EventKind::Image(media),
            MediaKind::Video => EventKind::Video(media),
            MediaKind::File => EventKind::File(media),
        }
    }

    /// Short variant name, used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Message { .. } => "message",
            EventKind::Reaction { .. } => "reaction",
            EventKind::Typing { .. } => "typing",
            EventKind::Image(_) => "image",
            EventKind::Video(_) => "video",
            EventKind::File(_) => "file",
        }
    }
}

/// One event handed to (or received from) the router.
///
/// Inbound events always carry a sender, an event id (the envelope
/// timestamp) and the raw packet they were decoded from. Outbound events
/// built by a host only need a target and a kind.
#[derive(Debug, Clone)]
pub struct NormalizedEvent {
    /// Resolved destination: a room alias when configured, else the raw address.
    pub target: Target,
    pub sender: Option<EventSender>,
    /// Envelope timestamp in milliseconds; also the ordering key.
    pub event_id: Option<u64>,
    /// The packet this event was decoded from, for diagnostics.
    pub raw_event: Option<Arc<serde_json::Value>>,
    pub kind: EventKind,
}

impl NormalizedEvent {
    /// Build an outbound event for `target`.
    pub fn outbound(target: Target, kind: EventKind) -> Self {
        Self {
            target,
            sender: None,
            event_id: None,
            raw_event: None,
            kind,
        }
    }

    /// Outbound text message.
    pub fn message(target: Target, text: impl Into<String>) -> Self {
        Self::outbound(target, EventKind::Message { text: text.into() })
    }

    /// Outbound typing indicator.
    pub fn typing(target: Target, trigger: bool) -> Self {
        Self::outbound(
            target,
            EventKind::Typing {
                trigger,
                timeout: TYPING_TIMEOUT,
            },
        )
    }

    /// Outbound reaction; pass an empty emoji to remove an earlier one.
    pub fn reaction(target: Target, emoji: impl Into<String>, linked: LinkedEvent) -> Self {
        Self::outbound(
            target,
            EventKind::Reaction {
                emoji: emoji.into(),
                linked,
            },
        )
    }

    /// Backend address of the sender, for inbound events.
    pub fn user_id(&self) -> Option<&Address> {
        self.sender.as_ref().map(|s| &s.user_id)
    }

    /// Wall-clock send time derived from the envelope timestamp.
    pub fn sent_at(&self) -> Option<DateTime<Utc>> {
        self.event_id
            .and_then(|ms| i64::try_from(ms).ok())
            .and_then(DateTime::from_timestamp_millis)
    }

    /// Text body, for message events.
    pub fn text(&self) -> Option<&str> {
        match &self.kind {
            EventKind::Message { text } => Some(text),
            _ => None,
        }
    }
}

impl PartialEq for NormalizedEvent {
    fn eq(&self, other: &Self) -> bool {
        self.target == other.target
            && self.sender == other.sender
            && self.event_id == other.event_id
            && self.kind == other.kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mimetype_dispatch() {
        assert_eq!(MediaKind::from_mimetype(Some("image/png")), MediaKind::Image);
        assert_eq!(MediaKind::from_mimetype(Some("video/mp4")), MediaKind::Video);
        assert_eq!(
            MediaKind::from_mimetype(Some("application/pdf")),
            MediaKind::File
        );
        assert_eq!(MediaKind::from_mimetype(None), MediaKind::File);
        assert_eq!(MediaKind::from_mimetype(Some("")), MediaKind::File);
    }

    #[test]
    fn test_sent_at_from_millis() {
        let mut event = NormalizedEvent::message(Target::Alias("room".into()), "hi");
        assert!(event.sent_at().is_none());
        event.event_id = Some(1_700_000_000_000);
        let sent = event.sent_at().unwrap();
        assert_eq!(sent.timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_typing_carries_timeout() {
        let event = NormalizedEvent::typing(Target::Alias("room".into()), true);
        assert_eq!(
            event.kind,
            EventKind::Typing {
                trigger: true,
                timeout: Duration::from_secs(15)
            }
        );
        assert_eq!(event.kind.name(), "typing");
    }
}
