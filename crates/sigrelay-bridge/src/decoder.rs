//! Packet decoding: one bridge envelope → zero or more normalized events.
//!
//! Decoding is a pure function of the packet and the immutable alias and
//! access tables. Packets missing the sender, name or timestamp and packets
//! from filtered senders yield no events. A malformed data payload, typing
//! payload, reaction or attachment is skipped on its own. Nothing here can
//! fail the listen loop.
//!
//! Events from one packet come out in a fixed order: the reaction or text
//! message, then one media event per attachment in packet order, then the
//! typing notice.

use crate::access::AccessFilter;
use crate::address_book::AddressBook;
use crate::endpoints::BridgeEndpoints;
use crate::envelope::{Attachment, DataMessage, Packet, Reaction, TypingMessage};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use sigrelay_types::address::{Address, Target};
use sigrelay_types::event::{
    EventKind, EventSender, LinkedEvent, Media, MediaKind, NormalizedEvent, TYPING_TIMEOUT,
};
use std::sync::Arc;
use tracing::{debug, info};

/// Fields shared by every event decoded from one envelope.
struct Origin {
    sender: EventSender,
    event_id: u64,
    raw_event: Arc<serde_json::Value>,
}

impl Origin {
    fn event(&self, target: Target, kind: EventKind) -> NormalizedEvent {
        NormalizedEvent {
            target,
            sender: Some(self.sender.clone()),
            event_id: Some(self.event_id),
            raw_event: Some(Arc::clone(&self.raw_event)),
            kind,
        }
    }
}

/// Turns raw bridge packets into normalized events.
#[derive(Debug, Clone)]
pub struct PacketDecoder {
    book: Arc<AddressBook>,
    filter: Arc<AccessFilter>,
    endpoints: BridgeEndpoints,
}

impl PacketDecoder {
    pub fn new(
        book: Arc<AddressBook>,
        filter: Arc<AccessFilter>,
        endpoints: BridgeEndpoints,
    ) -> Self {
        Self {
            book,
            filter,
            endpoints,
        }
    }

    /// Decode one text frame. Frames that are not JSON are dropped.
    pub fn decode_text(&self, text: &str) -> Vec<NormalizedEvent> {
        match serde_json::from_str::<serde_json::Value>(text) {
            Ok(packet) => self.decode(packet),
            Err(e) => {
                debug!(error = %e, "Dropping frame that is not JSON");
                Vec::new()
            }
        }
    }

    /// Decode one packet.
    pub fn decode(&self, packet: serde_json::Value) -> Vec<NormalizedEvent> {
        debug!(packet = %packet, "Parsing packet");

        let envelope = match Packet::deserialize(&packet) {
            Ok(p) => p.envelope,
            Err(e) => {
                debug!(error = %e, "Dropping incomplete packet");
                return Vec::new();
            }
        };

        let user_id = Address::parse(&envelope.source_number);
        if !self.filter.is_allowed(&user_id) {
            debug!(user = %user_id, "Sender not on the allow-list, dropping packet");
            return Vec::new();
        }

        let origin = Origin {
            sender: EventSender {
                user_id,
                display_name: envelope.source_name,
            },
            event_id: envelope.timestamp,
            raw_event: Arc::new(packet),
        };

        let mut events = Vec::new();
        if let Some(data) = envelope
            .data_message
            .as_ref()
            .and_then(|v| part::<DataMessage>(v, "data message"))
        {
            self.decode_data_message(&data, &origin, &mut events);
        }
        if let Some(typing) = envelope
            .typing_message
            .as_ref()
            .and_then(|v| part::<TypingMessage>(v, "typing message"))
        {
            events.push(self.decode_typing(&typing, &origin));
        }

        for event in &events {
            info!(
                kind = event.kind.name(),
                target = %event.target,
                event_id = origin.event_id,
                "Received event"
            );
        }
        events
    }

    /// Target for a conversation: the group when there is one, else the sender.
    fn resolve_target(&self, group_id: Option<&str>, sender: &Address) -> Target {
        match group_id {
            Some(raw) => self.book.resolve_target(&AddressBook::encode_group(raw.as_bytes())),
            None => self.book.resolve_target(sender),
        }
    }

    fn decode_data_message(
        &self,
        data: &DataMessage,
        origin: &Origin,
        events: &mut Vec<NormalizedEvent>,
    ) {
        let target = self.resolve_target(data.group_id(), &origin.sender.user_id);

        if let Some(raw) = &data.reaction {
            if let Some(kind) =
                part::<Reaction>(raw, "reaction").and_then(|r| decode_reaction(&r, &target))
            {
                events.push(origin.event(target.clone(), kind));
            }
        } else if let Some(text) = data.message.as_deref().filter(|t| !t.is_empty()) {
            events.push(origin.event(
                target.clone(),
                EventKind::Message {
                    text: text.to_string(),
                },
            ));
        }

        for raw in data.attachments() {
            let Some(attachment) = part::<Attachment>(raw, "attachment") else {
                continue;
            };
            if let Some(kind) = self.decode_attachment(&attachment) {
                events.push(origin.event(target.clone(), kind));
            }
        }
    }

    fn decode_attachment(&self, attachment: &Attachment) -> Option<EventKind> {
        let Some(id) = attachment.id.as_deref() else {
            debug!("Skipping attachment without id");
            return None;
        };
        let kind = MediaKind::from_mimetype(attachment.content_type.as_deref());
        let media = Media::remote(
            self.endpoints.attachment(id).to_string(),
            attachment.filename.clone(),
            attachment.content_type.clone(),
        );
        Some(EventKind::media(kind, media))
    }

    fn decode_typing(&self, typing: &TypingMessage, origin: &Origin) -> NormalizedEvent {
        let target = self.resolve_target(typing.group_id.as_deref(), &origin.sender.user_id);
        let trigger = typing
            .action
            .as_deref()
            .is_some_and(|a| a.eq_ignore_ascii_case("STARTED"));
        origin.event(
            target,
            EventKind::Typing {
                trigger,
                timeout: TYPING_TIMEOUT,
            },
        )
    }
}

/// Decode one sub-payload, logging and skipping it when malformed.
fn part<T: DeserializeOwned>(raw: &Value, what: &'static str) -> Option<T> {
    match T::deserialize(raw) {
        Ok(v) => Some(v),
        Err(e) => {
            debug!(error = %e, part = what, "Skipping malformed payload part");
            None
        }
    }
}

fn decode_reaction(reaction: &Reaction, target: &Target) -> Option<EventKind> {
    let emoji = if reaction.is_remove() {
        String::new()
    } else {
        match &reaction.emoji {
            Some(emoji) => emoji.clone(),
            None => {
                debug!("Skipping reaction without emoji");
                return None;
            }
        }
    };
    let (Some(author), Some(timestamp)) = (
        reaction.target_author_number.as_deref(),
        reaction.target_sent_timestamp,
    ) else {
        debug!("Skipping reaction without target message");
        return None;
    };
    Some(EventKind::Reaction {
        emoji,
        linked: LinkedEvent {
            user_id: Address::parse(author),
            event_id: timestamp,
            target: target.clone(),
        },
    })
}
