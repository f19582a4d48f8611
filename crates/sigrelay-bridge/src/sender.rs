//! Outbound path: one normalized event → one bridge request.
//!
//! | Event                  | Request                                   |
//! |------------------------|-------------------------------------------|
//! | Message                | `POST /v2/send` with `message`            |
//! | Image / Video / File   | `POST /v2/send` with `base64_attachments` |
//! | Typing (started)       | `PUT /v1/typing-indicator/{number}`       |
//! | Typing (stopped)       | `DELETE /v1/typing-indicator/{number}`    |
//! | Reaction (emoji)       | `POST /v1/reactions/{number}`             |
//! | Reaction (empty emoji) | `DELETE /v1/reactions/{number}`           |
//!
//! Targets are translated back from room aliases to bridge addresses
//! before sending.

use crate::address_book::AddressBook;
use crate::connection::{response_body, ConnectionManager, SessionHandle};
use crate::error::{BridgeError, BridgeResult};
use base64::Engine;
use bytes::Bytes;
use reqwest::Method;
use serde_json::json;
use sigrelay_types::address::Target;
use sigrelay_types::event::{EventKind, LinkedEvent, Media, MediaSource, NormalizedEvent};
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

/// A fully resolved bridge request, ready to send.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: Url,
    pub body: serde_json::Value,
}

/// Serializes outbound events into bridge requests and sends them over the
/// shared session.
pub struct EventSender {
    connection: Arc<ConnectionManager>,
    book: Arc<AddressBook>,
}

impl EventSender {
    pub fn new(connection: Arc<ConnectionManager>, book: Arc<AddressBook>) -> Self {
        Self { connection, book }
    }

    /// Send `event` and return the bridge's response body.
    pub async fn send(&self, event: &NormalizedEvent) -> BridgeResult<serde_json::Value> {
        let handle = self.connection.session().await?;
        info!(kind = event.kind.name(), target = %event.target, "Sending event");

        let request = match media_of(&event.kind) {
            Some(media) => {
                let content = handle.run(fetch_media(&handle, media)).await?;
                self.build_request(event, Some(&content))?
            }
            None => self.build_request(event, None)?,
        };

        let OutboundRequest { method, url, body: payload } = request;
        let body = handle
            .run(async {
                let resp = handle
                    .client()
                    .request(method, url)
                    .json(&payload)
                    .send()
                    .await?;
                response_body(resp).await
            })
            .await?;
        debug!(result = %body, "Bridge response");
        Ok(body)
    }

    /// Map an event to its request. Media events need their content in
    /// `attachment`, unless the content is already inline.
    pub fn build_request(
        &self,
        event: &NormalizedEvent,
        attachment: Option<&[u8]>,
    ) -> BridgeResult<OutboundRequest> {
        let endpoints = self.connection.endpoints();
        let target = &event.target;

        let request = match &event.kind {
            EventKind::Message { text } => OutboundRequest {
                method: Method::POST,
                url: endpoints.send(),
                body: json!({
                    "number": endpoints.number(),
                    "recipients": self.recipients(target),
                    "message": text,
                }),
            },
            EventKind::Image(media) | EventKind::Video(media) | EventKind::File(media) => {
                let content = match (attachment, &media.source) {
                    (Some(bytes), _) => bytes,
                    (None, MediaSource::Inline(bytes)) => bytes.as_ref(),
                    (None, MediaSource::Remote(url)) => {
                        return Err(BridgeError::Protocol(format!(
                            "media content from {url} has not been fetched"
                        )))
                    }
                };
                OutboundRequest {
                    method: Method::POST,
                    url: endpoints.send(),
                    body: json!({
                        "number": endpoints.number(),
                        "recipients": self.recipients(target),
                        "base64_attachments": [
                            base64::engine::general_purpose::STANDARD.encode(content),
                        ],
                    }),
                }
            }
            EventKind::Typing { trigger, .. } => OutboundRequest {
                method: if *trigger { Method::PUT } else { Method::DELETE },
                url: endpoints.typing_indicator(),
                body: json!({ "recipient": self.recipient(target)? }),
            },
            EventKind::Reaction { emoji, linked } => self.reaction_request(target, emoji, linked)?,
        };
        Ok(request)
    }

    fn reaction_request(
        &self,
        target: &Target,
        emoji: &str,
        linked: &LinkedEvent,
    ) -> BridgeResult<OutboundRequest> {
        let endpoints = self.connection.endpoints();
        Ok(OutboundRequest {
            method: if emoji.is_empty() {
                Method::DELETE
            } else {
                Method::POST
            },
            url: endpoints.reactions(),
            body: json!({
                "reaction": emoji,
                "recipient": self.recipient(target)?,
                "target_author": linked.user_id.as_str(),
                "timestamp": linked.event_id,
            }),
        })
    }

    /// Recipient list for `/v2/send`: one entry, or none for an empty target.
    fn recipients(&self, target: &Target) -> Vec<String> {
        self.book
            .recipient(target)
            .map(|a| a.as_str().to_string())
            .into_iter()
            .collect()
    }

    fn recipient(&self, target: &Target) -> BridgeResult<String> {
        self.book
            .recipient(target)
            .map(|a| a.as_str().to_string())
            .ok_or_else(|| BridgeError::NoRecipient(target.to_string()))
    }
}

fn media_of(kind: &EventKind) -> Option<&Media> {
    match kind {
        EventKind::Image(media) | EventKind::Video(media) | EventKind::File(media) => Some(media),
        _ => None,
    }
}

/// Resolve a media event's lazy byte source.
async fn fetch_media(handle: &SessionHandle, media: &Media) -> BridgeResult<Bytes> {
    match &media.source {
        MediaSource::Inline(bytes) => Ok(bytes.clone()),
        MediaSource::Remote(url) => {
            debug!(url = %url, "Fetching media content");
            let resp = handle.client().get(url.as_str()).send().await?;
            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(BridgeError::Api {
                    status: status.as_u16(),
                    body,
                });
            }
            Ok(resp.bytes().await?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::AccessFilter;
    use crate::decoder::PacketDecoder;
    use crate::endpoints::BridgeEndpoints;
    use sigrelay_types::address::Address;
    use std::time::Duration;

    fn sender_with(book: AddressBook) -> EventSender {
        let endpoints = BridgeEndpoints::new("http://localhost:8080", "+10").unwrap();
        let book = Arc::new(book);
        let decoder = PacketDecoder::new(
            book.clone(),
            Arc::new(AccessFilter::allow_all()),
            endpoints.clone(),
        );
        let connection = Arc::new(ConnectionManager::new(
            endpoints,
            decoder,
            Duration::from_secs(10),
        ));
        EventSender::new(connection, book)
    }

    fn sender() -> EventSender {
        sender_with(AddressBook::new([("room", "group.ZzE=")]))
    }

    fn phone(raw: &str) -> Target {
        Target::Address(Address::parse(raw))
    }

    fn linked() -> LinkedEvent {
        LinkedEvent {
            user_id: Address::parse("+9"),
            event_id: 42,
            target: phone("+1"),
        }
    }

    #[test]
    fn test_message_request() {
        let event = NormalizedEvent::message(phone("+1"), "hi");
        let request = sender().build_request(&event, None).unwrap();
        assert_eq!(request.method, Method::POST);
        assert_eq!(request.url.as_str(), "http://localhost:8080/v2/send");
        assert_eq!(
            request.body,
            json!({"number": "+10", "recipients": ["+1"], "message": "hi"})
        );
    }

    #[test]
    fn test_alias_translated_back() {
        let event = NormalizedEvent::message(Target::Alias("room".into()), "hi");
        let request = sender().build_request(&event, None).unwrap();
        assert_eq!(request.body["recipients"], json!(["group.ZzE="]));
    }

    #[test]
    fn test_empty_target_sends_no_recipients() {
        let event = NormalizedEvent::message(Target::Alias(String::new()), "hi");
        let request = sender().build_request(&event, None).unwrap();
        assert_eq!(request.body["recipients"], json!([]));
    }

    #[test]
    fn test_file_request_encodes_content() {
        let event = NormalizedEvent::outbound(
            phone("+1"),
            EventKind::Image(Media::inline(&b"abc"[..], Some("image/png".into()))),
        );
        let request = sender().build_request(&event, None).unwrap();
        assert_eq!(request.method, Method::POST);
        assert_eq!(request.body["base64_attachments"], json!(["YWJj"]));
        assert!(request.body.get("message").is_none());

        let remote = NormalizedEvent::outbound(
            phone("+1"),
            EventKind::File(Media::remote("http://x/1", None, None)),
        );
        assert!(sender().build_request(&remote, None).is_err());
        let request = sender().build_request(&remote, Some(&b"abc"[..])).unwrap();
        assert_eq!(request.body["base64_attachments"], json!(["YWJj"]));
    }

    #[test]
    fn test_typing_start_and_stop() {
        let start = sender()
            .build_request(&NormalizedEvent::typing(phone("+1"), true), None)
            .unwrap();
        assert_eq!(start.method, Method::PUT);
        assert_eq!(
            start.url.as_str(),
            "http://localhost:8080/v1/typing-indicator/%2B10"
        );
        assert_eq!(start.body, json!({"recipient": "+1"}));

        let stop = sender()
            .build_request(&NormalizedEvent::typing(phone("+1"), false), None)
            .unwrap();
        assert_eq!(stop.method, Method::DELETE);
        assert_eq!(stop.url, start.url);
    }

    #[test]
    fn test_reaction_add_and_remove() {
        let add = sender()
            .build_request(&NormalizedEvent::reaction(phone("+1"), "👍", linked()), None)
            .unwrap();
        assert_eq!(add.method, Method::POST);
        assert_eq!(add.url.as_str(), "http://localhost:8080/v1/reactions/%2B10");
        assert_eq!(
            add.body,
            json!({
                "reaction": "👍",
                "recipient": "+1",
                "target_author": "+9",
                "timestamp": 42
            })
        );

        let remove = sender()
            .build_request(&NormalizedEvent::reaction(phone("+1"), "", linked()), None)
            .unwrap();
        assert_eq!(remove.method, Method::DELETE);
        assert_eq!(remove.body["reaction"], "");
    }

    #[test]
    fn test_indicator_without_recipient_fails() {
        let err = sender()
            .build_request(
                &NormalizedEvent::typing(Target::Alias(String::new()), true),
                None,
            )
            .unwrap_err();
        assert!(matches!(err, BridgeError::NoRecipient(_)));
    }

    #[tokio::test]
    async fn test_send_requires_session() {
        let event = NormalizedEvent::message(phone("+1"), "hi");
        let err = sender().send(&event).await.unwrap_err();
        assert!(matches!(err, BridgeError::NotConnected));
    }
}
