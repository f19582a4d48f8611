//! Seams between the adapter and its host router.

use crate::error::BridgeResult;
use async_trait::async_trait;
use sigrelay_types::event::NormalizedEvent;
use std::fmt;
use tokio::sync::mpsc;

/// The router is gone and accepts no more events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouterClosed;

impl fmt::Display for RouterClosed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("router closed")
    }
}

impl std::error::Error for RouterClosed {}

/// Receives decoded inbound events.
///
/// Events from one packet are submitted in emission order, one awaited
/// call at a time. Returning `RouterClosed` ends the listen loop.
#[async_trait]
pub trait EventRouter: Send + Sync {
    async fn submit(&self, event: NormalizedEvent) -> Result<(), RouterClosed>;
}

#[async_trait]
impl EventRouter for mpsc::Sender<NormalizedEvent> {
    async fn submit(&self, event: NormalizedEvent) -> Result<(), RouterClosed> {
        self.send(event).await.map_err(|_| RouterClosed)
    }
}

/// A chat connector driven by a host: lifecycle plus outbound sends.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connector name, used in logs.
    fn name(&self) -> &str;

    /// Allocate the session.
    async fn connect(&self) -> BridgeResult<()>;

    /// Receive packets and forward decoded events until the source ends or
    /// the session is torn down.
    async fn listen(&self) -> BridgeResult<()>;

    /// Release the session, abandoning in-flight requests.
    async fn disconnect(&self) -> BridgeResult<()>;

    /// Deliver one outbound event, returning the bridge's response body.
    async fn send(&self, event: &NormalizedEvent) -> BridgeResult<serde_json::Value>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigrelay_types::address::Target;

    #[tokio::test]
    async fn test_mpsc_router_forwards_until_closed() {
        let (tx, mut rx) = mpsc::channel(4);
        let event = NormalizedEvent::message(Target::Alias("room".into()), "hi");
        tokio_test::assert_ok!(tx.submit(event.clone()).await);
        assert_eq!(rx.recv().await, Some(event.clone()));

        drop(rx);
        assert_eq!(tx.submit(event).await, Err(RouterClosed));
    }
}
