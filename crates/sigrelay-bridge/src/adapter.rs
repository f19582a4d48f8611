//! Signal adapter — wires the connection manager's decoded events to the
//! router and exposes the event sender as the router's outbound handler.

use crate::access::AccessFilter;
use crate::address_book::AddressBook;
use crate::connection::{ConnectionManager, ConnectionState};
use crate::decoder::PacketDecoder;
use crate::endpoints::BridgeEndpoints;
use crate::error::BridgeResult;
use crate::router::{Connector, EventRouter};
use crate::sender::EventSender;
use async_trait::async_trait;
use sigrelay_types::config::AdapterConfig;
use sigrelay_types::event::NormalizedEvent;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, info_span, Instrument, Span};

/// One Signal account bridged to one router.
pub struct SignalAdapter {
    config: AdapterConfig,
    book: Arc<AddressBook>,
    connection: Arc<ConnectionManager>,
    sender: EventSender,
    router: Arc<dyn EventRouter>,
    span: Span,
}

impl SignalAdapter {
    /// Build an adapter, logging under a `signal_adapter` span.
    ///
    /// Fails if the configuration is invalid; nothing touches the network
    /// until `connect()` and `listen()`.
    pub fn new(config: AdapterConfig, router: Arc<dyn EventRouter>) -> BridgeResult<Self> {
        let span = info_span!("signal_adapter", account = %config.bot_number);
        Self::with_span(config, router, span)
    }

    /// Build an adapter that logs under the given span.
    pub fn with_span(
        config: AdapterConfig,
        router: Arc<dyn EventRouter>,
        span: Span,
    ) -> BridgeResult<Self> {
        config.validate()?;

        let (book, filter, endpoints) = span.in_scope(|| -> BridgeResult<_> {
            let book = Arc::new(AddressBook::from_config(&config));
            let filter = Arc::new(AccessFilter::new(&config.allowed_senders, &book));
            let endpoints = BridgeEndpoints::from_config(&config)?;
            info!(
                rooms = book.len(),
                allow_list = filter.is_enabled(),
                "Signal adapter configured"
            );
            Ok((book, filter, endpoints))
        })?;

        let decoder = PacketDecoder::new(book.clone(), filter, endpoints.clone());
        let connection = Arc::new(ConnectionManager::new(
            endpoints,
            decoder,
            config.poll_interval(),
        ));
        let sender = EventSender::new(connection.clone(), book.clone());

        Ok(Self {
            config,
            book,
            connection,
            sender,
            router,
            span,
        })
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    pub fn address_book(&self) -> &AddressBook {
        &self.book
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.connection.subscribe_state()
    }
}

#[async_trait]
impl Connector for SignalAdapter {
    fn name(&self) -> &str {
        "signal"
    }

    async fn connect(&self) -> BridgeResult<()> {
        self.connection.connect().instrument(self.span.clone()).await
    }

    async fn listen(&self) -> BridgeResult<()> {
        self.connection
            .listen(self.router.as_ref())
            .instrument(self.span.clone())
            .await
    }

    async fn disconnect(&self) -> BridgeResult<()> {
        self.connection.disconnect().instrument(self.span.clone()).await;
        Ok(())
    }

    async fn send(&self, event: &NormalizedEvent) -> BridgeResult<serde_json::Value> {
        self.sender.send(event).instrument(self.span.clone()).await
    }
}
