//! Signal bridge adapter.
//!
//! Translates packets from a signal-cli REST bridge into normalized events
//! for a router, and normalized outbound events back into bridge requests.
//!
//! Control flow: [`ConnectionManager`] → raw packet → [`PacketDecoder`] →
//! [`NormalizedEvent`](sigrelay_types::event::NormalizedEvent) →
//! [`EventRouter`]. In the other direction the router hands events to
//! [`SignalAdapter::send`], which dispatches through [`EventSender`].

pub mod access;
pub mod adapter;
pub mod address_book;
pub mod connection;
pub mod decoder;
pub mod endpoints;
pub mod envelope;
pub mod error;
pub mod router;
pub mod sender;

pub use access::AccessFilter;
pub use adapter::SignalAdapter;
pub use address_book::AddressBook;
pub use connection::{BridgeMode, ConnectionManager, ConnectionState};
pub use decoder::PacketDecoder;
pub use endpoints::BridgeEndpoints;
pub use error::{BridgeError, BridgeResult};
pub use router::{Connector, EventRouter, RouterClosed};
pub use sender::EventSender;
