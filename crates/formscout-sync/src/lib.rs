//! Messaging layer between the page agent and UI consumers: a connection
//! state machine with retry/backoff, a bounded expiring queue, and a
//! last-known-result cache for offline display.

mod error;

pub mod cache;
pub mod channel;
pub mod consumer;
pub mod queue;
pub mod transport;

#[cfg(feature = "http")]
pub mod http;

pub use cache::ResultCache;
pub use channel::{Channel, ConnectionState, ConnectionStatus, Delivery};
pub use consumer::{Applied, ResultView};
pub use error::{ChannelError, TransportError};
pub use queue::{MessageQueue, QueuedMessage};
pub use transport::{LoopbackTransport, Transport};

#[cfg(feature = "http")]
pub use http::HttpTransport;
