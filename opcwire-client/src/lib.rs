//! An OPC-UA client: transports over TCP and WebSocket, the secure conversation, and
//! sessions with subscriptions that survive a reconnect.
//!
//! The usual path in is the [`ClientBuilder`]:
//!
//! ```no_run
//! use opcwire_client::ClientBuilder;
//!
//! # async fn connect() -> Result<(), opcwire_types::StatusCode> {
//! let client = ClientBuilder::new()
//!     .endpoint_url("opc.tcp://localhost:4840")
//!     .application_name("example")
//!     .client();
//! let (session, event_loop) = client.session()?;
//! event_loop.spawn();
//! session.wait_for_connection().await?;
//! # Ok(())
//! # }
//! ```

mod builder;
mod channel;
mod config;
mod session;
mod transport;

pub use builder::ClientBuilder;
pub use channel::{AsyncSecureChannel, SecureChannelEventLoop};
pub use config::{ClientConfig, IdentityToken, SecurityMode, TransportLimits};
pub use session::{
    Client, DataChangeCallback, MonitoredItem, OnSubscriptionNotification, Session,
    SessionActivity, SessionConnectMode, SessionEventLoop, SessionPollResult, SessionState,
    SubscriptionCallbacks,
};
pub use transport::{
    Connector, Transport, TransportConfiguration, TransportPollResult,
};
