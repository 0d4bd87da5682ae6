//! The connector abstraction: each transport back-end knows how to establish its byte
//! stream and perform the hello handshake, and yields a pollable transport.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use opcwire_core::comms::{secure_channel::SecureChannel, url::transport_scheme, url::TransportScheme};
use opcwire_types::StatusCode;

use super::{
    core::OutgoingMessage, tcp::TcpConnector, websocket::WebSocketConnector, TransportPollResult,
};

/// Buffer and limit configuration for a transport, sent in the hello message.
#[derive(Debug, Clone)]
pub struct TransportConfiguration {
    /// How many incoming messages may be in flight before requests are rejected.
    pub max_pending_incoming: usize,
    /// The largest chunk this client sends, before the server revises it.
    pub send_buffer_size: usize,
    /// The largest chunk this client is willing to receive.
    pub recv_buffer_size: usize,
    /// The largest assembled message this client accepts, 0 for no limit.
    pub max_message_size: usize,
    /// The most chunks per message this client accepts, 0 for no limit.
    pub max_chunk_count: usize,
}

/// A running transport. Poll it to make anything happen; dropping it closes the
/// connection.
#[async_trait]
pub trait Transport: Send {
    /// Drive the transport one step. Cancel safe.
    async fn poll(&mut self) -> TransportPollResult;
}

/// Establishes a transport for an endpoint.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connect to `endpoint_url`, perform the hello handshake and return the running
    /// transport. The caller enforces the open timeout.
    async fn connect(
        &self,
        channel: Arc<RwLock<SecureChannel>>,
        outgoing_recv: tokio::sync::mpsc::Receiver<OutgoingMessage>,
        config: TransportConfiguration,
        endpoint_url: &str,
    ) -> Result<Box<dyn Transport>, StatusCode>;
}

/// Pick the connector for the scheme of `endpoint_url`.
pub fn connector_for_url(endpoint_url: &str) -> Result<Box<dyn Connector>, StatusCode> {
    match transport_scheme(endpoint_url).map_err(|e| e.status())? {
        TransportScheme::Tcp => Ok(Box::new(TcpConnector)),
        TransportScheme::WebSocket => Ok(Box::new(WebSocketConnector)),
    }
}
