//! The session layer: an authenticated context on the server, the service call
//! wrappers, and the event loop that keeps the connection and the subscriptions alive.

mod client;
mod connect;
mod event_loop;
pub(crate) mod services;
pub(crate) mod subscriptions;

pub use client::Client;
pub use connect::SessionConnectMode;
pub use event_loop::{SessionActivity, SessionEventLoop, SessionPollResult};
pub use subscriptions::{
    DataChangeCallback, MonitoredItem, OnSubscriptionNotification, SubscriptionCallbacks,
};

use std::{
    sync::{
        atomic::{AtomicBool, AtomicU32, Ordering},
        Arc,
    },
    time::Duration,
};

use arc_swap::ArcSwap;
use log::info;
use parking_lot::Mutex;
use tokio::time::Instant;

use opcwire_core::{RequestMessage, ResponseMessage};
use opcwire_types::{
    ApplicationDescription, ApplicationType, Error, LocalizedText, NodeId, ResponseHeader,
    StatusCode, UAString,
};

use crate::{
    channel::AsyncSecureChannel,
    config::{ClientConfig, IdentityToken},
    transport::TransportConfiguration,
};
use subscriptions::state::SubscriptionState;

#[allow(unused)]
macro_rules! session_warn {
    ($session: expr, $($arg:tt)*) =>  {
        log::warn!("session:{} {}", $session.session_id(), format!($($arg)*));
    }
}
#[allow(unused)]
pub(crate) use session_warn;

#[allow(unused)]
macro_rules! session_error {
    ($session: expr, $($arg:tt)*) =>  {
        log::error!("session:{} {}", $session.session_id(), format!($($arg)*));
    }
}
#[allow(unused)]
pub(crate) use session_error;

#[allow(unused)]
macro_rules! session_debug {
    ($session: expr, $($arg:tt)*) =>  {
        log::debug!("session:{} {}", $session.session_id(), format!($($arg)*));
    }
}
#[allow(unused)]
pub(crate) use session_debug;

/// The connection state of the session, observable through
/// [`Session::state_watch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No connection, and no attempt in progress.
    Disconnected,
    /// A connection attempt is in progress.
    Connecting,
    /// The session is activated and usable.
    Connected,
}

/// An OPC-UA session. All the service methods live on this type; the returned
/// [`SessionEventLoop`] must be polled (or spawned) for any of them to make progress.
pub struct Session {
    pub(crate) channel: AsyncSecureChannel,
    pub(crate) state_watch_tx: tokio::sync::watch::Sender<SessionState>,
    pub(crate) state_watch_rx: tokio::sync::watch::Receiver<SessionState>,
    /// The server assigned session id, for diagnostics.
    pub(crate) session_id: Arc<ArcSwap<NodeId>>,
    /// The secret token authorizing requests, stamped into every request header.
    pub(crate) auth_token: Arc<ArcSwap<NodeId>>,
    pub(crate) session_name: UAString,
    pub(crate) application_description: ApplicationDescription,
    pub(crate) endpoint_url: String,
    pub(crate) user_identity_token: IdentityToken,
    pub(crate) requested_session_timeout: f64,
    /// Default request timeout hint, and the padding added to publish timeouts.
    pub(crate) request_timeout: Duration,
    pub(crate) auto_reconnect: bool,
    pub(crate) reconnect_timeout: Duration,
    pub(crate) keep_alive_interval: Duration,
    /// Cleared by a user initiated disconnect to suppress reconnect attempts.
    pub(crate) should_reconnect: AtomicBool,
    pub(crate) subscription_state: Mutex<SubscriptionState>,
    /// The identity policies of the endpoint, learned at session creation.
    pub(crate) user_token_policies: Mutex<Vec<opcwire_types::UserTokenPolicy>>,
    /// Source of client handles for monitored items.
    monitored_item_handle: AtomicU32,
    /// Wakes the publish loop when the subscription set changes.
    pub(crate) trigger_publish_tx: tokio::sync::watch::Sender<Instant>,
}

impl Session {
    pub(crate) fn new(config: ClientConfig) -> Result<(Arc<Session>, SessionEventLoop), StatusCode> {
        let auth_token: Arc<ArcSwap<NodeId>> = Default::default();
        let request_timeout = Duration::from_millis(config.timeout_ms);

        let channel = AsyncSecureChannel::new(
            config.endpoint_url.clone(),
            auth_token.clone(),
            TransportConfiguration {
                max_pending_incoming: config.transport_limits.max_inflight_messages,
                send_buffer_size: config.transport_limits.send_buffer_size,
                recv_buffer_size: config.transport_limits.recv_buffer_size,
                max_message_size: config.transport_limits.max_message_size,
                max_chunk_count: config.transport_limits.max_chunk_count,
            },
            config.requested_lifetime_ms,
            request_timeout,
        )?;

        let (state_watch_tx, state_watch_rx) =
            tokio::sync::watch::channel(SessionState::Disconnected);
        let (trigger_publish_tx, trigger_publish_rx) =
            tokio::sync::watch::channel(Instant::now());

        let session = Arc::new(Session {
            channel,
            state_watch_tx,
            state_watch_rx,
            session_id: Default::default(),
            auth_token,
            session_name: UAString::from(config.session_name),
            application_description: ApplicationDescription {
                application_uri: UAString::from(config.application_uri),
                product_uri: UAString::from(config.product_uri),
                application_name: LocalizedText::from(config.application_name),
                application_type: ApplicationType::Client,
                ..Default::default()
            },
            endpoint_url: config.endpoint_url,
            user_identity_token: config.user_identity_token,
            requested_session_timeout: config.requested_session_timeout_ms as f64,
            request_timeout,
            auto_reconnect: config.auto_reconnect,
            reconnect_timeout: Duration::from_millis(config.reconnect_timeout_ms),
            keep_alive_interval: Duration::from_millis(config.keep_alive_interval_ms),
            should_reconnect: AtomicBool::new(true),
            subscription_state: Mutex::new(SubscriptionState::new()),
            user_token_policies: Mutex::new(Vec::new()),
            monitored_item_handle: AtomicU32::new(1),
            trigger_publish_tx,
        });

        let event_loop = SessionEventLoop::new(session.clone(), trigger_publish_rx);
        Ok((session, event_loop))
    }

    /// The server assigned session id, null before the first connect.
    pub fn session_id(&self) -> Arc<NodeId> {
        self.session_id.load_full()
    }

    /// A watch over the connection state, for observing `connected` and `disconnected`
    /// transitions.
    pub fn state_watch(&self) -> tokio::sync::watch::Receiver<SessionState> {
        self.state_watch_rx.clone()
    }

    /// Wait until the session is connected and activated. Fails if the event loop gives
    /// up or is dropped.
    pub async fn wait_for_connection(&self) -> Result<(), StatusCode> {
        let mut rx = self.state_watch_rx.clone();
        rx.wait_for(|state| *state == SessionState::Connected)
            .await
            .map(|_| ())
            .map_err(|_| StatusCode::BadServerNotConnected)
    }

    /// Send a service request with the standard header stamped on, and wait for its
    /// response.
    pub(crate) async fn send(
        &self,
        request: impl Into<RequestMessage>,
    ) -> Result<ResponseMessage, Error> {
        let mut request = request.into();
        *request.request_header_mut() = self.channel.make_request_header(self.request_timeout);
        self.send_with_timeout(request, self.request_timeout).await
    }

    /// Send a stamped request with an explicit timeout, used by the publish loop which
    /// pads its timeout with the publishing interval.
    pub(crate) async fn send_with_timeout(
        &self,
        request: RequestMessage,
        timeout: Duration,
    ) -> Result<ResponseMessage, Error> {
        self.channel.send(request, timeout).await
    }

    /// A fresh client handle for a monitored item.
    pub(crate) fn next_monitored_item_handle(&self) -> u32 {
        self.monitored_item_handle.fetch_add(1, Ordering::SeqCst)
    }

    /// Wake the publish loop, e.g. because a subscription was created.
    pub(crate) fn trigger_publish(&self) {
        let _ = self.trigger_publish_tx.send(Instant::now());
    }

    pub(crate) fn should_reconnect(&self) -> bool {
        self.auto_reconnect && self.should_reconnect.load(Ordering::Relaxed)
    }
}

/// Process the service result, i.e. where the request "succeeded" but the response
/// contains a failure status code.
pub(crate) fn process_service_result(response_header: &ResponseHeader) -> Result<(), Error> {
    if response_header.service_result.is_bad() {
        info!(
            "Received a bad service result {} from the request",
            response_header.service_result
        );
        Err(Error::new(
            response_header.service_result,
            "The service call failed",
        )
        .with_request_handle(response_header.request_handle))
    } else {
        Ok(())
    }
}

/// The status code to surface for a response of the wrong type.
pub(crate) fn process_unexpected_response(response: ResponseMessage) -> Error {
    match response {
        ResponseMessage::ServiceFault(service_fault) => {
            log::error!(
                "Received a service fault of {} for the request",
                service_fault.response_header.service_result
            );
            Error::new(
                service_fault.response_header.service_result,
                "The service call failed",
            )
            .with_request_handle(service_fault.response_header.request_handle)
        }
        _ => {
            log::error!("Received an unexpected response to the request");
            Error::new(
                StatusCode::BadUnknownResponse,
                "The response does not match the request type",
            )
        }
    }
}
