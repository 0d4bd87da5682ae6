//! The client side of the secure conversation: opening the channel with an
//! OpenSecureChannel exchange, renewing the token at three quarters of its lifetime,
//! sending requests and closing down.

use std::{
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
    time::Duration,
};

use arc_swap::{ArcSwap, ArcSwapOption};
use futures::future::BoxFuture;
use futures::FutureExt;
use log::{debug, error};
use parking_lot::RwLock;

use opcwire_core::{
    comms::secure_channel::SecureChannel, Message as _, RequestMessage, ResponseMessage,
};
use opcwire_types::{
    ByteString, Error, MessageSecurityMode, NodeId, OpenSecureChannelRequest, RequestHeader,
    SecurityTokenRequestType, StatusCode,
};

use crate::transport::{
    connector_for_url, Connector, OutgoingMessage, Transport, TransportConfiguration,
    TransportPollResult,
};

/// The timeout on the OpenSecureChannel exchange itself.
const OPEN_SECURE_CHANNEL_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// How often the event loop looks at the token renewal deadline.
const TOKEN_RENEWAL_CHECK_INTERVAL: Duration = Duration::from_secs(1);

pub(crate) type RequestSend = tokio::sync::mpsc::Sender<OutgoingMessage>;

/// Shared request-stamping state: the session authentication token and the request
/// handle counter.
pub(crate) struct SecureChannelState {
    request_handle: AtomicU32,
    auth_token: Arc<ArcSwap<NodeId>>,
}

impl SecureChannelState {
    const FIRST_REQUEST_HANDLE: u32 = 1;

    pub(crate) fn new(auth_token: Arc<ArcSwap<NodeId>>) -> Self {
        SecureChannelState {
            request_handle: AtomicU32::new(Self::FIRST_REQUEST_HANDLE),
            auth_token,
        }
    }

    /// A fresh request handle, wrapping back to the first valid handle.
    pub(crate) fn request_handle(&self) -> u32 {
        self.request_handle
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |x| {
                Some(x.checked_add(1).unwrap_or(Self::FIRST_REQUEST_HANDLE))
            })
            .unwrap_or(Self::FIRST_REQUEST_HANDLE)
    }

    /// The header stamped onto every service request: the stored authentication token,
    /// the current time, a fresh handle and the caller's timeout hint.
    pub(crate) fn make_request_header(&self, timeout: Duration) -> RequestHeader {
        RequestHeader::new(
            &self.auth_token.load(),
            self.request_handle(),
            timeout.as_millis() as u32,
        )
    }

    fn make_open_request(
        &self,
        request_type: SecurityTokenRequestType,
        requested_lifetime: u32,
    ) -> OpenSecureChannelRequest {
        OpenSecureChannelRequest {
            request_header: self.make_request_header(OPEN_SECURE_CHANNEL_REQUEST_TIMEOUT),
            client_protocol_version: opcwire_core::constants::PROTOCOL_VERSION,
            request_type,
            security_mode: MessageSecurityMode::None,
            client_nonce: ByteString::null(),
            requested_lifetime,
        }
    }
}

/// A single request on its way through the channel.
pub(crate) struct Request {
    request: RequestMessage,
    sender: RequestSend,
    timeout: Duration,
}

impl Request {
    pub(crate) fn new(
        request: impl Into<RequestMessage>,
        sender: RequestSend,
        timeout: Duration,
    ) -> Self {
        Self {
            request: request.into(),
            sender,
            timeout,
        }
    }

    /// Hand the request to the transport and wait for the response. The waiter is a
    /// one-shot: no response is ever delivered to the wrong caller.
    pub(crate) async fn send(self) -> Result<ResponseMessage, Error> {
        let (callback, receiver) = tokio::sync::oneshot::channel();
        self.sender
            .send(OutgoingMessage {
                request: self.request,
                callback: Some(callback),
                timeout: self.timeout,
            })
            .await
            .map_err(|_| {
                Error::new(
                    StatusCode::BadServerNotConnected,
                    "The secure channel is not connected",
                )
            })?;
        receiver.await.map_err(|_| {
            Error::new(
                StatusCode::BadConnectionClosed,
                "The connection closed before a response arrived",
            )
        })?
    }
}

/// Wrapper around an open secure channel.
pub struct AsyncSecureChannel {
    endpoint_url: String,
    pub(crate) secure_channel: Arc<RwLock<SecureChannel>>,
    pub(crate) state: Arc<SecureChannelState>,
    transport_config: TransportConfiguration,
    connector: Box<dyn Connector>,
    channel_lifetime: u32,
    connect_timeout: Duration,
    request_send: ArcSwapOption<RequestSend>,
}

impl AsyncSecureChannel {
    /// Create a new client secure channel for `endpoint_url`. Fails if the URL scheme
    /// selects no transport.
    pub fn new(
        endpoint_url: String,
        auth_token: Arc<ArcSwap<NodeId>>,
        transport_config: TransportConfiguration,
        channel_lifetime: u32,
        connect_timeout: Duration,
    ) -> Result<Self, StatusCode> {
        let connector = connector_for_url(&endpoint_url)?;
        Ok(Self {
            endpoint_url,
            secure_channel: Arc::new(RwLock::new(SecureChannel::default())),
            state: Arc::new(SecureChannelState::new(auth_token)),
            transport_config,
            connector,
            channel_lifetime,
            connect_timeout,
            request_send: Default::default(),
        })
    }

    /// The header stamped onto service requests.
    pub(crate) fn make_request_header(&self, timeout: Duration) -> RequestHeader {
        self.state.make_request_header(timeout)
    }

    /// Send a message on the secure channel and wait for the response.
    pub async fn send(
        &self,
        request: impl Into<RequestMessage>,
        timeout: Duration,
    ) -> Result<ResponseMessage, Error> {
        let Some(send) = self.request_send.load().as_deref().cloned() else {
            return Err(Error::new(
                StatusCode::BadServerNotConnected,
                "The secure channel is not connected",
            ));
        };
        Request::new(request, send, timeout).send().await
    }

    /// Attempt to establish a connection, returning an event loop for polling it. The
    /// whole open, from the socket to the issued token, is bounded by the connect
    /// timeout.
    pub async fn connect(&self) -> Result<SecureChannelEventLoop, StatusCode> {
        self.request_send.store(None);
        {
            let mut secure_channel = self.secure_channel.write();
            secure_channel.clear_security_token();
        }

        match tokio::time::timeout(self.connect_timeout, self.connect_inner()).await {
            Ok(result) => result,
            Err(_) => {
                error!(
                    "Timed out connecting to {} after {:?}",
                    self.endpoint_url, self.connect_timeout
                );
                Err(StatusCode::BadTimeout)
            }
        }
    }

    async fn connect_inner(&self) -> Result<SecureChannelEventLoop, StatusCode> {
        let (send, recv) =
            tokio::sync::mpsc::channel(crate::transport::core::SEND_QUEUE_CONCURRENCY);
        let mut transport = self
            .connector
            .connect(
                self.secure_channel.clone(),
                recv,
                self.transport_config.clone(),
                &self.endpoint_url,
            )
            .await?;

        let request = self
            .state
            .make_open_request(SecurityTokenRequestType::Issue, self.channel_lifetime);
        let request_fut = Request::new(
            request,
            send.clone(),
            OPEN_SECURE_CHANNEL_REQUEST_TIMEOUT,
        )
        .send();
        tokio::pin!(request_fut);

        // Poll the transport while the open secure channel exchange is in flight
        let response = loop {
            tokio::select! {
                r = &mut request_fut => break r.map_err(|e| e.status())?,
                r = transport.poll() => {
                    if let TransportPollResult::Closed(e) = r {
                        return Err(e);
                    }
                }
            }
        };

        apply_open_response(&self.secure_channel, response).map_err(|e| e.status())?;
        self.request_send.store(Some(Arc::new(send.clone())));

        Ok(SecureChannelEventLoop {
            transport,
            secure_channel: self.secure_channel.clone(),
            state: self.state.clone(),
            request_send: send,
            channel_lifetime: self.channel_lifetime,
            renew_check: tokio::time::interval(TOKEN_RENEWAL_CHECK_INTERVAL),
            renew_fut: None,
        })
    }

    /// Send a best-effort CloseSecureChannel and forget the connection. Errors are
    /// ignored; the transport closes itself once the request is on the wire.
    pub async fn close_channel(&self) {
        let sender = self.request_send.swap(None);
        let Some(sender) = sender else {
            return;
        };
        let request = opcwire_types::CloseSecureChannelRequest {
            request_header: self.state.make_request_header(Duration::from_secs(5)),
        };
        let message = OutgoingMessage {
            request: request.into(),
            callback: None,
            timeout: Duration::from_secs(5),
        };
        if sender.send(message).await.is_err() {
            debug!("Transport was already gone when closing the secure channel");
        }
    }
}

fn apply_open_response(
    secure_channel: &Arc<RwLock<SecureChannel>>,
    response: ResponseMessage,
) -> Result<(), Error> {
    match response {
        ResponseMessage::OpenSecureChannel(response) => {
            let mut secure_channel = secure_channel.write();
            secure_channel.set_security_token(response.security_token);
            Ok(())
        }
        other => Err(Error::new(
            StatusCode::BadUnexpectedError,
            format!(
                "Expected an open secure channel response, got {:?}",
                other.type_id()
            ),
        )),
    }
}

/// The running connection. Polling it drives the transport and the token renewal.
pub struct SecureChannelEventLoop {
    transport: Box<dyn Transport>,
    secure_channel: Arc<RwLock<SecureChannel>>,
    state: Arc<SecureChannelState>,
    request_send: RequestSend,
    channel_lifetime: u32,
    renew_check: tokio::time::Interval,
    renew_fut: Option<BoxFuture<'static, Result<ResponseMessage, Error>>>,
}

impl SecureChannelEventLoop {
    /// Drive the connection one step.
    pub async fn poll(&mut self) -> TransportPollResult {
        loop {
            if let Some(fut) = &mut self.renew_fut {
                tokio::select! {
                    r = self.transport.poll() => {
                        if matches!(r, TransportPollResult::Closed(_)) {
                            self.renew_fut = None;
                        }
                        return r;
                    }
                    result = fut => {
                        self.renew_fut = None;
                        match result.and_then(|r| apply_open_response(&self.secure_channel, r)) {
                            Ok(()) => {
                                debug!("Secure channel token renewed");
                                return TransportPollResult::IncomingMessage;
                            }
                            Err(e) => {
                                // A channel that cannot renew its token is lost
                                error!("Failed to renew the secure channel token: {}", e);
                                return TransportPollResult::Closed(
                                    StatusCode::BadCommunicationError,
                                );
                            }
                        }
                    }
                }
            } else {
                tokio::select! {
                    r = self.transport.poll() => return r,
                    _ = self.renew_check.tick() => {
                        let should_renew = self.secure_channel.read().should_renew_security_token();
                        if should_renew {
                            let request = self.state.make_open_request(
                                SecurityTokenRequestType::Renew,
                                self.channel_lifetime,
                            );
                            self.renew_fut = Some(
                                Request::new(
                                    request,
                                    self.request_send.clone(),
                                    OPEN_SECURE_CHANNEL_REQUEST_TIMEOUT,
                                )
                                .send()
                                .boxed(),
                            );
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_handles_wrap() {
        let state = SecureChannelState::new(Arc::new(ArcSwap::new(Arc::new(NodeId::null()))));
        state.request_handle.store(u32::MAX, Ordering::SeqCst);
        assert_eq!(state.request_handle(), u32::MAX);
        assert_eq!(state.request_handle(), SecureChannelState::FIRST_REQUEST_HANDLE);
    }
}
