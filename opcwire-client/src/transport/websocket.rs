//! The WebSocket transport back-end. Frames of the connection protocol travel inside
//! binary WebSocket messages, one chunk per message on send; on receive the payloads are
//! run through the same codec as the TCP byte stream, so a peer may pack several frames
//! into one message.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::BytesMut;
use futures::{SinkExt, StreamExt};
use log::{debug, error};
use parking_lot::RwLock;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        client::IntoClientRequest, http::HeaderValue, protocol::Message as WsMessage,
    },
    MaybeTlsStream, WebSocketStream,
};
use tokio_util::codec::Decoder;

use opcwire_core::comms::{
    secure_channel::SecureChannel,
    tcp_codec::{Message, TcpCodec},
    tcp_types::{AcknowledgeMessage, HelloMessage},
    url::websocket_url,
};
use opcwire_core::RequestMessage;
use opcwire_types::{BinaryEncodable, StatusCode};

use super::{
    buffer::SendBuffer,
    connect::{Connector, Transport, TransportConfiguration},
    core::{OutgoingMessage, TransportPollResult, TransportState},
    tcp::wait_for_acknowledge,
};

/// The sub-protocol announced during the WebSocket upgrade.
const BINARY_SUB_PROTOCOL: &str = "opcua+uacp";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone, Copy)]
enum TransportCloseState {
    Open,
    Closing(StatusCode),
    Closed(StatusCode),
}

/// The transport over a WebSocket connection.
pub struct WebSocketTransport {
    state: TransportState,
    stream: WsStream,
    codec: TcpCodec,
    receive_buffer: BytesMut,
    send_buffer: SendBuffer,
    flush_needed: bool,
    should_close: bool,
    closed: TransportCloseState,
}

/// Connects the WebSocket transport.
pub struct WebSocketConnector;

impl WebSocketConnector {
    async fn connect_inner(
        secure_channel: &RwLock<SecureChannel>,
        config: &TransportConfiguration,
        endpoint_url: &str,
    ) -> Result<(WsStream, TcpCodec, BytesMut, AcknowledgeMessage), StatusCode> {
        let url = websocket_url(endpoint_url).map_err(|e| e.status())?;
        let mut request = url.clone().into_client_request().map_err(|e| {
            error!("Endpoint url {} is not a valid request: {}", endpoint_url, e);
            StatusCode::BadTcpEndpointUrlInvalid
        })?;
        request.headers_mut().insert(
            "Sec-WebSocket-Protocol",
            HeaderValue::from_static(BINARY_SUB_PROTOCOL),
        );

        debug!("Connecting to websocket endpoint {}", url);
        let (mut stream, _) = connect_async(request).await.map_err(|e| {
            error!("Could not connect to {}: {}", url, e);
            StatusCode::BadCommunicationError
        })?;

        let mut codec = {
            let secure_channel = secure_channel.read();
            TcpCodec::new(secure_channel.decoding_options())
        };

        let hello = HelloMessage::new(
            endpoint_url,
            config.send_buffer_size,
            config.recv_buffer_size,
            config.max_message_size,
            config.max_chunk_count,
        );
        log::trace!("Sending hello message: {hello:?}");
        stream
            .send(WsMessage::Binary(hello.encode_to_vec()))
            .await
            .map_err(|e| {
                error!("Cannot send hello to server, err = {}", e);
                StatusCode::BadCommunicationError
            })?;

        // The acknowledge arrives in the first binary message
        let mut receive_buffer = BytesMut::new();
        let first = loop {
            match stream.next().await {
                Some(Ok(WsMessage::Binary(data))) => {
                    receive_buffer.extend_from_slice(&data);
                    match codec.decode(&mut receive_buffer) {
                        Ok(Some(message)) => break Some(Ok(message)),
                        Ok(None) => continue,
                        Err(e) => break Some(Err(e)),
                    }
                }
                Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_))) => continue,
                other => {
                    error!("Unexpected websocket message during handshake: {:?}", other);
                    break None;
                }
            }
        };
        let ack = wait_for_acknowledge(first)?;
        Ok((stream, codec, receive_buffer, ack))
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(
        &self,
        channel: Arc<RwLock<SecureChannel>>,
        outgoing_recv: tokio::sync::mpsc::Receiver<OutgoingMessage>,
        config: TransportConfiguration,
        endpoint_url: &str,
    ) -> Result<Box<dyn Transport>, StatusCode> {
        let (stream, codec, receive_buffer, ack) =
            Self::connect_inner(&channel, &config, endpoint_url).await?;

        let mut buffer = SendBuffer::new(
            config.send_buffer_size,
            config.max_message_size,
            config.max_chunk_count,
        );
        buffer.revise(
            ack.receive_buffer_size as usize,
            ack.max_message_size as usize,
            ack.max_chunk_count as usize,
        );

        Ok(Box::new(WebSocketTransport {
            state: TransportState::new(channel, outgoing_recv, config.max_pending_incoming),
            stream,
            codec,
            receive_buffer,
            send_buffer: buffer,
            flush_needed: false,
            should_close: false,
            closed: TransportCloseState::Open,
        }))
    }
}

impl WebSocketTransport {
    fn handle_incoming_message(
        &mut self,
        incoming: Option<Result<WsMessage, tokio_tungstenite::tungstenite::Error>>,
    ) -> TransportPollResult {
        let message = match incoming {
            None | Some(Ok(WsMessage::Close(_))) => {
                self.state
                    .fail_all_pending_requests(StatusCode::BadCommunicationError);
                return TransportPollResult::Closed(StatusCode::BadConnectionClosed);
            }
            Some(Ok(message)) => message,
            Some(Err(err)) => {
                error!("Error reading from websocket {}", err);
                self.state
                    .fail_all_pending_requests(StatusCode::BadCommunicationError);
                return TransportPollResult::Closed(StatusCode::BadConnectionClosed);
            }
        };

        match message {
            WsMessage::Binary(data) => {
                self.receive_buffer.extend_from_slice(&data);
                // A message may carry several frames; consume until the buffer runs dry
                loop {
                    match self.codec.decode(&mut self.receive_buffer) {
                        Ok(Some(frame)) => {
                            if let Err(e) = self.state.handle_incoming_message(frame) {
                                return TransportPollResult::Closed(e);
                            }
                        }
                        Ok(None) => break TransportPollResult::IncomingMessage,
                        Err(e) => {
                            error!("Error decoding websocket payload {}", e);
                            self.state
                                .fail_all_pending_requests(StatusCode::BadCommunicationError);
                            return TransportPollResult::Closed(
                                StatusCode::BadCommunicationError,
                            );
                        }
                    }
                }
            }
            // Pings are answered by the protocol layer, text frames have no meaning
            // in the binary sub-protocol
            _ => TransportPollResult::IncomingMessage,
        }
    }

    async fn poll_inner(&mut self) -> TransportPollResult {
        if self.send_buffer.should_encode_chunks() {
            if let Err(e) = self.send_buffer.encode_next_chunk() {
                return TransportPollResult::Closed(e.status());
            }
        }

        let deadline = self.state.next_request_deadline();
        let deadline_fut = async {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => futures::future::pending().await,
            }
        };

        if self.send_buffer.can_read() {
            // Wait for sink readiness, then queue the frame synchronously. Splitting it
            // this way keeps the poll cancel safe: a cancelled readiness check loses
            // nothing, and start_send cannot be interrupted.
            tokio::select! {
                r = futures::future::poll_fn(|cx| self.stream.poll_ready_unpin(cx)) => {
                    if let Err(e) = r {
                        error!("Websocket not ready for writing: {}", e);
                        self.state.fail_all_pending_requests(StatusCode::BadCommunicationError);
                        return TransportPollResult::Closed(StatusCode::BadCommunicationError);
                    }
                    let frame = self.send_buffer.take_frame();
                    if let Err(e) = self.stream.start_send_unpin(WsMessage::Binary(frame)) {
                        error!("Websocket write failed: {}", e);
                        self.state.fail_all_pending_requests(StatusCode::BadCommunicationError);
                        return TransportPollResult::Closed(StatusCode::BadCommunicationError);
                    }
                    self.flush_needed = true;
                    TransportPollResult::OutgoingMessage
                }
                _ = deadline_fut => {
                    TransportPollResult::Closed(self.state.timeout())
                }
            }
        } else if self.flush_needed {
            tokio::select! {
                r = futures::future::poll_fn(|cx| self.stream.poll_flush_unpin(cx)) => {
                    if let Err(e) = r {
                        error!("Websocket flush failed: {}", e);
                        self.state.fail_all_pending_requests(StatusCode::BadCommunicationError);
                        return TransportPollResult::Closed(StatusCode::BadCommunicationError);
                    }
                    self.flush_needed = false;
                    TransportPollResult::OutgoingMessageSent
                }
                _ = deadline_fut => {
                    TransportPollResult::Closed(self.state.timeout())
                }
            }
        } else {
            if self.should_close {
                debug!("Writer is setting the connection state to finished(good)");
                return TransportPollResult::Closed(StatusCode::Good);
            }
            tokio::select! {
                outgoing = self.state.wait_for_outgoing_message(&mut self.send_buffer) => {
                    let Some((outgoing, _)) = outgoing else {
                        return TransportPollResult::Closed(StatusCode::Good);
                    };
                    if matches!(outgoing, RequestMessage::CloseSecureChannel(_)) {
                        self.should_close = true;
                    }
                    TransportPollResult::OutgoingMessage
                }
                incoming = self.stream.next() => {
                    self.handle_incoming_message(incoming)
                }
                _ = deadline_fut => {
                    TransportPollResult::Closed(self.state.timeout())
                }
            }
        }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn poll(&mut self) -> TransportPollResult {
        match self.closed {
            TransportCloseState::Open => {}
            TransportCloseState::Closing(c) => {
                let r = self.state.close(c).await;
                self.closed = TransportCloseState::Closed(c);
                let _ = self.stream.close(None).await;
                return TransportPollResult::Closed(r);
            }
            TransportCloseState::Closed(c) => {
                return TransportPollResult::Closed(c);
            }
        }

        let r = self.poll_inner().await;
        if let TransportPollResult::Closed(status) = &r {
            self.closed = TransportCloseState::Closing(*status);
            let r = self.state.close(*status).await;
            self.closed = TransportCloseState::Closed(r);
            let _ = self.stream.close(None).await;
        }
        r
    }
}
