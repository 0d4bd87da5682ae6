//! The TCP transport back-end.

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use log::{debug, error};
use parking_lot::RwLock;
use tokio::io::{AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio_util::codec::FramedRead;

use opcwire_core::comms::{
    secure_channel::SecureChannel,
    tcp_codec::{Message, TcpCodec},
    tcp_types::{AcknowledgeMessage, HelloMessage},
    url::hostname_port_from_url,
};
use opcwire_core::RequestMessage;
use opcwire_types::{BinaryEncodable, StatusCode};

use super::{
    buffer::SendBuffer,
    connect::{Connector, Transport, TransportConfiguration},
    core::{OutgoingMessage, TransportPollResult, TransportState},
};

#[derive(Debug, Clone, Copy)]
enum TransportCloseState {
    Open,
    Closing(StatusCode),
    Closed(StatusCode),
}

/// The transport over a raw TCP stream.
pub struct TcpTransport {
    state: TransportState,
    read: FramedRead<ReadHalf<TcpStream>, TcpCodec>,
    write: WriteHalf<TcpStream>,
    send_buffer: SendBuffer,
    should_close: bool,
    closed: TransportCloseState,
}

/// Connects the TCP transport.
pub struct TcpConnector;

impl TcpConnector {
    async fn connect_inner(
        secure_channel: &RwLock<SecureChannel>,
        config: &TransportConfiguration,
        endpoint_url: &str,
    ) -> Result<
        (
            FramedRead<ReadHalf<TcpStream>, TcpCodec>,
            WriteHalf<TcpStream>,
            AcknowledgeMessage,
        ),
        StatusCode,
    > {
        let (host, port) = hostname_port_from_url(
            endpoint_url,
            opcwire_core::constants::DEFAULT_OPC_UA_SERVER_PORT,
        )
        .map_err(|e| e.status())?;

        let addr = {
            let addr = format!("{}:{}", host, port);
            match tokio::net::lookup_host(addr).await {
                Ok(mut addrs) => {
                    if let Some(addr) = addrs.next() {
                        addr
                    } else {
                        error!(
                            "Invalid address {}, does not resolve to any socket",
                            endpoint_url
                        );
                        return Err(StatusCode::BadTcpEndpointUrlInvalid);
                    }
                }
                Err(e) => {
                    error!("Invalid address {}, cannot be parsed {:?}", endpoint_url, e);
                    return Err(StatusCode::BadTcpEndpointUrlInvalid);
                }
            }
        };

        debug!("Connecting to {} with url {}", addr, endpoint_url);
        let socket = TcpStream::connect(&addr).await.map_err(|err| {
            error!("Could not connect to host {}, {:?}", addr, err);
            StatusCode::BadCommunicationError
        })?;

        let (reader, mut writer) = tokio::io::split(socket);
        let mut framed_read = {
            let secure_channel = secure_channel.read();
            FramedRead::new(reader, TcpCodec::new(secure_channel.decoding_options()))
        };

        let hello = HelloMessage::new(
            endpoint_url,
            config.send_buffer_size,
            config.recv_buffer_size,
            config.max_message_size,
            config.max_chunk_count,
        );
        log::trace!("Sending hello message: {hello:?}");
        writer
            .write_all(&hello.encode_to_vec())
            .await
            .map_err(|err| {
                error!("Cannot send hello to server, err = {}", err);
                StatusCode::BadCommunicationError
            })?;

        let ack = wait_for_acknowledge(framed_read.next().await)?;
        Ok((framed_read, writer, ack))
    }
}

/// Interpret the first frame of a connection: an acknowledge continues the open, an
/// error frame aborts it with the peer's status code.
pub(crate) fn wait_for_acknowledge(
    incoming: Option<Result<Message, std::io::Error>>,
) -> Result<AcknowledgeMessage, StatusCode> {
    match incoming {
        Some(Ok(Message::Acknowledge(ack))) => {
            log::trace!("Received acknowledgement: {:?}", ack);
            Ok(ack)
        }
        Some(Ok(Message::Error(error))) => {
            error!(
                "Server rejected the connection with {}",
                error.status_code()
            );
            Err(error.status_code())
        }
        other => {
            error!(
                "Unexpected result while waiting for server ACK: {:?}",
                other
            );
            Err(StatusCode::BadConnectionClosed)
        }
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(
        &self,
        channel: Arc<RwLock<SecureChannel>>,
        outgoing_recv: tokio::sync::mpsc::Receiver<OutgoingMessage>,
        config: TransportConfiguration,
        endpoint_url: &str,
    ) -> Result<Box<dyn Transport>, StatusCode> {
        let (framed_read, writer, ack) =
            Self::connect_inner(&channel, &config, endpoint_url).await?;

        let mut buffer = SendBuffer::new(
            config.send_buffer_size,
            config.max_message_size,
            config.max_chunk_count,
        );
        // The server's receive buffer bounds the chunks this client sends
        buffer.revise(
            ack.receive_buffer_size as usize,
            ack.max_message_size as usize,
            ack.max_chunk_count as usize,
        );

        Ok(Box::new(TcpTransport {
            state: TransportState::new(channel, outgoing_recv, config.max_pending_incoming),
            read: framed_read,
            write: writer,
            send_buffer: buffer,
            should_close: false,
            closed: TransportCloseState::Open,
        }))
    }
}

impl TcpTransport {
    fn handle_incoming_message(
        &mut self,
        incoming: Option<Result<Message, std::io::Error>>,
    ) -> TransportPollResult {
        let Some(incoming) = incoming else {
            // Peer closed the stream
            self.state
                .fail_all_pending_requests(StatusCode::BadCommunicationError);
            return TransportPollResult::Closed(StatusCode::BadConnectionClosed);
        };
        match incoming {
            Ok(message) => {
                if let Err(e) = self.state.handle_incoming_message(message) {
                    TransportPollResult::Closed(e)
                } else {
                    TransportPollResult::IncomingMessage
                }
            }
            Err(err) => {
                error!("Error reading from stream {}", err);
                self.state
                    .fail_all_pending_requests(StatusCode::BadCommunicationError);
                TransportPollResult::Closed(StatusCode::BadConnectionClosed)
            }
        }
    }

    async fn poll_inner(&mut self) -> TransportPollResult {
        // If there's nothing in the send buffer, but there are chunks available,
        // write them to the send buffer before proceeding.
        if self.send_buffer.should_encode_chunks() {
            if let Err(e) = self.send_buffer.encode_next_chunk() {
                return TransportPollResult::Closed(e.status());
            }
        }

        // A request deadline passing is terminal for the whole conversation, since a
        // half-tracked request would corrupt the sequence number stream.
        let deadline = self.state.next_request_deadline();
        let deadline_fut = async {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => futures::future::pending().await,
            }
        };

        // If there is something in the send buffer, write it to the stream. If not,
        // wait for outgoing messages. Either way, listen to incoming messages and the
        // earliest request deadline while doing so.
        if self.send_buffer.can_read() {
            tokio::select! {
                r = self.send_buffer.read_into_async(&mut self.write) => {
                    if let Err(e) = r {
                        error!("write bytes task failed: {}", e);
                        self.state.fail_all_pending_requests(StatusCode::BadCommunicationError);
                        return TransportPollResult::Closed(StatusCode::BadCommunicationError);
                    }
                    TransportPollResult::OutgoingMessageSent
                }
                incoming = self.read.next() => {
                    self.handle_incoming_message(incoming)
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
                        debug!("Writer is about to send a CloseSecureChannelRequest which means it should close in a moment");
                        self.should_close = true;
                    }
                    TransportPollResult::OutgoingMessage
                }
                incoming = self.read.next() => {
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
impl Transport for TcpTransport {
    async fn poll(&mut self) -> TransportPollResult {
        // Poll is cancel safe as long as poll_inner is, which holds because all the
        // futures it selects over are cancel safe and it only ever completes one.
        // Closing is the exception, so it runs to completion across polls.
        match self.closed {
            TransportCloseState::Open => {}
            TransportCloseState::Closing(c) => {
                let r = self.state.close(c).await;
                self.closed = TransportCloseState::Closed(c);
                let _ = self.write.shutdown().await;
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
            let _ = self.write.shutdown().await;
        }
        r
    }
}
