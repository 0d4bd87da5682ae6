//! Transport-independent conversation state: the pending request map, chunk reassembly
//! with sequence number verification, abort handling and request deadlines.

use std::{
    collections::HashMap,
    sync::Arc,
    time::Duration,
};

use log::{debug, error, warn};
use parking_lot::RwLock;
use tokio::time::Instant;

use opcwire_core::{
    comms::{
        chunker::Chunker,
        message_chunk::{MessageAbortBody, MessageChunk, MessageIsFinalType},
        secure_channel::SecureChannel,
        tcp_codec::Message as CodecMessage,
    },
    RequestMessage, ResponseMessage,
};
use opcwire_types::{BinaryDecodable, Error, StatusCode};

use super::buffer::SendBuffer;

/// The number of service requests that may queue for sending before callers are pushed
/// back. One OpenSecureChannel exchange may run alongside them.
pub(crate) const SEND_QUEUE_CONCURRENCY: usize = 10;

/// A cap on in-flight messages as a safety net against a client in a bad state.
const MAX_INFLIGHT_MESSAGES: usize = 100_000;

/// What happened during one transport poll.
#[derive(Debug, Clone, Copy)]
pub enum TransportPollResult {
    /// An outgoing message was accepted and encoded into chunks.
    OutgoingMessage,
    /// Bytes of an outgoing message were written to the wire.
    OutgoingMessageSent,
    /// An incoming message or chunk was processed.
    IncomingMessage,
    /// A request failed without corrupting the conversation.
    RecoverableError(StatusCode),
    /// The transport is closed. Terminal.
    Closed(StatusCode),
}

/// A service request on its way to the wire, paired with the waiter for its response.
pub struct OutgoingMessage {
    /// The request to send.
    pub request: RequestMessage,
    /// Where the response goes. `None` for fire-and-forget messages such as the final
    /// CloseSecureChannel.
    pub callback: Option<tokio::sync::oneshot::Sender<Result<ResponseMessage, Error>>>,
    /// How long the caller is prepared to wait, from the request's timeout hint.
    pub timeout: Duration,
}

struct PendingRequest {
    callback: Option<tokio::sync::oneshot::Sender<Result<ResponseMessage, Error>>>,
    deadline: Instant,
}

/// In-progress reassembly of one request's response chunks.
#[derive(Default)]
struct MessageState {
    chunks: Vec<MessageChunk>,
}

/// The conversation state a transport drives.
pub(crate) struct TransportState {
    /// The secure channel the conversation runs on.
    pub(crate) secure_channel: Arc<RwLock<SecureChannel>>,
    outgoing_recv: tokio::sync::mpsc::Receiver<OutgoingMessage>,
    /// Waiters for responses, by request id.
    pending_requests: HashMap<u32, PendingRequest>,
    /// Partially received responses, by request id.
    partial_messages: HashMap<u32, MessageState>,
    /// The sequence number the next incoming chunk must carry, once the first chunk
    /// has arrived.
    expected_sequence_number: Option<u32>,
    max_pending_incoming: usize,
}

impl TransportState {
    pub(crate) fn new(
        secure_channel: Arc<RwLock<SecureChannel>>,
        outgoing_recv: tokio::sync::mpsc::Receiver<OutgoingMessage>,
        max_pending_incoming: usize,
    ) -> Self {
        Self {
            secure_channel,
            outgoing_recv,
            pending_requests: HashMap::new(),
            partial_messages: HashMap::new(),
            expected_sequence_number: None,
            max_pending_incoming,
        }
    }

    /// Wait for the next outgoing message, encode it into the send buffer and register
    /// the waiter. Returns `None` when the sender side is dropped, which closes the
    /// transport.
    pub(crate) async fn wait_for_outgoing_message(
        &mut self,
        send_buffer: &mut SendBuffer,
    ) -> Option<(RequestMessage, u32)> {
        loop {
            let outgoing = self.outgoing_recv.recv().await?;
            if self.pending_requests.len() >= MAX_INFLIGHT_MESSAGES.min(self.max_pending_incoming)
            {
                warn!("Too many in-flight messages, rejecting request");
                if let Some(callback) = outgoing.callback {
                    let _ = callback.send(Err(Error::new(
                        StatusCode::BadTcpNotEnoughResources,
                        "Too many in-flight messages",
                    )));
                }
                continue;
            }

            let request_id = {
                let mut secure_channel = self.secure_channel.write();
                secure_channel.next_request_id()
            };
            match send_buffer.write(request_id, outgoing.request.clone(), &self.secure_channel) {
                Ok(()) => {
                    self.pending_requests.insert(
                        request_id,
                        PendingRequest {
                            callback: outgoing.callback,
                            deadline: Instant::now() + outgoing.timeout,
                        },
                    );
                    break Some((outgoing.request, request_id));
                }
                Err(e) => {
                    // Encoding never reached the wire, the conversation survives
                    error!("Failed to encode outgoing message: {}", e);
                    if let Some(callback) = outgoing.callback {
                        let _ = callback.send(Err(e));
                    }
                    continue;
                }
            }
        }
    }

    /// The deadline of the request that expires first, if any request is in flight.
    pub(crate) fn next_request_deadline(&self) -> Option<Instant> {
        self.pending_requests.values().map(|r| r.deadline).min()
    }

    /// Fail everything and tear the conversation down because a request deadline
    /// passed. Leaving the channel up after losing track of a request would corrupt
    /// the sequence number stream, so the timeout is terminal.
    pub(crate) fn timeout(&mut self) -> StatusCode {
        warn!("A request timed out, the secure channel will be closed");
        self.fail_all_pending_requests(StatusCode::BadTimeout);
        StatusCode::BadTimeout
    }

    /// Reject every pending request with `status`.
    pub(crate) fn fail_all_pending_requests(&mut self, status: StatusCode) {
        for (_, request) in self.pending_requests.drain() {
            if let Some(callback) = request.callback {
                let _ = callback.send(Err(Error::new(status, status.name())));
            }
        }
        self.partial_messages.clear();
    }

    /// Process one decoded frame from the codec. An error return closes the transport.
    pub(crate) fn handle_incoming_message(
        &mut self,
        message: CodecMessage,
    ) -> Result<(), StatusCode> {
        match message {
            CodecMessage::Chunk(chunk) => self.process_chunk(chunk).map_err(|e| {
                let status = e.status();
                error!("Chunk processing failed, closing: {}", e);
                self.fail_all_pending_requests(status);
                status
            }),
            CodecMessage::Error(error) => {
                let status = error.status_code();
                error!("Received an ERR frame from the server: {}", status);
                self.fail_all_pending_requests(status);
                Err(status)
            }
            CodecMessage::ReverseHello(_) => {
                debug!("Ignoring reverse hello from the server");
                Ok(())
            }
            CodecMessage::Unknown(tag, _) => {
                error!("Received a frame with unknown type {:?}", tag);
                self.fail_all_pending_requests(StatusCode::BadTcpMessageTypeInvalid);
                Err(StatusCode::BadTcpMessageTypeInvalid)
            }
            other => {
                error!("Unexpected control message after handshake: {:?}", other);
                self.fail_all_pending_requests(StatusCode::BadUnexpectedError);
                Err(StatusCode::BadUnexpectedError)
            }
        }
    }

    /// A send failed after the request was registered; reject its waiter.
    pub(crate) fn message_send_failed(&mut self, request_id: u32, status: StatusCode) {
        if let Some(request) = self.pending_requests.remove(&request_id) {
            if let Some(callback) = request.callback {
                let _ = callback.send(Err(Error::new(status, status.name())));
            }
        }
        self.partial_messages.remove(&request_id);
    }

    fn process_chunk(&mut self, chunk: MessageChunk) -> Result<(), Error> {
        let (chunk_info, options) = {
            let secure_channel = self.secure_channel.read();
            (
                chunk.chunk_info(&secure_channel)?,
                secure_channel.decoding_options(),
            )
        };

        // One strictly increasing sequence across all requests of the channel.
        // Out of order arrival is unrecoverable.
        let sequence_number = chunk_info.sequence_header.sequence_number;
        if let Some(expected) = self.expected_sequence_number {
            if sequence_number != expected {
                return Err(Error::new(
                    StatusCode::BadSequenceNumberInvalid,
                    format!(
                        "Expected chunk sequence number {}, got {}",
                        expected, sequence_number
                    ),
                ));
            }
        }
        self.expected_sequence_number = Some(match sequence_number.checked_add(1) {
            Some(n) => n,
            None => opcwire_core::constants::FIRST_SEQUENCE_NUMBER,
        });

        let request_id = chunk_info.sequence_header.request_id;
        match chunk_info.message_header.is_final {
            MessageIsFinalType::Intermediate => {
                let state = self.partial_messages.entry(request_id).or_default();
                state.chunks.push(chunk);
                if state.chunks.len() > self.max_pending_incoming_chunks() {
                    return Err(Error::new(
                        StatusCode::BadEncodingLimitsExceeded,
                        "Response exceeds the chunk count limit",
                    ));
                }
                Ok(())
            }
            MessageIsFinalType::FinalError => {
                // Only the aborted request fails, the channel survives
                let body = &chunk.data[chunk_info.body_offset..]
                    [..chunk_info.body_length];
                let abort = MessageAbortBody::decode(&mut std::io::Cursor::new(body), &options)?;
                let status = abort.status_code();
                warn!(
                    "Request {} aborted by the server: {} ({})",
                    request_id, status, abort.reason
                );
                self.partial_messages.remove(&request_id);
                if let Some(pending) = self.pending_requests.remove(&request_id) {
                    if let Some(callback) = pending.callback {
                        let _ = callback.send(Err(Error::new(status, "Request aborted")
                            .with_request_id(request_id)));
                    }
                }
                Ok(())
            }
            MessageIsFinalType::Final => {
                let mut state = self.partial_messages.remove(&request_id).unwrap_or_default();
                state.chunks.push(chunk);
                let message = {
                    let secure_channel = self.secure_channel.read();
                    Chunker::decode::<ResponseMessage>(&state.chunks, &secure_channel, None)
                        .map_err(|e| e.with_request_id(request_id))?
                };
                self.dispatch_response(request_id, message);
                Ok(())
            }
        }
    }

    fn dispatch_response(&mut self, request_id: u32, message: ResponseMessage) {
        let Some(pending) = self.pending_requests.remove(&request_id) else {
            // Stale response for a request nobody waits for anymore, e.g. one whose
            // waiter was rejected. Drop it.
            debug!("Discarding response for unknown request id {}", request_id);
            return;
        };
        let Some(callback) = pending.callback else {
            return;
        };
        // A fault rejects the waiter with the service result
        let result = if message.is_fault() {
            let status = message.response_header().service_result;
            let handle = message.response_header().request_handle;
            Err(Error::new(status, format!("Service fault {}", status))
                .with_context(Some(request_id), Some(handle)))
        } else {
            Ok(message)
        };
        let _ = callback.send(result);
    }

    fn max_pending_incoming_chunks(&self) -> usize {
        let max = self.secure_channel.read().decoding_options().max_chunk_count;
        if max == 0 {
            usize::MAX
        } else {
            max
        }
    }

    /// Close the transport cleanly: reject pending waiters and drain the outgoing queue.
    pub(crate) async fn close(&mut self, status: StatusCode) -> StatusCode {
        self.fail_all_pending_requests(if status.is_good() {
            StatusCode::BadConnectionClosed
        } else {
            status
        });
        self.outgoing_recv.close();
        while let Some(outgoing) = self.outgoing_recv.recv().await {
            if let Some(callback) = outgoing.callback {
                let _ = callback.send(Err(Error::new(
                    StatusCode::BadConnectionClosed,
                    "The connection was closed before the request could be sent",
                )));
            }
        }
        status
    }
}
