//! A scripted OPC-UA server for exercising the client end to end. It speaks the real
//! connection protocol over a loopback TCP socket: hello/acknowledge, chunked secure
//! conversation with sequence numbers, and whatever responses the installed behaviour
//! decides to produce.

use std::collections::HashMap;
use std::time::Duration;

use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::FramedRead;

use opcwire_core::comms::chunker::Chunker;
use opcwire_core::comms::message_chunk::{MessageChunk, MessageIsFinalType};
use opcwire_core::comms::secure_channel::SecureChannel;
use opcwire_core::comms::tcp_codec::{Message, TcpCodec};
use opcwire_core::comms::tcp_types::AcknowledgeMessage;
use opcwire_core::{RequestMessage, ResponseMessage};
use opcwire_types::*;

/// What the behaviour wants done with a request.
#[allow(dead_code)]
pub enum ServerAction {
    /// Send this response.
    Respond(ResponseMessage),
    /// Delay, then send this response. Used for publish pacing.
    RespondAfter(ResponseMessage, Duration),
    /// Send an abort chunk for this request, leaving the channel up.
    Abort(StatusCode),
    /// Respond, but corrupt the chunk sequence number first.
    RespondOutOfOrder(ResponseMessage),
    /// Never respond, leaving the request to time out.
    Ignore,
    /// Drop the connection without a word.
    CloseConnection,
}

/// Scripted server logic. The default methods implement a minimal but correct session
/// flow; tests override what they need.
pub trait ServerBehaviour: Send {
    /// Handle one decoded request.
    fn handle(&mut self, request: RequestMessage) -> ServerAction;
}

pub struct MockServer {
    listener: TcpListener,
    pub endpoint: String,
}

impl MockServer {
    pub async fn bind() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!(
            "opc.tcp://127.0.0.1:{}",
            listener.local_addr().unwrap().port()
        );
        Self { listener, endpoint }
    }

    /// Accept one connection and serve it with `behaviour` until the peer goes away or
    /// the behaviour closes the connection.
    pub async fn serve_connection<B: ServerBehaviour>(&self, behaviour: &mut B) {
        let (socket, _) = self.listener.accept().await.unwrap();
        serve_socket(socket, behaviour).await;
    }
}

async fn serve_socket<B: ServerBehaviour>(socket: TcpStream, behaviour: &mut B) {
    let mut channel = SecureChannel::new(DecodingOptions::test());
    let (reader, mut writer) = tokio::io::split(socket);
    let mut framed = FramedRead::new(reader, TcpCodec::new(DecodingOptions::test()));

    // Partially received requests by request id
    let mut partial: HashMap<u32, Vec<MessageChunk>> = HashMap::new();

    while let Some(next) = framed.next().await {
        let message = match next {
            Ok(message) => message,
            Err(_) => return,
        };
        match message {
            Message::Hello(_) => {
                let ack = AcknowledgeMessage::new(65535, 65535, 0, 0);
                if writer.write_all(&ack.encode_to_vec()).await.is_err() {
                    return;
                }
            }
            Message::Chunk(chunk) => {
                let info = chunk.chunk_info(&channel).unwrap();
                let request_id = info.sequence_header.request_id;
                let chunks = partial.entry(request_id).or_default();
                chunks.push(chunk);
                if info.message_header.is_final != MessageIsFinalType::Final {
                    continue;
                }
                let chunks = partial.remove(&request_id).unwrap();
                let request: RequestMessage =
                    Chunker::decode(&chunks, &channel, None).unwrap();

                // Open secure channel is handled here so every behaviour gets a
                // working channel without having to script it
                if let RequestMessage::OpenSecureChannel(request) = &request {
                    let response = OpenSecureChannelResponse {
                        response_header: ResponseHeader::new_service_result(
                            request.request_header.request_handle,
                            StatusCode::Good,
                        ),
                        server_protocol_version: 0,
                        security_token: ChannelSecurityToken {
                            channel_id: 1,
                            token_id: 1,
                            created_at: DateTime::now(),
                            revised_lifetime: request.requested_lifetime,
                        },
                        server_nonce: ByteString::null(),
                    };
                    channel.set_security_token(response.security_token.clone());
                    if send_response(&mut writer, &mut channel, request_id, response.into())
                        .await
                        .is_err()
                    {
                        return;
                    }
                    continue;
                }
                if matches!(request, RequestMessage::CloseSecureChannel(_)) {
                    return;
                }

                match behaviour.handle(request) {
                    ServerAction::Respond(response) => {
                        if send_response(&mut writer, &mut channel, request_id, response)
                            .await
                            .is_err()
                        {
                            return;
                        }
                    }
                    ServerAction::RespondAfter(response, delay) => {
                        tokio::time::sleep(delay).await;
                        if send_response(&mut writer, &mut channel, request_id, response)
                            .await
                            .is_err()
                        {
                            return;
                        }
                    }
                    ServerAction::Abort(status) => {
                        if send_abort(&mut writer, &mut channel, request_id, status)
                            .await
                            .is_err()
                        {
                            return;
                        }
                    }
                    ServerAction::RespondOutOfOrder(response) => {
                        // Burn a sequence number so the next chunk arrives out of order
                        channel.next_sequence_numbers(1);
                        if send_response(&mut writer, &mut channel, request_id, response)
                            .await
                            .is_err()
                        {
                            return;
                        }
                    }
                    ServerAction::Ignore => {}
                    ServerAction::CloseConnection => return,
                }
            }
            _ => return,
        }
    }
}

async fn send_response(
    writer: &mut (impl tokio::io::AsyncWrite + Unpin),
    channel: &mut SecureChannel,
    request_id: u32,
    response: ResponseMessage,
) -> std::io::Result<()> {
    let chunks = Chunker::encode(
        channel.sequence_number(),
        request_id,
        0,
        0,
        0,
        channel,
        &response,
    )
    .unwrap();
    channel.next_sequence_numbers(chunks.len() as u32);
    for chunk in chunks {
        writer.write_all(&chunk.data).await?;
    }
    writer.flush().await
}

async fn send_abort(
    writer: &mut (impl tokio::io::AsyncWrite + Unpin),
    channel: &mut SecureChannel,
    request_id: u32,
    status: StatusCode,
) -> std::io::Result<()> {
    use opcwire_core::comms::message_chunk::{MessageAbortBody, MessageChunkType};

    let body = MessageAbortBody {
        error: status.bits(),
        reason: UAString::from("scripted abort"),
    };
    let chunk = MessageChunk::new(
        channel.next_sequence_numbers(1),
        request_id,
        MessageChunkType::Message,
        MessageIsFinalType::FinalError,
        channel,
        &body.encode_to_vec(),
    )
    .unwrap();
    writer.write_all(&chunk.data).await?;
    writer.flush().await
}

/// A behaviour implementing the standard session flow with a ticking current-time
/// variable behind a subscription.
pub struct SimpleServer {
    pub session_id: NodeId,
    pub auth_token: NodeId,
    /// Client handles of created monitored items.
    pub client_handles: Vec<u32>,
    /// Sequence number of the next notification message.
    pub notification_sequence: u32,
    /// Publishing interval granted on create subscription.
    pub publishing_interval: Duration,
    /// Subscription id counter, so recreated subscriptions get fresh ids.
    pub next_subscription_id: u32,
}

impl Default for SimpleServer {
    fn default() -> Self {
        Self {
            session_id: NodeId::new(1, "mock-session"),
            auth_token: NodeId::new(0, Guid::new()),
            client_handles: Vec::new(),
            notification_sequence: 1,
            publishing_interval: Duration::from_millis(100),
            next_subscription_id: 1,
        }
    }
}

impl SimpleServer {
    fn ok_header(request_handle: u32) -> ResponseHeader {
        ResponseHeader::new_service_result(request_handle, StatusCode::Good)
    }

    fn current_time_value() -> DataValue {
        DataValue {
            value: Some(Variant::from(DateTime::now())),
            status: Some(StatusCode::Good),
            source_timestamp: Some(DateTime::now()),
            server_timestamp: Some(DateTime::now()),
            ..Default::default()
        }
    }
}

impl ServerBehaviour for SimpleServer {
    fn handle(&mut self, request: RequestMessage) -> ServerAction {
        let handle = request.request_header().request_handle;
        match request {
            RequestMessage::CreateSession(r) => ServerAction::Respond(
                CreateSessionResponse {
                    response_header: Self::ok_header(handle),
                    session_id: self.session_id.clone(),
                    authentication_token: self.auth_token.clone(),
                    revised_session_timeout: r.requested_session_timeout,
                    server_nonce: ByteString::null(),
                    server_certificate: ByteString::null(),
                    server_endpoints: None,
                    server_software_certificates: None,
                    server_signature: SignatureData::default(),
                    max_request_message_size: 0,
                }
                .into(),
            ),
            RequestMessage::ActivateSession(r) => {
                // Reject tokens from a session this server never issued, so the
                // reconnect fallback to create session gets exercised
                if r.request_header.authentication_token != self.auth_token
                    && !r.request_header.authentication_token.is_null()
                {
                    ServerAction::Respond(
                        ServiceFault {
                            response_header: ResponseHeader::new_service_result(
                                handle,
                                StatusCode::BadSessionIdInvalid,
                            ),
                        }
                        .into(),
                    )
                } else {
                    ServerAction::Respond(
                        ActivateSessionResponse {
                            response_header: Self::ok_header(handle),
                            server_nonce: ByteString::null(),
                            results: None,
                            diagnostic_infos: None,
                        }
                        .into(),
                    )
                }
            }
            RequestMessage::CloseSession(_) => ServerAction::Respond(
                CloseSessionResponse {
                    response_header: Self::ok_header(handle),
                }
                .into(),
            ),
            RequestMessage::Read(r) => {
                let results = r
                    .nodes_to_read
                    .unwrap_or_default()
                    .iter()
                    .map(|node| {
                        if node.node_id
                            == NodeId::from(VariableId::Server_ServerStatus_CurrentTime)
                        {
                            Self::current_time_value()
                        } else if node.node_id
                            == NodeId::from(
                                VariableId::Server_ServerStatus_BuildInfo_ProductName,
                            )
                        {
                            DataValue {
                                value: Some(Variant::from("mock server")),
                                status: Some(StatusCode::Good),
                                ..Default::default()
                            }
                        } else {
                            DataValue {
                                status: Some(StatusCode::BadNodeIdUnknown),
                                ..Default::default()
                            }
                        }
                    })
                    .collect();
                ServerAction::Respond(
                    ReadResponse {
                        response_header: Self::ok_header(handle),
                        results: Some(results),
                        diagnostic_infos: None,
                    }
                    .into(),
                )
            }
            RequestMessage::Browse(r) => {
                let results = r
                    .nodes_to_browse
                    .unwrap_or_default()
                    .iter()
                    .map(|_| BrowseResult {
                        status_code: StatusCode::Good,
                        continuation_point: ByteString::null(),
                        references: Some(vec![ReferenceDescription {
                            reference_type_id: ReferenceTypeId::HasComponent.into(),
                            is_forward: true,
                            node_id: ExpandedNodeId::new(NodeId::from(
                                VariableId::Server_ServerStatus_StartTime,
                            )),
                            browse_name: QualifiedName::new(0, "StartTime"),
                            display_name: LocalizedText::from("StartTime"),
                            node_class: NodeClass::Variable,
                            type_definition: ExpandedNodeId::null(),
                        }]),
                    })
                    .collect();
                ServerAction::Respond(
                    BrowseResponse {
                        response_header: Self::ok_header(handle),
                        results: Some(results),
                        diagnostic_infos: None,
                    }
                    .into(),
                )
            }
            RequestMessage::TranslateBrowsePathsToNodeIds(r) => {
                let results = r
                    .browse_paths
                    .unwrap_or_default()
                    .iter()
                    .map(|_| BrowsePathResult {
                        status_code: StatusCode::Good,
                        targets: Some(vec![BrowsePathTarget {
                            target_id: ExpandedNodeId::new(NodeId::from(
                                VariableId::Server_ServerStatus_StartTime,
                            )),
                            remaining_path_index: u32::MAX,
                        }]),
                    })
                    .collect();
                ServerAction::Respond(
                    TranslateBrowsePathsToNodeIdsResponse {
                        response_header: Self::ok_header(handle),
                        results: Some(results),
                        diagnostic_infos: None,
                    }
                    .into(),
                )
            }
            RequestMessage::CreateSubscription(_) => {
                let subscription_id = self.next_subscription_id;
                self.next_subscription_id += 1;
                ServerAction::Respond(
                    CreateSubscriptionResponse {
                        response_header: Self::ok_header(handle),
                        subscription_id,
                        revised_publishing_interval: self.publishing_interval.as_millis()
                            as f64,
                        revised_lifetime_count: 60,
                        revised_max_keep_alive_count: 10,
                    }
                    .into(),
                )
            }
            RequestMessage::CreateMonitoredItems(r) => {
                let items = r.items_to_create.unwrap_or_default();
                self.client_handles = items
                    .iter()
                    .map(|i| i.requested_parameters.client_handle)
                    .collect();
                let results = items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| MonitoredItemCreateResult {
                        status_code: StatusCode::Good,
                        monitored_item_id: (i + 1) as u32,
                        revised_sampling_interval: item
                            .requested_parameters
                            .sampling_interval,
                        revised_queue_size: item.requested_parameters.queue_size,
                        filter_result: ExtensionObject::null(),
                    })
                    .collect();
                ServerAction::Respond(
                    CreateMonitoredItemsResponse {
                        response_header: Self::ok_header(handle),
                        results: Some(results),
                        diagnostic_infos: None,
                    }
                    .into(),
                )
            }
            RequestMessage::DeleteSubscriptions(r) => {
                let results = r
                    .subscription_ids
                    .unwrap_or_default()
                    .iter()
                    .map(|_| StatusCode::Good)
                    .collect();
                ServerAction::Respond(
                    DeleteSubscriptionsResponse {
                        response_header: Self::ok_header(handle),
                        results: Some(results),
                        diagnostic_infos: None,
                    }
                    .into(),
                )
            }
            RequestMessage::Publish(_) => {
                // One data change per publish, paced at the publishing interval
                let sequence_number = self.notification_sequence;
                self.notification_sequence += 1;
                let items = self
                    .client_handles
                    .iter()
                    .map(|handle| MonitoredItemNotification {
                        client_handle: *handle,
                        value: Self::current_time_value(),
                    })
                    .collect();
                let notification = DataChangeNotification {
                    monitored_items: Some(items),
                    diagnostic_infos: None,
                };
                let message = NotificationMessage {
                    sequence_number,
                    publish_time: DateTime::now(),
                    notification_data: Some(vec![ExtensionObject::from_message(&notification)]),
                };
                let subscription_id = self.next_subscription_id.saturating_sub(1);
                ServerAction::RespondAfter(
                    PublishResponse {
                        response_header: Self::ok_header(handle),
                        subscription_id,
                        available_sequence_numbers: None,
                        more_notifications: false,
                        notification_message: message,
                        results: None,
                        diagnostic_infos: None,
                    }
                    .into(),
                    self.publishing_interval,
                )
            }
            other => {
                let handle = other.request_header().request_handle;
                ServerAction::Respond(
                    ServiceFault {
                        response_header: ResponseHeader::new_service_result(
                            handle,
                            StatusCode::BadServiceUnsupported,
                        ),
                    }
                    .into(),
                )
            }
        }
    }
}
