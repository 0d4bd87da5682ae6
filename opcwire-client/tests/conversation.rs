//! Conversation level tests: request/response correlation, aborts, sequence number
//! integrity and the terminal request timeout, against a scripted peer.

mod mock;

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;

use opcwire_client::{AsyncSecureChannel, TransportConfiguration, TransportPollResult};
use opcwire_core::{RequestMessage, ResponseMessage};
use opcwire_types::{
    AttributeId, NodeId, ReadRequest, ReadValueId, StatusCode, TimestampsToReturn, VariableId,
};

use mock::{MockServer, ServerAction, ServerBehaviour, SimpleServer};

fn transport_config() -> TransportConfiguration {
    TransportConfiguration {
        max_pending_incoming: 10,
        send_buffer_size: 65535,
        recv_buffer_size: 65535,
        max_message_size: 0,
        max_chunk_count: 0,
    }
}

fn test_channel(endpoint: &str) -> AsyncSecureChannel {
    AsyncSecureChannel::new(
        endpoint.to_string(),
        Arc::new(ArcSwap::new(Arc::new(NodeId::null()))),
        transport_config(),
        60_000,
        Duration::from_secs(5),
    )
    .unwrap()
}

fn read_request(node: VariableId) -> ReadRequest {
    ReadRequest {
        request_header: Default::default(),
        max_age: 0.0,
        timestamps_to_return: TimestampsToReturn::Both,
        nodes_to_read: Some(vec![ReadValueId {
            node_id: node.into(),
            attribute_id: AttributeId::Value as u32,
            ..Default::default()
        }]),
    }
}

/// Poll the connection while running `fut` to completion.
async fn with_connection<T>(
    event_loop: &mut opcwire_client::SecureChannelEventLoop,
    fut: impl std::future::Future<Output = T>,
) -> T {
    tokio::pin!(fut);
    loop {
        tokio::select! {
            r = &mut fut => break r,
            r = event_loop.poll() => {
                if let TransportPollResult::Closed(_) = r {
                    // Keep waiting for the request futures to resolve with their errors
                    break fut.await;
                }
            }
        }
    }
}

#[tokio::test]
async fn concurrent_requests_are_correlated_independently() {
    let server = MockServer::bind().await;
    let endpoint = server.endpoint.clone();
    tokio::spawn(async move {
        server.serve_connection(&mut SimpleServer::default()).await;
    });

    let channel = test_channel(&endpoint);
    let mut event_loop = channel.connect().await.unwrap();

    let current_time = channel.send(
        read_request(VariableId::Server_ServerStatus_CurrentTime),
        Duration::from_secs(5),
    );
    let product_name = channel.send(
        read_request(VariableId::Server_ServerStatus_BuildInfo_ProductName),
        Duration::from_secs(5),
    );

    let (current_time, product_name) =
        with_connection(&mut event_loop, futures::future::join(current_time, product_name))
            .await;

    let ResponseMessage::Read(current_time) = current_time.unwrap() else {
        panic!("expected a read response");
    };
    let ResponseMessage::Read(product_name) = product_name.unwrap() else {
        panic!("expected a read response");
    };

    // Each response matches its request: one is a timestamp, the other a string
    let value = &current_time.results.unwrap()[0];
    assert!(matches!(
        value.value,
        Some(opcwire_types::Variant::DateTime(_))
    ));
    let value = &product_name.results.unwrap()[0];
    assert_eq!(
        value.value,
        Some(opcwire_types::Variant::from("mock server"))
    );
}

/// Aborts only the first request; everything else keeps working.
struct AbortFirst {
    inner: SimpleServer,
    aborted: bool,
}

impl ServerBehaviour for AbortFirst {
    fn handle(&mut self, request: RequestMessage) -> ServerAction {
        if !self.aborted && matches!(request, RequestMessage::Read(_)) {
            self.aborted = true;
            ServerAction::Abort(StatusCode::BadTooManyOperations)
        } else {
            self.inner.handle(request)
        }
    }
}

#[tokio::test]
async fn abort_fails_only_the_aborted_request() {
    let server = MockServer::bind().await;
    let endpoint = server.endpoint.clone();
    tokio::spawn(async move {
        let mut behaviour = AbortFirst {
            inner: SimpleServer::default(),
            aborted: false,
        };
        server.serve_connection(&mut behaviour).await;
    });

    let channel = test_channel(&endpoint);
    let mut event_loop = channel.connect().await.unwrap();

    let aborted = with_connection(
        &mut event_loop,
        channel.send(
            read_request(VariableId::Server_ServerStatus_CurrentTime),
            Duration::from_secs(5),
        ),
    )
    .await;
    assert_eq!(
        aborted.unwrap_err().status(),
        StatusCode::BadTooManyOperations
    );

    // The channel survives: the next request succeeds
    let ok = with_connection(
        &mut event_loop,
        channel.send(
            read_request(VariableId::Server_ServerStatus_CurrentTime),
            Duration::from_secs(5),
        ),
    )
    .await;
    assert!(ok.is_ok());
}

/// Responds to the first read with a corrupted chunk sequence number.
struct OutOfOrderFirst {
    inner: SimpleServer,
    corrupted: bool,
}

impl ServerBehaviour for OutOfOrderFirst {
    fn handle(&mut self, request: RequestMessage) -> ServerAction {
        if !self.corrupted && matches!(request, RequestMessage::Read(_)) {
            self.corrupted = true;
            match self.inner.handle(request) {
                ServerAction::Respond(r) => ServerAction::RespondOutOfOrder(r),
                other => other,
            }
        } else {
            self.inner.handle(request)
        }
    }
}

#[tokio::test]
async fn out_of_order_sequence_number_closes_the_conversation() {
    let server = MockServer::bind().await;
    let endpoint = server.endpoint.clone();
    tokio::spawn(async move {
        let mut behaviour = OutOfOrderFirst {
            inner: SimpleServer::default(),
            corrupted: false,
        };
        server.serve_connection(&mut behaviour).await;
    });

    let channel = test_channel(&endpoint);
    let mut event_loop = channel.connect().await.unwrap();

    let result = with_connection(
        &mut event_loop,
        channel.send(
            read_request(VariableId::Server_ServerStatus_CurrentTime),
            Duration::from_secs(5),
        ),
    )
    .await;
    assert_eq!(
        result.unwrap_err().status(),
        StatusCode::BadSequenceNumberInvalid
    );
}

/// Swallows every read, forcing the request timeout.
struct IgnoreReads {
    inner: SimpleServer,
}

impl ServerBehaviour for IgnoreReads {
    fn handle(&mut self, request: RequestMessage) -> ServerAction {
        if matches!(request, RequestMessage::Read(_)) {
            ServerAction::Ignore
        } else {
            self.inner.handle(request)
        }
    }
}

#[tokio::test]
async fn request_timeout_is_terminal_for_the_conversation() {
    let server = MockServer::bind().await;
    let endpoint = server.endpoint.clone();
    tokio::spawn(async move {
        let mut behaviour = IgnoreReads {
            inner: SimpleServer::default(),
        };
        server.serve_connection(&mut behaviour).await;
    });

    let channel = test_channel(&endpoint);
    let mut event_loop = channel.connect().await.unwrap();

    let result = with_connection(
        &mut event_loop,
        channel.send(
            read_request(VariableId::Server_ServerStatus_CurrentTime),
            Duration::from_millis(250),
        ),
    )
    .await;
    assert_eq!(result.unwrap_err().status(), StatusCode::BadTimeout);

    // Timeouts poison the sequence number stream, so the whole channel goes down
    let after = channel
        .send(
            read_request(VariableId::Server_ServerStatus_CurrentTime),
            Duration::from_millis(250),
        )
        .await;
    assert!(after.is_err());
}
