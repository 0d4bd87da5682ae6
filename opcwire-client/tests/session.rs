//! Session level tests against the scripted server: connect/disconnect, the view and
//! attribute services, subscriptions with live notifications, and reconnecting with
//! subscription recreation.

mod mock;

use std::time::Duration;

use opcwire_client::{ClientBuilder, DataChangeCallback, SessionState};
use opcwire_core::RequestMessage;
use opcwire_types::{
    AttributeId, BrowseDescription, BrowseDescriptionResultMask, BrowseDirection, BrowsePath,
    DateTime, MonitoredItemCreateRequest, MonitoringMode, MonitoringParameters, NodeId,
    ObjectId, QualifiedName, ReadValueId, ReferenceTypeId, RelativePath, RelativePathElement,
    TimestampsToReturn, VariableId, Variant,
};
use tokio::time::timeout;

use mock::{MockServer, ServerAction, ServerBehaviour, SimpleServer};

fn test_client(endpoint: &str) -> opcwire_client::Client {
    ClientBuilder::new()
        .endpoint_url(endpoint)
        .application_name("opcwire test client")
        .session_name("opcwire test session")
        .timeout(2_000)
        .reconnect_timeout(100)
        .client()
}

async fn connected_session(
    endpoint: &str,
) -> (
    std::sync::Arc<opcwire_client::Session>,
    tokio::task::JoinHandle<opcwire_types::StatusCode>,
) {
    let client = test_client(endpoint);
    let (session, event_loop) = client.session().unwrap();
    let handle = event_loop.spawn();
    timeout(Duration::from_secs(5), session.wait_for_connection())
        .await
        .unwrap()
        .unwrap();
    (session, handle)
}

#[tokio::test]
async fn connect_and_disconnect() {
    let server = MockServer::bind().await;
    let endpoint = server.endpoint.clone();
    tokio::spawn(async move {
        server.serve_connection(&mut SimpleServer::default()).await;
    });

    let (session, handle) = connected_session(&endpoint).await;
    let mut state = session.state_watch();
    assert_eq!(*state.borrow(), SessionState::Connected);

    session.disconnect().await.unwrap();

    // Exactly one transition to disconnected, and the event loop ends cleanly
    timeout(Duration::from_secs(5), state.wait_for(|s| *s == SessionState::Disconnected))
        .await
        .unwrap()
        .unwrap();
    let status = timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
    assert!(status.is_good());
}

#[tokio::test]
async fn translate_browse_paths() {
    let server = MockServer::bind().await;
    let endpoint = server.endpoint.clone();
    tokio::spawn(async move {
        server.serve_connection(&mut SimpleServer::default()).await;
    });

    let (session, _handle) = connected_session(&endpoint).await;

    let path = BrowsePath {
        starting_node: ObjectId::Server.into(),
        relative_path: RelativePath {
            elements: Some(vec![
                RelativePathElement {
                    reference_type_id: ReferenceTypeId::HierarchicalReferences.into(),
                    is_inverse: false,
                    include_subtypes: true,
                    target_name: QualifiedName::new(0, "ServerStatus"),
                },
                RelativePathElement {
                    reference_type_id: ReferenceTypeId::HierarchicalReferences.into(),
                    is_inverse: false,
                    include_subtypes: true,
                    target_name: QualifiedName::new(0, "StartTime"),
                },
            ]),
        },
    };
    let results = session
        .translate_browse_paths_to_node_ids(&[path])
        .await
        .unwrap();

    let target = &results[0].targets.as_ref().unwrap()[0];
    assert_eq!(
        target.target_id.node_id,
        NodeId::from(VariableId::Server_ServerStatus_StartTime)
    );
}

#[tokio::test]
async fn browse_server_status() {
    let server = MockServer::bind().await;
    let endpoint = server.endpoint.clone();
    tokio::spawn(async move {
        server.serve_connection(&mut SimpleServer::default()).await;
    });

    let (session, _handle) = connected_session(&endpoint).await;

    let results = session
        .browse(
            &[BrowseDescription {
                node_id: VariableId::Server_ServerStatus.into(),
                browse_direction: BrowseDirection::Forward,
                reference_type_id: ReferenceTypeId::HierarchicalReferences.into(),
                include_subtypes: true,
                node_class_mask: 0,
                result_mask: BrowseDescriptionResultMask::RESULT_MASK_ALL,
            }],
            0,
            None,
        )
        .await
        .unwrap();

    let references = results[0].references.as_ref().unwrap();
    assert!(references.iter().any(|r| {
        r.node_id.node_id == NodeId::from(VariableId::Server_ServerStatus_StartTime)
    }));
}

#[tokio::test]
async fn read_product_name() {
    let server = MockServer::bind().await;
    let endpoint = server.endpoint.clone();
    tokio::spawn(async move {
        server.serve_connection(&mut SimpleServer::default()).await;
    });

    let (session, _handle) = connected_session(&endpoint).await;

    let results = session
        .read(
            &[ReadValueId {
                node_id: VariableId::Server_ServerStatus_BuildInfo_ProductName.into(),
                attribute_id: AttributeId::Value as u32,
                ..Default::default()
            }],
            TimestampsToReturn::Both,
            0.0,
        )
        .await
        .unwrap();

    assert_eq!(results[0].value, Some(Variant::from("mock server")));
}

fn current_time_item() -> MonitoredItemCreateRequest {
    MonitoredItemCreateRequest {
        item_to_monitor: ReadValueId {
            node_id: VariableId::Server_ServerStatus_CurrentTime.into(),
            attribute_id: AttributeId::Value as u32,
            ..Default::default()
        },
        monitoring_mode: MonitoringMode::Reporting,
        requested_parameters: MonitoringParameters {
            client_handle: 0,
            sampling_interval: -1.0,
            filter: Default::default(),
            queue_size: 1,
            discard_oldest: true,
        },
    }
}

#[tokio::test]
async fn monitored_item_receives_current_time() {
    let server = MockServer::bind().await;
    let endpoint = server.endpoint.clone();
    tokio::spawn(async move {
        server.serve_connection(&mut SimpleServer::default()).await;
    });

    let (session, _handle) = connected_session(&endpoint).await;

    let (values_tx, mut values_rx) = tokio::sync::mpsc::unbounded_channel();
    let before = DateTime::now();

    let subscription_id = session
        .create_subscription(
            Duration::from_millis(500),
            60,
            10,
            0,
            0,
            true,
            DataChangeCallback::new(move |value, _item| {
                let _ = values_tx.send(value);
            }),
        )
        .await
        .unwrap();

    let results = session
        .create_monitored_items(subscription_id, TimestampsToReturn::Both, vec![
            current_time_item(),
        ])
        .await
        .unwrap();
    assert!(results[0].status_code.is_good());

    let value = timeout(Duration::from_secs(5), values_rx.recv())
        .await
        .unwrap()
        .unwrap();
    let Some(Variant::DateTime(time)) = value.value else {
        panic!("expected a timestamp value");
    };
    assert!(*time >= before);
}

/// Wraps the simple server: drops the connection after a few publishes, so the client
/// has to reconnect and recreate its subscription.
struct DropAfterPublishes {
    inner: SimpleServer,
    publishes_left: usize,
    dropped: bool,
}

impl ServerBehaviour for DropAfterPublishes {
    fn handle(&mut self, request: RequestMessage) -> ServerAction {
        if !self.dropped && matches!(request, RequestMessage::Publish(_)) {
            if self.publishes_left == 0 {
                self.dropped = true;
                return ServerAction::CloseConnection;
            }
            self.publishes_left -= 1;
        }
        self.inner.handle(request)
    }
}

#[tokio::test]
async fn subscription_survives_reconnect() {
    let server = MockServer::bind().await;
    let endpoint = server.endpoint.clone();
    tokio::spawn(async move {
        let mut behaviour = DropAfterPublishes {
            inner: SimpleServer::default(),
            publishes_left: 2,
            dropped: false,
        };
        // First connection drops after two publishes, the second one lasts
        server.serve_connection(&mut behaviour).await;
        server.serve_connection(&mut behaviour).await;
    });

    let (session, _handle) = connected_session(&endpoint).await;

    let (values_tx, mut values_rx) = tokio::sync::mpsc::unbounded_channel();
    let subscription_id = session
        .create_subscription(
            Duration::from_millis(100),
            60,
            10,
            0,
            0,
            true,
            DataChangeCallback::new(move |value, _item| {
                let _ = values_tx.send(value);
            }),
        )
        .await
        .unwrap();
    session
        .create_monitored_items(subscription_id, TimestampsToReturn::Both, vec![
            current_time_item(),
        ])
        .await
        .unwrap();

    // The first connection delivers at most two publishes before the server drops it,
    // so the fifth value can only come from the recreated subscription on the second
    // connection.
    for _ in 0..5 {
        timeout(Duration::from_secs(5), values_rx.recv())
            .await
            .expect("expected notifications to resume after the reconnect")
            .unwrap();
    }
}
