//! The session event loop. It owns the connection, reconnects when the transport drops,
//! and drives the keep-alive and publish loops while connected.

use std::{
    sync::{atomic::Ordering, Arc},
    time::Instant,
};

use futures::{stream::BoxStream, Stream, StreamExt, TryStreamExt};
use log::warn;

use opcwire_types::{
    AttributeId, QualifiedName, ReadValueId, StatusCode, TimestampsToReturn, UAString, VariableId,
};

use crate::channel::SecureChannelEventLoop;
use crate::transport::TransportPollResult;

use super::{
    connect::{SessionConnectMode, SessionConnector},
    session_error, session_warn,
    subscriptions::event_loop::{SubscriptionActivity, SubscriptionEventLoop},
    Session, SessionState,
};

/// A list of possible events that happen while polling the session. The client can use
/// this to monitor disconnects, publish failures and the like.
#[derive(Debug)]
#[non_exhaustive]
pub enum SessionPollResult {
    /// A message was sent to or received from the server.
    Transport(TransportPollResult),
    /// Connection was lost with the inner status code.
    ConnectionLost(StatusCode),
    /// Connecting to the server failed with the inner status code.
    ConnectFailed(StatusCode),
    /// The session was established or re-established.
    Connected(SessionConnectMode),
    /// The session begins (re)connecting to the server.
    BeginConnect,
    /// The session performed some periodic activity.
    SessionActivity(SessionActivity),
    /// The session performed some subscription-related activity.
    Subscription(SubscriptionActivity),
}

/// Periodic activity performed by the session.
#[derive(Debug, Clone)]
pub enum SessionActivity {
    /// A keep-alive read went through.
    KeepAliveSucceeded,
    /// A keep-alive read failed. The session stays up; the read is retried on the next
    /// tick.
    KeepAliveFailed(StatusCode),
}

struct ConnectedState {
    channel: SecureChannelEventLoop,
    keep_alive: BoxStream<'static, SessionActivity>,
    subscriptions: BoxStream<'static, SubscriptionActivity>,
}

enum SessionEventLoopState {
    Connected(ConnectedState),
    Connecting(SessionConnector, Instant),
    Disconnected,
}

/// The session event loop drives the client. It must be polled for anything to happen.
#[must_use = "The session event loop must be started for the session to work"]
pub struct SessionEventLoop {
    inner: Arc<Session>,
    trigger_publish_recv: tokio::sync::watch::Receiver<tokio::time::Instant>,
}

impl SessionEventLoop {
    pub(crate) fn new(
        inner: Arc<Session>,
        trigger_publish_recv: tokio::sync::watch::Receiver<tokio::time::Instant>,
    ) -> Self {
        Self {
            inner,
            trigger_publish_recv,
        }
    }

    /// Convenience method for running the event loop until completion: until the
    /// session is closed manually, or a connect fails with reconnect disabled.
    pub async fn run(self) -> StatusCode {
        let stream = self.enter();
        tokio::pin!(stream);
        loop {
            match stream.try_next().await {
                Ok(None) => break StatusCode::Good,
                Err(e) => break e,
                _ => (),
            }
        }
    }

    /// Run the event loop on a tokio task.
    pub fn spawn(self) -> tokio::task::JoinHandle<StatusCode> {
        tokio::task::spawn(self.run())
    }

    /// Start the event loop, returning a stream of poll results that must be polled
    /// until it closes. It ends with `None` after a manual disconnect, and with an error
    /// when a connection cannot be established and reconnect is off.
    pub fn enter(self) -> impl Stream<Item = Result<SessionPollResult, StatusCode>> {
        futures::stream::try_unfold(
            (self, SessionEventLoopState::Disconnected),
            |(slf, state)| async move {
                let (res, state) = match state {
                    SessionEventLoopState::Connected(mut state) => {
                        tokio::select! {
                            r = state.channel.poll() => {
                                if let TransportPollResult::Closed(code) = r {
                                    session_warn!(slf.inner, "Transport disconnected: {code}");
                                    let _ = slf.inner.state_watch_tx.send(SessionState::Disconnected);

                                    if !slf.inner.should_reconnect() {
                                        return Ok(None);
                                    }

                                    // First reconnect attempt is immediate
                                    Ok::<(SessionPollResult, SessionEventLoopState), StatusCode>((
                                        SessionPollResult::ConnectionLost(code),
                                        SessionEventLoopState::Disconnected,
                                    ))
                                } else {
                                    Ok((
                                        SessionPollResult::Transport(r),
                                        SessionEventLoopState::Connected(state),
                                    ))
                                }
                            }
                            r = state.keep_alive.next() => {
                                let Some(r) = r else {
                                    session_error!(slf.inner, "Session activity loop ended unexpectedly");
                                    return Err(StatusCode::BadUnexpectedError);
                                };

                                if let SessionActivity::KeepAliveFailed(status_code) = &r {
                                    session_warn!(slf.inner, "Keep alive failed: {status_code}");
                                }

                                Ok((
                                    SessionPollResult::SessionActivity(r),
                                    SessionEventLoopState::Connected(state),
                                ))
                            }
                            r = state.subscriptions.next() => {
                                let Some(r) = r else {
                                    session_error!(slf.inner, "Subscription event loop ended unexpectedly");
                                    return Err(StatusCode::BadUnexpectedError);
                                };

                                Ok((
                                    SessionPollResult::Subscription(r),
                                    SessionEventLoopState::Connected(state),
                                ))
                            }
                        }
                    }
                    SessionEventLoopState::Disconnected => {
                        let connector = SessionConnector::new(slf.inner.clone());

                        let _ = slf.inner.state_watch_tx.send(SessionState::Connecting);

                        Ok((
                            SessionPollResult::BeginConnect,
                            SessionEventLoopState::Connecting(connector, Instant::now()),
                        ))
                    }
                    SessionEventLoopState::Connecting(connector, next_try) => {
                        tokio::time::sleep_until(next_try.into()).await;

                        match connector.try_connect().await {
                            Ok((channel, result)) => {
                                let _ = slf.inner.state_watch_tx.send(SessionState::Connected);
                                Ok((
                                    SessionPollResult::Connected(result),
                                    SessionEventLoopState::Connected(ConnectedState {
                                        channel,
                                        keep_alive: SessionActivityLoop::new(
                                            slf.inner.clone(),
                                            slf.inner.keep_alive_interval,
                                        )
                                        .run()
                                        .boxed(),
                                        subscriptions: SubscriptionEventLoop::new(
                                            slf.inner.clone(),
                                            slf.trigger_publish_recv.clone(),
                                        )
                                        .run()
                                        .boxed(),
                                    }),
                                ))
                            }
                            Err(e) => {
                                warn!("Failed to connect to server, status code: {e}");
                                if !slf.inner.should_reconnect() {
                                    return Err(e);
                                }
                                // Later attempts wait out the reconnect timeout
                                Ok((
                                    SessionPollResult::ConnectFailed(e),
                                    SessionEventLoopState::Connecting(
                                        connector,
                                        Instant::now() + slf.inner.reconnect_timeout,
                                    ),
                                ))
                            }
                        }
                    }
                }?;

                Ok(Some((res, (slf, state))))
            },
        )
    }
}

enum SessionTickEvent {
    KeepAlive,
}

struct SessionIntervals {
    keep_alive: tokio::time::Interval,
}

impl SessionIntervals {
    pub fn new(keep_alive_interval: std::time::Duration) -> Self {
        let mut keep_alive = tokio::time::interval(keep_alive_interval);
        keep_alive.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        Self { keep_alive }
    }

    pub async fn next(&mut self) -> SessionTickEvent {
        tokio::select! {
            _ = self.keep_alive.tick() => SessionTickEvent::KeepAlive
        }
    }
}

/// The keep-alive loop: a no-op read of the server's current time, so the server's
/// session inactivity timer resets even when the session is otherwise quiet.
struct SessionActivityLoop {
    inner: Arc<Session>,
    tick_gen: SessionIntervals,
}

impl SessionActivityLoop {
    pub fn new(inner: Arc<Session>, keep_alive_interval: std::time::Duration) -> Self {
        Self {
            inner,
            tick_gen: SessionIntervals::new(keep_alive_interval),
        }
    }

    pub fn run(self) -> impl Stream<Item = SessionActivity> {
        futures::stream::unfold(self, |mut slf| async move {
            match slf.tick_gen.next().await {
                SessionTickEvent::KeepAlive => {
                    let res = slf
                        .inner
                        .read(
                            &[ReadValueId {
                                node_id: VariableId::Server_ServerStatus_CurrentTime.into(),
                                attribute_id: AttributeId::Value as u32,
                                index_range: UAString::null(),
                                data_encoding: QualifiedName::null(),
                            }],
                            TimestampsToReturn::Server,
                            0f64,
                        )
                        .await;

                    let activity = match res.map(|mut r| r.pop()) {
                        Ok(Some(_)) => SessionActivity::KeepAliveSucceeded,
                        Ok(None) => {
                            SessionActivity::KeepAliveFailed(StatusCode::BadUnknownResponse)
                        }
                        Err(e) => SessionActivity::KeepAliveFailed(e.status()),
                    };
                    Some((activity, slf))
                }
            }
        })
    }
}

// Reconnect state does not live on the session, so disconnecting while the loop is
// connecting is handled by the connect result check in the loop itself.
impl Session {
    /// Disconnect from the server, closing the session and the secure channel. The
    /// event loop terminates instead of reconnecting.
    pub async fn disconnect(&self) -> Result<(), StatusCode> {
        self.disconnect_inner(true).await
    }

    pub(crate) async fn disconnect_inner(&self, delete_subscriptions: bool) -> Result<(), StatusCode> {
        self.should_reconnect.store(false, Ordering::Relaxed);
        let close_result = self.close_session(delete_subscriptions).await;
        self.channel.close_channel().await;
        close_result.map_err(|e| e.status())
    }
}
