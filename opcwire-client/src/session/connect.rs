//! Establishing a session on a fresh secure channel: reactivate if the server still
//! knows the session, create a new one if it does not, then restore subscriptions.

use std::sync::Arc;

use log::info;

use opcwire_types::{NodeId, StatusCode};

use crate::channel::SecureChannelEventLoop;
use crate::transport::TransportPollResult;

use super::{session_debug, Session};

/// How the session was established after a connect.
#[derive(Debug, Clone)]
pub enum SessionConnectMode {
    /// A new session was created on the server.
    NewSession(NodeId),
    /// The session from before the disconnect was reactivated.
    ReactivatedSession(NodeId),
}

pub(crate) struct SessionConnector {
    inner: Arc<Session>,
}

impl SessionConnector {
    pub(crate) fn new(session: Arc<Session>) -> Self {
        Self { inner: session }
    }

    /// Open the conversation (hello and open secure channel), then run the session
    /// setup while the connection is polled.
    pub(crate) async fn try_connect(
        &self,
    ) -> Result<(SecureChannelEventLoop, SessionConnectMode), StatusCode> {
        let mut event_loop = self.inner.channel.connect().await?;

        let connect_fut = self.connect_and_activate();
        tokio::pin!(connect_fut);

        let mode = loop {
            tokio::select! {
                r = &mut connect_fut => break r?,
                r = event_loop.poll() => {
                    if let TransportPollResult::Closed(code) = r {
                        return Err(code);
                    }
                }
            }
        };

        Ok((event_loop, mode))
    }

    async fn connect_and_activate(&self) -> Result<SessionConnectMode, StatusCode> {
        let reactivated = if self.inner.auth_token.load().is_null() {
            false
        } else {
            // The stored token may still be valid on the server
            match self.inner.activate_session().await {
                Ok(()) => true,
                Err(e) if session_is_unknown(e.status()) => {
                    session_debug!(
                        self.inner,
                        "Session is unknown to the server ({}), creating a new one",
                        e.status()
                    );
                    false
                }
                Err(e) => return Err(e.status()),
            }
        };

        if !reactivated {
            self.inner.create_session().await.map_err(|e| e.status())?;
            self.inner
                .activate_session()
                .await
                .map_err(|e| e.status())?;
            info!("New session created: {}", self.inner.session_id());
        } else {
            info!("Session reactivated: {}", self.inner.session_id());
        }

        self.inner.recreate_subscriptions().await?;

        let session_id = (*self.inner.session_id()).clone();
        Ok(if reactivated {
            SessionConnectMode::ReactivatedSession(session_id)
        } else {
            SessionConnectMode::NewSession(session_id)
        })
    }
}

/// The service faults that mean the server no longer recognises the session behind the
/// authentication token.
fn session_is_unknown(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::BadSessionIdInvalid
            | StatusCode::BadSessionClosed
            | StatusCode::BadSessionNotActivated
    )
}
