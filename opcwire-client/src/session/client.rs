//! The entry point tying a configuration to sessions.

use std::sync::Arc;

use opcwire_types::StatusCode;

use crate::config::ClientConfig;

use super::{Session, SessionEventLoop};

/// Client for OPC-UA servers. Holds the configuration and produces sessions.
pub struct Client {
    config: ClientConfig,
}

impl Client {
    /// Create a client from a configuration, usually through
    /// [`crate::ClientBuilder`].
    pub fn new(config: ClientConfig) -> Client {
        Client { config }
    }

    /// The configuration of the client.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Create a session for the configured endpoint. The returned event loop must be
    /// polled, most simply with [`SessionEventLoop::spawn`]; the session connects once
    /// it runs. Use [`Session::wait_for_connection`] to wait for that.
    pub fn session(&self) -> Result<(Arc<Session>, SessionEventLoop), StatusCode> {
        Session::new(self.config.clone())
    }
}
