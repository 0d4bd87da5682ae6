//! A builder for the client and its configuration.

use crate::{
    config::{ClientConfig, IdentityToken, SecurityMode},
    session::Client,
};

/// Client builder. Starts from defaults; every setter overrides one option.
#[derive(Default)]
pub struct ClientBuilder {
    config: ClientConfig,
}

impl ClientBuilder {
    /// Creates a `ClientBuilder` with default configuration.
    pub fn new() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Creates a `ClientBuilder` from a supplied configuration, e.g. one read from a
    /// YAML file.
    pub fn from_config(config: ClientConfig) -> ClientBuilder {
        ClientBuilder { config }
    }

    /// Yield a client from the builder.
    pub fn client(self) -> Client {
        Client::new(self.config)
    }

    /// The configuration built so far.
    pub fn config(self) -> ClientConfig {
        self.config
    }

    /// The server endpoint to connect to.
    pub fn endpoint_url(mut self, endpoint_url: impl Into<String>) -> Self {
        self.config.endpoint_url = endpoint_url.into();
        self
    }

    /// The application name used at session creation.
    pub fn application_name(mut self, application_name: impl Into<String>) -> Self {
        self.config.application_name = application_name.into();
        self
    }

    /// The application URI used at session creation.
    pub fn application_uri(mut self, application_uri: impl Into<String>) -> Self {
        self.config.application_uri = application_uri.into();
        self
    }

    /// The product URI used at session creation.
    pub fn product_uri(mut self, product_uri: impl Into<String>) -> Self {
        self.config.product_uri = product_uri.into();
        self
    }

    /// The session name shown in server diagnostics.
    pub fn session_name(mut self, session_name: impl Into<String>) -> Self {
        self.config.session_name = session_name.into();
        self
    }

    /// The security mode. Only `None` exists in this revision.
    pub fn security_mode(mut self, security_mode: SecurityMode) -> Self {
        self.config.security_mode = security_mode;
        self
    }

    /// The identity presented at session activation.
    pub fn user_identity_token(mut self, token: IdentityToken) -> Self {
        self.config.user_identity_token = token;
        self
    }

    /// The preferred secure channel token lifetime in milliseconds.
    pub fn requested_lifetime(mut self, lifetime_ms: u32) -> Self {
        self.config.requested_lifetime_ms = lifetime_ms;
        self
    }

    /// The preferred session idle timeout in milliseconds.
    pub fn requested_session_timeout(mut self, timeout_ms: u32) -> Self {
        self.config.requested_session_timeout_ms = timeout_ms;
        self
    }

    /// Whether the client reconnects by itself after losing the connection.
    pub fn auto_reconnect(mut self, auto_reconnect: bool) -> Self {
        self.config.auto_reconnect = auto_reconnect;
        self
    }

    /// The delay between reconnect attempts, after the immediate first one.
    pub fn reconnect_timeout(mut self, timeout_ms: u64) -> Self {
        self.config.reconnect_timeout_ms = timeout_ms;
        self
    }

    /// The connect timeout and the default request timeout hint.
    pub fn timeout(mut self, timeout_ms: u64) -> Self {
        self.config.timeout_ms = timeout_ms;
        self
    }

    /// The interval of the keep-alive read.
    pub fn keep_alive_interval(mut self, interval_ms: u64) -> Self {
        self.config.keep_alive_interval_ms = interval_ms;
        self
    }
}
