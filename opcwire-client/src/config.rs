//! Client configuration. The config derives serde so deployments can keep it in a YAML
//! file; [`crate::ClientBuilder`] is the programmatic way in and the source of defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// The user identity presented at session activation, wrapped into an extension object
/// in the ActivateSession request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum IdentityToken {
    /// No identity, the server's anonymous policy.
    #[default]
    Anonymous,
    /// A user name and password.
    UserName {
        /// The user name.
        user: String,
        /// The password. Sent in plain text under security mode None.
        password: String,
    },
    /// An X509 certificate.
    X509 {
        /// The DER encoded certificate.
        certificate_der: Vec<u8>,
    },
    /// A token issued by an external authority.
    Issued {
        /// The raw token data.
        token_data: Vec<u8>,
    },
}

/// The security mode of the connection. Only `None` exists in this revision; signing and
/// encryption reserve their place here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SecurityMode {
    /// Messages are neither signed nor encrypted.
    #[default]
    None,
}

/// Transport buffer limits, sent in the hello message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportLimits {
    /// The largest chunk the client sends before the server revises it down.
    pub send_buffer_size: usize,
    /// The largest chunk the client is willing to receive.
    pub recv_buffer_size: usize,
    /// The largest assembled message the client accepts, 0 for no limit.
    pub max_message_size: usize,
    /// The most chunks per message the client accepts, 0 for no limit.
    pub max_chunk_count: usize,
    /// How many requests may be in flight at once.
    pub max_inflight_messages: usize,
}

impl Default for TransportLimits {
    fn default() -> Self {
        Self {
            send_buffer_size: 65535,
            recv_buffer_size: 65535,
            max_message_size: 0,
            max_chunk_count: 0,
            max_inflight_messages: 100,
        }
    }
}

/// Everything the client needs to open and keep a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// The server endpoint, `opc.tcp://` or one of the WebSocket schemes.
    pub endpoint_url: String,
    /// Human readable application name, part of the client description.
    pub application_name: String,
    /// Globally unique application URI, part of the client description.
    pub application_uri: String,
    /// Globally unique product URI, part of the client description.
    pub product_uri: String,
    /// The session name shown in server diagnostics.
    pub session_name: String,
    /// The security mode. Only None in this revision.
    pub security_mode: SecurityMode,
    /// The identity presented at activation.
    pub user_identity_token: IdentityToken,
    /// The preferred secure channel token lifetime in milliseconds.
    pub requested_lifetime_ms: u32,
    /// The preferred session idle timeout in milliseconds.
    pub requested_session_timeout_ms: u32,
    /// Reconnect automatically after a connection loss.
    pub auto_reconnect: bool,
    /// Delay between reconnect attempts after the immediate first one, milliseconds.
    pub reconnect_timeout_ms: u64,
    /// Connect timeout and default request timeout hint, milliseconds.
    pub timeout_ms: u64,
    /// Interval of the keep-alive read, milliseconds.
    pub keep_alive_interval_ms: u64,
    /// Transport buffer limits.
    pub transport_limits: TransportLimits,
}

impl ClientConfig {
    /// Load a configuration from a YAML file.
    pub fn load(path: &Path) -> Result<ClientConfig, String> {
        let file = std::fs::File::open(path).map_err(|e| e.to_string())?;
        serde_yaml::from_reader(file).map_err(|e| e.to_string())
    }

    /// Save the configuration to a YAML file.
    pub fn save(&self, path: &Path) -> Result<(), String> {
        let file = std::fs::File::create(path).map_err(|e| e.to_string())?;
        serde_yaml::to_writer(file, self).map_err(|e| e.to_string())
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint_url: String::new(),
            application_name: "opcwire client".to_string(),
            application_uri: "urn:opcwire:client".to_string(),
            product_uri: "urn:opcwire".to_string(),
            session_name: "opcwire session".to_string(),
            security_mode: SecurityMode::None,
            user_identity_token: IdentityToken::Anonymous,
            requested_lifetime_ms: 60_000,
            requested_session_timeout_ms: 120_000,
            auto_reconnect: true,
            reconnect_timeout_ms: 10_000,
            timeout_ms: 30_000,
            keep_alive_interval_ms: 5_000,
            transport_limits: TransportLimits::default(),
        }
    }
}
