// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Endpoint URL handling. The URL scheme selects the transport back-end.

use opcwire_types::{Error, StatusCode};
use url::Url;

use crate::constants::DEFAULT_OPC_UA_SERVER_PORT;

/// The scheme of a TCP endpoint.
pub const OPC_TCP_SCHEME: &str = "opc.tcp";

/// The transport back-end an endpoint URL selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportScheme {
    /// Raw TCP, `opc.tcp://`.
    Tcp,
    /// WebSocket with the binary sub-protocol, `opc.ws://`, `opc.wss://`, `ws://`, `wss://`.
    WebSocket,
}

fn parse(endpoint_url: &str) -> Result<Url, Error> {
    Url::parse(endpoint_url).map_err(|e| {
        Error::new(
            StatusCode::BadTcpEndpointUrlInvalid,
            format!("Endpoint url {} cannot be parsed: {}", endpoint_url, e),
        )
    })
}

/// The transport back-end for `endpoint_url`, failing on schemes this client does not
/// speak.
pub fn transport_scheme(endpoint_url: &str) -> Result<TransportScheme, Error> {
    let url = parse(endpoint_url)?;
    match url.scheme() {
        OPC_TCP_SCHEME => Ok(TransportScheme::Tcp),
        "opc.ws" | "opc.wss" | "ws" | "wss" => Ok(TransportScheme::WebSocket),
        scheme => Err(Error::new(
            StatusCode::BadTcpEndpointUrlInvalid,
            format!("Endpoint scheme {} is not supported", scheme),
        )),
    }
}

/// The hostname and port of `endpoint_url`, using `default_port` if the URL has none.
pub fn hostname_port_from_url(
    endpoint_url: &str,
    default_port: u16,
) -> Result<(String, u16), Error> {
    let url = parse(endpoint_url)?;
    let host = url
        .host_str()
        .ok_or_else(|| {
            Error::new(
                StatusCode::BadTcpEndpointUrlInvalid,
                format!("Endpoint url {} has no host", endpoint_url),
            )
        })?
        .to_string();
    Ok((host, url.port().unwrap_or(default_port)))
}

/// Rewrite an endpoint URL into the `ws`/`wss` form tungstenite dials. The `opc.`
/// prefixed schemes map onto their plain WebSocket equivalents.
pub fn websocket_url(endpoint_url: &str) -> Result<String, Error> {
    let url = parse(endpoint_url)?;
    let rewritten = match url.scheme() {
        "ws" | "wss" => return Ok(endpoint_url.to_string()),
        "opc.ws" => endpoint_url.replacen("opc.ws://", "ws://", 1),
        "opc.wss" => endpoint_url.replacen("opc.wss://", "wss://", 1),
        scheme => {
            return Err(Error::new(
                StatusCode::BadTcpEndpointUrlInvalid,
                format!("Endpoint scheme {} is not a websocket scheme", scheme),
            ));
        }
    };
    Ok(rewritten)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schemes() {
        assert_eq!(
            transport_scheme("opc.tcp://localhost:4840").unwrap(),
            TransportScheme::Tcp
        );
        assert_eq!(
            transport_scheme("opc.ws://localhost:8080/ua").unwrap(),
            TransportScheme::WebSocket
        );
        assert_eq!(
            transport_scheme("wss://example.com/ua").unwrap(),
            TransportScheme::WebSocket
        );
        assert!(transport_scheme("http://example.com").is_err());
        assert!(transport_scheme("nonsense").is_err());
    }

    #[test]
    fn default_port() {
        assert_eq!(
            hostname_port_from_url("opc.tcp://box", DEFAULT_OPC_UA_SERVER_PORT).unwrap(),
            ("box".to_string(), 4840)
        );
        assert_eq!(
            hostname_port_from_url("opc.tcp://box:1234", DEFAULT_OPC_UA_SERVER_PORT).unwrap(),
            ("box".to_string(), 1234)
        );
    }

    #[test]
    fn websocket_rewrite() {
        assert_eq!(
            websocket_url("opc.ws://box:8080/ua").unwrap(),
            "ws://box:8080/ua"
        );
        assert_eq!(
            websocket_url("opc.wss://box/ua").unwrap(),
            "wss://box/ua"
        );
        assert_eq!(websocket_url("ws://box/ua").unwrap(), "ws://box/ua");
        assert!(websocket_url("opc.tcp://box").is_err());
    }
}
