// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Contains the implementation of `RequestHeader`.

use std::io::{Read, Write};

use crate::{
    date_time::DateTime,
    encoding::{BinaryDecodable, BinaryEncodable, DecodingOptions, EncodingResult},
    extension_object::ExtensionObject,
    node_id::NodeId,
    string::UAString,
};

/// The header passed with every service request, carrying the session's authentication
/// token and the caller's timeout hint.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RequestHeader {
    /// The secret session identifier returned by CreateSession.
    pub authentication_token: NodeId,
    /// The time the request was sent.
    pub timestamp: DateTime,
    /// A client-assigned identifier returned in the response header. 0 means not used.
    pub request_handle: u32,
    /// Bits indicating which diagnostics the client asks the server to return.
    pub return_diagnostics: u32,
    /// An identifier that groups related requests in audit logs.
    pub audit_entry_id: UAString,
    /// The number of milliseconds the client is prepared to wait. 0 means no hint.
    pub timeout_hint: u32,
    /// Reserved for additional header information.
    pub additional_header: ExtensionObject,
}

impl BinaryEncodable for RequestHeader {
    fn byte_len(&self) -> usize {
        self.authentication_token.byte_len()
            + self.timestamp.byte_len()
            + 4
            + 4
            + self.audit_entry_id.byte_len()
            + 4
            + self.additional_header.byte_len()
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        self.authentication_token.encode(stream)?;
        self.timestamp.encode(stream)?;
        self.request_handle.encode(stream)?;
        self.return_diagnostics.encode(stream)?;
        self.audit_entry_id.encode(stream)?;
        self.timeout_hint.encode(stream)?;
        self.additional_header.encode(stream)
    }
}

impl BinaryDecodable for RequestHeader {
    fn decode<S: Read + ?Sized>(stream: &mut S, options: &DecodingOptions) -> EncodingResult<Self> {
        Ok(RequestHeader {
            authentication_token: NodeId::decode(stream, options)?,
            timestamp: DateTime::decode(stream, options)?,
            request_handle: u32::decode(stream, options)?,
            return_diagnostics: u32::decode(stream, options)?,
            audit_entry_id: UAString::decode(stream, options)?,
            timeout_hint: u32::decode(stream, options)?,
            additional_header: ExtensionObject::decode(stream, options)?,
        })
    }
}

impl RequestHeader {
    /// Create a request header with the supplied token, handle and timeout, stamped with
    /// the current time.
    pub fn new(authentication_token: &NodeId, request_handle: u32, timeout_hint: u32) -> Self {
        RequestHeader {
            authentication_token: authentication_token.clone(),
            timestamp: DateTime::now(),
            request_handle,
            timeout_hint,
            ..Default::default()
        }
    }
}
