// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Contains the implementation of `ResponseHeader`.

use std::io::{Read, Write};

use crate::{
    date_time::DateTime,
    diagnostic_info::DiagnosticInfo,
    encoding::{BinaryDecodable, BinaryEncodable, DecodingOptions, EncodingResult},
    extension_object::ExtensionObject,
    status_code::StatusCode,
    string::UAString,
};

/// The header carried on every service response.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResponseHeader {
    /// The time the response was sent.
    pub timestamp: DateTime,
    /// The request handle the client assigned in the matching request header.
    pub request_handle: u32,
    /// The overall result of the service call.
    pub service_result: StatusCode,
    /// Diagnostics for the service result, if requested.
    pub service_diagnostics: DiagnosticInfo,
    /// String table for diagnostics indexes.
    pub string_table: Option<Vec<UAString>>,
    /// Reserved for additional header information.
    pub additional_header: ExtensionObject,
}

impl BinaryEncodable for ResponseHeader {
    fn byte_len(&self) -> usize {
        self.timestamp.byte_len()
            + 4
            + 4
            + self.service_diagnostics.byte_len()
            + self.string_table.byte_len()
            + self.additional_header.byte_len()
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        self.timestamp.encode(stream)?;
        self.request_handle.encode(stream)?;
        self.service_result.encode(stream)?;
        self.service_diagnostics.encode(stream)?;
        self.string_table.encode(stream)?;
        self.additional_header.encode(stream)
    }
}

impl BinaryDecodable for ResponseHeader {
    fn decode<S: Read + ?Sized>(stream: &mut S, options: &DecodingOptions) -> EncodingResult<Self> {
        Ok(ResponseHeader {
            timestamp: DateTime::decode(stream, options)?,
            request_handle: u32::decode(stream, options)?,
            service_result: StatusCode::decode(stream, options)?,
            service_diagnostics: DiagnosticInfo::decode(stream, options)?,
            string_table: <Option<Vec<UAString>>>::decode(stream, options)?,
            additional_header: ExtensionObject::decode(stream, options)?,
        })
    }
}

impl ResponseHeader {
    /// A response header carrying `service_result` for the request handle of `request`.
    pub fn new_service_result(request_handle: u32, service_result: StatusCode) -> Self {
        ResponseHeader {
            timestamp: DateTime::now(),
            request_handle,
            service_result,
            ..Default::default()
        }
    }
}
