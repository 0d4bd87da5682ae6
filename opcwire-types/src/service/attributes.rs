// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Attribute service types, Read and Write.

use super::{ua_binary_enum, ua_binary_struct, ua_message_info};
use crate::{
    data_value::DataValue, diagnostic_info::DiagnosticInfo, node_id::NodeId,
    qualified_name::QualifiedName, request_header::RequestHeader,
    response_header::ResponseHeader, status_code::StatusCode, string::UAString,
};

ua_binary_enum! {
    /// Which timestamps the server should return on values.
    pub enum TimestampsToReturn {
        /// Source timestamp only.
        #[default]
        Source = 0,
        /// Server timestamp only.
        Server = 1,
        /// Both timestamps.
        Both = 2,
        /// No timestamps.
        Neither = 3,
    }
}

ua_binary_struct! {
    /// Identifies an attribute of a node to read.
    pub struct ReadValueId {
        /// The node to read.
        pub node_id: NodeId,
        /// The attribute to read, one of [`crate::ids::AttributeId`].
        pub attribute_id: u32,
        /// Index range into an array valued attribute.
        pub index_range: UAString,
        /// The data encoding to return, null for the default.
        pub data_encoding: QualifiedName,
    }
}

ua_binary_struct! {
    /// Reads attributes of nodes.
    pub struct ReadRequest {
        /// Common request header.
        pub request_header: RequestHeader,
        /// The oldest acceptable cached value age in milliseconds.
        pub max_age: f64,
        /// Which timestamps to return.
        pub timestamps_to_return: TimestampsToReturn,
        /// The attributes to read.
        pub nodes_to_read: Option<Vec<ReadValueId>>,
    }
}
ua_message_info!(ReadRequest, ReadRequest_Encoding_DefaultBinary);

ua_binary_struct! {
    /// The response to Read, results correlate with the request by index.
    pub struct ReadResponse {
        /// Common response header.
        pub response_header: ResponseHeader,
        /// One value per read operation.
        pub results: Option<Vec<DataValue>>,
        /// Diagnostics for the results, when requested.
        pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}
ua_message_info!(ReadResponse, ReadResponse_Encoding_DefaultBinary);

ua_binary_struct! {
    /// A value to write to an attribute of a node.
    pub struct WriteValue {
        /// The node to write.
        pub node_id: NodeId,
        /// The attribute to write, one of [`crate::ids::AttributeId`].
        pub attribute_id: u32,
        /// Index range into an array valued attribute.
        pub index_range: UAString,
        /// The value to write.
        pub value: DataValue,
    }
}

ua_binary_struct! {
    /// Writes values to attributes of nodes.
    pub struct WriteRequest {
        /// Common request header.
        pub request_header: RequestHeader,
        /// The values to write.
        pub nodes_to_write: Option<Vec<WriteValue>>,
    }
}
ua_message_info!(WriteRequest, WriteRequest_Encoding_DefaultBinary);

ua_binary_struct! {
    /// The response to Write, results correlate with the request by index.
    pub struct WriteResponse {
        /// Common response header.
        pub response_header: ResponseHeader,
        /// One status per write operation.
        pub results: Option<Vec<StatusCode>>,
        /// Diagnostics for the results, when requested.
        pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}
ua_message_info!(WriteResponse, WriteResponse_Encoding_DefaultBinary);
