// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The types crate: the OPC-UA binary codec, the built-in data types and the service
//! structures the client core uses.
//!
//! Everything here is a value type. Encoding goes through [`BinaryEncodable`], decoding
//! through [`BinaryDecodable`] with [`DecodingOptions`] carrying the negotiated limits.

pub mod array;
pub mod byte_string;
pub mod data_value;
pub mod date_time;
pub mod diagnostic_info;
pub mod encoding;
pub mod expanded_node_id;
pub mod extension_object;
pub mod guid;
pub mod ids;
pub mod localized_text;
pub mod message_info;
pub mod node_id;
pub mod qualified_name;
pub mod request_header;
pub mod response_header;
pub mod service;
pub mod status_code;
pub mod string;
pub mod variant;

#[cfg(test)]
mod tests;

pub use array::{Array, ArrayError};
pub use byte_string::ByteString;
pub use data_value::{DataValue, DataValueFlags};
pub use date_time::{DateTime, DateTimeUtc};
pub use diagnostic_info::{DiagnosticInfo, DiagnosticInfoMask};
pub use encoding::{
    decode_exact, process_decode_io_result, process_encode_io_result, read_bytes, read_f32,
    read_f64, read_i16, read_i32, read_i64, read_u16, read_u32, read_u64, read_u8, write_f32,
    write_f64, write_i16, write_i32, write_i64, write_u16, write_u32, write_u64, write_u8,
    BinaryDecodable, BinaryEncodable, DecodingOptions, DepthGauge, DepthLock, EncodingResult,
    Error,
};
pub use expanded_node_id::ExpandedNodeId;
pub use extension_object::{ExtensionObject, ExtensionObjectEncoding};
pub use guid::Guid;
pub use ids::{AttributeId, ObjectId, ReferenceTypeId, VariableId};
pub use localized_text::LocalizedText;
pub use message_info::MessageInfo;
pub use node_id::{Identifier, NodeId};
pub use qualified_name::QualifiedName;
pub use request_header::RequestHeader;
pub use response_header::ResponseHeader;
pub use service::*;
pub use status_code::{StatusCode, StatusCodeSeverity};
pub use string::{UAString, XmlElement};
pub use variant::{EncodingMask, Variant, VariantScalarTypeId};

/// Limits used by default decoding options.
pub mod constants {
    /// The default maximum size of an assembled message in bytes.
    pub const MAX_MESSAGE_SIZE: usize = 2 * 1024 * 1024;
    /// The default maximum number of chunks per message.
    pub const MAX_CHUNK_COUNT: usize = 256;
    /// The default maximum string length in bytes.
    pub const MAX_STRING_LENGTH: usize = 65536;
    /// The default maximum byte string length in bytes.
    pub const MAX_BYTE_STRING_LENGTH: usize = 65536;
    /// The default maximum number of array elements.
    pub const MAX_ARRAY_LENGTH: usize = 65536;
    /// The maximum nesting depth of recursive structures during decoding.
    pub const MAX_DECODING_DEPTH: u64 = 64;
}
