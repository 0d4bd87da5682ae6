// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Contains the implementation of `ExpandedNodeId`.

use std::{
    self, fmt,
    io::{Read, Write},
};

use crate::{
    encoding::{
        read_u32, read_u8, write_u32, BinaryDecodable, BinaryEncodable, DecodingOptions,
        EncodingResult,
    },
    node_id::{NodeId, ENCODING_NAMESPACE_URI_FLAG, ENCODING_SERVER_INDEX_FLAG},
    string::UAString,
};

/// A NodeId that allows the namespace URI to be specified instead of an index.
#[derive(PartialEq, Eq, Debug, Clone, Hash, Default)]
pub struct ExpandedNodeId {
    /// The inner NodeId.
    pub node_id: NodeId,
    /// The full namespace URI. If this is set, the node ID namespace index may be zero.
    pub namespace_uri: UAString,
    /// The server index. 0 means current server.
    pub server_index: u32,
}

impl fmt::Display for ExpandedNodeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        // Variant of the node id display with the uri / server index
        if !self.namespace_uri.is_null() {
            write!(
                f,
                "svr={};nsu={};{}",
                self.server_index, self.namespace_uri, self.node_id.identifier
            )
        } else {
            write!(f, "svr={};{}", self.server_index, self.node_id)
        }
    }
}

impl BinaryEncodable for ExpandedNodeId {
    fn byte_len(&self) -> usize {
        let mut size = self.node_id.byte_len();
        if !self.namespace_uri.is_null() {
            size += self.namespace_uri.byte_len();
        }
        if self.server_index != 0 {
            size += 4;
        }
        size
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        // The inner node id carries the flag bits in its leading byte, so it is encoded
        // to an intermediate buffer first.
        let mut node_id = self.node_id.encode_to_vec();
        if !self.namespace_uri.is_null() {
            node_id[0] |= ENCODING_NAMESPACE_URI_FLAG;
        }
        if self.server_index != 0 {
            node_id[0] |= ENCODING_SERVER_INDEX_FLAG;
        }
        crate::encoding::process_encode_io_result(stream.write_all(&node_id))?;

        if !self.namespace_uri.is_null() {
            self.namespace_uri.encode(stream)?;
        }
        if self.server_index != 0 {
            write_u32(stream, self.server_index)?;
        }
        Ok(())
    }
}

impl BinaryDecodable for ExpandedNodeId {
    fn decode<S: Read + ?Sized>(stream: &mut S, options: &DecodingOptions) -> EncodingResult<Self> {
        let encoding = read_u8(stream)?;
        let node_id = NodeId::decode_body(
            stream,
            encoding & !(ENCODING_NAMESPACE_URI_FLAG | ENCODING_SERVER_INDEX_FLAG),
            options,
        )?;
        let namespace_uri = if encoding & ENCODING_NAMESPACE_URI_FLAG != 0 {
            UAString::decode(stream, options)?
        } else {
            UAString::null()
        };
        let server_index = if encoding & ENCODING_SERVER_INDEX_FLAG != 0 {
            read_u32(stream)?
        } else {
            0
        };
        Ok(ExpandedNodeId {
            node_id,
            namespace_uri,
            server_index,
        })
    }
}

impl From<NodeId> for ExpandedNodeId {
    fn from(node_id: NodeId) -> Self {
        ExpandedNodeId {
            node_id,
            namespace_uri: UAString::null(),
            server_index: 0,
        }
    }
}

impl From<&NodeId> for ExpandedNodeId {
    fn from(node_id: &NodeId) -> Self {
        node_id.clone().into()
    }
}

impl ExpandedNodeId {
    /// Creates an expanded node id from a node id.
    pub fn new(node_id: impl Into<NodeId>) -> ExpandedNodeId {
        ExpandedNodeId {
            node_id: node_id.into(),
            namespace_uri: UAString::null(),
            server_index: 0,
        }
    }

    /// A null expanded node id.
    pub fn null() -> ExpandedNodeId {
        Self::new(NodeId::null())
    }

    /// Test if the whole value is null.
    pub fn is_null(&self) -> bool {
        self.node_id.is_null() && self.namespace_uri.is_null() && self.server_index == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::decode_exact;

    #[test]
    fn plain_form_matches_node_id() {
        let e = ExpandedNodeId::new(NodeId::new(0, 72u32));
        assert_eq!(e.encode_to_vec(), NodeId::new(0, 72u32).encode_to_vec());
    }

    #[test]
    fn flags_round_trip() {
        let options = DecodingOptions::test();
        let e = ExpandedNodeId {
            node_id: NodeId::new(0, 1234u32),
            namespace_uri: UAString::from("urn:some:namespace"),
            server_index: 3,
        };
        let bytes = e.encode_to_vec();
        // Four byte form with both flags set
        assert_eq!(bytes[0], 0x01 | 0x80 | 0x40);
        let decoded: ExpandedNodeId = decode_exact(&bytes, &options).unwrap();
        assert_eq!(decoded, e);
    }
}
