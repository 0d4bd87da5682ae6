// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Contains the implementation of `NodeId`.

use std::{
    self, fmt,
    io::{Read, Write},
    str::FromStr,
};

use lazy_static::lazy_static;
use regex::Regex;

use crate::{
    byte_string::ByteString,
    encoding::{
        read_u16, read_u32, read_u8, write_u16, write_u32, write_u8, BinaryDecodable,
        BinaryEncodable, DecodingOptions, EncodingResult, Error,
    },
    guid::Guid,
    ids::{ObjectId, ReferenceTypeId, VariableId},
    status_code::StatusCode,
    string::UAString,
};

/// The maximum length in bytes of the payload of a string or opaque node id identifier.
pub const MAX_IDENTIFIER_PAYLOAD: usize = 4096;

// Data encoding byte values for each identifier form. The two high bits are reserved for
// the expanded form's namespace-URI and server-index flags.
const ENCODING_TWO_BYTE: u8 = 0x0;
const ENCODING_FOUR_BYTE: u8 = 0x1;
const ENCODING_NUMERIC: u8 = 0x2;
const ENCODING_STRING: u8 = 0x3;
const ENCODING_GUID: u8 = 0x4;
const ENCODING_BYTE_STRING: u8 = 0x5;
pub(crate) const ENCODING_NAMESPACE_URI_FLAG: u8 = 0x80;
pub(crate) const ENCODING_SERVER_INDEX_FLAG: u8 = 0x40;

/// The kind of identifier, numeric, string, guid or byte string.
#[derive(Eq, PartialEq, Clone, Debug, Hash)]
pub enum Identifier {
    /// Numeric node ID identifier. i=123
    Numeric(u32),
    /// String node ID identifier, s=...
    String(UAString),
    /// GUID node ID identifier, g=...
    Guid(Guid),
    /// Opaque node ID identifier, b=...
    ByteString(ByteString),
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Identifier::Numeric(v) => write!(f, "i={}", *v),
            Identifier::String(v) => write!(f, "s={}", v),
            Identifier::Guid(v) => write!(f, "g={:?}", v),
            Identifier::ByteString(v) => write!(f, "b={}", v.as_base64()),
        }
    }
}

impl FromStr for Identifier {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() < 2 {
            return Err(());
        }
        let k = &s[..2];
        let v = &s[2..];
        match k {
            "i=" => v.parse::<u32>().map(|v| v.into()).map_err(|_| ()),
            "s=" => Ok(UAString::from(v).into()),
            "g=" => Guid::from_str(v).map(|v| v.into()).map_err(|_| ()),
            "b=" => ByteString::from_base64(v).map(|v| v.into()).ok_or(()),
            _ => Err(()),
        }
    }
}

impl From<u32> for Identifier {
    fn from(v: u32) -> Self {
        Identifier::Numeric(v)
    }
}

impl<'a> From<&'a str> for Identifier {
    fn from(v: &'a str) -> Self {
        Identifier::from(UAString::from(v))
    }
}

impl From<String> for Identifier {
    fn from(v: String) -> Self {
        Identifier::from(UAString::from(v))
    }
}

impl From<UAString> for Identifier {
    fn from(v: UAString) -> Self {
        Identifier::String(v)
    }
}

impl From<Guid> for Identifier {
    fn from(v: Guid) -> Self {
        Identifier::Guid(v)
    }
}

impl From<ByteString> for Identifier {
    fn from(v: ByteString) -> Self {
        Identifier::ByteString(v)
    }
}

/// An identifier for a node in the address space of an OPC UA Server.
#[derive(PartialEq, Eq, Clone, Debug, Hash)]
pub struct NodeId {
    /// The index for a namespace
    pub namespace: u16,
    /// The identifier for the node in the address space
    pub identifier: Identifier,
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.namespace != 0 {
            write!(f, "ns={};{}", self.namespace, self.identifier)
        } else {
            write!(f, "{}", self.identifier)
        }
    }
}

impl BinaryEncodable for NodeId {
    fn byte_len(&self) -> usize {
        // The most compact form that fits the value determines the size
        match &self.identifier {
            Identifier::Numeric(value) => {
                if self.namespace == 0 && *value <= 255 {
                    2
                } else if self.namespace <= 255 && *value <= 65535 {
                    4
                } else {
                    7
                }
            }
            Identifier::String(value) => 3 + value.byte_len(),
            Identifier::Guid(value) => 3 + value.byte_len(),
            Identifier::ByteString(value) => 3 + value.byte_len(),
        }
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        // The node id always encodes in the most compact form that fits the value and
        // namespace, regardless of which variant it was constructed with.
        match &self.identifier {
            Identifier::Numeric(value) => {
                if self.namespace == 0 && *value <= 255 {
                    write_u8(stream, ENCODING_TWO_BYTE)?;
                    write_u8(stream, *value as u8)
                } else if self.namespace <= 255 && *value <= 65535 {
                    write_u8(stream, ENCODING_FOUR_BYTE)?;
                    write_u8(stream, self.namespace as u8)?;
                    write_u16(stream, *value as u16)
                } else {
                    write_u8(stream, ENCODING_NUMERIC)?;
                    write_u16(stream, self.namespace)?;
                    write_u32(stream, *value)
                }
            }
            Identifier::String(value) => {
                if value.len() > MAX_IDENTIFIER_PAYLOAD as isize {
                    return Err(Error::encoding(format!(
                        "String node id identifier is longer than {} bytes",
                        MAX_IDENTIFIER_PAYLOAD
                    )));
                }
                write_u8(stream, ENCODING_STRING)?;
                write_u16(stream, self.namespace)?;
                value.encode(stream)
            }
            Identifier::Guid(value) => {
                write_u8(stream, ENCODING_GUID)?;
                write_u16(stream, self.namespace)?;
                value.encode(stream)
            }
            Identifier::ByteString(value) => {
                if value.len() > MAX_IDENTIFIER_PAYLOAD as isize {
                    return Err(Error::encoding(format!(
                        "Opaque node id identifier is longer than {} bytes",
                        MAX_IDENTIFIER_PAYLOAD
                    )));
                }
                write_u8(stream, ENCODING_BYTE_STRING)?;
                write_u16(stream, self.namespace)?;
                value.encode(stream)
            }
        }
    }
}

impl BinaryDecodable for NodeId {
    fn decode<S: Read + ?Sized>(stream: &mut S, options: &DecodingOptions) -> EncodingResult<Self> {
        let encoding = read_u8(stream)?;
        if encoding & (ENCODING_NAMESPACE_URI_FLAG | ENCODING_SERVER_INDEX_FLAG) != 0 {
            return Err(Error::decoding(
                "Expanded node id flags are not valid on a plain node id",
            ));
        }
        Self::decode_body(stream, encoding, options)
    }
}

impl NodeId {
    /// Decode the body of a node id whose encoding byte has already been read.
    /// Used by both the plain and the expanded form, the latter masks off its flag bits.
    pub(crate) fn decode_body<S: Read + ?Sized>(
        stream: &mut S,
        encoding: u8,
        options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        let limited = DecodingOptions {
            max_string_length: MAX_IDENTIFIER_PAYLOAD,
            max_byte_string_length: MAX_IDENTIFIER_PAYLOAD,
            ..options.clone()
        };
        let node_id = match encoding {
            ENCODING_TWO_BYTE => {
                let value = read_u8(stream)?;
                NodeId::new(0, u32::from(value))
            }
            ENCODING_FOUR_BYTE => {
                let namespace = read_u8(stream)?;
                let value = read_u16(stream)?;
                NodeId::new(u16::from(namespace), u32::from(value))
            }
            ENCODING_NUMERIC => {
                let namespace = read_u16(stream)?;
                let value = read_u32(stream)?;
                NodeId::new(namespace, value)
            }
            ENCODING_STRING => {
                let namespace = read_u16(stream)?;
                let value = UAString::decode(stream, &limited)?;
                NodeId::new(namespace, value)
            }
            ENCODING_GUID => {
                let namespace = read_u16(stream)?;
                let value = Guid::decode(stream, &limited)?;
                NodeId::new(namespace, value)
            }
            ENCODING_BYTE_STRING => {
                let namespace = read_u16(stream)?;
                let value = ByteString::decode(stream, &limited)?;
                NodeId::new(namespace, value)
            }
            _ => {
                return Err(Error::decoding(format!(
                    "Unrecognized node id type {}",
                    encoding
                )));
            }
        };
        Ok(node_id)
    }
}

impl FromStr for NodeId {
    type Err = StatusCode;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        // Parses a node from a string using the format specified in 5.3.1.10 part 6
        //
        // ns=<namespaceindex>;<type>=<value>
        //
        // Where type:
        //   i = NUMERIC
        //   s = STRING
        //   g = GUID
        //   b = OPAQUE (ByteString)
        //
        // If namespace == 0, the ns=0; will be omitted
        lazy_static! {
            static ref RE: Regex = Regex::new(r"^(ns=(?P<ns>[0-9]+);)?(?P<t>[isgb]=.+)$").unwrap();
        }

        let captures = RE.captures(s).ok_or(StatusCode::BadNodeIdInvalid)?;

        let namespace = if let Some(ns) = captures.name("ns") {
            ns.as_str()
                .parse::<u16>()
                .map_err(|_| StatusCode::BadNodeIdInvalid)?
        } else {
            0
        };

        // The capture guarantees a "t" group
        let t = captures.name("t").unwrap();
        Identifier::from_str(t.as_str())
            .map(|t| NodeId::new(namespace, t))
            .map_err(|_| StatusCode::BadNodeIdInvalid)
    }
}

impl From<&NodeId> for NodeId {
    fn from(v: &NodeId) -> Self {
        v.clone()
    }
}

impl From<ObjectId> for NodeId {
    fn from(v: ObjectId) -> Self {
        NodeId::new(0, v as u32)
    }
}

impl From<VariableId> for NodeId {
    fn from(v: VariableId) -> Self {
        NodeId::new(0, v as u32)
    }
}

impl From<ReferenceTypeId> for NodeId {
    fn from(v: ReferenceTypeId) -> Self {
        NodeId::new(0, v as u32)
    }
}

impl<'a> From<(u16, &'a str)> for NodeId {
    fn from(v: (u16, &'a str)) -> Self {
        Self::new(v.0, UAString::from(v.1))
    }
}

impl From<(u16, u32)> for NodeId {
    fn from(v: (u16, u32)) -> Self {
        Self::new(v.0, v.1)
    }
}

impl Default for NodeId {
    fn default() -> Self {
        NodeId::null()
    }
}

impl NodeId {
    /// Constructs a new NodeId from anything that can be turned into Identifier
    /// u32, Guid, ByteString or String
    pub fn new<T>(namespace: u16, value: T) -> NodeId
    where
        T: 'static + Into<Identifier>,
    {
        NodeId {
            namespace,
            identifier: value.into(),
        }
    }

    /// Test if the node id is null, i.e. 0 namespace and 0 identifier
    pub fn is_null(&self) -> bool {
        self.namespace == 0 && self.identifier == Identifier::Numeric(0)
    }

    /// Returns a null node id
    pub fn null() -> NodeId {
        NodeId::new(0, 0u32)
    }

    /// Extracts an ObjectId from a node id, providing the node id holds an object id
    pub fn as_object_id(&self) -> Option<ObjectId> {
        match self.identifier {
            Identifier::Numeric(id) if self.namespace == 0 => ObjectId::try_from(id).ok(),
            _ => None,
        }
    }

    /// Try to convert this to a builtin variable ID.
    pub fn as_variable_id(&self) -> Option<VariableId> {
        match self.identifier {
            Identifier::Numeric(id) if self.namespace == 0 => VariableId::try_from(id).ok(),
            _ => None,
        }
    }

    /// Get the numeric value of this node ID if it is numeric.
    pub fn as_u32(&self) -> Option<u32> {
        match &self.identifier {
            Identifier::Numeric(i) => Some(*i),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::decode_exact;

    #[test]
    fn two_byte_form() {
        let n = NodeId::new(0, 72u32);
        assert_eq!(n.encode_to_vec(), vec![0x00, 0x48]);
    }

    #[test]
    fn four_byte_form() {
        let n = NodeId::new(5, 1025u32);
        assert_eq!(n.encode_to_vec(), vec![0x01, 0x05, 0x01, 0x04]);
    }

    #[test]
    fn string_form() {
        let n = NodeId::new(1, "Hot水");
        assert_eq!(
            n.encode_to_vec(),
            vec![0x03, 0x01, 0x00, 0x06, 0x00, 0x00, 0x00, 0x48, 0x6F, 0x74, 0xE6, 0xB0, 0xB4]
        );
    }

    #[test]
    fn round_trips() {
        let options = DecodingOptions::test();
        for n in [
            NodeId::new(0, 72u32),
            NodeId::new(5, 1025u32),
            NodeId::new(900, 723_562_234u32),
            NodeId::new(1, "Hot水"),
            NodeId::new(12, Guid::new()),
            NodeId::new(3, ByteString::from(vec![1, 2, 3])),
        ] {
            let decoded: NodeId = decode_exact(&n.encode_to_vec(), &options).unwrap();
            assert_eq!(decoded, n);
        }
    }

    #[test]
    fn oversized_identifier_rejected() {
        let n = NodeId::new(1, "x".repeat(MAX_IDENTIFIER_PAYLOAD + 1));
        let mut sink = Vec::new();
        let err = n.encode(&mut sink).unwrap_err();
        assert_eq!(err.status(), StatusCode::BadEncodingError);
    }

    #[test]
    fn from_str() {
        assert_eq!(NodeId::from_str("i=2258").unwrap(), NodeId::new(0, 2258u32));
        assert_eq!(
            NodeId::from_str("ns=2;s=Demo.Static").unwrap(),
            NodeId::new(2, "Demo.Static")
        );
        assert!(NodeId::from_str("nonsense").is_err());
    }
}
