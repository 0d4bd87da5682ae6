// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Contains the implementation of `ExtensionObject`.

use std::io::{Cursor, Read, Write};

use crate::{
    byte_string::ByteString,
    encoding::{
        read_u8, write_u8, BinaryDecodable, BinaryEncodable, DecodingOptions, EncodingResult,
        Error,
    },
    ids::ObjectId,
    message_info::MessageInfo,
    node_id::NodeId,
    string::XmlElement,
};

/// Enumeration that holds the kinds of encoding that an ExtensionObject data may be
/// encoded with.
#[derive(PartialEq, Debug, Clone, Default)]
pub enum ExtensionObjectEncoding {
    /// No body.
    #[default]
    None,
    /// Body is a binary encoded value, wrapped in a byte string.
    ByteString(ByteString),
    /// Body is an XML string.
    XmlElement(XmlElement),
}

/// An extension object holds a serialized value identified by its type's node id. Bodies
/// of types this stack does not know stay opaque; known types are decoded on demand with
/// [`ExtensionObject::decode_inner`], whose failure the caller treats as an opaque body
/// rather than an error of the containing structure.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct ExtensionObject {
    /// The type id of the body, the `_Encoding_DefaultBinary` node for binary bodies.
    pub node_id: NodeId,
    /// The body of the extension object.
    pub body: ExtensionObjectEncoding,
}

impl BinaryEncodable for ExtensionObject {
    fn byte_len(&self) -> usize {
        let mut size = self.node_id.byte_len() + 1;
        size += match &self.body {
            ExtensionObjectEncoding::None => 0,
            ExtensionObjectEncoding::ByteString(value) => value.byte_len(),
            ExtensionObjectEncoding::XmlElement(value) => value.byte_len(),
        };
        size
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        self.node_id.encode(stream)?;
        match &self.body {
            ExtensionObjectEncoding::None => write_u8(stream, 0x0),
            ExtensionObjectEncoding::ByteString(value) => {
                write_u8(stream, 0x1)?;
                value.encode(stream)
            }
            ExtensionObjectEncoding::XmlElement(value) => {
                write_u8(stream, 0x2)?;
                value.encode(stream)
            }
        }
    }
}

impl BinaryDecodable for ExtensionObject {
    fn decode<S: Read + ?Sized>(stream: &mut S, options: &DecodingOptions) -> EncodingResult<Self> {
        // Extension objects may contain bodies which themselves hold extension objects
        let _depth_lock = options.depth_lock()?;
        let node_id = NodeId::decode(stream, options)?;
        let encoding = read_u8(stream)?;
        let body = match encoding {
            0x0 => ExtensionObjectEncoding::None,
            0x1 => ExtensionObjectEncoding::ByteString(ByteString::decode(stream, options)?),
            0x2 => ExtensionObjectEncoding::XmlElement(XmlElement::decode(stream, options)?),
            _ => {
                return Err(Error::decoding(format!(
                    "Invalid extension object encoding {}",
                    encoding
                )));
            }
        };
        Ok(ExtensionObject { node_id, body })
    }
}

impl ExtensionObject {
    /// An extension object with no body.
    pub fn null() -> ExtensionObject {
        ExtensionObject::default()
    }

    /// Test if the object has no body.
    pub fn is_null(&self) -> bool {
        matches!(self.body, ExtensionObjectEncoding::None)
    }

    /// The object id of the body's type, if the type id is a well-known numeric id.
    pub fn object_id(&self) -> Option<ObjectId> {
        self.node_id.as_object_id()
    }

    /// Wrap a value in an extension object with a binary body.
    pub fn from_message<T>(value: &T) -> ExtensionObject
    where
        T: BinaryEncodable + MessageInfo,
    {
        ExtensionObject {
            node_id: value.type_id().into(),
            body: ExtensionObjectEncoding::ByteString(ByteString::from(value.encode_to_vec())),
        }
    }

    /// Decode a binary body into `T`. The caller picks `T` from the object's type id;
    /// a failure here is a property of the body, not of the structure the object was
    /// carried in, so callers are expected to fall back to treating the body as opaque.
    pub fn decode_inner<T>(&self, options: &DecodingOptions) -> EncodingResult<T>
    where
        T: BinaryDecodable,
    {
        match &self.body {
            ExtensionObjectEncoding::ByteString(bytes) if !bytes.is_null() => {
                let data = bytes.as_ref();
                let mut stream = Cursor::new(data);
                T::decode(&mut stream, options)
            }
            _ => Err(Error::decoding(
                "Extension object has no binary body to decode",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::decode_exact;

    #[test]
    fn null_object() {
        let e = ExtensionObject::null();
        let bytes = e.encode_to_vec();
        // Null node id, no body
        assert_eq!(bytes, vec![0x00, 0x00, 0x00]);
        let decoded: ExtensionObject = decode_exact(&bytes, &DecodingOptions::test()).unwrap();
        assert!(decoded.is_null());
    }

    #[test]
    fn unknown_body_stays_opaque() {
        let e = ExtensionObject {
            node_id: NodeId::new(2, 49u32),
            body: ExtensionObjectEncoding::ByteString(ByteString::from(vec![9, 9, 9])),
        };
        let decoded: ExtensionObject =
            decode_exact(&e.encode_to_vec(), &DecodingOptions::test()).unwrap();
        assert_eq!(decoded, e);
    }
}
