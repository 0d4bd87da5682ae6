// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Contains the implementation of `ByteString`.

use std::io::{Read, Write};

use base64::{engine::general_purpose::STANDARD, Engine};

use crate::encoding::{
    process_decode_io_result, process_encode_io_result, read_i32, write_i32, BinaryDecodable,
    BinaryEncodable, DecodingOptions, EncodingResult, Error,
};

/// A sequence of octets. Like strings, a null byte string is distinct from an empty one.
#[derive(Eq, PartialEq, Debug, Clone, Hash, Default)]
pub struct ByteString {
    /// The raw bytes, `None` for null.
    pub value: Option<Vec<u8>>,
}

impl BinaryEncodable for ByteString {
    fn byte_len(&self) -> usize {
        4 + match &self.value {
            Some(b) => b.len(),
            None => 0,
        }
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        match &self.value {
            Some(b) => {
                write_i32(stream, b.len() as i32)?;
                process_encode_io_result(stream.write_all(b))
            }
            None => write_i32(stream, -1),
        }
    }
}

impl BinaryDecodable for ByteString {
    fn decode<S: Read + ?Sized>(stream: &mut S, options: &DecodingOptions) -> EncodingResult<Self> {
        let len = read_i32(stream)?;
        if len == -1 {
            Ok(ByteString::null())
        } else if len < -1 {
            Err(Error::decoding(format!(
                "ByteString length is a negative number {}",
                len
            )))
        } else if len as usize > options.max_byte_string_length {
            Err(Error::decoding(format!(
                "ByteString length {} exceeds decoding limit {}",
                len, options.max_byte_string_length
            )))
        } else {
            let mut buf = vec![0u8; len as usize];
            process_decode_io_result(stream.read_exact(&mut buf))?;
            Ok(ByteString { value: Some(buf) })
        }
    }
}

impl<'a> From<&'a [u8]> for ByteString {
    fn from(value: &'a [u8]) -> Self {
        ByteString {
            value: Some(value.to_vec()),
        }
    }
}

impl From<Vec<u8>> for ByteString {
    fn from(value: Vec<u8>) -> Self {
        ByteString { value: Some(value) }
    }
}

impl ByteString {
    /// Create a null byte string (not the same as an empty byte string).
    pub fn null() -> ByteString {
        ByteString { value: None }
    }

    /// Test if the byte string is null.
    pub fn is_null(&self) -> bool {
        self.value.is_none()
    }

    /// Test if the byte string is null or empty.
    pub fn is_empty(&self) -> bool {
        self.value.as_ref().map_or(true, |v| v.is_empty())
    }

    /// The byte length of the contents, or -1 for null.
    pub fn len(&self) -> isize {
        match &self.value {
            Some(v) => v.len() as isize,
            None => -1,
        }
    }

    /// The contents as a slice, empty for null.
    pub fn as_ref(&self) -> &[u8] {
        self.value.as_deref().unwrap_or(&[])
    }

    /// Render the contents as base64, for opaque identifier display.
    pub fn as_base64(&self) -> String {
        STANDARD.encode(self.as_ref())
    }

    /// Decode a base64 string into a byte string, `None` if the input is not base64.
    pub fn from_base64(data: &str) -> Option<ByteString> {
        STANDARD.decode(data).map(ByteString::from).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::decode_exact;

    #[test]
    fn null_vs_empty() {
        assert_eq!(ByteString::null().encode_to_vec(), vec![0xFF; 4]);
        assert_eq!(ByteString::from(vec![]).encode_to_vec(), vec![0x00; 4]);

        let options = DecodingOptions::test();
        let null: ByteString = decode_exact(&[0xFF; 4], &options).unwrap();
        assert!(null.is_null());
        let empty: ByteString = decode_exact(&[0x00; 4], &options).unwrap();
        assert!(!empty.is_null());
        assert!(empty.is_empty());
    }

    #[test]
    fn base64_round_trip() {
        let b = ByteString::from(vec![1, 2, 3, 255]);
        assert_eq!(ByteString::from_base64(&b.as_base64()), Some(b));
    }
}
