// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Contains the implementation of `UAString` and `XmlElement`.

use std::{
    fmt,
    io::{Read, Write},
};

use crate::encoding::{
    process_decode_io_result, process_encode_io_result, read_i32, write_i32, BinaryDecodable,
    BinaryEncodable, DecodingOptions, EncodingResult, Error,
};

/// To avoid naming conflict hell, the OPC UA String type is typed `UAString` so it does not
/// collide with the Rust `String`.
///
/// A string contains UTF-8 encoded characters or a null value. A null value is distinct from
/// being an empty string so internally, the code maintains that distinction by holding the
/// value as an `Option<String>`.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct UAString {
    value: Option<String>,
}

impl fmt::Display for UAString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref value) = self.value {
            write!(f, "{}", value)
        } else {
            write!(f, "[null]")
        }
    }
}

impl BinaryEncodable for UAString {
    fn byte_len(&self) -> usize {
        // Length plus the actual string length in bytes for a non-null string.
        4 + match &self.value {
            Some(s) => s.len(),
            None => 0,
        }
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        // Strings are encoded as UTF8 chars preceded by an Int32 length. A -1 indicates a null string
        match &self.value {
            Some(s) => {
                write_i32(stream, s.len() as i32)?;
                process_encode_io_result(stream.write_all(s.as_bytes()))
            }
            None => write_i32(stream, -1),
        }
    }
}

impl BinaryDecodable for UAString {
    fn decode<S: Read + ?Sized>(stream: &mut S, options: &DecodingOptions) -> EncodingResult<Self> {
        let len = read_i32(stream)?;
        // Null string?
        if len == -1 {
            Ok(UAString::null())
        } else if len < -1 {
            Err(Error::decoding(format!(
                "String buf length is a negative number {}",
                len
            )))
        } else if len as usize > options.max_string_length {
            Err(Error::decoding(format!(
                "String buf length {} exceeds decoding limit {}",
                len, options.max_string_length
            )))
        } else {
            // Create a buffer filled with zeroes and read the string over the top
            let mut buf = vec![0u8; len as usize];
            process_decode_io_result(stream.read_exact(&mut buf))?;
            let value = String::from_utf8(buf).map_err(|err| {
                Error::decoding(format!("Decoded string was not valid UTF-8 - {}", err))
            })?;
            Ok(UAString::from(value))
        }
    }
}

impl From<UAString> for String {
    fn from(value: UAString) -> Self {
        value.as_ref().to_string()
    }
}

impl AsRef<str> for UAString {
    fn as_ref(&self) -> &str {
        self.value.as_deref().unwrap_or("")
    }
}

impl<'a> From<&'a str> for UAString {
    fn from(value: &'a str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<&String> for UAString {
    fn from(value: &String) -> Self {
        UAString {
            value: Some(value.clone()),
        }
    }
}

impl From<String> for UAString {
    fn from(value: String) -> Self {
        UAString { value: Some(value) }
    }
}

impl From<Option<String>> for UAString {
    fn from(value: Option<String>) -> Self {
        UAString { value }
    }
}

impl Default for UAString {
    fn default() -> Self {
        UAString::null()
    }
}

impl PartialEq<str> for UAString {
    fn eq(&self, other: &str) -> bool {
        match self.value {
            None => false,
            Some(ref v) => v.eq(other),
        }
    }
}

impl UAString {
    /// Get the inner raw value.
    pub fn value(&self) -> &Option<String> {
        &self.value
    }

    /// Set the inner value.
    pub fn set_value(&mut self, value: Option<String>) {
        self.value = value;
    }

    /// Returns true if the string is null or empty, false otherwise.
    pub fn is_empty(&self) -> bool {
        self.value.as_ref().map_or(true, |v| v.is_empty())
    }

    /// Returns the length of the string in bytes or -1 for null.
    pub fn len(&self) -> isize {
        match &self.value {
            Some(v) => v.len() as isize,
            None => -1,
        }
    }

    /// Create a null string (not the same as an empty string).
    pub fn null() -> UAString {
        UAString { value: None }
    }

    /// Test if the string is null.
    pub fn is_null(&self) -> bool {
        self.value.is_none()
    }
}

/// An XML element, carried on the wire exactly like a string.
#[derive(Eq, PartialEq, Debug, Clone, Hash, Default)]
pub struct XmlElement(UAString);

impl fmt::Display for XmlElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl BinaryEncodable for XmlElement {
    fn byte_len(&self) -> usize {
        self.0.byte_len()
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        self.0.encode(stream)
    }
}

impl BinaryDecodable for XmlElement {
    fn decode<S: Read + ?Sized>(stream: &mut S, options: &DecodingOptions) -> EncodingResult<Self> {
        Ok(XmlElement(UAString::decode(stream, options)?))
    }
}

impl<'a> From<&'a str> for XmlElement {
    fn from(value: &'a str) -> Self {
        XmlElement(UAString::from(value))
    }
}

impl From<String> for XmlElement {
    fn from(value: String) -> Self {
        XmlElement(UAString::from(value))
    }
}

impl From<UAString> for XmlElement {
    fn from(value: UAString) -> Self {
        XmlElement(value)
    }
}

impl XmlElement {
    /// A null XML element.
    pub fn null() -> XmlElement {
        XmlElement(UAString::null())
    }

    /// Test if the element is null.
    pub fn is_null(&self) -> bool {
        self.0.is_null()
    }

    /// The inner string value.
    pub fn as_string(&self) -> &UAString {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::decode_exact;

    #[test]
    fn string_null() {
        let s = UAString::null();
        assert!(s.is_null());
        assert!(s.is_empty());
        assert_eq!(s.len(), -1);
    }

    #[test]
    fn string_empty() {
        let s = UAString::from("");
        assert!(!s.is_null());
        assert!(s.is_empty());
        assert_eq!(s.len(), 0);
    }

    #[test]
    fn null_and_empty_are_distinct_on_the_wire() {
        assert_eq!(UAString::null().encode_to_vec(), vec![0xFF, 0xFF, 0xFF, 0xFF]);
        assert_eq!(UAString::from("").encode_to_vec(), vec![0x00, 0x00, 0x00, 0x00]);

        let options = DecodingOptions::test();
        let null: UAString = decode_exact(&[0xFF, 0xFF, 0xFF, 0xFF], &options).unwrap();
        assert!(null.is_null());
        let empty: UAString = decode_exact(&[0x00, 0x00, 0x00, 0x00], &options).unwrap();
        assert!(!empty.is_null());
        assert!(empty.is_empty());
    }

    #[test]
    fn utf8_wire_form() {
        // Mixed multi-byte and single-byte characters
        let s = UAString::from("水Boy");
        assert_eq!(
            s.encode_to_vec(),
            vec![0x06, 0x00, 0x00, 0x00, 0xE6, 0xB0, 0xB4, 0x42, 0x6F, 0x79]
        );
    }

    #[test]
    fn xml_element_wire_form() {
        let x = XmlElement::from("<A>Hot水</A>");
        assert_eq!(
            x.encode_to_vec(),
            vec![
                0x0D, 0x00, 0x00, 0x00, 0x3C, 0x41, 0x3E, 0x48, 0x6F, 0x74, 0xE6, 0xB0, 0xB4,
                0x3C, 0x2F, 0x41, 0x3E
            ]
        );
    }
}
