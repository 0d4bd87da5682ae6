// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Contains the implementation of `QualifiedName`.

use std::{
    fmt,
    io::{Read, Write},
};

use crate::{
    encoding::{
        read_u16, write_u16, BinaryDecodable, BinaryEncodable, DecodingOptions, EncodingResult,
        Error,
    },
    string::UAString,
};

/// The maximum length in characters of the name part of a qualified name.
pub const MAX_QUALIFIED_NAME_LENGTH: usize = 512;

/// An name qualified by a namespace.
#[derive(PartialEq, Eq, Debug, Clone, Hash, Default)]
pub struct QualifiedName {
    /// The namespace index.
    pub namespace_index: u16,
    /// The name.
    pub name: UAString,
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace_index != 0 {
            write!(f, "{}:{}", self.namespace_index, self.name)
        } else {
            write!(f, "{}", self.name)
        }
    }
}

impl BinaryEncodable for QualifiedName {
    fn byte_len(&self) -> usize {
        2 + self.name.byte_len()
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        if self.name.len() > MAX_QUALIFIED_NAME_LENGTH as isize {
            return Err(Error::encoding(format!(
                "Qualified name exceeds {} characters",
                MAX_QUALIFIED_NAME_LENGTH
            )));
        }
        write_u16(stream, self.namespace_index)?;
        self.name.encode(stream)
    }
}

impl BinaryDecodable for QualifiedName {
    fn decode<S: Read + ?Sized>(stream: &mut S, options: &DecodingOptions) -> EncodingResult<Self> {
        let namespace_index = read_u16(stream)?;
        let limited = DecodingOptions {
            max_string_length: MAX_QUALIFIED_NAME_LENGTH * 4,
            ..options.clone()
        };
        let name = UAString::decode(stream, &limited)?;
        Ok(QualifiedName {
            namespace_index,
            name,
        })
    }
}

impl<'a> From<&'a str> for QualifiedName {
    fn from(value: &'a str) -> Self {
        Self {
            namespace_index: 0,
            name: UAString::from(value),
        }
    }
}

impl QualifiedName {
    /// Create a new qualified name.
    pub fn new(namespace_index: u16, name: impl Into<UAString>) -> QualifiedName {
        QualifiedName {
            namespace_index,
            name: name.into(),
        }
    }

    /// A null qualified name.
    pub fn null() -> QualifiedName {
        QualifiedName {
            namespace_index: 0,
            name: UAString::null(),
        }
    }

    /// Test if the qualified name is null.
    pub fn is_null(&self) -> bool {
        self.namespace_index == 0 && self.name.is_null()
    }
}
