// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Contains the implementation of `Variant`, the universal value container.

use std::{
    convert::TryFrom,
    fmt,
    io::{Read, Write},
};

use crate::{
    array::Array,
    byte_string::ByteString,
    data_value::DataValue,
    date_time::DateTime,
    diagnostic_info::DiagnosticInfo,
    encoding::{
        read_u8, write_i32, write_u8, BinaryDecodable, BinaryEncodable, DecodingOptions,
        EncodingResult, Error,
    },
    expanded_node_id::ExpandedNodeId,
    extension_object::ExtensionObject,
    guid::Guid,
    localized_text::LocalizedText,
    node_id::NodeId,
    qualified_name::QualifiedName,
    status_code::StatusCode,
    string::{UAString, XmlElement},
};

/// The scalar type of a variant, as it appears in the low six bits of the encoding mask.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum VariantScalarTypeId {
    /// Boolean
    Boolean = 1,
    /// Signed byte
    SByte = 2,
    /// Unsigned byte
    Byte = 3,
    /// Signed 16-bit integer
    Int16 = 4,
    /// Unsigned 16-bit integer
    UInt16 = 5,
    /// Signed 32-bit integer
    Int32 = 6,
    /// Unsigned 32-bit integer
    UInt32 = 7,
    /// Signed 64-bit integer
    Int64 = 8,
    /// Unsigned 64-bit integer
    UInt64 = 9,
    /// 32-bit float
    Float = 10,
    /// 64-bit float
    Double = 11,
    /// String
    String = 12,
    /// DateTime
    DateTime = 13,
    /// Guid
    Guid = 14,
    /// ByteString
    ByteString = 15,
    /// XmlElement
    XmlElement = 16,
    /// NodeId
    NodeId = 17,
    /// ExpandedNodeId
    ExpandedNodeId = 18,
    /// StatusCode
    StatusCode = 19,
    /// QualifiedName
    QualifiedName = 20,
    /// LocalizedText
    LocalizedText = 21,
    /// ExtensionObject
    ExtensionObject = 22,
    /// DataValue
    DataValue = 23,
    /// Variant (only valid for array elements)
    Variant = 24,
    /// DiagnosticInfo
    DiagnosticInfo = 25,
}

impl VariantScalarTypeId {
    /// Parse a scalar type from the low six bits of an encoding mask. The reserved wire
    /// ids 26-31 decode as ByteString.
    pub fn from_encoding_mask(mask: u8) -> Option<Self> {
        match mask & !EncodingMask::ARRAY_MASK {
            1 => Some(Self::Boolean),
            2 => Some(Self::SByte),
            3 => Some(Self::Byte),
            4 => Some(Self::Int16),
            5 => Some(Self::UInt16),
            6 => Some(Self::Int32),
            7 => Some(Self::UInt32),
            8 => Some(Self::Int64),
            9 => Some(Self::UInt64),
            10 => Some(Self::Float),
            11 => Some(Self::Double),
            12 => Some(Self::String),
            13 => Some(Self::DateTime),
            14 => Some(Self::Guid),
            15 => Some(Self::ByteString),
            16 => Some(Self::XmlElement),
            17 => Some(Self::NodeId),
            18 => Some(Self::ExpandedNodeId),
            19 => Some(Self::StatusCode),
            20 => Some(Self::QualifiedName),
            21 => Some(Self::LocalizedText),
            22 => Some(Self::ExtensionObject),
            23 => Some(Self::DataValue),
            24 => Some(Self::Variant),
            25 => Some(Self::DiagnosticInfo),
            26..=31 => Some(Self::ByteString),
            _ => None,
        }
    }
}

/// Bits of the variant encoding mask beyond the scalar type id.
pub struct EncodingMask;

impl EncodingMask {
    /// Bit 6: the array carries a dimensions header.
    pub const ARRAY_DIMENSIONS_BIT: u8 = 1 << 6;
    /// Bit 7: the value is an array.
    pub const ARRAY_VALUES_BIT: u8 = 1 << 7;
    /// Both array bits.
    pub const ARRAY_MASK: u8 = Self::ARRAY_DIMENSIONS_BIT | Self::ARRAY_VALUES_BIT;
}

/// A `Variant` holds built-in OPC UA data types, including single and multi dimensional
/// arrays.
///
/// As variants may be passed around a lot on the stack, Boxes are used for the larger
/// types to keep the size of this type down, especially when used in arrays.
#[derive(PartialEq, Debug, Clone, Default)]
pub enum Variant {
    /// Empty type has no value. It is equivalent to a Null value.
    #[default]
    Empty,
    /// Boolean
    Boolean(bool),
    /// Signed byte
    SByte(i8),
    /// Unsigned byte
    Byte(u8),
    /// Signed 16-bit int
    Int16(i16),
    /// Unsigned 16-bit int
    UInt16(u16),
    /// Signed 32-bit int
    Int32(i32),
    /// Unsigned 32-bit int
    UInt32(u32),
    /// Signed 64-bit int
    Int64(i64),
    /// Unsigned 64-bit int
    UInt64(u64),
    /// Float
    Float(f32),
    /// Double
    Double(f64),
    /// String
    String(UAString),
    /// DateTime
    DateTime(Box<DateTime>),
    /// Guid
    Guid(Box<Guid>),
    /// StatusCode
    StatusCode(StatusCode),
    /// ByteString
    ByteString(ByteString),
    /// XmlElement
    XmlElement(XmlElement),
    /// QualifiedName
    QualifiedName(Box<QualifiedName>),
    /// LocalizedText
    LocalizedText(Box<LocalizedText>),
    /// NodeId
    NodeId(Box<NodeId>),
    /// ExpandedNodeId
    ExpandedNodeId(Box<ExpandedNodeId>),
    /// ExtensionObject
    ExtensionObject(Box<ExtensionObject>),
    /// Nested variant, only valid as an array element.
    Variant(Box<Variant>),
    /// DataValue
    DataValue(Box<DataValue>),
    /// DiagnosticInfo
    DiagnosticInfo(Box<DiagnosticInfo>),
    /// Single or multi dimensional array, all elements of the same scalar type.
    Array(Box<Array>),
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Variant::SByte(v) => write!(f, "{}", v),
            Variant::Byte(v) => write!(f, "{}", v),
            Variant::Int16(v) => write!(f, "{}", v),
            Variant::UInt16(v) => write!(f, "{}", v),
            Variant::Int32(v) => write!(f, "{}", v),
            Variant::UInt32(v) => write!(f, "{}", v),
            Variant::Int64(v) => write!(f, "{}", v),
            Variant::UInt64(v) => write!(f, "{}", v),
            Variant::Float(v) => write!(f, "{}", v),
            Variant::Double(v) => write!(f, "{}", v),
            Variant::Boolean(v) => write!(f, "{}", v),
            Variant::String(ref v) => write!(f, "{}", v),
            Variant::Guid(ref v) => write!(f, "{}", v),
            Variant::DateTime(ref v) => write!(f, "{}", v),
            Variant::NodeId(ref v) => write!(f, "{}", v),
            Variant::ExpandedNodeId(ref v) => write!(f, "{}", v),
            Variant::Variant(ref v) => write!(f, "Variant({})", v),
            value => write!(f, "{:?}", value),
        }
    }
}

macro_rules! from_impl {
    ($tp:ty, $vt:ident) => {
        impl From<$tp> for Variant {
            fn from(value: $tp) -> Self {
                Variant::$vt(value)
            }
        }
    };
}
macro_rules! from_boxed_impl {
    ($tp:ty, $vt:ident) => {
        impl From<$tp> for Variant {
            fn from(value: $tp) -> Self {
                Variant::$vt(Box::new(value))
            }
        }
    };
}

from_impl!(bool, Boolean);
from_impl!(i8, SByte);
from_impl!(u8, Byte);
from_impl!(i16, Int16);
from_impl!(u16, UInt16);
from_impl!(i32, Int32);
from_impl!(u32, UInt32);
from_impl!(i64, Int64);
from_impl!(u64, UInt64);
from_impl!(f32, Float);
from_impl!(f64, Double);
from_impl!(UAString, String);
from_impl!(ByteString, ByteString);
from_impl!(XmlElement, XmlElement);
from_impl!(StatusCode, StatusCode);
from_boxed_impl!(ExtensionObject, ExtensionObject);
from_boxed_impl!(DateTime, DateTime);
from_boxed_impl!(Guid, Guid);
from_boxed_impl!(NodeId, NodeId);
from_boxed_impl!(ExpandedNodeId, ExpandedNodeId);
from_boxed_impl!(QualifiedName, QualifiedName);
from_boxed_impl!(LocalizedText, LocalizedText);
from_boxed_impl!(DataValue, DataValue);
from_boxed_impl!(DiagnosticInfo, DiagnosticInfo);

impl<'a> From<&'a str> for Variant {
    fn from(value: &'a str) -> Self {
        Variant::String(UAString::from(value))
    }
}

impl From<String> for Variant {
    fn from(value: String) -> Self {
        Variant::String(UAString::from(value))
    }
}

impl From<Array> for Variant {
    fn from(value: Array) -> Self {
        Variant::Array(Box::new(value))
    }
}

impl TryFrom<&Variant> for u32 {
    type Error = ();

    fn try_from(value: &Variant) -> Result<Self, Self::Error> {
        match value {
            Variant::Byte(v) => Ok(u32::from(*v)),
            Variant::UInt16(v) => Ok(u32::from(*v)),
            Variant::UInt32(v) => Ok(*v),
            _ => Err(()),
        }
    }
}

impl BinaryEncodable for Variant {
    fn byte_len(&self) -> usize {
        // Encoding mask, plus the value itself
        1 + self.value_byte_len()
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        write_u8(stream, self.encoding_mask())?;
        self.encode_value(stream)
    }
}

impl BinaryDecodable for Variant {
    fn decode<S: Read + ?Sized>(stream: &mut S, options: &DecodingOptions) -> EncodingResult<Self> {
        // Variants can contain other variants and extension objects
        let _depth_lock = options.depth_lock()?;
        let encoding_mask = read_u8(stream)?;
        let element_mask = encoding_mask & !EncodingMask::ARRAY_MASK;

        if encoding_mask & EncodingMask::ARRAY_VALUES_BIT != 0 {
            Self::decode_array(stream, encoding_mask, element_mask, options)
        } else if encoding_mask & EncodingMask::ARRAY_DIMENSIONS_BIT != 0 {
            Err(Error::decoding(
                "Array dimensions bit specified without any values",
            ))
        } else if element_mask == 0 {
            Ok(Variant::Empty)
        } else {
            // A nested variant is permitted as an array element only
            if element_mask == VariantScalarTypeId::Variant as u8 {
                return Err(Error::decoding(
                    "Variant cannot contain a variant as a scalar value",
                ));
            }
            Self::decode_scalar_value(stream, element_mask, options)
        }
    }
}

impl Variant {
    /// The scalar type id of this value. `None` for Empty and Array.
    pub fn scalar_type_id(&self) -> Option<VariantScalarTypeId> {
        match self {
            Variant::Empty | Variant::Array(_) => None,
            Variant::Boolean(_) => Some(VariantScalarTypeId::Boolean),
            Variant::SByte(_) => Some(VariantScalarTypeId::SByte),
            Variant::Byte(_) => Some(VariantScalarTypeId::Byte),
            Variant::Int16(_) => Some(VariantScalarTypeId::Int16),
            Variant::UInt16(_) => Some(VariantScalarTypeId::UInt16),
            Variant::Int32(_) => Some(VariantScalarTypeId::Int32),
            Variant::UInt32(_) => Some(VariantScalarTypeId::UInt32),
            Variant::Int64(_) => Some(VariantScalarTypeId::Int64),
            Variant::UInt64(_) => Some(VariantScalarTypeId::UInt64),
            Variant::Float(_) => Some(VariantScalarTypeId::Float),
            Variant::Double(_) => Some(VariantScalarTypeId::Double),
            Variant::String(_) => Some(VariantScalarTypeId::String),
            Variant::DateTime(_) => Some(VariantScalarTypeId::DateTime),
            Variant::Guid(_) => Some(VariantScalarTypeId::Guid),
            Variant::StatusCode(_) => Some(VariantScalarTypeId::StatusCode),
            Variant::ByteString(_) => Some(VariantScalarTypeId::ByteString),
            Variant::XmlElement(_) => Some(VariantScalarTypeId::XmlElement),
            Variant::QualifiedName(_) => Some(VariantScalarTypeId::QualifiedName),
            Variant::LocalizedText(_) => Some(VariantScalarTypeId::LocalizedText),
            Variant::NodeId(_) => Some(VariantScalarTypeId::NodeId),
            Variant::ExpandedNodeId(_) => Some(VariantScalarTypeId::ExpandedNodeId),
            Variant::ExtensionObject(_) => Some(VariantScalarTypeId::ExtensionObject),
            Variant::Variant(_) => Some(VariantScalarTypeId::Variant),
            Variant::DataValue(_) => Some(VariantScalarTypeId::DataValue),
            Variant::DiagnosticInfo(_) => Some(VariantScalarTypeId::DiagnosticInfo),
        }
    }

    /// Test if the variant is empty.
    pub fn is_empty(&self) -> bool {
        matches!(self, Variant::Empty)
    }

    /// The encoding mask, including the array bits where applicable.
    pub fn encoding_mask(&self) -> u8 {
        match self {
            Variant::Empty => 0,
            Variant::Array(array) => {
                let mut mask = array.value_type as u8 | EncodingMask::ARRAY_VALUES_BIT;
                if array.has_dimensions() && !array.values.is_empty() {
                    mask |= EncodingMask::ARRAY_DIMENSIONS_BIT;
                }
                mask
            }
            // scalar_type_id is Some for everything else
            other => other.scalar_type_id().map(|t| t as u8).unwrap_or(0),
        }
    }

    /// The byte length of the value without the encoding mask.
    fn value_byte_len(&self) -> usize {
        match self {
            Variant::Empty => 0,
            Variant::Boolean(value) => value.byte_len(),
            Variant::SByte(value) => value.byte_len(),
            Variant::Byte(value) => value.byte_len(),
            Variant::Int16(value) => value.byte_len(),
            Variant::UInt16(value) => value.byte_len(),
            Variant::Int32(value) => value.byte_len(),
            Variant::UInt32(value) => value.byte_len(),
            Variant::Int64(value) => value.byte_len(),
            Variant::UInt64(value) => value.byte_len(),
            Variant::Float(value) => value.byte_len(),
            Variant::Double(value) => value.byte_len(),
            Variant::String(value) => value.byte_len(),
            Variant::DateTime(value) => value.byte_len(),
            Variant::Guid(value) => value.byte_len(),
            Variant::StatusCode(value) => value.byte_len(),
            Variant::ByteString(value) => value.byte_len(),
            Variant::XmlElement(value) => value.byte_len(),
            Variant::QualifiedName(value) => value.byte_len(),
            Variant::LocalizedText(value) => value.byte_len(),
            Variant::NodeId(value) => value.byte_len(),
            Variant::ExpandedNodeId(value) => value.byte_len(),
            Variant::ExtensionObject(value) => value.byte_len(),
            Variant::Variant(value) => value.byte_len(),
            Variant::DataValue(value) => value.byte_len(),
            Variant::DiagnosticInfo(value) => value.byte_len(),
            Variant::Array(array) => {
                let mut size = 4;
                size += array
                    .values
                    .iter()
                    .map(|v| v.value_byte_len())
                    .sum::<usize>();
                if array.has_dimensions() && !array.values.is_empty() {
                    size += 4 + array.dimensions.as_ref().map_or(0, |d| d.len()) * 4;
                }
                size
            }
        }
    }

    /// Encode the value without the encoding mask.
    fn encode_value<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        match self {
            Variant::Empty => Ok(()),
            Variant::Boolean(value) => value.encode(stream),
            Variant::SByte(value) => value.encode(stream),
            Variant::Byte(value) => value.encode(stream),
            Variant::Int16(value) => value.encode(stream),
            Variant::UInt16(value) => value.encode(stream),
            Variant::Int32(value) => value.encode(stream),
            Variant::UInt32(value) => value.encode(stream),
            Variant::Int64(value) => value.encode(stream),
            Variant::UInt64(value) => value.encode(stream),
            Variant::Float(value) => value.encode(stream),
            Variant::Double(value) => value.encode(stream),
            Variant::String(value) => value.encode(stream),
            Variant::DateTime(value) => value.encode(stream),
            Variant::Guid(value) => value.encode(stream),
            Variant::StatusCode(value) => value.encode(stream),
            Variant::ByteString(value) => value.encode(stream),
            Variant::XmlElement(value) => value.encode(stream),
            Variant::QualifiedName(value) => value.encode(stream),
            Variant::LocalizedText(value) => value.encode(stream),
            Variant::NodeId(value) => value.encode(stream),
            Variant::ExpandedNodeId(value) => value.encode(stream),
            Variant::ExtensionObject(value) => value.encode(stream),
            Variant::Variant(value) => value.encode(stream),
            Variant::DataValue(value) => value.encode(stream),
            Variant::DiagnosticInfo(value) => value.encode(stream),
            Variant::Array(array) => {
                write_i32(stream, array.values.len() as i32)?;
                for value in array.values.iter() {
                    value.encode_value(stream)?;
                }
                // A zero length array is encoded with no dimensions header
                if array.has_dimensions() && !array.values.is_empty() {
                    let dimensions = array.dimensions.as_ref().unwrap();
                    write_i32(stream, dimensions.len() as i32)?;
                    for dimension in dimensions {
                        write_i32(stream, *dimension as i32)?;
                    }
                }
                Ok(())
            }
        }
    }

    /// Decode a scalar value of the given element type.
    fn decode_scalar_value<S: Read + ?Sized>(
        stream: &mut S,
        element_mask: u8,
        options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        let Some(type_id) = VariantScalarTypeId::from_encoding_mask(element_mask) else {
            return Err(Error::decoding(format!(
                "Unrecognized variant encoding mask: {element_mask}"
            )));
        };
        Ok(match type_id {
            VariantScalarTypeId::Boolean => Variant::from(bool::decode(stream, options)?),
            VariantScalarTypeId::SByte => Variant::from(i8::decode(stream, options)?),
            VariantScalarTypeId::Byte => Variant::from(u8::decode(stream, options)?),
            VariantScalarTypeId::Int16 => Variant::from(i16::decode(stream, options)?),
            VariantScalarTypeId::UInt16 => Variant::from(u16::decode(stream, options)?),
            VariantScalarTypeId::Int32 => Variant::from(i32::decode(stream, options)?),
            VariantScalarTypeId::UInt32 => Variant::from(u32::decode(stream, options)?),
            VariantScalarTypeId::Int64 => Variant::from(i64::decode(stream, options)?),
            VariantScalarTypeId::UInt64 => Variant::from(u64::decode(stream, options)?),
            VariantScalarTypeId::Float => Variant::from(f32::decode(stream, options)?),
            VariantScalarTypeId::Double => Variant::from(f64::decode(stream, options)?),
            VariantScalarTypeId::String => Variant::from(UAString::decode(stream, options)?),
            VariantScalarTypeId::DateTime => Variant::from(DateTime::decode(stream, options)?),
            VariantScalarTypeId::Guid => Variant::from(Guid::decode(stream, options)?),
            VariantScalarTypeId::ByteString => Variant::from(ByteString::decode(stream, options)?),
            VariantScalarTypeId::XmlElement => Variant::from(XmlElement::decode(stream, options)?),
            VariantScalarTypeId::NodeId => Variant::from(NodeId::decode(stream, options)?),
            VariantScalarTypeId::ExpandedNodeId => {
                Variant::from(ExpandedNodeId::decode(stream, options)?)
            }
            VariantScalarTypeId::StatusCode => Variant::from(StatusCode::decode(stream, options)?),
            VariantScalarTypeId::QualifiedName => {
                Variant::from(QualifiedName::decode(stream, options)?)
            }
            VariantScalarTypeId::LocalizedText => {
                Variant::from(LocalizedText::decode(stream, options)?)
            }
            VariantScalarTypeId::ExtensionObject => {
                Variant::from(ExtensionObject::decode(stream, options)?)
            }
            VariantScalarTypeId::DataValue => Variant::from(DataValue::decode(stream, options)?),
            VariantScalarTypeId::Variant => {
                Variant::Variant(Box::new(Variant::decode(stream, options)?))
            }
            VariantScalarTypeId::DiagnosticInfo => {
                Variant::from(DiagnosticInfo::decode(stream, options)?)
            }
        })
    }

    /// Decode an array variant whose encoding mask has the array values bit set.
    fn decode_array<S: Read + ?Sized>(
        stream: &mut S,
        encoding_mask: u8,
        element_mask: u8,
        options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        let value_type = VariantScalarTypeId::from_encoding_mask(element_mask).ok_or_else(|| {
            Error::decoding(format!(
                "Unrecognized variant encoding mask: {element_mask}"
            ))
        })?;

        let array_length = i32::decode(stream, options)?;
        if array_length < -1 {
            return Err(Error::decoding(format!(
                "Invalid array_length {}",
                array_length
            )));
        }

        // A null (-1) or zero length array decodes to an empty array of the type, so that
        // the element type survives the round trip.
        if array_length <= 0 {
            return Array::new_multi(value_type, Vec::new(), Vec::new())
                .map(Variant::from)
                .map_err(Error::decoding);
        }

        let array_length = array_length as usize;
        if array_length > options.max_array_length {
            return Err(Error::decoding(format!(
                "Variant array has length {} which exceeds the array length limit {}",
                array_length, options.max_array_length
            )));
        }

        let mut values: Vec<Variant> = Vec::with_capacity(array_length);
        for _ in 0..array_length {
            values.push(Self::decode_scalar_value(stream, element_mask, options)?);
        }

        if encoding_mask & EncodingMask::ARRAY_DIMENSIONS_BIT != 0 {
            let Some(dimensions) = <Option<Vec<u32>>>::decode(stream, options)? else {
                return Err(Error::decoding(
                    "No array dimensions despite the bit flag being set",
                ));
            };
            if dimensions.iter().any(|d| *d == 0) {
                return Err(Error::decoding(
                    "Invalid variant array dimensions, one or more dimensions are 0",
                ));
            }
            // Checked multiply, malicious dimensions must not overflow-panic
            let mut product = 1u32;
            for d in &dimensions {
                product = product
                    .checked_mul(*d)
                    .ok_or_else(|| Error::decoding("Array dimension overflow"))?;
            }
            if product as usize != array_length {
                return Err(Error::decoding(format!(
                    "Array dimensions do not match array length {}",
                    array_length
                )));
            }
            Array::new_multi(value_type, values, dimensions)
                .map(Variant::from)
                .map_err(Error::decoding)
        } else {
            Array::new(value_type, values)
                .map(Variant::from)
                .map_err(Error::decoding)
        }
    }
}
