// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The service request/response structures and their supporting types.
//!
//! The full OPC-UA catalog is produced from the schema by an offline generation step;
//! this module hand-maintains the sub-set the client core exercises, in the same uniform
//! shape: field-for-field binary encoding in declaration order, plus the type's binary
//! encoding id.


/// Defines a structure whose binary form is its fields encoded in declaration order.
macro_rules! ua_binary_struct {
    (
        $(#[$smeta:meta])*
        pub struct $name:ident {
            $( $(#[$fmeta:meta])* pub $field:ident: $ftype:ty, )+
        }
    ) => {
        $(#[$smeta])*
        #[derive(Debug, Clone, PartialEq, Default)]
        pub struct $name {
            $( $(#[$fmeta])* pub $field: $ftype, )+
        }

        impl $crate::encoding::BinaryEncodable for $name {
            fn byte_len(&self) -> usize {
                let mut size = 0usize;
                $( size += $crate::encoding::BinaryEncodable::byte_len(&self.$field); )+
                size
            }

            fn encode<S: std::io::Write + ?Sized>(
                &self,
                stream: &mut S,
            ) -> $crate::encoding::EncodingResult<()> {
                $( $crate::encoding::BinaryEncodable::encode(&self.$field, stream)?; )+
                Ok(())
            }
        }

        impl $crate::encoding::BinaryDecodable for $name {
            fn decode<S: std::io::Read + ?Sized>(
                stream: &mut S,
                options: &$crate::encoding::DecodingOptions,
            ) -> $crate::encoding::EncodingResult<Self> {
                Ok(Self {
                    $(
                        $field: <$ftype as $crate::encoding::BinaryDecodable>::decode(
                            stream, options,
                        )?,
                    )+
                })
            }
        }
    };
}

/// Defines an enumeration carried as an Int32 on the wire. Unknown values are a decoding
/// error.
macro_rules! ua_binary_enum {
    (
        $(#[$emeta:meta])*
        pub enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $value:literal, )+
        }
    ) => {
        $(#[$emeta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
        #[repr(i32)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $value, )+
        }

        impl $crate::encoding::BinaryEncodable for $name {
            fn byte_len(&self) -> usize {
                4
            }

            fn encode<S: std::io::Write + ?Sized>(
                &self,
                stream: &mut S,
            ) -> $crate::encoding::EncodingResult<()> {
                $crate::encoding::write_i32(stream, *self as i32)
            }
        }

        impl $crate::encoding::BinaryDecodable for $name {
            fn decode<S: std::io::Read + ?Sized>(
                stream: &mut S,
                _: &$crate::encoding::DecodingOptions,
            ) -> $crate::encoding::EncodingResult<Self> {
                let value = $crate::encoding::read_i32(stream)?;
                match value {
                    $( $value => Ok(Self::$variant), )+
                    _ => Err($crate::encoding::Error::decoding(format!(
                        "Invalid {} value {}",
                        stringify!($name),
                        value
                    ))),
                }
            }
        }
    };
}

/// Ties a type to its `_Encoding_DefaultBinary` object id.
macro_rules! ua_message_info {
    ($name:ident, $object_id:ident) => {
        impl $crate::message_info::MessageInfo for $name {
            fn type_id(&self) -> $crate::ids::ObjectId {
                $crate::ids::ObjectId::$object_id
            }
        }
    };
}

pub(crate) use ua_binary_enum;
pub(crate) use ua_binary_struct;
pub(crate) use ua_message_info;

mod attributes;
mod notifications;
mod secure_channel;
mod session;
mod subscriptions;
mod view;

pub use attributes::*;
pub use notifications::*;
pub use secure_channel::*;
pub use session::*;
pub use subscriptions::*;
pub use view::*;
