// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The request and response message enums. Their `decode_by_object_id` associated
//! functions are the registry that maps a decoded `_Encoding_DefaultBinary` id to the
//! concrete type's decoder.

use std::io::Read;

use opcwire_types::{BinaryEncodable, DecodingOptions, EncodingResult, ObjectId};

mod request;
mod response;

pub use request::RequestMessage;
pub use response::ResponseMessage;

use crate::comms::message_chunk::MessageChunkType;

/// The chunk type a message travels in.
pub trait MessageType {
    /// MSG, OPN or CLO.
    fn message_type(&self) -> MessageChunkType;
}

/// A message of the secure conversation.
pub trait Message: BinaryEncodable + MessageType {
    /// The request handle in the message's header.
    fn request_handle(&self) -> u32;

    /// Decode a message body of the type identified by `object_id`.
    fn decode_by_object_id<S: Read>(
        stream: &mut S,
        object_id: ObjectId,
        options: &DecodingOptions,
    ) -> EncodingResult<Self>
    where
        Self: Sized;

    /// The encoding id of the message.
    fn type_id(&self) -> ObjectId;
}
