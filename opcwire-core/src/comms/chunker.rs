// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Contains code for turning messages into chunks and chunks back into messages.

use std::io::Cursor;

use log::{error, trace};
use opcwire_types::{
    BinaryDecodable, BinaryEncodable, EncodingResult, Error, ExpandedNodeId, NodeId, ObjectId,
    StatusCode,
};

use super::{
    message_chunk::{MessageChunk, MessageChunkType, MessageIsFinalType},
    secure_channel::SecureChannel,
};
use crate::constants::FIRST_SEQUENCE_NUMBER;
use crate::messages::Message;

/// Increment a sequence number by `delta`, wrapping past `u32::MAX` and skipping 0.
fn advance_sequence_number(sequence_number: u32, delta: u32) -> u32 {
    match sequence_number.checked_add(delta) {
        Some(n) => n,
        None => FIRST_SEQUENCE_NUMBER + delta - (u32::MAX - sequence_number) - 1,
    }
}

/// Turns messages to chunks and chunks to messages.
pub struct Chunker;

impl Chunker {
    /// Ensure all of the supplied chunks are sequential, belong to the same request and
    /// carry the expected channel id. The first chunk's sequence number must be
    /// `starting_sequence_number`. Returns the sequence number expected of the next
    /// incoming chunk.
    pub fn validate_chunks(
        starting_sequence_number: u32,
        secure_channel: &SecureChannel,
        chunks: &[MessageChunk],
    ) -> EncodingResult<u32> {
        let channel_id = secure_channel.secure_channel_id();
        let mut request_id = None;
        for (i, chunk) in chunks.iter().enumerate() {
            let chunk_info = chunk.chunk_info(secure_channel)?;
            let header = &chunk_info.message_header;

            // OPN chunks precede the channel id assignment
            if channel_id != 0
                && !header.message_type.is_open_secure_channel()
                && header.secure_channel_id != channel_id
            {
                return Err(Error::new(
                    StatusCode::BadSecureChannelIdInvalid,
                    format!(
                        "Chunk carries channel id {} but the channel is {}",
                        header.secure_channel_id, channel_id
                    ),
                ));
            }

            let expected_request_id =
                *request_id.get_or_insert(chunk_info.sequence_header.request_id);
            if chunk_info.sequence_header.request_id != expected_request_id {
                return Err(Error::new(
                    StatusCode::BadSequenceNumberInvalid,
                    "Chunks of one message must share a request id",
                ));
            }

            let expected_sequence_number =
                advance_sequence_number(starting_sequence_number, i as u32);
            if chunk_info.sequence_header.sequence_number != expected_sequence_number {
                error!(
                    "Expected sequence number {} but got {}",
                    expected_sequence_number, chunk_info.sequence_header.sequence_number
                );
                return Err(Error::new(
                    StatusCode::BadSequenceNumberInvalid,
                    "Chunk arrived out of order",
                ));
            }

            let expected_is_final = if i == chunks.len() - 1 {
                MessageIsFinalType::Final
            } else {
                MessageIsFinalType::Intermediate
            };
            if header.is_final != expected_is_final {
                return Err(Error::decoding("Chunk has unexpected finality"));
            }
        }
        Ok(advance_sequence_number(
            starting_sequence_number,
            chunks.len() as u32,
        ))
    }

    /// Encodes a message into one or more chunks. The first chunk takes
    /// `sequence_number`, later ones count up from it with the shared wrap rules.
    pub fn encode(
        sequence_number: u32,
        request_id: u32,
        max_message_size: usize,
        max_chunk_count: usize,
        max_chunk_size: usize,
        secure_channel: &SecureChannel,
        message: &(impl Message + std::fmt::Debug),
    ) -> EncodingResult<Vec<MessageChunk>> {
        let message_type = message.message_type();

        // The message body is the type id followed by the encoded structure
        let node_id = ExpandedNodeId::new(NodeId::from(message.type_id()));
        let message_size = node_id.byte_len() + message.byte_len();
        if max_message_size > 0 && message_size > max_message_size {
            error!(
                "Message size {} exceeds the negotiated maximum {}",
                message_size, max_message_size
            );
            return Err(Error::new(
                StatusCode::BadRequestTooLarge,
                "Message is larger than the negotiated maximum message size",
            )
            .with_request_id(request_id));
        }

        let mut stream = Cursor::new(Vec::with_capacity(message_size));
        trace!("Encoding message {:?}", message);
        node_id.encode(&mut stream)?;
        message.encode(&mut stream)?;
        let data = stream.into_inner();

        // Open and close secure channel messages never split, whatever their size
        let result = if max_chunk_size > 0 && message_type == MessageChunkType::Message {
            let max_body_per_chunk = MessageChunk::body_size_from_message_size(
                message_type,
                secure_channel,
                max_chunk_size,
            )
            .map_err(|e| e.with_request_id(request_id))?;

            // Multiple chunks means breaking the data up into sections. Fortunately
            // with security mode None as the only supported mode there is no padding
            // or signature to deal with.
            let chunk_count = data.len().div_ceil(max_body_per_chunk).max(1);
            if max_chunk_count > 0 && chunk_count > max_chunk_count {
                error!(
                    "Message requires {} chunks which exceeds the negotiated maximum {}",
                    chunk_count, max_chunk_count
                );
                return Err(Error::new(
                    StatusCode::BadRequestTooLarge,
                    "Message requires more chunks than the peer accepts",
                )
                .with_request_id(request_id));
            }

            let mut chunks = Vec::with_capacity(chunk_count);
            for (i, data_chunk) in data.chunks(max_body_per_chunk).enumerate() {
                let is_final = if i == chunk_count - 1 {
                    MessageIsFinalType::Final
                } else {
                    MessageIsFinalType::Intermediate
                };
                chunks.push(MessageChunk::new(
                    advance_sequence_number(sequence_number, i as u32),
                    request_id,
                    message_type,
                    is_final,
                    secure_channel,
                    data_chunk,
                )?);
            }
            chunks
        } else {
            let chunk = MessageChunk::new(
                sequence_number,
                request_id,
                message_type,
                MessageIsFinalType::Final,
                secure_channel,
                &data,
            )?;
            vec![chunk]
        };
        Ok(result)
    }

    /// Decodes a message from the supplied chunks. The chunks are expected to be
    /// verified (and not be aborts) before this is called.
    pub fn decode<T: Message>(
        chunks: &[MessageChunk],
        secure_channel: &SecureChannel,
        expected_object_id: Option<ObjectId>,
    ) -> EncodingResult<T> {
        let options = secure_channel.decoding_options();

        let mut data = Vec::new();
        for chunk in chunks {
            let chunk_info = chunk.chunk_info(secure_channel)?;
            let body_start = chunk_info.body_offset;
            let body_end = body_start + chunk_info.body_length;
            data.extend_from_slice(&chunk.data[body_start..body_end]);
        }

        let mut stream = Cursor::new(&data);

        // The extension object prefix is just the object id
        let object_id = ExpandedNodeId::decode(&mut stream, &options)?;
        let object_id = object_id
            .node_id
            .as_object_id()
            .ok_or_else(|| Error::decoding("The message object id is not recognized"))?;
        if let Some(expected) = expected_object_id {
            if object_id != expected {
                return Err(Error::decoding(format!(
                    "Expected message {:?}, got {:?}",
                    expected, object_id
                )));
            }
        }

        let decoded_message = T::decode_by_object_id(&mut stream, object_id, &options)?;

        // A message must consume its encoded length exactly
        if (stream.position() as usize) < data.len() {
            return Err(Error::decoding(format!(
                "Decoded message of type {:?} left {} trailing bytes",
                object_id,
                data.len() - stream.position() as usize
            )));
        }
        Ok(decoded_message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{RequestMessage, ResponseMessage};
    use opcwire_types::{
        DecodingOptions, NodeId, ReadRequest, ReadValueId, RequestHeader, ServiceFault,
        TimestampsToReturn,
    };

    fn test_channel() -> SecureChannel {
        SecureChannel::new(DecodingOptions::test())
    }

    fn read_request() -> RequestMessage {
        ReadRequest {
            request_header: RequestHeader::new(&NodeId::new(1, "token"), 10, 5000),
            max_age: 0.0,
            timestamps_to_return: TimestampsToReturn::Both,
            nodes_to_read: Some(vec![ReadValueId {
                node_id: NodeId::new(0, 2258u32),
                attribute_id: 13,
                ..Default::default()
            }]),
        }
        .into()
    }

    #[test]
    fn single_chunk_round_trip() {
        let channel = test_channel();
        let request = read_request();
        let chunks = Chunker::encode(1, 7, 0, 0, 0, &channel, &request).unwrap();
        assert_eq!(chunks.len(), 1);

        let next = Chunker::validate_chunks(1, &channel, &chunks).unwrap();
        assert_eq!(next, 2);

        let decoded: RequestMessage = Chunker::decode(&chunks, &channel, None).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn multi_chunk_round_trip() {
        let channel = test_channel();
        // Enough nodes that the message splits across minimum sized chunks
        let nodes: Vec<ReadValueId> = (0..2000)
            .map(|i| ReadValueId {
                node_id: NodeId::new(4, format!("node-number-{}", i)),
                attribute_id: 13,
                ..Default::default()
            })
            .collect();
        let request: RequestMessage = ReadRequest {
            request_header: RequestHeader::new(&NodeId::null(), 11, 5000),
            max_age: 0.0,
            timestamps_to_return: TimestampsToReturn::Both,
            nodes_to_read: Some(nodes),
        }
        .into();

        let chunks =
            Chunker::encode(1, 8, 0, 0, crate::constants::MIN_CHUNK_SIZE, &channel, &request)
                .unwrap();
        assert!(chunks.len() > 1);

        Chunker::validate_chunks(1, &channel, &chunks).unwrap();
        let decoded: RequestMessage = Chunker::decode(&chunks, &channel, None).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn out_of_order_chunks_rejected() {
        let channel = test_channel();
        let request = read_request();
        let chunks = Chunker::encode(5, 9, 0, 0, 0, &channel, &request).unwrap();

        let err = Chunker::validate_chunks(6, &channel, &chunks).unwrap_err();
        assert_eq!(err.status(), StatusCode::BadSequenceNumberInvalid);
    }

    #[test]
    fn oversized_message_rejected() {
        let channel = test_channel();
        let request = read_request();
        let err = Chunker::encode(1, 10, 16, 0, 0, &channel, &request).unwrap_err();
        assert_eq!(err.status(), StatusCode::BadRequestTooLarge);
    }

    #[test]
    fn chunk_count_limit_rejected() {
        let channel = test_channel();
        let nodes: Vec<ReadValueId> = (0..20_000)
            .map(|i| ReadValueId {
                node_id: NodeId::new(4, format!("node-number-{}", i)),
                attribute_id: 13,
                ..Default::default()
            })
            .collect();
        let request: RequestMessage = ReadRequest {
            request_header: RequestHeader::new(&NodeId::null(), 12, 5000),
            max_age: 0.0,
            timestamps_to_return: TimestampsToReturn::Both,
            nodes_to_read: Some(nodes),
        }
        .into();

        let err = Chunker::encode(
            1,
            11,
            0,
            2,
            crate::constants::MIN_CHUNK_SIZE,
            &channel,
            &request,
        )
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::BadRequestTooLarge);
    }

    #[test]
    fn service_fault_decodes_from_response_chunks() {
        let channel = test_channel();
        let fault: ResponseMessage = ServiceFault {
            response_header: opcwire_types::ResponseHeader::new_service_result(
                10,
                StatusCode::BadTimeout,
            ),
        }
        .into();
        let chunks = Chunker::encode(1, 10, 0, 0, 0, &channel, &fault).unwrap();
        let decoded: ResponseMessage = Chunker::decode(&chunks, &channel, None).unwrap();
        assert!(decoded.is_fault());
    }
}
