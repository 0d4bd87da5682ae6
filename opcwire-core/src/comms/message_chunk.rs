// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! A message chunk is a message or a portion of a message which has been split for
//! transmission.

use std::io::{Cursor, Read, Write};

use opcwire_types::{
    process_decode_io_result, process_encode_io_result, read_u32, read_u8, write_u32, write_u8,
    BinaryDecodable, BinaryEncodable, DecodingOptions, EncodingResult, Error, StatusCode,
    UAString,
};

use super::{
    secure_channel::SecureChannel,
    security_header::{SecurityHeader, SequenceHeader},
    tcp_types::{
        CHUNK_FINAL, CHUNK_FINAL_ERROR, CHUNK_INTERMEDIATE, CHUNK_MESSAGE,
        CLOSE_SECURE_CHANNEL_MESSAGE, OPEN_SECURE_CHANNEL_MESSAGE,
    },
};
use crate::constants::MIN_CHUNK_SIZE;

/// The size of a chunk header: type, finality, size and secure channel id.
pub const MESSAGE_CHUNK_HEADER_SIZE: usize = 3 + 1 + 4 + 4;

#[derive(Debug, Clone, Copy, PartialEq)]
/// Type of message chunk.
pub enum MessageChunkType {
    /// Chunk is part of a normal service message.
    Message,
    /// Chunk is an open secure channel message.
    OpenSecureChannel,
    /// Chunk is a close secure channel message.
    CloseSecureChannel,
}

impl MessageChunkType {
    /// `true` if this is an `OpenSecureChannel` message.
    pub fn is_open_secure_channel(&self) -> bool {
        *self == MessageChunkType::OpenSecureChannel
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
/// Finality of a chunk within its message.
pub enum MessageIsFinalType {
    /// More chunks follow.
    Intermediate,
    /// The final chunk.
    Final,
    /// The final chunk, aborting the request it belongs to.
    FinalError,
}

#[derive(Debug, Clone, PartialEq)]
/// Message chunk header.
pub struct MessageChunkHeader {
    /// The kind of chunk - message, open or close.
    pub message_type: MessageChunkType,
    /// The chunk finality - C == intermediate, F == final, A == final with abort.
    pub is_final: MessageIsFinalType,
    /// The size of the chunk including the header.
    pub message_size: u32,
    /// Secure channel id.
    pub secure_channel_id: u32,
}

impl BinaryEncodable for MessageChunkHeader {
    fn byte_len(&self) -> usize {
        MESSAGE_CHUNK_HEADER_SIZE
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        let message_type = match self.message_type {
            MessageChunkType::Message => CHUNK_MESSAGE,
            MessageChunkType::OpenSecureChannel => OPEN_SECURE_CHANNEL_MESSAGE,
            MessageChunkType::CloseSecureChannel => CLOSE_SECURE_CHANNEL_MESSAGE,
        };
        let is_final = match self.is_final {
            MessageIsFinalType::Intermediate => CHUNK_INTERMEDIATE,
            MessageIsFinalType::Final => CHUNK_FINAL,
            MessageIsFinalType::FinalError => CHUNK_FINAL_ERROR,
        };
        process_encode_io_result(stream.write_all(message_type))?;
        write_u8(stream, is_final)?;
        write_u32(stream, self.message_size)?;
        write_u32(stream, self.secure_channel_id)
    }
}

impl BinaryDecodable for MessageChunkHeader {
    fn decode<S: Read + ?Sized>(stream: &mut S, _: &DecodingOptions) -> EncodingResult<Self> {
        let mut message_type_code = [0u8; 3];
        process_decode_io_result(stream.read_exact(&mut message_type_code))?;
        let message_type = match &message_type_code as &[u8] {
            CHUNK_MESSAGE => MessageChunkType::Message,
            OPEN_SECURE_CHANNEL_MESSAGE => MessageChunkType::OpenSecureChannel,
            CLOSE_SECURE_CHANNEL_MESSAGE => MessageChunkType::CloseSecureChannel,
            r => {
                return Err(Error::decoding(format!(
                    "Invalid message chunk type: {r:?}"
                )));
            }
        };

        let chunk_type_code = read_u8(stream)?;
        let is_final = match chunk_type_code {
            CHUNK_FINAL => MessageIsFinalType::Final,
            CHUNK_INTERMEDIATE => MessageIsFinalType::Intermediate,
            CHUNK_FINAL_ERROR => MessageIsFinalType::FinalError,
            r => {
                return Err(Error::decoding(format!("Invalid message final type: {r}")));
            }
        };

        Ok(MessageChunkHeader {
            message_type,
            is_final,
            message_size: read_u32(stream)?,
            secure_channel_id: read_u32(stream)?,
        })
    }
}

/// Decoded positions of the parts of a chunk.
#[derive(Debug, Clone)]
pub struct ChunkInfo {
    /// The chunk header.
    pub message_header: MessageChunkHeader,
    /// The security header that follows it.
    pub security_header: SecurityHeader,
    /// The sequence header after that.
    pub sequence_header: SequenceHeader,
    /// Offset of the message body within the chunk data.
    pub body_offset: usize,
    /// Length of the message body.
    pub body_length: usize,
}

/// A chunk holds a message or a portion of a message. To extract the message all the
/// chunks must be available in sequence so they can be formed back into the message.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageChunk {
    /// All of the chunk's data including headers and payload.
    pub data: Vec<u8>,
}

impl BinaryEncodable for MessageChunk {
    fn byte_len(&self) -> usize {
        self.data.len()
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        process_encode_io_result(stream.write_all(&self.data))
    }
}

impl BinaryDecodable for MessageChunk {
    fn decode<S: Read + ?Sized>(in_stream: &mut S, options: &DecodingOptions) -> EncodingResult<Self> {
        // Read the header out first
        let chunk_header = MessageChunkHeader::decode(in_stream, options).map_err(|err| {
            Error::new(
                StatusCode::BadCommunicationError,
                format!("Cannot decode chunk header {:?}", err),
            )
        })?;

        let message_size = chunk_header.message_size as usize;
        if options.max_message_size > 0 && message_size > options.max_message_size {
            return Err(Error::new(
                StatusCode::BadTcpMessageTooLarge,
                format!(
                    "Message size {} exceeds maximum message size {}",
                    message_size, options.max_message_size
                ),
            ));
        }
        if message_size < MESSAGE_CHUNK_HEADER_SIZE {
            return Err(Error::decoding("Chunk message size is smaller than its header"));
        }

        // Write the header back into a buffer and read the remainder of the chunk after it
        let mut stream = Cursor::new(vec![0u8; message_size]);
        chunk_header.encode(&mut stream)?;
        let mut data = stream.into_inner();
        process_decode_io_result(in_stream.read_exact(&mut data[MESSAGE_CHUNK_HEADER_SIZE..]))?;

        Ok(MessageChunk { data })
    }
}

impl MessageChunk {
    /// Create a new message chunk from `data`, a part of a message body.
    pub fn new(
        sequence_number: u32,
        request_id: u32,
        message_type: MessageChunkType,
        is_final: MessageIsFinalType,
        secure_channel: &SecureChannel,
        data: &[u8],
    ) -> EncodingResult<MessageChunk> {
        let security_header = secure_channel.make_security_header(message_type);
        let sequence_header = SequenceHeader {
            sequence_number,
            request_id,
        };

        let message_size = MESSAGE_CHUNK_HEADER_SIZE
            + security_header.byte_len()
            + sequence_header.byte_len()
            + data.len();

        let chunk_header = MessageChunkHeader {
            message_type,
            is_final,
            message_size: message_size as u32,
            secure_channel_id: secure_channel.secure_channel_id(),
        };

        let mut stream = Cursor::new(vec![0u8; message_size]);
        chunk_header.encode(&mut stream)?;
        security_header.encode(&mut stream)?;
        sequence_header.encode(&mut stream)?;
        process_encode_io_result(stream.write_all(data))?;

        Ok(MessageChunk {
            data: stream.into_inner(),
        })
    }

    /// Calculates the space for message body that fits into a chunk of `max_chunk_size`
    /// bytes once the headers are taken out.
    pub fn body_size_from_message_size(
        message_type: MessageChunkType,
        secure_channel: &SecureChannel,
        max_chunk_size: usize,
    ) -> EncodingResult<usize> {
        if max_chunk_size < MIN_CHUNK_SIZE {
            return Err(Error::new(
                StatusCode::BadTcpInternalError,
                format!(
                    "Chunk size {} is less than the minimum allowed by the spec",
                    max_chunk_size
                ),
            ));
        }
        let security_header = secure_channel.make_security_header(message_type);
        let header_size =
            MESSAGE_CHUNK_HEADER_SIZE + security_header.byte_len() + SequenceHeader::default().byte_len();
        // With security mode None there is no signature or padding to subtract
        Ok(max_chunk_size - header_size)
    }

    /// Decode the chunk header from the inner data.
    pub fn message_header(&self, options: &DecodingOptions) -> EncodingResult<MessageChunkHeader> {
        let mut stream = Cursor::new(&self.data);
        MessageChunkHeader::decode(&mut stream, options)
    }

    /// Decode all the header information of this chunk.
    pub fn chunk_info(&self, secure_channel: &SecureChannel) -> EncodingResult<ChunkInfo> {
        let options = secure_channel.decoding_options();
        let mut stream = Cursor::new(&self.data);
        let message_header = MessageChunkHeader::decode(&mut stream, &options)?;
        let security_header = SecurityHeader::decode_from_stream(
            &mut stream,
            message_header.message_type.is_open_secure_channel(),
            &options,
        )?;
        let sequence_header = SequenceHeader::decode(&mut stream, &options)?;
        let body_offset = stream.position() as usize;
        let message_size = message_header.message_size as usize;
        if message_size < body_offset || message_size > self.data.len() {
            return Err(Error::decoding(
                "Chunk message size does not match its data",
            ));
        }
        Ok(ChunkInfo {
            message_header,
            security_header,
            sequence_header,
            body_offset,
            body_length: message_size - body_offset,
        })
    }
}

/// The body of an abort chunk, sent with finality 'A' to abandon a request without
/// tearing down the channel.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MessageAbortBody {
    /// The status code describing why the request was abandoned.
    pub error: u32,
    /// A vendor-specific reason.
    pub reason: UAString,
}

impl BinaryEncodable for MessageAbortBody {
    fn byte_len(&self) -> usize {
        4 + self.reason.byte_len()
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        write_u32(stream, self.error)?;
        self.reason.encode(stream)
    }
}

impl BinaryDecodable for MessageAbortBody {
    fn decode<S: Read + ?Sized>(stream: &mut S, options: &DecodingOptions) -> EncodingResult<Self> {
        Ok(MessageAbortBody {
            error: read_u32(stream)?,
            reason: UAString::decode(stream, options)?,
        })
    }
}

impl MessageAbortBody {
    /// The status code carried in the body.
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u32(self.error)
    }
}
