// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The connection protocol control messages. Every frame starts with an 8 byte header of
//! three ASCII type bytes, one finality byte and the little-endian total frame size
//! including the header itself.

use std::io::{Read, Write};

use opcwire_types::{
    process_decode_io_result, process_encode_io_result, read_u32, read_u8, write_u32, write_u8,
    BinaryDecodable, BinaryEncodable, DecodingOptions, EncodingResult, Error, StatusCode,
    UAString,
};

/// Hello message type tag.
pub const HELLO_MESSAGE: &[u8] = b"HEL";
/// Acknowledge message type tag.
pub const ACKNOWLEDGE_MESSAGE: &[u8] = b"ACK";
/// Error message type tag.
pub const ERROR_MESSAGE: &[u8] = b"ERR";
/// Reverse hello message type tag.
pub const REVERSE_HELLO_MESSAGE: &[u8] = b"RHE";
/// Service message chunk type tag.
pub const CHUNK_MESSAGE: &[u8] = b"MSG";
/// Open secure channel chunk type tag.
pub const OPEN_SECURE_CHANNEL_MESSAGE: &[u8] = b"OPN";
/// Close secure channel chunk type tag.
pub const CLOSE_SECURE_CHANNEL_MESSAGE: &[u8] = b"CLO";

/// Finality byte of an intermediate chunk.
pub const CHUNK_INTERMEDIATE: u8 = b'C';
/// Finality byte of the last chunk of a message, and of every control message.
pub const CHUNK_FINAL: u8 = b'F';
/// Finality byte of a chunk aborting a request.
pub const CHUNK_FINAL_ERROR: u8 = b'A';

/// The size of the frame header common to every message.
pub const MESSAGE_HEADER_SIZE: usize = 3 + 1 + 4;

/// The longest endpoint URL a hello message may carry.
pub const MAX_ENDPOINT_URL_LENGTH: usize = 4096;

/// The type of a control message frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessageType {
    /// Client's first message on a connection.
    Hello,
    /// Server's reply to hello with the negotiated limits.
    Acknowledge,
    /// Fatal error, sent instead of acknowledge or later.
    Error,
    /// Server-initiated connection header, ignored by this client.
    ReverseHello,
}

impl ControlMessageType {
    fn tag(&self) -> &'static [u8] {
        match self {
            ControlMessageType::Hello => HELLO_MESSAGE,
            ControlMessageType::Acknowledge => ACKNOWLEDGE_MESSAGE,
            ControlMessageType::Error => ERROR_MESSAGE,
            ControlMessageType::ReverseHello => REVERSE_HELLO_MESSAGE,
        }
    }
}

/// The 8 byte header leading every frame.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageHeader {
    /// The three ASCII bytes naming the frame type.
    pub message_type: [u8; 3],
    /// The finality byte, 'F' for every control message.
    pub is_final: u8,
    /// Total frame size including this header.
    pub message_size: u32,
}

impl BinaryEncodable for MessageHeader {
    fn byte_len(&self) -> usize {
        MESSAGE_HEADER_SIZE
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        process_encode_io_result(stream.write_all(&self.message_type))?;
        write_u8(stream, self.is_final)?;
        write_u32(stream, self.message_size)
    }
}

impl BinaryDecodable for MessageHeader {
    fn decode<S: Read + ?Sized>(stream: &mut S, _: &DecodingOptions) -> EncodingResult<Self> {
        let mut message_type = [0u8; 3];
        process_decode_io_result(stream.read_exact(&mut message_type))?;
        let is_final = read_u8(stream)?;
        let message_size = read_u32(stream)?;
        Ok(MessageHeader {
            message_type,
            is_final,
            message_size,
        })
    }
}

impl MessageHeader {
    /// A control message header of `message_type`, sized for a `body_len` byte payload.
    pub fn new_control(message_type: ControlMessageType, body_len: usize) -> Self {
        let mut tag = [0u8; 3];
        tag.copy_from_slice(message_type.tag());
        MessageHeader {
            message_type: tag,
            is_final: CHUNK_FINAL,
            message_size: (MESSAGE_HEADER_SIZE + body_len) as u32,
        }
    }

    /// The control message type of the header, `None` for chunk and unknown tags.
    pub fn control_message_type(&self) -> Option<ControlMessageType> {
        match &self.message_type as &[u8] {
            HELLO_MESSAGE => Some(ControlMessageType::Hello),
            ACKNOWLEDGE_MESSAGE => Some(ControlMessageType::Acknowledge),
            ERROR_MESSAGE => Some(ControlMessageType::Error),
            REVERSE_HELLO_MESSAGE => Some(ControlMessageType::ReverseHello),
            _ => None,
        }
    }

    /// `true` if the tag is one of the secure conversation chunk types.
    pub fn is_chunk(&self) -> bool {
        matches!(
            &self.message_type as &[u8],
            CHUNK_MESSAGE | OPEN_SECURE_CHANNEL_MESSAGE | CLOSE_SECURE_CHANNEL_MESSAGE
        )
    }

    fn validate_control(
        &self,
        expected: ControlMessageType,
    ) -> EncodingResult<()> {
        if self.control_message_type() != Some(expected) {
            return Err(Error::new(
                StatusCode::BadTcpMessageTypeInvalid,
                format!("Expected a {:?} frame, got {:?}", expected, self.message_type),
            ));
        }
        if self.is_final != CHUNK_FINAL {
            return Err(Error::new(
                StatusCode::BadTcpMessageTypeInvalid,
                "Control messages always carry final chunk type",
            ));
        }
        Ok(())
    }
}

/// The client's opening message, asking for buffer limits.
#[derive(Debug, Clone, PartialEq)]
pub struct HelloMessage {
    /// The frame header.
    pub message_header: MessageHeader,
    /// The version of the connection protocol.
    pub protocol_version: u32,
    /// The largest chunk the client can receive.
    pub receive_buffer_size: u32,
    /// The largest chunk the client will send.
    pub send_buffer_size: u32,
    /// The largest assembled message the client accepts, 0 for no limit.
    pub max_message_size: u32,
    /// The most chunks per message the client accepts, 0 for no limit.
    pub max_chunk_count: u32,
    /// The URL the client used to connect.
    pub endpoint_url: UAString,
}

impl BinaryEncodable for HelloMessage {
    fn byte_len(&self) -> usize {
        MESSAGE_HEADER_SIZE + 20 + self.endpoint_url.byte_len()
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        self.message_header.encode(stream)?;
        write_u32(stream, self.protocol_version)?;
        write_u32(stream, self.receive_buffer_size)?;
        write_u32(stream, self.send_buffer_size)?;
        write_u32(stream, self.max_message_size)?;
        write_u32(stream, self.max_chunk_count)?;
        self.endpoint_url.encode(stream)
    }
}

impl BinaryDecodable for HelloMessage {
    fn decode<S: Read + ?Sized>(stream: &mut S, options: &DecodingOptions) -> EncodingResult<Self> {
        let message_header = MessageHeader::decode(stream, options)?;
        message_header.validate_control(ControlMessageType::Hello)?;
        let hello = HelloMessage {
            message_header,
            protocol_version: read_u32(stream)?,
            receive_buffer_size: read_u32(stream)?,
            send_buffer_size: read_u32(stream)?,
            max_message_size: read_u32(stream)?,
            max_chunk_count: read_u32(stream)?,
            endpoint_url: UAString::decode(stream, options)?,
        };
        if hello.endpoint_url.len() > MAX_ENDPOINT_URL_LENGTH as isize {
            return Err(Error::new(
                StatusCode::BadTcpEndpointUrlInvalid,
                "Hello endpoint url exceeds the maximum length",
            ));
        }
        Ok(hello)
    }
}

impl HelloMessage {
    /// Create a hello message for `endpoint_url` with the client's limits.
    pub fn new(
        endpoint_url: &str,
        send_buffer_size: usize,
        receive_buffer_size: usize,
        max_message_size: usize,
        max_chunk_count: usize,
    ) -> HelloMessage {
        let endpoint_url = UAString::from(endpoint_url);
        let body_len = 20 + endpoint_url.byte_len();
        HelloMessage {
            message_header: MessageHeader::new_control(ControlMessageType::Hello, body_len),
            protocol_version: crate::constants::PROTOCOL_VERSION,
            receive_buffer_size: receive_buffer_size as u32,
            send_buffer_size: send_buffer_size as u32,
            max_message_size: max_message_size as u32,
            max_chunk_count: max_chunk_count as u32,
            endpoint_url,
        }
    }

    /// Test that the endpoint URL fits the frame.
    pub fn is_endpoint_url_valid(&self) -> bool {
        self.endpoint_url.len() <= MAX_ENDPOINT_URL_LENGTH as isize
    }
}

/// The server's reply to hello, carrying the limits the client must honour.
#[derive(Debug, Clone, PartialEq)]
pub struct AcknowledgeMessage {
    /// The frame header.
    pub message_header: MessageHeader,
    /// The version of the connection protocol.
    pub protocol_version: u32,
    /// The largest chunk the server can receive, which bounds the client's sends.
    pub receive_buffer_size: u32,
    /// The largest chunk the server will send.
    pub send_buffer_size: u32,
    /// The largest assembled message the server accepts, 0 for no limit.
    pub max_message_size: u32,
    /// The most chunks per message the server accepts, 0 for no limit.
    pub max_chunk_count: u32,
}

impl BinaryEncodable for AcknowledgeMessage {
    fn byte_len(&self) -> usize {
        MESSAGE_HEADER_SIZE + 20
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        self.message_header.encode(stream)?;
        write_u32(stream, self.protocol_version)?;
        write_u32(stream, self.receive_buffer_size)?;
        write_u32(stream, self.send_buffer_size)?;
        write_u32(stream, self.max_message_size)?;
        write_u32(stream, self.max_chunk_count)
    }
}

impl BinaryDecodable for AcknowledgeMessage {
    fn decode<S: Read + ?Sized>(stream: &mut S, options: &DecodingOptions) -> EncodingResult<Self> {
        let message_header = MessageHeader::decode(stream, options)?;
        message_header.validate_control(ControlMessageType::Acknowledge)?;
        Ok(AcknowledgeMessage {
            message_header,
            protocol_version: read_u32(stream)?,
            receive_buffer_size: read_u32(stream)?,
            send_buffer_size: read_u32(stream)?,
            max_message_size: read_u32(stream)?,
            max_chunk_count: read_u32(stream)?,
        })
    }
}

impl AcknowledgeMessage {
    /// Create an acknowledge message carrying the server's limits.
    pub fn new(
        receive_buffer_size: u32,
        send_buffer_size: u32,
        max_message_size: u32,
        max_chunk_count: u32,
    ) -> Self {
        AcknowledgeMessage {
            message_header: MessageHeader::new_control(ControlMessageType::Acknowledge, 20),
            protocol_version: crate::constants::PROTOCOL_VERSION,
            receive_buffer_size,
            send_buffer_size,
            max_message_size,
            max_chunk_count,
        }
    }
}

/// A fatal error on the connection, sent by the server in place of any other frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorMessage {
    /// The frame header.
    pub message_header: MessageHeader,
    /// The status code describing the error.
    pub error: u32,
    /// A vendor-specific reason.
    pub reason: UAString,
}

impl BinaryEncodable for ErrorMessage {
    fn byte_len(&self) -> usize {
        MESSAGE_HEADER_SIZE + 4 + self.reason.byte_len()
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        self.message_header.encode(stream)?;
        write_u32(stream, self.error)?;
        self.reason.encode(stream)
    }
}

impl BinaryDecodable for ErrorMessage {
    fn decode<S: Read + ?Sized>(stream: &mut S, options: &DecodingOptions) -> EncodingResult<Self> {
        let message_header = MessageHeader::decode(stream, options)?;
        message_header.validate_control(ControlMessageType::Error)?;
        Ok(ErrorMessage {
            message_header,
            error: read_u32(stream)?,
            reason: UAString::decode(stream, options)?,
        })
    }
}

impl ErrorMessage {
    /// Create an error message from a status code.
    pub fn from_status_code(status_code: StatusCode) -> ErrorMessage {
        let reason = UAString::from(status_code.name());
        let body_len = 4 + reason.byte_len();
        ErrorMessage {
            message_header: MessageHeader::new_control(ControlMessageType::Error, body_len),
            error: status_code.bits(),
            reason,
        }
    }

    /// The status code carried in the message.
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u32(self.error)
    }
}

/// Sent by a server that dials out to the client. This client only ever ignores it.
#[derive(Debug, Clone, PartialEq)]
pub struct ReverseHelloMessage {
    /// The frame header.
    pub message_header: MessageHeader,
    /// The application URI of the dialing server.
    pub server_uri: UAString,
    /// The endpoint URL the client should open a channel to.
    pub endpoint_url: UAString,
}

impl BinaryEncodable for ReverseHelloMessage {
    fn byte_len(&self) -> usize {
        MESSAGE_HEADER_SIZE + self.server_uri.byte_len() + self.endpoint_url.byte_len()
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        self.message_header.encode(stream)?;
        self.server_uri.encode(stream)?;
        self.endpoint_url.encode(stream)
    }
}

impl BinaryDecodable for ReverseHelloMessage {
    fn decode<S: Read + ?Sized>(stream: &mut S, options: &DecodingOptions) -> EncodingResult<Self> {
        let message_header = MessageHeader::decode(stream, options)?;
        message_header.validate_control(ControlMessageType::ReverseHello)?;
        Ok(ReverseHelloMessage {
            message_header,
            server_uri: UAString::decode(stream, options)?,
            endpoint_url: UAString::decode(stream, options)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opcwire_types::decode_exact;

    #[test]
    fn hello_frame() {
        let hello = HelloMessage::new("opc.tcp://localhost:4840", 65536, 65536, 0, 0);
        let bytes = hello.encode_to_vec();
        assert_eq!(&bytes[0..3], b"HEL");
        assert_eq!(bytes[3], CHUNK_FINAL);
        // Frame size includes the header
        assert_eq!(
            u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize,
            bytes.len()
        );
        let decoded: HelloMessage = decode_exact(&bytes, &DecodingOptions::test()).unwrap();
        assert_eq!(decoded, hello);
    }

    #[test]
    fn error_frame_round_trip() {
        let err = ErrorMessage::from_status_code(StatusCode::BadTcpMessageTooLarge);
        let decoded: ErrorMessage =
            decode_exact(&err.encode_to_vec(), &DecodingOptions::test()).unwrap();
        assert_eq!(decoded.status_code(), StatusCode::BadTcpMessageTooLarge);
    }

    #[test]
    fn acknowledge_round_trip() {
        let ack = AcknowledgeMessage::new(8192, 8192, 0, 0);
        let decoded: AcknowledgeMessage =
            decode_exact(&ack.encode_to_vec(), &DecodingOptions::test()).unwrap();
        assert_eq!(decoded, ack);
    }
}
