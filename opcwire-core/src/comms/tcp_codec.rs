// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! A message extraction codec for the connection protocol. The codec accumulates bytes
//! until a whole frame is buffered, then yields either a control message or a raw chunk
//! for the conversation layer.

use std::io::Cursor;

use bytes::{Buf, BytesMut};
use log::error;
use opcwire_types::{BinaryDecodable, DecodingOptions, EncodingResult, Error, StatusCode};
use tokio_util::codec::Decoder;

use super::{
    message_chunk::MessageChunk,
    tcp_types::{
        AcknowledgeMessage, ErrorMessage, HelloMessage, ReverseHelloMessage,
        MESSAGE_HEADER_SIZE,
    },
};

/// A decoded frame.
#[derive(Debug)]
pub enum Message {
    /// A client hello. Only ever seen by test peers acting as the server.
    Hello(HelloMessage),
    /// The server's acknowledge.
    Acknowledge(AcknowledgeMessage),
    /// A fatal error frame.
    Error(ErrorMessage),
    /// A reverse hello, which this client ignores.
    ReverseHello(ReverseHelloMessage),
    /// A secure conversation chunk (MSG, OPN or CLO).
    Chunk(MessageChunk),
    /// A frame with a tag this layer does not recognise, forwarded as raw bytes.
    Unknown([u8; 3], Vec<u8>),
}

/// The codec decodes frames out of the internal buffer of a `FramedRead`.
pub struct TcpCodec {
    decoding_options: DecodingOptions,
}

impl Decoder for TcpCodec {
    type Item = Message;
    type Error = std::io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // Frames begin with an 8 byte header which carries the total frame size
        if buf.len() < MESSAGE_HEADER_SIZE {
            return Ok(None);
        }
        let message_size =
            u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]) as usize;
        if message_size < MESSAGE_HEADER_SIZE {
            error!("Received frame with impossible size {}", message_size);
            return Err(Error::new(
                StatusCode::BadTcpInternalError,
                "Frame size is smaller than the header",
            )
            .into());
        }
        if self.decoding_options.max_message_size > 0
            && message_size > self.decoding_options.max_message_size
        {
            error!(
                "Received frame with size {} exceeding the limit {}",
                message_size, self.decoding_options.max_message_size
            );
            return Err(Error::new(
                StatusCode::BadTcpMessageTooLarge,
                "Frame exceeds the negotiated receive buffer",
            )
            .into());
        }
        if buf.len() < message_size {
            buf.reserve(message_size - buf.len());
            return Ok(None);
        }

        let frame = buf.copy_to_bytes(message_size);
        Ok(Some(Self::decode_message(
            frame.as_ref(),
            &self.decoding_options,
        )?))
    }
}

impl TcpCodec {
    /// Create a codec with the channel's decoding limits.
    pub fn new(decoding_options: DecodingOptions) -> TcpCodec {
        TcpCodec { decoding_options }
    }

    fn decode_message(frame: &[u8], options: &DecodingOptions) -> EncodingResult<Message> {
        let mut tag = [0u8; 3];
        tag.copy_from_slice(&frame[0..3]);
        let mut stream = Cursor::new(frame);
        let message = match &tag as &[u8] {
            b"HEL" => Message::Hello(HelloMessage::decode(&mut stream, options)?),
            b"ACK" => Message::Acknowledge(AcknowledgeMessage::decode(&mut stream, options)?),
            b"ERR" => Message::Error(ErrorMessage::decode(&mut stream, options)?),
            b"RHE" => Message::ReverseHello(ReverseHelloMessage::decode(&mut stream, options)?),
            b"MSG" | b"OPN" | b"CLO" => {
                Message::Chunk(MessageChunk::decode(&mut stream, options)?)
            }
            _ => Message::Unknown(tag, frame.to_vec()),
        };
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opcwire_types::BinaryEncodable;

    #[test]
    fn partial_frame_waits_for_more() {
        let mut codec = TcpCodec::new(DecodingOptions::test());
        let ack = AcknowledgeMessage::new(8192, 8192, 0, 0).encode_to_vec();

        let mut buf = BytesMut::new();
        buf.extend_from_slice(&ack[..10]);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(&ack[10..]);
        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert!(matches!(decoded, Message::Acknowledge(_)));
        assert!(buf.is_empty());
    }

    #[test]
    fn frames_are_consumed_in_a_loop() {
        let mut codec = TcpCodec::new(DecodingOptions::test());
        let ack = AcknowledgeMessage::new(8192, 8192, 0, 0).encode_to_vec();

        let mut buf = BytesMut::new();
        buf.extend_from_slice(&ack);
        buf.extend_from_slice(&ack);

        assert!(codec.decode(&mut buf).unwrap().is_some());
        assert!(codec.decode(&mut buf).unwrap().is_some());
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn unknown_tags_are_forwarded() {
        let mut codec = TcpCodec::new(DecodingOptions::test());
        let mut frame = Vec::new();
        frame.extend_from_slice(b"XYZF");
        frame.extend_from_slice(&12u32.to_le_bytes());
        frame.extend_from_slice(&[1, 2, 3, 4]);

        let mut buf = BytesMut::new();
        buf.extend_from_slice(&frame);
        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        match decoded {
            Message::Unknown(tag, data) => {
                assert_eq!(&tag, b"XYZ");
                assert_eq!(data.len(), 12);
            }
            other => panic!("expected unknown frame, got {:?}", other),
        }
    }
}
