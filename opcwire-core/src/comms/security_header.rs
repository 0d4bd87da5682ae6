// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The security and sequence headers carried in every message chunk.

use std::io::{Read, Write};

use opcwire_types::{
    read_u32, write_u32, BinaryDecodable, BinaryEncodable, ByteString, DecodingOptions,
    EncodingResult, UAString,
};

/// The security header of a chunk. Open secure channel chunks carry the asymmetric form,
/// everything else the symmetric form.
#[derive(Debug, Clone, PartialEq)]
pub enum SecurityHeader {
    /// Policy and certificates, on OPN chunks.
    Asymmetric(AsymmetricSecurityHeader),
    /// The active token id, on MSG and CLO chunks.
    Symmetric(SymmetricSecurityHeader),
}

impl BinaryEncodable for SecurityHeader {
    fn byte_len(&self) -> usize {
        match self {
            SecurityHeader::Asymmetric(value) => value.byte_len(),
            SecurityHeader::Symmetric(value) => value.byte_len(),
        }
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        match self {
            SecurityHeader::Asymmetric(value) => value.encode(stream),
            SecurityHeader::Symmetric(value) => value.encode(stream),
        }
    }
}

impl SecurityHeader {
    /// Decode the security header; the chunk type decides which form to expect.
    pub fn decode_from_stream<S: Read + ?Sized>(
        stream: &mut S,
        is_open_secure_channel: bool,
        options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        if is_open_secure_channel {
            Ok(SecurityHeader::Asymmetric(AsymmetricSecurityHeader::decode(
                stream, options,
            )?))
        } else {
            Ok(SecurityHeader::Symmetric(SymmetricSecurityHeader::decode(
                stream, options,
            )?))
        }
    }
}

/// Token id of the active security token.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SymmetricSecurityHeader {
    /// The id issued in the OpenSecureChannel response.
    pub token_id: u32,
}

impl BinaryEncodable for SymmetricSecurityHeader {
    fn byte_len(&self) -> usize {
        4
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        write_u32(stream, self.token_id)
    }
}

impl BinaryDecodable for SymmetricSecurityHeader {
    fn decode<S: Read + ?Sized>(stream: &mut S, _: &DecodingOptions) -> EncodingResult<Self> {
        Ok(SymmetricSecurityHeader {
            token_id: read_u32(stream)?,
        })
    }
}

/// Security policy and certificates. With security mode None the certificate fields stay
/// null; secured modes will fill them in.
#[derive(Debug, Clone, PartialEq)]
pub struct AsymmetricSecurityHeader {
    /// The URI of the security policy in force.
    pub security_policy_uri: UAString,
    /// The DER certificate of the sender, null when unsecured.
    pub sender_certificate: ByteString,
    /// Thumbprint of the receiver's certificate, null when unsecured.
    pub receiver_certificate_thumbprint: ByteString,
}

impl BinaryEncodable for AsymmetricSecurityHeader {
    fn byte_len(&self) -> usize {
        self.security_policy_uri.byte_len()
            + self.sender_certificate.byte_len()
            + self.receiver_certificate_thumbprint.byte_len()
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        self.security_policy_uri.encode(stream)?;
        self.sender_certificate.encode(stream)?;
        self.receiver_certificate_thumbprint.encode(stream)
    }
}

impl BinaryDecodable for AsymmetricSecurityHeader {
    fn decode<S: Read + ?Sized>(stream: &mut S, options: &DecodingOptions) -> EncodingResult<Self> {
        Ok(AsymmetricSecurityHeader {
            security_policy_uri: UAString::decode(stream, options)?,
            sender_certificate: ByteString::decode(stream, options)?,
            receiver_certificate_thumbprint: ByteString::decode(stream, options)?,
        })
    }
}

impl AsymmetricSecurityHeader {
    /// The header for security policy None.
    pub fn none(security_policy_uri: &str) -> AsymmetricSecurityHeader {
        AsymmetricSecurityHeader {
            security_policy_uri: UAString::from(security_policy_uri),
            sender_certificate: ByteString::null(),
            receiver_certificate_thumbprint: ByteString::null(),
        }
    }
}

/// Sequence number and request id of a chunk. Chunks of one request share the request id
/// and carry strictly increasing sequence numbers.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SequenceHeader {
    /// Monotonic per-channel chunk counter.
    pub sequence_number: u32,
    /// The request the chunk belongs to.
    pub request_id: u32,
}

impl BinaryEncodable for SequenceHeader {
    fn byte_len(&self) -> usize {
        8
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        write_u32(stream, self.sequence_number)?;
        write_u32(stream, self.request_id)
    }
}

impl BinaryDecodable for SequenceHeader {
    fn decode<S: Read + ?Sized>(stream: &mut S, _: &DecodingOptions) -> EncodingResult<Self> {
        Ok(SequenceHeader {
            sequence_number: read_u32(stream)?,
            request_id: read_u32(stream)?,
        })
    }
}
