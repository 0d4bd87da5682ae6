// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The core crate: the connection protocol framing (Hello/Acknowledge/Error), message
//! chunking with sequence numbering, the client side secure channel state and the
//! request/response message enums shared by the layers above.

pub mod comms;
pub mod messages;

pub use messages::{Message, MessageType, RequestMessage, ResponseMessage};

/// Constants of the connection protocol.
pub mod constants {
    /// The default port an OPC-UA server listens on for opc.tcp.
    pub const DEFAULT_OPC_UA_SERVER_PORT: u16 = 4840;
    /// The UACP protocol version this implementation speaks.
    pub const PROTOCOL_VERSION: u32 = 0;
    /// The smallest chunk size a peer may negotiate, from the transport mapping spec.
    pub const MIN_CHUNK_SIZE: usize = 8196;
    /// Sequence numbers and request ids wrap back to this value instead of 0.
    pub const FIRST_SEQUENCE_NUMBER: u32 = 1;
}
