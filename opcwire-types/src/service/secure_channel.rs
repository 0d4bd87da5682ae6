// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Secure channel service types.

use super::{ua_binary_enum, ua_binary_struct, ua_message_info};
use crate::{
    byte_string::ByteString, date_time::DateTime, request_header::RequestHeader,
    response_header::ResponseHeader,
};

ua_binary_enum! {
    /// The kind of token requested in OpenSecureChannel.
    pub enum SecurityTokenRequestType {
        /// Open a new channel.
        #[default]
        Issue = 0,
        /// Renew the token of an existing channel.
        Renew = 1,
    }
}

ua_binary_enum! {
    /// How messages on a channel are secured.
    pub enum MessageSecurityMode {
        /// An invalid mode.
        #[default]
        Invalid = 0,
        /// Messages are neither signed nor encrypted.
        None = 1,
        /// Messages are signed.
        Sign = 2,
        /// Messages are signed and encrypted.
        SignAndEncrypt = 3,
    }
}

ua_binary_struct! {
    /// The token issued for a secure channel, identifying the channel and its lifetime.
    pub struct ChannelSecurityToken {
        /// The id of the channel the token belongs to.
        pub channel_id: u32,
        /// The id of this token.
        pub token_id: u32,
        /// When the token was created, by the server clock.
        pub created_at: DateTime,
        /// The lifetime of the token in milliseconds.
        pub revised_lifetime: u32,
    }
}
ua_message_info!(ChannelSecurityToken, ChannelSecurityToken_Encoding_DefaultBinary);

ua_binary_struct! {
    /// Opens or renews a secure channel.
    pub struct OpenSecureChannelRequest {
        /// Common request header.
        pub request_header: RequestHeader,
        /// The protocol version the client supports.
        pub client_protocol_version: u32,
        /// Issue or Renew.
        pub request_type: SecurityTokenRequestType,
        /// The requested security mode.
        pub security_mode: MessageSecurityMode,
        /// Client nonce, empty when the mode is None.
        pub client_nonce: ByteString,
        /// The requested token lifetime in milliseconds.
        pub requested_lifetime: u32,
    }
}
ua_message_info!(
    OpenSecureChannelRequest,
    OpenSecureChannelRequest_Encoding_DefaultBinary
);

ua_binary_struct! {
    /// The response to OpenSecureChannel.
    pub struct OpenSecureChannelResponse {
        /// Common response header.
        pub response_header: ResponseHeader,
        /// The protocol version the server supports.
        pub server_protocol_version: u32,
        /// The issued token.
        pub security_token: ChannelSecurityToken,
        /// Server nonce, empty when the mode is None.
        pub server_nonce: ByteString,
    }
}
ua_message_info!(
    OpenSecureChannelResponse,
    OpenSecureChannelResponse_Encoding_DefaultBinary
);

ua_binary_struct! {
    /// Closes a secure channel.
    pub struct CloseSecureChannelRequest {
        /// Common request header.
        pub request_header: RequestHeader,
    }
}
ua_message_info!(
    CloseSecureChannelRequest,
    CloseSecureChannelRequest_Encoding_DefaultBinary
);

ua_binary_struct! {
    /// The response to CloseSecureChannel. The server normally just closes the transport
    /// instead of sending this.
    pub struct CloseSecureChannelResponse {
        /// Common response header.
        pub response_header: ResponseHeader,
    }
}
ua_message_info!(
    CloseSecureChannelResponse,
    CloseSecureChannelResponse_Encoding_DefaultBinary
);
