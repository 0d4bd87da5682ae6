// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The client side state of a secure channel: the issued token, its renewal deadline and
//! the outgoing sequence number / request id counters.

use std::time::Instant;

use log::debug;
use opcwire_types::{ChannelSecurityToken, DecodingOptions, MessageSecurityMode};

use super::{
    message_chunk::MessageChunkType,
    security_header::{AsymmetricSecurityHeader, SecurityHeader, SymmetricSecurityHeader},
};
use crate::constants::FIRST_SEQUENCE_NUMBER;

/// The URI of the security policy that applies no security.
pub const SECURITY_POLICY_NONE_URI: &str = "http://opcfoundation.org/UA/SecurityPolicy#None";

/// Fraction of the token lifetime after which the client renews the token.
const TOKEN_RENEWAL_FRACTION: f64 = 0.75;

/// Client side secure channel state. The channel itself is passive; the transport drives
/// it and the connection event loop renews the token.
#[derive(Debug)]
pub struct SecureChannel {
    /// The security mode in force. Only None is supported in this revision.
    security_mode: MessageSecurityMode,
    /// The token issued by the last OpenSecureChannel, if any.
    token: Option<ChannelSecurityToken>,
    /// When the token was issued, by the local clock.
    token_issued_at: Instant,
    /// The next outgoing sequence number.
    sequence_number: u32,
    /// The next outgoing request id.
    request_id: u32,
    /// The limits applied when decoding incoming data.
    decoding_options: DecodingOptions,
}

impl Default for SecureChannel {
    fn default() -> Self {
        Self::new(DecodingOptions::default())
    }
}

impl SecureChannel {
    /// A fresh channel with no token.
    pub fn new(decoding_options: DecodingOptions) -> Self {
        SecureChannel {
            security_mode: MessageSecurityMode::None,
            token: None,
            token_issued_at: Instant::now(),
            sequence_number: FIRST_SEQUENCE_NUMBER,
            request_id: FIRST_SEQUENCE_NUMBER,
            decoding_options,
        }
    }

    /// The security mode of the channel.
    pub fn security_mode(&self) -> MessageSecurityMode {
        self.security_mode
    }

    /// The URI of the security policy in force.
    pub fn security_policy_uri(&self) -> &'static str {
        SECURITY_POLICY_NONE_URI
    }

    /// The server-assigned channel id, 0 before the channel is open.
    pub fn secure_channel_id(&self) -> u32 {
        self.token.as_ref().map_or(0, |t| t.channel_id)
    }

    /// The id of the active token, 0 before the channel is open.
    pub fn token_id(&self) -> u32 {
        self.token.as_ref().map_or(0, |t| t.token_id)
    }

    /// Store the token issued or renewed by an OpenSecureChannel response.
    pub fn set_security_token(&mut self, token: ChannelSecurityToken) {
        debug!(
            "Channel {} got token {} with lifetime {}ms",
            token.channel_id, token.token_id, token.revised_lifetime
        );
        self.token = Some(token);
        self.token_issued_at = Instant::now();
    }

    /// Forget the token, done before reconnecting.
    pub fn clear_security_token(&mut self) {
        self.token = None;
        self.sequence_number = FIRST_SEQUENCE_NUMBER;
        self.request_id = FIRST_SEQUENCE_NUMBER;
    }

    /// `true` once the token has consumed three quarters of its lifetime.
    pub fn should_renew_security_token(&self) -> bool {
        match &self.token {
            Some(token) if token.revised_lifetime > 0 => {
                let renew_after_ms =
                    (f64::from(token.revised_lifetime) * TOKEN_RENEWAL_FRACTION) as u128;
                self.token_issued_at.elapsed().as_millis() >= renew_after_ms
            }
            _ => false,
        }
    }

    /// The security header for an outgoing chunk of `message_type`.
    pub fn make_security_header(&self, message_type: MessageChunkType) -> SecurityHeader {
        if message_type.is_open_secure_channel() {
            SecurityHeader::Asymmetric(AsymmetricSecurityHeader::none(self.security_policy_uri()))
        } else {
            SecurityHeader::Symmetric(SymmetricSecurityHeader {
                token_id: self.token_id(),
            })
        }
    }

    /// The sequence number the next outgoing chunk will take.
    pub fn sequence_number(&self) -> u32 {
        self.sequence_number
    }

    /// Take the next `count` sequence numbers. Wraps at `u32::MAX` back to the first
    /// valid number, skipping 0.
    pub fn next_sequence_numbers(&mut self, count: u32) -> u32 {
        let first = self.sequence_number;
        for _ in 0..count {
            self.sequence_number = match self.sequence_number.checked_add(1) {
                Some(n) => n,
                None => FIRST_SEQUENCE_NUMBER,
            };
        }
        first
    }

    /// Take the next request id, with the same wrap rules as sequence numbers.
    pub fn next_request_id(&mut self) -> u32 {
        let id = self.request_id;
        self.request_id = match self.request_id.checked_add(1) {
            Some(n) => n,
            None => FIRST_SEQUENCE_NUMBER,
        };
        id
    }

    /// The decoding limits of the channel.
    pub fn decoding_options(&self) -> DecodingOptions {
        self.decoding_options.clone()
    }

    /// Replace the decoding limits, done after the hello handshake revises them.
    pub fn set_decoding_options(&mut self, decoding_options: DecodingOptions) {
        self.decoding_options = decoding_options;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_numbers_wrap_and_skip_zero() {
        let mut channel = SecureChannel::default();
        channel.sequence_number = u32::MAX;
        assert_eq!(channel.next_sequence_numbers(1), u32::MAX);
        assert_eq!(channel.next_sequence_numbers(1), FIRST_SEQUENCE_NUMBER);
    }

    #[test]
    fn renewal_deadline() {
        let mut channel = SecureChannel::default();
        assert!(!channel.should_renew_security_token());
        channel.set_security_token(ChannelSecurityToken {
            channel_id: 1,
            token_id: 1,
            created_at: Default::default(),
            revised_lifetime: 0,
        });
        // Zero lifetime never renews, the conversation handles it as an open failure
        assert!(!channel.should_renew_security_token());
    }
}
