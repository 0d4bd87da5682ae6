// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Contains the implementation of `StatusCode`, a 32-bit value with a severity field in
//! the two most significant bits. Only the sub-set of the standard codes that this stack
//! raises or inspects is named; unknown codes are carried through untouched.

use std::{
    fmt,
    io::{Read, Write},
};

use crate::encoding::{
    read_u32, write_u32, BinaryDecodable, BinaryEncodable, DecodingOptions, EncodingResult,
};

/// The severity of a status code, from the two most significant bits.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StatusCodeSeverity {
    /// The operation succeeded.
    Good = 0,
    /// The operation partially succeeded.
    Uncertain = 1,
    /// The operation failed.
    Bad = 2,
}

macro_rules! status_codes {
    ($($name:ident = $value:literal),* $(,)?) => {
        #[allow(non_upper_case_globals)]
        impl StatusCode {
            $(
                #[doc = stringify!($name)]
                pub const $name: StatusCode = StatusCode($value);
            )*

            /// Look up the symbolic name of this status code, if the code is known.
            pub fn name(&self) -> &'static str {
                match self.0 {
                    $( $value => stringify!($name), )*
                    _ => "Unknown",
                }
            }
        }
    };
}

/// An OPC-UA status code. Equality is by code value.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct StatusCode(u32);

status_codes! {
    Good = 0x0000_0000,
    Uncertain = 0x4000_0000,
    Bad = 0x8000_0000,
    BadUnexpectedError = 0x8001_0000,
    BadInternalError = 0x8002_0000,
    BadOutOfMemory = 0x8003_0000,
    BadResourceUnavailable = 0x8004_0000,
    BadCommunicationError = 0x8005_0000,
    BadEncodingError = 0x8006_0000,
    BadDecodingError = 0x8007_0000,
    BadEncodingLimitsExceeded = 0x8008_0000,
    BadUnknownResponse = 0x8009_0000,
    BadTimeout = 0x800A_0000,
    BadServiceUnsupported = 0x800B_0000,
    BadShutdown = 0x800C_0000,
    BadServerNotConnected = 0x800D_0000,
    BadServerHalted = 0x800E_0000,
    BadNothingToDo = 0x800F_0000,
    BadTooManyOperations = 0x8010_0000,
    BadSecurityChecksFailed = 0x8013_0000,
    BadIdentityTokenInvalid = 0x8020_0000,
    BadIdentityTokenRejected = 0x8021_0000,
    BadSecureChannelIdInvalid = 0x8022_0000,
    BadInvalidTimestamp = 0x8023_0000,
    BadSessionIdInvalid = 0x8025_0000,
    BadSessionClosed = 0x8026_0000,
    BadSessionNotActivated = 0x8027_0000,
    BadSubscriptionIdInvalid = 0x8028_0000,
    BadRequestHeaderInvalid = 0x802A_0000,
    BadTimestampsToReturnInvalid = 0x802B_0000,
    BadRequestCancelledByClient = 0x802C_0000,
    BadNodeIdInvalid = 0x8033_0000,
    BadNodeIdUnknown = 0x8034_0000,
    BadAttributeIdInvalid = 0x8035_0000,
    BadIndexRangeInvalid = 0x8036_0000,
    BadDataEncodingInvalid = 0x8038_0000,
    BadOutOfRange = 0x803C_0000,
    BadNotSupported = 0x803D_0000,
    BadNotFound = 0x803E_0000,
    BadObjectDeleted = 0x803F_0000,
    BadNotImplemented = 0x8040_0000,
    BadMonitoringModeInvalid = 0x8041_0000,
    BadMonitoredItemIdInvalid = 0x8042_0000,
    BadMonitoredItemFilterInvalid = 0x8043_0000,
    BadBrowseDirectionInvalid = 0x804D_0000,
    BadNoSubscription = 0x8079_0000,
    BadSequenceNumberUnknown = 0x807A_0000,
    BadTcpServerTooBusy = 0x807D_0000,
    BadTcpMessageTypeInvalid = 0x807E_0000,
    BadTcpSecureChannelUnknown = 0x807F_0000,
    BadTcpMessageTooLarge = 0x8080_0000,
    BadTcpNotEnoughResources = 0x8081_0000,
    BadTcpInternalError = 0x8082_0000,
    BadTcpEndpointUrlInvalid = 0x8083_0000,
    BadRequestInterrupted = 0x8084_0000,
    BadRequestTimeout = 0x8085_0000,
    BadSecureChannelClosed = 0x8086_0000,
    BadSecureChannelTokenUnknown = 0x8087_0000,
    BadSequenceNumberInvalid = 0x8088_0000,
    BadNonceInvalid = 0x8024_0000,
    BadConnectionRejected = 0x80AC_0000,
    BadDisconnect = 0x80AD_0000,
    BadConnectionClosed = 0x80AE_0000,
    BadInvalidState = 0x80AF_0000,
    BadEndOfStream = 0x80B0_0000,
    BadInvalidArgument = 0x80AB_0000,
    BadRequestTooLarge = 0x80B8_0000,
    BadResponseTooLarge = 0x80B9_0000,
}

impl StatusCode {
    /// Construct a status code from a raw 32-bit value.
    pub fn from_u32(value: u32) -> Self {
        StatusCode(value)
    }

    /// The raw 32-bit value of the status code.
    pub fn bits(&self) -> u32 {
        self.0
    }

    /// The severity field of the code.
    pub fn severity(&self) -> StatusCodeSeverity {
        match self.0 >> 30 {
            0b00 => StatusCodeSeverity::Good,
            0b01 => StatusCodeSeverity::Uncertain,
            // 0b11 is reserved, it is treated as Bad
            _ => StatusCodeSeverity::Bad,
        }
    }

    /// `true` if the severity is Good.
    pub fn is_good(&self) -> bool {
        self.severity() == StatusCodeSeverity::Good
    }

    /// `true` if the severity is Uncertain.
    pub fn is_uncertain(&self) -> bool {
        self.severity() == StatusCodeSeverity::Uncertain
    }

    /// `true` if the severity is Bad.
    pub fn is_bad(&self) -> bool {
        self.severity() == StatusCodeSeverity::Bad
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            "Unknown" => write!(f, "StatusCode(0x{:08X})", self.0),
            name => write!(f, "{}", name),
        }
    }
}

impl From<StatusCode> for std::io::Error {
    fn from(value: StatusCode) -> Self {
        std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("StatusCode {}", value),
        )
    }
}

impl BinaryEncodable for StatusCode {
    fn byte_len(&self) -> usize {
        4
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        write_u32(stream, self.0)
    }
}

impl BinaryDecodable for StatusCode {
    fn decode<S: Read + ?Sized>(stream: &mut S, _: &DecodingOptions) -> EncodingResult<Self> {
        Ok(StatusCode(read_u32(stream)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity() {
        assert!(StatusCode::Good.is_good());
        assert!(!StatusCode::Good.is_bad());
        assert!(StatusCode::Uncertain.is_uncertain());
        assert!(StatusCode::BadTimeout.is_bad());
        // Unknown codes still carry a severity
        assert!(StatusCode::from_u32(0x8099_0000).is_bad());
    }

    #[test]
    fn rendering() {
        assert_eq!(StatusCode::BadDecodingError.to_string(), "BadDecodingError");
        assert_eq!(
            StatusCode::from_u32(0x8099_0123).to_string(),
            "StatusCode(0x80990123)"
        );
    }

    #[test]
    fn equality_is_by_code() {
        assert_eq!(StatusCode::from_u32(0x800A_0000), StatusCode::BadTimeout);
    }
}
