// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Contains the implementation of `DataValue`.

use std::io::{Read, Write};

use bitflags::bitflags;

use crate::{
    date_time::DateTime,
    encoding::{
        read_u16, read_u8, write_u16, write_u8, BinaryDecodable, BinaryEncodable, DecodingOptions,
        EncodingResult,
    },
    status_code::StatusCode,
    variant::Variant,
};

bitflags! {
    /// Mask for fields present in a DataValue.
    #[derive(Copy, Clone, Debug, PartialEq, Default)]
    pub struct DataValueFlags: u8 {
        /// False if the Value is Null.
        const HAS_VALUE = 0x1;
        /// False if the StatusCode is Good.
        const HAS_STATUS = 0x2;
        /// False if the source timestamp is DateTime.MinValue.
        const HAS_SOURCE_TIMESTAMP = 0x4;
        /// False if the server timestamp is DateTime.MinValue.
        const HAS_SERVER_TIMESTAMP = 0x8;
        /// False if the source picoseconds is 0.
        const HAS_SOURCE_PICOSECONDS = 0x10;
        /// False if the server picoseconds is 0.
        const HAS_SERVER_PICOSECONDS = 0x20;
    }
}

/// The maximum value of the 10-picosecond-interval fields.
const MAX_PICO_SECONDS: u16 = 9999;

/// A value with its status and timestamps. Every field is optional and a mask byte on the
/// wire says which are present.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataValue {
    /// The value. BadNoValue if not present.
    pub value: Option<Variant>,
    /// The status of the value. Good if not present.
    pub status: Option<StatusCode>,
    /// The source timestamp.
    pub source_timestamp: Option<DateTime>,
    /// 10-picosecond intervals past the source timestamp, 0-9999.
    pub source_picoseconds: Option<u16>,
    /// The server timestamp.
    pub server_timestamp: Option<DateTime>,
    /// 10-picosecond intervals past the server timestamp, 0-9999.
    pub server_picoseconds: Option<u16>,
}

impl BinaryEncodable for DataValue {
    fn byte_len(&self) -> usize {
        let encoding_flags = self.encoding_flags();
        let mut size = 1;
        if encoding_flags.contains(DataValueFlags::HAS_VALUE) {
            size += self.value.as_ref().map_or(0, |v| v.byte_len());
        }
        if encoding_flags.contains(DataValueFlags::HAS_STATUS) {
            size += 4;
        }
        if encoding_flags.contains(DataValueFlags::HAS_SOURCE_TIMESTAMP) {
            size += 8;
            if encoding_flags.contains(DataValueFlags::HAS_SOURCE_PICOSECONDS) {
                size += 2;
            }
        }
        if encoding_flags.contains(DataValueFlags::HAS_SERVER_TIMESTAMP) {
            size += 8;
            if encoding_flags.contains(DataValueFlags::HAS_SERVER_PICOSECONDS) {
                size += 2;
            }
        }
        size
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        let encoding_flags = self.encoding_flags();
        write_u8(stream, encoding_flags.bits())?;
        if encoding_flags.contains(DataValueFlags::HAS_VALUE) {
            // The mask only has the bit when the value is Some
            self.value.as_ref().unwrap().encode(stream)?;
        }
        if encoding_flags.contains(DataValueFlags::HAS_STATUS) {
            self.status.as_ref().unwrap().encode(stream)?;
        }
        // Picoseconds are only valid when the corresponding timestamp is present, and
        // clamp to the maximum interval count
        if encoding_flags.contains(DataValueFlags::HAS_SOURCE_TIMESTAMP) {
            self.source_timestamp.as_ref().unwrap().encode(stream)?;
            if encoding_flags.contains(DataValueFlags::HAS_SOURCE_PICOSECONDS) {
                let ps = self.source_picoseconds.unwrap().min(MAX_PICO_SECONDS);
                write_u16(stream, ps)?;
            }
        }
        if encoding_flags.contains(DataValueFlags::HAS_SERVER_TIMESTAMP) {
            self.server_timestamp.as_ref().unwrap().encode(stream)?;
            if encoding_flags.contains(DataValueFlags::HAS_SERVER_PICOSECONDS) {
                let ps = self.server_picoseconds.unwrap().min(MAX_PICO_SECONDS);
                write_u16(stream, ps)?;
            }
        }
        Ok(())
    }
}

impl BinaryDecodable for DataValue {
    fn decode<S: Read + ?Sized>(stream: &mut S, options: &DecodingOptions) -> EncodingResult<Self> {
        let encoding_flags = DataValueFlags::from_bits_truncate(read_u8(stream)?);
        let mut data_value = DataValue::null();
        if encoding_flags.contains(DataValueFlags::HAS_VALUE) {
            data_value.value = Some(Variant::decode(stream, options)?);
        }
        if encoding_flags.contains(DataValueFlags::HAS_STATUS) {
            data_value.status = Some(StatusCode::decode(stream, options)?);
        }
        if encoding_flags.contains(DataValueFlags::HAS_SOURCE_TIMESTAMP) {
            data_value.source_timestamp = Some(DateTime::decode(stream, options)?);
            if encoding_flags.contains(DataValueFlags::HAS_SOURCE_PICOSECONDS) {
                data_value.source_picoseconds = Some(read_u16(stream)?.min(MAX_PICO_SECONDS));
            }
        }
        if encoding_flags.contains(DataValueFlags::HAS_SERVER_TIMESTAMP) {
            data_value.server_timestamp = Some(DateTime::decode(stream, options)?);
            if encoding_flags.contains(DataValueFlags::HAS_SERVER_PICOSECONDS) {
                data_value.server_picoseconds = Some(read_u16(stream)?.min(MAX_PICO_SECONDS));
            }
        }
        Ok(data_value)
    }
}

impl From<Variant> for DataValue {
    fn from(value: Variant) -> Self {
        DataValue {
            value: Some(value),
            ..Default::default()
        }
    }
}

impl DataValue {
    /// A data value with no fields.
    pub fn null() -> DataValue {
        DataValue::default()
    }

    /// A data value holding `value` with both timestamps set to now.
    pub fn new_now(value: impl Into<Variant>) -> DataValue {
        let now = DateTime::now();
        DataValue {
            value: Some(value.into()),
            status: Some(StatusCode::Good),
            source_timestamp: Some(now),
            server_timestamp: Some(now),
            ..Default::default()
        }
    }

    /// The status of the value. A missing status means Good.
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::Good)
    }

    /// `true` if the value is present and the status is good.
    pub fn is_valid(&self) -> bool {
        self.status().is_good() && self.value.is_some()
    }

    /// The mask of present fields. Picosecond bits are suppressed when their timestamp is
    /// not present.
    fn encoding_flags(&self) -> DataValueFlags {
        let mut encoding_flags = DataValueFlags::empty();
        if self.value.is_some() {
            encoding_flags |= DataValueFlags::HAS_VALUE;
        }
        if self.status.is_some() {
            encoding_flags |= DataValueFlags::HAS_STATUS;
        }
        if self.source_timestamp.is_some() {
            encoding_flags |= DataValueFlags::HAS_SOURCE_TIMESTAMP;
            if self.source_picoseconds.is_some() {
                encoding_flags |= DataValueFlags::HAS_SOURCE_PICOSECONDS;
            }
        }
        if self.server_timestamp.is_some() {
            encoding_flags |= DataValueFlags::HAS_SERVER_TIMESTAMP;
            if self.server_picoseconds.is_some() {
                encoding_flags |= DataValueFlags::HAS_SERVER_PICOSECONDS;
            }
        }
        encoding_flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::decode_exact;

    #[test]
    fn picoseconds_require_timestamp() {
        let dv = DataValue {
            value: Some(Variant::from(1i32)),
            source_picoseconds: Some(100),
            ..Default::default()
        };
        // No source timestamp, so no picoseconds on the wire
        let decoded: DataValue =
            decode_exact(&dv.encode_to_vec(), &DecodingOptions::test()).unwrap();
        assert_eq!(decoded.source_picoseconds, None);
    }

    #[test]
    fn picoseconds_clamp() {
        let dv = DataValue {
            source_timestamp: Some(DateTime::now()),
            source_picoseconds: Some(u16::MAX),
            ..Default::default()
        };
        let decoded: DataValue =
            decode_exact(&dv.encode_to_vec(), &DecodingOptions::test()).unwrap();
        assert_eq!(decoded.source_picoseconds, Some(9999));
    }

    #[test]
    fn round_trip() {
        let dv = DataValue::new_now(Variant::from("value"));
        let decoded: DataValue =
            decode_exact(&dv.encode_to_vec(), &DecodingOptions::test()).unwrap();
        assert_eq!(decoded, dv);
    }
}
