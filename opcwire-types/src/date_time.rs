// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Contains the implementation of `DateTime`.

use std::{
    fmt,
    io::{Read, Write},
    str::FromStr,
};

use chrono::{Duration, TimeZone, Timelike, Utc};

use crate::encoding::{
    read_i64, write_i64, BinaryDecodable, BinaryEncodable, DecodingOptions, EncodingResult,
};

/// Internal representation of the timestamp, chrono timezone-aware UTC.
pub type DateTimeUtc = chrono::DateTime<Utc>;

/// A date/time value. On the wire this is a signed 64-bit count of 100 nanosecond ticks
/// since 1601-01-01 00:00:00 UTC (Windows FILETIME). Values outside of the range
/// 1601-01-01 to 9999-12-31 23:59:59 encode as 0.
#[derive(PartialEq, PartialOrd, Debug, Clone, Copy)]
pub struct DateTime {
    date_time: DateTimeUtc,
}

const NANOS_PER_TICK: i64 = 100;
const TICKS_PER_SECOND: i64 = 10_000_000;

impl BinaryEncodable for DateTime {
    fn byte_len(&self) -> usize {
        8
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        write_i64(stream, self.checked_ticks())
    }
}

impl BinaryDecodable for DateTime {
    fn decode<S: Read + ?Sized>(stream: &mut S, _: &DecodingOptions) -> EncodingResult<Self> {
        let ticks = read_i64(stream)?;
        Ok(DateTime::from_ticks(ticks))
    }
}

impl Default for DateTime {
    fn default() -> Self {
        DateTime::null()
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.date_time.to_rfc3339())
    }
}

impl From<DateTimeUtc> for DateTime {
    fn from(date_time: DateTimeUtc) -> Self {
        // Truncate to the wire resolution of 100ns so round trips are lossless
        let nanos = (date_time.nanosecond() / NANOS_PER_TICK as u32) * NANOS_PER_TICK as u32;
        let date_time = date_time.with_nanosecond(nanos).unwrap_or(date_time);
        DateTime { date_time }
    }
}

impl From<DateTime> for DateTimeUtc {
    fn from(value: DateTime) -> Self {
        value.date_time
    }
}

impl FromStr for DateTime {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DateTimeUtc::from_str(s).map(DateTime::from).map_err(|_| ())
    }
}

impl DateTime {
    /// The current time in UTC.
    pub fn now() -> DateTime {
        DateTime::from(Utc::now())
    }

    /// A null date time, i.e. the epoch, encoding to a zero FILETIME.
    pub fn null() -> DateTime {
        DateTime {
            date_time: Self::epoch_chrono(),
        }
    }

    /// Construct from a tick count. Out-of-range tick counts clamp to the representable
    /// range rather than failing.
    pub fn from_ticks(ticks: i64) -> DateTime {
        let date_time = if ticks <= 0 {
            Self::epoch_chrono()
        } else if ticks >= Self::endtimes_ticks() {
            Self::endtimes_chrono()
        } else {
            Self::epoch_chrono()
                + Duration::seconds(ticks / TICKS_PER_SECOND)
                + Duration::nanoseconds((ticks % TICKS_PER_SECOND) * NANOS_PER_TICK)
        };
        DateTime { date_time }
    }

    /// Tick count since the 1601 epoch. May be negative or beyond the encodable range
    /// for values chrono can represent but the wire cannot; see [`Self::checked_ticks`].
    pub fn ticks(&self) -> i64 {
        // num_nanoseconds would overflow over this range, so seconds and the
        // sub-second remainder are converted separately
        let duration = self.date_time.signed_duration_since(Self::epoch_chrono());
        duration.num_seconds() * TICKS_PER_SECOND
            + i64::from(duration.subsec_nanos()) / NANOS_PER_TICK
    }

    /// The tick count as it goes on the wire: values before the epoch or at/after
    /// 9999-12-31 23:59:59 become 0.
    pub fn checked_ticks(&self) -> i64 {
        let ticks = self.ticks();
        if ticks < 0 || ticks >= Self::endtimes_ticks() {
            0
        } else {
            ticks
        }
    }

    /// Test if this is the null (epoch) value.
    pub fn is_null(&self) -> bool {
        self.checked_ticks() == 0
    }

    /// The date time as chrono UTC.
    pub fn as_chrono(&self) -> DateTimeUtc {
        self.date_time
    }

    fn epoch_chrono() -> DateTimeUtc {
        // Infallible for this fixed date
        Utc.with_ymd_and_hms(1601, 1, 1, 0, 0, 0).unwrap()
    }

    fn endtimes_chrono() -> DateTimeUtc {
        Utc.with_ymd_and_hms(9999, 12, 31, 23, 59, 59).unwrap()
    }

    fn endtimes_ticks() -> i64 {
        Self::endtimes_chrono()
            .signed_duration_since(Self::epoch_chrono())
            .num_seconds()
            * TICKS_PER_SECOND
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::decode_exact;

    #[test]
    fn null_encodes_as_zero() {
        assert_eq!(DateTime::null().encode_to_vec(), vec![0u8; 8]);
    }

    #[test]
    fn out_of_range_encodes_as_zero() {
        let before_epoch = DateTime::from(Utc.with_ymd_and_hms(1066, 10, 14, 9, 0, 0).unwrap());
        assert_eq!(before_epoch.checked_ticks(), 0);

        let after_endtimes =
            DateTime::from(Utc.with_ymd_and_hms(9999, 12, 31, 23, 59, 59).unwrap());
        assert_eq!(after_endtimes.checked_ticks(), 0);
    }

    #[test]
    fn round_trip() {
        let now = DateTime::now();
        let bytes = now.encode_to_vec();
        let decoded: DateTime = decode_exact(&bytes, &DecodingOptions::test()).unwrap();
        assert_eq!(decoded, now);
    }

    #[test]
    fn decode_clamps() {
        let decoded = DateTime::from_ticks(-100);
        assert!(decoded.is_null());
    }
}
