//! Dates of person identifiers
//!
//! The active [`DateFormat`] decides how the date field of `author`,
//! `committer` and `tagger` lines is read:
//!
//! - `raw`: `<seconds> <+|-><hhmm>` with the offset limited to 14 hours
//! - `raw-permissive`: the same shape without the offset range check
//! - `rfc2822`: any RFC 2822 date, kept verbatim for output
//! - `now`: the literal `now`
//!
//! A `feature date-format=<name>` command switches the format mid-stream.

use crate::artifacts::codec::integer::{IntegerError, split_u64};
use bstr::{BString, ByteSlice};
use chrono::DateTime;
use clap::ValueEnum;
use thiserror::Error;

const MAX_RAW_OFFSET: u16 = 1400;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum)]
pub enum DateFormat {
    #[default]
    Raw,
    RawPermissive,
    #[value(name = "rfc2822")]
    Rfc2822,
    Now,
}

impl DateFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            DateFormat::Raw => "raw",
            DateFormat::RawPermissive => "raw-permissive",
            DateFormat::Rfc2822 => "rfc2822",
            DateFormat::Now => "now",
        }
    }

    pub fn from_name(name: &[u8]) -> Option<Self> {
        match name {
            b"raw" => Some(DateFormat::Raw),
            b"raw-permissive" => Some(DateFormat::RawPermissive),
            b"rfc2822" => Some(DateFormat::Rfc2822),
            b"now" => Some(DateFormat::Now),
            _ => None,
        }
    }
}

impl std::fmt::Display for DateFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum DateError {
    #[error("seconds: {0}")]
    Seconds(IntegerError),
    #[error("missing timezone offset")]
    MissingOffset,
    #[error("timezone offset must start with '+' or '-'")]
    OffsetSign,
    #[error("timezone offset must be four digits")]
    OffsetDigits,
    #[error("timezone offset {0:04} is out of range")]
    OffsetRange(u16),
    #[error("not an RFC 2822 date")]
    Rfc2822,
    #[error("expected 'now'")]
    ExpectedNow,
}

/// Timezone offset as written in the stream, e.g. `+0130`
///
/// `hhmm` keeps the four digits as a decimal number so permissive offsets
/// such as `+9999` survive unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ZoneOffset {
    pub negative: bool,
    pub hhmm: u16,
}

impl ZoneOffset {
    pub fn utc() -> Self {
        Self {
            negative: false,
            hhmm: 0,
        }
    }

    pub fn from_minutes(minutes: i32) -> Self {
        let abs = minutes.unsigned_abs();
        Self {
            negative: minutes < 0,
            hhmm: u16::try_from((abs / 60) * 100 + abs % 60).unwrap_or(u16::MAX),
        }
    }

    pub fn minutes(&self) -> i32 {
        let minutes = i32::from(self.hhmm / 100) * 60 + i32::from(self.hhmm % 100);
        if self.negative { -minutes } else { minutes }
    }

    fn parse(field: &[u8], format: DateFormat) -> Result<Self, DateError> {
        let (negative, digits) = match field.split_first() {
            Some((b'+', digits)) => (false, digits),
            Some((b'-', digits)) => (true, digits),
            _ => return Err(DateError::OffsetSign),
        };
        if digits.len() != 4 || !digits.iter().all(u8::is_ascii_digit) {
            return Err(DateError::OffsetDigits);
        }

        let hhmm = digits
            .iter()
            .fold(0u16, |acc, &digit| acc * 10 + u16::from(digit - b'0'));
        if format == DateFormat::Raw && hhmm > MAX_RAW_OFFSET {
            return Err(DateError::OffsetRange(hhmm));
        }

        Ok(Self { negative, hhmm })
    }
}

impl std::fmt::Display for ZoneOffset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.negative { '-' } else { '+' };
        write!(f, "{sign}{:04}", self.hhmm)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Timestamp {
    pub seconds: u64,
    pub offset: ZoneOffset,
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.seconds, self.offset)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Date {
    Raw(Timestamp),
    /// The original text is kept so output is byte-identical
    Rfc2822 {
        text: BString,
        timestamp: Timestamp,
    },
    Now,
}

impl Date {
    /// Parse the date field of a person identifier
    ///
    /// # Arguments
    ///
    /// * `field` - Bytes after the `> ` of the identifier
    /// * `format` - Currently active date format
    pub fn parse(field: &[u8], format: DateFormat) -> Result<Self, DateError> {
        match format {
            DateFormat::Raw | DateFormat::RawPermissive => {
                let (seconds, rest) = split_u64(field, b' ').map_err(DateError::Seconds)?;
                let rest = rest.ok_or(DateError::MissingOffset)?;
                let offset = ZoneOffset::parse(rest, format)?;
                Ok(Date::Raw(Timestamp { seconds, offset }))
            }
            DateFormat::Rfc2822 => {
                let text = field.to_str().map_err(|_| DateError::Rfc2822)?;
                let parsed =
                    DateTime::parse_from_rfc2822(text).map_err(|_| DateError::Rfc2822)?;
                let seconds = u64::try_from(parsed.timestamp()).map_err(|_| DateError::Rfc2822)?;
                let offset = ZoneOffset::from_minutes(parsed.offset().local_minus_utc() / 60);
                Ok(Date::Rfc2822 {
                    text: BString::from(field),
                    timestamp: Timestamp { seconds, offset },
                })
            }
            DateFormat::Now => match field {
                b"now" => Ok(Date::Now),
                _ => Err(DateError::ExpectedNow),
            },
        }
    }

    pub fn timestamp(&self) -> Option<Timestamp> {
        match self {
            Date::Raw(timestamp) | Date::Rfc2822 { timestamp, .. } => Some(*timestamp),
            Date::Now => None,
        }
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        match self {
            Date::Raw(timestamp) => out.extend_from_slice(timestamp.to_string().as_bytes()),
            Date::Rfc2822 { text, .. } => out.extend_from_slice(text),
            Date::Now => out.extend_from_slice(b"now"),
        }
    }
}

impl std::fmt::Display for Date {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Date::Raw(timestamp) => write!(f, "{timestamp}"),
            Date::Rfc2822 { text, .. } => write!(f, "{text}"),
            Date::Now => write!(f, "now"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn raw_date_keeps_sign_and_digits() {
        let date = Date::parse(b"1700000000 -0530", DateFormat::Raw).unwrap();
        assert_eq!(
            date,
            Date::Raw(Timestamp {
                seconds: 1_700_000_000,
                offset: ZoneOffset {
                    negative: true,
                    hhmm: 530
                },
            })
        );
        assert_eq!(date.to_string(), "1700000000 -0530");
    }

    #[rstest]
    #[case(b"+5 +0000", DateError::Seconds(IntegerError::ForbiddenSign))]
    #[case(b"12x +0000", DateError::Seconds(IntegerError::TrailingBytes))]
    #[case(b"12", DateError::MissingOffset)]
    #[case(b"12 0000", DateError::OffsetSign)]
    #[case(b"12 +000", DateError::OffsetDigits)]
    #[case(b"12 +00a0", DateError::OffsetDigits)]
    #[case(b"12 +1500", DateError::OffsetRange(1500))]
    fn raw_rejections(#[case] field: &[u8], #[case] expected: DateError) {
        assert_eq!(Date::parse(field, DateFormat::Raw), Err(expected));
    }

    #[test]
    fn permissive_lifts_the_offset_range() {
        let date = Date::parse(b"12 +9999", DateFormat::RawPermissive).unwrap();
        assert_eq!(date.to_string(), "12 +9999");
        assert_eq!(
            Date::parse(b"12 9999", DateFormat::RawPermissive),
            Err(DateError::OffsetSign)
        );
    }

    #[test]
    fn rfc2822_is_kept_verbatim() {
        let text = b"Tue, 1 Jul 2003 10:52:37 +0200";
        let date = Date::parse(text, DateFormat::Rfc2822).unwrap();
        let timestamp = date.timestamp().unwrap();

        assert_eq!(timestamp.seconds, 1_057_049_557);
        assert_eq!(timestamp.offset.minutes(), 120);

        let mut out = Vec::new();
        date.write_to(&mut out);
        assert_eq!(out, text.to_vec());
    }

    #[test]
    fn rfc2822_rejects_garbage() {
        assert_eq!(
            Date::parse(b"yesterday", DateFormat::Rfc2822),
            Err(DateError::Rfc2822)
        );
    }

    #[test]
    fn now_is_literal() {
        assert_eq!(Date::parse(b"now", DateFormat::Now), Ok(Date::Now));
        assert_eq!(
            Date::parse(b"12 +0000", DateFormat::Now),
            Err(DateError::ExpectedNow)
        );
    }
}
