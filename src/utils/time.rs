//! Timestamp helpers shared by the conversation model, transcripts, and history listing.

use time::format_description::BorrowedFormatItem;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};

/// Offset-less ISO-8601 with fractional seconds, e.g. `2024-05-01T12:34:56.123456`.
const ISO_SUBSECOND: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]");

/// Offset-less ISO-8601 without fractional seconds.
const ISO_SECONDS: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");

/// The stamp embedded in transcript file names.
const FILE_STAMP: &[BorrowedFormatItem<'static>] =
    format_description!("[year][month][day]_[hour][minute][second]");

/// The human-readable form of a file stamp.
const DISPLAY: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

/// Returns the current time in the local offset, or UTC when the offset cannot be determined.
pub fn now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

fn local_offset() -> UtcOffset {
    UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC)
}

/// Format a timestamp as RFC 3339.
pub fn format_timestamp(when: OffsetDateTime) -> String {
    // Rfc3339 only fails for years outside 0..=9999.
    when.format(&Rfc3339)
        .unwrap_or_else(|_| when.unix_timestamp().to_string())
}

/// Parse an RFC 3339 timestamp, or an offset-less ISO-8601 one interpreted in the local offset.
pub fn parse_timestamp(input: &str) -> Option<OffsetDateTime> {
    let input = input.trim();
    if let Ok(when) = OffsetDateTime::parse(input, &Rfc3339) {
        return Some(when);
    }
    PrimitiveDateTime::parse(input, ISO_SUBSECOND)
        .or_else(|_| PrimitiveDateTime::parse(input, ISO_SECONDS))
        .ok()
        .map(|when| when.assume_offset(local_offset()))
}

/// Format the `YYYYmmdd_HHMMSS` stamp used in transcript file names.
pub fn file_stamp(when: OffsetDateTime) -> String {
    when.format(FILE_STAMP).unwrap_or_default()
}

/// Parse a `YYYYmmdd_HHMMSS` file stamp.
pub fn parse_file_stamp(input: &str) -> Option<PrimitiveDateTime> {
    PrimitiveDateTime::parse(input, FILE_STAMP).ok()
}

/// Render a file stamp as `YYYY-MM-DD HH:MM:SS`.
pub fn display_stamp(when: PrimitiveDateTime) -> String {
    when.format(DISPLAY).unwrap_or_default()
}

/// Render a timestamp as `YYYY-MM-DD HH:MM:SS` in its own offset.
pub fn display_timestamp(when: OffsetDateTime) -> String {
    display_stamp(PrimitiveDateTime::new(when.date(), when.time()))
}
