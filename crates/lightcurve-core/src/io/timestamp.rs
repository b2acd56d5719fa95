//! Parsing of camera header timestamps.
//!
//! The `.rcd` header stores an ISO-like string (`YYYY-MM-DDTHH:MM:SS.fffffffff`).
//! The camera clock occasionally writes an hour above 23. That hour is
//! rebuilt from the batch directory name, which records the local wall-clock
//! time the minute started. The repair is a heuristic: it assumes the
//! directory name is accurate and that at most one hour boundary is crossed
//! within a batch. Repaired timestamps are tagged so callers never mistake
//! them for ground truth.

use std::path::Path;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use tracing::warn;

use crate::error::{LightcurveError, Result};
use crate::frame::{FrameTimestamp, TimestampCorrection};

/// Local wall-clock time encoded in a batch directory name
/// (`YYYYMMDD_HH.MM.SS.mmm`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DirectoryClock {
    pub local_hour: u32,
    pub minute: u32,
}

impl DirectoryClock {
    pub fn from_dir_name(name: &str) -> Option<Self> {
        let clock = name.split('_').nth(1)?;
        let mut fields = clock.split('.');
        let local_hour = fields.next()?.parse().ok()?;
        let minute = fields.next()?.parse().ok()?;
        if local_hour > 23 || minute > 59 {
            return None;
        }
        Some(Self { local_hour, minute })
    }

    pub fn from_dir(dir: &Path) -> Option<Self> {
        dir.file_name()
            .and_then(|n| n.to_str())
            .and_then(Self::from_dir_name)
    }
}

struct RawFields {
    date: NaiveDate,
    hour: u32,
    minute: u32,
    second: u32,
    nanos: u32,
}

/// Parse a header timestamp, repairing an out-of-range hour.
///
/// `utc_offset_hours` converts the directory's local hour to UTC.
pub fn parse_header_timestamp(
    raw: &str,
    hint: Option<&DirectoryClock>,
    utc_offset_hours: i64,
) -> Result<FrameTimestamp> {
    let fields = split_fields(raw)?;

    if fields.hour <= 23 {
        let time = fields
            .date
            .and_hms_nano_opt(fields.hour, fields.minute, fields.second, fields.nanos)
            .ok_or_else(|| bad_timestamp(raw))?;
        return Ok(FrameTimestamp::exact(time));
    }

    let midnight = fields
        .date
        .and_hms_nano_opt(0, fields.minute, fields.second, fields.nanos)
        .ok_or_else(|| bad_timestamp(raw))?;

    let (hour, correction) = match hint {
        Some(clock) => {
            let rollover = i64::from(fields.minute < clock.minute);
            let hour = i64::from(clock.local_hour) + utc_offset_hours + rollover;
            (hour, TimestampCorrection::DirectoryHint)
        }
        None => (i64::from(fields.hour % 24), TimestampCorrection::Wrapped),
    };

    let time: NaiveDateTime = midnight + Duration::hours(hour);
    warn!(
        raw = raw.trim_end_matches('\0'),
        bad_hour = fields.hour,
        repaired = %time,
        method = ?correction,
        "Header hour out of range, applied best-effort repair"
    );
    Ok(FrameTimestamp { time, correction })
}

/// Parse an ISO-8601 `DATE-OBS` style value (`YYYY-MM-DD[THH:MM:SS[.f]]`).
pub fn parse_iso_timestamp(raw: &str) -> Result<FrameTimestamp> {
    let trimmed = clean(raw);
    if !trimmed.contains('T') {
        let date =
            NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").map_err(|_| bad_timestamp(raw))?;
        let time = date.and_hms_opt(0, 0, 0).ok_or_else(|| bad_timestamp(raw))?;
        return Ok(FrameTimestamp::exact(time));
    }
    let fields = split_fields(raw)?;
    let time = fields
        .date
        .and_hms_nano_opt(fields.hour, fields.minute, fields.second, fields.nanos)
        .ok_or_else(|| bad_timestamp(raw))?;
    Ok(FrameTimestamp::exact(time))
}

/// Convert a Julian date to a UTC timestamp.
pub fn julian_date_to_timestamp(jd: f64) -> Result<FrameTimestamp> {
    let unix_seconds = (jd - crate::consts::JD_UNIX_EPOCH) * 86_400.0;
    let secs = unix_seconds.floor();
    let nanos = ((unix_seconds - secs) * 1e9).round().min(999_999_999.0) as u32;
    let time = chrono::DateTime::from_timestamp(secs as i64, nanos)
        .ok_or_else(|| LightcurveError::Format(format!("Julian date {jd} out of range")))?
        .naive_utc();
    Ok(FrameTimestamp::exact(time))
}

fn clean(raw: &str) -> &str {
    raw.trim_matches(|c: char| c == '\0' || c.is_whitespace() || c == '\'')
        .trim_end_matches('Z')
}

fn split_fields(raw: &str) -> Result<RawFields> {
    let text = clean(raw);
    let (date_part, time_part) = text.split_once('T').ok_or_else(|| bad_timestamp(raw))?;
    let date = NaiveDate::parse_from_str(date_part, "%Y-%m-%d").map_err(|_| bad_timestamp(raw))?;

    let mut parts = time_part.split(':');
    let hour = parse_u32(parts.next(), raw)?;
    let minute = parse_u32(parts.next(), raw)?;
    let seconds = parts.next().ok_or_else(|| bad_timestamp(raw))?;
    if parts.next().is_some() {
        return Err(bad_timestamp(raw));
    }

    let (whole, frac) = match seconds.split_once('.') {
        Some((w, f)) => (w, f),
        None => (seconds, ""),
    };
    let second = parse_u32(Some(whole), raw)?;
    if minute > 59 || second > 60 {
        return Err(bad_timestamp(raw));
    }
    let nanos = fraction_to_nanos(frac).ok_or_else(|| bad_timestamp(raw))?;

    Ok(RawFields {
        date,
        hour,
        minute,
        second,
        nanos,
    })
}

fn parse_u32(field: Option<&str>, raw: &str) -> Result<u32> {
    field
        .and_then(|f| f.trim().parse().ok())
        .ok_or_else(|| bad_timestamp(raw))
}

fn fraction_to_nanos(frac: &str) -> Option<u32> {
    if frac.is_empty() {
        return Some(0);
    }
    if !frac.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let digits: String = frac.chars().chain(std::iter::repeat('0')).take(9).collect();
    digits.parse().ok()
}

fn bad_timestamp(raw: &str) -> LightcurveError {
    LightcurveError::Format(format!(
        "Unparseable timestamp {:?}",
        raw.trim_end_matches('\0')
    ))
}
