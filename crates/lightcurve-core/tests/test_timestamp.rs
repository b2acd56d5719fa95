use chrono::{NaiveDate, Timelike};

use lightcurve_core::error::LightcurveError;
use lightcurve_core::frame::TimestampCorrection;
use lightcurve_core::io::timestamp::{
    julian_date_to_timestamp, parse_header_timestamp, parse_iso_timestamp, DirectoryClock,
};

#[test]
fn test_directory_clock_parses_batch_name() {
    let clock = DirectoryClock::from_dir_name("20220618_03.07.45.123").unwrap();
    assert_eq!(clock.local_hour, 3);
    assert_eq!(clock.minute, 7);
}

#[test]
fn test_directory_clock_rejects_other_names() {
    assert!(DirectoryClock::from_dir_name("Bias").is_none());
    assert!(DirectoryClock::from_dir_name("20220618_xx.07.45.123").is_none());
    assert!(DirectoryClock::from_dir_name("20220618_25.07.45.123").is_none());
}

#[test]
fn test_valid_timestamp_is_exact() {
    let ts = parse_header_timestamp("2022-06-18T16:34:56.123456789", None, 4).unwrap();
    assert_eq!(ts.correction, TimestampCorrection::None);
    assert_eq!(ts.time.hour(), 16);
    assert_eq!(ts.time.nanosecond(), 123_456_789);
}

#[test]
fn test_trailing_nul_padding_ignored() {
    let ts = parse_header_timestamp("2022-06-18T16:34:56.5\0\0\0", None, 4).unwrap();
    assert_eq!(ts.time.nanosecond(), 500_000_000);
}

#[test]
fn test_bad_hour_uses_directory_hint() {
    let clock = DirectoryClock::from_dir_name("20220618_02.10.00.000").unwrap();
    let ts = parse_header_timestamp("2022-06-18T27:10:30.000000000", Some(&clock), 4).unwrap();
    assert_eq!(ts.correction, TimestampCorrection::DirectoryHint);
    assert!(ts.is_heuristic());
    assert_eq!(ts.time.hour(), 6);
    assert_eq!(ts.time.minute(), 10);
}

#[test]
fn test_bad_hour_rolls_over_when_minute_wrapped() {
    // Directory started at 02:59 local; the frame minute is already 00.
    let clock = DirectoryClock::from_dir_name("20220618_02.59.30.000").unwrap();
    let ts = parse_header_timestamp("2022-06-18T27:00:05.000000000", Some(&clock), 4).unwrap();
    assert_eq!(ts.time.hour(), 7);
    assert_eq!(ts.time.minute(), 0);
}

#[test]
fn test_bad_hour_without_hint_wraps() {
    let ts = parse_header_timestamp("2022-06-18T26:00:00.000000000", None, 4).unwrap();
    assert_eq!(ts.correction, TimestampCorrection::Wrapped);
    assert_eq!(ts.time.hour(), 2);
}

#[test]
fn test_garbage_timestamp_is_format_error() {
    let err = parse_header_timestamp("not a time", None, 4).unwrap_err();
    assert!(matches!(err, LightcurveError::Format(_)));
    let err = parse_header_timestamp("2022-06-18T12:61:00", None, 4).unwrap_err();
    assert!(matches!(err, LightcurveError::Format(_)));
}

#[test]
fn test_iso_date_only() {
    let ts = parse_iso_timestamp("'2022-06-18'").unwrap();
    let expected = NaiveDate::from_ymd_opt(2022, 6, 18)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    assert_eq!(ts.time, expected);
}

#[test]
fn test_julian_date_conversion() {
    // J2000.0
    let ts = julian_date_to_timestamp(2_451_545.0).unwrap();
    let expected = NaiveDate::from_ymd_opt(2000, 1, 1)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap();
    assert_eq!(ts.time, expected);
}

#[test]
fn test_seconds_since() {
    let a = parse_header_timestamp("2022-06-18T16:34:56.000", None, 4).unwrap();
    let b = parse_header_timestamp("2022-06-18T16:35:01.250", None, 4).unwrap();
    approx::assert_abs_diff_eq!(b.seconds_since(&a), 5.25, epsilon = 1e-9);
    approx::assert_abs_diff_eq!(a.seconds_since(&b), -5.25, epsilon = 1e-9);
}
