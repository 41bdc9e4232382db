// tests/time_tests.rs

use chrono::{DateTime, FixedOffset, TimeZone};
use spl_lang::error::ParseError;
use spl_lang::time::{AbsoluteTime, RelativeStep, Snap, TimeModifier, TimeUnit};
use spl_lang::{calculate_relative_time, parse_time_modifier};

fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<FixedOffset> {
    FixedOffset::east_opt(0)
        .unwrap()
        .with_ymd_and_hms(y, mo, d, h, mi, s)
        .unwrap()
}

fn resolve(text: &str, now: DateTime<FixedOffset>) -> i64 {
    let modifier = parse_time_modifier(text).unwrap();
    calculate_relative_time(&modifier, &now).unwrap()
}

fn ms(t: DateTime<FixedOffset>) -> i64 {
    t.timestamp_millis()
}

// ============================================================================
// Parsing
// ============================================================================

#[test]
fn test_now_forms() {
    for input in ["now", "NOW", "", "  "] {
        assert_eq!(parse_time_modifier(input).unwrap(), TimeModifier::Now, "Failed for input: {:?}", input);
    }
}

#[test]
fn test_epoch_seconds() {
    assert_eq!(
        parse_time_modifier("1700000000").unwrap(),
        TimeModifier::Absolute(AbsoluteTime::EpochMillis(1_700_000_000_000))
    );
    assert_eq!(
        parse_time_modifier("1700000000.25").unwrap(),
        TimeModifier::Absolute(AbsoluteTime::EpochMillis(1_700_000_000_250))
    );
}

#[test]
fn test_relative_steps() {
    assert_eq!(
        parse_time_modifier("@w1+9h").unwrap(),
        TimeModifier::Relative(vec![
            RelativeStep::Snap(Snap::Weekday(1)),
            RelativeStep::Offset {
                amount: 9,
                unit: TimeUnit::Hour
            },
        ])
    );
    assert_eq!(
        parse_time_modifier("-2quarters@q").unwrap(),
        TimeModifier::Relative(vec![
            RelativeStep::Offset {
                amount: -2,
                unit: TimeUnit::Quarter
            },
            RelativeStep::Snap(Snap::Unit(TimeUnit::Quarter)),
        ])
    );
}

#[test]
fn test_parse_errors() {
    assert!(matches!(parse_time_modifier("-1"), Err(ParseError::TimeModifier { .. })));
    assert!(matches!(parse_time_modifier("-1d#"), Err(ParseError::TimeModifier { .. })));
    assert!(matches!(parse_time_modifier("@"), Err(ParseError::TimeModifier { .. })));
    assert!(matches!(parse_time_modifier("-3fortnights"), Err(ParseError::UnsupportedTimeUnit(_))));
    assert!(matches!(parse_time_modifier("@ms"), Err(ParseError::UnsupportedTimeUnit(_))));
    assert!(matches!(parse_time_modifier("@w8"), Err(ParseError::TimeModifier { .. })));
}

// ============================================================================
// Resolution
// ============================================================================

#[test]
fn test_fixed_offsets() {
    let now = at(2024, 3, 10, 8, 30, 0);
    let test_cases = vec![
        ("-30s", at(2024, 3, 10, 8, 29, 30)),
        ("-15m", at(2024, 3, 10, 8, 15, 0)),
        ("+2h", at(2024, 3, 10, 10, 30, 0)),
        ("-1d", at(2024, 3, 9, 8, 30, 0)),
        ("-1w", at(2024, 3, 3, 8, 30, 0)),
    ];

    for (input, expected) in test_cases {
        assert_eq!(resolve(input, now), ms(expected), "Failed for input: {}", input);
    }
}

#[test]
fn test_subsecond_offsets_resolve() {
    let now = at(2024, 3, 10, 8, 30, 0);
    assert_eq!(resolve("-250ms", now), ms(now) - 250);
    assert_eq!(resolve("-3ds", now), ms(now) - 300);
}

#[test]
fn test_quarter_is_three_months() {
    let now = at(2024, 8, 20, 0, 0, 0);
    assert_eq!(resolve("-1q", now), ms(at(2024, 5, 20, 0, 0, 0)));
    assert_eq!(resolve("-1quarter", now), resolve("-3mon", now));
}

#[test]
fn test_month_end_clamps() {
    let now = at(2024, 3, 31, 12, 0, 0);
    assert_eq!(resolve("-1mon", now), ms(at(2024, 2, 29, 12, 0, 0)));
    assert_eq!(resolve("-1y", at(2024, 2, 29, 0, 0, 0)), ms(at(2023, 2, 28, 0, 0, 0)));
}

#[test]
fn test_quarter_snaps() {
    let test_cases = vec![
        (at(2024, 1, 15, 9, 0, 0), at(2024, 1, 1, 0, 0, 0)),
        (at(2024, 3, 31, 23, 59, 59), at(2024, 1, 1, 0, 0, 0)),
        (at(2024, 5, 2, 0, 0, 0), at(2024, 4, 1, 0, 0, 0)),
        (at(2024, 9, 30, 12, 0, 0), at(2024, 7, 1, 0, 0, 0)),
        (at(2024, 12, 25, 12, 0, 0), at(2024, 10, 1, 0, 0, 0)),
    ];

    for (now, expected) in test_cases {
        assert_eq!(resolve("@q", now), ms(expected), "Failed for now: {}", now);
    }
}

#[test]
fn test_week_snaps_on_sunday() {
    // 2024-06-09 is a Sunday.
    let now = at(2024, 6, 9, 18, 0, 0);
    assert_eq!(resolve("@w0", now), ms(at(2024, 6, 9, 0, 0, 0)));
    assert_eq!(resolve("@w7", now), ms(at(2024, 6, 9, 0, 0, 0)));
    assert_eq!(resolve("@w", now), ms(at(2024, 6, 9, 0, 0, 0)));
    assert_eq!(resolve("@w1", now), ms(at(2024, 6, 3, 0, 0, 0)));
    assert_eq!(resolve("@w6", now), ms(at(2024, 6, 8, 0, 0, 0)));
}

#[test]
fn test_steps_apply_left_to_right() {
    let now = at(2024, 6, 5, 13, 37, 5);
    assert_eq!(resolve("-1d@d", now), ms(at(2024, 6, 4, 0, 0, 0)));
    assert_eq!(resolve("@d-1d", now), ms(at(2024, 6, 4, 0, 0, 0)));
    assert_eq!(resolve("@mon+1mon-1d", now), ms(at(2024, 6, 30, 0, 0, 0)));
    assert_eq!(resolve("-1y@y", now), ms(at(2023, 1, 1, 0, 0, 0)));
}

#[test]
fn test_snap_follows_now_offset() {
    let tokyo = FixedOffset::east_opt(9 * 3600).unwrap();
    let now = tokyo.with_ymd_and_hms(2024, 6, 5, 3, 0, 0).unwrap();
    let expected = tokyo.with_ymd_and_hms(2024, 6, 5, 0, 0, 0).unwrap();
    assert_eq!(resolve("@d", now), expected.timestamp_millis());
}

#[test]
fn test_absolute_dates() {
    let now = at(2024, 6, 5, 13, 37, 5);
    assert_eq!(resolve("12/31/2023:23:59:59", now), ms(at(2023, 12, 31, 23, 59, 59)));
    assert_eq!(resolve("1700000000", now), 1_700_000_000_000);
    assert!(matches!(parse_time_modifier("12/31/2023:25:00:00"), Err(ParseError::TimeModifier { .. })));
}
