//! Relative-time modifiers: `earliest=-1d@d`, `latest=@w1+9h`, `aligntime=@h`.
//!
//! A modifier is parsed once into a [`TimeModifier`] and then resolved
//! against an explicit `now`. Every step of a relative chain is applied to
//! the running value, left to right:
//!
//! ```text
//! -1d@d+3h    yesterday at 03:00
//! @q          start of the current quarter
//! @w1-7d      Monday of the previous week
//! ```

use std::fmt;

use chrono::{
    DateTime, Datelike, Days, Duration, FixedOffset, Months, NaiveDate, NaiveDateTime, TimeZone,
    Timelike,
};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;

use crate::error::{ParseError, Result};
use crate::value::Number;

const ABSOLUTE_FORMAT: &str = "%m/%d/%Y:%H:%M:%S";
const DATE_FORMAT: &str = "%m/%d/%Y";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeUnit {
    Microsecond,
    Millisecond,
    Centisecond,
    Decisecond,
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

impl TimeUnit {
    pub fn parse(text: &str) -> Option<TimeUnit> {
        let unit = match text.to_ascii_lowercase().as_str() {
            "us" => TimeUnit::Microsecond,
            "ms" => TimeUnit::Millisecond,
            "cs" => TimeUnit::Centisecond,
            "ds" => TimeUnit::Decisecond,
            "s" | "sec" | "secs" | "second" | "seconds" => TimeUnit::Second,
            "m" | "min" | "mins" | "minute" | "minutes" => TimeUnit::Minute,
            "h" | "hr" | "hrs" | "hour" | "hours" => TimeUnit::Hour,
            "d" | "day" | "days" => TimeUnit::Day,
            "w" | "week" | "weeks" => TimeUnit::Week,
            "mon" | "month" | "months" => TimeUnit::Month,
            "q" | "qtr" | "qtrs" | "quarter" | "quarters" => TimeUnit::Quarter,
            "y" | "yr" | "yrs" | "year" | "years" => TimeUnit::Year,
            _ => return None,
        };
        Some(unit)
    }

    pub fn is_subsecond(self) -> bool {
        matches!(
            self,
            TimeUnit::Microsecond | TimeUnit::Millisecond | TimeUnit::Centisecond | TimeUnit::Decisecond
        )
    }

    /// Fixed length in microseconds; `None` for calendar units.
    pub fn fixed_micros(self) -> Option<i64> {
        let micros = match self {
            TimeUnit::Microsecond => 1,
            TimeUnit::Millisecond => 1_000,
            TimeUnit::Centisecond => 10_000,
            TimeUnit::Decisecond => 100_000,
            TimeUnit::Second => 1_000_000,
            TimeUnit::Minute => 60_000_000,
            TimeUnit::Hour => 3_600_000_000,
            TimeUnit::Day => 86_400_000_000,
            TimeUnit::Week => 604_800_000_000,
            TimeUnit::Month | TimeUnit::Quarter | TimeUnit::Year => return None,
        };
        Some(micros)
    }

    /// Units shorter than a day.
    pub fn is_sub_day(self) -> bool {
        matches!(
            self.fixed_micros(),
            Some(micros) if micros < 86_400_000_000
        )
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TimeUnit::Microsecond => "us",
            TimeUnit::Millisecond => "ms",
            TimeUnit::Centisecond => "cs",
            TimeUnit::Decisecond => "ds",
            TimeUnit::Second => "s",
            TimeUnit::Minute => "m",
            TimeUnit::Hour => "h",
            TimeUnit::Day => "d",
            TimeUnit::Week => "w",
            TimeUnit::Month => "mon",
            TimeUnit::Quarter => "q",
            TimeUnit::Year => "y",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Snap {
    Unit(TimeUnit),
    /// `@w0`..`@w6`, counted from Sunday.
    Weekday(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RelativeStep {
    Offset { amount: i64, unit: TimeUnit },
    Snap(Snap),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AbsoluteTime {
    /// Wall-clock date, interpreted in the offset of `now`.
    Date(NaiveDateTime),
    EpochMillis(i64),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeModifier {
    Now,
    Absolute(AbsoluteTime),
    Relative(Vec<RelativeStep>),
}

impl TimeModifier {
    /// First sub-second unit used by any step.
    pub fn subsecond_unit(&self) -> Option<TimeUnit> {
        match self {
            TimeModifier::Relative(steps) => steps.iter().find_map(|step| match step {
                RelativeStep::Offset { unit, .. } if unit.is_subsecond() => Some(*unit),
                _ => None,
            }),
            _ => None,
        }
    }
}

/// Parses `now`, an absolute `MM/DD/YYYY:HH:MM:SS` date, raw epoch seconds,
/// or a chain of offsets and snaps.
pub fn parse_time_modifier(text: &str) -> Result<TimeModifier> {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("now") {
        return Ok(TimeModifier::Now);
    }

    if trimmed.starts_with(|c: char| c.is_ascii_digit()) {
        return parse_absolute(trimmed).map(TimeModifier::Absolute);
    }

    parse_relative_chain(trimmed).map(TimeModifier::Relative)
}

/// Same as [`parse_time_modifier`] but refuses sub-second units, which the
/// `earliest`/`latest` search terms do not accept.
pub fn parse_search_time_modifier(text: &str) -> Result<TimeModifier> {
    let modifier = parse_time_modifier(text)?;
    match modifier.subsecond_unit() {
        Some(unit) => Err(ParseError::UnsupportedTimeUnit(unit.to_string())),
        None => Ok(modifier),
    }
}

/// Parses `MM/DD/YYYY:HH:MM:SS` or `MM/DD/YYYY` (midnight).
pub fn parse_absolute_date(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, ABSOLUTE_FORMAT)
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(text, DATE_FORMAT)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn parse_absolute(text: &str) -> Result<AbsoluteTime> {
    if let Some(number) = Number::parse(text) {
        let millis = number
            .to_decimal()
            .and_then(|d| d.checked_mul(Decimal::from(1000)))
            .and_then(|ms| ms.trunc().to_i64())
            .ok_or_else(|| ParseError::time_modifier(text, "epoch out of range"))?;
        return Ok(AbsoluteTime::EpochMillis(millis));
    }

    parse_absolute_date(text)
        .map(AbsoluteTime::Date)
        .ok_or_else(|| ParseError::time_modifier(text, "expected MM/DD/YYYY:HH:MM:SS"))
}

fn parse_relative_chain(text: &str) -> Result<Vec<RelativeStep>> {
    let chars: Vec<char> = text.chars().collect();
    let mut steps = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            sign @ ('+' | '-') => {
                i += 1;
                let digits_start = i;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let digits: String = chars[digits_start..i].iter().collect();
                let amount: i64 = if digits.is_empty() {
                    1
                } else {
                    digits
                        .parse()
                        .map_err(|_| ParseError::time_modifier(text, "offset out of range"))?
                };

                let unit_start = i;
                while i < chars.len() && chars[i].is_ascii_alphabetic() {
                    i += 1;
                }
                let unit_text: String = chars[unit_start..i].iter().collect();
                if unit_text.is_empty() {
                    return Err(ParseError::time_modifier(text, "missing time unit"));
                }
                let unit = TimeUnit::parse(&unit_text)
                    .ok_or_else(|| ParseError::UnsupportedTimeUnit(unit_text.clone()))?;

                let amount = if sign == '-' { -amount } else { amount };
                steps.push(RelativeStep::Offset { amount, unit });
            }
            '@' => {
                i += 1;
                let start = i;
                while i < chars.len() && chars[i].is_ascii_alphanumeric() {
                    i += 1;
                }
                let snap_text: String = chars[start..i].iter().collect();
                steps.push(RelativeStep::Snap(parse_snap(text, &snap_text)?));
            }
            other => {
                return Err(ParseError::time_modifier(
                    text,
                    format!("unexpected {:?}, expected '+', '-' or '@'", other),
                ));
            }
        }
    }

    Ok(steps)
}

fn parse_snap(modifier: &str, snap: &str) -> Result<Snap> {
    let lower = snap.to_ascii_lowercase();
    match lower.strip_prefix('w') {
        Some(day) if !day.is_empty() && day.bytes().all(|b| b.is_ascii_digit()) => {
            return match day.parse::<u32>() {
                Ok(n) if n <= 7 => Ok(Snap::Weekday(n % 7)),
                _ => Err(ParseError::time_modifier(modifier, "week snap must be w0 to w7")),
            };
        }
        _ => {}
    }

    match TimeUnit::parse(&lower) {
        Some(unit) if unit.is_subsecond() => Err(ParseError::UnsupportedTimeUnit(snap.to_string())),
        Some(unit) => Ok(Snap::Unit(unit)),
        None if snap.is_empty() => Err(ParseError::time_modifier(modifier, "missing snap unit")),
        None => Err(ParseError::UnsupportedTimeUnit(snap.to_string())),
    }
}

/// Resolves a modifier to epoch milliseconds.
pub fn calculate_relative_time(modifier: &TimeModifier, now: &DateTime<FixedOffset>) -> Result<i64> {
    match modifier {
        TimeModifier::Now => Ok(now.timestamp_millis()),
        TimeModifier::Absolute(AbsoluteTime::EpochMillis(ms)) => Ok(*ms),
        TimeModifier::Absolute(AbsoluteTime::Date(naive)) => {
            Ok(localize(now, *naive)?.timestamp_millis())
        }
        TimeModifier::Relative(steps) => {
            let mut current = *now;
            for step in steps {
                current = match step {
                    RelativeStep::Offset { amount, unit } => apply_offset(current, *amount, *unit)?,
                    RelativeStep::Snap(snap) => apply_snap(current, *snap)?,
                };
            }
            Ok(current.timestamp_millis())
        }
    }
}

fn out_of_range() -> ParseError {
    ParseError::time_modifier("", "resulting time is out of range")
}

fn localize(reference: &DateTime<FixedOffset>, naive: NaiveDateTime) -> Result<DateTime<FixedOffset>> {
    reference
        .timezone()
        .from_local_datetime(&naive)
        .single()
        .ok_or_else(out_of_range)
}

fn apply_offset(t: DateTime<FixedOffset>, amount: i64, unit: TimeUnit) -> Result<DateTime<FixedOffset>> {
    let shifted = match unit {
        TimeUnit::Day => shift_days(t, amount),
        TimeUnit::Week => amount.checked_mul(7).and_then(|days| shift_days(t, days)),
        TimeUnit::Month => shift_months(t, amount),
        TimeUnit::Quarter => amount.checked_mul(3).and_then(|months| shift_months(t, months)),
        TimeUnit::Year => amount.checked_mul(12).and_then(|months| shift_months(t, months)),
        fixed => fixed
            .fixed_micros()
            .and_then(|micros| amount.checked_mul(micros))
            .and_then(|total| t.checked_add_signed(Duration::microseconds(total))),
    };
    shifted.ok_or_else(out_of_range)
}

fn shift_days(t: DateTime<FixedOffset>, days: i64) -> Option<DateTime<FixedOffset>> {
    let magnitude = Days::new(days.unsigned_abs());
    if days >= 0 {
        t.checked_add_days(magnitude)
    } else {
        t.checked_sub_days(magnitude)
    }
}

fn shift_months(t: DateTime<FixedOffset>, months: i64) -> Option<DateTime<FixedOffset>> {
    let magnitude = Months::new(u32::try_from(months.unsigned_abs()).ok()?);
    if months >= 0 {
        t.checked_add_months(magnitude)
    } else {
        t.checked_sub_months(magnitude)
    }
}

fn apply_snap(t: DateTime<FixedOffset>, snap: Snap) -> Result<DateTime<FixedOffset>> {
    let date = t.date_naive();
    let midnight = |d: NaiveDate| d.and_hms_opt(0, 0, 0);

    let snapped = match snap {
        Snap::Unit(TimeUnit::Second) => return t.with_nanosecond(0).ok_or_else(out_of_range),
        Snap::Unit(TimeUnit::Minute) => t.with_nanosecond(0).and_then(|t| t.with_second(0)),
        Snap::Unit(TimeUnit::Hour) => t
            .with_nanosecond(0)
            .and_then(|t| t.with_second(0))
            .and_then(|t| t.with_minute(0)),
        Snap::Unit(TimeUnit::Day) => return localize(&t, midnight(date).ok_or_else(out_of_range)?),
        Snap::Unit(TimeUnit::Week) => {
            let back = u64::from(date.weekday().num_days_from_sunday());
            let sunday = date.checked_sub_days(Days::new(back)).and_then(midnight);
            return localize(&t, sunday.ok_or_else(out_of_range)?);
        }
        Snap::Unit(TimeUnit::Month) => {
            let first = NaiveDate::from_ymd_opt(date.year(), date.month(), 1).and_then(midnight);
            return localize(&t, first.ok_or_else(out_of_range)?);
        }
        Snap::Unit(TimeUnit::Quarter) => {
            let quarter_month = (date.month() - 1) / 3 * 3 + 1;
            let first = NaiveDate::from_ymd_opt(date.year(), quarter_month, 1).and_then(midnight);
            return localize(&t, first.ok_or_else(out_of_range)?);
        }
        Snap::Unit(TimeUnit::Year) => {
            let first = NaiveDate::from_ymd_opt(date.year(), 1, 1).and_then(midnight);
            return localize(&t, first.ok_or_else(out_of_range)?);
        }
        Snap::Weekday(target) => {
            let current = date.weekday().num_days_from_sunday();
            let back = (current + 7 - target % 7) % 7;
            let day = date.checked_sub_days(Days::new(u64::from(back))).and_then(midnight);
            return localize(&t, day.ok_or_else(out_of_range)?);
        }
        Snap::Unit(unit) => return Err(ParseError::UnsupportedTimeUnit(unit.to_string())),
    };
    snapped.ok_or_else(out_of_range)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(y, mo, d, h, mi, s)
            .unwrap()
    }

    fn resolve(text: &str, now: &DateTime<FixedOffset>) -> i64 {
        calculate_relative_time(&parse_time_modifier(text).unwrap(), now).unwrap()
    }

    #[test]
    fn test_unit_aliases() {
        assert_eq!(TimeUnit::parse("mins"), Some(TimeUnit::Minute));
        assert_eq!(TimeUnit::parse("mon"), Some(TimeUnit::Month));
        assert_eq!(TimeUnit::parse("qtrs"), Some(TimeUnit::Quarter));
        assert_eq!(TimeUnit::parse("ms"), Some(TimeUnit::Millisecond));
        assert_eq!(TimeUnit::parse("fortnight"), None);
    }

    #[test]
    fn test_chain_parse() {
        let modifier = parse_time_modifier("-1d@d+3h").unwrap();
        assert_eq!(
            modifier,
            TimeModifier::Relative(vec![
                RelativeStep::Offset { amount: -1, unit: TimeUnit::Day },
                RelativeStep::Snap(Snap::Unit(TimeUnit::Day)),
                RelativeStep::Offset { amount: 3, unit: TimeUnit::Hour },
            ])
        );
    }

    #[test]
    fn test_unit_only_offset_means_one() {
        let now = at(2024, 6, 5, 13, 37, 5);
        assert_eq!(resolve("-h", &now), at(2024, 6, 5, 12, 37, 5).timestamp_millis());
    }

    #[test]
    fn test_snaps_on_wednesday() {
        let now = at(2024, 6, 5, 13, 37, 5);
        assert_eq!(resolve("@m", &now), at(2024, 6, 5, 13, 37, 0).timestamp_millis());
        assert_eq!(resolve("@h", &now), at(2024, 6, 5, 13, 0, 0).timestamp_millis());
        assert_eq!(resolve("@d", &now), at(2024, 6, 5, 0, 0, 0).timestamp_millis());
        assert_eq!(resolve("@w", &now), at(2024, 6, 2, 0, 0, 0).timestamp_millis());
        assert_eq!(resolve("@w0", &now), at(2024, 6, 2, 0, 0, 0).timestamp_millis());
        assert_eq!(resolve("@w7", &now), at(2024, 6, 2, 0, 0, 0).timestamp_millis());
        assert_eq!(resolve("@w1", &now), at(2024, 6, 3, 0, 0, 0).timestamp_millis());
        assert_eq!(resolve("@w3", &now), at(2024, 6, 5, 0, 0, 0).timestamp_millis());
        assert_eq!(resolve("@w4", &now), at(2024, 5, 30, 0, 0, 0).timestamp_millis());
        assert_eq!(resolve("@mon", &now), at(2024, 6, 1, 0, 0, 0).timestamp_millis());
        assert_eq!(resolve("@q", &now), at(2024, 4, 1, 0, 0, 0).timestamp_millis());
        assert_eq!(resolve("@y", &now), at(2024, 1, 1, 0, 0, 0).timestamp_millis());
    }

    #[test]
    fn test_calendar_offsets() {
        let now = at(2024, 6, 5, 13, 37, 5);
        assert_eq!(resolve("-1mon", &now), at(2024, 5, 5, 13, 37, 5).timestamp_millis());
        assert_eq!(resolve("-1q", &now), at(2024, 3, 5, 13, 37, 5).timestamp_millis());
        assert_eq!(resolve("-2y", &now), at(2022, 6, 5, 13, 37, 5).timestamp_millis());
        assert_eq!(resolve("+1w", &now), at(2024, 6, 12, 13, 37, 5).timestamp_millis());
    }

    #[test]
    fn test_absolute_forms() {
        let now = at(2024, 6, 5, 13, 37, 5);
        assert_eq!(resolve("06/01/2024:10:00:00", &now), at(2024, 6, 1, 10, 0, 0).timestamp_millis());
        assert_eq!(resolve("1700000000", &now), 1_700_000_000_000);
        assert_eq!(resolve("now", &now), now.timestamp_millis());
    }

    #[test]
    fn test_absolute_date_uses_now_offset() {
        let now = FixedOffset::east_opt(3600)
            .unwrap()
            .with_ymd_and_hms(2024, 6, 5, 13, 0, 0)
            .unwrap();
        let expected = at(2024, 6, 1, 9, 0, 0).timestamp_millis();
        assert_eq!(resolve("06/01/2024:10:00:00", &now), expected);
    }

    #[test]
    fn test_subsecond_rejected_for_search() {
        assert!(parse_time_modifier("-10ms").is_ok());
        assert_eq!(
            parse_search_time_modifier("-10ms"),
            Err(ParseError::UnsupportedTimeUnit("ms".to_string()))
        );
    }

    #[test]
    fn test_bad_modifiers() {
        assert!(parse_time_modifier("-1").is_err());
        assert!(parse_time_modifier("-1fortnight").is_err());
        assert!(parse_time_modifier("@w9").is_err());
        assert!(parse_time_modifier("13/45/2024:00:00:00").is_err());
        assert!(parse_time_modifier("yesterday").is_err());
    }
}
