//! Cycle offset detection and date shifting
//!
//! A cycle offset is either a compact duration (`-6h`, `+1d12h`, `30m`) or an
//! ISO 8601 duration (`-PT6H`, `P1D`, `-P1DT12H`). Offsets are resolved
//! against the task cycle time. Without a task cycle time there is nothing to
//! shift against and every token is treated as an absolute cycle.

use chrono::{Duration, NaiveDateTime};

/// Cycle point formats accepted for the task cycle time, tried in order.
///
/// Each entry is the display format plus the padding and format used to parse
/// it: chrono needs a minute field, so hour-only cycles are padded with `00`.
/// A shifted cycle is printed in the same format as the task cycle time.
const CYCLE_FORMATS: &[(&str, &str, &str)] = &[
    ("%Y%m%d%H", "00", "%Y%m%d%H%M"),
    ("%Y%m%d%H%M", "", "%Y%m%d%H%M"),
    ("%Y%m%dT%H%MZ", "", "%Y%m%dT%H%MZ"),
    ("%Y%m%dT%H%M", "", "%Y%m%dT%H%M"),
];

/// Reason an offset could not be applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffsetError(pub String);

impl std::fmt::Display for OffsetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Shifts cycle points by offsets relative to the current task's cycle time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleShifter {
    task_cycle: Option<(NaiveDateTime, &'static str)>,
}

impl CycleShifter {
    /// A shifter with no task cycle time: offsets pass through unchanged.
    #[must_use]
    pub const fn inactive() -> Self {
        Self { task_cycle: None }
    }

    /// Create a shifter anchored at `task_cycle_time`.
    ///
    /// Returns `None` if the cycle time is not in a recognised format.
    #[must_use]
    pub fn new(task_cycle_time: &str) -> Option<Self> {
        CYCLE_FORMATS.iter().find_map(|&(display, pad, parse)| {
            NaiveDateTime::parse_from_str(&format!("{task_cycle_time}{pad}"), parse)
                .ok()
                // Reject formats that parse but would not reproduce the input
                .filter(|dt| dt.format(display).to_string() == task_cycle_time)
                .map(|dt| Self {
                    task_cycle: Some((dt, display)),
                })
        })
    }

    /// Whether offsets are resolved against a task cycle time
    #[must_use]
    pub const fn is_task_cycle_time_mode(&self) -> bool {
        self.task_cycle.is_some()
    }

    /// Whether `token` should be treated as a cycle offset.
    ///
    /// Signed tokens shaped like a duration count as offsets even when their
    /// units are wrong, so that a typo surfaces as an error from
    /// [`Self::shift`] instead of silently matching nothing.
    #[must_use]
    pub fn is_offset(token: &str) -> bool {
        if parse_offset(token).is_ok() {
            return true;
        }
        let Some(body) = token.strip_prefix(['+', '-']) else {
            return false;
        };
        body.starts_with(|c: char| c.is_ascii_digit())
            && body.chars().all(|c| c.is_ascii_alphanumeric())
            && body.chars().any(|c| c.is_ascii_alphabetic())
    }

    /// Shift the task cycle time by `offset` and format the result.
    pub fn shift(&self, offset: &str) -> Result<String, OffsetError> {
        let (base, fmt) = self
            .task_cycle
            .ok_or_else(|| OffsetError("no task cycle time to shift from".to_string()))?;
        let delta = parse_offset(offset)?;
        let shifted = base
            .checked_add_signed(delta)
            .ok_or_else(|| OffsetError("shifted cycle is out of range".to_string()))?;
        Ok(shifted.format(fmt).to_string())
    }
}

/// Parse an offset into a signed duration.
pub fn parse_offset(token: &str) -> Result<Duration, OffsetError> {
    let (negative, body) = match token.as_bytes().first() {
        Some(b'-') => (true, &token[1..]),
        Some(b'+') => (false, &token[1..]),
        _ => (false, token),
    };
    if body.is_empty() {
        return Err(OffsetError("empty offset".to_string()));
    }

    let seconds = if let Some(iso) = body.strip_prefix(['P', 'p']) {
        parse_iso_duration(iso)?
    } else {
        parse_compact_duration(body)?
    };

    let seconds = if negative { -seconds } else { seconds };
    Duration::try_seconds(seconds).ok_or_else(|| OffsetError("offset is out of range".to_string()))
}

/// `1d12h`, `6H`, `90m`: one or more `<digits><unit>` groups.
fn parse_compact_duration(body: &str) -> Result<i64, OffsetError> {
    let mut total: i64 = 0;
    let mut digits = String::new();

    for c in body.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        if digits.is_empty() {
            return Err(OffsetError(format!("expected a number before '{c}'")));
        }
        let unit = unit_seconds(c.to_ascii_lowercase())
            .ok_or_else(|| OffsetError(format!("unknown unit '{c}'")))?;
        total = add_units(total, &digits, unit)?;
        digits.clear();
    }

    if !digits.is_empty() {
        return Err(OffsetError(format!("missing unit after '{digits}'")));
    }
    Ok(total)
}

/// The part of an ISO 8601 duration after `P`: `1W`, `1DT6H`, `T30M`.
fn parse_iso_duration(body: &str) -> Result<i64, OffsetError> {
    let mut total: i64 = 0;
    let mut digits = String::new();
    let mut in_time = false;
    let mut any = false;

    for c in body.chars() {
        let c = c.to_ascii_uppercase();
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        if c == 'T' && digits.is_empty() && !in_time {
            in_time = true;
            continue;
        }
        if digits.is_empty() {
            return Err(OffsetError(format!("expected a number before '{c}'")));
        }
        let unit = match (in_time, c) {
            (false, 'W') => 604_800,
            (false, 'D') => 86_400,
            (true, 'H') => 3_600,
            (true, 'M') => 60,
            (true, 'S') => 1,
            _ => return Err(OffsetError(format!("unexpected designator '{c}'"))),
        };
        total = add_units(total, &digits, unit)?;
        digits.clear();
        any = true;
    }

    if !digits.is_empty() || !any {
        return Err(OffsetError("incomplete ISO 8601 duration".to_string()));
    }
    Ok(total)
}

const fn unit_seconds(unit: char) -> Option<i64> {
    match unit {
        'w' => Some(604_800),
        'd' => Some(86_400),
        'h' => Some(3_600),
        'm' => Some(60),
        's' => Some(1),
        _ => None,
    }
}

fn add_units(total: i64, digits: &str, unit: i64) -> Result<i64, OffsetError> {
    digits
        .parse::<i64>()
        .ok()
        .and_then(|n| n.checked_mul(unit))
        .and_then(|s| total.checked_add(s))
        .ok_or_else(|| OffsetError("offset is out of range".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shifter() -> CycleShifter {
        CycleShifter::new("2013010112").unwrap()
    }

    #[test]
    fn test_compact_offsets_detected() {
        assert!(CycleShifter::is_offset("-6h"));
        assert!(CycleShifter::is_offset("+12H"));
        assert!(CycleShifter::is_offset("1d"));
        assert!(CycleShifter::is_offset("-1d12h"));
    }

    #[test]
    fn test_iso_offsets_detected() {
        assert!(CycleShifter::is_offset("-PT6H"));
        assert!(CycleShifter::is_offset("P1D"));
        assert!(CycleShifter::is_offset("-P1DT12H"));
    }

    #[test]
    fn test_absolute_cycles_are_not_offsets() {
        assert!(!CycleShifter::is_offset("2013010100"));
        assert!(!CycleShifter::is_offset("20130101T0000Z"));
        assert!(!CycleShifter::is_offset("foo"));
        assert!(!CycleShifter::is_offset(""));
    }

    #[test]
    fn test_signed_typo_is_treated_as_offset() {
        assert!(CycleShifter::is_offset("-6x"));
        assert!(shifter().shift("-6x").is_err());
    }

    #[test]
    fn test_shift_backwards_by_hours() {
        assert_eq!(shifter().shift("-6h").unwrap(), "2013010106");
        assert_eq!(shifter().shift("-12h").unwrap(), "2013010100");
    }

    #[test]
    fn test_shift_across_day_boundary() {
        assert_eq!(shifter().shift("-1d").unwrap(), "2012123112");
        assert_eq!(shifter().shift("-1d12h").unwrap(), "2012123100");
    }

    #[test]
    fn test_shift_forwards() {
        assert_eq!(shifter().shift("+6h").unwrap(), "2013010118");
        assert_eq!(shifter().shift("6h").unwrap(), "2013010118");
    }

    #[test]
    fn test_shift_iso_duration() {
        assert_eq!(shifter().shift("-PT6H").unwrap(), "2013010106");
        assert_eq!(shifter().shift("-P1W").unwrap(), "2012122512");
    }

    #[test]
    fn test_shift_preserves_iso_format() {
        let shifter = CycleShifter::new("20130101T1200Z").unwrap();
        assert_eq!(shifter.shift("-6h").unwrap(), "20130101T0600Z");
    }

    #[test]
    fn test_shift_preserves_minute_format() {
        let shifter = CycleShifter::new("201301011230").unwrap();
        assert_eq!(shifter.shift("-30m").unwrap(), "201301011200");
    }

    #[test]
    fn test_new_rejects_unknown_format() {
        assert!(CycleShifter::new("yesterday").is_none());
        assert!(CycleShifter::new("2013-01-01").is_none());
    }

    #[test]
    fn test_inactive_shifter_cannot_shift() {
        let shifter = CycleShifter::inactive();
        assert!(!shifter.is_task_cycle_time_mode());
        assert!(shifter.shift("-6h").is_err());
    }

    #[test]
    fn test_parse_offset_errors() {
        assert!(parse_offset("-").is_err());
        assert!(parse_offset("-h").is_err());
        assert!(parse_offset("-6").is_err());
        assert!(parse_offset("-P").is_err());
        assert!(parse_offset("-PT").is_err());
        assert!(parse_offset("-P6H").is_err());
    }

    #[test]
    fn test_huge_offset_is_out_of_range() {
        let err = shifter().shift("-99999999999999999999h").unwrap_err();
        assert!(err.0.contains("out of range"));
    }
}
