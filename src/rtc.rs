//! RTC tuple ⇄ civil time conversions.
//!
//! Wire format: `(yyyy, m, d, weekday, h, mm, ss, 0)` where weekday is
//! 0=Monday…6=Sunday — conveniently the same encoding as
//! `chrono::Weekday::num_days_from_monday()`.

use chrono::{Datelike, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};

/// Renders a civil time as the eight-field RTC tuple the helper expects for
/// `sync_rtc`/`get_rtc_time` framing.
pub fn date_to_rp2_datetime(t: chrono::DateTime<Utc>) -> (i32, u8, u8, u8, u8, u8, u8, u8) {
    let weekday = t.weekday().num_days_from_monday() as u8;
    (
        t.year(),
        t.month() as u8,
        t.day() as u8,
        weekday,
        t.hour() as u8,
        t.minute() as u8,
        t.second() as u8,
        0,
    )
}

/// Parses an eight-field RTC tuple back into a civil time. The weekday
/// field is accepted but not validated against the date (the helper is
/// trusted to have derived it correctly); returns `None` for an
/// out-of-range year/month/day/hour/minute/second.
pub fn rp2_datetime_to_date(
    tuple: (i32, u8, u8, u8, u8, u8, u8, u8),
) -> Option<chrono::DateTime<Utc>> {
    let (year, month, day, _weekday, hour, minute, second, _subsec) = tuple;
    let date = NaiveDate::from_ymd_opt(year, month as u32, day as u32)?;
    let time = date.and_hms_opt(hour as u32, minute as u32, second as u32)?;
    Some(Utc.from_utc_datetime(&time))
}

/// Parses the helper's literal Python-tuple-shaped RTC string, e.g.
/// `"(2024, 1, 1, 0, 12, 0, 0, 0)"`. Returns `None` for malformed input,
/// matching `getRtcTime`'s "invalid tuples yield `time=null`" contract.
pub fn parse_wire_tuple(text: &str) -> Option<chrono::DateTime<Utc>> {
    let trimmed = text.trim();
    let inner = trimmed.strip_prefix('(')?.strip_suffix(')')?;
    let fields: Vec<i64> = inner
        .split(',')
        .map(|f| f.trim().parse::<i64>())
        .collect::<Result<_, _>>()
        .ok()?;
    if fields.len() != 8 {
        return None;
    }
    rp2_datetime_to_date((
        fields[0] as i32,
        fields[1] as u8,
        fields[2] as u8,
        fields[3] as u8,
        fields[4] as u8,
        fields[5] as u8,
        fields[6] as u8,
        fields[7] as u8,
    ))
}

/// Truncates a civil time to whole seconds, matching what the wire tuple
/// can represent (no sub-second field is carried).
pub fn truncate_to_seconds(t: chrono::DateTime<Utc>) -> chrono::DateTime<Utc> {
    let naive: NaiveDateTime = t.naive_utc();
    let truncated = naive
        .date()
        .and_hms_opt(naive.hour(), naive.minute(), naive.second())
        .unwrap_or(naive);
    Utc.from_utc_datetime(&truncated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn round_trips_civil_time() {
        let t = Utc.with_ymd_and_hms(2024, 3, 14, 9, 26, 53).unwrap();
        let tuple = date_to_rp2_datetime(t);
        let back = rp2_datetime_to_date(tuple).unwrap();
        assert_eq!(back, truncate_to_seconds(t));
    }

    #[test]
    fn weekday_matches_monday_zero_encoding() {
        // 2024-03-14 is a Thursday -> index 3 (Mon=0, Tue=1, Wed=2, Thu=3)
        let t = Utc.with_ymd_and_hms(2024, 3, 14, 0, 0, 0).unwrap();
        let tuple = date_to_rp2_datetime(t);
        assert_eq!(tuple.3, 3);
    }

    #[test]
    fn parses_wire_tuple_string() {
        let parsed = parse_wire_tuple("(2024, 1, 1, 0, 12, 0, 0, 0)").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap());
    }

    #[test]
    fn rejects_malformed_tuple() {
        assert!(parse_wire_tuple("not a tuple").is_none());
        assert!(parse_wire_tuple("(2024, 13, 40, 0, 99, 99, 99, 0)").is_none());
    }
}
