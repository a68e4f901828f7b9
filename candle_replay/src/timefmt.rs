use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone};

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

// %m/%d/%Y is what the date fields hand us.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// Parse a CSV timestamp cell in the local timezone.
pub fn parse_timestamp(raw: &str) -> Option<i64> {
    parse_timestamp_in(raw, &Local)
}

/// Exactly eight digits means `DDMMYYYY` at midnight; anything else goes
/// through [`parse_date_in`].
pub fn parse_timestamp_in<Tz: TimeZone>(raw: &str, tz: &Tz) -> Option<i64> {
    let s = raw.trim();
    if s.len() == 8 && s.bytes().all(|b| b.is_ascii_digit()) {
        let day: u32 = s[0..2].parse().ok()?;
        let month: u32 = s[2..4].parse().ok()?;
        let year: i32 = s[4..8].parse().ok()?;
        return midnight_in(tz, year, month, day);
    }
    parse_date_in(s, tz)
}

/// Parse a date as typed into the replay From/To fields.
pub fn parse_date(raw: &str) -> Option<i64> {
    parse_date_in(raw, &Local)
}

pub fn parse_date_in<Tz: TimeZone>(raw: &str, tz: &Tz) -> Option<i64> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp());
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return tz.from_local_datetime(&naive).earliest().map(|dt| dt.timestamp());
        }
    }

    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            let naive = date.and_hms_opt(0, 0, 0)?;
            return tz.from_local_datetime(&naive).earliest().map(|dt| dt.timestamp());
        }
    }

    None
}

fn midnight_in<Tz: TimeZone>(tz: &Tz, year: i32, month: u32, day: u32) -> Option<i64> {
    tz.with_ymd_and_hms(year, month, day, 0, 0, 0)
        .earliest()
        .map(|dt| dt.timestamp())
}

pub fn format_ts_local(ts: i64) -> String {
    match Local.timestamp_opt(ts, 0).single() {
        Some(dt) => dt.format("%Y-%m-%d %H:%M").to_string(),
        None => format!("{ts}"),
    }
}

/// Prefill text for the From/To fields; [`parse_date`] reads it back.
pub fn format_date_field(ts: i64) -> String {
    match Local.timestamp_opt(ts, 0).single() {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => String::new(),
    }
}
