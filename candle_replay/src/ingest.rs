//! CSV → candles, markers and bands.
//!
//! The input has a header row; columns are found by name so their order does
//! not matter and any of them may be missing. Rows whose prices don't parse
//! are dropped whole.

use chrono::{Local, TimeZone};

use crate::debug_hooks;
use crate::model::{Band, BandSide, Candle, Marker};
use crate::timefmt;

pub const COL_TIMESTAMP: &str = "timestamp";
pub const COL_OPEN: &str = "open";
pub const COL_HIGH: &str = "high";
pub const COL_LOW: &str = "low";
pub const COL_CLOSE: &str = "close";
pub const COL_DIRECTION: &str = "direction";

/// What to draw for a row whose direction is neither LONG nor SHORT.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NeutralMarkerPolicy {
    /// Orange circle inside the bar.
    #[default]
    InBar,
    /// No marker at all.
    Omit,
}

impl NeutralMarkerPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            NeutralMarkerPolicy::InBar => "inbar",
            NeutralMarkerPolicy::Omit => "omit",
        }
    }

    pub fn from_config(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "omit" | "none" | "off" => NeutralMarkerPolicy::Omit,
            _ => NeutralMarkerPolicy::InBar,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct IngestOptions {
    pub neutral_markers: NeutralMarkerPolicy,
}

/// Result of reading an optional cell.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldParse<T> {
    Value(T),
    /// Column missing, cell empty, or an empty array.
    Absent,
    /// Present but unusable; carries the reason.
    Malformed(String),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub rows: usize,
    pub kept: usize,
    pub bad_price: usize,
    pub bad_timestamp: usize,
    pub malformed_areas: usize,
}

impl IngestStats {
    pub fn dropped(&self) -> usize {
        self.bad_price + self.bad_timestamp
    }
}

#[derive(Clone, Debug, Default)]
pub struct ParsedFrame {
    pub candles: Vec<Candle>,
    pub markers: Vec<Marker>,
    pub bands: Vec<Band>,
    pub stats: IngestStats,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Columns {
    pub timestamp: Option<usize>,
    pub open: Option<usize>,
    pub high: Option<usize>,
    pub low: Option<usize>,
    pub close: Option<usize>,
    pub direction: Option<usize>,
    pub buy_area: Option<usize>,
    pub sell_area: Option<usize>,
}

impl Columns {
    pub fn locate(header: &str) -> Self {
        let names: Vec<&str> = header.split(',').map(str::trim).collect();
        let find = |name: &str| names.iter().position(|h| *h == name);
        Self {
            timestamp: find(COL_TIMESTAMP),
            open: find(COL_OPEN),
            high: find(COL_HIGH),
            low: find(COL_LOW),
            close: find(COL_CLOSE),
            direction: find(COL_DIRECTION),
            buy_area: find(BandSide::Buy.column()),
            sell_area: find(BandSide::Sell.column()),
        }
    }

    fn area(&self, side: BandSide) -> Option<usize> {
        match side {
            BandSide::Buy => self.buy_area,
            BandSide::Sell => self.sell_area,
        }
    }
}

pub fn ingest_csv(text: &str, opts: &IngestOptions) -> ParsedFrame {
    ingest_csv_in(text, opts, &Local)
}

pub fn ingest_csv_in<Tz: TimeZone>(text: &str, opts: &IngestOptions, tz: &Tz) -> ParsedFrame {
    let mut out = ParsedFrame::default();

    let mut lines = text.trim().split('\n');
    let Some(header) = lines.next() else {
        return out;
    };
    let cols = Columns::locate(header);

    for (i, line) in lines.enumerate() {
        // header is line 1
        let line_no = i + 2;
        out.stats.rows += 1;

        let cells: Vec<&str> = split_row(line).into_iter().map(str::trim).collect();
        let cell = |idx: Option<usize>| idx.and_then(|i| cells.get(i).copied());

        let open = parse_float(cell(cols.open).unwrap_or(""));
        let high = parse_float(cell(cols.high).unwrap_or(""));
        let low = parse_float(cell(cols.low).unwrap_or(""));
        let close = parse_float(cell(cols.close).unwrap_or(""));
        if [open, high, low, close].iter().any(|v| v.is_nan()) {
            out.stats.bad_price += 1;
            debug_hooks::log_row_skip(line_no, "non-numeric price", line);
            continue;
        }

        let Some(time) = cell(cols.timestamp).and_then(|s| timefmt::parse_timestamp_in(s, tz))
        else {
            out.stats.bad_timestamp += 1;
            debug_hooks::log_row_skip(line_no, "unparseable timestamp", line);
            continue;
        };

        out.candles.push(Candle {
            time,
            open,
            high,
            low,
            close,
        });

        if let Some(marker) = marker_for(time, cell(cols.direction), opts.neutral_markers) {
            out.markers.push(marker);
        }

        for side in [BandSide::Buy, BandSide::Sell] {
            match parse_area(cell(cols.area(side))) {
                FieldParse::Value((lo, hi)) => out.bands.push(Band::new(time, lo, hi, side)),
                FieldParse::Absent => {}
                FieldParse::Malformed(reason) => {
                    out.stats.malformed_areas += 1;
                    debug_hooks::log_area_skip(line_no, side.column(), &reason);
                }
            }
        }
    }

    out.stats.kept = out.candles.len();
    debug_hooks::log_ingest_summary(&out.stats, out.markers.len(), out.bands.len());
    out
}

fn marker_for(time: i64, direction: Option<&str>, neutral: NeutralMarkerPolicy) -> Option<Marker> {
    let dir = direction.map(str::to_ascii_uppercase);
    match dir.as_deref() {
        Some("LONG") => Some(Marker::long(time)),
        Some("SHORT") => Some(Marker::short(time)),
        _ => match neutral {
            NeutralMarkerPolicy::InBar => Some(Marker::neutral(time)),
            NeutralMarkerPolicy::Omit => None,
        },
    }
}

/// Split on commas that are not inside `[...]`.
pub fn split_row(line: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth: usize = 0;
    let mut start = 0;

    for (i, b) in line.bytes().enumerate() {
        match b {
            b'[' => depth += 1,
            b']' => depth = depth.saturating_sub(1),
            b',' if depth == 0 => {
                out.push(&line[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    out.push(&line[start..]);
    out
}

/// Longest numeric prefix, NaN when there is none ("12.5kg" → 12.5).
pub fn parse_float(raw: &str) -> f64 {
    let s = raw.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end += 1;
    }
    if s[end..].starts_with("Infinity") {
        return s[..end + "Infinity".len()].parse().unwrap_or(f64::NAN);
    }

    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;

    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        if digits > 0 {
            end = frac_end;
        }
    }
    if digits == 0 {
        return f64::NAN;
    }

    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && (bytes[exp_end] == b'+' || bytes[exp_end] == b'-') {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    s[..end].parse().unwrap_or(f64::NAN)
}

/// JSON number array → `(min, max)`.
pub fn parse_area(cell: Option<&str>) -> FieldParse<(f64, f64)> {
    let Some(raw) = cell.map(str::trim).filter(|s| !s.is_empty()) else {
        return FieldParse::Absent;
    };

    let values: Vec<serde_json::Value> = match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Array(items)) => items,
        Ok(other) => return FieldParse::Malformed(format!("not an array: {other}")),
        Err(err) => return FieldParse::Malformed(err.to_string()),
    };
    if values.is_empty() {
        return FieldParse::Absent;
    }

    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for v in &values {
        let Some(x) = v.as_f64() else {
            return FieldParse::Malformed(format!("non-numeric element: {v}"));
        };
        lo = lo.min(x);
        hi = hi.max(x);
    }
    FieldParse::Value((lo, hi))
}
