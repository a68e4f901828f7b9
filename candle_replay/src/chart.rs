//! The chart surface the rest of the app talks to.
//!
//! `ChartModel` is what the window draws from; `RecordingChart` keeps every
//! call in order so replay timing can be checked without a window.

use serde::Serialize;

use crate::model::{Band, Candle, Marker, Rgba, TimeRange};

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PriceLine {
    pub price: f64,
    pub color: Rgba,
    pub line_width: f32,
    pub axis_label_visible: bool,
}

impl PriceLine {
    /// Both edges of a band as hidden-label lines in the band colour.
    pub fn edges_of(band: &Band) -> [PriceLine; 2] {
        let edge = |price| PriceLine {
            price,
            color: band.color,
            line_width: 0.0,
            axis_label_visible: false,
        };
        [edge(band.low), edge(band.high)]
    }
}

pub trait ChartSink {
    fn set_data(&mut self, candles: &[Candle]);
    fn set_markers(&mut self, markers: &[Marker]);
    fn update(&mut self, candle: &Candle);
    fn add_price_line(&mut self, line: PriceLine);
    fn clear_price_lines(&mut self);
    fn set_visible_range(&mut self, range: TimeRange);
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct ChartModel {
    pub data: Vec<Candle>,
    pub markers: Vec<Marker>,
    pub price_lines: Vec<PriceLine>,
    pub visible: Option<TimeRange>,
    /// Bumped on every mutation so the view can tell when to re-fit.
    #[serde(skip)]
    pub revision: u64,
}

impl ChartModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Price extent of the candles inside `range` (all candles if `None`).
    pub fn price_bounds(&self, range: Option<TimeRange>) -> Option<(f64, f64)> {
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        for c in self
            .data
            .iter()
            .filter(|c| range.map_or(true, |r| r.contains(c.time)))
        {
            lo = lo.min(c.low);
            hi = hi.max(c.high);
        }
        (lo <= hi).then_some((lo, hi))
    }

    /// Smallest gap between consecutive candles, used as the bar width.
    pub fn bar_spacing(&self) -> i64 {
        self.data
            .windows(2)
            .map(|w| w[1].time - w[0].time)
            .filter(|d| *d > 0)
            .min()
            .unwrap_or(60)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    fn touch(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }
}

impl ChartSink for ChartModel {
    fn set_data(&mut self, candles: &[Candle]) {
        self.data = candles.to_vec();
        self.touch();
    }

    fn set_markers(&mut self, markers: &[Marker]) {
        self.markers = markers.to_vec();
        self.touch();
    }

    /// Same time replaces the last bar, a later time appends, an earlier
    /// time is ignored.
    fn update(&mut self, candle: &Candle) {
        match self.data.last().map(|c| c.time) {
            Some(t) if t == candle.time => {
                if let Some(last) = self.data.last_mut() {
                    *last = *candle;
                }
            }
            Some(t) if t > candle.time => {
                tracing::warn!(last = t, got = candle.time, "ignoring update older than the last bar");
                return;
            }
            _ => self.data.push(*candle),
        }
        self.touch();
    }

    fn add_price_line(&mut self, line: PriceLine) {
        self.price_lines.push(line);
        self.touch();
    }

    fn clear_price_lines(&mut self) {
        self.price_lines.clear();
        self.touch();
    }

    fn set_visible_range(&mut self, range: TimeRange) {
        self.visible = Some(range);
        self.touch();
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ChartCall {
    SetData(Vec<Candle>),
    SetMarkers(usize),
    Update(Candle),
    AddPriceLine(PriceLine),
    ClearPriceLines,
    SetVisibleRange(TimeRange),
}

#[derive(Clone, Debug, Default)]
pub struct RecordingChart {
    pub calls: Vec<ChartCall>,
}

impl RecordingChart {
    pub fn updates(&self) -> Vec<Candle> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                ChartCall::Update(candle) => Some(*candle),
                _ => None,
            })
            .collect()
    }
}

impl ChartSink for RecordingChart {
    fn set_data(&mut self, candles: &[Candle]) {
        self.calls.push(ChartCall::SetData(candles.to_vec()));
    }

    fn set_markers(&mut self, markers: &[Marker]) {
        self.calls.push(ChartCall::SetMarkers(markers.len()));
    }

    fn update(&mut self, candle: &Candle) {
        self.calls.push(ChartCall::Update(*candle));
    }

    fn add_price_line(&mut self, line: PriceLine) {
        self.calls.push(ChartCall::AddPriceLine(line));
    }

    fn clear_price_lines(&mut self) {
        self.calls.push(ChartCall::ClearPriceLines);
    }

    fn set_visible_range(&mut self, range: TimeRange) {
        self.calls.push(ChartCall::SetVisibleRange(range));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BandSide;

    fn candle(time: i64, close: f64) -> Candle {
        Candle {
            time,
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
        }
    }

    #[test]
    fn update_appends_or_replaces() {
        let mut chart = ChartModel::new();
        chart.set_data(&[candle(60, 1.0)]);
        chart.update(&candle(120, 2.0));
        chart.update(&candle(120, 3.0));
        chart.update(&candle(30, 9.0));

        let closes: Vec<f64> = chart.data.iter().map(|c| c.close).collect();
        assert_eq!(closes, vec![1.0, 3.0]);
    }

    #[test]
    fn band_edges_are_two_silent_lines() {
        let band = Band::new(0, 100.0, 200.0, BandSide::Sell);
        let [lo, hi] = PriceLine::edges_of(&band);
        assert_eq!(lo.price, 100.0);
        assert_eq!(hi.price, 200.0);
        assert_eq!(lo.line_width, 0.0);
        assert!(!hi.axis_label_visible);
        assert_eq!(hi.color, Rgba::SELL_ZONE);
    }

    #[test]
    fn bounds_and_spacing() {
        let mut chart = ChartModel::new();
        assert_eq!(chart.price_bounds(None), None);
        chart.set_data(&[candle(0, 10.0), candle(300, 20.0), candle(420, 5.0)]);

        assert_eq!(chart.price_bounds(None), Some((4.0, 21.0)));
        let r = TimeRange { from: 0, to: 300 };
        assert_eq!(chart.price_bounds(Some(r)), Some((9.0, 21.0)));
        assert_eq!(chart.bar_spacing(), 120);
    }

    #[test]
    fn revision_moves_on_every_change() {
        let mut chart = ChartModel::new();
        let r0 = chart.revision;
        chart.set_visible_range(TimeRange { from: 1, to: 2 });
        chart.clear_price_lines();
        assert_eq!(chart.revision, r0 + 2);
    }

    #[test]
    fn json_export_uses_chart_field_names() {
        let mut chart = ChartModel::new();
        chart.set_markers(&[Marker::long(5)]);
        let json = chart.to_json().unwrap();
        assert!(json.contains("\"belowBar\""));
        assert!(json.contains("\"arrowUp\""));
        assert!(!json.contains("revision"));
    }
}
