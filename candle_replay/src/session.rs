use crate::chart::{ChartSink, PriceLine};
use crate::ingest::{self, IngestOptions, IngestStats, ParsedFrame};
use crate::model::{Band, Candle, Marker};

/// Everything parsed from the most recent load. Replaced wholesale on the
/// next one.
#[derive(Clone, Debug, Default)]
pub struct Session {
    source: String,
    frame: ParsedFrame,
}

impl Session {
    pub fn from_csv(source: impl Into<String>, text: &str, opts: &IngestOptions) -> Self {
        Self {
            source: source.into(),
            frame: ingest::ingest_csv(text, opts),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn candles(&self) -> &[Candle] {
        &self.frame.candles
    }

    pub fn markers(&self) -> &[Marker] {
        &self.frame.markers
    }

    pub fn bands(&self) -> &[Band] {
        &self.frame.bands
    }

    pub fn stats(&self) -> &IngestStats {
        &self.frame.stats
    }

    pub fn time_span(&self) -> Option<(i64, i64)> {
        let first = self.frame.candles.first()?;
        let last = self.frame.candles.last()?;
        Some((first.time, last.time))
    }

    /// Full render: candles, markers, then two price lines per band.
    pub fn render_into<S: ChartSink + ?Sized>(&self, chart: &mut S) {
        chart.set_data(&self.frame.candles);
        chart.set_markers(&self.frame.markers);
        chart.clear_price_lines();
        for band in &self.frame.bands {
            for line in PriceLine::edges_of(band) {
                chart.add_price_line(line);
            }
        }
    }

    pub fn summary(&self) -> String {
        let s = &self.frame.stats;
        let mut out = format!(
            "{}: {} candles, {} markers, {} bands",
            self.source,
            s.kept,
            self.frame.markers.len(),
            self.frame.bands.len()
        );
        if s.dropped() > 0 {
            out.push_str(&format!(" ({} rows dropped)", s.dropped()));
        }
        out
    }
}
