use std::time::Instant;

use crate::ingest::NeutralMarkerPolicy;

#[derive(Debug, Clone)]
pub enum AppEvent {
    Ui(UiEvent),
    Load(LoadEvent),
    Timer(TimerEvent),
}

#[derive(Debug, Clone)]
pub enum UiEvent {
    PathEdited { text: String },
    OpenRequested,
    /// Dropped onto the window with its bytes already in hand.
    CsvDropped { name: String, text: String },

    FromDateEdited { text: String },
    ToDateEdited { text: String },
    ReplayRequested { at: Instant },
    ReplayStopped,
    AlertDismissed,

    TickMsChanged { ms: u64 },
    ZoomCandlesChanged { candles: usize },
    NeutralMarkersChanged { policy: NeutralMarkerPolicy },
    ChartHeightChanged { height: f32 },
    AutoLoadEdited { text: String },
    ExportRequested,
}

#[derive(Debug, Clone)]
pub enum LoadEvent {
    Loaded { source: String, text: String },
    Failed { source: String, error: String },
}

#[derive(Debug, Clone)]
pub enum TimerEvent {
    Frame { now: Instant },
}
