use std::path::PathBuf;

use crate::chart::ChartModel;
use crate::replay::{ReplayDriver, ReplayState};
use crate::session::Session;
use crate::settings::{self, SettingsManager};
use crate::source::DataSource;

pub const EXPORT_FILE: &str = "chart_export.json";

/// Raw text of the last load, kept so a settings change can re-ingest it.
#[derive(Debug, Clone)]
pub struct LoadedCsv {
    pub source: String,
    pub text: String,
}

pub struct AppState {
    pub settings: SettingsManager,
    pub session: Session,
    pub chart: ChartModel,
    pub replay: ReplayDriver,
    pub last_csv: Option<LoadedCsv>,

    pub path_input: String,
    pub from_input: String,
    pub to_input: String,
    pub auto_load_input: String,

    pub status: String,
    /// Blocking notice shown until dismissed.
    pub alert: Option<String>,
    pub loading: bool,
    pending_load: Option<DataSource>,

    pub export_dir: PathBuf,
}

impl AppState {
    pub fn new(settings: SettingsManager) -> Self {
        let s = settings.state().clone();
        Self {
            replay: ReplayDriver::new(s.tick(), s.zoom_candles),
            settings,
            session: Session::default(),
            chart: ChartModel::new(),
            last_csv: None,

            path_input: s.last_file.clone(),
            from_input: String::new(),
            to_input: String::new(),
            auto_load_input: s.auto_load.clone(),

            status: "No data loaded.".to_string(),
            alert: None,
            loading: false,
            pending_load: None,

            export_dir: settings::data_dir(),
        }
    }

    pub fn queue_load(&mut self, source: DataSource) {
        self.status = format!("Loading {source}...");
        self.loading = true;
        self.pending_load = Some(source);
    }

    pub fn take_pending_load(&mut self) -> Option<DataSource> {
        self.pending_load.take()
    }

    pub fn replay_status(&self) -> String {
        match self.replay.state() {
            ReplayState::Idle => "Idle".to_string(),
            ReplayState::Windowed { total } => format!("Starting (0/{total})"),
            ReplayState::Playing { cursor, total } => {
                format!("Playing ({cursor}/{total})")
            }
        }
    }
}
