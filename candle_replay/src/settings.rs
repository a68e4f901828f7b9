use std::fs::{create_dir_all, File};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::debug_hooks;
use crate::ingest::{IngestOptions, NeutralMarkerPolicy};
use crate::replay::{DEFAULT_TICK, DEFAULT_ZOOM_CANDLES};

pub const SETTINGS_FILE: &str = "settings.conf";

const TICK_MS_RANGE: (u64, u64) = (10, 5_000);
const CHART_HEIGHT_RANGE: (f32, f32) = (150.0, 4_000.0);

/// Platform data dir, falling back to `./data`.
pub fn data_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "candle_replay")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("data"))
}

#[derive(Clone, Debug, PartialEq)]
pub struct SettingsState {
    pub tick_ms: u64,
    pub zoom_candles: usize,
    pub neutral_markers: NeutralMarkerPolicy,
    pub chart_height: f32,
    /// Path or http(s) URL loaded at startup. Empty = off.
    pub auto_load: String,
    pub last_file: String,
}

impl Default for SettingsState {
    fn default() -> Self {
        Self {
            tick_ms: DEFAULT_TICK.as_millis() as u64,
            zoom_candles: DEFAULT_ZOOM_CANDLES,
            neutral_markers: NeutralMarkerPolicy::InBar,
            chart_height: 500.0,
            auto_load: String::new(),
            last_file: String::new(),
        }
    }
}

impl SettingsState {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn ingest_options(&self) -> IngestOptions {
        IngestOptions {
            neutral_markers: self.neutral_markers,
        }
    }
}

pub struct SettingsManager {
    base_dir: PathBuf,
    cfg_path: PathBuf,
    state: SettingsState,
}

impl SettingsManager {
    pub fn new(base_dir: PathBuf) -> Self {
        let cfg_path = base_dir.join(SETTINGS_FILE);
        let mut mgr = Self {
            base_dir,
            cfg_path,
            state: SettingsState::default(),
        };
        mgr.load_from_disk();
        mgr
    }

    pub fn state(&self) -> &SettingsState {
        &self.state
    }

    pub fn path(&self) -> &Path {
        &self.cfg_path
    }

    pub fn set_tick_ms(&mut self, ms: u64) {
        self.state.tick_ms = ms.clamp(TICK_MS_RANGE.0, TICK_MS_RANGE.1);
        self.save_to_disk();
    }

    pub fn set_zoom_candles(&mut self, n: usize) {
        self.state.zoom_candles = n.max(1);
        self.save_to_disk();
    }

    pub fn set_neutral_markers(&mut self, policy: NeutralMarkerPolicy) {
        self.state.neutral_markers = policy;
        self.save_to_disk();
    }

    pub fn set_chart_height(&mut self, h: f32) {
        self.state.chart_height = h.clamp(CHART_HEIGHT_RANGE.0, CHART_HEIGHT_RANGE.1);
        self.save_to_disk();
    }

    pub fn set_auto_load(&mut self, source: String) {
        self.state.auto_load = source.trim().to_string();
        self.save_to_disk();
    }

    pub fn remember_file(&mut self, path: &str) {
        self.state.last_file = path.trim().to_string();
        self.save_to_disk();
    }

    fn load_from_disk(&mut self) {
        if !self.cfg_path.exists() {
            return;
        }
        let f = match File::open(&self.cfg_path) {
            Ok(f) => f,
            Err(e) => {
                debug_hooks::log_settings_io("open", &self.cfg_path, &e);
                return;
            }
        };
        let reader = BufReader::new(f);

        for line in reader.lines().map_while(Result::ok) {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((k, v)) = line.split_once('=') else { continue; };
            let k = k.trim();
            let v = v.trim();

            match k {
                "tick_ms" => {
                    if let Ok(n) = v.parse::<u64>() {
                        self.state.tick_ms = n.clamp(TICK_MS_RANGE.0, TICK_MS_RANGE.1);
                    }
                }
                "zoom_candles" => {
                    if let Ok(n) = v.parse::<usize>() {
                        self.state.zoom_candles = n.max(1);
                    }
                }
                "neutral_markers" => self.state.neutral_markers = NeutralMarkerPolicy::from_config(v),
                "chart_height" => {
                    if let Ok(h) = v.parse::<f32>() {
                        if h.is_finite() {
                            self.state.chart_height = h.clamp(CHART_HEIGHT_RANGE.0, CHART_HEIGHT_RANGE.1);
                        }
                    }
                }
                "auto_load" => self.state.auto_load = v.to_string(),
                "last_file" => self.state.last_file = v.to_string(),
                _ => {}
            }
        }
    }

    fn save_to_disk(&self) {
        if let Err(e) = create_dir_all(&self.base_dir) {
            debug_hooks::log_settings_io("create dir", &self.base_dir, &e);
            return;
        }

        let tmp = self.base_dir.join(format!("{SETTINGS_FILE}.tmp"));
        let result = File::create(&tmp).and_then(|mut f| {
            writeln!(f, "# candle_replay settings")?;
            writeln!(f, "tick_ms={}", self.state.tick_ms)?;
            writeln!(f, "zoom_candles={}", self.state.zoom_candles)?;
            writeln!(f, "neutral_markers={}", self.state.neutral_markers.as_str())?;
            writeln!(f, "chart_height={}", self.state.chart_height)?;
            writeln!(f, "auto_load={}", self.state.auto_load)?;
            writeln!(f, "last_file={}", self.state.last_file)?;
            f.flush()
        });
        if let Err(e) = result {
            debug_hooks::log_settings_io("write", &tmp, &e);
            return;
        }

        if let Err(e) = std::fs::rename(&tmp, &self.cfg_path) {
            debug_hooks::log_settings_io("rename", &self.cfg_path, &e);
        }
    }
}
