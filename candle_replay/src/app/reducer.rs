use super::event::*;
use super::state::*;
use crate::debug_hooks;
use crate::ingest::NeutralMarkerPolicy;
use crate::session::Session;
use crate::source::DataSource;
use crate::timefmt;

/// Apply one event. Returns true when something visible changed.
pub fn reduce(state: &mut AppState, ev: AppEvent) -> bool {
    match ev {
        AppEvent::Ui(u) => reduce_ui(state, u),
        AppEvent::Load(l) => reduce_load(state, l),
        AppEvent::Timer(t) => reduce_timer(state, t),
    }
}

fn reduce_ui(state: &mut AppState, ev: UiEvent) -> bool {
    match ev {
        UiEvent::PathEdited { text } => {
            state.path_input = text;
            true
        }
        UiEvent::OpenRequested => {
            match DataSource::parse(&state.path_input) {
                Ok(source) => {
                    if let DataSource::File(path) = &source {
                        state.settings.remember_file(&path.to_string_lossy());
                    }
                    state.queue_load(source);
                }
                Err(err) => state.alert = Some(format!("Cannot open: {err}")),
            }
            true
        }
        UiEvent::CsvDropped { name, text } => {
            apply_csv(state, name, text);
            true
        }
        UiEvent::FromDateEdited { text } => {
            state.from_input = text;
            true
        }
        UiEvent::ToDateEdited { text } => {
            state.to_input = text;
            true
        }
        UiEvent::ReplayRequested { at } => {
            let result = state.replay.start(
                state.session.candles(),
                &state.from_input,
                &state.to_input,
                at,
                &mut state.chart,
            );
            if let Err(err) = result {
                state.alert = Some(err.to_string());
            }
            true
        }
        UiEvent::ReplayStopped => state.replay.cancel(),
        UiEvent::AlertDismissed => state.alert.take().is_some(),

        UiEvent::TickMsChanged { ms } => {
            state.settings.set_tick_ms(ms);
            state.replay.set_tick(state.settings.state().tick());
            true
        }
        UiEvent::ZoomCandlesChanged { candles } => {
            state.settings.set_zoom_candles(candles);
            state.replay.set_zoom(state.settings.state().zoom_candles);
            true
        }
        UiEvent::NeutralMarkersChanged { policy } => {
            if state.settings.state().neutral_markers == policy {
                return false;
            }
            state.settings.set_neutral_markers(policy);
            if let Some(last) = state.last_csv.take() {
                apply_csv(state, last.source, last.text);
            }
            state.status = format!("Neutral markers: {}", describe_policy(policy));
            true
        }
        UiEvent::ChartHeightChanged { height } => {
            state.settings.set_chart_height(height);
            true
        }
        UiEvent::AutoLoadEdited { text } => {
            state.settings.set_auto_load(text.clone());
            state.auto_load_input = text;
            true
        }
        UiEvent::ExportRequested => {
            state.status = match export_chart(state) {
                Ok(path) => format!("Chart exported: {}", path.display()),
                Err(err) => format!("Export failed: {err}"),
            };
            true
        }
    }
}

fn reduce_load(state: &mut AppState, ev: LoadEvent) -> bool {
    match ev {
        LoadEvent::Loaded { source, text } => {
            apply_csv(state, source, text);
            true
        }
        LoadEvent::Failed { source, error } => {
            debug_hooks::log_load_failed(&source, &error);
            state.loading = false;
            state.status = format!("Load failed: {error}");
            true
        }
    }
}

fn reduce_timer(state: &mut AppState, ev: TimerEvent) -> bool {
    match ev {
        TimerEvent::Frame { now } => {
            let was_active = state.replay.is_active();
            let emitted = state.replay.poll(now, &mut state.chart);
            emitted > 0 || was_active != state.replay.is_active()
        }
    }
}

/// Parse and render a fresh CSV, replacing whatever was there.
fn apply_csv(state: &mut AppState, source: String, text: String) {
    state.replay.cancel();

    let opts = state.settings.state().ingest_options();
    let session = Session::from_csv(source.clone(), &text, &opts);
    // fit everything until a replay narrows the view
    state.chart.visible = None;
    session.render_into(&mut state.chart);

    if let Some((first, last)) = session.time_span() {
        state.from_input = timefmt::format_date_field(first);
        state.to_input = timefmt::format_date_field(last);
    }

    state.status = session.summary();
    state.loading = false;
    state.session = session;
    state.last_csv = Some(LoadedCsv { source, text });
}

fn export_chart(state: &AppState) -> anyhow::Result<std::path::PathBuf> {
    std::fs::create_dir_all(&state.export_dir)?;
    let path = state.export_dir.join(EXPORT_FILE);
    std::fs::write(&path, state.chart.to_json()?)?;
    Ok(path)
}

fn describe_policy(policy: NeutralMarkerPolicy) -> &'static str {
    match policy {
        NeutralMarkerPolicy::InBar => "in-bar circle",
        NeutralMarkerPolicy::Omit => "hidden",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MarkerShape;
    use crate::replay::ReplayState;
    use crate::settings::SettingsManager;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    const CSV: &str = "timestamp,open,high,low,close,direction,Buy_Area,Sell_Area\n\
                       2023-12-20,10,12,9,11,LONG,[9,10],\n\
                       2023-12-21,11,13,10,12,,,\n\
                       2023-12-22,12,14,11,13,SHORT,,[14,15,16]\n\
                       2023-12-23,13,15,12,14,flat,[],oops\n\
                       2023-12-24,bad,15,12,14,LONG,,\n";

    fn fresh() -> (AppState, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let mut state = AppState::new(SettingsManager::new(dir.path().to_path_buf()));
        state.export_dir = dir.path().join("export");
        (state, dir)
    }

    fn load(state: &mut AppState) {
        reduce(
            state,
            AppEvent::Load(LoadEvent::Loaded {
                source: "prices.csv".to_string(),
                text: CSV.to_string(),
            }),
        );
    }

    fn frame(state: &mut AppState, at: Instant) -> bool {
        reduce(state, AppEvent::Timer(TimerEvent::Frame { now: at }))
    }

    #[test]
    fn load_renders_and_prefills_dates() {
        let (mut state, _dir) = fresh();
        load(&mut state);

        assert_eq!(state.chart.data.len(), 4);
        assert_eq!(state.chart.markers.len(), 4);
        assert_eq!(state.chart.price_lines.len(), 4);
        assert_eq!(state.chart.visible, None);
        assert!(!state.from_input.is_empty());
        assert!(!state.to_input.is_empty());
        assert_eq!(state.status, "prices.csv: 4 candles, 4 markers, 2 bands (1 rows dropped)");
        assert!(!state.loading);
    }

    #[test]
    fn failed_load_keeps_chart() {
        let (mut state, _dir) = fresh();
        load(&mut state);
        reduce(
            &mut state,
            AppEvent::Load(LoadEvent::Failed {
                source: "http://x/y.csv".to_string(),
                error: "HTTP 404".to_string(),
            }),
        );
        assert_eq!(state.chart.data.len(), 4);
        assert!(state.status.contains("HTTP 404"));
        assert!(state.alert.is_none());
    }

    #[test]
    fn replay_without_dates_alerts() {
        let (mut state, _dir) = fresh();
        load(&mut state);
        state.from_input.clear();
        let before = state.chart.revision;

        reduce(&mut state, AppEvent::Ui(UiEvent::ReplayRequested { at: Instant::now() }));

        assert_eq!(state.alert.as_deref(), Some("Please select both From and To dates"));
        assert_eq!(state.chart.revision, before);
        assert_eq!(state.replay.state(), ReplayState::Idle);

        assert!(reduce(&mut state, AppEvent::Ui(UiEvent::AlertDismissed)));
        assert!(state.alert.is_none());
        assert!(!reduce(&mut state, AppEvent::Ui(UiEvent::AlertDismissed)));
    }

    #[test]
    fn replay_with_empty_range_alerts() {
        let (mut state, _dir) = fresh();
        load(&mut state);
        state.from_input = "2024-01-05".to_string();
        state.to_input = "2024-01-01".to_string();

        reduce(&mut state, AppEvent::Ui(UiEvent::ReplayRequested { at: Instant::now() }));

        assert_eq!(state.alert.as_deref(), Some("No data found in selected date range."));
        assert_eq!(state.chart.data.len(), 4);
        assert!(!state.replay.is_active());
    }

    #[test]
    fn replay_plays_through_frames() {
        let (mut state, _dir) = fresh();
        load(&mut state);
        let t0 = Instant::now();

        reduce(&mut state, AppEvent::Ui(UiEvent::ReplayRequested { at: t0 }));
        assert!(state.alert.is_none());
        assert!(state.chart.data.is_empty());
        assert_eq!(state.replay_status(), "Starting (0/4)");

        assert!(!frame(&mut state, t0 + Duration::from_millis(50)));
        assert!(frame(&mut state, t0 + Duration::from_millis(250)));
        assert_eq!(state.chart.data.len(), 2);
        assert_eq!(state.replay_status(), "Playing (2/4)");

        assert!(frame(&mut state, t0 + Duration::from_secs(1)));
        assert_eq!(state.chart.data, state.session.candles().to_vec());
        assert_eq!(state.replay_status(), "Idle");
        assert!(!frame(&mut state, t0 + Duration::from_secs(2)));
    }

    #[test]
    fn new_load_cancels_running_replay() {
        let (mut state, _dir) = fresh();
        load(&mut state);
        let t0 = Instant::now();
        reduce(&mut state, AppEvent::Ui(UiEvent::ReplayRequested { at: t0 }));
        frame(&mut state, t0 + Duration::from_millis(100));

        load(&mut state);
        assert!(!state.replay.is_active());
        frame(&mut state, t0 + Duration::from_secs(5));
        assert_eq!(state.chart.data.len(), 4);
    }

    #[test]
    fn stop_button_cancels() {
        let (mut state, _dir) = fresh();
        load(&mut state);
        reduce(&mut state, AppEvent::Ui(UiEvent::ReplayRequested { at: Instant::now() }));
        assert!(reduce(&mut state, AppEvent::Ui(UiEvent::ReplayStopped)));
        assert!(!reduce(&mut state, AppEvent::Ui(UiEvent::ReplayStopped)));
    }

    #[test]
    fn neutral_policy_reingests_and_persists() {
        let (mut state, dir) = fresh();
        load(&mut state);

        let changed = reduce(
            &mut state,
            AppEvent::Ui(UiEvent::NeutralMarkersChanged {
                policy: NeutralMarkerPolicy::Omit,
            }),
        );
        assert!(changed);
        assert_eq!(state.chart.markers.len(), 2);
        assert!(state.chart.markers.iter().all(|m| m.shape != MarkerShape::Circle));

        let reloaded = SettingsManager::new(dir.path().to_path_buf());
        assert_eq!(reloaded.state().neutral_markers, NeutralMarkerPolicy::Omit);

        let again = reduce(
            &mut state,
            AppEvent::Ui(UiEvent::NeutralMarkersChanged {
                policy: NeutralMarkerPolicy::Omit,
            }),
        );
        assert!(!again);
    }

    #[test]
    fn open_queues_load_and_remembers_path() {
        let (mut state, dir) = fresh();
        reduce(&mut state, AppEvent::Ui(UiEvent::PathEdited { text: " /data/a.csv ".to_string() }));
        reduce(&mut state, AppEvent::Ui(UiEvent::OpenRequested));

        assert!(state.loading);
        assert_eq!(
            state.take_pending_load(),
            Some(DataSource::File("/data/a.csv".into()))
        );
        assert_eq!(state.take_pending_load(), None);
        let reloaded = SettingsManager::new(dir.path().to_path_buf());
        assert_eq!(reloaded.state().last_file, "/data/a.csv");
    }

    #[test]
    fn open_with_empty_path_alerts() {
        let (mut state, _dir) = fresh();
        reduce(&mut state, AppEvent::Ui(UiEvent::OpenRequested));
        assert!(state.alert.is_some());
        assert_eq!(state.take_pending_load(), None);
    }

    #[test]
    fn dropped_csv_is_applied_directly() {
        let (mut state, _dir) = fresh();
        reduce(
            &mut state,
            AppEvent::Ui(UiEvent::CsvDropped {
                name: "drop.csv".to_string(),
                text: CSV.to_string(),
            }),
        );
        assert_eq!(state.session.source(), "drop.csv");
        assert_eq!(state.chart.data.len(), 4);
    }

    #[test]
    fn tick_and_zoom_settings_feed_the_driver() {
        let (mut state, _dir) = fresh();
        load(&mut state);
        reduce(&mut state, AppEvent::Ui(UiEvent::TickMsChanged { ms: 500 }));
        reduce(&mut state, AppEvent::Ui(UiEvent::ZoomCandlesChanged { candles: 2 }));
        assert_eq!(state.replay.tick(), Duration::from_millis(500));

        let t0 = Instant::now();
        reduce(&mut state, AppEvent::Ui(UiEvent::ReplayRequested { at: t0 }));
        let window = state.chart.visible.unwrap();
        assert_eq!(window.from, state.session.candles()[2].time);

        frame(&mut state, t0 + Duration::from_millis(499));
        assert!(state.chart.data.is_empty());
        frame(&mut state, t0 + Duration::from_millis(500));
        assert_eq!(state.chart.data.len(), 1);
    }

    #[test]
    fn export_writes_chart_json() {
        let (mut state, _dir) = fresh();
        load(&mut state);
        reduce(&mut state, AppEvent::Ui(UiEvent::ExportRequested));

        let path = state.export_dir.join(EXPORT_FILE);
        let json = std::fs::read_to_string(&path).unwrap();
        assert!(json.contains("\"price_lines\""));
        assert!(state.status.starts_with("Chart exported"));
    }
}
