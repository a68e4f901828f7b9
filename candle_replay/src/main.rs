use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

use candle_replay::app::{AppEvent, AppRuntime, AppState, UiEvent};
use candle_replay::gui::ReplayWindow;
use candle_replay::settings::{self, SettingsManager};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = SettingsManager::new(settings::data_dir());
    tracing::info!(path = %settings.path().display(), "settings");

    // a path or URL on the command line takes precedence over auto_load
    let initial = std::env::args().nth(1);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 760.0])
            .with_drag_and_drop(true),
        ..Default::default()
    };

    eframe::run_native(
        "Candle Replay",
        options,
        Box::new(move |cc| {
            let mut rt = AppRuntime::new(AppState::new(settings));
            let ctx = cc.egui_ctx.clone();
            rt.set_waker(move || ctx.request_repaint());

            match initial {
                Some(source) => {
                    rt.handle_event(AppEvent::Ui(UiEvent::PathEdited { text: source }));
                    rt.handle_event(AppEvent::Ui(UiEvent::OpenRequested));
                }
                None => rt.boot(),
            }

            Box::new(ReplayWindow::new(rt))
        }),
    )
    .map_err(|e| anyhow!("eframe error: {e}"))
}
