use std::collections::HashMap;
use std::time::Instant;

use egui::Color32;
use egui_plot::{HLine, Line, MarkerShape as PlotShape, Plot, PlotBounds, PlotPoint, PlotPoints, PlotUi, Points, Text};

use crate::app::{AppEvent, AppRuntime, AppState, UiEvent};
use crate::chart::ChartModel;
use crate::ingest::NeutralMarkerPolicy;
use crate::model::{Candle, Marker, MarkerPosition, MarkerShape, Rgba};
use crate::timefmt;

const BACKGROUND: Color32 = Color32::BLACK;
const UP: Color32 = Color32::from_rgb(0x26, 0xa6, 0x9a);
const DOWN: Color32 = Color32::from_rgb(0xef, 0x53, 0x50);

pub struct ReplayWindow {
    rt: AppRuntime,
    fitted_revision: Option<u64>,
}

impl ReplayWindow {
    pub fn new(rt: AppRuntime) -> Self {
        Self {
            rt,
            fitted_revision: None,
        }
    }

    fn ui_chart(&mut self, ui: &mut egui::Ui) {
        let state = &self.rt.state;
        let chart = &state.chart;

        if chart.is_empty() && !state.replay.is_active() {
            ui.heading("No data loaded.");
            ui.label("Enter a CSV path or http(s) URL above, or drop a .csv file onto the window.");
            return;
        }

        // re-fit only when the model changed so the user can still pan/zoom
        let fit = if self.fitted_revision != Some(chart.revision) {
            self.fitted_revision = Some(chart.revision);
            fit_bounds(chart)
        } else {
            None
        };

        let height = state.settings.state().chart_height;
        let spacing = chart.bar_spacing() as f64;

        ui.scope(|ui| {
            let visuals = ui.visuals_mut();
            visuals.extreme_bg_color = BACKGROUND;
            visuals.override_text_color = Some(Color32::WHITE);

            Plot::new("candles")
                .height(height)
                .allow_drag(true)
                .allow_zoom(true)
                .allow_scroll(true)
                .x_axis_formatter(|mark, _max_chars, _range| timefmt::format_ts_local(mark.value as i64))
                .label_formatter(|_name, p| {
                    format!("{}\n{:.4}", timefmt::format_ts_local(p.x as i64), p.y)
                })
                .show(ui, |plot_ui| {
                    if let Some(bounds) = fit {
                        plot_ui.set_plot_bounds(bounds);
                    }
                    draw_candles(plot_ui, &chart.data, spacing);
                    draw_markers(plot_ui, chart);
                    for line in &chart.price_lines {
                        plot_ui.hline(
                            HLine::new(line.price)
                                .color(to_color32(line.color))
                                .width(line.line_width.max(1.0)),
                        );
                    }
                });
        });
    }
}

impl eframe::App for ReplayWindow {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.rt.drain_events();
        for ev in dropped_file_events(ctx) {
            self.rt.handle_event(AppEvent::Ui(ev));
        }
        self.rt.tick(Instant::now());

        let mut events = Vec::new();

        egui::TopBottomPanel::top("controls").show(ctx, |ui| {
            ui_controls(ui, &self.rt.state, &mut events);
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.ui_chart(ui);
        });

        if let Some(msg) = &self.rt.state.alert {
            ui_alert(ctx, msg, &mut events);
        }

        for ev in events {
            self.rt.handle_event(AppEvent::Ui(ev));
        }

        if self.rt.take_dirty() {
            ctx.request_repaint();
        }
        if let Some(due) = self.rt.next_wakeup() {
            ctx.request_repaint_after(due.saturating_duration_since(Instant::now()));
        }
    }
}

fn dropped_file_events(ctx: &egui::Context) -> Vec<UiEvent> {
    let dropped = ctx.input(|i| i.raw.dropped_files.clone());
    let mut out = Vec::new();
    for file in dropped {
        if let Some(bytes) = file.bytes {
            out.push(UiEvent::CsvDropped {
                name: file.name.clone(),
                text: String::from_utf8_lossy(&bytes).into_owned(),
            });
        } else if let Some(path) = file.path {
            out.push(UiEvent::PathEdited {
                text: path.to_string_lossy().into_owned(),
            });
            out.push(UiEvent::OpenRequested);
        }
    }
    out
}

fn ui_controls(ui: &mut egui::Ui, state: &AppState, events: &mut Vec<UiEvent>) {
    ui.horizontal(|ui| {
        ui.label("CSV:");
        let mut path = state.path_input.clone();
        let resp = ui.add(
            egui::TextEdit::singleline(&mut path)
                .hint_text("file path or http(s) URL")
                .desired_width(320.0),
        );
        let submitted = resp.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
        if resp.changed() {
            events.push(UiEvent::PathEdited { text: path });
        }
        if ui.add_enabled(!state.loading, egui::Button::new("Load")).clicked() || submitted {
            events.push(UiEvent::OpenRequested);
        }
        if state.loading {
            ui.spinner();
        }

        ui.separator();

        ui.label("From:");
        let mut from = state.from_input.clone();
        if ui
            .add(egui::TextEdit::singleline(&mut from).desired_width(150.0))
            .changed()
        {
            events.push(UiEvent::FromDateEdited { text: from });
        }
        ui.label("To:");
        let mut to = state.to_input.clone();
        if ui
            .add(egui::TextEdit::singleline(&mut to).desired_width(150.0))
            .changed()
        {
            events.push(UiEvent::ToDateEdited { text: to });
        }

        if ui.button("Replay").clicked() {
            events.push(UiEvent::ReplayRequested { at: Instant::now() });
        }
        if ui
            .add_enabled(state.replay.is_active(), egui::Button::new("Stop"))
            .clicked()
        {
            events.push(UiEvent::ReplayStopped);
        }
        ui.label(state.replay_status());
    });

    ui.label(&state.status);

    ui.collapsing("Settings", |ui| ui_settings(ui, state, events));
}

fn ui_settings(ui: &mut egui::Ui, state: &AppState, events: &mut Vec<UiEvent>) {
    let s = state.settings.state();

    ui.horizontal(|ui| {
        ui.label("Tick:");
        let mut ms = s.tick_ms;
        if ui
            .add(egui::DragValue::new(&mut ms).clamp_range(10..=5_000).suffix(" ms"))
            .changed()
        {
            events.push(UiEvent::TickMsChanged { ms });
        }

        ui.separator();
        ui.label("Replay window:");
        let mut candles = s.zoom_candles;
        if ui
            .add(egui::DragValue::new(&mut candles).clamp_range(1..=1_000).suffix(" candles"))
            .changed()
        {
            events.push(UiEvent::ZoomCandlesChanged { candles });
        }

        ui.separator();
        ui.label("Other directions:");
        let mut policy = s.neutral_markers;
        egui::ComboBox::from_id_source("neutral_markers")
            .selected_text(policy_label(policy))
            .show_ui(ui, |ui| {
                for p in [NeutralMarkerPolicy::InBar, NeutralMarkerPolicy::Omit] {
                    ui.selectable_value(&mut policy, p, policy_label(p));
                }
            });
        if policy != s.neutral_markers {
            events.push(UiEvent::NeutralMarkersChanged { policy });
        }

        ui.separator();
        ui.label("Chart height:");
        let mut height = s.chart_height;
        if ui.add(egui::Slider::new(&mut height, 150.0..=1_500.0)).changed() {
            events.push(UiEvent::ChartHeightChanged { height });
        }
    });

    ui.horizontal(|ui| {
        ui.label("Auto-load on start:");
        let mut auto = state.auto_load_input.clone();
        if ui
            .add(
                egui::TextEdit::singleline(&mut auto)
                    .hint_text("empty = off")
                    .desired_width(320.0),
            )
            .changed()
        {
            events.push(UiEvent::AutoLoadEdited { text: auto });
        }

        ui.separator();
        if ui.button("Export chart JSON").clicked() {
            events.push(UiEvent::ExportRequested);
        }
        ui.weak(state.settings.path().display().to_string());
    });
}

fn ui_alert(ctx: &egui::Context, msg: &str, events: &mut Vec<UiEvent>) {
    egui::Window::new("Notice")
        .collapsible(false)
        .resizable(false)
        .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
        .show(ctx, |ui| {
            ui.label(msg);
            if ui.button("OK").clicked() {
                events.push(UiEvent::AlertDismissed);
            }
        });
}

fn policy_label(policy: NeutralMarkerPolicy) -> &'static str {
    match policy {
        NeutralMarkerPolicy::InBar => "orange circle",
        NeutralMarkerPolicy::Omit => "no marker",
    }
}

fn draw_candles(plot_ui: &mut PlotUi, candles: &[Candle], spacing: f64) {
    let half = spacing * 0.4;
    for c in candles {
        let x = c.time as f64;
        let top = c.open.max(c.close);
        let bot = c.open.min(c.close);
        let color = if c.is_up() { UP } else { DOWN };

        let wick: PlotPoints = vec![[x, c.low], [x, c.high]].into();
        plot_ui.line(Line::new(wick).color(color));

        let body: PlotPoints = vec![
            [x - half, bot],
            [x - half, top],
            [x + half, top],
            [x + half, bot],
            [x - half, bot],
        ]
        .into();
        plot_ui.line(Line::new(body).color(color).width(2.0));
    }
}

fn draw_markers(plot_ui: &mut PlotUi, chart: &ChartModel) {
    // markers for bars not on the chart yet (mid-replay) are hidden
    let by_time: HashMap<i64, &Candle> = chart.data.iter().map(|c| (c.time, c)).collect();
    let pad = marker_pad(&chart.data);

    for m in &chart.markers {
        let Some(c) = by_time.get(&m.time) else {
            continue;
        };
        let x = m.time as f64;
        let y = marker_anchor(m, c, pad);
        let color = to_color32(m.color);

        plot_ui.points(
            Points::new(vec![[x, y]])
                .shape(plot_shape(m.shape))
                .color(color)
                .filled(true)
                .radius(5.0),
        );
        let label_y = match m.position {
            MarkerPosition::BelowBar => y - pad,
            MarkerPosition::AboveBar | MarkerPosition::InBar => y + pad,
        };
        plot_ui.text(Text::new(PlotPoint::new(x, label_y), m.text.as_str()).color(color));
    }
}

fn plot_shape(shape: MarkerShape) -> PlotShape {
    match shape {
        MarkerShape::ArrowUp => PlotShape::Up,
        MarkerShape::ArrowDown => PlotShape::Down,
        MarkerShape::Circle => PlotShape::Circle,
    }
}

fn marker_pad(candles: &[Candle]) -> f64 {
    let lo = candles.iter().map(|c| c.low).fold(f64::MAX, f64::min);
    let hi = candles.iter().map(|c| c.high).fold(f64::MIN, f64::max);
    let span = hi - lo;
    if span.is_finite() && span > 0.0 {
        span * 0.03
    } else {
        1.0
    }
}

fn marker_anchor(marker: &Marker, candle: &Candle, pad: f64) -> f64 {
    match marker.position {
        MarkerPosition::BelowBar => candle.low - pad,
        MarkerPosition::AboveBar => candle.high + pad,
        MarkerPosition::InBar => (candle.open + candle.close) * 0.5,
    }
}

fn to_color32(c: Rgba) -> Color32 {
    let a = (c.a.clamp(0.0, 1.0) * 255.0).round() as u8;
    Color32::from_rgba_unmultiplied(c.r, c.g, c.b, a)
}

/// Bounds for the visible window, or for all data when none is set.
fn fit_bounds(chart: &ChartModel) -> Option<PlotBounds> {
    let (x0, x1) = match chart.visible {
        Some(r) => (r.from as f64, r.to as f64),
        None => {
            let first = chart.data.iter().map(|c| c.time).min()?;
            let last = chart.data.iter().map(|c| c.time).max()?;
            (first as f64, last as f64)
        }
    };
    let (lo, hi) = chart
        .price_bounds(chart.visible)
        .or_else(|| chart.price_bounds(None))?;

    let spacing = chart.bar_spacing() as f64;
    let pad = (hi - lo).max(1e-3) * 0.05;
    Some(PlotBounds::from_min_max(
        [x0 - spacing, lo - pad],
        [x1 + spacing, hi + pad],
    ))
}
