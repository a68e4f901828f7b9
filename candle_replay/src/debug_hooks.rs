//! Topic-tagged log helpers.
//!
//! Summaries always go to `tracing`. Per-row and per-tick lines are noisy and
//! only emitted when `CANDLE_REPLAY_DEBUG_HOOKS` is set to something other
//! than `0`/`false`.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::Duration;

use crate::ingest::IngestStats;
use crate::model::TimeRange;
use crate::replay::ReplayError;

pub const ENV_VAR: &str = "CANDLE_REPLAY_DEBUG_HOOKS";

static ENABLED: OnceLock<bool> = OnceLock::new();

fn hooks_enabled() -> bool {
    *ENABLED.get_or_init(|| {
        std::env::var(ENV_VAR)
            .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
            .unwrap_or(false)
    })
}

fn log_line(topic: &str, msg: impl AsRef<str>) {
    if !hooks_enabled() {
        return;
    }
    tracing::debug!(topic, "{}", msg.as_ref());
}

pub fn log_row_skip(line_no: usize, reason: &str, line: &str) {
    log_line("ingest.row", format!("line {line_no} dropped ({reason}): {line:?}"));
}

pub fn log_area_skip(line_no: usize, column: &str, reason: &str) {
    log_line("ingest.area", format!("line {line_no} {column} ignored: {reason}"));
}

pub fn log_ingest_summary(stats: &IngestStats, markers: usize, bands: usize) {
    tracing::info!(
        rows = stats.rows,
        kept = stats.kept,
        bad_price = stats.bad_price,
        bad_timestamp = stats.bad_timestamp,
        malformed_areas = stats.malformed_areas,
        markers,
        bands,
        "csv ingested"
    );
}

pub fn log_load_start(source: &str) {
    tracing::info!(source, "loading csv");
}

pub fn log_load_failed(source: &str, err: &dyn std::fmt::Display) {
    tracing::warn!(source, "load failed: {err}");
}

pub fn log_settings_io(action: &str, path: &Path, err: &dyn std::fmt::Display) {
    tracing::warn!(path = %path.display(), "[settings] {action} failed: {err}");
}

pub fn log_replay_start(id: u64, records: usize, window: TimeRange, tick: Duration) {
    tracing::info!(
        id,
        records,
        window_from = window.from,
        window_to = window.to,
        tick_ms = tick.as_millis() as u64,
        "replay started"
    );
}

pub fn log_replay_tick(id: u64, cursor: usize, time: i64) {
    static COUNT: AtomicU64 = AtomicU64::new(0);
    let n = COUNT.fetch_add(1, Ordering::Relaxed) + 1;
    if n <= 20 || n % 100 == 0 {
        log_line("replay.tick", format!("replay #{id} tick {cursor} time={time}"));
    }
}

pub fn log_replay_done(id: u64, total: usize) {
    tracing::info!(id, total, "replay finished");
}

pub fn log_replay_cancel(id: u64, cursor: usize, total: usize) {
    tracing::info!(id, cursor, total, "replay cancelled");
}

pub fn log_replay_rejected(err: &ReplayError) {
    tracing::debug!("replay rejected: {err}");
}
