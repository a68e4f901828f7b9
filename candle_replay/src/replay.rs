//! Time-windowed replay: clear the chart, then feed the selected candles back
//! one per tick.
//!
//! The task is cooperative. Whoever owns the driver calls [`ReplayDriver::poll`]
//! with the current instant (the UI does it every frame); each elapsed tick
//! interval emits exactly one candle, so a late frame catches up instead of
//! dropping bars.

use std::time::{Duration, Instant};

use thiserror::Error;

use crate::chart::ChartSink;
use crate::debug_hooks;
use crate::model::{Candle, TimeRange};
use crate::timefmt;

pub const DEFAULT_TICK: Duration = Duration::from_millis(100);
pub const DEFAULT_ZOOM_CANDLES: usize = 30;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReplayError {
    #[error("Please select both From and To dates")]
    MissingDates,
    #[error("Could not read date {0:?}")]
    InvalidDate(String),
    #[error("No data found in selected date range.")]
    EmptyRange,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplayState {
    Idle,
    /// Visible range set and data cleared, first tick not yet due.
    Windowed { total: usize },
    Playing { cursor: usize, total: usize },
}

#[derive(Clone, Debug, PartialEq)]
pub struct ReplayPlan {
    pub records: Vec<Candle>,
    pub window: TimeRange,
}

/// Select `from <= time <= to` and compute the initial visible window over
/// the last `zoom` of them.
pub fn plan(candles: &[Candle], from: i64, to: i64, zoom: usize) -> Result<ReplayPlan, ReplayError> {
    let records: Vec<Candle> = candles
        .iter()
        .filter(|c| c.time >= from && c.time <= to)
        .copied()
        .collect();

    let Some(last) = records.last() else {
        return Err(ReplayError::EmptyRange);
    };
    let first_visible = records.len().saturating_sub(zoom.max(1));
    let window = TimeRange {
        from: records[first_visible].time,
        to: last.time,
    };

    Ok(ReplayPlan { records, window })
}

/// Resolve the From/To field text to unix seconds.
pub fn parse_range(from_input: &str, to_input: &str) -> Result<(i64, i64), ReplayError> {
    let (from_input, to_input) = (from_input.trim(), to_input.trim());
    if from_input.is_empty() || to_input.is_empty() {
        return Err(ReplayError::MissingDates);
    }
    let from = timefmt::parse_date(from_input)
        .ok_or_else(|| ReplayError::InvalidDate(from_input.to_string()))?;
    let to = timefmt::parse_date(to_input)
        .ok_or_else(|| ReplayError::InvalidDate(to_input.to_string()))?;
    Ok((from, to))
}

/// One running replay. Owns its records and cursor.
#[derive(Debug)]
pub struct ReplayTask {
    id: u64,
    records: Vec<Candle>,
    cursor: usize,
    interval: Duration,
    next_due: Instant,
}

impl ReplayTask {
    fn new(id: u64, records: Vec<Candle>, interval: Duration, started: Instant) -> Self {
        Self {
            id,
            records,
            cursor: 0,
            interval,
            next_due: started + interval,
        }
    }

    pub fn total(&self) -> usize {
        self.records.len()
    }

    pub fn is_finished(&self) -> bool {
        self.cursor >= self.records.len()
    }

    pub fn next_due(&self) -> Instant {
        self.next_due
    }

    /// Emit every tick that has come due by `now`. Returns how many.
    pub fn poll<S: ChartSink + ?Sized>(&mut self, now: Instant, chart: &mut S) -> usize {
        let mut emitted = 0;
        while !self.is_finished() && now >= self.next_due {
            let candle = &self.records[self.cursor];
            chart.update(candle);
            debug_hooks::log_replay_tick(self.id, self.cursor, candle.time);
            self.cursor += 1;
            self.next_due += self.interval;
            emitted += 1;
        }
        emitted
    }
}

#[derive(Debug)]
pub struct ReplayDriver {
    tick: Duration,
    zoom: usize,
    next_id: u64,
    task: Option<ReplayTask>,
}

impl Default for ReplayDriver {
    fn default() -> Self {
        Self::new(DEFAULT_TICK, DEFAULT_ZOOM_CANDLES)
    }
}

impl ReplayDriver {
    pub fn new(tick: Duration, zoom: usize) -> Self {
        Self {
            tick: tick.max(Duration::from_millis(1)),
            zoom: zoom.max(1),
            next_id: 1,
            task: None,
        }
    }

    pub fn set_tick(&mut self, tick: Duration) {
        self.tick = tick.max(Duration::from_millis(1));
    }

    pub fn set_zoom(&mut self, zoom: usize) {
        self.zoom = zoom.max(1);
    }

    pub fn tick(&self) -> Duration {
        self.tick
    }

    pub fn state(&self) -> ReplayState {
        match &self.task {
            None => ReplayState::Idle,
            Some(t) if t.cursor == 0 => ReplayState::Windowed { total: t.total() },
            Some(t) => ReplayState::Playing {
                cursor: t.cursor,
                total: t.total(),
            },
        }
    }

    pub fn is_active(&self) -> bool {
        self.task.is_some()
    }

    pub fn next_due(&self) -> Option<Instant> {
        self.task.as_ref().map(ReplayTask::next_due)
    }

    /// Start from the raw From/To field text.
    pub fn start<S: ChartSink + ?Sized>(
        &mut self,
        candles: &[Candle],
        from_input: &str,
        to_input: &str,
        now: Instant,
        chart: &mut S,
    ) -> Result<(), ReplayError> {
        let (from, to) = parse_range(from_input, to_input).inspect_err(|err| {
            debug_hooks::log_replay_rejected(err);
        })?;
        self.start_range(candles, from, to, now, chart)
    }

    /// Validates first; an invalid request leaves the chart and any running
    /// replay untouched. A valid one cancels the running replay before
    /// touching the chart.
    pub fn start_range<S: ChartSink + ?Sized>(
        &mut self,
        candles: &[Candle],
        from: i64,
        to: i64,
        now: Instant,
        chart: &mut S,
    ) -> Result<(), ReplayError> {
        let plan = plan(candles, from, to, self.zoom).inspect_err(|err| {
            debug_hooks::log_replay_rejected(err);
        })?;

        self.cancel();

        chart.set_visible_range(plan.window);
        chart.set_data(&[]);

        let id = self.next_id;
        self.next_id += 1;
        debug_hooks::log_replay_start(id, plan.records.len(), plan.window, self.tick);
        self.task = Some(ReplayTask::new(id, plan.records, self.tick, now));
        Ok(())
    }

    /// Stop the running replay, if any. Whatever was already emitted stays on
    /// the chart.
    pub fn cancel(&mut self) -> bool {
        match self.task.take() {
            Some(task) => {
                debug_hooks::log_replay_cancel(task.id, task.cursor, task.total());
                true
            }
            None => false,
        }
    }

    pub fn poll<S: ChartSink + ?Sized>(&mut self, now: Instant, chart: &mut S) -> usize {
        let Some(task) = self.task.as_mut() else {
            return 0;
        };
        let emitted = task.poll(now, chart);
        if task.is_finished() {
            debug_hooks::log_replay_done(task.id, task.total());
            self.task = None;
        }
        emitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::{ChartCall, ChartModel, RecordingChart};

    const DAY: i64 = 86_400;
    const BASE: i64 = 1_700_000_000;

    fn candles(n: usize) -> Vec<Candle> {
        (0..n)
            .map(|i| {
                let p = 100.0 + i as f64;
                Candle {
                    time: BASE + i as i64 * DAY,
                    open: p,
                    high: p + 2.0,
                    low: p - 2.0,
                    close: p + 1.0,
                }
            })
            .collect()
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn plan_window_covers_last_zoom_candles() {
        let data = candles(60);
        let plan = plan(&data, data[10].time, data[54].time, 30).unwrap();
        assert_eq!(plan.records.len(), 45);
        assert_eq!(plan.window.from, data[25].time);
        assert_eq!(plan.window.to, data[54].time);
    }

    #[test]
    fn plan_window_shrinks_for_short_ranges() {
        let data = candles(5);
        let plan = plan(&data, i64::MIN, i64::MAX, 30).unwrap();
        assert_eq!(plan.window, TimeRange { from: data[0].time, to: data[4].time });
    }

    #[test]
    fn plan_bounds_are_inclusive() {
        let data = candles(3);
        let plan = plan(&data, data[1].time, data[1].time, 30).unwrap();
        assert_eq!(plan.records, vec![data[1]]);
    }

    #[test]
    fn replay_of_45_emits_each_once_in_order() {
        let data = candles(60);
        let (from, to) = (data[10].time, data[54].time);
        let t0 = Instant::now();
        let mut chart = RecordingChart::default();
        let mut driver = ReplayDriver::default();

        driver.start_range(&data, from, to, t0, &mut chart).unwrap();
        assert_eq!(
            chart.calls,
            vec![
                ChartCall::SetVisibleRange(TimeRange { from: data[25].time, to }),
                ChartCall::SetData(Vec::new()),
            ]
        );
        assert_eq!(driver.state(), ReplayState::Windowed { total: 45 });

        // nothing before the first interval elapses
        assert_eq!(driver.poll(t0 + ms(99), &mut chart), 0);

        let mut emitted_at = Vec::new();
        for k in 1..=60u64 {
            let n = driver.poll(t0 + ms(100 * k), &mut chart);
            for _ in 0..n {
                emitted_at.push(k);
            }
        }

        assert_eq!(emitted_at, (1..=45).collect::<Vec<u64>>());
        assert_eq!(chart.updates(), data[10..=54].to_vec());
        assert_eq!(driver.state(), ReplayState::Idle);
    }

    #[test]
    fn late_poll_catches_up_without_skipping() {
        let data = candles(45);
        let t0 = Instant::now();
        let mut chart = RecordingChart::default();
        let mut driver = ReplayDriver::default();
        driver.start_range(&data, i64::MIN, i64::MAX, t0, &mut chart).unwrap();

        assert_eq!(driver.poll(t0 + ms(1_050), &mut chart), 10);
        assert_eq!(driver.state(), ReplayState::Playing { cursor: 10, total: 45 });
        assert_eq!(driver.poll(t0 + ms(60_000), &mut chart), 35);
        assert_eq!(chart.updates(), data);
        assert!(!driver.is_active());
    }

    #[test]
    fn reversed_or_empty_range_leaves_chart_alone() {
        let data = candles(10);
        let t0 = Instant::now();
        let mut chart = ChartModel::new();
        chart.set_data(&data);
        let before = chart.revision;
        let mut driver = ReplayDriver::default();

        let err = driver
            .start_range(&data, data[5].time, data[2].time, t0, &mut chart)
            .unwrap_err();
        assert_eq!(err, ReplayError::EmptyRange);

        let err = driver
            .start_range(&data, BASE - 10 * DAY, BASE - DAY, t0, &mut chart)
            .unwrap_err();
        assert_eq!(err, ReplayError::EmptyRange);

        assert_eq!(chart.revision, before);
        assert_eq!(chart.data, data);
        assert_eq!(driver.state(), ReplayState::Idle);
        assert_eq!(driver.next_due(), None);
    }

    #[test]
    fn missing_or_bad_dates_are_rejected() {
        let data = candles(3);
        let t0 = Instant::now();
        let mut chart = RecordingChart::default();
        let mut driver = ReplayDriver::default();

        assert_eq!(
            driver.start(&data, "", "12/25/2023", t0, &mut chart),
            Err(ReplayError::MissingDates)
        );
        assert_eq!(
            driver.start(&data, "12/01/2023", "  ", t0, &mut chart),
            Err(ReplayError::MissingDates)
        );
        assert_eq!(
            driver.start(&data, "someday", "12/25/2023", t0, &mut chart),
            Err(ReplayError::InvalidDate("someday".to_string()))
        );
        assert!(chart.calls.is_empty());
    }

    #[test]
    fn date_fields_select_by_calendar_day() {
        let day = |s: &str| timefmt::parse_date(s).unwrap();
        let data: Vec<Candle> = ["2023-12-24", "2023-12-25", "2023-12-26", "2023-12-27"]
            .iter()
            .map(|d| Candle {
                time: day(d),
                open: 1.0,
                high: 1.0,
                low: 1.0,
                close: 1.0,
            })
            .collect();

        let t0 = Instant::now();
        let mut chart = RecordingChart::default();
        let mut driver = ReplayDriver::default();
        driver
            .start(&data, "12/25/2023", "12/26/2023", t0, &mut chart)
            .unwrap();
        driver.poll(t0 + ms(10_000), &mut chart);
        assert_eq!(chart.updates(), data[1..=2].to_vec());
    }

    #[test]
    fn second_start_cancels_the_first() {
        let data = candles(20);
        let t0 = Instant::now();
        let mut chart = RecordingChart::default();
        let mut driver = ReplayDriver::default();

        driver.start_range(&data, data[0].time, data[9].time, t0, &mut chart).unwrap();
        driver.poll(t0 + ms(300), &mut chart);
        assert_eq!(chart.updates().len(), 3);

        let t1 = t0 + ms(300);
        driver.start_range(&data, data[10].time, data[19].time, t1, &mut chart).unwrap();
        chart.calls.clear();
        driver.poll(t1 + ms(10_000), &mut chart);

        assert_eq!(chart.updates(), data[10..20].to_vec());
    }

    #[test]
    fn invalid_request_does_not_stop_running_replay() {
        let data = candles(10);
        let t0 = Instant::now();
        let mut chart = RecordingChart::default();
        let mut driver = ReplayDriver::default();

        driver.start_range(&data, i64::MIN, i64::MAX, t0, &mut chart).unwrap();
        assert!(driver.start_range(&data, 1, 0, t0, &mut chart).is_err());
        assert!(driver.is_active());
        driver.poll(t0 + ms(1_000), &mut chart);
        assert_eq!(chart.updates(), data);
    }

    #[test]
    fn cancel_stops_emission() {
        let data = candles(10);
        let t0 = Instant::now();
        let mut chart = RecordingChart::default();
        let mut driver = ReplayDriver::default();

        driver.start_range(&data, i64::MIN, i64::MAX, t0, &mut chart).unwrap();
        driver.poll(t0 + ms(200), &mut chart);
        assert!(driver.cancel());
        assert!(!driver.cancel());
        assert_eq!(driver.poll(t0 + ms(5_000), &mut chart), 0);
        assert_eq!(chart.updates().len(), 2);
    }

    #[test]
    fn custom_tick_and_zoom() {
        let data = candles(12);
        let t0 = Instant::now();
        let mut chart = RecordingChart::default();
        let mut driver = ReplayDriver::new(ms(250), 4);

        driver.start_range(&data, i64::MIN, i64::MAX, t0, &mut chart).unwrap();
        assert_eq!(
            chart.calls[0],
            ChartCall::SetVisibleRange(TimeRange { from: data[8].time, to: data[11].time })
        );
        assert_eq!(driver.poll(t0 + ms(249), &mut chart), 0);
        assert_eq!(driver.poll(t0 + ms(500), &mut chart), 2);
    }
}
