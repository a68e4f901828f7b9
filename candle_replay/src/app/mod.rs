pub mod commands;
pub mod event;
pub mod reducer;
pub mod state;

pub use event::*;
pub use state::*;

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::time::Instant;

use crate::source::DataSource;

type Waker = Arc<dyn Fn() + Send + Sync>;

/// Owns the state and the event channel. The window feeds it UI events and a
/// frame tick; background loads come back through the channel.
pub struct AppRuntime {
    pub state: AppState,
    tx: Sender<AppEvent>,
    rx: Receiver<AppEvent>,
    wake: Waker,
    dirty: bool,
}

impl AppRuntime {
    pub fn new(state: AppState) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            state,
            tx,
            rx,
            wake: Arc::new(|| {}),
            dirty: true,
        }
    }

    /// Called from load threads once their result is queued.
    pub fn set_waker(&mut self, wake: impl Fn() + Send + Sync + 'static) {
        self.wake = Arc::new(wake);
    }

    pub fn sender(&self) -> Sender<AppEvent> {
        self.tx.clone()
    }

    /// Kick off the configured auto-load, if any.
    pub fn boot(&mut self) {
        let auto = self.state.settings.state().auto_load.clone();
        if auto.is_empty() {
            return;
        }
        match DataSource::parse(&auto) {
            Ok(source) => {
                tracing::info!(%source, "auto-loading");
                self.state.queue_load(source);
                self.spawn_pending();
            }
            Err(err) => tracing::warn!("auto_load ignored: {err}"),
        }
        self.dirty = true;
    }

    pub fn handle_event(&mut self, ev: AppEvent) {
        if reducer::reduce(&mut self.state, ev) {
            self.dirty = true;
        }
        self.spawn_pending();
    }

    /// Apply everything the background threads have sent so far.
    pub fn drain_events(&mut self) {
        while let Ok(ev) = self.rx.try_recv() {
            self.handle_event(ev);
        }
    }

    pub fn tick(&mut self, now: Instant) {
        self.handle_event(AppEvent::Timer(TimerEvent::Frame { now }));
    }

    /// When the next replay candle is due, if one is running.
    pub fn next_wakeup(&self) -> Option<Instant> {
        self.state.replay.next_due()
    }

    pub fn take_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.dirty, false)
    }

    fn spawn_pending(&mut self) {
        if let Some(source) = self.state.take_pending_load() {
            let wake = Arc::clone(&self.wake);
            commands::spawn_load(self.tx.clone(), source, move || wake());
        }
    }
}
