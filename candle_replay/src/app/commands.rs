use std::sync::mpsc::Sender;
use std::thread;

use super::event::{AppEvent, LoadEvent};
use crate::debug_hooks;
use crate::source::DataSource;

/// Read `source` off the UI thread and report back as a [`LoadEvent`].
/// `wake` runs after the send so a sleeping UI notices.
pub fn spawn_load<W>(tx: Sender<AppEvent>, source: DataSource, wake: W)
where
    W: Fn() + Send + 'static,
{
    thread::spawn(move || {
        let name = source.to_string();
        debug_hooks::log_load_start(&name);
        let ev = match source.read_text() {
            Ok(text) => LoadEvent::Loaded { source: name, text },
            Err(err) => LoadEvent::Failed {
                source: name,
                error: err.to_string(),
            },
        };
        let _ = tx.send(AppEvent::Load(ev));
        wake();
    });
}
