pub mod app;
pub mod chart;
pub mod debug_hooks;
pub mod gui;
pub mod ingest;
pub mod model;
pub mod replay;
pub mod session;
pub mod settings;
pub mod source;
pub mod timefmt;
