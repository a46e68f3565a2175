// Live monitor
// Repeatedly captures frames from a source and re-analyzes the current ROI
// list on each one, driven by commands and reporting through events.

pub mod channels;
pub mod runner;
pub mod source;
pub mod types;


pub use channels::create_monitor_channels;
pub use runner::RoiMonitor;
pub use source::{FileFrameSource, FrameSource};
pub use types::{MonitorCommand, MonitorEvent, MonitorState};
