// Types and enums for the live monitor
use crate::analysis::AnalysisResult;
use crate::session::RoiSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Idle,
    Capturing,
    Paused,
}

#[derive(Debug, Clone)]
pub enum MonitorCommand {
    Start,
    Pause,
    Resume,
    Stop,
    CaptureOnce,
    UpdateInterval(u64),      // milliseconds
    UpdateRois(RoiSnapshot), // analyze later frames against this ROI list
    Shutdown,
}

#[derive(Debug, Clone)]
pub enum MonitorEvent {
    StateChanged(MonitorState),
    FrameAnalyzed {
        frame_index: u64,
        snapshot_version: u64,
        results: Vec<AnalysisResult>,
    },
    Error(String),
    IntervalUpdate(u64),
}
