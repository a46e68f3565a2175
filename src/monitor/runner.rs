// Capture loop and analysis worker for the live monitor
use super::source::FrameSource;
use super::types::{MonitorCommand, MonitorEvent, MonitorState};
use crate::analysis::{AnalysisResult, RoiAnalyzer, TargetImage};
use crate::error::{RoiError, RoiResult};
use crate::persist::write_json_pretty;
use crate::session::RoiSnapshot;
use chrono::Local;
use image::RgbImage;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{mpsc, watch};
use tokio::time::{Duration, Instant, sleep_until};

/// One captured frame together with the ROI list it should be analyzed against
#[derive(Debug, Clone)]
struct Frame {
    index: u64,
    image: Arc<RgbImage>,
    snapshot: RoiSnapshot,
}

/// What the worker needs besides the frame; cloned into each blocking task
#[derive(Clone)]
struct AnalysisJob {
    analyzer: RoiAnalyzer,
    targets: Arc<[TargetImage]>,
    output_dir: Option<PathBuf>,
}

impl AnalysisJob {
    fn run(&self, frame: &Frame) -> RoiResult<Vec<AnalysisResult>> {
        let results = self
            .analyzer
            .analyze_snapshot(&frame.image, &frame.snapshot, &self.targets)?;

        if let Some(dir) = &self.output_dir {
            let stamp = Local::now().format("%Y%m%d_%H%M%S_%3f");
            let path = dir.join(format!("results_{stamp}.json"));
            if let Err(e) = write_json_pretty(&path, &results) {
                log::warn!("Failed to write {}: {e}", path.display());
            }
        }
        Ok(results)
    }
}

/// Re-analyzes frames from a [`FrameSource`] on an interval.
///
/// Capturing and analysis run separately. Captured frames go into a `watch`
/// channel, so when analysis falls behind, older frames are replaced and only
/// the newest one is analyzed.
pub struct RoiMonitor<S: FrameSource> {
    state: MonitorState,
    interval: Duration,
    source: Arc<Mutex<S>>,
    source_name: String,
    snapshot: RoiSnapshot,
    job: AnalysisJob,
    command_rx: mpsc::Receiver<MonitorCommand>,
    event_tx: mpsc::Sender<MonitorEvent>,
    frame_index: u64,
}

impl<S: FrameSource> RoiMonitor<S> {
    pub fn new(
        source: S,
        analyzer: RoiAnalyzer,
        snapshot: RoiSnapshot,
        targets: Vec<TargetImage>,
        command_rx: mpsc::Receiver<MonitorCommand>,
        event_tx: mpsc::Sender<MonitorEvent>,
    ) -> Self {
        Self {
            state: MonitorState::Idle,
            interval: Duration::from_millis(1000),
            source_name: source.describe(),
            source: Arc::new(Mutex::new(source)),
            snapshot,
            job: AnalysisJob {
                analyzer,
                targets: targets.into(),
                output_dir: None,
            },
            command_rx,
            event_tx,
            frame_index: 0,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Write each frame's results as `results_{timestamp}.json` into `dir`
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.job.output_dir = Some(dir.into());
        self
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    async fn change_state(&mut self, new_state: MonitorState) {
        if self.state != new_state {
            log::debug!("🎥 Monitor state: {:?} -> {:?}", self.state, new_state);
            self.state = new_state;
            let _ = self.event_tx.send(MonitorEvent::StateChanged(new_state)).await;
        }
    }

    async fn capture(&mut self, frames: &watch::Sender<Option<Frame>>) {
        match grab_frame(Arc::clone(&self.source)).await {
            Ok(image) => {
                self.frame_index += 1;
                log::debug!(
                    "📸 Captured frame {} ({}x{}) from {}",
                    self.frame_index,
                    image.width(),
                    image.height(),
                    self.source_name
                );
                // replaces any frame the worker has not picked up yet
                frames.send_replace(Some(Frame {
                    index: self.frame_index,
                    image: Arc::new(image),
                    snapshot: self.snapshot.clone(),
                }));
            }
            Err(e) => {
                log::warn!("❌ Capture failed: {e}");
                let _ = self
                    .event_tx
                    .send(MonitorEvent::Error(format!("Capture failed: {e}")))
                    .await;
            }
        }
    }

    /// Returns true when the loop should exit
    async fn process_command(
        &mut self,
        command: MonitorCommand,
        frames: &watch::Sender<Option<Frame>>,
    ) -> bool {
        log::debug!("🎥 Processing monitor command: {command:?}");
        match command {
            MonitorCommand::Start => {
                if self.state == MonitorState::Idle {
                    self.change_state(MonitorState::Capturing).await;
                    log::info!(
                        "🚀 Monitoring {} every {}ms",
                        self.source_name,
                        self.interval.as_millis()
                    );
                }
            }
            MonitorCommand::Pause => {
                if self.state == MonitorState::Capturing {
                    self.change_state(MonitorState::Paused).await;
                }
            }
            MonitorCommand::Resume => {
                if self.state == MonitorState::Paused {
                    self.change_state(MonitorState::Capturing).await;
                }
            }
            MonitorCommand::Stop => {
                self.change_state(MonitorState::Idle).await;
            }
            MonitorCommand::CaptureOnce => {
                self.capture(frames).await;
            }
            MonitorCommand::UpdateInterval(millis) => {
                self.interval = Duration::from_millis(millis.max(1));
                let _ = self.event_tx.send(MonitorEvent::IntervalUpdate(millis)).await;
                log::debug!("⏱️ Capture interval updated to {millis}ms");
            }
            MonitorCommand::UpdateRois(snapshot) => {
                log::debug!(
                    "ROI list updated to v{} ({} ROIs)",
                    snapshot.version(),
                    snapshot.rois().len()
                );
                self.snapshot = snapshot;
            }
            MonitorCommand::Shutdown => {
                self.change_state(MonitorState::Idle).await;
                log::info!("🛑 Monitor shutting down");
                return true;
            }
        }
        false
    }

    /// Run until `Shutdown` or until every command sender is dropped.
    ///
    /// A frame captured before shutdown is still analyzed before this returns.
    pub async fn run(mut self) -> RoiResult<()> {
        let (frame_tx, frame_rx) = watch::channel(None);
        let worker = tokio::spawn(analysis_worker(
            frame_rx,
            self.job.clone(),
            self.event_tx.clone(),
        ));

        let mut next_capture = Instant::now();
        loop {
            let capturing = self.state == MonitorState::Capturing;
            tokio::select! {
                command = self.command_rx.recv() => {
                    let exit = match command {
                        Some(command) => self.process_command(command, &frame_tx).await,
                        None => true,
                    };
                    if exit {
                        break;
                    }
                }
                _ = sleep_until(next_capture), if capturing => {
                    self.capture(&frame_tx).await;
                    next_capture = Instant::now() + self.interval;
                }
            }
        }

        drop(frame_tx);
        worker.await?;
        log::debug!("🎥 Monitor loop ended after {} frames", self.frame_index);
        Ok(())
    }
}

/// Capture on the blocking pool so decoding never stalls command handling
async fn grab_frame<S: FrameSource>(source: Arc<Mutex<S>>) -> RoiResult<RgbImage> {
    tokio::task::spawn_blocking(move || {
        source
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .capture()
    })
    .await
    .map_err(RoiError::from)?
}

async fn analysis_worker(
    mut frames: watch::Receiver<Option<Frame>>,
    job: AnalysisJob,
    events: mpsc::Sender<MonitorEvent>,
) {
    while frames.changed().await.is_ok() {
        let latest = frames.borrow_and_update().clone();
        let Some(frame) = latest else {
            continue;
        };

        let task_job = job.clone();
        let index = frame.index;
        let version = frame.snapshot.version();
        let outcome = tokio::task::spawn_blocking(move || task_job.run(&frame)).await;

        let event = match outcome {
            Ok(Ok(results)) => MonitorEvent::FrameAnalyzed {
                frame_index: index,
                snapshot_version: version,
                results,
            },
            Ok(Err(e)) => MonitorEvent::Error(format!("Analysis of frame {index} failed: {e}")),
            Err(e) => MonitorEvent::Error(format!("Analysis task for frame {index} failed: {e}")),
        };
        if events.send(event).await.is_err() {
            break;
        }
    }
}
