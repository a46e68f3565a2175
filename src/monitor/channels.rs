// Communication channels for the live monitor
use super::types::{MonitorCommand, MonitorEvent};
use tokio::sync::mpsc;

/// Command channel into the monitor and event channel out of it
pub fn create_monitor_channels() -> (
    mpsc::Sender<MonitorCommand>,
    mpsc::Receiver<MonitorCommand>,
    mpsc::Sender<MonitorEvent>,
    mpsc::Receiver<MonitorEvent>,
) {
    let (cmd_tx, cmd_rx) = mpsc::channel(32);
    let (event_tx, event_rx) = mpsc::channel(32);
    (cmd_tx, cmd_rx, event_tx, event_rx)
}
