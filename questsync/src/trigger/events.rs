//! Channel adapter feeding platform events into an [`AutoSyncTrigger`].

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::auto_sync::AutoSyncTrigger;
use super::types::ConnectivitySnapshot;
use crate::coord::Position;

/// Events the trigger reacts to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SyncEvent {
    Start,
    Stop,
    StartTracking,
    StopTracking,
    Position(Position),
    Connectivity(ConnectivitySnapshot),
}

impl AutoSyncTrigger {
    /// Dispatch one event to the matching handler.
    pub fn handle_event(&self, event: SyncEvent) {
        match event {
            SyncEvent::Start => self.start(),
            SyncEvent::Stop => self.stop(),
            SyncEvent::StartTracking => self.start_position_tracking(),
            SyncEvent::StopTracking => self.stop_position_tracking(),
            SyncEvent::Position(position) => self.on_position_update(position),
            SyncEvent::Connectivity(snapshot) => self.on_connectivity_changed(snapshot),
        }
    }
}

/// Drain `events` into `trigger` until the channel closes or `cancellation`
/// fires. Returns the number of events handled.
pub async fn run_event_loop(
    trigger: Arc<AutoSyncTrigger>,
    mut events: mpsc::Receiver<SyncEvent>,
    cancellation: CancellationToken,
) -> usize {
    let mut handled = 0;

    loop {
        tokio::select! {
            biased;

            _ = cancellation.cancelled() => {
                debug!("Auto sync event loop cancelled");
                break;
            }

            event = events.recv() => {
                let Some(event) = event else { break };
                trigger.handle_event(event);
                handled += 1;
            }
        }
    }

    info!(handled, "Auto sync event loop finished");
    handled
}
