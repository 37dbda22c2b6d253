//! Automatic download and upload triggering.
//!
//! # Architecture
//!
//! ```text
//! position fixes ──┐                                       ┌──► SyncController::download
//!                  ├──► AutoSyncTrigger ──► BackgroundExecutor
//! connectivity ────┘          │                            └──► SyncController::upload
//!                             └──► DeferredScheduler (close idle sessions)
//! ```
//!
//! Platform adapters either call the handlers directly or push
//! [`SyncEvent`]s into [`run_event_loop`].

mod auto_sync;
mod events;
mod types;

pub use auto_sync::{AutoSyncTrigger, TriggerConfig, TriggerDeps, DEFAULT_MOVEMENT_THRESHOLD_M};
pub use events::{run_event_loop, SyncEvent};
pub use types::{
    AutoSyncPreference, ConnectionState, ConnectivityMonitor, ConnectivitySnapshot, NetworkClass,
    ParsePreferenceError, PositionTracker, PreferenceSource, TrackerError,
};
