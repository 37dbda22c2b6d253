//! Deferred one-shot actions.
//!
//! After an upload, idle upload sessions should be closed once nothing else
//! happened for a while. Scheduling the same action again replaces the
//! pending occurrence, so repeated uploads push the deadline out instead of
//! firing several times.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Default inactivity before idle upload sessions are closed (20 minutes).
pub const DEFAULT_CLOSE_SESSIONS_AFTER: Duration = Duration::from_secs(20 * 60);

/// Deadline used when `now + delay` is not representable (about 30 years).
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Actions that can be deferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeferredAction {
    /// Close upload sessions left open after the last upload.
    CloseIdleSessions,
}

impl fmt::Display for DeferredAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeferredAction::CloseIdleSessions => f.write_str("close-idle-sessions"),
        }
    }
}

/// Schedules deferred actions.
pub trait DeferredScheduler: Send + Sync {
    /// Run `action` after `delay`, replacing any pending occurrence of it.
    fn schedule(&self, action: DeferredAction, delay: Duration);

    /// Drop a pending occurrence of `action`, if any.
    fn cancel(&self, action: DeferredAction);
}

/// Callback invoked when a deferred action fires.
pub type ActionHandler = Arc<dyn Fn(DeferredAction) + Send + Sync>;

type Pending = HashMap<DeferredAction, (u64, CancellationToken)>;

/// Timer-based scheduler on a tokio runtime.
pub struct TokioDeferredScheduler {
    handle: Handle,
    handler: ActionHandler,
    pending: Arc<Mutex<Pending>>,
    generation: Mutex<u64>,
}

impl fmt::Debug for TokioDeferredScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokioDeferredScheduler")
            .field("pending", &self.pending_count())
            .finish_non_exhaustive()
    }
}

impl TokioDeferredScheduler {
    pub fn new(handle: Handle, handler: ActionHandler) -> Self {
        Self {
            handle,
            handler,
            pending: Arc::new(Mutex::new(HashMap::new())),
            generation: Mutex::new(0),
        }
    }

    /// Number of actions waiting to fire.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    fn next_generation(&self) -> u64 {
        let mut generation = self.generation.lock();
        *generation += 1;
        *generation
    }
}

/// Remove `action` from `pending` if `generation` is still the scheduled one.
fn deadline_after(delay: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(delay)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

fn take_if_current(pending: &Mutex<Pending>, action: DeferredAction, generation: u64) -> bool {
    let mut pending = pending.lock();
    let current = matches!(pending.get(&action), Some((g, _)) if *g == generation);
    if current {
        pending.remove(&action);
    }
    current
}

impl DeferredScheduler for TokioDeferredScheduler {
    fn schedule(&self, action: DeferredAction, delay: Duration) {
        let deadline = deadline_after(delay);
        let generation = self.next_generation();
        let token = CancellationToken::new();

        if let Some((_, previous)) = self
            .pending
            .lock()
            .insert(action, (generation, token.clone()))
        {
            previous.cancel();
            debug!(action = %action, "Replaced pending deferred action");
        }

        let pending = Arc::clone(&self.pending);
        let handler = Arc::clone(&self.handler);
        self.handle.spawn(async move {
            tokio::select! {
                biased;

                _ = token.cancelled() => {}

                _ = tokio::time::sleep_until(deadline) => {
                    if take_if_current(&pending, action, generation) {
                        info!(action = %action, "Running deferred action");
                        handler(action);
                    }
                }
            }
        });
    }

    fn cancel(&self, action: DeferredAction) {
        if let Some((_, token)) = self.pending.lock().remove(&action) {
            token.cancel();
        }
    }
}
