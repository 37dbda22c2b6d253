//! The auto-sync trigger.
//!
//! Turns position fixes and connectivity changes into policy-gated download
//! and upload requests. Handlers only update state and submit work; the
//! downloads and uploads themselves run on the [`BackgroundExecutor`].

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::types::{
    AutoSyncPreference, ConnectionState, ConnectivityMonitor, ConnectivitySnapshot,
    PositionTracker, PreferenceSource,
};
use crate::controller::SyncController;
use crate::coord::Position;
use crate::executor::BackgroundExecutor;
use crate::schedule::{DeferredAction, DeferredScheduler, DEFAULT_CLOSE_SESSIONS_AFTER};
use crate::strategy::AutoDownloadStrategy;

/// Movement below which position fixes are discarded (meters).
pub const DEFAULT_MOVEMENT_THRESHOLD_M: f64 = 400.0;

/// Tunables for [`AutoSyncTrigger`].
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerConfig {
    pub movement_threshold_m: f64,
    /// Delay before idle upload sessions are closed after an upload.
    pub close_sessions_after: Duration,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            movement_threshold_m: DEFAULT_MOVEMENT_THRESHOLD_M,
            close_sessions_after: DEFAULT_CLOSE_SESSIONS_AFTER,
        }
    }
}

/// Collaborators the trigger is wired to.
#[derive(Clone)]
pub struct TriggerDeps {
    pub controller: Arc<dyn SyncController>,
    /// Used on metered connections.
    pub mobile_strategy: Arc<dyn AutoDownloadStrategy>,
    /// Used on unmetered connections.
    pub wifi_strategy: Arc<dyn AutoDownloadStrategy>,
    pub preference: Arc<dyn PreferenceSource>,
    pub connectivity: Arc<dyn ConnectivityMonitor>,
    pub tracker: Arc<dyn PositionTracker>,
    pub scheduler: Arc<dyn DeferredScheduler>,
    pub executor: Arc<dyn BackgroundExecutor>,
}

#[derive(Debug, Default)]
struct TriggerState {
    position: Option<Position>,
    connection: ConnectionState,
    started: bool,
    tracking: bool,
}

/// Decides when to download and upload automatically.
///
/// # Gates
///
/// | Action   | Requires                                                        |
/// |----------|-----------------------------------------------------------------|
/// | download | preference, known position, connected, no priority download    |
/// | upload   | preference, connected                                           |
///
/// The preference allows syncing when it is `Always`, or `WifiOnly` while on
/// an unmetered network.
pub struct AutoSyncTrigger {
    deps: TriggerDeps,
    config: TriggerConfig,
    state: Mutex<TriggerState>,
}

impl std::fmt::Debug for AutoSyncTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutoSyncTrigger")
            .field("config", &self.config)
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

impl AutoSyncTrigger {
    pub fn new(deps: TriggerDeps, config: TriggerConfig) -> Self {
        Self {
            deps,
            config,
            state: Mutex::new(TriggerState::default()),
        }
    }

    /// Begin reacting to events. Reads the current connectivity first.
    pub fn start(&self) {
        let connection = ConnectionState::from(&self.deps.connectivity.current());
        let mut state = self.state.lock();
        state.connection = connection;
        state.started = true;
        info!(connection = %connection, "Auto sync started");
    }

    /// Stop reacting to events and release position tracking.
    pub fn stop(&self) {
        self.stop_position_tracking();
        self.state.lock().started = false;
        info!("Auto sync stopped");
    }

    pub fn is_started(&self) -> bool {
        self.state.lock().started
    }

    pub fn start_position_tracking(&self) {
        debug!("Starting position tracking");
        self.deps.tracker.start();
        self.state.lock().tracking = true;
    }

    /// Stop the position sensor. Failures are logged and ignored.
    pub fn stop_position_tracking(&self) {
        self.state.lock().tracking = false;
        if let Err(e) = self.deps.tracker.stop() {
            warn!(error = %e, "Failed to stop position tracking");
        }
    }

    /// Last accepted position fix.
    pub fn position(&self) -> Option<Position> {
        self.state.lock().position
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.state.lock().connection
    }

    /// Handle a position fix.
    ///
    /// Fixes are accepted while the trigger is started or position tracking
    /// is active, so tracking may be started before [`start`](Self::start).
    /// Fixes closer than the movement threshold to the last accepted one are
    /// dropped without touching any state.
    pub fn on_position_update(&self, position: Position) {
        {
            let mut state = self.state.lock();
            if !state.started && !state.tracking {
                debug!("Ignoring position update, neither started nor tracking");
                return;
            }
            if let Some(previous) = state.position {
                let moved = previous.distance_to(&position);
                if moved < self.config.movement_threshold_m {
                    debug!(moved_m = moved, "Ignoring position update below movement threshold");
                    return;
                }
            }
            state.position = Some(position);
        }
        self.trigger_auto_download();
    }

    /// Handle a connectivity change.
    ///
    /// Reconnecting (a changed, non-failover, connected state) triggers a
    /// download and then an upload.
    pub fn on_connectivity_changed(&self, snapshot: ConnectivitySnapshot) {
        let (changed, connection) = {
            let mut state = self.state.lock();
            if !state.started {
                return;
            }
            let connection = ConnectionState::from(&snapshot);
            let changed = connection != state.connection;
            state.connection = connection;
            (changed, connection)
        };

        debug!(
            connection = %connection,
            changed,
            failover = snapshot.is_failover,
            "Connectivity changed"
        );

        if changed && !snapshot.is_failover && connection.connected {
            self.trigger_auto_download();
            self.trigger_auto_upload();
        }
    }

    /// Submit a background download around the current position if the
    /// download gate passes. Returns whether a job was submitted.
    pub fn trigger_auto_download(&self) -> bool {
        let (position, connection) = {
            let state = self.state.lock();
            (state.position, state.connection)
        };

        if !self.allowed_by_preference(connection) {
            debug!("Auto download not allowed by preference");
            return false;
        }
        let Some(position) = position else {
            debug!("Auto download skipped, position unknown");
            return false;
        };
        if !connection.connected {
            debug!("Auto download skipped, not connected");
            return false;
        }
        if self.deps.controller.is_priority_download_running() {
            debug!("Auto download skipped, priority download running");
            return false;
        }

        info!(
            lat = position.lat,
            lon = position.lon,
            "Checking whether to automatically download new quests"
        );

        let strategy = if connection.unconstrained {
            Arc::clone(&self.deps.wifi_strategy)
        } else {
            Arc::clone(&self.deps.mobile_strategy)
        };
        let controller = Arc::clone(&self.deps.controller);

        self.deps.executor.submit(Box::new(move || {
            if !strategy.may_download_here(&position) {
                debug!(strategy = strategy.name(), "Strategy declined download here");
                return;
            }
            let region = strategy.download_region(&position);
            let limit = strategy.work_type_limit(&position);

            match controller.download(region, limit, false) {
                Ok(session) => info!(
                    strategy = strategy.name(),
                    tiles = %region,
                    visible = session.visible_quests(),
                    "Auto download complete"
                ),
                Err(e) => warn!(strategy = strategy.name(), error = %e, "Auto download failed"),
            }
        }));
        true
    }

    /// Submit a background upload and push out the idle-session close if the
    /// upload gate passes. Returns whether the upload was submitted.
    pub fn trigger_auto_upload(&self) -> bool {
        let connection = self.state.lock().connection;

        if !self.allowed_by_preference(connection) {
            debug!("Auto upload not allowed by preference");
            return false;
        }
        if !connection.connected {
            debug!("Auto upload skipped, not connected");
            return false;
        }

        let controller = Arc::clone(&self.deps.controller);
        self.deps.executor.submit(Box::new(move || {
            debug!("Running auto upload");
            controller.upload();
        }));
        self.deps.scheduler.schedule(
            DeferredAction::CloseIdleSessions,
            self.config.close_sessions_after,
        );
        true
    }

    fn allowed_by_preference(&self, connection: ConnectionState) -> bool {
        match self.deps.preference.autosync() {
            AutoSyncPreference::Always => true,
            AutoSyncPreference::WifiOnly => connection.unconstrained,
            AutoSyncPreference::Never => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::ControllerError;
    use crate::coord::TileRect;
    use crate::executor::InlineExecutor;
    use crate::session::SessionHandle;
    use crate::strategy::{MobileDataStrategy, WifiStrategy};
    use crate::trigger::TrackerError;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct RecordingController {
        downloads: Mutex<Vec<(TileRect, Option<usize>, bool)>>,
        uploads: AtomicUsize,
        priority_running: AtomicBool,
        fail: bool,
    }

    impl SyncController for RecordingController {
        fn download(
            &self,
            tiles: TileRect,
            max_quest_types: Option<usize>,
            is_priority: bool,
        ) -> Result<SessionHandle, ControllerError> {
            self.downloads
                .lock()
                .push((tiles, max_quest_types, is_priority));
            if self.fail {
                return Err(ControllerError::ShutDown);
            }
            Ok(SessionHandle::default())
        }

        fn upload(&self) {
            self.uploads.fetch_add(1, Ordering::SeqCst);
        }

        fn is_priority_download_running(&self) -> bool {
            self.priority_running.load(Ordering::SeqCst)
        }
    }

    #[derive(Default)]
    struct RecordingScheduler {
        scheduled: Mutex<Vec<(DeferredAction, Duration)>>,
    }

    impl DeferredScheduler for RecordingScheduler {
        fn schedule(&self, action: DeferredAction, delay: Duration) {
            self.scheduled.lock().push((action, delay));
        }

        fn cancel(&self, _action: DeferredAction) {}
    }

    struct MutablePreference(Mutex<AutoSyncPreference>);

    impl PreferenceSource for MutablePreference {
        fn autosync(&self) -> AutoSyncPreference {
            *self.0.lock()
        }
    }

    struct FixedConnectivity(ConnectivitySnapshot);

    impl ConnectivityMonitor for FixedConnectivity {
        fn current(&self) -> ConnectivitySnapshot {
            self.0
        }
    }

    #[derive(Default)]
    struct FakeTracker {
        starts: AtomicUsize,
        stops: AtomicUsize,
        fail_stop: bool,
    }

    impl PositionTracker for FakeTracker {
        fn start(&self) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn stop(&self) -> Result<(), TrackerError> {
            self.stops.fetch_add(1, Ordering::SeqCst);
            if self.fail_stop {
                Err(TrackerError::NotRunning)
            } else {
                Ok(())
            }
        }
    }

    struct Fixture {
        trigger: AutoSyncTrigger,
        controller: Arc<RecordingController>,
        scheduler: Arc<RecordingScheduler>,
        preference: Arc<MutablePreference>,
        tracker: Arc<FakeTracker>,
    }

    impl Fixture {
        fn new(initial: ConnectivitySnapshot) -> Self {
            Self::with(initial, RecordingController::default(), FakeTracker::default())
        }

        fn with(
            initial: ConnectivitySnapshot,
            controller: RecordingController,
            tracker: FakeTracker,
        ) -> Self {
            let controller = Arc::new(controller);
            let scheduler = Arc::new(RecordingScheduler::default());
            let preference = Arc::new(MutablePreference(Mutex::new(AutoSyncPreference::Always)));
            let tracker = Arc::new(tracker);

            let deps = TriggerDeps {
                controller: controller.clone(),
                mobile_strategy: Arc::new(MobileDataStrategy::default()),
                wifi_strategy: Arc::new(WifiStrategy::default()),
                preference: preference.clone(),
                connectivity: Arc::new(FixedConnectivity(initial)),
                tracker: tracker.clone(),
                scheduler: scheduler.clone(),
                executor: Arc::new(InlineExecutor),
            };

            Self {
                trigger: AutoSyncTrigger::new(deps, TriggerConfig::default()),
                controller,
                scheduler,
                preference,
                tracker,
            }
        }

        fn started(initial: ConnectivitySnapshot) -> Self {
            let fixture = Self::new(initial);
            fixture.trigger.start();
            fixture
        }

        fn set_preference(&self, preference: AutoSyncPreference) {
            *self.preference.0.lock() = preference;
        }

        fn downloads(&self) -> Vec<(TileRect, Option<usize>, bool)> {
            self.controller.downloads.lock().clone()
        }

        fn uploads(&self) -> usize {
            self.controller.uploads.load(Ordering::SeqCst)
        }
    }

    fn hamburg() -> Position {
        Position::new(53.5511, 9.9937)
    }

    /// A point `meters` north of `origin`.
    fn north_of(origin: Position, meters: f64) -> Position {
        let d_lat = (meters / crate::coord::EARTH_RADIUS_M).to_degrees();
        Position::new(origin.lat + d_lat, origin.lon)
    }

    #[test]
    fn test_start_reads_connectivity() {
        let fixture = Fixture::new(ConnectivitySnapshot::unmetered());
        assert!(!fixture.trigger.is_started());

        fixture.trigger.start();

        assert!(fixture.trigger.is_started());
        assert_eq!(
            fixture.trigger.connection_state(),
            ConnectionState {
                connected: true,
                unconstrained: true
            }
        );
    }

    #[test]
    fn test_events_ignored_while_stopped() {
        let fixture = Fixture::new(ConnectivitySnapshot::metered());

        fixture.trigger.on_position_update(hamburg());
        fixture
            .trigger
            .on_connectivity_changed(ConnectivitySnapshot::unmetered());

        assert_eq!(fixture.trigger.position(), None);
        assert!(fixture.downloads().is_empty());
        assert_eq!(fixture.uploads(), 0);
    }

    #[test]
    fn test_position_accepted_while_tracking_before_start() {
        let fixture = Fixture::new(ConnectivitySnapshot::metered());
        fixture.trigger.start_position_tracking();

        fixture.trigger.on_position_update(hamburg());
        assert_eq!(fixture.trigger.position(), Some(hamburg()));
        // connectivity is unknown until start, so nothing is downloaded yet
        assert!(fixture.downloads().is_empty());

        fixture.trigger.start();
        fixture.trigger.on_position_update(north_of(hamburg(), 500.0));
        assert_eq!(fixture.downloads().len(), 1);
    }

    #[test]
    fn test_position_ignored_after_tracking_stopped() {
        let fixture = Fixture::new(ConnectivitySnapshot::metered());
        fixture.trigger.start_position_tracking();
        fixture.trigger.stop_position_tracking();

        fixture.trigger.on_position_update(hamburg());

        assert_eq!(fixture.trigger.position(), None);
    }

    #[test]
    fn test_first_position_triggers_non_priority_download() {
        let fixture = Fixture::started(ConnectivitySnapshot::metered());

        fixture.trigger.on_position_update(hamburg());

        let downloads = fixture.downloads();
        assert_eq!(downloads.len(), 1);
        let (tiles, limit, priority) = downloads[0];
        let expected = MobileDataStrategy::default();
        assert_eq!(tiles, expected.download_region(&hamburg()));
        assert_eq!(limit, expected.work_type_limit(&hamburg()));
        assert!(!priority);
    }

    #[test]
    fn test_unmetered_connection_uses_wifi_strategy() {
        let fixture = Fixture::started(ConnectivitySnapshot::unmetered());

        fixture.trigger.on_position_update(hamburg());

        let downloads = fixture.downloads();
        let wifi = WifiStrategy::default();
        assert_eq!(downloads[0].0, wifi.download_region(&hamburg()));
        assert_eq!(downloads[0].1, wifi.work_type_limit(&hamburg()));
    }

    #[test]
    fn test_small_movement_discarded() {
        let fixture = Fixture::started(ConnectivitySnapshot::metered());
        let origin = hamburg();

        fixture.trigger.on_position_update(origin);
        fixture.trigger.on_position_update(north_of(origin, 399.0));

        assert_eq!(fixture.trigger.position(), Some(origin));
        assert_eq!(fixture.downloads().len(), 1);
    }

    #[test]
    fn test_small_steps_do_not_creep() {
        let fixture = Fixture::started(ConnectivitySnapshot::metered());
        let origin = hamburg();
        fixture.trigger.on_position_update(origin);

        // each step is short, the stored position stays at the origin
        fixture.trigger.on_position_update(north_of(origin, 250.0));
        fixture.trigger.on_position_update(north_of(origin, 350.0));
        assert_eq!(fixture.downloads().len(), 1);

        fixture.trigger.on_position_update(north_of(origin, 450.0));
        assert_eq!(fixture.downloads().len(), 2);
        assert_eq!(fixture.trigger.position(), Some(north_of(origin, 450.0)));
    }

    #[test]
    fn test_position_stored_even_when_gate_denies() {
        let fixture = Fixture::started(ConnectivitySnapshot::disconnected());

        fixture.trigger.on_position_update(hamburg());

        assert_eq!(fixture.trigger.position(), Some(hamburg()));
        assert!(fixture.downloads().is_empty());
    }

    #[test]
    fn test_priority_download_blocks_auto_download() {
        let controller = RecordingController::default();
        controller.priority_running.store(true, Ordering::SeqCst);
        let fixture = Fixture::with(
            ConnectivitySnapshot::metered(),
            controller,
            FakeTracker::default(),
        );
        fixture.trigger.start();

        fixture.trigger.on_position_update(hamburg());

        assert!(fixture.downloads().is_empty());
    }

    #[test]
    fn test_strategy_declines_polar_position() {
        let fixture = Fixture::started(ConnectivitySnapshot::metered());

        // the gate passes, the mobile strategy refuses beyond 80°
        fixture.trigger.on_position_update(Position::new(82.0, 10.0));

        assert!(fixture.downloads().is_empty());
    }

    #[test]
    fn test_download_failure_is_contained() {
        let controller = RecordingController {
            fail: true,
            ..Default::default()
        };
        let fixture = Fixture::with(
            ConnectivitySnapshot::metered(),
            controller,
            FakeTracker::default(),
        );
        fixture.trigger.start();

        fixture.trigger.on_position_update(hamburg());

        assert_eq!(fixture.downloads().len(), 1);
    }

    #[test]
    fn test_reconnect_triggers_download_then_upload() {
        let fixture = Fixture::started(ConnectivitySnapshot::disconnected());
        fixture.trigger.on_position_update(hamburg());
        assert!(fixture.downloads().is_empty());

        fixture
            .trigger
            .on_connectivity_changed(ConnectivitySnapshot::metered());

        assert_eq!(fixture.downloads().len(), 1);
        assert_eq!(fixture.uploads(), 1);
        assert_eq!(
            fixture.scheduler.scheduled.lock().clone(),
            vec![(
                DeferredAction::CloseIdleSessions,
                DEFAULT_CLOSE_SESSIONS_AFTER
            )]
        );
    }

    #[test]
    fn test_reconnect_without_position_still_uploads() {
        let fixture = Fixture::started(ConnectivitySnapshot::disconnected());

        fixture
            .trigger
            .on_connectivity_changed(ConnectivitySnapshot::unmetered());

        assert!(fixture.downloads().is_empty());
        assert_eq!(fixture.uploads(), 1);
    }

    #[test]
    fn test_failover_triggers_nothing() {
        let fixture = Fixture::started(ConnectivitySnapshot::unmetered());
        fixture.trigger.on_position_update(hamburg());
        let before = fixture.downloads().len();

        fixture
            .trigger
            .on_connectivity_changed(ConnectivitySnapshot::metered().failover());

        assert_eq!(fixture.downloads().len(), before);
        assert_eq!(fixture.uploads(), 0);
        // the state still follows the platform
        assert!(!fixture.trigger.connection_state().unconstrained);
    }

    #[test]
    fn test_unchanged_tuple_triggers_nothing() {
        let fixture = Fixture::started(ConnectivitySnapshot::metered());
        fixture.trigger.on_position_update(hamburg());
        let before = fixture.downloads().len();

        fixture
            .trigger
            .on_connectivity_changed(ConnectivitySnapshot::metered());

        assert_eq!(fixture.downloads().len(), before);
        assert_eq!(fixture.uploads(), 0);
    }

    #[test]
    fn test_disconnect_triggers_nothing() {
        let fixture = Fixture::started(ConnectivitySnapshot::metered());

        fixture
            .trigger
            .on_connectivity_changed(ConnectivitySnapshot::disconnected());

        assert_eq!(fixture.uploads(), 0);
        assert!(!fixture.trigger.connection_state().connected);
    }

    #[test]
    fn test_never_preference_blocks_everything() {
        let fixture = Fixture::started(ConnectivitySnapshot::disconnected());
        fixture.set_preference(AutoSyncPreference::Never);
        fixture.trigger.on_position_update(hamburg());

        fixture
            .trigger
            .on_connectivity_changed(ConnectivitySnapshot::unmetered());

        assert!(!fixture.trigger.trigger_auto_download());
        assert!(!fixture.trigger.trigger_auto_upload());
        assert!(fixture.downloads().is_empty());
        assert_eq!(fixture.uploads(), 0);
    }

    #[test]
    fn test_wifi_only_preference() {
        let fixture = Fixture::started(ConnectivitySnapshot::metered());
        fixture.set_preference(AutoSyncPreference::WifiOnly);
        fixture.trigger.on_position_update(hamburg());

        assert!(fixture.downloads().is_empty());
        assert!(!fixture.trigger.trigger_auto_upload());

        fixture
            .trigger
            .on_connectivity_changed(ConnectivitySnapshot::unmetered());

        assert_eq!(fixture.downloads().len(), 1);
        assert_eq!(fixture.uploads(), 1);
    }

    #[test]
    fn test_preference_read_on_every_check() {
        let fixture = Fixture::started(ConnectivitySnapshot::metered());
        fixture.set_preference(AutoSyncPreference::Never);
        assert!(!fixture.trigger.trigger_auto_upload());

        fixture.set_preference(AutoSyncPreference::Always);
        assert!(fixture.trigger.trigger_auto_upload());
    }

    #[test]
    fn test_repeated_uploads_reschedule_close() {
        let fixture = Fixture::started(ConnectivitySnapshot::metered());

        fixture.trigger.trigger_auto_upload();
        fixture.trigger.trigger_auto_upload();

        assert_eq!(fixture.uploads(), 2);
        let scheduled = fixture.scheduler.scheduled.lock().clone();
        assert_eq!(scheduled.len(), 2);
        assert!(scheduled
            .iter()
            .all(|(action, _)| *action == DeferredAction::CloseIdleSessions));
    }

    struct GatedUploadController {
        release: Mutex<std::sync::mpsc::Receiver<()>>,
        uploads: AtomicUsize,
    }

    impl SyncController for GatedUploadController {
        fn download(
            &self,
            _tiles: TileRect,
            _max_quest_types: Option<usize>,
            _is_priority: bool,
        ) -> Result<SessionHandle, ControllerError> {
            Ok(SessionHandle::default())
        }

        fn upload(&self) {
            let _ = self.release.lock().recv();
            self.uploads.fetch_add(1, Ordering::SeqCst);
        }

        fn is_priority_download_running(&self) -> bool {
            false
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_upload_runs_off_the_calling_thread() {
        let (release_tx, release_rx) = std::sync::mpsc::channel();
        let controller = Arc::new(GatedUploadController {
            release: Mutex::new(release_rx),
            uploads: AtomicUsize::new(0),
        });
        let executor = Arc::new(crate::executor::BlockingPoolExecutor::new(
            tokio::runtime::Handle::current(),
            2,
        ));
        let scheduler = Arc::new(RecordingScheduler::default());
        let deps = TriggerDeps {
            controller: controller.clone(),
            mobile_strategy: Arc::new(MobileDataStrategy::default()),
            wifi_strategy: Arc::new(WifiStrategy::default()),
            preference: Arc::new(AutoSyncPreference::Always),
            connectivity: Arc::new(FixedConnectivity(ConnectivitySnapshot::metered())),
            tracker: Arc::new(FakeTracker::default()),
            scheduler: scheduler.clone(),
            executor: executor.clone(),
        };
        let trigger = AutoSyncTrigger::new(deps, TriggerConfig::default());
        trigger.start();

        // returns while the upload is still blocked
        assert!(trigger.trigger_auto_upload());
        assert_eq!(controller.uploads.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.scheduled.lock().len(), 1);

        release_tx.send(()).unwrap();
        executor.wait_idle().await;
        assert_eq!(controller.uploads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stop_releases_tracking() {
        let fixture = Fixture::started(ConnectivitySnapshot::metered());
        fixture.trigger.start_position_tracking();

        fixture.trigger.stop();

        assert!(!fixture.trigger.is_started());
        assert_eq!(fixture.tracker.starts.load(Ordering::SeqCst), 1);
        assert_eq!(fixture.tracker.stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failing_tracker_stop_is_swallowed() {
        let tracker = FakeTracker {
            fail_stop: true,
            ..Default::default()
        };
        let fixture = Fixture::with(
            ConnectivitySnapshot::metered(),
            RecordingController::default(),
            tracker,
        );
        fixture.trigger.start();

        fixture.trigger.stop();

        assert!(!fixture.trigger.is_started());
        assert_eq!(fixture.tracker.stops.load(Ordering::SeqCst), 1);
    }

    proptest! {
        #[test]
        fn prop_movement_below_threshold_is_ignored(
            lat in -60.0..60.0_f64,
            lon in -170.0..170.0_f64,
            meters in 0.0..399.0_f64,
        ) {
            let fixture = Fixture::started(ConnectivitySnapshot::metered());
            let origin = Position::new(lat, lon);
            fixture.trigger.on_position_update(origin);

            fixture.trigger.on_position_update(north_of(origin, meters));

            prop_assert_eq!(fixture.trigger.position(), Some(origin));
            prop_assert_eq!(fixture.downloads().len(), 1);
        }

        #[test]
        fn prop_movement_above_threshold_downloads_once(
            lat in -60.0..60.0_f64,
            lon in -170.0..170.0_f64,
            meters in 401.0..50_000.0_f64,
        ) {
            let fixture = Fixture::started(ConnectivitySnapshot::metered());
            let origin = Position::new(lat, lon);
            fixture.trigger.on_position_update(origin);
            let next = north_of(origin, meters);

            fixture.trigger.on_position_update(next);

            prop_assert_eq!(fixture.trigger.position(), Some(next));
            let downloads = fixture.downloads();
            prop_assert_eq!(downloads.len(), 2);
            prop_assert_eq!(
                downloads[1].0,
                MobileDataStrategy::default().download_region(&next)
            );
        }
    }
}
