//! `questsync replay`: drive the auto-sync trigger from a script.
//!
//! Script format, one step per line:
//!
//! ```text
//! # comment
//! start                      start the trigger
//! stop                       stop the trigger
//! track start|stop           start or stop position tracking
//! pos 53.5511 9.9937         position fix
//! net wifi|mobile|none       connectivity change, optionally `failover`
//! wait 500                   sleep for 500 ms
//! ```
//!
//! Downloads run against in-memory providers seeded with a few quests around
//! every scripted position; uploads and idle-session closing are simulated.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use questsync::config::SyncConfig;
use questsync::controller::SessionController;
use questsync::coord::Position;
use questsync::executor::BlockingPoolExecutor;
use questsync::memory::{
    MemoryConnectivity, MemoryFreshnessIndex, MemoryNoteProvider, MemoryPositionTracker,
    MemoryQuestProvider,
};
use questsync::schedule::{ActionHandler, TokioDeferredScheduler};
use questsync::session::{
    SessionDeps, SessionListener, StaticWorkTypeRegistry, VisibleQuestListener, WorkType,
};
use questsync::strategy::{MobileDataStrategy, WifiStrategy};
use questsync::trigger::{
    run_event_loop, AutoSyncTrigger, ConnectivitySnapshot, SyncEvent, TriggerDeps,
};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::config::resolve_path;
use crate::error::CliError;

/// Quest types known to the replay, by descending importance.
const REPLAY_QUEST_TYPES: &[(&str, i32)] = &[
    ("AddRoadName", 60),
    ("AddHousenumber", 50),
    ("AddOpeningHours", 40),
    ("AddWheelchairAccess", 30),
    ("AddBuildingLevels", 20),
    ("AddRecyclingType", 10),
];

/// Offset between seeded quests, in degrees (roughly 100 m).
const SEED_SPACING_DEG: f64 = 0.001;

/// One parsed script line.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Event(SyncEvent),
    Wait(Duration),
}

/// What happened during a replay.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReplaySummary {
    pub events: usize,
    pub sessions: usize,
    pub visible_quests: usize,
    pub uploads: usize,
    pub closes: usize,
    pub fresh_entries: usize,
}

/// Parse a script. Errors carry the 1-based line number.
pub fn parse_script(text: &str) -> Result<Vec<Step>, (usize, String)> {
    let mut steps = Vec::new();

    for (index, raw) in text.lines().enumerate() {
        let line = raw.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let step = parse_line(line).map_err(|message| (index + 1, message))?;
        steps.push(step);
    }

    Ok(steps)
}

fn parse_line(line: &str) -> Result<Step, String> {
    let words: Vec<&str> = line.split_whitespace().collect();

    let step = match words.as_slice() {
        ["start"] => Step::Event(SyncEvent::Start),
        ["stop"] => Step::Event(SyncEvent::Stop),
        ["track", "start"] => Step::Event(SyncEvent::StartTracking),
        ["track", "stop"] => Step::Event(SyncEvent::StopTracking),
        ["pos", lat, lon] => {
            let lat: f64 = lat.parse().map_err(|_| format!("invalid latitude '{}'", lat))?;
            let lon: f64 = lon.parse().map_err(|_| format!("invalid longitude '{}'", lon))?;
            Step::Event(SyncEvent::Position(Position::new(lat, lon)))
        }
        ["net", network, rest @ ..] => {
            let snapshot = match *network {
                "wifi" => ConnectivitySnapshot::unmetered(),
                "mobile" => ConnectivitySnapshot::metered(),
                "none" => ConnectivitySnapshot::disconnected(),
                other => return Err(format!("unknown network '{}'", other)),
            };
            let snapshot = match rest {
                [] => snapshot,
                ["failover"] => snapshot.failover(),
                _ => return Err(format!("unexpected arguments: {}", rest.join(" "))),
            };
            Step::Event(SyncEvent::Connectivity(snapshot))
        }
        ["wait", ms] => {
            let ms: u64 = ms.parse().map_err(|_| format!("invalid wait '{}'", ms))?;
            Step::Wait(Duration::from_millis(ms))
        }
        _ => return Err(format!("unrecognised step '{}'", line)),
    };

    Ok(step)
}

/// Quests and notes around every scripted position.
fn seed_world(steps: &[Step]) -> (HashMap<String, Vec<Position>>, Vec<Position>) {
    let mut quests: HashMap<String, Vec<Position>> = HashMap::new();
    let mut notes = Vec::new();

    for step in steps {
        let Step::Event(SyncEvent::Position(center)) = step else {
            continue;
        };
        for (i, (name, _)) in REPLAY_QUEST_TYPES.iter().enumerate() {
            let positions = quests.entry((*name).to_string()).or_default();
            for k in 0..=(i % 3) {
                positions.push(Position::new(
                    center.lat + SEED_SPACING_DEG * (k + 1) as f64,
                    center.lon + SEED_SPACING_DEG * (i + 1) as f64,
                ));
            }
        }
        notes.push(Position::new(
            center.lat - SEED_SPACING_DEG,
            center.lon - SEED_SPACING_DEG,
        ));
    }

    (quests, notes)
}

struct LoggingListener;

impl SessionListener for LoggingListener {
    fn on_started(&self) {
        info!("Session started");
    }

    fn on_not_started(&self) {
        info!("Session skipped, region is fresh");
    }

    fn on_progress(&self, progress: f32) {
        info!(percent = (progress * 100.0).round() as u32, "Session progress");
    }

    fn on_finished(&self) {
        info!("Session finished");
    }
}

#[derive(Default)]
struct QuestCounter(AtomicUsize);

impl VisibleQuestListener for QuestCounter {
    fn on_quests_visible(&self, quest_type: &WorkType, positions: &[Position]) {
        tracing::debug!(quest_type = %quest_type, count = positions.len(), "Quests visible");
        self.0.fetch_add(positions.len(), Ordering::SeqCst);
    }
}

/// Events handled by a finished event loop. A panicked loop is logged and
/// counts as zero.
fn events_handled(result: Result<usize, JoinError>) -> usize {
    match result {
        Ok(events) => events,
        Err(e) => {
            warn!(error = %e, "Event loop terminated abnormally");
            0
        }
    }
}

/// Run `steps` against in-memory collaborators.
pub async fn replay(config: &SyncConfig, steps: Vec<Step>) -> ReplaySummary {
    let index = Arc::new(MemoryFreshnessIndex::new());
    let (quests, notes) = seed_world(&steps);

    let deps = SessionDeps {
        registry: Arc::new(StaticWorkTypeRegistry::new(
            REPLAY_QUEST_TYPES
                .iter()
                .map(|(name, importance)| WorkType::geographic(*name, *importance))
                .collect(),
        )),
        freshness: index.clone(),
        notes: Arc::new(MemoryNoteProvider::new(index.clone(), notes)),
        quests: Arc::new(MemoryQuestProvider::new(index.clone(), quests)),
    };

    let uploads = Arc::new(AtomicUsize::new(0));
    let upload_counter = uploads.clone();
    let visible = Arc::new(QuestCounter::default());
    let controller = Arc::new(
        SessionController::new(
            deps,
            config.session_config(),
            Arc::new(move || {
                upload_counter.fetch_add(1, Ordering::SeqCst);
                info!("Uploading changes (simulated)");
            }),
        )
        .with_progress_listener(Arc::new(LoggingListener))
        .with_quest_listener(visible.clone()),
    );

    let closes = Arc::new(AtomicUsize::new(0));
    let close_counter = closes.clone();
    let close_handler: ActionHandler = Arc::new(move |action| {
        close_counter.fetch_add(1, Ordering::SeqCst);
        info!(action = %action, "Closing idle upload sessions (simulated)");
    });

    let connectivity = Arc::new(MemoryConnectivity::new(ConnectivitySnapshot::disconnected()));
    let executor = Arc::new(BlockingPoolExecutor::new(
        Handle::current(),
        config.autosync.max_concurrent_downloads,
    ));

    let trigger = Arc::new(AutoSyncTrigger::new(
        TriggerDeps {
            controller: controller.clone(),
            mobile_strategy: Arc::new(MobileDataStrategy::new(config.mobile.clone())),
            wifi_strategy: Arc::new(WifiStrategy::new(config.wifi.clone())),
            preference: Arc::new(config.autosync.preference),
            connectivity: connectivity.clone(),
            tracker: Arc::new(MemoryPositionTracker::default()),
            scheduler: Arc::new(TokioDeferredScheduler::new(Handle::current(), close_handler)),
            executor: executor.clone(),
        },
        config.trigger_config(),
    ));

    let (tx, rx) = mpsc::channel(64);
    let cancel = CancellationToken::new();
    let event_loop = tokio::spawn(run_event_loop(trigger, rx, cancel));

    for step in steps {
        match step {
            Step::Event(event) => {
                if let SyncEvent::Connectivity(snapshot) = event {
                    connectivity.set(snapshot);
                }
                if tx.send(event).await.is_err() {
                    break;
                }
            }
            Step::Wait(duration) => tokio::time::sleep(duration).await,
        }
    }

    drop(tx);
    let events = events_handled(event_loop.await);
    executor.wait_idle().await;

    ReplaySummary {
        events,
        sessions: controller.sessions_started(),
        visible_quests: visible.0.load(Ordering::SeqCst),
        uploads: uploads.load(Ordering::SeqCst),
        closes: closes.load(Ordering::SeqCst),
        fresh_entries: index.len(),
    }
}

pub fn run(script: &Path, config_path: Option<PathBuf>) -> Result<(), CliError> {
    let config = match config_path {
        Some(path) => SyncConfig::load(&path)?,
        None => match resolve_path(None) {
            Ok(path) => SyncConfig::load_or_default(&path)?,
            Err(_) => SyncConfig::default(),
        },
    };

    let text = std::fs::read_to_string(script).map_err(|source| CliError::ReadScript {
        path: script.to_path_buf(),
        source,
    })?;
    let steps = parse_script(&text).map_err(|(line, message)| CliError::Script {
        path: script.to_path_buf(),
        line,
        message,
    })?;

    info!(
        steps = steps.len(),
        preference = %config.autosync.preference,
        "Replaying script"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;
    let summary = runtime.block_on(replay(&config, steps));

    println!("Events handled:    {}", summary.events);
    println!("Sessions started:  {}", summary.sessions);
    println!("Quests visible:    {}", summary.visible_quests);
    println!("Uploads:           {}", summary.uploads);
    println!("Idle closes:       {}", summary.closes);
    println!("Fresh tile entries: {}", summary.fresh_entries);
    Ok(())
}
