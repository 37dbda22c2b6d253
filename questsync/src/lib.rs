//! QuestSync - automatic quest download and upload around a moving position
//!
//! This library decides when geographically scoped work ("quests", bound to
//! map tiles) should be fetched or uploaded, given intermittent connectivity,
//! a moving position and the user's sync preference, and runs bounded,
//! cancellable download sessions over all quest types of a region.
//!
//! # Modules
//!
//! - [`coord`]: positions, tiles and great-circle distances
//! - [`strategy`]: how much to download on metered and unmetered networks
//! - [`session`]: the download session and its collaborator traits
//! - [`controller`]: session ownership and the priority-session slot
//! - [`trigger`]: the auto-sync trigger and its event loop
//! - [`executor`]: background execution of download jobs
//! - [`schedule`]: deferred one-shot actions
//! - [`memory`]: in-memory collaborators
//! - [`config`]: INI configuration

pub mod config;
pub mod controller;
pub mod coord;
pub mod executor;
pub mod memory;
pub mod schedule;
pub mod session;
pub mod strategy;
pub mod trigger;
