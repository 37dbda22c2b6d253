//! Auto-download strategies.
//!
//! A strategy is a pure policy object: given the current position it decides
//! whether an automatic download may happen there, which tile region to
//! fetch, and how many quest types at most.
//!
//! # Available Strategies
//!
//! - [`MobileDataStrategy`]: constrained network. Small region, low quest
//!   type limit, refuses remote high-latitude positions early.
//! - [`WifiStrategy`]: unconstrained network. Wider region, higher limit.
//!
//! The auto-sync trigger picks one per download based on whether the current
//! connection is unmetered.

mod radius;

pub use radius::{MobileDataStrategy, StrategyConfig, WifiStrategy};

use crate::coord::{Position, TileRect};

/// Policy deciding where and how much to download automatically.
///
/// Implementations must be side-effect free; the same position always yields
/// the same answer for the same configuration.
pub trait AutoDownloadStrategy: Send + Sync {
    /// Whether an automatic download is permitted at this position.
    fn may_download_here(&self, pos: &Position) -> bool;

    /// Tile region to download around `pos`.
    ///
    /// Only meaningful when [`may_download_here`](Self::may_download_here)
    /// returned `true` for the same position.
    fn download_region(&self, pos: &Position) -> TileRect;

    /// Upper bound on quest types fetched per session, `None` for unlimited.
    fn work_type_limit(&self, pos: &Position) -> Option<usize>;

    /// Short name for logging.
    fn name(&self) -> &'static str;
}
