//! Radius-based strategy variants.

use crate::coord::{
    enclosing_tile_rect, to_tile_coords, Position, TileRect, MAX_LAT, MAX_LON, MIN_LAT, MIN_LON,
    QUEST_TILE_ZOOM,
};

use super::AutoDownloadStrategy;

/// Default download radius on mobile data, in meters.
pub const DEFAULT_MOBILE_RADIUS_M: f64 = 600.0;

/// Default quest type limit on mobile data.
pub const DEFAULT_MOBILE_QUEST_TYPE_LIMIT: usize = 5;

/// Default latitude cut-off on mobile data, in degrees.
pub const DEFAULT_MOBILE_MAX_ABS_LATITUDE: f64 = 80.0;

/// Default download radius on wifi, in meters.
pub const DEFAULT_WIFI_RADIUS_M: f64 = 1200.0;

/// Default quest type limit on wifi.
pub const DEFAULT_WIFI_QUEST_TYPE_LIMIT: usize = 10;

/// Default latitude cut-off on wifi, in degrees.
pub const DEFAULT_WIFI_MAX_ABS_LATITUDE: f64 = 85.0;

/// Static configuration shared by both strategy variants.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyConfig {
    /// Radius of the circle around the position that the region must cover.
    pub radius_m: f64,
    /// Maximum quest types per session, `None` for unlimited.
    pub work_type_limit: Option<usize>,
    /// Positions further from the equator than this are not downloaded.
    pub max_abs_latitude: f64,
}

impl StrategyConfig {
    /// Defaults for a metered connection.
    pub fn mobile_data() -> Self {
        Self {
            radius_m: DEFAULT_MOBILE_RADIUS_M,
            work_type_limit: Some(DEFAULT_MOBILE_QUEST_TYPE_LIMIT),
            max_abs_latitude: DEFAULT_MOBILE_MAX_ABS_LATITUDE,
        }
    }

    /// Defaults for an unmetered connection.
    pub fn wifi() -> Self {
        Self {
            radius_m: DEFAULT_WIFI_RADIUS_M,
            work_type_limit: Some(DEFAULT_WIFI_QUEST_TYPE_LIMIT),
            max_abs_latitude: DEFAULT_WIFI_MAX_ABS_LATITUDE,
        }
    }

    fn may_download_here(&self, pos: &Position) -> bool {
        pos.is_projectable() && pos.lat.abs() <= self.max_abs_latitude
    }

    fn download_region(&self, pos: &Position) -> TileRect {
        match enclosing_tile_rect(pos, self.radius_m, QUEST_TILE_ZOOM) {
            Ok(rect) => rect,
            Err(_) => {
                // Unprojectable input: fall back to the tile of the clamped
                // position so callers still get a well-formed region.
                let lat = finite_or_zero(pos.lat).clamp(MIN_LAT, MAX_LAT);
                let lon = finite_or_zero(pos.lon).clamp(MIN_LON, MAX_LON);
                let tile = to_tile_coords(lat, lon, QUEST_TILE_ZOOM).unwrap_or_default();
                TileRect::single(tile)
            }
        }
    }
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

/// Strategy for metered (mobile data) connections.
#[derive(Debug, Clone)]
pub struct MobileDataStrategy {
    config: StrategyConfig,
}

impl MobileDataStrategy {
    pub fn new(config: StrategyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }
}

impl Default for MobileDataStrategy {
    fn default() -> Self {
        Self::new(StrategyConfig::mobile_data())
    }
}

impl AutoDownloadStrategy for MobileDataStrategy {
    fn may_download_here(&self, pos: &Position) -> bool {
        self.config.may_download_here(pos)
    }

    fn download_region(&self, pos: &Position) -> TileRect {
        self.config.download_region(pos)
    }

    fn work_type_limit(&self, _pos: &Position) -> Option<usize> {
        self.config.work_type_limit
    }

    fn name(&self) -> &'static str {
        "mobile-data"
    }
}

/// Strategy for unmetered (wifi) connections.
#[derive(Debug, Clone)]
pub struct WifiStrategy {
    config: StrategyConfig,
}

impl WifiStrategy {
    pub fn new(config: StrategyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }
}

impl Default for WifiStrategy {
    fn default() -> Self {
        Self::new(StrategyConfig::wifi())
    }
}

impl AutoDownloadStrategy for WifiStrategy {
    fn may_download_here(&self, pos: &Position) -> bool {
        self.config.may_download_here(pos)
    }

    fn download_region(&self, pos: &Position) -> TileRect {
        self.config.download_region(pos)
    }

    fn work_type_limit(&self, _pos: &Position) -> Option<usize> {
        self.config.work_type_limit
    }

    fn name(&self) -> &'static str {
        "wifi"
    }
}
