//! Geographic value types: positions, tiles, tile rectangles and bounding boxes.

use std::fmt;

use thiserror::Error;

use super::tile_to_lat_lon;

/// Minimum latitude supported by Web Mercator projection.
pub const MIN_LAT: f64 = -85.05112878;

/// Maximum latitude supported by Web Mercator projection.
pub const MAX_LAT: f64 = 85.05112878;

/// Minimum longitude.
pub const MIN_LON: f64 = -180.0;

/// Maximum longitude.
pub const MAX_LON: f64 = 180.0;

/// Minimum zoom level.
pub const MIN_ZOOM: u8 = 0;

/// Maximum zoom level supported by the tile conversions.
pub const MAX_ZOOM: u8 = 19;

/// Mean earth radius in meters, used for great-circle distances.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Errors from coordinate conversion.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordError {
    #[error("invalid latitude: {0}")]
    InvalidLatitude(f64),

    #[error("invalid longitude: {0}")]
    InvalidLongitude(f64),

    #[error("invalid zoom level: {0}")]
    InvalidZoom(u8),
}

/// A latitude/longitude pair in degrees.
///
/// Positions are compared by great-circle distance via [`Position::distance_to`],
/// never by float equality.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub lat: f64,
    pub lon: f64,
}

impl Position {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Great-circle distance to `other` in meters (haversine).
    pub fn distance_to(&self, other: &Position) -> f64 {
        let lat1 = self.lat.to_radians();
        let lat2 = other.lat.to_radians();
        let d_lat = (other.lat - self.lat).to_radians();
        let d_lon = (other.lon - self.lon).to_radians();

        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
        let a = a.clamp(0.0, 1.0);

        2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())
    }

    /// Whether this position can be projected onto Web Mercator tiles.
    pub fn is_projectable(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (MIN_LAT..=MAX_LAT).contains(&self.lat)
            && (MIN_LON..=MAX_LON).contains(&self.lon)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6},{:.6}", self.lat, self.lon)
    }
}

/// A single slippy-map tile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TileCoord {
    /// Tile Y coordinate (north to south).
    pub row: u32,
    /// Tile X coordinate (west to east).
    pub col: u32,
    pub zoom: u8,
}

/// A geographic bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    pub fn new(min_lat: f64, min_lon: f64, max_lat: f64, max_lon: f64) -> Self {
        Self {
            min_lat,
            min_lon,
            max_lat,
            max_lon,
        }
    }

    /// Whether the position lies inside the box (edges inclusive).
    pub fn contains(&self, pos: &Position) -> bool {
        (self.min_lat..=self.max_lat).contains(&pos.lat)
            && (self.min_lon..=self.max_lon).contains(&pos.lon)
    }
}

/// Formats as `left,bottom,right,top` (min lon, min lat, max lon, max lat).
impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.7},{:.7},{:.7},{:.7}",
            self.min_lon, self.min_lat, self.max_lon, self.max_lat
        )
    }
}

/// A rectangular range of tiles at a single zoom level, edges inclusive.
///
/// This is the "tile set" a download session covers. It never changes once
/// a session has been configured with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileRect {
    /// Westernmost column.
    pub left: u32,
    /// Northernmost row.
    pub top: u32,
    /// Easternmost column.
    pub right: u32,
    /// Southernmost row.
    pub bottom: u32,
    pub zoom: u8,
}

impl TileRect {
    /// Create a tile rect. Edges are normalised so that `left <= right` and
    /// `top <= bottom`.
    pub fn new(left: u32, top: u32, right: u32, bottom: u32, zoom: u8) -> Self {
        Self {
            left: left.min(right),
            top: top.min(bottom),
            right: left.max(right),
            bottom: top.max(bottom),
            zoom,
        }
    }

    /// A rect covering exactly one tile.
    pub fn single(tile: TileCoord) -> Self {
        Self::new(tile.col, tile.row, tile.col, tile.row, tile.zoom)
    }

    pub fn width(&self) -> u32 {
        self.right - self.left + 1
    }

    pub fn height(&self) -> u32 {
        self.bottom - self.top + 1
    }

    pub fn tile_count(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    pub fn contains(&self, tile: &TileCoord) -> bool {
        tile.zoom == self.zoom
            && (self.left..=self.right).contains(&tile.col)
            && (self.top..=self.bottom).contains(&tile.row)
    }

    /// Iterate tiles in row-major order.
    pub fn tiles(&self) -> TileRectIterator {
        TileRectIterator {
            rect: *self,
            row: self.top,
            col: self.left,
            done: false,
        }
    }

    /// Geographic extent of the rect: northwest corner of the top-left tile
    /// to southeast corner of the bottom-right tile.
    pub fn to_bounding_box(&self) -> BoundingBox {
        let north_west = tile_to_lat_lon(&TileCoord {
            row: self.top,
            col: self.left,
            zoom: self.zoom,
        });
        let south_east = tile_to_lat_lon(&TileCoord {
            row: self.bottom + 1,
            col: self.right + 1,
            zoom: self.zoom,
        });

        BoundingBox::new(south_east.lat, north_west.lon, north_west.lat, south_east.lon)
    }
}

impl fmt::Display for TileRect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "z{} x{}..{} y{}..{}",
            self.zoom, self.left, self.right, self.top, self.bottom
        )
    }
}

/// Row-major iterator over the tiles of a [`TileRect`].
#[derive(Debug, Clone)]
pub struct TileRectIterator {
    rect: TileRect,
    row: u32,
    col: u32,
    done: bool,
}

impl Iterator for TileRectIterator {
    type Item = TileCoord;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let tile = TileCoord {
            row: self.row,
            col: self.col,
            zoom: self.rect.zoom,
        };

        if self.col < self.rect.right {
            self.col += 1;
        } else if self.row < self.rect.bottom {
            self.col = self.rect.left;
            self.row += 1;
        } else {
            self.done = true;
        }

        Some(tile)
    }
}
