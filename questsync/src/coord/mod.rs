//! Coordinate conversion module
//!
//! Provides conversions between geographic positions (latitude/longitude)
//! and Web Mercator slippy-map tiles, plus the great-circle distance used to
//! debounce position updates.

mod types;

pub use types::{
    BoundingBox, CoordError, Position, TileCoord, TileRect, TileRectIterator, EARTH_RADIUS_M,
    MAX_LAT, MAX_LON, MAX_ZOOM, MIN_LAT, MIN_LON, MIN_ZOOM,
};

use std::f64::consts::PI;

/// Zoom level at which quest downloads are bookkept.
pub const QUEST_TILE_ZOOM: u8 = 14;

/// Converts geographic coordinates to tile coordinates.
///
/// # Arguments
///
/// * `lat` - Latitude in degrees (-85.05112878 to 85.05112878)
/// * `lon` - Longitude in degrees (-180.0 to 180.0)
/// * `zoom` - Zoom level (0 to 19)
#[inline]
pub fn to_tile_coords(lat: f64, lon: f64, zoom: u8) -> Result<TileCoord, CoordError> {
    if !(MIN_LAT..=MAX_LAT).contains(&lat) {
        return Err(CoordError::InvalidLatitude(lat));
    }
    if !(MIN_LON..=MAX_LON).contains(&lon) {
        return Err(CoordError::InvalidLongitude(lon));
    }
    if zoom > MAX_ZOOM {
        return Err(CoordError::InvalidZoom(zoom));
    }

    let n = 2.0_f64.powi(zoom as i32);
    let max_index = (1u32 << zoom) - 1;

    let col = ((lon + 180.0) / 360.0 * n) as u32;

    let lat_rad = lat * PI / 180.0;
    let row = ((1.0 - lat_rad.tan().asinh() / PI) / 2.0 * n) as u32;

    // lon = 180 and lat = MIN_LAT land exactly on the far edge
    Ok(TileCoord {
        row: row.min(max_index),
        col: col.min(max_index),
        zoom,
    })
}

/// Converts tile coordinates back to a geographic position.
///
/// Returns the position of the tile's northwest corner.
#[inline]
pub fn tile_to_lat_lon(tile: &TileCoord) -> Position {
    let n = 2.0_f64.powi(tile.zoom as i32);

    let lon = tile.col as f64 / n * 360.0 - 180.0;

    let y = tile.row as f64 / n;
    let lat_rad = (PI * (1.0 - 2.0 * y)).sinh().atan();
    let lat = lat_rad * 180.0 / PI;

    Position::new(lat, lon)
}

/// Smallest tile rect at `zoom` that encloses a circle of `radius_m` meters
/// around `center`.
///
/// The circle's extent is clamped to the projectable range, so regions near
/// the poles or the antimeridian are cut off rather than wrapped.
pub fn enclosing_tile_rect(
    center: &Position,
    radius_m: f64,
    zoom: u8,
) -> Result<TileRect, CoordError> {
    if !center.lat.is_finite() || !(MIN_LAT..=MAX_LAT).contains(&center.lat) {
        return Err(CoordError::InvalidLatitude(center.lat));
    }
    if !center.lon.is_finite() || !(MIN_LON..=MAX_LON).contains(&center.lon) {
        return Err(CoordError::InvalidLongitude(center.lon));
    }

    let radius_m = radius_m.max(0.0);
    let d_lat = (radius_m / EARTH_RADIUS_M).to_degrees();
    // cos() stays well above zero inside the Mercator range
    let d_lon = d_lat / center.lat.to_radians().cos();

    let north = (center.lat + d_lat).min(MAX_LAT);
    let south = (center.lat - d_lat).max(MIN_LAT);
    let west = (center.lon - d_lon).max(MIN_LON);
    let east = (center.lon + d_lon).min(MAX_LON);

    let top_left = to_tile_coords(north, west, zoom)?;
    let bottom_right = to_tile_coords(south, east, zoom)?;

    Ok(TileRect::new(
        top_left.col,
        top_left.row,
        bottom_right.col,
        bottom_right.row,
        zoom,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_york_city_at_zoom_16() {
        // New York City: 40.7128°N, 74.0060°W
        let tile = to_tile_coords(40.7128, -74.0060, 16).unwrap();
        assert_eq!(tile.row, 24640);
        assert_eq!(tile.col, 19295);
        assert_eq!(tile.zoom, 16);
    }

    #[test]
    fn test_invalid_latitude() {
        let result = to_tile_coords(90.0, 0.0, 10);
        assert!(matches!(result, Err(CoordError::InvalidLatitude(_))));
    }

    #[test]
    fn test_invalid_zoom() {
        let result = to_tile_coords(0.0, 0.0, 25);
        assert!(matches!(result, Err(CoordError::InvalidZoom(25))));
    }

    #[test]
    fn test_far_edges_clamp_to_last_tile() {
        let tile = to_tile_coords(MIN_LAT, MAX_LON, 4).unwrap();
        assert_eq!(tile.row, 15);
        assert_eq!(tile.col, 15);
    }

    #[test]
    fn test_tile_to_lat_lon_northwest_corner() {
        let tile = TileCoord {
            row: 24640,
            col: 19295,
            zoom: 16,
        };

        let pos = tile_to_lat_lon(&tile);

        assert!((pos.lat - 40.713).abs() < 0.01);
        assert!((pos.lon - (-74.007)).abs() < 0.01);
    }

    #[test]
    fn test_distance_london_paris() {
        let london = Position::new(51.5074, -0.1278);
        let paris = Position::new(48.8566, 2.3522);

        let d = london.distance_to(&paris);
        assert!((d - 343_500.0).abs() < 2_000.0, "got {}", d);
    }

    #[test]
    fn test_distance_to_self_is_zero() {
        let p = Position::new(53.55, 9.99);
        assert_eq!(p.distance_to(&p), 0.0);
    }

    #[test]
    fn test_distance_small_offsets() {
        // 0.001° of latitude is ~111 m anywhere
        let a = Position::new(53.55, 9.99);
        let b = Position::new(53.551, 9.99);
        let d = a.distance_to(&b);
        assert!((d - 111.2).abs() < 1.0, "got {}", d);
    }

    #[test]
    fn test_single_tile_rect() {
        let rect = TileRect::single(TileCoord {
            row: 5000,
            col: 8000,
            zoom: QUEST_TILE_ZOOM,
        });

        assert_eq!(rect.tile_count(), 1);
        assert_eq!(rect.tiles().count(), 1);
    }

    #[test]
    fn test_tile_rect_normalises_edges() {
        let rect = TileRect::new(10, 20, 8, 18, 12);
        assert_eq!((rect.left, rect.top, rect.right, rect.bottom), (8, 18, 10, 20));
        assert_eq!(rect.width(), 3);
        assert_eq!(rect.height(), 3);
    }

    #[test]
    fn test_tile_rect_iterator_row_major() {
        let rect = TileRect::new(3, 7, 4, 8, 10);
        let tiles: Vec<_> = rect.tiles().map(|t| (t.row, t.col)).collect();
        assert_eq!(tiles, vec![(7, 3), (7, 4), (8, 3), (8, 4)]);
    }

    #[test]
    fn test_bounding_box_covers_tile() {
        let center = Position::new(53.5511, 9.9937);
        let tile = to_tile_coords(center.lat, center.lon, QUEST_TILE_ZOOM).unwrap();
        let bbox = TileRect::single(tile).to_bounding_box();

        assert!(bbox.contains(&center));
        assert!(bbox.min_lat < bbox.max_lat);
        assert!(bbox.min_lon < bbox.max_lon);
    }

    #[test]
    fn test_bounding_box_display_is_left_bottom_right_top() {
        let bbox = BoundingBox::new(1.0, 2.0, 3.0, 4.0);
        assert_eq!(
            bbox.to_string(),
            "2.0000000,1.0000000,4.0000000,3.0000000"
        );
    }

    #[test]
    fn test_enclosing_rect_grows_with_radius() {
        let center = Position::new(53.5511, 9.9937);
        let small = enclosing_tile_rect(&center, 200.0, QUEST_TILE_ZOOM).unwrap();
        let large = enclosing_tile_rect(&center, 5_000.0, QUEST_TILE_ZOOM).unwrap();

        assert!(large.tile_count() > small.tile_count());
        assert!(large.left <= small.left && large.right >= small.right);
        assert!(large.top <= small.top && large.bottom >= small.bottom);
    }

    #[test]
    fn test_enclosing_rect_rejects_nan() {
        let center = Position::new(f64::NAN, 0.0);
        assert!(enclosing_tile_rect(&center, 100.0, QUEST_TILE_ZOOM).is_err());
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_roundtrip_property(
                lat in -85.05..85.05_f64,
                lon in -180.0..180.0_f64,
                zoom in 0u8..=18
            ) {
                let tile = to_tile_coords(lat, lon, zoom)?;
                let pos = tile_to_lat_lon(&tile);

                let tile_size = 360.0 / (2.0_f64.powi(zoom as i32));

                prop_assert!((pos.lat - lat).abs() < tile_size);
                prop_assert!((pos.lon - lon).abs() < tile_size);
            }

            #[test]
            fn test_distance_symmetric_and_non_negative(
                lat1 in -85.0..85.0_f64,
                lon1 in -180.0..180.0_f64,
                lat2 in -85.0..85.0_f64,
                lon2 in -180.0..180.0_f64,
            ) {
                let a = Position::new(lat1, lon1);
                let b = Position::new(lat2, lon2);

                let ab = a.distance_to(&b);
                let ba = b.distance_to(&a);

                prop_assert!(ab >= 0.0);
                prop_assert!((ab - ba).abs() < 1e-6);
                // never more than half the circumference
                prop_assert!(ab <= PI * EARTH_RADIUS_M + 1.0);
            }

            #[test]
            fn test_enclosing_rect_contains_center_tile(
                lat in -80.0..80.0_f64,
                lon in -179.0..179.0_f64,
                radius in 0.0..5_000.0_f64,
            ) {
                let center = Position::new(lat, lon);
                let rect = enclosing_tile_rect(&center, radius, QUEST_TILE_ZOOM)?;
                let tile = to_tile_coords(lat, lon, QUEST_TILE_ZOOM)?;

                prop_assert!(rect.contains(&tile));
                prop_assert!(rect.to_bounding_box().contains(&center));
            }
        }
    }
}
