//! # Geographic Utilities
//!
//! Core geographic computation utilities for hotspot proximity and map framing.
//!
//! ## Overview
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`haversine_distance`] | Great-circle distance between two coordinates |
//! | [`compute_bounds`] | Bounding box of a set of coordinates |
//! | [`project`] / [`unproject`] | Web-Mercator pixel space at zoom 0 |
//! | [`fit_zoom`] | Largest zoom at which a bounding box fits a viewport |
//!
//! ## Example
//!
//! ```rust
//! use hotspot_locator::{LatLng, geo_utils};
//!
//! let hotspot = LatLng::new(-20.30000, -40.30000);
//! let here = LatLng::new(-20.30050, -40.30050);
//!
//! let dist = geo_utils::haversine_distance(&hotspot, &here);
//! assert!((dist - 68.0).abs() < 1.0);
//! ```
//!
//! ## Algorithm Notes
//!
//! ### Haversine Formula
//!
//! Distances use the haversine formula on a sphere of radius 6,371,000 m. Planar
//! approximations agree to well under 1% at walking distances but break down over
//! hundreds of kilometers, so they are never used for proximity.
//!
//! Reference: [Haversine formula (Wikipedia)](https://en.wikipedia.org/wiki/Haversine_formula)
//!
//! ### Coordinate System
//!
//! All functions expect WGS84 coordinates (latitude/longitude in degrees). Pixel
//! coordinates follow the slippy-map convention: a 256 px world at zoom 0, doubling
//! with every zoom level, origin at the north-west corner.

use geo::{BoundingRect, MultiPoint, Point};

use crate::{Bounds, LatLng};

/// Mean earth radius used for all distance computations, in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Width of the world in pixels at zoom level 0.
pub const TILE_SIZE: f64 = 256.0;

/// Latitude limit of the Web-Mercator projection.
const MAX_MERCATOR_LAT: f64 = 85.051_128_779_806_59;

// =============================================================================
// Distance Functions
// =============================================================================

/// Calculate the great-circle distance between two coordinates using the Haversine formula.
///
/// Returns the distance in meters along the surface of a sphere with radius
/// [`EARTH_RADIUS_METERS`]. The result is symmetric and exactly `0.0` for identical
/// inputs.
///
/// # Example
///
/// ```rust
/// use hotspot_locator::{LatLng, geo_utils};
///
/// let london = LatLng::new(51.5074, -0.1278);
/// let paris = LatLng::new(48.8566, 2.3522);
///
/// let distance = geo_utils::haversine_distance(&london, &paris);
/// assert!((distance - 343_500.0).abs() < 1000.0); // ~344 km
/// ```
#[inline]
pub fn haversine_distance(a: &LatLng, b: &LatLng) -> f64 {
    let phi1 = a.lat.to_radians();
    let phi2 = b.lat.to_radians();
    let d_phi = (b.lat - a.lat).to_radians();
    let d_lambda = (b.lng - a.lng).to_radians();

    let h = (d_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);

    // Rounding can push h a hair above 1 for antipodal pairs
    2.0 * EARTH_RADIUS_METERS * h.sqrt().min(1.0).asin()
}

// =============================================================================
// Bounding Box Functions
// =============================================================================

/// Compute the bounding box of a set of coordinates.
///
/// Returns `None` for empty input.
///
/// # Example
///
/// ```rust
/// use hotspot_locator::{LatLng, geo_utils};
///
/// let coords = vec![
///     LatLng::new(51.5000, -0.1300),
///     LatLng::new(51.5100, -0.1200),
///     LatLng::new(51.5050, -0.1250),
/// ];
///
/// let bounds = geo_utils::compute_bounds(&coords).unwrap();
/// assert_eq!(bounds.min_lat, 51.5000);
/// assert_eq!(bounds.max_lng, -0.1200);
/// ```
pub fn compute_bounds(coords: &[LatLng]) -> Option<Bounds> {
    let multi: MultiPoint<f64> = coords
        .iter()
        .map(|c| Point::new(c.lng, c.lat))
        .collect::<Vec<_>>()
        .into();

    multi.bounding_rect().map(|rect| Bounds {
        min_lat: rect.min().y,
        max_lat: rect.max().y,
        min_lng: rect.min().x,
        max_lng: rect.max().x,
    })
}

// =============================================================================
// Projection Functions
// =============================================================================

/// Project a coordinate into Web-Mercator pixel space at zoom 0.
///
/// Latitudes beyond the Mercator limit (±85.0511°) are clamped.
pub fn project(c: &LatLng) -> [f64; 2] {
    let lat = c.lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT).to_radians();
    let x = (c.lng + 180.0) / 360.0 * TILE_SIZE;
    let y = (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / std::f64::consts::PI) / 2.0 * TILE_SIZE;
    [x, y]
}

/// Inverse of [`project`].
pub fn unproject(p: [f64; 2]) -> LatLng {
    let lng = p[0] / TILE_SIZE * 360.0 - 180.0;
    let n = std::f64::consts::PI * (1.0 - 2.0 * p[1] / TILE_SIZE);
    let lat = n.sinh().atan().to_degrees();
    LatLng::new(lat, lng)
}

/// Scale factor between zoom 0 pixels and pixels at `zoom`.
#[inline]
pub fn zoom_scale(zoom: u8) -> f64 {
    2f64.powi(i32::from(zoom))
}

/// Largest integer zoom at which `bounds` fits a viewport of the given size
/// after subtracting `padding_px` on every side.
///
/// Returns `max_zoom` when the bounds are degenerate (a single coordinate).
pub fn fit_zoom(bounds: &Bounds, viewport: (f64, f64), padding_px: f64, max_zoom: u8) -> u8 {
    let nw = project(&LatLng::new(bounds.max_lat, bounds.min_lng));
    let se = project(&LatLng::new(bounds.min_lat, bounds.max_lng));
    let width = (se[0] - nw[0]).abs();
    let height = (se[1] - nw[1]).abs();

    let avail_w = (viewport.0 - 2.0 * padding_px).max(1.0);
    let avail_h = (viewport.1 - 2.0 * padding_px).max(1.0);

    let scale = f64::min(
        if width > 0.0 { avail_w / width } else { f64::INFINITY },
        if height > 0.0 { avail_h / height } else { f64::INFINITY },
    );

    if !scale.is_finite() {
        return max_zoom;
    }

    let zoom = scale.log2().floor();
    if zoom <= 0.0 {
        0
    } else {
        (zoom as u8).min(max_zoom)
    }
}

/// Pixel-space center of a bounding box, mapped back to a coordinate.
///
/// Unlike [`Bounds::center`], this matches what a slippy map shows in the middle
/// of the viewport after framing the box.
pub fn projected_center(bounds: &Bounds) -> LatLng {
    let nw = project(&LatLng::new(bounds.max_lat, bounds.min_lng));
    let se = project(&LatLng::new(bounds.min_lat, bounds.max_lng));
    unproject([(nw[0] + se[0]) / 2.0, (nw[1] + se[1]) / 2.0])
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Distance, Haversine};
    use proptest::prelude::*;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    /// Equirectangular approximation, only meaningful over short distances.
    fn planar_distance(a: &LatLng, b: &LatLng) -> f64 {
        let mean_lat = ((a.lat + b.lat) / 2.0).to_radians();
        let dx = (b.lng - a.lng).to_radians() * mean_lat.cos();
        let dy = (b.lat - a.lat).to_radians();
        EARTH_RADIUS_METERS * (dx * dx + dy * dy).sqrt()
    }

    #[test]
    fn test_haversine_distance_same_point() {
        let p = LatLng::new(51.5074, -0.1278);
        assert_eq!(haversine_distance(&p, &p), 0.0);
    }

    #[test]
    fn test_haversine_distance_known_value() {
        let a = LatLng::new(-20.30000, -40.30000);
        let b = LatLng::new(-20.30050, -40.30050);
        let dist = haversine_distance(&a, &b);
        assert!(approx_eq(dist, 68.0, 1.0), "got {dist}");
    }

    #[test]
    fn test_haversine_agrees_with_geo_crate() {
        // geo uses the IUGG mean radius (6,371,008.8 m)
        let london = LatLng::new(51.5074, -0.1278);
        let paris = LatLng::new(48.8566, 2.3522);
        let ours = haversine_distance(&london, &paris);
        let reference = Haversine::distance(
            Point::new(london.lng, london.lat),
            Point::new(paris.lng, paris.lat),
        );
        assert!((ours - reference).abs() / reference < 1e-5);
    }

    #[test]
    fn test_curvature_is_applied_for_distant_pairs() {
        let a = LatLng::new(10.0, 0.0);
        let b = LatLng::new(-10.0, 170.0);
        let great_circle = haversine_distance(&a, &b);
        let planar = planar_distance(&a, &b);
        assert!((great_circle - planar).abs() / great_circle > 0.05);
    }

    #[test]
    fn test_antipodal_distance_is_half_circumference() {
        let a = LatLng::new(0.0, 0.0);
        let b = LatLng::new(0.0, 180.0);
        let expected = std::f64::consts::PI * EARTH_RADIUS_METERS;
        assert!(approx_eq(haversine_distance(&a, &b), expected, 1e-3));
    }

    #[test]
    fn test_compute_bounds() {
        let coords = vec![
            LatLng::new(51.50, -0.13),
            LatLng::new(51.51, -0.12),
            LatLng::new(51.505, -0.125),
        ];
        let bounds = compute_bounds(&coords).unwrap();
        assert_eq!(bounds.min_lat, 51.50);
        assert_eq!(bounds.max_lat, 51.51);
        assert_eq!(bounds.min_lng, -0.13);
        assert_eq!(bounds.max_lng, -0.12);
    }

    #[test]
    fn test_compute_bounds_empty() {
        assert!(compute_bounds(&[]).is_none());
    }

    #[test]
    fn test_project_round_trip() {
        let c = LatLng::new(-20.3, -40.3);
        let back = unproject(project(&c));
        assert!(approx_eq(back.lat, c.lat, 1e-9));
        assert!(approx_eq(back.lng, c.lng, 1e-9));
    }

    #[test]
    fn test_project_origin_and_corners() {
        let center = project(&LatLng::new(0.0, 0.0));
        assert!(approx_eq(center[0], 128.0, 1e-9));
        assert!(approx_eq(center[1], 128.0, 1e-9));

        let nw = project(&LatLng::new(90.0, -180.0));
        assert!(approx_eq(nw[0], 0.0, 1e-9));
        assert!(approx_eq(nw[1], 0.0, 1e-6));
    }

    #[test]
    fn test_fit_zoom_single_point_uses_max_zoom() {
        let bounds = Bounds { min_lat: -20.3, max_lat: -20.3, min_lng: -40.3, max_lng: -40.3 };
        assert_eq!(fit_zoom(&bounds, (1024.0, 768.0), 40.0, 19), 19);
    }

    #[test]
    fn test_fit_zoom_city_scale() {
        // ~11 km square
        let bounds = Bounds { min_lat: -20.35, max_lat: -20.25, min_lng: -40.35, max_lng: -40.25 };
        let zoom = fit_zoom(&bounds, (1024.0, 768.0), 40.0, 19);
        assert!((11..=13).contains(&zoom), "got {zoom}");
    }

    #[test]
    fn test_fit_zoom_whole_world_is_zero() {
        let bounds = Bounds { min_lat: -80.0, max_lat: 80.0, min_lng: -180.0, max_lng: 180.0 };
        assert_eq!(fit_zoom(&bounds, (300.0, 300.0), 40.0, 19), 0);
    }

    fn coord() -> impl Strategy<Value = LatLng> {
        (-90.0f64..=90.0, -180.0f64..=180.0).prop_map(|(lat, lng)| LatLng::new(lat, lng))
    }

    proptest! {
        #[test]
        fn prop_distance_is_symmetric(a in coord(), b in coord()) {
            let ab = haversine_distance(&a, &b);
            let ba = haversine_distance(&b, &a);
            prop_assert!((ab - ba).abs() < 1e-6);
        }

        #[test]
        fn prop_distance_to_self_is_zero(a in coord()) {
            prop_assert!(haversine_distance(&a, &a).abs() < 1e-9);
        }

        #[test]
        fn prop_short_distances_match_planar(
            lat in -60.0f64..60.0,
            lng in -170.0f64..170.0,
            dlat in -0.02f64..0.02,
            dlng in -0.02f64..0.02,
        ) {
            let a = LatLng::new(lat, lng);
            let b = LatLng::new(lat + dlat, lng + dlng);
            let great_circle = haversine_distance(&a, &b);
            prop_assume!(great_circle > 1.0);
            let planar = planar_distance(&a, &b);
            prop_assert!((great_circle - planar).abs() / great_circle < 0.01);
        }
    }
}
