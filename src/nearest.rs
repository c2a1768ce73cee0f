//! Nearest-hotspot tracking.
//!
//! The nearest hotspot is re-derived from scratch on every position or point-set
//! update with a linear haversine scan. At the expected scale (hundreds of
//! hotspots) a full rescan is cheap and avoids any incremental bookkeeping.
//!
//! ## Ties
//!
//! When two hotspots are at exactly the same distance, the one that comes first in
//! the input wins. The tie-break is stable but arbitrary; no secondary key is
//! consulted.

use log::debug;

use crate::geo_utils::haversine_distance;
use crate::{GeoPoint, PositionSample, ProximityResult};

/// Find the hotspot closest to `position`.
///
/// Returns `None` when there is no position or no points.
///
/// # Example
/// ```
/// use hotspot_locator::{nearest, normalize, PositionSample};
/// use serde_json::json;
///
/// let points = normalize(&[json!({ "Id": 1, "LATITUDE": -20.3, "LONGITUDE": -40.3 })]);
/// let here = PositionSample::new(-20.3005, -40.3005, 0);
///
/// let result = nearest(Some(&here), &points).unwrap();
/// assert!((result.distance_meters - 68.0).abs() < 1.0);
/// assert!(nearest(None, &points).is_none());
/// ```
pub fn nearest(position: Option<&PositionSample>, points: &[GeoPoint]) -> Option<ProximityResult> {
    let here = position?.coords();

    let mut best: Option<(f64, &GeoPoint)> = None;
    for point in points {
        let d = haversine_distance(&here, &point.coords());
        // Strict comparison keeps the earliest point on ties
        if best.map_or(true, |(best_d, _)| d < best_d) {
            best = Some((d, point));
        }
    }

    best.map(|(distance_meters, point)| ProximityResult {
        point: point.clone(),
        distance_meters,
    })
}

/// Find the nearest hotspot using parallel processing.
///
/// Same result as [`nearest`], including the first-in-input tie-break.
#[cfg(feature = "parallel")]
pub fn nearest_parallel(
    position: Option<&PositionSample>,
    points: &[GeoPoint],
) -> Option<ProximityResult> {
    use rayon::prelude::*;

    let here = position?.coords();

    points
        .par_iter()
        .enumerate()
        .map(|(idx, point)| (haversine_distance(&here, &point.coords()), idx))
        .reduce_with(|a, b| {
            if b.0 < a.0 || (b.0 == a.0 && b.1 < a.1) {
                b
            } else {
                a
            }
        })
        .map(|(distance_meters, idx)| ProximityResult {
            point: points[idx].clone(),
            distance_meters,
        })
}

/// Whether a result is close enough to count as "at" the hotspot.
pub fn within_threshold(result: Option<&ProximityResult>, threshold_meters: f64) -> bool {
    result.is_some_and(|r| r.distance_meters <= threshold_meters)
}

/// Keeps the nearest hotspot current as positions and point sets change.
///
/// Only the latest position sample is retained. After [`unsubscribe`], position
/// updates are ignored and no further recomputation happens until
/// [`subscribe`] is called again.
///
/// [`unsubscribe`]: NearestTracker::unsubscribe
/// [`subscribe`]: NearestTracker::subscribe
#[derive(Debug, Clone)]
pub struct NearestTracker {
    position: Option<PositionSample>,
    points: Vec<GeoPoint>,
    subscribed: bool,
    result: Option<ProximityResult>,
}

impl Default for NearestTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl NearestTracker {
    pub fn new() -> Self {
        Self {
            position: None,
            points: Vec::new(),
            subscribed: true,
            result: None,
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscribed
    }

    /// Resume accepting position samples.
    pub fn subscribe(&mut self) {
        self.subscribed = true;
    }

    /// Stop tracking: drops the retained position and the current result.
    pub fn unsubscribe(&mut self) {
        self.subscribed = false;
        self.position = None;
        self.result = None;
    }

    /// Record a new position sample and recompute.
    ///
    /// Returns `false` if the sample was ignored because the tracker is
    /// unsubscribed.
    pub fn update_position(&mut self, sample: PositionSample) -> bool {
        if !self.subscribed {
            debug!("[NearestTracker] Ignoring position sample after unsubscribe");
            return false;
        }
        self.position = Some(sample);
        self.recompute();
        true
    }

    /// Forget the current position (e.g. the source reported an error).
    pub fn clear_position(&mut self) {
        self.position = None;
        self.result = None;
    }

    /// Replace the point set and recompute.
    pub fn set_points(&mut self, points: Vec<GeoPoint>) {
        self.points = points;
        self.recompute();
    }

    pub fn position(&self) -> Option<&PositionSample> {
        self.position.as_ref()
    }

    pub fn points(&self) -> &[GeoPoint] {
        &self.points
    }

    pub fn result(&self) -> Option<&ProximityResult> {
        self.result.as_ref()
    }

    fn recompute(&mut self) {
        #[cfg(feature = "parallel")]
        {
            self.result = nearest_parallel(self.position.as_ref(), &self.points);
        }
        #[cfg(not(feature = "parallel"))]
        {
            self.result = nearest(self.position.as_ref(), &self.points);
        }
    }
}
