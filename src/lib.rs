//! # Hotspot Locator
//!
//! Proximity, clustering and marker-focus engine for a Wi-Fi hotspot map.
//!
//! This library provides:
//! - Normalization of loosely typed hotspot records into validated coordinates
//! - Nearest-hotspot tracking against a live position feed (haversine distance)
//! - Zoom-dependent marker clustering with a disambiguation list for clusters
//! - A focus controller driving reveal, fly-to, highlight and popup commands
//!
//! ## Features
//!
//! - **`parallel`** - Enable parallel nearest-point scans with rayon
//! - **`runtime`** - Enable the tokio-backed live position feed
//! - **`http`** - Enable the HTTP client for the hotspot row store
//! - **`ffi`** - Enable FFI bindings for mobile platforms (iOS/Android)
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use hotspot_locator::{nearest, normalize, within_threshold, PositionSample};
//! use serde_json::json;
//!
//! let records = vec![
//!     json!({ "Id": 1, "NOME-WIFI": "Lobby", "LATITUDE": "-20,30000", "LONGITUDE": "-40.30000" }),
//!     json!({ "Id": 2, "NOME-WIFI": "Broken", "LATITUDE": "abc", "LONGITUDE": "-40.4" }),
//! ];
//!
//! let points = normalize(&records);
//! assert_eq!(points.len(), 1);
//!
//! let here = PositionSample::new(-20.30050, -40.30050, 0);
//! let result = nearest(Some(&here), &points).unwrap();
//! assert_eq!(result.point.payload.name, "Lobby");
//! assert!(within_threshold(Some(&result), 350.0));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod cluster;
pub mod config;
pub mod disambiguation;
pub mod engine;
pub mod error;
pub mod focus;
pub mod geo_utils;
pub mod nearest;
pub mod normalize;
pub mod registry;
pub mod session;
pub mod store;

// Live position feed (tokio watch channel)
#[cfg(feature = "runtime")]
pub mod feed;

// HTTP client for the hotspot row store
#[cfg(feature = "http")]
pub mod http;

pub use cluster::{CameraFit, Cluster, ClusterId, ClusterView, Partition};
pub use config::{LocatorConfig, PositionOptions};
pub use disambiguation::{DisambiguationFlow, DisambiguationState};
pub use engine::{DataState, Locator, LocatorEvent, PositionStatus, ProximityCard};
pub use error::{LocatorError, PositionError};
pub use focus::{FocusController, FocusPhase, FocusState, FocusStatus, MapCommand, MoveTicket, SelectionSource, TimerToken};
pub use nearest::{nearest, within_threshold, NearestTracker};
#[cfg(feature = "parallel")]
pub use nearest::nearest_parallel;
pub use normalize::{ensure_array, normalize, normalize_with_report, parse_coordinate, parse_maps_url, NormalizeReport};
pub use registry::{MarkerHandle, MarkerRegistry};
pub use session::{AnonymousSession, AuthenticatedUser, SessionContext, StaticSession};
pub use store::{HotspotDraft, HotspotStore, MemoryStore, StoreError};

#[cfg(feature = "runtime")]
pub use feed::{forward_positions, PositionFeed, PositionSubscription, PositionUpdate};

#[cfg(feature = "http")]
pub use http::{BlockingRowStore, RowStoreClient, RowStoreConfig};

#[cfg(feature = "ffi")]
uniffi::setup_scaffolding!();

/// Initialize logging for Android (only used in FFI)
#[cfg(all(feature = "ffi", target_os = "android"))]
fn init_logging() {
    use android_logger::Config;
    use log::LevelFilter;

    android_logger::init_once(
        Config::default()
            .with_max_level(LevelFilter::Debug)
            .with_tag("HotspotLocatorRust")
    );
}

#[cfg(all(feature = "ffi", not(target_os = "android")))]
fn init_logging() {
    // No-op on non-Android platforms
}

// ============================================================================
// Core Types
// ============================================================================

/// A WGS84 coordinate in degrees.
///
/// # Example
/// ```
/// use hotspot_locator::LatLng;
/// let point = LatLng::new(-20.3, -40.3);
/// assert!(point.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    /// Create a new coordinate.
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Check if the coordinate is finite and within range.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

/// Bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

/// Stable identity of a hotspot.
///
/// Taken from the backing record's primary key when present, otherwise from the
/// canonical `"lat,lng"` text. Two keyless records at the same coordinate share
/// an identifier; they are indistinguishable to the focus and list flows.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PointId(String);

impl PointId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identifier for a record without a primary key.
    pub fn from_coords(lat: f64, lng: f64) -> Self {
        Self(format!("{lat},{lng}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PointId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Hotspot details carried alongside a point.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct HotspotRecord {
    /// Backend primary key, if the record had one
    pub key: Option<String>,
    /// Network name shown in lists and popups
    pub name: String,
    /// Customer the hotspot belongs to
    pub client: Option<String>,
    /// 2.4 GHz password
    pub password_2g: Option<String>,
    /// 5 GHz password
    pub password_5g: Option<String>,
}

/// A validated hotspot location.
///
/// Only produced by [`normalize`]; coordinates are always finite and in range.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoPoint {
    pub id: PointId,
    pub lat: f64,
    pub lng: f64,
    pub payload: HotspotRecord,
}

impl GeoPoint {
    pub fn coords(&self) -> LatLng {
        LatLng::new(self.lat, self.lng)
    }

    /// Render the point back into the record shape accepted by [`normalize`].
    pub fn to_record(&self) -> serde_json::Value {
        serde_json::json!({
            "Id": self.payload.key,
            "NOME-WIFI": self.payload.name,
            "NOME-CLIENTE": self.payload.client,
            "SENHA-WIFI-2G": self.payload.password_2g,
            "SENHA-WIFI-5G": self.payload.password_5g,
            "LATITUDE": self.lat,
            "LONGITUDE": self.lng,
        })
    }
}

/// One reading from the live position source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct PositionSample {
    pub lat: f64,
    pub lng: f64,
    /// Reported accuracy radius in meters
    pub accuracy: Option<f64>,
    /// Milliseconds since the Unix epoch
    pub timestamp_ms: i64,
}

impl PositionSample {
    pub fn new(lat: f64, lng: f64, timestamp_ms: i64) -> Self {
        Self { lat, lng, accuracy: None, timestamp_ms }
    }

    pub fn with_accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = Some(accuracy);
        self
    }

    pub fn coords(&self) -> LatLng {
        LatLng::new(self.lat, self.lng)
    }
}

/// Closest hotspot to the current position.
#[derive(Debug, Clone, PartialEq)]
pub struct ProximityResult {
    pub point: GeoPoint,
    pub distance_meters: f64,
}

// ============================================================================
// FFI Exports (only when feature enabled)
// ============================================================================

#[cfg(feature = "ffi")]
mod ffi {
    use super::*;
    use log::{debug, info};

    /// Flattened hotspot for mobile callers.
    #[derive(Debug, Clone, uniffi::Record)]
    pub struct FfiHotspot {
        pub id: String,
        pub lat: f64,
        pub lng: f64,
        pub record: HotspotRecord,
    }

    impl From<&GeoPoint> for FfiHotspot {
        fn from(p: &GeoPoint) -> Self {
            Self {
                id: p.id.to_string(),
                lat: p.lat,
                lng: p.lng,
                record: p.payload.clone(),
            }
        }
    }

    /// Nearest hotspot with the threshold flag already applied.
    #[derive(Debug, Clone, uniffi::Record)]
    pub struct FfiProximity {
        pub hotspot: FfiHotspot,
        pub distance_meters: f64,
        pub within: bool,
    }

    fn parse_records(records_json: &str) -> Vec<GeoPoint> {
        match serde_json::from_str::<serde_json::Value>(records_json) {
            Ok(value) => normalize(&ensure_array(value)),
            Err(e) => {
                log::warn!("[HotspotLocatorRust] Ignoring unparseable record payload: {}", e);
                Vec::new()
            }
        }
    }

    /// Normalize a JSON payload of hotspot records.
    #[uniffi::export]
    pub fn normalize_hotspots(records_json: String) -> Vec<FfiHotspot> {
        init_logging();
        let points = parse_records(&records_json);
        info!("[HotspotLocatorRust] normalize_hotspots kept {} points", points.len());
        points.iter().map(FfiHotspot::from).collect()
    }

    /// Great-circle distance in meters.
    #[uniffi::export]
    pub fn distance_meters(a: LatLng, b: LatLng) -> f64 {
        geo_utils::haversine_distance(&a, &b)
    }

    /// Find the nearest hotspot to a position.
    #[uniffi::export]
    pub fn nearest_hotspot(
        records_json: String,
        position: PositionSample,
        threshold_meters: f64,
    ) -> Option<FfiProximity> {
        init_logging();
        let points = parse_records(&records_json);
        debug!("[HotspotLocatorRust] nearest_hotspot over {} points", points.len());

        #[cfg(feature = "parallel")]
        let result = nearest_parallel(Some(&position), &points);

        #[cfg(not(feature = "parallel"))]
        let result = nearest(Some(&position), &points);

        result.map(|r| FfiProximity {
            within: within_threshold(Some(&r), threshold_meters),
            hotspot: FfiHotspot::from(&r.point),
            distance_meters: r.distance_meters,
        })
    }

    /// Extract coordinates from a pasted map link.
    #[uniffi::export]
    pub fn parse_map_link(url: String) -> Option<LatLng> {
        parse_maps_url(&url)
    }

    /// Get default configuration.
    #[uniffi::export]
    pub fn default_config() -> LocatorConfig {
        init_logging();
        LocatorConfig::default()
    }

    /// Fetch and normalize the hotspot table. Returns an empty list on failure.
    #[cfg(feature = "http")]
    #[uniffi::export]
    pub fn fetch_hotspots(base_url: String, table_id: String, token: String) -> Vec<FfiHotspot> {
        init_logging();
        let config = http::RowStoreConfig { base_url, table_id, token };
        let rows = http::BlockingRowStore::new(config).and_then(|store| store.list());
        match rows {
            Ok(rows) => normalize(&rows).iter().map(FfiHotspot::from).collect(),
            Err(e) => {
                log::warn!("[HotspotLocatorRust] fetch_hotspots failed: {}", e);
                Vec::new()
            }
        }
    }
}

#[cfg(feature = "ffi")]
pub use ffi::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latlng_validity() {
        assert!(LatLng::new(90.0, 180.0).is_valid());
        assert!(LatLng::new(-90.0, -180.0).is_valid());
        assert!(!LatLng::new(90.1, 0.0).is_valid());
        assert!(!LatLng::new(0.0, -180.5).is_valid());
        assert!(!LatLng::new(f64::NAN, 0.0).is_valid());
        assert!(!LatLng::new(0.0, f64::INFINITY).is_valid());
    }

    #[test]
    fn test_point_id_from_coords() {
        assert_eq!(PointId::from_coords(-20.3, -40.4).as_str(), "-20.3,-40.4");
        assert_eq!(PointId::from_coords(-20.30, -40.4), PointId::from_coords(-20.3, -40.40));
    }
}
