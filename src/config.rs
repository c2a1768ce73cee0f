//! Engine configuration.
//!
//! Every field has a default, so a partial JSON document (or none at all) yields a
//! usable configuration:
//!
//! ```rust
//! use hotspot_locator::LocatorConfig;
//!
//! let config = LocatorConfig::from_json(r#"{ "proximity_threshold_meters": 200.0 }"#).unwrap();
//! assert_eq!(config.proximity_threshold_meters, 200.0);
//! assert_eq!(config.focus_ttl_ms, 4000);
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::LocatorError;

/// Configuration for clustering, framing, focus and proximity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(default)]
pub struct LocatorConfig {
    /// Zoom at and above which every hotspot renders as its own marker.
    /// Default: 19
    pub cluster_max_zoom: u8,

    /// Lowest zoom the initial fit-to-bounds may settle on.
    /// Default: 3
    pub min_fit_zoom: u8,

    /// Close-up zoom for focusing a hotspot. Focusing never zooms out.
    /// Default: 19
    pub focus_min_zoom: u8,

    /// Highest zoom the map supports.
    /// Default: 19
    pub max_zoom: u8,

    /// How long a focused marker stays highlighted, in milliseconds.
    /// Default: 4000
    pub focus_ttl_ms: u32,

    /// Distance under which the nearest hotspot counts as "here".
    /// Default: 350.0 meters
    pub proximity_threshold_meters: f64,

    /// Screen radius within which markers merge into one cluster.
    /// Default: 80.0 pixels
    pub cluster_radius_px: f64,

    /// Padding kept around the initial fit-to-bounds.
    /// Default: 40.0 pixels
    pub fit_padding_px: f64,

    /// Viewport size used for fit-to-bounds.
    /// Default: 1024 x 768
    pub viewport_width_px: u32,
    pub viewport_height_px: u32,

    /// Whether the map can zoom into a cluster to show one of its members.
    /// Default: true
    pub reveal_supported: bool,

    /// Options handed to the live position source.
    pub position: PositionOptions,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            cluster_max_zoom: 19,
            min_fit_zoom: 3,
            focus_min_zoom: 19,
            max_zoom: 19,
            focus_ttl_ms: 4000,
            proximity_threshold_meters: 350.0,
            cluster_radius_px: 80.0,
            fit_padding_px: 40.0,
            viewport_width_px: 1024,
            viewport_height_px: 768,
            reveal_supported: true,
            position: PositionOptions::default(),
        }
    }
}

impl LocatorConfig {
    /// Parse and validate a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self, LocatorError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| LocatorError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot work with.
    pub fn validate(&self) -> Result<(), LocatorError> {
        if self.min_fit_zoom > self.max_zoom {
            return Err(LocatorError::Config(format!(
                "min_fit_zoom {} exceeds max_zoom {}",
                self.min_fit_zoom, self.max_zoom
            )));
        }
        if self.focus_min_zoom > self.max_zoom {
            return Err(LocatorError::Config(format!(
                "focus_min_zoom {} exceeds max_zoom {}",
                self.focus_min_zoom, self.max_zoom
            )));
        }
        if self.focus_ttl_ms == 0 {
            return Err(LocatorError::Config("focus_ttl_ms must be positive".into()));
        }
        if !self.proximity_threshold_meters.is_finite() || self.proximity_threshold_meters < 0.0 {
            return Err(LocatorError::Config(format!(
                "proximity_threshold_meters must be a non-negative number, got {}",
                self.proximity_threshold_meters
            )));
        }
        if !self.cluster_radius_px.is_finite() || self.cluster_radius_px <= 0.0 {
            return Err(LocatorError::Config("cluster_radius_px must be positive".into()));
        }
        if self.viewport_width_px == 0 || self.viewport_height_px == 0 {
            return Err(LocatorError::Config("viewport must have a non-zero size".into()));
        }
        Ok(())
    }

    pub fn focus_ttl(&self) -> Duration {
        Duration::from_millis(u64::from(self.focus_ttl_ms))
    }

    pub fn viewport(&self) -> (f64, f64) {
        (f64::from(self.viewport_width_px), f64::from(self.viewport_height_px))
    }
}

/// Options for the live position source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(default)]
pub struct PositionOptions {
    /// Accept a cached fix up to this old.
    /// Default: 5000 ms
    pub maximum_age_ms: u32,
    /// Give up on a fix after this long.
    /// Default: 20000 ms
    pub timeout_ms: u32,
    /// Default: true
    pub high_accuracy: bool,
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self {
            maximum_age_ms: 5_000,
            timeout_ms: 20_000,
            high_accuracy: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = LocatorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.focus_ttl(), Duration::from_secs(4));
        assert_eq!(config.focus_min_zoom, 19);
    }

    #[test]
    fn test_empty_document_gives_defaults() {
        let config = LocatorConfig::from_json("{}").unwrap();
        assert_eq!(config, LocatorConfig::default());
    }

    #[test]
    fn test_nested_position_options() {
        let config = LocatorConfig::from_json(r#"{ "position": { "timeout_ms": 1000 } }"#).unwrap();
        assert_eq!(config.position.timeout_ms, 1000);
        assert_eq!(config.position.maximum_age_ms, 5_000);
    }

    #[test]
    fn test_rejects_inverted_zoom_range() {
        let err = LocatorConfig::from_json(r#"{ "min_fit_zoom": 20, "max_zoom": 18 }"#).unwrap_err();
        assert!(matches!(err, LocatorError::Config(_)));
    }

    #[test]
    fn test_rejects_focus_zoom_above_max() {
        let err = LocatorConfig::from_json(r#"{ "focus_min_zoom": 19, "max_zoom": 17 }"#).unwrap_err();
        assert!(matches!(err, LocatorError::Config(ref msg) if msg.contains("focus_min_zoom")));

        let config = LocatorConfig { focus_min_zoom: 17, max_zoom: 17, ..Default::default() };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_negative_threshold() {
        let config = LocatorConfig { proximity_threshold_meters: -1.0, ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_malformed_json() {
        assert!(matches!(LocatorConfig::from_json("{"), Err(LocatorError::Config(_))));
    }
}
