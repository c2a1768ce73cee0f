//! Error taxonomy.
//!
//! None of these are fatal. The engine absorbs every variant into an observable
//! state (an empty point set, no proximity result, an idle focus) and logs it;
//! only configuration parsing and row-store calls hand errors back to the caller.

use thiserror::Error;

use crate::PointId;

/// Why the live position source produced no sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PositionError {
    #[error("location permission denied")]
    PermissionDenied,
    #[error("timed out waiting for a position fix")]
    Timeout,
    #[error("location is not supported on this device")]
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LocatorError {
    /// The hotspot list could not be fetched.
    #[error("failed to load hotspots: {0}")]
    Data(String),

    #[error("no position available: {0}")]
    Position(#[from] PositionError),

    /// A selection referenced a point with no live marker, e.g. a list that
    /// outlived a data refresh.
    #[error("no live marker for hotspot {0}")]
    FocusTargetMissing(PointId),

    #[error("invalid configuration: {0}")]
    Config(String),
}
