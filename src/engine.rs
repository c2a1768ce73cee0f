//! The locator engine: one owner for every piece of map state.
//!
//! [`Locator`] ties the nearest tracker, the cluster view-model, the
//! disambiguation list and the focus controller together. The host feeds it
//! [`LocatorEvent`]s one at a time and executes the [`MapCommand`]s it returns.
//!
//! ```rust
//! use hotspot_locator::{AnonymousSession, Locator, LocatorConfig, LocatorEvent, PositionSample};
//! use serde_json::json;
//! use std::time::Instant;
//!
//! let mut locator = Locator::new(LocatorConfig::default(), Box::new(AnonymousSession));
//! let now = Instant::now();
//!
//! locator.handle(
//!     LocatorEvent::PointsLoaded(vec![json!({ "Id": 1, "LATITUDE": -20.3, "LONGITUDE": -40.3 })]),
//!     now,
//! );
//! locator.handle(LocatorEvent::PositionUpdated(PositionSample::new(-20.3005, -40.3005, 0)), now);
//!
//! let card = locator.proximity_card().unwrap();
//! assert!(card.within);
//! ```

use log::{debug, info, warn};
use serde_json::Value;
use std::time::Instant;

use crate::cluster::{ClusterId, ClusterView};
use crate::config::LocatorConfig;
use crate::disambiguation::DisambiguationFlow;
use crate::error::{LocatorError, PositionError};
use crate::focus::{FocusController, FocusState, MapCommand, MoveTicket, SelectionSource, TimerToken};
use crate::nearest::{within_threshold, NearestTracker};
use crate::normalize::{normalize_with_report, NormalizeReport};
use crate::session::SessionContext;
use crate::store::HotspotStore;
use crate::{GeoPoint, PointId, PositionSample, ProximityResult};

/// Status of the hotspot list.
#[derive(Debug, Clone, PartialEq)]
pub enum DataState {
    Loading,
    Loaded,
    /// The list could not be fetched; the engine runs with no points.
    Failed(LocatorError),
}

/// Status of the live position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionStatus {
    Waiting,
    Available,
    Unavailable(PositionError),
}

/// Everything the host reports to the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum LocatorEvent {
    /// A fresh list of raw hotspot records.
    PointsLoaded(Vec<Value>),
    PointsFailed(String),

    PositionUpdated(PositionSample),
    PositionFailed(PositionError),
    /// The host stopped listening to the position source.
    PositionUnsubscribed,

    /// The map settled at a new zoom (user gesture or a command finishing).
    ViewportChanged { zoom: u8 },
    MarkerMounted(PointId),
    MarkerUnmounted(PointId),

    ClusterActivated(ClusterId),
    ListItemSelected(PointId),
    ListDismissed,
    EscapePressed,

    MarkerActivated(PointId),
    /// The user tapped the nearest-hotspot card.
    ProximitySelected,
    BackgroundClicked,

    RevealCompleted(MoveTicket),
    MoveCompleted(MoveTicket),
    TimerFired(TimerToken),
    /// Periodic clock for hosts without timers.
    Tick,
}

/// Content of the nearest-hotspot card.
#[derive(Debug, Clone, PartialEq)]
pub struct ProximityCard {
    pub point: GeoPoint,
    pub distance_meters: f64,
    /// Close enough to count as "you are here".
    pub within: bool,
}

impl ProximityCard {
    pub fn name(&self) -> &str {
        &self.point.payload.name
    }
}

#[derive(Debug)]
pub struct Locator {
    config: LocatorConfig,
    tracker: NearestTracker,
    view: ClusterView,
    list: DisambiguationFlow,
    focus: FocusController,
    data: DataState,
    position: PositionStatus,
    last_report: NormalizeReport,
}

impl Locator {
    pub fn new(config: LocatorConfig, session: Box<dyn SessionContext>) -> Self {
        Self {
            tracker: NearestTracker::new(),
            view: ClusterView::new(&config),
            list: DisambiguationFlow::new(),
            focus: FocusController::new(&config, session),
            data: DataState::Loading,
            position: PositionStatus::Waiting,
            last_report: NormalizeReport::default(),
            config,
        }
    }

    /// Process one event and return the commands for the map.
    pub fn handle(&mut self, event: LocatorEvent, now: Instant) -> Vec<MapCommand> {
        match event {
            LocatorEvent::PointsLoaded(records) => self.load_points(&records),
            LocatorEvent::PointsFailed(reason) => {
                let err = LocatorError::Data(reason);
                warn!("[Locator] {}", err);
                self.data = DataState::Failed(err);
                self.replace_points(Vec::new())
            }

            LocatorEvent::PositionUpdated(sample) => {
                if self.tracker.update_position(sample) {
                    self.position = PositionStatus::Available;
                }
                Vec::new()
            }
            LocatorEvent::PositionFailed(err) => {
                debug!("[Locator] {}", LocatorError::from(err));
                self.tracker.clear_position();
                self.position = PositionStatus::Unavailable(err);
                Vec::new()
            }
            LocatorEvent::PositionUnsubscribed => {
                self.tracker.unsubscribe();
                self.position = PositionStatus::Waiting;
                Vec::new()
            }

            LocatorEvent::ViewportChanged { zoom } => {
                self.view.set_zoom(zoom);
                Vec::new()
            }
            LocatorEvent::MarkerMounted(id) => {
                self.view.mount_marker(&id);
                Vec::new()
            }
            LocatorEvent::MarkerUnmounted(id) => {
                self.view.unmount_marker(&id);
                self.focus.invalidate_missing(&self.view)
            }

            LocatorEvent::ClusterActivated(cluster) => {
                match self.view.cluster_members(cluster) {
                    Some(items) => self.list.activate_cluster(items),
                    None => debug!("[Locator] Ignoring activation of stale cluster {:?}", cluster),
                }
                Vec::new()
            }
            LocatorEvent::ListItemSelected(id) => match self.list.select(&id) {
                Some(id) => self.focus.select(&id, SelectionSource::List, &self.view, now),
                None => Vec::new(),
            },
            LocatorEvent::ListDismissed => {
                self.list.dismiss();
                Vec::new()
            }
            LocatorEvent::EscapePressed => {
                self.list.cancel();
                Vec::new()
            }

            LocatorEvent::MarkerActivated(id) => {
                self.focus.select(&id, SelectionSource::Marker, &self.view, now)
            }
            LocatorEvent::ProximitySelected => match self.tracker.result() {
                Some(result) => {
                    let id = result.point.id.clone();
                    self.focus.select(&id, SelectionSource::Proximity, &self.view, now)
                }
                None => Vec::new(),
            },
            LocatorEvent::BackgroundClicked => self.focus.background_click(),

            LocatorEvent::RevealCompleted(ticket) => self.focus.reveal_completed(ticket, &self.view),
            LocatorEvent::MoveCompleted(ticket) => self.focus.move_completed(ticket, &self.view, now),
            LocatorEvent::TimerFired(token) => self.focus.timer_fired(token),
            LocatorEvent::Tick => self.focus.tick(now),
        }
    }

    /// Fetch the hotspot list from `store` and load it.
    ///
    /// A failed fetch leaves the engine with no points and a `Failed` data state.
    pub fn refresh_from(&mut self, store: &dyn HotspotStore, now: Instant) -> Vec<MapCommand> {
        self.data = DataState::Loading;
        match store.list() {
            Ok(records) => self.handle(LocatorEvent::PointsLoaded(records), now),
            Err(e) => {
                if e.is_retryable() {
                    info!("[Locator] Hotspot list unavailable, will need a retry: {}", e);
                }
                self.handle(LocatorEvent::PointsFailed(e.to_string()), now)
            }
        }
    }

    fn load_points(&mut self, records: &[Value]) -> Vec<MapCommand> {
        let (points, report) = normalize_with_report(records);
        info!(
            "[Locator] Loaded {} hotspots ({} records dropped)",
            report.accepted, report.dropped
        );
        self.last_report = report;
        self.data = DataState::Loaded;
        self.replace_points(points)
    }

    fn replace_points(&mut self, points: Vec<GeoPoint>) -> Vec<MapCommand> {
        self.tracker.set_points(points.clone());
        self.view.set_points(points);

        let mut commands = self.focus.invalidate_missing(&self.view);
        let position = self.tracker.position().map(PositionSample::coords);
        if let Some(fit) = self.view.take_camera_fit(position) {
            commands.push(MapCommand::FitBounds { center: fit.center, zoom: fit.zoom });
        }
        commands
    }

    // ------------------------------------------------------------------------
    // Read side
    // ------------------------------------------------------------------------

    pub fn config(&self) -> &LocatorConfig {
        &self.config
    }

    pub fn data_state(&self) -> &DataState {
        &self.data
    }

    pub fn position_status(&self) -> PositionStatus {
        self.position
    }

    pub fn last_report(&self) -> NormalizeReport {
        self.last_report
    }

    pub fn points(&self) -> &[GeoPoint] {
        self.view.points()
    }

    pub fn proximity(&self) -> Option<&ProximityResult> {
        self.tracker.result()
    }

    pub fn proximity_card(&self) -> Option<ProximityCard> {
        let result = self.tracker.result()?;
        Some(ProximityCard {
            point: result.point.clone(),
            distance_meters: result.distance_meters,
            within: within_threshold(Some(result), self.config.proximity_threshold_meters),
        })
    }

    pub fn view(&self) -> &ClusterView {
        &self.view
    }

    pub fn disambiguation(&self) -> &DisambiguationFlow {
        &self.list
    }

    pub fn focus(&self) -> &FocusController {
        &self.focus
    }

    pub fn focus_state(&self) -> FocusState {
        self.focus.state()
    }

    pub fn can_administer(&self) -> bool {
        self.focus.can_administer()
    }
}
