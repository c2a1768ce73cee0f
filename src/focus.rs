//! Focus controller: reveal, fly-to, highlight and timed decay for one marker.
//!
//! The controller never touches the map directly. Every transition returns the
//! [`MapCommand`]s the host should run, and the host reports back when camera
//! moves finish and timers fire.
//!
//! ## States
//!
//! ```text
//!   Idle ──select──▶ Focusing(Revealing) ──reveal done──▶ Focusing(Flying)
//!     ▲                    │                                   │
//!     │                    └──────── (already visible) ────────┤
//!     │                                                        ▼ move done
//!     └────────── timer / background click ─────────── Focused(expires_at)
//! ```
//!
//! Only one target is meaningful at a time. A new selection preempts whatever is
//! in flight; the old move's completion then carries a stale [`MoveTicket`] and
//! is ignored. Decay timers are guarded the same way with [`TimerToken`].

use log::{debug, warn};
use std::time::{Duration, Instant};

use crate::cluster::ClusterView;
use crate::config::LocatorConfig;
use crate::error::LocatorError;
use crate::registry::MarkerHandle;
use crate::session::SessionContext;
use crate::{LatLng, PointId};

/// Where a selection came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionSource {
    List,
    Proximity,
    Marker,
}

/// Identifies one requested camera move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MoveTicket(u64);

/// Identifies one scheduled decay timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerToken(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPhase {
    /// Zooming until the marker leaves its cluster.
    Revealing,
    /// Animating the camera onto the marker.
    Flying,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FocusStatus {
    Idle,
    Focusing {
        target: PointId,
        phase: FocusPhase,
        ticket: MoveTicket,
        marker: MarkerHandle,
    },
    Focused {
        target: PointId,
        expires_at: Instant,
        timer: TimerToken,
        marker: MarkerHandle,
    },
}

/// Observable focus: which point is highlighted and until when.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FocusState {
    pub target: Option<PointId>,
    pub expires_at: Option<Instant>,
}

/// Side effects for the host map.
#[derive(Debug, Clone, PartialEq)]
pub enum MapCommand {
    FitBounds { center: LatLng, zoom: u8 },
    /// Zoom into clusters until `marker` renders on its own.
    Reveal {
        target: PointId,
        marker: MarkerHandle,
        zoom: u8,
        ticket: MoveTicket,
    },
    /// Animated camera move onto the target.
    FlyTo {
        target: PointId,
        to: LatLng,
        zoom: u8,
        ticket: MoveTicket,
    },
    Highlight { marker: MarkerHandle },
    ClearHighlight { marker: MarkerHandle },
    OpenPopup { marker: MarkerHandle },
    ScheduleTimer { token: TimerToken, at: Instant },
    CancelTimer { token: TimerToken },
}

pub struct FocusController {
    ttl: Duration,
    focus_min_zoom: u8,
    reveal_supported: bool,
    session: Box<dyn SessionContext>,
    status: FocusStatus,
    next_ticket: u64,
    next_timer: u64,
}

impl std::fmt::Debug for FocusController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FocusController")
            .field("ttl", &self.ttl)
            .field("focus_min_zoom", &self.focus_min_zoom)
            .field("reveal_supported", &self.reveal_supported)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

impl FocusController {
    pub fn new(config: &LocatorConfig, session: Box<dyn SessionContext>) -> Self {
        Self {
            ttl: config.focus_ttl(),
            focus_min_zoom: config.focus_min_zoom,
            reveal_supported: config.reveal_supported,
            session,
            status: FocusStatus::Idle,
            next_ticket: 0,
            next_timer: 0,
        }
    }

    pub fn status(&self) -> &FocusStatus {
        &self.status
    }

    pub fn state(&self) -> FocusState {
        match &self.status {
            FocusStatus::Idle => FocusState::default(),
            FocusStatus::Focusing { target, .. } => FocusState {
                target: Some(target.clone()),
                expires_at: None,
            },
            FocusStatus::Focused { target, expires_at, .. } => FocusState {
                target: Some(target.clone()),
                expires_at: Some(*expires_at),
            },
        }
    }

    pub fn target(&self) -> Option<&PointId> {
        match &self.status {
            FocusStatus::Idle => None,
            FocusStatus::Focusing { target, .. } | FocusStatus::Focused { target, .. } => Some(target),
        }
    }

    pub fn is_idle(&self) -> bool {
        self.status == FocusStatus::Idle
    }

    /// Whether the signed-in user may edit hotspots.
    pub fn can_administer(&self) -> bool {
        self.session.can_administer()
    }

    /// Start focusing `id`.
    ///
    /// Re-selecting the point that is already focused only restarts its decay
    /// timer. Anything else preempts the current request. A point without a live
    /// marker leaves the controller idle.
    pub fn select(
        &mut self,
        id: &PointId,
        source: SelectionSource,
        view: &ClusterView,
        now: Instant,
    ) -> Vec<MapCommand> {
        let mut commands = Vec::new();

        if let FocusStatus::Focused { target, timer, marker, .. } = &self.status {
            if target == id && view.registry().is_live(*marker) {
                let (old, marker) = (*timer, *marker);
                let token = self.next_timer_token();
                let expires_at = now + self.ttl;
                commands.push(MapCommand::CancelTimer { token: old });
                commands.push(MapCommand::ScheduleTimer { token, at: expires_at });
                self.status = FocusStatus::Focused {
                    target: id.clone(),
                    expires_at,
                    timer: token,
                    marker,
                };
                debug!("[FocusController] Restarted decay for {id}");
                return commands;
            }
        }

        self.release(&mut commands);

        let (Some(marker), Some(point)) = (view.marker(id), view.point(id)) else {
            warn!("[FocusController] {}", LocatorError::FocusTargetMissing(id.clone()));
            return commands;
        };

        debug!("[FocusController] Focusing {id} from {source:?}");
        let ticket = self.next_move_ticket();

        if self.reveal_supported && !view.is_individually_visible(id) {
            if let Some(zoom) = view.reveal_zoom(id) {
                commands.push(MapCommand::Reveal {
                    target: id.clone(),
                    marker,
                    zoom,
                    ticket,
                });
                self.status = FocusStatus::Focusing {
                    target: id.clone(),
                    phase: FocusPhase::Revealing,
                    ticket,
                    marker,
                };
                return commands;
            }
        }

        commands.push(MapCommand::FlyTo {
            target: id.clone(),
            to: point.coords(),
            zoom: self.fly_zoom(view),
            ticket,
        });
        self.status = FocusStatus::Focusing {
            target: id.clone(),
            phase: FocusPhase::Flying,
            ticket,
            marker,
        };
        commands
    }

    /// The host finished a reveal; continue with the camera move.
    pub fn reveal_completed(&mut self, ticket: MoveTicket, view: &ClusterView) -> Vec<MapCommand> {
        let FocusStatus::Focusing {
            target,
            phase: FocusPhase::Revealing,
            ticket: current,
            marker,
        } = &self.status
        else {
            return Vec::new();
        };
        if *current != ticket {
            debug!("[FocusController] Ignoring stale reveal completion");
            return Vec::new();
        }

        let (target, marker) = (target.clone(), *marker);
        let point = match view.point(&target) {
            Some(p) if view.registry().is_live(marker) => p,
            _ => {
                warn!("[FocusController] {}", LocatorError::FocusTargetMissing(target));
                self.status = FocusStatus::Idle;
                return Vec::new();
            }
        };

        let ticket = self.next_move_ticket();
        let command = MapCommand::FlyTo {
            target: target.clone(),
            to: point.coords(),
            zoom: self.fly_zoom(view),
            ticket,
        };
        self.status = FocusStatus::Focusing {
            target,
            phase: FocusPhase::Flying,
            ticket,
            marker,
        };
        vec![command]
    }

    /// The host finished the camera move; highlight, open the popup and start
    /// the decay timer.
    pub fn move_completed(
        &mut self,
        ticket: MoveTicket,
        view: &ClusterView,
        now: Instant,
    ) -> Vec<MapCommand> {
        let FocusStatus::Focusing {
            target,
            phase: FocusPhase::Flying,
            ticket: current,
            marker,
        } = &self.status
        else {
            return Vec::new();
        };
        if *current != ticket {
            debug!("[FocusController] Ignoring stale move completion");
            return Vec::new();
        }

        let (target, marker) = (target.clone(), *marker);
        if !view.registry().is_live(marker) {
            warn!("[FocusController] {}", LocatorError::FocusTargetMissing(target));
            self.status = FocusStatus::Idle;
            return Vec::new();
        }

        let token = self.next_timer_token();
        let expires_at = now + self.ttl;
        self.status = FocusStatus::Focused {
            target,
            expires_at,
            timer: token,
            marker,
        };
        vec![
            MapCommand::Highlight { marker },
            MapCommand::OpenPopup { marker },
            MapCommand::ScheduleTimer { token, at: expires_at },
        ]
    }

    /// A decay timer fired. Only the current timer ends the focus.
    pub fn timer_fired(&mut self, token: TimerToken) -> Vec<MapCommand> {
        match &self.status {
            FocusStatus::Focused { timer, marker, .. } if *timer == token => {
                let marker = *marker;
                self.status = FocusStatus::Idle;
                vec![MapCommand::ClearHighlight { marker }]
            }
            _ => {
                debug!("[FocusController] Ignoring stale timer {token:?}");
                Vec::new()
            }
        }
    }

    /// Expire the focus if its deadline has passed, for hosts that poll
    /// instead of running timers.
    pub fn tick(&mut self, now: Instant) -> Vec<MapCommand> {
        match &self.status {
            FocusStatus::Focused { expires_at, .. } if now >= *expires_at => {
                let mut commands = Vec::new();
                self.release(&mut commands);
                commands
            }
            _ => Vec::new(),
        }
    }

    /// The user clicked the map away from any marker.
    pub fn background_click(&mut self) -> Vec<MapCommand> {
        let mut commands = Vec::new();
        self.release(&mut commands);
        commands
    }

    /// Drop the focus if its marker went away (e.g. after a data refresh).
    pub fn invalidate_missing(&mut self, view: &ClusterView) -> Vec<MapCommand> {
        let marker = match &self.status {
            FocusStatus::Idle => return Vec::new(),
            FocusStatus::Focusing { marker, .. } | FocusStatus::Focused { marker, .. } => *marker,
        };
        if view.registry().is_live(marker) {
            return Vec::new();
        }
        if let Some(target) = self.target() {
            debug!("[FocusController] Focus target {target} no longer mounted");
        }
        // The marker is gone, so there is no highlight left to clear
        let commands = match &self.status {
            FocusStatus::Focused { timer, .. } => vec![MapCommand::CancelTimer { token: *timer }],
            _ => Vec::new(),
        };
        self.status = FocusStatus::Idle;
        commands
    }

    fn release(&mut self, commands: &mut Vec<MapCommand>) {
        if let FocusStatus::Focused { timer, marker, .. } = &self.status {
            commands.push(MapCommand::ClearHighlight { marker: *marker });
            commands.push(MapCommand::CancelTimer { token: *timer });
        }
        self.status = FocusStatus::Idle;
    }

    /// Focusing never zooms out.
    fn fly_zoom(&self, view: &ClusterView) -> u8 {
        view.zoom().max(self.focus_min_zoom)
    }

    fn next_move_ticket(&mut self) -> MoveTicket {
        self.next_ticket += 1;
        MoveTicket(self.next_ticket)
    }

    fn next_timer_token(&mut self) -> TimerToken {
        self.next_timer += 1;
        TimerToken(self.next_timer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;
    use crate::session::{AnonymousSession, AuthenticatedUser, StaticSession};
    use serde_json::json;

    const TTL: Duration = Duration::from_millis(4000);

    fn view(coords: &[(f64, f64)], zoom: u8) -> ClusterView {
        let records: Vec<_> = coords
            .iter()
            .enumerate()
            .map(|(i, (lat, lng))| json!({ "Id": i + 1, "LATITUDE": lat, "LONGITUDE": lng }))
            .collect();
        let mut view = ClusterView::new(&LocatorConfig::default());
        view.set_points(normalize(&records));
        view.set_zoom(zoom);
        view
    }

    fn controller() -> FocusController {
        FocusController::new(&LocatorConfig::default(), Box::new(AnonymousSession))
    }

    fn id(s: &str) -> PointId {
        PointId::from(s)
    }

    fn ticket_of(commands: &[MapCommand]) -> MoveTicket {
        commands
            .iter()
            .find_map(|c| match c {
                MapCommand::Reveal { ticket, .. } | MapCommand::FlyTo { ticket, .. } => Some(*ticket),
                _ => None,
            })
            .expect("no camera move issued")
    }

    fn timer_of(commands: &[MapCommand]) -> TimerToken {
        commands
            .iter()
            .find_map(|c| match c {
                MapCommand::ScheduleTimer { token, .. } => Some(*token),
                _ => None,
            })
            .expect("no timer scheduled")
    }

    /// Drive a selection of a visible point all the way to Focused.
    fn focus(c: &mut FocusController, v: &ClusterView, target: &str, now: Instant) -> TimerToken {
        let cmds = c.select(&id(target), SelectionSource::Marker, v, now);
        let cmds = c.move_completed(ticket_of(&cmds), v, now);
        timer_of(&cmds)
    }

    #[test]
    fn test_visible_point_flies_directly() {
        let v = view(&[(-20.3, -40.3), (10.0, 10.0)], 12);
        let mut c = controller();
        let cmds = c.select(&id("1"), SelectionSource::Proximity, &v, Instant::now());

        assert_eq!(cmds.len(), 1);
        match &cmds[0] {
            MapCommand::FlyTo { target, to, zoom, .. } => {
                assert_eq!(target, &id("1"));
                assert_eq!(*to, LatLng::new(-20.3, -40.3));
                assert_eq!(*zoom, 19);
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert!(matches!(c.status(), FocusStatus::Focusing { phase: FocusPhase::Flying, .. }));
        assert_eq!(c.state().target, Some(id("1")));
        assert!(c.state().expires_at.is_none());
    }

    #[test]
    fn test_clustered_point_reveals_before_flying() {
        let v = view(&[(-20.3, -40.3), (-20.3, -40.3005)], 10);
        let mut c = controller();
        let cmds = c.select(&id("2"), SelectionSource::List, &v, Instant::now());

        match &cmds[..] {
            [MapCommand::Reveal { target, zoom, .. }] => {
                assert_eq!(target, &id("2"));
                assert_eq!(*zoom, 18);
            }
            other => panic!("unexpected commands {other:?}"),
        }

        // Popup must wait for the camera: a move completion during reveal does nothing
        let reveal = ticket_of(&cmds);
        assert!(c.move_completed(reveal, &v, Instant::now()).is_empty());

        let fly = c.reveal_completed(reveal, &v);
        assert!(matches!(fly[..], [MapCommand::FlyTo { .. }]));
        assert!(matches!(c.status(), FocusStatus::Focusing { phase: FocusPhase::Flying, .. }));
    }

    #[test]
    fn test_without_reveal_flies_straight_into_cluster() {
        let config = LocatorConfig { reveal_supported: false, ..Default::default() };
        let v = view(&[(-20.3, -40.3), (-20.3, -40.3005)], 10);
        let mut c = FocusController::new(&config, Box::new(AnonymousSession));
        let cmds = c.select(&id("2"), SelectionSource::List, &v, Instant::now());
        assert!(matches!(cmds[..], [MapCommand::FlyTo { zoom: 19, .. }]));
    }

    #[test]
    fn test_fly_never_zooms_out() {
        let config = LocatorConfig { focus_min_zoom: 15, ..Default::default() };
        let v = view(&[(-20.3, -40.3)], 18);
        let mut c = FocusController::new(&config, Box::new(AnonymousSession));
        let cmds = c.select(&id("1"), SelectionSource::Marker, &v, Instant::now());
        assert!(matches!(cmds[..], [MapCommand::FlyTo { zoom: 18, .. }]));
    }

    #[test]
    fn test_move_completion_highlights_and_schedules() {
        let v = view(&[(-20.3, -40.3)], 12);
        let mut c = controller();
        let now = Instant::now();
        let marker = v.marker(&id("1")).unwrap();

        let cmds = c.select(&id("1"), SelectionSource::Marker, &v, now);
        let cmds = c.move_completed(ticket_of(&cmds), &v, now);
        let token = timer_of(&cmds);
        assert_eq!(
            cmds,
            vec![
                MapCommand::Highlight { marker },
                MapCommand::OpenPopup { marker },
                MapCommand::ScheduleTimer { token, at: now + TTL },
            ]
        );
        assert_eq!(c.state().expires_at, Some(now + TTL));
    }

    #[test]
    fn test_missing_target_stays_idle() {
        let v = view(&[(-20.3, -40.3)], 12);
        let mut c = controller();
        let cmds = c.select(&id("404"), SelectionSource::List, &v, Instant::now());
        assert!(cmds.is_empty());
        assert!(c.is_idle());
    }

    #[test]
    fn test_missing_target_still_releases_previous_focus() {
        let v = view(&[(-20.3, -40.3)], 12);
        let mut c = controller();
        let now = Instant::now();
        let token = focus(&mut c, &v, "1", now);

        let cmds = c.select(&id("404"), SelectionSource::List, &v, now);
        assert!(cmds.contains(&MapCommand::CancelTimer { token }));
        assert!(c.is_idle());
    }

    #[test]
    fn test_ttl_expires_exactly_once() {
        let v = view(&[(-20.3, -40.3)], 12);
        let mut c = controller();
        let start = Instant::now();
        let token = focus(&mut c, &v, "1", start);

        assert!(c.tick(start + TTL - Duration::from_millis(1)).is_empty());
        assert!(matches!(c.status(), FocusStatus::Focused { .. }));

        let cmds = c.tick(start + TTL);
        assert!(matches!(cmds[0], MapCommand::ClearHighlight { .. }));
        assert!(c.is_idle());

        assert!(c.tick(start + TTL * 2).is_empty());
        assert!(c.timer_fired(token).is_empty());
    }

    #[test]
    fn test_timer_fired_ends_focus() {
        let v = view(&[(-20.3, -40.3)], 12);
        let mut c = controller();
        let token = focus(&mut c, &v, "1", Instant::now());
        let cmds = c.timer_fired(token);
        assert!(matches!(cmds[..], [MapCommand::ClearHighlight { .. }]));
        assert!(c.is_idle());
    }

    #[test]
    fn test_reselect_restarts_ttl() {
        let v = view(&[(-20.3, -40.3)], 12);
        let mut c = controller();
        let start = Instant::now();
        let first = focus(&mut c, &v, "1", start);

        let almost = TTL - Duration::from_millis(500);
        let t1 = start + almost;
        let cmds = c.select(&id("1"), SelectionSource::Marker, &v, t1);
        // No camera move on re-select
        assert!(cmds.iter().all(|c| !matches!(c, MapCommand::FlyTo { .. } | MapCommand::Reveal { .. })));
        assert!(cmds.contains(&MapCommand::CancelTimer { token: first }));
        let second = timer_of(&cmds);

        let t2 = t1 + almost;
        assert!(c.tick(t2).is_empty());
        assert!(c.timer_fired(first).is_empty());
        assert_eq!(c.state().target, Some(id("1")));
        assert_eq!(c.state().expires_at, Some(t1 + TTL));

        assert!(!c.timer_fired(second).is_empty());
        assert!(c.is_idle());
    }

    #[test]
    fn test_preemption_makes_old_ticket_stale() {
        let v = view(&[(-20.3, -40.3), (10.0, 10.0)], 12);
        let mut c = controller();
        let now = Instant::now();

        let first = ticket_of(&c.select(&id("1"), SelectionSource::List, &v, now));
        let second = ticket_of(&c.select(&id("2"), SelectionSource::List, &v, now));
        assert_ne!(first, second);

        assert!(c.move_completed(first, &v, now).is_empty());
        assert_eq!(c.target(), Some(&id("2")));

        assert!(!c.move_completed(second, &v, now).is_empty());
        assert!(matches!(c.status(), FocusStatus::Focused { target, .. } if target == &id("2")));
    }

    #[test]
    fn test_preempting_focused_clears_highlight() {
        let v = view(&[(-20.3, -40.3), (10.0, 10.0)], 12);
        let mut c = controller();
        let now = Instant::now();
        let token = focus(&mut c, &v, "1", now);
        let marker = v.marker(&id("1")).unwrap();

        let cmds = c.select(&id("2"), SelectionSource::Marker, &v, now);
        assert_eq!(cmds[0], MapCommand::ClearHighlight { marker });
        assert_eq!(cmds[1], MapCommand::CancelTimer { token });
        assert!(matches!(cmds[2], MapCommand::FlyTo { .. }));
        // The replaced timer no longer counts
        assert!(c.timer_fired(token).is_empty());
    }

    #[test]
    fn test_background_click_clears_immediately() {
        let v = view(&[(-20.3, -40.3)], 12);
        let mut c = controller();
        let now = Instant::now();
        focus(&mut c, &v, "1", now);
        let cmds = c.background_click();
        assert_eq!(cmds.len(), 2);
        assert!(c.is_idle());

        // Also cancels an in-flight move
        let ticket = ticket_of(&c.select(&id("1"), SelectionSource::List, &v, now));
        assert!(c.background_click().is_empty());
        assert!(c.move_completed(ticket, &v, now).is_empty());
        assert!(c.is_idle());
    }

    #[test]
    fn test_unmounted_marker_aborts_focus() {
        let mut v = view(&[(-20.3, -40.3)], 12);
        let mut c = controller();
        let now = Instant::now();
        let ticket = ticket_of(&c.select(&id("1"), SelectionSource::List, &v, now));

        v.unmount_marker(&id("1"));
        assert!(c.move_completed(ticket, &v, now).is_empty());
        assert!(c.is_idle());
    }

    #[test]
    fn test_invalidate_missing_after_refresh() {
        let mut v = view(&[(-20.3, -40.3), (10.0, 10.0)], 12);
        let mut c = controller();
        focus(&mut c, &v, "2", Instant::now());

        v.set_points(normalize(&[json!({ "Id": 1, "LATITUDE": -20.3, "LONGITUDE": -40.3 })]));
        c.invalidate_missing(&v);
        assert!(c.is_idle());
    }

    #[test]
    fn test_invalidate_missing_cancels_decay_timer() {
        let mut v = view(&[(-20.3, -40.3)], 12);
        let mut c = controller();
        let token = focus(&mut c, &v, "1", Instant::now());

        v.unmount_marker(&id("1"));
        assert_eq!(c.invalidate_missing(&v), vec![MapCommand::CancelTimer { token }]);
        assert!(c.is_idle());
        assert!(c.timer_fired(token).is_empty());
    }

    #[test]
    fn test_invalidate_missing_while_flying_issues_nothing() {
        let mut v = view(&[(-20.3, -40.3)], 12);
        let mut c = controller();
        c.select(&id("1"), SelectionSource::Marker, &v, Instant::now());

        v.unmount_marker(&id("1"));
        assert!(c.invalidate_missing(&v).is_empty());
        assert!(c.is_idle());
    }

    #[test]
    fn test_can_administer_reads_session() {
        assert!(!controller().can_administer());

        let admin = StaticSession::new(AuthenticatedUser {
            id: "7".into(),
            name: "Admin".into(),
            is_admin: true,
        });
        let c = FocusController::new(&LocatorConfig::default(), Box::new(admin));
        assert!(c.can_administer());
    }
}
