//! Zoom-dependent marker clustering.
//!
//! Decides, for the current zoom, which hotspots render as their own marker and
//! which merge into a cluster bubble. The partition is recomputed from scratch
//! whenever the point set or the zoom changes; it is never patched.
//!
//! ## Algorithm
//!
//! 1. Project every point into Web-Mercator pixel space at zoom 0 and bulk-load an
//!    R-tree (rebuilt only when the point set changes).
//! 2. At zoom `z`, the cluster radius in zoom-0 pixels is `radius_px / 2^z`.
//! 3. Visit points in input order. Each point not yet assigned seeds a group and
//!    claims every unassigned point within the radius. Members are ordered by
//!    input index.
//! 4. Groups of one are singletons; larger groups become clusters centered on the
//!    mean of their members.
//!
//! At or above `cluster_max_zoom` every point is a singleton.
//!
//! The view-model also owns the [`MarkerRegistry`] and the one-shot initial
//! camera framing.

use log::{debug, info};
use rstar::primitives::GeomWithData;
use rstar::RTree;
use std::collections::HashMap;

use crate::config::LocatorConfig;
use crate::geo_utils::{compute_bounds, fit_zoom, project, projected_center, zoom_scale};
use crate::registry::{MarkerHandle, MarkerRegistry};
use crate::{GeoPoint, LatLng, PointId};

type IndexedPoint = GeomWithData<[f64; 2], usize>;

/// Identity of a cluster bubble: the point set and zoom it was computed at,
/// and its seed point.
///
/// A cluster id from an earlier zoom or an earlier point set does not resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClusterId {
    pub generation: u32,
    pub zoom: u8,
    pub seed: u32,
}

/// A group of hotspots drawn as one bubble.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    pub id: ClusterId,
    pub center: LatLng,
    /// Members in input order
    pub child_ids: Vec<PointId>,
    pub zoom: u8,
    members: Vec<usize>,
}

impl Cluster {
    pub fn count(&self) -> usize {
        self.child_ids.len()
    }

    /// Text shown on the bubble.
    pub fn label(&self) -> String {
        self.count().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Membership {
    Singleton,
    Clustered(usize),
}

/// Clusters and singletons for one zoom level.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Partition {
    /// Point-set generation the partition was built from
    pub generation: u32,
    pub zoom: u8,
    pub clusters: Vec<Cluster>,
    pub singletons: Vec<PointId>,
    membership: HashMap<PointId, Membership>,
}

impl Partition {
    pub fn cluster_of(&self, id: &PointId) -> Option<&Cluster> {
        match self.membership.get(id)? {
            Membership::Clustered(i) => self.clusters.get(*i),
            Membership::Singleton => None,
        }
    }

    pub fn is_singleton(&self, id: &PointId) -> bool {
        matches!(self.membership.get(id), Some(Membership::Singleton))
    }

    pub fn cluster(&self, id: ClusterId) -> Option<&Cluster> {
        if id.generation != self.generation || id.zoom != self.zoom {
            return None;
        }
        self.clusters.iter().find(|c| c.id == id)
    }

    /// Every id exactly as it appears: cluster children followed by singletons.
    pub fn all_ids(&self) -> impl Iterator<Item = &PointId> {
        self.clusters
            .iter()
            .flat_map(|c| c.child_ids.iter())
            .chain(self.singletons.iter())
    }
}

/// Partition `points` at `zoom`.
fn build_partition(
    points: &[GeoPoint],
    projected: &[[f64; 2]],
    tree: &RTree<IndexedPoint>,
    generation: u32,
    zoom: u8,
    config: &LocatorConfig,
) -> Partition {
    let mut partition = Partition { generation, zoom, ..Default::default() };

    if zoom >= config.cluster_max_zoom {
        for p in points {
            partition.membership.insert(p.id.clone(), Membership::Singleton);
            partition.singletons.push(p.id.clone());
        }
        return partition;
    }

    let radius = config.cluster_radius_px / zoom_scale(zoom);
    let radius_sq = radius * radius;
    let mut assigned = vec![false; points.len()];

    for seed in 0..points.len() {
        if assigned[seed] {
            continue;
        }
        assigned[seed] = true;

        let mut members = vec![seed];
        for neighbor in tree.locate_within_distance(projected[seed], radius_sq) {
            if !assigned[neighbor.data] {
                assigned[neighbor.data] = true;
                members.push(neighbor.data);
            }
        }

        if members.len() == 1 {
            partition.membership.insert(points[seed].id.clone(), Membership::Singleton);
            partition.singletons.push(points[seed].id.clone());
            continue;
        }

        members.sort_unstable();
        let n = members.len() as f64;
        let center = LatLng::new(
            members.iter().map(|&i| points[i].lat).sum::<f64>() / n,
            members.iter().map(|&i| points[i].lng).sum::<f64>() / n,
        );
        let child_ids: Vec<PointId> = members.iter().map(|&i| points[i].id.clone()).collect();

        let slot = partition.clusters.len();
        for id in &child_ids {
            partition.membership.insert(id.clone(), Membership::Clustered(slot));
        }
        partition.clusters.push(Cluster {
            id: ClusterId { generation, zoom, seed: seed as u32 },
            center,
            child_ids,
            zoom,
            members,
        });
    }

    partition
}

/// Camera target for the initial fit-to-bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraFit {
    pub center: LatLng,
    pub zoom: u8,
}

/// View-model for the clustered marker layer.
#[derive(Debug, Clone)]
pub struct ClusterView {
    config: LocatorConfig,
    points: Vec<GeoPoint>,
    index: HashMap<PointId, usize>,
    projected: Vec<[f64; 2]>,
    tree: RTree<IndexedPoint>,
    generation: u32,
    zoom: u8,
    partition: Partition,
    registry: MarkerRegistry,
    fitted_count: Option<usize>,
}

impl ClusterView {
    pub fn new(config: &LocatorConfig) -> Self {
        let zoom = config.min_fit_zoom;
        Self {
            config: config.clone(),
            points: Vec::new(),
            index: HashMap::new(),
            projected: Vec::new(),
            tree: RTree::new(),
            generation: 0,
            zoom,
            partition: Partition { zoom, ..Default::default() },
            registry: MarkerRegistry::new(),
            fitted_count: None,
        }
    }

    /// Replace the point set and re-cluster.
    ///
    /// Cluster ids handed out before the call stop resolving. Markers of points
    /// that left the set are unmounted; points new to the set get a marker.
    /// Points that stay keep whatever mount state the host left them in.
    pub fn set_points(&mut self, points: Vec<GeoPoint>) {
        self.generation = self.generation.wrapping_add(1);
        self.projected = points.iter().map(|p| project(&p.coords())).collect();
        self.tree = RTree::bulk_load(
            self.projected
                .iter()
                .enumerate()
                .map(|(i, xy)| IndexedPoint::new(*xy, i))
                .collect(),
        );

        let previous = std::mem::take(&mut self.index);
        for (i, p) in points.iter().enumerate() {
            self.index.entry(p.id.clone()).or_insert(i);
        }
        self.points = points;

        let removed = self.registry.retain(|id| self.index.contains_key(id));
        for id in self.index.keys() {
            if !previous.contains_key(id) {
                self.registry.mount(id.clone());
            }
        }

        self.recompute();
        debug!(
            "[ClusterView] {} points, {} markers unmounted, {} clusters at zoom {}",
            self.points.len(),
            removed,
            self.partition.clusters.len(),
            self.zoom
        );
    }

    /// Apply a zoom change from the map. Returns `true` if the partition changed zoom.
    pub fn set_zoom(&mut self, zoom: u8) -> bool {
        let zoom = zoom.min(self.config.max_zoom);
        if zoom == self.zoom {
            return false;
        }
        self.zoom = zoom;
        self.recompute();
        true
    }

    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn points(&self) -> &[GeoPoint] {
        &self.points
    }

    pub fn point(&self, id: &PointId) -> Option<&GeoPoint> {
        self.index.get(id).map(|&i| &self.points[i])
    }

    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    pub fn clusters(&self) -> &[Cluster] {
        &self.partition.clusters
    }

    pub fn singletons(&self) -> &[PointId] {
        &self.partition.singletons
    }

    pub fn cluster(&self, id: ClusterId) -> Option<&Cluster> {
        self.partition.cluster(id)
    }

    pub fn cluster_of(&self, id: &PointId) -> Option<&Cluster> {
        self.partition.cluster_of(id)
    }

    /// Member points of a current cluster, in child order.
    pub fn cluster_members(&self, id: ClusterId) -> Option<Vec<GeoPoint>> {
        let cluster = self.cluster(id)?;
        Some(cluster.members.iter().map(|&i| self.points[i].clone()).collect())
    }

    /// Whether the point currently renders as its own marker.
    pub fn is_individually_visible(&self, id: &PointId) -> bool {
        self.partition.is_singleton(id)
    }

    /// Lowest zoom, no lower than the current one, at which the point renders
    /// as its own marker. `None` if the point is unknown or never separates
    /// within the map's zoom range.
    pub fn reveal_zoom(&self, id: &PointId) -> Option<u8> {
        if !self.index.contains_key(id) {
            return None;
        }
        (self.zoom..=self.config.max_zoom).find(|&z| {
            z >= self.config.cluster_max_zoom || self.cluster_points(z).is_singleton(id)
        })
    }

    /// Partition at an arbitrary zoom without changing the view.
    pub fn cluster_points(&self, zoom: u8) -> Partition {
        if zoom == self.partition.zoom {
            return self.partition.clone();
        }
        build_partition(
            &self.points,
            &self.projected,
            &self.tree,
            self.generation,
            zoom,
            &self.config,
        )
    }

    // ------------------------------------------------------------------------
    // Marker registry
    // ------------------------------------------------------------------------

    pub fn registry(&self) -> &MarkerRegistry {
        &self.registry
    }

    pub fn marker(&self, id: &PointId) -> Option<MarkerHandle> {
        self.registry.get(id)
    }

    /// Register a marker mounted by the host. Ignored for unknown points.
    pub fn mount_marker(&mut self, id: &PointId) -> Option<MarkerHandle> {
        if !self.index.contains_key(id) {
            return None;
        }
        Some(self.registry.mount(id.clone()))
    }

    pub fn unmount_marker(&mut self, id: &PointId) -> Option<MarkerHandle> {
        self.registry.unmount(id)
    }

    // ------------------------------------------------------------------------
    // Initial framing
    // ------------------------------------------------------------------------

    /// Frame all points plus the live position, once per distinct point count.
    ///
    /// Returns `None` when there is nothing to frame or the current count has
    /// already been framed. User pans and zooms never re-arm the fit; only a
    /// change in the number of points does. Applying the fit moves the view to
    /// the returned zoom.
    pub fn take_camera_fit(&mut self, position: Option<LatLng>) -> Option<CameraFit> {
        if self.points.is_empty() || self.fitted_count == Some(self.points.len()) {
            return None;
        }

        let mut coords: Vec<LatLng> = self.points.iter().map(GeoPoint::coords).collect();
        coords.extend(position.filter(LatLng::is_valid));
        let bounds = compute_bounds(&coords)?;

        let zoom = fit_zoom(
            &bounds,
            self.config.viewport(),
            self.config.fit_padding_px,
            self.config.max_zoom,
        )
        .max(self.config.min_fit_zoom);
        let fit = CameraFit { center: projected_center(&bounds), zoom };

        self.fitted_count = Some(self.points.len());
        self.set_zoom(zoom);
        info!(
            "[ClusterView] Framing {} points at zoom {} ({:.5}, {:.5})",
            self.points.len(),
            zoom,
            fit.center.lat,
            fit.center.lng
        );
        Some(fit)
    }

    fn recompute(&mut self) {
        self.partition = build_partition(
            &self.points,
            &self.projected,
            &self.tree,
            self.generation,
            self.zoom,
            &self.config,
        );
    }
}
