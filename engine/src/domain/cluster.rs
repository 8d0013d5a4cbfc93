//! Screen-space marker clustering.
//!
//! Clusters are ephemeral: they are recomputed from the visible markers for
//! the current zoom and never carried across recompute cycles. Markers are
//! visited in POI id order so the membership is a pure function of the
//! inputs, whatever sequence of updates produced them.

use serde::{Deserialize, Serialize};

use super::geometry::{Coordinate, PixelPoint, project};
use super::poi::PoiId;

/// Clustering thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterConfig {
    /// Markers closer than this many screen pixels are grouped.
    pub radius_px: f64,
    /// At or above this zoom every POI renders individually.
    pub max_zoom: u8,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            radius_px: 80.0,
            max_zoom: 17,
        }
    }
}

impl ClusterConfig {
    /// Whether clustering applies at `zoom`.
    pub const fn enabled_at(&self, zoom: u8) -> bool {
        zoom < self.max_zoom
    }
}

/// Cluster icon size bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterTier {
    /// Fewer than 10 members.
    Small,
    /// 10 to 99 members.
    Medium,
    /// 100 members or more.
    Large,
}

impl ClusterTier {
    /// Bucket for a member count; lower bounds are inclusive.
    pub const fn for_count(count: usize) -> Self {
        match count {
            0..10 => Self::Small,
            10..100 => Self::Medium,
            _ => Self::Large,
        }
    }
}

/// Group of nearby markers rendered as one icon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    /// Number of members.
    pub count: usize,
    /// Mean position of the members.
    pub centroid: Coordinate,
    /// Member POI ids in ascending order.
    pub member_ids: Vec<PoiId>,
    /// Icon size bucket.
    pub tier: ClusterTier,
}

#[derive(Debug)]
struct Accumulator {
    members: Vec<PoiId>,
    pixel_sum: PixelPoint,
    latitude_sum: f64,
    longitude_sum: f64,
}

impl Accumulator {
    fn seed(id: PoiId, coordinate: Coordinate, pixel: PixelPoint) -> Self {
        Self {
            members: vec![id],
            pixel_sum: pixel,
            latitude_sum: coordinate.latitude,
            longitude_sum: coordinate.longitude,
        }
    }

    fn len_f64(&self) -> f64 {
        self.members.len() as f64
    }

    fn pixel_centroid(&self) -> PixelPoint {
        let n = self.len_f64();
        PixelPoint {
            x: self.pixel_sum.x / n,
            y: self.pixel_sum.y / n,
        }
    }

    fn push(&mut self, id: PoiId, coordinate: Coordinate, pixel: PixelPoint) {
        self.members.push(id);
        self.pixel_sum.x += pixel.x;
        self.pixel_sum.y += pixel.y;
        self.latitude_sum += coordinate.latitude;
        self.longitude_sum += coordinate.longitude;
    }

    fn finish(self) -> Cluster {
        let n = self.len_f64();
        let count = self.members.len();
        Cluster {
            count,
            centroid: Coordinate::new(self.latitude_sum / n, self.longitude_sum / n),
            member_ids: self.members,
            tier: ClusterTier::for_count(count),
        }
    }
}

/// Group markers whose screen-space separation falls below the radius.
///
/// Each marker joins the first existing group whose pixel centroid lies
/// strictly within `radius_px`, or seeds a new one. Only groups with two or
/// more members are returned; singletons render as plain markers. Returns
/// nothing when clustering is disabled at `zoom`.
pub fn compute_clusters<'a, I>(markers: I, zoom: u8, config: &ClusterConfig) -> Vec<Cluster>
where
    I: IntoIterator<Item = (&'a PoiId, Coordinate)>,
{
    if !config.enabled_at(zoom) {
        return Vec::new();
    }

    let mut ordered: Vec<(&PoiId, Coordinate)> = markers.into_iter().collect();
    ordered.sort_by(|left, right| left.0.cmp(right.0));

    let mut groups: Vec<Accumulator> = Vec::new();
    for (id, coordinate) in ordered {
        let pixel = project(&coordinate, zoom);
        let target = groups
            .iter_mut()
            .find(|group| group.pixel_centroid().distance_to(&pixel) < config.radius_px);
        match target {
            Some(group) => group.push(id.clone(), coordinate, pixel),
            None => groups.push(Accumulator::seed(id.clone(), coordinate, pixel)),
        }
    }

    groups
        .into_iter()
        .filter(|group| group.members.len() > 1)
        .map(Accumulator::finish)
        .collect()
}
