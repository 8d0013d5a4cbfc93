//! Driven port for fetching POI snapshots.
//!
//! Whatever the source returns is treated as an authoritative full
//! replacement of the engine's working set for that scope.

use async_trait::async_trait;

use super::NetworkError;
use crate::domain::geometry::Coordinate;
use crate::domain::poi::Poi;

/// Radius query around a centre point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearbyQuery {
    /// Search centre.
    pub center: Coordinate,
    /// Search radius in kilometres.
    pub radius_km: f64,
    /// Maximum number of POIs the source should return.
    pub limit: usize,
}

/// Port for loading POIs from the backing API or store.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PoiSource: Send + Sync {
    /// Fetch POIs within a radius of a point.
    async fn nearby(&self, query: &NearbyQuery) -> Result<Vec<Poi>, NetworkError>;

    /// Fetch POIs matching a free-text query.
    async fn search(&self, query: &str) -> Result<Vec<Poi>, NetworkError>;
}

/// In-memory source serving a fixed snapshot.
///
/// `nearby` keeps POIs within the radius (nearest first, truncated to the
/// limit); `search` keeps POIs whose name contains the query,
/// case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct FixturePoiSource {
    pois: Vec<Poi>,
}

impl FixturePoiSource {
    /// Serve the given snapshot.
    pub const fn new(pois: Vec<Poi>) -> Self {
        Self { pois }
    }
}

#[async_trait]
impl PoiSource for FixturePoiSource {
    async fn nearby(&self, query: &NearbyQuery) -> Result<Vec<Poi>, NetworkError> {
        let mut within: Vec<(f64, &Poi)> = self
            .pois
            .iter()
            .map(|poi| (query.center.distance_to(&poi.coordinate()), poi))
            .filter(|(distance, _)| *distance <= query.radius_km)
            .collect();
        within.sort_by(|left, right| left.0.total_cmp(&right.0));
        Ok(within
            .into_iter()
            .take(query.limit)
            .map(|(_, poi)| poi.clone())
            .collect())
    }

    async fn search(&self, query: &str) -> Result<Vec<Poi>, NetworkError> {
        let needle = query.trim().to_lowercase();
        Ok(self
            .pois
            .iter()
            .filter(|poi| poi.name.to_lowercase().contains(&needle))
            .cloned()
            .collect())
    }
}
