//! Driven port for searching named places around a point.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::NetworkError;
use crate::domain::geometry::Coordinate;

/// A named place found near a search centre.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearbyPlace {
    /// `{element_type}-{element_id}`.
    pub id: String,
    /// Place name.
    pub name: String,
    /// Derived category (`restaurant`, `hotel`, `service`, `attraction`,
    /// `shopping` or `other`).
    pub category: String,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Distance from the search centre, rounded to two decimals.
    pub distance_km: f64,
    /// Address assembled from the place's tags.
    pub address: Option<String>,
    /// Raw provider tags.
    pub tags: BTreeMap<String, String>,
}

/// Port for place lookups.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PlaceSearchSource: Send + Sync {
    /// Find places whose name matches `query` near `around`.
    async fn search_places(
        &self,
        query: &str,
        around: Coordinate,
    ) -> Result<Vec<NearbyPlace>, NetworkError>;

    /// Find places within `radius_km` of `center`, optionally restricted to a
    /// category.
    async fn nearby_places(
        &self,
        center: Coordinate,
        radius_km: f64,
        category: Option<String>,
    ) -> Result<Vec<NearbyPlace>, NetworkError>;
}

/// Source that never finds anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixturePlaceSearchSource;

#[async_trait]
impl PlaceSearchSource for FixturePlaceSearchSource {
    async fn search_places(
        &self,
        _query: &str,
        _around: Coordinate,
    ) -> Result<Vec<NearbyPlace>, NetworkError> {
        Ok(Vec::new())
    }

    async fn nearby_places(
        &self,
        _center: Coordinate,
        _radius_km: f64,
        _category: Option<String>,
    ) -> Result<Vec<NearbyPlace>, NetworkError> {
        Ok(Vec::new())
    }
}
