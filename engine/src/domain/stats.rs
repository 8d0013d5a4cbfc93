//! Summary figures for the map side panel.

use std::collections::BTreeMap;

use serde::Serialize;

use super::geometry::{Bounds, Coordinate};
use super::poi::Poi;

/// POIs within this distance of the user count as nearby.
pub const NEARBY_RADIUS_KM: f64 = 5.0;
/// Upper bound on the nearby list.
pub const MAX_NEARBY: usize = 20;

/// A POI with its distance from the user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NearbyPoi {
    /// The POI.
    pub poi: Poi,
    /// Distance from the user in kilometres.
    pub distance_km: f64,
}

/// Aggregate view of a POI set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapStats {
    /// Number of POIs.
    pub total: usize,
    /// POIs inside the viewport; equals `total` without a viewport.
    pub visible: usize,
    /// POI count per category.
    pub by_category: BTreeMap<String, usize>,
    /// Mean rating over rated POIs, to one decimal.
    pub average_rating: Option<f64>,
    /// Closest POIs within [`NEARBY_RADIUS_KM`], nearest first.
    pub nearby: Vec<NearbyPoi>,
}

/// Summarise `pois` for the given viewport and user position.
pub fn map_stats(pois: &[Poi], bounds: Option<&Bounds>, user: Option<&Coordinate>) -> MapStats {
    let visible = pois
        .iter()
        .filter(|poi| bounds.is_none_or(|view| view.contains(&poi.coordinate())))
        .count();

    let mut by_category = BTreeMap::new();
    for poi in pois {
        *by_category.entry(poi.category.clone()).or_insert(0) += 1;
    }

    let ratings: Vec<f64> = pois
        .iter()
        .map(|poi| poi.rating)
        .filter(|rating| *rating > 0.0)
        .collect();
    let average_rating = (!ratings.is_empty()).then(|| {
        let mean = ratings.iter().sum::<f64>() / ratings.len() as f64;
        (mean * 10.0).round() / 10.0
    });

    let nearby = user.map_or_else(Vec::new, |user| nearby_pois(pois, user));

    MapStats {
        total: pois.len(),
        visible,
        by_category,
        average_rating,
        nearby,
    }
}

fn nearby_pois(pois: &[Poi], user: &Coordinate) -> Vec<NearbyPoi> {
    let mut nearby: Vec<NearbyPoi> = pois
        .iter()
        .map(|poi| NearbyPoi {
            distance_km: user.distance_to(&poi.coordinate()),
            poi: poi.clone(),
        })
        .filter(|entry| entry.distance_km <= NEARBY_RADIUS_KM)
        .collect();
    nearby.sort_by(|left, right| left.distance_km.total_cmp(&right.distance_km));
    nearby.truncate(MAX_NEARBY);
    nearby
}
