//! Multi-predicate POI filtering.
//!
//! Present dimensions combine with AND; multi-valued dimensions (`categories`,
//! `features`) combine internally with OR. An absent dimension, or an empty
//! set, imposes no constraint.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::geometry::{Coordinate, distance_km};
use super::poi::{Poi, PoiFeature};

/// User-selected filter dimensions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterOptions {
    /// Accepted categories, matched case-insensitively.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<BTreeSet<String>>,
    /// Maximum distance from the user, inclusive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
    /// Minimum average rating, inclusive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_rating: Option<f64>,
    /// Required verification state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified: Option<bool>,
    /// Feature flags of which at least one must be set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<BTreeSet<PoiFeature>>,
}

impl FilterOptions {
    /// Restrict to the given categories.
    #[must_use]
    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = Some(
            categories
                .into_iter()
                .map(|category| category.into().to_lowercase())
                .collect(),
        );
        self
    }

    /// Restrict to POIs within `km` of the user.
    #[must_use]
    pub const fn with_distance_km(mut self, km: f64) -> Self {
        self.distance_km = Some(km);
        self
    }

    /// Restrict to POIs rated at least `rating`.
    #[must_use]
    pub const fn with_min_rating(mut self, rating: f64) -> Self {
        self.min_rating = Some(rating);
        self
    }

    /// Restrict to the given verification state.
    #[must_use]
    pub const fn with_verified(mut self, verified: bool) -> Self {
        self.verified = Some(verified);
        self
    }

    /// Restrict to POIs carrying any of the given features.
    #[must_use]
    pub fn with_features(mut self, features: impl IntoIterator<Item = PoiFeature>) -> Self {
        self.features = Some(features.into_iter().collect());
        self
    }

    /// Restrict by feature names such as `restaurant` or `is_booking`.
    ///
    /// Unknown names contribute no constraint.
    #[must_use]
    pub fn with_feature_names<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let features: Vec<PoiFeature> = names
            .into_iter()
            .filter_map(|name| match name.as_ref().parse::<PoiFeature>() {
                Ok(feature) => Some(feature),
                Err(unknown) => {
                    debug!(%unknown, "ignoring unknown feature filter");
                    None
                }
            })
            .collect();
        self.with_features(features)
    }

    /// Number of dimensions that currently constrain the result.
    pub fn active_count(&self) -> usize {
        [
            self.categories.as_ref().is_some_and(|set| !set.is_empty()),
            self.distance_km.is_some(),
            self.min_rating.is_some(),
            self.verified.is_some(),
            self.features.as_ref().is_some_and(|set| !set.is_empty()),
        ]
        .into_iter()
        .filter(|active| *active)
        .count()
    }

    fn accepts(&self, poi: &Poi, user_location: Option<&Coordinate>) -> bool {
        self.matches_category(poi)
            && self.matches_distance(poi, user_location)
            && self.matches_rating(poi)
            && self.matches_verified(poi)
            && self.matches_features(poi)
    }

    fn matches_category(&self, poi: &Poi) -> bool {
        match &self.categories {
            Some(categories) if !categories.is_empty() => categories
                .iter()
                .any(|category| category.eq_ignore_ascii_case(&poi.category)),
            _ => true,
        }
    }

    fn matches_distance(&self, poi: &Poi, user_location: Option<&Coordinate>) -> bool {
        // Without a user position the distance dimension is skipped, not failed.
        match (self.distance_km, user_location) {
            (Some(max_km), Some(user)) => {
                distance_km(user.latitude, user.longitude, poi.latitude, poi.longitude) <= max_km
            }
            _ => true,
        }
    }

    fn matches_rating(&self, poi: &Poi) -> bool {
        self.min_rating.is_none_or(|min| poi.rating >= min)
    }

    fn matches_verified(&self, poi: &Poi) -> bool {
        self.verified.is_none_or(|verified| poi.is_verified == verified)
    }

    fn matches_features(&self, poi: &Poi) -> bool {
        match &self.features {
            Some(features) if !features.is_empty() => {
                features.iter().any(|feature| poi.has_feature(*feature))
            }
            _ => true,
        }
    }
}

/// Keep the POIs accepted by every present filter dimension.
///
/// Pure and order-preserving: the output is a subsequence of `pois`.
///
/// # Examples
/// ```
/// use map_engine::domain::filter::{FilterOptions, apply_filters};
///
/// let filtered = apply_filters(&[], &FilterOptions::default(), None);
/// assert!(filtered.is_empty());
/// ```
pub fn apply_filters(
    pois: &[Poi],
    filters: &FilterOptions,
    user_location: Option<&Coordinate>,
) -> Vec<Poi> {
    pois.iter()
        .filter(|poi| filters.accepts(poi, user_location))
        .cloned()
        .collect()
}
