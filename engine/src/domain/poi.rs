//! Point-of-interest snapshot types.
//!
//! POIs are owned by the external data source. The engine only ever holds a
//! read-only snapshot that is replaced wholesale on refresh, so every type
//! here is an immutable value.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::geometry::Coordinate;

/// Stable POI identifier as issued by the POI API.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoiId(String);

impl PoiId {
    /// Wrap a raw identifier.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for PoiId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for PoiId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A named geographic entity served by the POI API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Poi {
    /// Identity; one marker exists per id.
    pub id: PoiId,
    /// Display name.
    pub name: String,
    /// Free-text description.
    #[serde(default)]
    pub description: String,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Postal address, when known.
    #[serde(default)]
    pub address: Option<String>,
    /// Category name (for example `restaurant`).
    pub category: String,
    /// Average rating in `[0, 5]`.
    #[serde(default)]
    pub rating: f64,
    /// Number of ratings backing [`Poi::rating`].
    #[serde(default)]
    pub rating_count: u32,
    /// Whether a moderator verified the POI.
    #[serde(default)]
    pub is_verified: bool,
    /// Serves food.
    #[serde(default)]
    pub is_restaurant: bool,
    /// Transport hub or stop.
    #[serde(default)]
    pub is_transport: bool,
    /// Sports venue.
    #[serde(default)]
    pub is_stadium: bool,
    /// Accepts bookings.
    #[serde(default)]
    pub is_booking: bool,
    /// Creation time reported by the source.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Last update time reported by the source.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Poi {
    /// Position of the POI.
    pub const fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }

    /// Whether the POI carries the given feature flag.
    pub const fn has_feature(&self, feature: PoiFeature) -> bool {
        match feature {
            PoiFeature::Restaurant => self.is_restaurant,
            PoiFeature::Transport => self.is_transport,
            PoiFeature::Stadium => self.is_stadium,
            PoiFeature::Booking => self.is_booking,
        }
    }
}

/// Boolean feature flags a filter can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoiFeature {
    /// Maps to [`Poi::is_restaurant`].
    Restaurant,
    /// Maps to [`Poi::is_transport`].
    Transport,
    /// Maps to [`Poi::is_stadium`].
    Stadium,
    /// Maps to [`Poi::is_booking`].
    Booking,
}

impl PoiFeature {
    /// Wire name of the feature.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Restaurant => "restaurant",
            Self::Transport => "transport",
            Self::Stadium => "stadium",
            Self::Booking => "booking",
        }
    }
}

/// Returned when a feature name is not one of the known flags.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown POI feature: {0}")]
pub struct UnknownFeature(pub String);

impl FromStr for PoiFeature {
    type Err = UnknownFeature;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_lowercase().as_str() {
            "restaurant" | "is_restaurant" => Ok(Self::Restaurant),
            "transport" | "is_transport" => Ok(Self::Transport),
            "stadium" | "is_stadium" => Ok(Self::Stadium),
            "booking" | "is_booking" => Ok(Self::Booking),
            _ => Err(UnknownFeature(raw.to_owned())),
        }
    }
}

impl fmt::Display for PoiFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
