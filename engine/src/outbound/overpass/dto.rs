//! DTOs for decoding Overpass JSON responses.
//!
//! Elements without a name or coordinates are skipped rather than failing
//! the whole response; everything else maps into `NearbyPlace`.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::domain::geometry::Coordinate;
use crate::domain::ports::NearbyPlace;

/// Upper bound on places returned per query.
pub(super) const MAX_PLACES: usize = 50;

#[derive(Debug, Deserialize)]
pub(super) struct OverpassResponseDto {
    #[serde(default)]
    pub(super) elements: Vec<OverpassElementDto>,
}

#[derive(Debug, Deserialize)]
pub(super) struct OverpassElementDto {
    #[serde(rename = "type")]
    pub(super) element_type: String,
    pub(super) id: i64,
    pub(super) lon: Option<f64>,
    pub(super) lat: Option<f64>,
    pub(super) center: Option<OverpassElementCenterDto>,
    #[serde(default)]
    pub(super) tags: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct OverpassElementCenterDto {
    pub(super) lon: f64,
    pub(super) lat: f64,
}

impl OverpassResponseDto {
    /// Named places nearest `origin` first, at most [`MAX_PLACES`].
    pub(super) fn into_places(self, origin: Coordinate) -> Vec<NearbyPlace> {
        let mut places: Vec<NearbyPlace> = self
            .elements
            .into_iter()
            .filter_map(|element| element.into_place(origin))
            .collect();
        places.sort_by(|left, right| left.distance_km.total_cmp(&right.distance_km));
        places.truncate(MAX_PLACES);
        places
    }
}

impl OverpassElementDto {
    fn into_place(self, origin: Coordinate) -> Option<NearbyPlace> {
        let name = self.tags.get("name")?.clone();
        let (longitude, latitude) = self.coordinates()?;
        if !longitude.is_finite() || !latitude.is_finite() {
            return None;
        }
        let distance = origin.distance_to(&Coordinate::new(latitude, longitude));
        Some(NearbyPlace {
            id: format!("{}-{}", self.element_type, self.id),
            name,
            category: derive_category(&self.tags).to_owned(),
            latitude,
            longitude,
            distance_km: (distance * 100.0).round() / 100.0,
            address: address_from_tags(&self.tags),
            tags: self.tags,
        })
    }

    fn coordinates(&self) -> Option<(f64, f64)> {
        if let (Some(longitude), Some(latitude)) = (self.lon, self.lat) {
            return Some((longitude, latitude));
        }
        self.center.as_ref().map(|center| (center.lon, center.lat))
    }
}

/// Map OSM tags onto the engine's place categories.
pub(super) fn derive_category(tags: &BTreeMap<String, String>) -> &'static str {
    if let Some(amenity) = tags.get("amenity").map(String::as_str) {
        match amenity {
            "restaurant" | "cafe" | "fast_food" | "food_court" => return "restaurant",
            "hotel" | "guesthouse" | "hostel" => return "hotel",
            "bank" | "atm" | "pharmacy" | "hospital" => return "service",
            _ => {}
        }
    }
    if tags.contains_key("tourism") {
        "attraction"
    } else if tags.contains_key("shop") {
        "shopping"
    } else {
        "other"
    }
}

fn address_from_tags(tags: &BTreeMap<String, String>) -> Option<String> {
    let parts: Vec<&str> = ["addr:housenumber", "addr:street", "addr:city"]
        .into_iter()
        .filter_map(|key| tags.get(key).map(String::as_str))
        .collect();
    (!parts.is_empty()).then(|| parts.join(", "))
}
