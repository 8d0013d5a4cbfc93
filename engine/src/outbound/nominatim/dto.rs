//! DTOs for decoding Nominatim JSON responses.
//!
//! Nominatim serialises coordinates and bounding boxes as strings; the DTOs
//! keep them raw and parse once while mapping into `GeocodeCandidate`.

use serde::Deserialize;

use crate::domain::geometry::{Bounds, Coordinate};
use crate::domain::ports::{AddressComponents, GeocodeCandidate};

const DEFAULT_PLACE_RANK: u8 = 30;

#[derive(Debug, Deserialize)]
pub(super) struct NominatimPlaceDto {
    pub(super) lat: String,
    pub(super) lon: String,
    #[serde(default)]
    pub(super) display_name: String,
    #[serde(default)]
    pub(super) address: NominatimAddressDto,
    pub(super) importance: Option<f64>,
    pub(super) place_rank: Option<u8>,
    /// `[south, north, west, east]`.
    pub(super) boundingbox: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct NominatimAddressDto {
    house_number: Option<String>,
    road: Option<String>,
    neighbourhood: Option<String>,
    suburb: Option<String>,
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    county: Option<String>,
    state: Option<String>,
    country: Option<String>,
    postcode: Option<String>,
}

/// Reverse lookups answer `200 {"error": ..}` when nothing is found.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(super) enum NominatimReverseDto {
    Found(NominatimPlaceDto),
    NotFound { error: String },
}

impl From<NominatimAddressDto> for AddressComponents {
    fn from(dto: NominatimAddressDto) -> Self {
        Self {
            house_number: dto.house_number,
            road: dto.road,
            neighbourhood: dto.neighbourhood,
            suburb: dto.suburb,
            city: dto.city.or(dto.town).or(dto.village),
            county: dto.county,
            state: dto.state,
            country: dto.country,
            postcode: dto.postcode,
        }
    }
}

impl NominatimPlaceDto {
    pub(super) fn into_candidate(self) -> Result<GeocodeCandidate, String> {
        let latitude = parse_degrees(&self.lat, "lat")?;
        let longitude = parse_degrees(&self.lon, "lon")?;
        let bounds = self.boundingbox.as_deref().and_then(parse_bounds);
        Ok(GeocodeCandidate {
            coordinate: Coordinate::new(latitude, longitude),
            display_name: self.display_name,
            address: self.address.into(),
            importance: self.importance.unwrap_or(0.0),
            place_rank: self.place_rank.unwrap_or(DEFAULT_PLACE_RANK),
            bounds,
        })
    }
}

fn parse_degrees(raw: &str, field: &str) -> Result<f64, String> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| format!("{field} is not a finite number: {raw:?}"))
}

fn parse_bounds(raw: &[String]) -> Option<Bounds> {
    let values: Vec<f64> = raw
        .iter()
        .map(|value| value.trim().parse::<f64>().ok())
        .collect::<Option<_>>()?;
    let [south, north, west, east] = values.as_slice() else {
        return None;
    };
    Some(Bounds {
        north: *north,
        south: *south,
        east: *east,
        west: *west,
    })
}
