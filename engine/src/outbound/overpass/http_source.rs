//! Reqwest-backed Overpass place search adapter.
//!
//! This adapter owns transport details only: query text, HTTP error mapping
//! and JSON decoding into nearby places.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use tracing::debug;

use super::dto::OverpassResponseDto;
use crate::domain::geometry::Coordinate;
use crate::domain::ports::{NearbyPlace, NetworkError, PlaceSearchSource};
use crate::outbound::http::{client, map_transport_error, success_body};

/// Radius of name searches around the user, in metres.
const NAME_SEARCH_RADIUS_M: u32 = 10_000;
const NAME_SEARCH_TIMEOUT_SECONDS: u32 = 10;
const NEARBY_TIMEOUT_SECONDS: u32 = 15;

/// Place search source that performs HTTP POST requests against one
/// Overpass interpreter endpoint.
pub struct OverpassHttpSource {
    client: Client,
    endpoint: Url,
}

impl OverpassHttpSource {
    /// Build an adapter using a reqwest client with an explicit request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(endpoint: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: client(timeout)?,
            endpoint,
        })
    }

    async fn run(&self, query: String, origin: Coordinate) -> Result<Vec<NearbyPlace>, NetworkError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&[("data", query)])
            .send()
            .await
            .map_err(map_transport_error)?;
        let body = success_body(response).await?;
        let places = parse_places(&body, origin)?;
        debug!(count = places.len(), "overpass places decoded");
        Ok(places)
    }
}

#[async_trait]
impl PlaceSearchSource for OverpassHttpSource {
    async fn search_places(
        &self,
        query: &str,
        around: Coordinate,
    ) -> Result<Vec<NearbyPlace>, NetworkError> {
        self.run(build_name_query(query, around), around).await
    }

    async fn nearby_places(
        &self,
        center: Coordinate,
        radius_km: f64,
        category: Option<String>,
    ) -> Result<Vec<NearbyPlace>, NetworkError> {
        self.run(
            build_nearby_query(center, radius_km, category.as_deref()),
            center,
        )
        .await
    }
}

fn parse_places(body: &[u8], origin: Coordinate) -> Result<Vec<NearbyPlace>, NetworkError> {
    let decoded: OverpassResponseDto = serde_json::from_slice(body).map_err(|error| {
        NetworkError::decode(format!("invalid Overpass JSON payload: {error}"))
    })?;
    Ok(decoded.into_places(origin))
}

fn build_name_query(name: &str, around: Coordinate) -> String {
    let pattern = escape_quoted(&escape_regex(name.trim()));
    let filter = format!(
        "(around:{NAME_SEARCH_RADIUS_M},{},{})",
        around.latitude, around.longitude
    );
    let lines: Vec<String> = ["node", "way", "relation"]
        .into_iter()
        .map(|element| format!("  {element}[\"name\"~\"{pattern}\",i]{filter};"))
        .collect();
    format!(
        "[out:json][timeout:{NAME_SEARCH_TIMEOUT_SECONDS}];\n(\n{}\n);\nout center;",
        lines.join("\n")
    )
}

fn build_nearby_query(center: Coordinate, radius_km: f64, category: Option<&str>) -> String {
    let radius_m = (radius_km.max(0.0) * 1000.0).round();
    let filter = format!(
        "(around:{radius_m},{},{})",
        center.latitude, center.longitude
    );
    let amenity = category
        .map(|category| format!("[\"amenity\"~\"{}\"]", amenities_for(category)))
        .unwrap_or_default();
    let mut lines = Vec::with_capacity(6);
    for element in ["node", "way"] {
        lines.push(format!("  {element}[\"amenity\"]{amenity}{filter};"));
    }
    for key in ["tourism", "shop"] {
        for element in ["node", "way"] {
            lines.push(format!("  {element}[\"{key}\"]{filter};"));
        }
    }
    format!(
        "[out:json][timeout:{NEARBY_TIMEOUT_SECONDS}];\n(\n{}\n);\nout center;",
        lines.join("\n")
    )
}

fn amenities_for(category: &str) -> &'static str {
    match category {
        "restaurant" => "restaurant|cafe|fast_food|food_court",
        "transport" => "bus_station|taxi|fuel",
        "tourism" => "tourist_information|museum|gallery",
        "amenity" => "bank|hospital|pharmacy|school",
        _ => ".*",
    }
}

fn escape_regex(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for character in raw.chars() {
        if ".^$*+?()[]{}|\\".contains(character) {
            escaped.push('\\');
        }
        escaped.push(character);
    }
    escaped
}

fn escape_quoted(raw: &str) -> String {
    raw.replace('\\', r"\\").replace('"', "\\\"")
}
