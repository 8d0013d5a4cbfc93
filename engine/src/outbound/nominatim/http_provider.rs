//! Reqwest-backed Nominatim geocoding adapter.
//!
//! This adapter owns transport details only: query parameters, HTTP error
//! mapping and JSON decoding into provider candidates. Scoring, caching and
//! service-area filtering happen in the domain.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use tracing::debug;

use super::dto::{NominatimPlaceDto, NominatimReverseDto};
use crate::domain::geometry::Coordinate;
use crate::domain::ports::{GeocodeCandidate, GeocodeOptions, GeocodingProvider, NetworkError};
use crate::outbound::http::{client, endpoint, map_transport_error, success_body};

const REVERSE_LANGUAGE: &str = "fr,en";

/// Geocoding provider that performs GET requests against a Nominatim
/// instance.
pub struct NominatimHttpProvider {
    client: Client,
    base: Url,
}

impl NominatimHttpProvider {
    /// Build an adapter using a reqwest client with an explicit request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(base: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: client(timeout)?,
            base,
        })
    }
}

#[async_trait]
impl GeocodingProvider for NominatimHttpProvider {
    async fn geocode(
        &self,
        query: &str,
        options: &GeocodeOptions,
    ) -> Result<Vec<GeocodeCandidate>, NetworkError> {
        let url = endpoint(self.base.as_str(), "search");
        debug!(url, query, "nominatim search");
        let response = self
            .client
            .get(url)
            .query(&search_params(query, options))
            .send()
            .await
            .map_err(map_transport_error)?;
        let body = success_body(response).await?;
        parse_search(&body)
    }

    async fn reverse_geocode(
        &self,
        coordinate: Coordinate,
    ) -> Result<GeocodeCandidate, NetworkError> {
        let url = endpoint(self.base.as_str(), "reverse");
        let response = self
            .client
            .get(url)
            .query(&reverse_params(coordinate))
            .send()
            .await
            .map_err(map_transport_error)?;
        let body = success_body(response).await?;
        parse_reverse(&body)
    }
}

fn search_params(query: &str, options: &GeocodeOptions) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("q", query.to_owned()),
        ("format", "json".to_owned()),
        ("addressdetails", "1".to_owned()),
        ("limit", options.limit.to_string()),
        ("countrycodes", options.country_codes.clone()),
        ("accept-language", options.language.clone()),
    ];
    if let Some(viewbox) = &options.viewbox {
        params.push(("viewbox", viewbox.clone()));
        if options.bounded {
            params.push(("bounded", "1".to_owned()));
        }
    }
    params
}

fn reverse_params(coordinate: Coordinate) -> Vec<(&'static str, String)> {
    vec![
        ("lat", coordinate.latitude.to_string()),
        ("lon", coordinate.longitude.to_string()),
        ("format", "json".to_owned()),
        ("addressdetails", "1".to_owned()),
        ("accept-language", REVERSE_LANGUAGE.to_owned()),
    ]
}

fn parse_search(body: &[u8]) -> Result<Vec<GeocodeCandidate>, NetworkError> {
    let places: Vec<NominatimPlaceDto> = serde_json::from_slice(body).map_err(|error| {
        NetworkError::decode(format!("invalid Nominatim search payload: {error}"))
    })?;
    places
        .into_iter()
        .map(NominatimPlaceDto::into_candidate)
        .collect::<Result<_, _>>()
        .map_err(NetworkError::decode)
}

fn parse_reverse(body: &[u8]) -> Result<GeocodeCandidate, NetworkError> {
    let decoded: NominatimReverseDto = serde_json::from_slice(body).map_err(|error| {
        NetworkError::decode(format!("invalid Nominatim reverse payload: {error}"))
    })?;
    match decoded {
        NominatimReverseDto::Found(place) => place.into_candidate().map_err(NetworkError::decode),
        NominatimReverseDto::NotFound { error } => Err(NetworkError::rejected(404_u16, error)),
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for non-network Nominatim mapping helpers.

    use super::*;
    use rstest::rstest;

    const SEARCH_BODY: &str = r#"[
        {
            "lat": "3.8667",
            "lon": "11.5167",
            "display_name": "Poste Centrale, Yaoundé, Cameroun",
            "address": {
                "road": "Avenue Kennedy",
                "suburb": "Centre Commercial",
                "town": "Yaoundé",
                "country": "Cameroun"
            },
            "importance": 0.05,
            "place_rank": 26,
            "boundingbox": ["3.8660", "3.8674", "11.5160", "11.5174"]
        },
        {
            "lat": "3.85",
            "lon": "11.50",
            "display_name": "Yaoundé"
        }
    ]"#;

    #[rstest]
    fn parses_search_results_into_candidates() {
        let candidates = parse_search(SEARCH_BODY.as_bytes()).expect("JSON should decode");

        assert_eq!(candidates.len(), 2);
        let first = candidates.first().expect("first candidate");
        assert_eq!(first.coordinate, Coordinate::new(3.8667, 11.5167));
        assert_eq!(first.place_rank, 26);
        assert_eq!(first.address.city.as_deref(), Some("Yaoundé"), "town fills city");
        assert_eq!(
            first.address.formatted(),
            "Avenue Kennedy, Centre Commercial, Yaoundé"
        );
        let bounds = first.bounds.expect("bounding box");
        assert_eq!((bounds.south, bounds.north), (3.8660, 3.8674));
        assert_eq!((bounds.west, bounds.east), (11.5160, 11.5174));

        let second = candidates.get(1).expect("second candidate");
        assert_eq!(second.importance, 0.0);
        assert_eq!(second.place_rank, 30);
        assert!(second.bounds.is_none());
    }

    #[rstest]
    #[case::not_json(b"<html>busy</html>".as_slice())]
    #[case::bad_latitude(br#"[{"lat": "north", "lon": "11.5"}]"#.as_slice())]
    fn malformed_search_payloads_are_decode_errors(#[case] body: &[u8]) {
        let error = parse_search(body).expect_err("decode should fail");
        assert!(matches!(error, NetworkError::Decode { .. }));
    }

    #[rstest]
    fn reverse_not_found_is_a_rejection() {
        let error =
            parse_reverse(br#"{"error": "Unable to geocode"}"#).expect_err("nothing found");
        assert_eq!(error, NetworkError::rejected(404_u16, "Unable to geocode"));
    }

    #[rstest]
    fn reverse_hit_decodes() {
        let body = r#"{"lat": "3.848", "lon": "11.5021", "display_name": "Hôtel de Ville", "place_rank": 30}"#;
        let candidate = parse_reverse(body.as_bytes()).expect("hit");
        assert_eq!(candidate.display_name, "Hôtel de Ville");
    }

    #[rstest]
    fn search_params_carry_bias_and_locale() {
        let params = search_params("Poste Centrale, Yaoundé, Cameroun", &GeocodeOptions::default());
        let lookup = |key: &str| {
            params
                .iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| value.as_str())
        };

        assert_eq!(lookup("limit"), Some("5"));
        assert_eq!(lookup("countrycodes"), Some("cm"));
        assert_eq!(lookup("accept-language"), Some("fr,en"));
        assert_eq!(lookup("viewbox"), Some("10.5,4.2,12.5,2.8"));
        assert_eq!(lookup("bounded"), Some("1"));
    }

    #[rstest]
    fn unbounded_options_omit_the_bounded_flag() {
        let options = GeocodeOptions {
            bounded: false,
            ..GeocodeOptions::default()
        };
        let params = search_params("Mokolo", &options);
        assert!(params.iter().all(|(name, _)| *name != "bounded"));
    }
}
