//! Reqwest-backed POI API source.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;

use crate::domain::poi::Poi;
use crate::domain::ports::{NearbyQuery, NetworkError, PoiSource};
use crate::outbound::http::{client, endpoint, map_transport_error, success_body};

#[derive(Debug, Deserialize)]
struct PoiEnvelopeDto {
    #[serde(default)]
    data: Vec<Poi>,
}

/// POI source backed by the REST API's `/poi` endpoints.
pub struct PoiApiSource {
    client: Client,
    base: Url,
}

impl PoiApiSource {
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

    async fn fetch(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<Vec<Poi>, NetworkError> {
        let response = self
            .client
            .get(endpoint(self.base.as_str(), path))
            .query(params)
            .send()
            .await
            .map_err(map_transport_error)?;
        let body = success_body(response).await?;
        parse_envelope(&body)
    }
}

#[async_trait]
impl PoiSource for PoiApiSource {
    async fn nearby(&self, query: &NearbyQuery) -> Result<Vec<Poi>, NetworkError> {
        self.fetch("poi/nearby", &nearby_params(query)).await
    }

    async fn search(&self, query: &str) -> Result<Vec<Poi>, NetworkError> {
        self.fetch("poi/search", &[("q", query.trim().to_owned())])
            .await
    }
}

fn nearby_params(query: &NearbyQuery) -> [(&'static str, String); 4] {
    [
        ("latitude", query.center.latitude.to_string()),
        ("longitude", query.center.longitude.to_string()),
        ("radius", query.radius_km.to_string()),
        ("limit", query.limit.to_string()),
    ]
}

fn parse_envelope(body: &[u8]) -> Result<Vec<Poi>, NetworkError> {
    serde_json::from_slice::<PoiEnvelopeDto>(body)
        .map(|envelope| envelope.data)
        .map_err(|error| NetworkError::decode(format!("invalid POI API payload: {error}")))
}
