//! Reqwest-backed OSRM routing adapter.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use tracing::debug;

use super::dto::{OsrmResponseDto, OsrmRouteDto};
use crate::domain::geometry::Coordinate;
use crate::domain::ports::{NetworkError, Route, RouteProvider};
use crate::outbound::http::{client, endpoint, map_transport_error, success_body};

const ROUTE_PARAMS: [(&str, &str); 3] = [
    ("geometries", "geojson"),
    ("overview", "full"),
    ("steps", "true"),
];

/// Route provider that performs GET requests against an OSRM server.
pub struct OsrmHttpProvider {
    client: Client,
    base: Url,
}

impl OsrmHttpProvider {
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
impl RouteProvider for OsrmHttpProvider {
    async fn route(&self, from: Coordinate, to: Coordinate) -> Result<Route, NetworkError> {
        let url = endpoint(self.base.as_str(), &route_path(from, to));
        debug!(url, "osrm route");
        let response = self
            .client
            .get(url)
            .query(&ROUTE_PARAMS)
            .send()
            .await
            .map_err(map_transport_error)?;
        let body = success_body(response).await?;
        parse_route(&body)
    }
}

/// `route/v1/driving/{lng},{lat};{lng},{lat}`.
fn route_path(from: Coordinate, to: Coordinate) -> String {
    format!(
        "route/v1/driving/{},{};{},{}",
        from.longitude, from.latitude, to.longitude, to.latitude
    )
}

fn parse_route(body: &[u8]) -> Result<Route, NetworkError> {
    let decoded: OsrmResponseDto = serde_json::from_slice(body)
        .map_err(|error| NetworkError::decode(format!("invalid OSRM payload: {error}")))?;
    if decoded.code != "Ok" {
        let detail = decoded.message.unwrap_or_default();
        return Err(NetworkError::decode(format!(
            "OSRM answered {}: {detail}",
            decoded.code
        )));
    }
    decoded
        .routes
        .into_iter()
        .next()
        .map(OsrmRouteDto::into_route)
        .ok_or_else(|| NetworkError::decode("OSRM returned no routes"))
}

#[cfg(test)]
mod tests {
    //! Path building and response decoding.

    use super::*;
    use rstest::rstest;

    #[rstest]
    fn path_orders_longitude_first() {
        let path = route_path(Coordinate::new(3.848, 11.5021), Coordinate::new(3.87, 11.52));
        assert_eq!(path, "route/v1/driving/11.5021,3.848;11.52,3.87");
        assert_eq!(
            endpoint("https://router.project-osrm.org/", &path),
            "https://router.project-osrm.org/route/v1/driving/11.5021,3.848;11.52,3.87"
        );
    }

    #[rstest]
    fn decodes_the_first_route_with_flattened_steps() {
        let body = r#"{
            "code": "Ok",
            "routes": [
                {
                    "distance": 2450.3,
                    "duration": 312.5,
                    "geometry": {
                        "type": "LineString",
                        "coordinates": [[11.5021, 3.848], [11.51, 3.86], [11.52, 3.87]]
                    },
                    "legs": [
                        {"steps": [
                            {"distance": 1200.0, "duration": 150.0, "name": "Boulevard du 20 Mai",
                             "maneuver": {"type": "depart"}},
                            {"distance": 1250.3, "duration": 162.5, "name": "",
                             "maneuver": {"type": "turn", "modifier": "left"}}
                        ]},
                        {"steps": [
                            {"distance": 0.0, "duration": 0.0, "name": "Avenue Kennedy",
                             "maneuver": {"type": "arrive"}}
                        ]}
                    ]
                },
                {
                    "distance": 9000.0,
                    "duration": 900.0,
                    "geometry": {"type": "LineString", "coordinates": []}
                }
            ]
        }"#;

        let route = parse_route(body.as_bytes()).expect("route decodes");

        assert_eq!(route.distance_m, 2450.3);
        assert_eq!(route.geometry.first(), Some(&Coordinate::new(3.848, 11.5021)));
        assert_eq!(route.geometry.len(), 3);
        let maneuvers: Vec<&str> = route.steps.iter().map(|step| step.maneuver.as_str()).collect();
        assert_eq!(maneuvers, ["depart", "turn", "arrive"]);
        assert_eq!(route.steps[1].modifier.as_deref(), Some("left"));
    }

    #[rstest]
    #[case::no_route(r#"{"code": "NoRoute", "message": "Impossible route"}"#)]
    #[case::empty(r#"{"code": "Ok", "routes": []}"#)]
    #[case::not_json("upstream busy")]
    fn unusable_answers_are_decode_errors(#[case] body: &str) {
        let error = parse_route(body.as_bytes()).expect_err("no usable route");
        assert!(matches!(error, NetworkError::Decode { .. }));
    }
}
