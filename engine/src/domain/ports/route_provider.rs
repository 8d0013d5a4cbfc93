//! Driven port for driving directions between two points.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::NetworkError;
use crate::domain::geometry::Coordinate;

/// One manoeuvre along a route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteStep {
    /// Street the step follows; empty when unnamed.
    pub name: String,
    /// Manoeuvre kind, e.g. `depart`, `turn`, `arrive`.
    pub maneuver: String,
    /// Direction modifier such as `left` or `slight right`.
    pub modifier: Option<String>,
    /// Length in metres.
    pub distance_m: f64,
    /// Expected travel time in seconds.
    pub duration_s: f64,
}

/// Best driving route between two points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    /// Total length in metres.
    pub distance_m: f64,
    /// Expected travel time in seconds.
    pub duration_s: f64,
    /// Full path, start to end.
    pub geometry: Vec<Coordinate>,
    /// Turn-by-turn steps across all legs.
    pub steps: Vec<RouteStep>,
}

/// Port for route calculation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RouteProvider: Send + Sync {
    /// Compute the best driving route from `from` to `to`.
    async fn route(&self, from: Coordinate, to: Coordinate) -> Result<Route, NetworkError>;
}

/// Provider that draws a straight line between the endpoints.
///
/// Used for offline runs and tests; durations assume 30 km/h.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixtureRouteProvider;

const FIXTURE_SPEED_M_PER_S: f64 = 30_000.0 / 3600.0;

#[async_trait]
impl RouteProvider for FixtureRouteProvider {
    async fn route(&self, from: Coordinate, to: Coordinate) -> Result<Route, NetworkError> {
        let distance_m = from.distance_to(&to) * 1000.0;
        let duration_s = distance_m / FIXTURE_SPEED_M_PER_S;
        Ok(Route {
            distance_m,
            duration_s,
            geometry: vec![from, to],
            steps: vec![
                RouteStep {
                    name: String::new(),
                    maneuver: "depart".to_owned(),
                    modifier: None,
                    distance_m,
                    duration_s,
                },
                RouteStep {
                    name: String::new(),
                    maneuver: "arrive".to_owned(),
                    modifier: None,
                    distance_m: 0.0,
                    duration_s: 0.0,
                },
            ],
        })
    }
}
