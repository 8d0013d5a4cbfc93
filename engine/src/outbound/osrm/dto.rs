//! DTOs for decoding OSRM route responses.

use serde::Deserialize;

use crate::domain::geometry::Coordinate;
use crate::domain::ports::{Route, RouteStep};

#[derive(Debug, Deserialize)]
pub(super) struct OsrmResponseDto {
    pub(super) code: String,
    pub(super) message: Option<String>,
    #[serde(default)]
    pub(super) routes: Vec<OsrmRouteDto>,
}

#[derive(Debug, Deserialize)]
pub(super) struct OsrmRouteDto {
    pub(super) distance: f64,
    pub(super) duration: f64,
    pub(super) geometry: OsrmGeometryDto,
    #[serde(default)]
    pub(super) legs: Vec<OsrmLegDto>,
}

#[derive(Debug, Deserialize)]
pub(super) struct OsrmGeometryDto {
    /// GeoJSON `[lng, lat]` pairs.
    pub(super) coordinates: Vec<[f64; 2]>,
}

#[derive(Debug, Deserialize)]
pub(super) struct OsrmLegDto {
    #[serde(default)]
    pub(super) steps: Vec<OsrmStepDto>,
}

#[derive(Debug, Deserialize)]
pub(super) struct OsrmStepDto {
    pub(super) distance: f64,
    pub(super) duration: f64,
    #[serde(default)]
    pub(super) name: String,
    pub(super) maneuver: OsrmManeuverDto,
}

#[derive(Debug, Deserialize)]
pub(super) struct OsrmManeuverDto {
    #[serde(rename = "type")]
    pub(super) kind: String,
    pub(super) modifier: Option<String>,
}

impl OsrmRouteDto {
    pub(super) fn into_route(self) -> Route {
        let geometry = self
            .geometry
            .coordinates
            .into_iter()
            .map(|[longitude, latitude]| Coordinate::new(latitude, longitude))
            .collect();
        let steps = self
            .legs
            .into_iter()
            .flat_map(|leg| leg.steps)
            .map(|step| RouteStep {
                name: step.name,
                maneuver: step.maneuver.kind,
                modifier: step.maneuver.modifier,
                distance_m: step.distance,
                duration_s: step.duration,
            })
            .collect();
        Route {
            distance_m: self.distance,
            duration_s: self.duration,
            geometry,
            steps,
        }
    }
}
