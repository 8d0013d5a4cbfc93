//! Great-circle distance, bounds containment and screen-space projection.
//!
//! Functions here never fail for well-formed input. Callers validate raw
//! coordinates with [`validate_coordinates`] first; `NaN` passed straight in
//! propagates as `NaN`.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use super::error::ValidationError;

/// Mean Earth radius used by the haversine formula.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Kilometres spanned by one degree of latitude.
pub const KM_PER_DEGREE: f64 = 111.32;

/// Pixel edge length of one web-mercator tile.
const TILE_SIZE_PX: f64 = 256.0;

/// Latitude clamp applied before mercator projection.
const MAX_MERCATOR_LATITUDE: f64 = 85.051_128_78;

/// A WGS84 coordinate pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// Latitude in degrees (-90 to 90).
    pub latitude: f64,
    /// Longitude in degrees (-180 to 180).
    pub longitude: f64,
}

impl Coordinate {
    /// Build a coordinate without validation.
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Build a coordinate after checking WGS84 ranges.
    ///
    /// # Examples
    /// ```
    /// use map_engine::domain::geometry::Coordinate;
    ///
    /// assert!(Coordinate::try_new(3.848, 11.5021).is_ok());
    /// assert!(Coordinate::try_new(91.0, 0.0).is_err());
    /// ```
    pub fn try_new(latitude: f64, longitude: f64) -> Result<Self, ValidationError> {
        validate_coordinates(latitude, longitude)?;
        Ok(Self::new(latitude, longitude))
    }

    /// Haversine distance to `other` in kilometres.
    pub fn distance_to(&self, other: &Self) -> f64 {
        distance_km(self.latitude, self.longitude, other.latitude, other.longitude)
    }
}

/// Axis-aligned geographic bounding box, boundaries inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    /// Northern latitude edge.
    pub north: f64,
    /// Southern latitude edge.
    pub south: f64,
    /// Eastern longitude edge.
    pub east: f64,
    /// Western longitude edge.
    pub west: f64,
}

impl Bounds {
    /// Return whether `point` lies inside the box (edges included).
    pub fn contains(&self, point: &Coordinate) -> bool {
        in_bounds(point, self)
    }

    /// Smallest box covering every point, or `None` for an empty input.
    ///
    /// # Examples
    /// ```
    /// use map_engine::domain::geometry::{Bounds, Coordinate};
    ///
    /// let bounds = Bounds::from_points([
    ///     Coordinate::new(3.80, 11.45),
    ///     Coordinate::new(3.90, 11.55),
    /// ])
    /// .expect("non-empty input");
    /// assert_eq!(bounds.north, 3.90);
    /// assert_eq!(bounds.west, 11.45);
    /// ```
    pub fn from_points(points: impl IntoIterator<Item = Coordinate>) -> Option<Self> {
        points.into_iter().fold(None, |acc, point| {
            Some(match acc {
                None => Self {
                    north: point.latitude,
                    south: point.latitude,
                    east: point.longitude,
                    west: point.longitude,
                },
                Some(bounds) => Self {
                    north: bounds.north.max(point.latitude),
                    south: bounds.south.min(point.latitude),
                    east: bounds.east.max(point.longitude),
                    west: bounds.west.min(point.longitude),
                },
            })
        })
    }

    /// Geometric centre of the box.
    pub fn center(&self) -> Coordinate {
        Coordinate::new(
            (self.north + self.south) / 2.0,
            (self.east + self.west) / 2.0,
        )
    }
}

/// Position in web-mercator world pixel space at a given zoom.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelPoint {
    /// Horizontal offset from the antimeridian.
    pub x: f64,
    /// Vertical offset from the northern mercator limit.
    pub y: f64,
}

impl PixelPoint {
    /// Euclidean separation from `other` in pixels.
    pub fn distance_to(&self, other: &Self) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Haversine great-circle distance in kilometres.
///
/// Symmetric, zero for identical points and never negative.
///
/// # Examples
/// ```
/// use map_engine::domain::geometry::distance_km;
///
/// assert_eq!(distance_km(3.8480, 11.5021, 3.8480, 11.5021), 0.0);
/// ```
pub fn distance_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    // Rounding can push `a` marginally past 1 for antipodal points.
    let a = a.clamp(0.0, 1.0);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

/// Inclusive containment test: `south <= lat <= north` and `west <= lng <= east`.
pub fn in_bounds(point: &Coordinate, bounds: &Bounds) -> bool {
    (bounds.south..=bounds.north).contains(&point.latitude)
        && (bounds.west..=bounds.east).contains(&point.longitude)
}

/// Approximate box enclosing a circle of `radius_km` around `center`.
///
/// Latitude scales at 111.32 km per degree; longitude additionally scales by
/// `cos(latitude)`.
pub fn bounds_from_radius(center: &Coordinate, radius_km: f64) -> Bounds {
    let lat_delta = radius_km / KM_PER_DEGREE;
    let lng_delta = radius_km / (KM_PER_DEGREE * center.latitude.to_radians().cos());
    Bounds {
        north: center.latitude + lat_delta,
        south: center.latitude - lat_delta,
        east: center.longitude + lng_delta,
        west: center.longitude - lng_delta,
    }
}

/// Reject latitudes outside `[-90, 90]` and longitudes outside `[-180, 180]`.
///
/// Non-finite values are rejected as well so they never reach clustering.
pub fn validate_coordinates(latitude: f64, longitude: f64) -> Result<(), ValidationError> {
    if (-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude) {
        Ok(())
    } else {
        Err(ValidationError::invalid_coordinate(latitude, longitude))
    }
}

/// Human-readable distance: metres below 1 km, one decimal below 10 km.
///
/// # Examples
/// ```
/// use map_engine::domain::geometry::format_distance;
///
/// assert_eq!(format_distance(0.42), "420 m");
/// assert_eq!(format_distance(3.27), "3.3 km");
/// assert_eq!(format_distance(12.6), "13 km");
/// ```
pub fn format_distance(km: f64) -> String {
    if km < 1.0 {
        format!("{:.0} m", (km * 1000.0).round())
    } else if km < 10.0 {
        format!("{km:.1} km")
    } else {
        format!("{:.0} km", km.round())
    }
}

/// Project a coordinate into web-mercator world pixels at `zoom`.
pub fn project(point: &Coordinate, zoom: u8) -> PixelPoint {
    let scale = TILE_SIZE_PX * 2_f64.powi(i32::from(zoom));
    let latitude = point
        .latitude
        .clamp(-MAX_MERCATOR_LATITUDE, MAX_MERCATOR_LATITUDE)
        .to_radians();
    let x = (point.longitude + 180.0) / 360.0 * scale;
    let y = (1.0 - (latitude.tan() + 1.0 / latitude.cos()).ln() / PI) / 2.0 * scale;
    PixelPoint { x, y }
}
