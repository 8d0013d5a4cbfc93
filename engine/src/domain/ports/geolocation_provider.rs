//! Driven port for device or network geolocation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::define_port_error;
use crate::domain::geometry::Coordinate;

/// One position fix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Reported location.
    pub coordinate: Coordinate,
    /// Horizontal accuracy radius in metres.
    pub accuracy_m: f64,
    /// When the fix was taken.
    pub timestamp: DateTime<Utc>,
}

define_port_error! {
    /// Failures reported by a geolocation provider.
    pub enum GeolocationError {
        /// The user refused location access.
        PermissionDenied => "location permission denied",
        /// No fix could be obtained.
        PositionUnavailable => "position unavailable",
        /// The provider did not answer in time.
        Timeout => "location request timed out"; retryable,
        /// Any other provider failure.
        Unknown { message: String } => "location lookup failed: {message}",
    }
}

/// Port for obtaining the user's position.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GeolocationProvider: Send + Sync {
    /// Obtain a single position fix.
    async fn current_position(&self) -> Result<Position, GeolocationError>;
}

/// Provider that always reports the same fix.
#[derive(Debug, Clone, Copy)]
pub struct FixtureGeolocationProvider {
    position: Position,
}

impl FixtureGeolocationProvider {
    /// Report `coordinate` with the given accuracy, stamped at call time.
    pub fn new(coordinate: Coordinate, accuracy_m: f64) -> Self {
        Self {
            position: Position {
                coordinate,
                accuracy_m,
                timestamp: Utc::now(),
            },
        }
    }
}

#[async_trait]
impl GeolocationProvider for FixtureGeolocationProvider {
    async fn current_position(&self) -> Result<Position, GeolocationError> {
        Ok(Position {
            timestamp: Utc::now(),
            ..self.position
        })
    }
}

/// Provider for hosts without any location capability.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableGeolocationProvider;

#[async_trait]
impl GeolocationProvider for UnavailableGeolocationProvider {
    async fn current_position(&self) -> Result<Position, GeolocationError> {
        Err(GeolocationError::position_unavailable())
    }
}
