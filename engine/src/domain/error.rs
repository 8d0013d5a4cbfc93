//! Engine error taxonomy.
//!
//! Nothing here is fatal to the process: validation failures reject one
//! input, network failures degrade to fewer results and geolocation failures
//! degrade to the default location.

use thiserror::Error;

use super::ports::{GeolocationError, NetworkError};

/// Input rejected before it reaches the pipeline.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// Latitude or longitude outside WGS84 ranges (or non-finite).
    #[error("invalid coordinate ({latitude}, {longitude})")]
    InvalidCoordinate {
        /// Rejected latitude.
        latitude: f64,
        /// Rejected longitude.
        longitude: f64,
    },
    /// Search radius is not a positive finite distance.
    #[error("radius must be a positive number of kilometres, got {radius_km}")]
    InvalidRadius {
        /// Rejected radius.
        radius_km: f64,
    },
    /// Query is blank or too short once trimmed.
    #[error("query must contain at least {min_chars} characters")]
    EmptyQuery {
        /// Minimum accepted length after trimming.
        min_chars: usize,
    },
}

impl ValidationError {
    /// Convenience constructor for [`ValidationError::InvalidCoordinate`].
    pub const fn invalid_coordinate(latitude: f64, longitude: f64) -> Self {
        Self::InvalidCoordinate {
            latitude,
            longitude,
        }
    }

    /// Convenience constructor for [`ValidationError::InvalidRadius`].
    pub const fn invalid_radius(radius_km: f64) -> Self {
        Self::InvalidRadius { radius_km }
    }

    /// Convenience constructor for [`ValidationError::EmptyQuery`].
    pub const fn empty_query(min_chars: usize) -> Self {
        Self::EmptyQuery { min_chars }
    }
}

/// Errors surfaced by engine-level operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// Caller input failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// An upstream provider failed after bounded retries.
    #[error(transparent)]
    Network(#[from] NetworkError),
    /// Device location could not be determined.
    #[error(transparent)]
    Geolocation(#[from] GeolocationError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn messages_name_the_rejected_input() {
        let error = ValidationError::invalid_coordinate(95.0, 10.0);
        assert_eq!(error.to_string(), "invalid coordinate (95, 10)");
        assert_eq!(
            ValidationError::empty_query(2).to_string(),
            "query must contain at least 2 characters"
        );
    }

    #[rstest]
    fn network_errors_convert_transparently() {
        let engine: EngineError = NetworkError::timeout("nominatim timed out").into();
        assert_eq!(engine.to_string(), "provider timeout: nominatim timed out");
    }
}
