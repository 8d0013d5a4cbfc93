//! Generated POI seed types.
//!
//! The output mirrors the POI API's camelCase wire format so a generated
//! snapshot can be served, written to disk or decoded by the engine without
//! this crate depending on engine types.

use serde::{Deserialize, Serialize};

/// A generated example point of interest.
///
/// # Example
///
/// ```
/// use example_data::ExamplePoiSeed;
///
/// let poi = ExamplePoiSeed {
///     id: "3fa85f64-5717-4562-b3fc-2c963f66afa6".to_owned(),
///     name: "Chez Wou".to_owned(),
///     description: String::new(),
///     latitude: 3.8490,
///     longitude: 11.5030,
///     address: None,
///     category: "restaurant".to_owned(),
///     rating: 4.2,
///     rating_count: 12,
///     is_verified: true,
///     is_restaurant: true,
///     is_transport: false,
///     is_stadium: false,
///     is_booking: false,
/// };
///
/// let json = serde_json::to_string(&poi).expect("serialise");
/// assert!(json.contains("\"ratingCount\":12"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamplePoiSeed {
    /// Deterministic identifier (UUID text).
    pub id: String,
    /// Display name.
    pub name: String,
    /// Short description.
    pub description: String,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Street address, when one was generated.
    pub address: Option<String>,
    /// Category drawn from the registry.
    pub category: String,
    /// Average rating in `[0, 5]`, one decimal place; `0` when unrated.
    pub rating: f64,
    /// Number of ratings.
    pub rating_count: u32,
    /// Whether the POI is marked verified.
    pub is_verified: bool,
    /// Serves food.
    pub is_restaurant: bool,
    /// Transport hub or stop.
    pub is_transport: bool,
    /// Sports venue.
    pub is_stadium: bool,
    /// Accepts bookings.
    pub is_booking: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialises_to_the_poi_wire_format() {
        let poi = ExamplePoiSeed {
            id: "1".to_owned(),
            name: "Stade Omnisports".to_owned(),
            description: String::new(),
            latitude: 3.8850,
            longitude: 11.5460,
            address: Some("Boulevard du 20 Mai".to_owned()),
            category: "stadium".to_owned(),
            rating: 0.0,
            rating_count: 0,
            is_verified: false,
            is_restaurant: false,
            is_transport: false,
            is_stadium: true,
            is_booking: false,
        };
        let json = serde_json::to_value(&poi).expect("serialise");
        for key in ["ratingCount", "isVerified", "isStadium", "isBooking"] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
    }
}
