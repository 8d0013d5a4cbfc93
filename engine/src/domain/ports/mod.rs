//! Driven ports for the engine's external collaborators.

mod macros;
pub(crate) use macros::define_port_error;

mod geocoding_provider;
mod geolocation_provider;
mod network_error;
mod place_search_source;
mod poi_source;
mod route_provider;

#[cfg(test)]
pub use geocoding_provider::MockGeocodingProvider;
pub use geocoding_provider::{
    AddressComponents, FixtureGeocodingProvider, GeocodeCandidate, GeocodeOptions,
    GeocodingProvider,
};
#[cfg(test)]
pub use geolocation_provider::MockGeolocationProvider;
pub use geolocation_provider::{
    FixtureGeolocationProvider, GeolocationError, GeolocationProvider, Position,
    UnavailableGeolocationProvider,
};
pub use network_error::NetworkError;
#[cfg(test)]
pub use place_search_source::MockPlaceSearchSource;
pub use place_search_source::{FixturePlaceSearchSource, NearbyPlace, PlaceSearchSource};
#[cfg(test)]
pub use poi_source::MockPoiSource;
pub use poi_source::{FixturePoiSource, NearbyQuery, PoiSource};
#[cfg(test)]
pub use route_provider::MockRouteProvider;
pub use route_provider::{FixtureRouteProvider, Route, RouteProvider, RouteStep};
