//! Nominatim outbound adapter.
//!
//! Thin HTTP implementation of the `GeocodingProvider` port.

mod dto;
mod http_provider;

pub use http_provider::NominatimHttpProvider;
