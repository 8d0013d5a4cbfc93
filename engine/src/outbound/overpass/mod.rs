//! Overpass outbound adapter.
//!
//! Thin HTTP implementation of the `PlaceSearchSource` port.

mod dto;
mod http_source;

pub use http_source::OverpassHttpSource;
