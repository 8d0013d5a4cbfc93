//! REST POI API outbound adapter.
//!
//! Thin HTTP implementation of the `PoiSource` port against
//! `GET /poi/nearby` and `GET /poi/search`, both answering `{ "data": [..] }`.

mod http_source;

pub use http_source::PoiApiSource;
