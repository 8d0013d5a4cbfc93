//! Outbound adapters implementing domain ports for external infrastructure.
//!
//! - **nominatim**: forward and reverse geocoding over HTTP
//! - **osrm**: driving routes between two points
//! - **overpass**: OSM place search by name and by radius
//! - **poi_api**: the POI REST API backing nearby and search snapshots
//! - **poi_file**: a JSON snapshot on disk, for offline runs
//!
//! Adapters translate between wire formats and domain types. They contain no
//! business logic; retries and caching live in the domain services.

pub(crate) mod http;
pub mod nominatim;
pub mod osrm;
pub mod overpass;
pub mod poi_api;
pub mod poi_file;
