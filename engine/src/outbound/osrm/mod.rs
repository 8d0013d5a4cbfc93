//! OSRM outbound adapter.
//!
//! Thin HTTP implementation of the `RouteProvider` port.

mod dto;
mod http_provider;

pub use http_provider::OsrmHttpProvider;
