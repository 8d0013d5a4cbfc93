//! Geospatial POI interaction engine.
//!
//! The engine turns a server-supplied POI snapshot plus live viewport and
//! user-location state into a clustered marker set, a filtered view and a
//! ranked, cached search/suggestion stream. Rendering, transport and UI
//! concerns live behind ports so the pipeline stays synchronous and testable.

pub mod config;
pub mod domain;
pub mod outbound;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use config::EngineSettings;
pub use domain::{EngineError, MapEngine};
