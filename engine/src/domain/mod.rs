//! Engine domain: pure pipeline logic and the services around it.
//!
//! Purpose: turn a POI snapshot, filters, viewport and user position into
//! render instructions, ranked search results and cached geocoding answers.
//! External collaborators are reached only through [`ports`].
//!
//! Public surface:
//! - `MapEngine`: the owning aggregate.
//! - `EngineError`, `ValidationError`: error taxonomy.
//! - `Poi`, `FilterOptions`, `ViewportState`, `RenderInstruction`: the
//!   values flowing through the pipeline.

pub mod cache;
pub mod cluster;
pub mod engine;
pub mod error;
pub mod events;
pub mod filter;
pub mod geocoding;
pub mod geometry;
pub mod location;
pub mod markers;
pub mod poi;
pub mod ports;
pub mod retry;
pub mod search;
pub mod stats;
pub mod suggestions;
pub mod viewport;

pub use self::cache::{CacheCeilings, CacheKind, EngineCaches};
pub use self::cluster::{Cluster, ClusterConfig, ClusterTier};
pub use self::engine::{EngineOptions, MapEngine, MapEnginePorts, MapEngineRuntime};
pub use self::error::{EngineError, ValidationError};
pub use self::events::{EngineEvent, EventBus};
pub use self::filter::{FilterOptions, apply_filters};
pub use self::geometry::{Bounds, Coordinate};
pub use self::markers::{MapMarker, RenderInstruction};
pub use self::poi::{Poi, PoiFeature, PoiId};
pub use self::retry::{BackoffJitter, RetryPolicy, RetryRunner, RetrySleeper};
pub use self::search::RankedResult;
pub use self::suggestions::SearchSuggestion;
pub use self::viewport::{ViewportState, ZoomGesture};
