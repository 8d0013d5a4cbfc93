//! Typed publish/subscribe channel between the engine and UI layers.

use tokio::sync::broadcast;
use tracing::trace;

use super::geometry::Coordinate;
use super::poi::Poi;
use super::suggestions::SearchSuggestion;
use super::viewport::ViewportState;

/// Events emitted by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// A debounced viewport change settled.
    ViewportMoved(ViewportState),
    /// The user selected a POI marker.
    PoiClicked(Poi),
    /// The user clicked the map outside any marker.
    MapClicked(Coordinate),
    /// The pointer entered a marker, or left it (`None`).
    MarkerHovered(Option<Poi>),
    /// Suggestions for the latest search query are ready.
    SearchSuggestions(Vec<SearchSuggestion>),
    /// A new user position was obtained.
    UserLocated(Coordinate),
}

impl EngineEvent {
    /// Stable event name for logs.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ViewportMoved(_) => "viewport_moved",
            Self::PoiClicked(_) => "poi_clicked",
            Self::MapClicked(_) => "map_clicked",
            Self::MarkerHovered(_) => "marker_hovered",
            Self::SearchSuggestions(_) => "search_suggestions",
            Self::UserLocated(_) => "user_located",
        }
    }
}

/// Cloneable handle onto a broadcast channel of [`EngineEvent`]s.
///
/// Slow subscribers lag rather than block publishers; publishing with no
/// subscribers is not an error.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Deliver `event` to every current subscriber.
    pub fn publish(&self, event: EngineEvent) {
        let name = event.name();
        match self.sender.send(event) {
            Ok(receivers) => trace!(event = name, receivers, "event published"),
            Err(_) => trace!(event = name, "event dropped; no subscribers"),
        }
    }

    /// Start receiving events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}
