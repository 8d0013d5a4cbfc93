//! The [`MapEngine`] aggregate.
//!
//! One explicitly constructed engine owns the POI snapshot, filters, marker
//! map, caches and event bus. The synchronous pipeline
//! (`POIs × filters × viewport → render instructions`) runs on `&mut self`;
//! only network-backed calls suspend. Background work (cache maintenance,
//! viewport debouncing, position watching) is started explicitly and torn
//! down by [`MapEngine::shutdown`] or on drop.

use std::sync::Arc;
use std::time::Duration;

use mockable::{Clock, DefaultClock};
use serde_json::Value;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use super::cache::{
    CacheCeilings, CacheKind, EngineCaches, MaintenanceReport, RestoreReport, spawn_maintenance,
};
use super::cluster::ClusterConfig;
use super::error::{EngineError, ValidationError};
use super::events::{EngineEvent, EventBus};
use super::filter::{FilterOptions, apply_filters};
use super::geocoding::{
    AddressValidation, GeocodeResult, GeocodingPolicies, GeocodingService, Locality,
    ReverseGeocodeResult, ServiceArea,
};
use super::geometry::{Coordinate, validate_coordinates};
use super::location::{LocationService, LocationWatch};
use super::markers::{MarkerManager, RenderInstruction};
use super::poi::{Poi, PoiId};
use super::ports::{
    FixtureGeocodingProvider, FixturePlaceSearchSource, FixturePoiSource, FixtureRouteProvider,
    GeocodeOptions, GeocodingProvider, GeolocationProvider, NearbyPlace, NearbyQuery,
    PlaceSearchSource, PoiSource, Position, Route, RouteProvider, UnavailableGeolocationProvider,
};
use super::retry::{RetryPolicy, RetryRunner};
use super::search::{MIN_QUERY_CHARS, RankedResult, search};
use super::stats::{MapStats, map_stats};
use super::suggestions::{SearchSuggestion, SuggestionService};
use super::viewport::{ViewportCoordinator, ViewportState, ZoomGesture};

/// Tunables for one engine instance.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineOptions {
    /// Quiet period for viewport debouncing.
    pub debounce: Duration,
    /// Clustering thresholds.
    pub cluster: ClusterConfig,
    /// Cache eviction ceilings.
    pub ceilings: CacheCeilings,
    /// Period of the cache maintenance task.
    pub maintenance_interval: Duration,
    /// Position used when geolocation fails.
    pub default_location: Coordinate,
    /// Area forward-geocode hits must fall in.
    pub service_area: ServiceArea,
    /// City and country appended to forward queries.
    pub locality: Locality,
    /// Retry budgets for geocoding.
    pub geocoding: GeocodingPolicies,
    /// Retry budget for nearby POI fetches and remote POI search.
    pub nearby: RetryPolicy,
    /// Retry budget for place name search.
    pub place_search: RetryPolicy,
    /// Retry budget for route calculation.
    pub routing: RetryPolicy,
    /// Maximum POIs requested per nearby fetch.
    pub nearby_limit: usize,
    /// Per-subscriber event buffer.
    pub event_capacity: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        let default_location = Coordinate::new(3.8480, 11.5021);
        Self {
            debounce: Duration::from_millis(300),
            cluster: ClusterConfig::default(),
            ceilings: CacheCeilings::default(),
            maintenance_interval: Duration::from_secs(3600),
            default_location,
            service_area: ServiceArea {
                center: default_location,
                radius_km: 50.0,
            },
            locality: Locality::default(),
            geocoding: GeocodingPolicies::default(),
            nearby: RetryPolicy::nearby(),
            place_search: RetryPolicy::place_search(),
            routing: RetryPolicy::routing(),
            nearby_limit: 200,
            event_capacity: 64,
        }
    }
}

/// Port bundle required by the engine.
#[derive(Clone)]
pub struct MapEnginePorts {
    /// POI snapshot source.
    pub pois: Arc<dyn PoiSource>,
    /// Forward and reverse geocoding provider.
    pub geocoding: Arc<dyn GeocodingProvider>,
    /// Place search used for suggestions and category lookups.
    pub places: Arc<dyn PlaceSearchSource>,
    /// Device position provider.
    pub geolocation: Arc<dyn GeolocationProvider>,
    /// Driving directions.
    pub routes: Arc<dyn RouteProvider>,
}

impl Default for MapEnginePorts {
    fn default() -> Self {
        Self {
            pois: Arc::new(FixturePoiSource::default()),
            geocoding: Arc::new(FixtureGeocodingProvider::default()),
            places: Arc::new(FixturePlaceSearchSource),
            geolocation: Arc::new(UnavailableGeolocationProvider),
            routes: Arc::new(FixtureRouteProvider),
        }
    }
}

/// Runtime helpers: time source and retry collaborators.
#[derive(Clone)]
pub struct MapEngineRuntime {
    /// Wall clock.
    pub clock: Arc<dyn Clock>,
    /// Sleeper and jitter used between retries.
    pub retry: RetryRunner,
}

impl Default for MapEngineRuntime {
    fn default() -> Self {
        Self {
            clock: Arc::new(DefaultClock),
            retry: RetryRunner::default(),
        }
    }
}

/// Geospatial POI interaction engine.
pub struct MapEngine {
    options: EngineOptions,
    bus: EventBus,
    caches: Arc<EngineCaches>,
    markers: MarkerManager,
    pois: Vec<Poi>,
    filters: FilterOptions,
    filtered: Vec<Poi>,
    user_location: Option<Coordinate>,
    viewport: Option<ViewportState>,
    gesture: ZoomGesture,
    poi_source: Arc<dyn PoiSource>,
    places: Arc<dyn PlaceSearchSource>,
    routes: Arc<dyn RouteProvider>,
    retry: RetryRunner,
    geocoding: GeocodingService,
    suggestions: SuggestionService,
    location: LocationService,
    coordinator: Option<ViewportCoordinator>,
    location_watch: Option<LocationWatch>,
    maintenance: Option<JoinHandle<()>>,
}

impl MapEngine {
    /// Assemble an engine. Nothing is spawned until asked for.
    pub fn new(options: EngineOptions, ports: MapEnginePorts, runtime: MapEngineRuntime) -> Self {
        let bus = EventBus::new(options.event_capacity);
        let caches = Arc::new(EngineCaches::new(options.ceilings));
        let geocoding = GeocodingService::new(
            ports.geocoding,
            Arc::clone(&caches),
            options.service_area,
            options.locality.clone(),
        )
        .with_retry(options.geocoding, runtime.retry.clone());
        let suggestions = SuggestionService::new(
            geocoding.clone(),
            Arc::clone(&ports.places),
            Arc::clone(&caches),
            bus.clone(),
        )
        .with_retry(options.place_search, runtime.retry.clone());
        let location =
            LocationService::new(ports.geolocation, options.default_location, runtime.clock);

        Self {
            bus,
            caches,
            markers: MarkerManager::new(),
            pois: Vec::new(),
            filters: FilterOptions::default(),
            filtered: Vec::new(),
            user_location: None,
            viewport: None,
            gesture: ZoomGesture::default(),
            poi_source: ports.pois,
            places: ports.places,
            routes: ports.routes,
            retry: runtime.retry,
            geocoding,
            suggestions,
            location,
            coordinator: None,
            location_watch: None,
            maintenance: None,
            options,
        }
    }

    /// Engine with fixture ports and default options.
    pub fn with_defaults() -> Self {
        Self::new(
            EngineOptions::default(),
            MapEnginePorts::default(),
            MapEngineRuntime::default(),
        )
    }

    /// Options the engine was built with.
    pub const fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Handle onto the engine's event bus.
    pub fn events(&self) -> EventBus {
        self.bus.clone()
    }

    /// Receive engine events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.bus.subscribe()
    }

    /// Current POI snapshot.
    pub fn pois(&self) -> &[Poi] {
        &self.pois
    }

    /// Active filters.
    pub const fn filters(&self) -> &FilterOptions {
        &self.filters
    }

    /// Snapshot POIs passing the active filters, in snapshot order.
    pub fn filtered_pois(&self) -> &[Poi] {
        &self.filtered
    }

    /// Marker map.
    pub const fn markers(&self) -> &MarkerManager {
        &self.markers
    }

    /// Last applied viewport.
    pub const fn viewport(&self) -> Option<&ViewportState> {
        self.viewport.as_ref()
    }

    /// Last known user position.
    pub const fn user_location(&self) -> Option<Coordinate> {
        self.user_location
    }

    /// Replace the POI snapshot wholesale and re-render.
    ///
    /// POIs whose coordinates fail [`validate_coordinates`] are dropped with
    /// a warning and never reach the marker map.
    pub fn replace_pois(&mut self, pois: Vec<Poi>) -> Vec<RenderInstruction> {
        let received = pois.len();
        self.pois = pois.into_iter().filter(has_valid_position).collect();
        debug!(
            count = self.pois.len(),
            dropped = received - self.pois.len(),
            "replacing POI snapshot"
        );
        self.render()
    }

    /// Replace the active filters and re-render.
    pub fn set_filters(&mut self, filters: FilterOptions) -> Vec<RenderInstruction> {
        debug!(active = filters.active_count(), "filters changed");
        self.filters = filters;
        self.render()
    }

    /// Set or clear the user position used by the distance filter.
    pub fn set_user_location(
        &mut self,
        location: Option<Coordinate>,
    ) -> Result<Vec<RenderInstruction>, ValidationError> {
        if let Some(point) = location {
            validate_coordinates(point.latitude, point.longitude)?;
        }
        self.user_location = location;
        Ok(self.render())
    }

    /// Apply a settled viewport.
    ///
    /// Clusters are recomputed unless a zoom gesture is in progress.
    pub fn apply_viewport(&mut self, state: ViewportState) -> Vec<RenderInstruction> {
        self.viewport = Some(state);
        self.render()
    }

    /// Recompute the filtered set and reconcile markers against it.
    ///
    /// The newest fix from a running [`Self::watch_location`] becomes the
    /// user position first.
    pub fn render(&mut self) -> Vec<RenderInstruction> {
        self.take_watched_location();
        self.filtered = apply_filters(&self.pois, &self.filters, self.user_location.as_ref());
        let bounds = self.viewport.as_ref().map(|state| state.bounds);
        let mut instructions = self
            .markers
            .reconcile(&self.pois, &self.filtered, bounds.as_ref());
        if !self.gesture.is_active() {
            instructions.extend(self.cluster_instructions());
        }
        instructions
    }

    fn cluster_instructions(&self) -> Vec<RenderInstruction> {
        self.viewport.as_ref().map_or_else(Vec::new, |state| {
            self.markers
                .cluster_instructions(state.zoom, &self.options.cluster)
        })
    }

    /// Suspend clustering for the duration of a zoom gesture.
    pub fn begin_zoom(&self) {
        self.gesture.begin();
    }

    /// End the zoom gesture and recompute clusters for the final viewport.
    pub fn end_zoom(&mut self) -> Vec<RenderInstruction> {
        self.gesture.end();
        self.cluster_instructions()
    }

    /// Zoom gesture flag, shared with the viewport coordinator.
    pub fn gesture(&self) -> ZoomGesture {
        self.gesture.clone()
    }

    /// Start debouncing raw viewport events.
    ///
    /// Settled states are published as [`EngineEvent::ViewportMoved`] and on
    /// the returned receiver; feed raw events through
    /// [`Self::push_viewport_event`]. Restarting replaces the coordinator.
    pub fn start_viewport_coordinator(&mut self) -> watch::Receiver<Option<ViewportState>> {
        let coordinator =
            ViewportCoordinator::spawn(self.options.debounce, self.bus.clone(), self.gesture());
        let settled = coordinator.subscribe();
        if let Some(previous) = self.coordinator.replace(coordinator) {
            previous.shutdown();
        }
        settled
    }

    /// Forward a raw move or zoom event to the coordinator, if running.
    pub fn push_viewport_event(&self, state: ViewportState) {
        match &self.coordinator {
            Some(coordinator) => coordinator.push(state),
            None => debug!("viewport coordinator not started; dropping raw event"),
        }
    }

    /// Fetch POIs around the current viewport and replace the snapshot.
    ///
    /// The radius is the half-diagonal of the viewport. Without a viewport
    /// the fetch is centred on the user (or default) position and covers the
    /// service area.
    #[instrument(skip(self))]
    pub async fn refresh_nearby(&mut self) -> Result<Vec<RenderInstruction>, EngineError> {
        let query = self.nearby_query();
        let source = Arc::clone(&self.poi_source);
        let pois = self
            .retry
            .run("nearby", &self.options.nearby, || {
                let source = Arc::clone(&source);
                async move { source.nearby(&query).await }
            })
            .await?;
        Ok(self.replace_pois(pois))
    }

    fn nearby_query(&self) -> NearbyQuery {
        let (center, radius_km) = match &self.viewport {
            Some(state) => {
                let corner = Coordinate::new(state.bounds.north, state.bounds.east);
                (state.center, state.center.distance_to(&corner))
            }
            None => (
                self.user_location
                    .unwrap_or(self.options.default_location),
                self.options.service_area.radius_km,
            ),
        };
        NearbyQuery {
            center,
            radius_km,
            limit: self.options.nearby_limit,
        }
    }

    /// Replace the snapshot with the source's matches for `query`.
    #[instrument(skip(self))]
    pub async fn refresh_search(
        &mut self,
        query: &str,
    ) -> Result<Vec<RenderInstruction>, EngineError> {
        let trimmed = query.trim();
        if trimmed.chars().count() < MIN_QUERY_CHARS {
            return Err(ValidationError::empty_query(MIN_QUERY_CHARS).into());
        }
        let source = Arc::clone(&self.poi_source);
        let pois = self
            .retry
            .run("poi_search", &self.options.nearby, || {
                let source = Arc::clone(&source);
                let text = trimmed.to_owned();
                async move { source.search(&text).await }
            })
            .await?;
        Ok(self.replace_pois(pois))
    }

    /// Named places within `radius_km` of the user (or viewport, or
    /// default) position, nearest first, optionally restricted to a
    /// category.
    #[instrument(skip(self))]
    pub async fn nearby_places(
        &self,
        radius_km: f64,
        category: Option<&str>,
    ) -> Result<Vec<NearbyPlace>, EngineError> {
        if !radius_km.is_finite() || radius_km <= 0.0 {
            return Err(ValidationError::invalid_radius(radius_km).into());
        }
        let center = self.focus();
        let places = Arc::clone(&self.places);
        let category = category.map(str::to_owned);
        let found = self
            .retry
            .run("nearby_places", &self.options.nearby, || {
                let places = Arc::clone(&places);
                let category = category.clone();
                async move { places.nearby_places(center, radius_km, category).await }
            })
            .await?;
        Ok(found)
    }

    /// Driving route from `from` (the user position when `None`) to `to`.
    #[instrument(skip(self))]
    pub async fn route(
        &self,
        from: Option<Coordinate>,
        to: Coordinate,
    ) -> Result<Route, EngineError> {
        let from = from.unwrap_or_else(|| self.focus());
        for point in [from, to] {
            validate_coordinates(point.latitude, point.longitude)?;
        }
        let routes = Arc::clone(&self.routes);
        let route = self
            .retry
            .run("route", &self.options.routing, || {
                let routes = Arc::clone(&routes);
                async move { routes.route(from, to).await }
            })
            .await?;
        debug!(distance_m = route.distance_m, "route computed");
        Ok(route)
    }

    /// Rank the snapshot against `query`.
    pub fn search(&self, query: &str) -> Vec<RankedResult> {
        search(query, &self.pois)
    }

    /// Where suggestions are centred: user, then viewport, then default.
    fn focus(&self) -> Coordinate {
        self.user_location
            .or_else(|| self.viewport.as_ref().map(|state| state.center))
            .unwrap_or(self.options.default_location)
    }

    /// Compute merged suggestions for `query` directly.
    pub async fn suggestions(&self, query: &str) -> Vec<SearchSuggestion> {
        self.suggestions.suggestions(query, self.focus()).await
    }

    /// Feed a keystroke of the search box.
    ///
    /// Lookups start after a 300 ms pause in typing, are skipped when the
    /// settled query repeats the previous one, and only the latest lookup
    /// publishes [`EngineEvent::SearchSuggestions`].
    pub fn request_suggestions(&self, query: &str) {
        self.suggestions.request(query, self.focus());
    }

    /// Forward geocode an address.
    pub async fn geocode(
        &self,
        address: &str,
        options: &GeocodeOptions,
    ) -> Result<Vec<GeocodeResult>, EngineError> {
        self.geocoding.geocode(address, options).await
    }

    /// Check that `address` resolves within a kilometre of `claimed`.
    pub async fn validate_address(
        &self,
        address: &str,
        claimed: Coordinate,
    ) -> Result<AddressValidation, EngineError> {
        self.geocoding.validate_address(address, claimed).await
    }

    /// Coordinates of the best match for a place name.
    pub async fn place_coordinates(&self, name: &str) -> Result<Option<Coordinate>, EngineError> {
        self.geocoding.place_coordinates(name).await
    }

    /// Reverse geocode a position.
    pub async fn reverse_geocode(
        &self,
        coordinate: Coordinate,
    ) -> Result<ReverseGeocodeResult, EngineError> {
        self.geocoding.reverse_geocode(coordinate).await
    }

    /// Locate the user, falling back to the default position.
    ///
    /// The position is stored and published as [`EngineEvent::UserLocated`];
    /// call [`Self::render`] to apply it to a distance filter.
    pub async fn locate(&mut self) -> Position {
        let position = self.location.locate().await;
        self.user_location = Some(position.coordinate);
        self.bus
            .publish(EngineEvent::UserLocated(position.coordinate));
        position
    }

    /// Poll the position provider every `interval` until shutdown.
    ///
    /// Fixes are published as they arrive and applied to the user position
    /// on the next [`Self::render`].
    pub fn watch_location(&mut self, interval: Duration) {
        let watch = self.location.watch(interval, self.bus.clone());
        if let Some(previous) = self.location_watch.replace(watch) {
            previous.stop();
        }
    }

    fn take_watched_location(&mut self) {
        let Some(position) = self
            .location_watch
            .as_mut()
            .and_then(LocationWatch::take_update)
        else {
            return;
        };
        let coordinate = position.coordinate;
        match validate_coordinates(coordinate.latitude, coordinate.longitude) {
            Ok(()) => self.user_location = Some(coordinate),
            Err(error) => warn!(%error, "ignoring watched position"),
        }
    }

    /// Publish a click on the marker for `id`; unknown ids are ignored.
    pub fn poi_clicked(&self, id: &PoiId) -> Option<Poi> {
        let poi = self.markers.get(id).map(|marker| marker.poi.clone())?;
        self.bus.publish(EngineEvent::PoiClicked(poi.clone()));
        Some(poi)
    }

    /// Publish a click on empty map space.
    pub fn map_clicked(&self, coordinate: Coordinate) {
        self.bus.publish(EngineEvent::MapClicked(coordinate));
    }

    /// Publish pointer entry on a marker, or exit with `None`.
    pub fn marker_hovered(&self, id: Option<&PoiId>) {
        let poi = id
            .and_then(|id| self.markers.get(id))
            .map(|marker| marker.poi.clone());
        self.bus.publish(EngineEvent::MarkerHovered(poi));
    }

    /// Summary of the snapshot for the current viewport and user position.
    pub fn stats(&self) -> MapStats {
        map_stats(
            &self.pois,
            self.viewport.as_ref().map(|state| &state.bounds),
            self.user_location.as_ref(),
        )
    }

    /// Start periodic cache maintenance; a running task is replaced.
    pub fn start_maintenance(&mut self) {
        let task = spawn_maintenance(
            Arc::clone(&self.caches),
            self.options.maintenance_interval,
        );
        if let Some(previous) = self.maintenance.replace(task) {
            previous.abort();
        }
    }

    /// Run one maintenance pass now.
    pub fn maintain_caches(&self) -> MaintenanceReport {
        self.caches.maintain()
    }

    /// Entries currently held by one cache.
    pub fn cache_len(&self, kind: CacheKind) -> usize {
        self.caches.len(kind)
    }

    /// Drop every cached geocode, reverse geocode and suggestion.
    pub fn clear_cache(&self) {
        self.caches.clear();
    }

    /// Snapshot one cache as JSON.
    pub fn export_cache(&self, kind: CacheKind) -> Result<Value, serde_json::Error> {
        self.caches.export(kind)
    }

    /// Load one cache from a JSON snapshot, skipping malformed entries.
    pub fn restore_cache(
        &self,
        kind: CacheKind,
        snapshot: Value,
    ) -> Result<RestoreReport, serde_json::Error> {
        self.caches.restore(kind, snapshot)
    }

    /// Stop background work and remove every marker from the renderer.
    pub fn shutdown(&mut self) -> Vec<RenderInstruction> {
        self.stop_background();
        info!(markers = self.markers.len(), "map engine shut down");
        self.markers.clear()
    }

    fn stop_background(&mut self) {
        if let Some(task) = self.maintenance.take() {
            task.abort();
        }
        if let Some(watch) = self.location_watch.take() {
            watch.stop();
        }
        if let Some(coordinator) = self.coordinator.take() {
            coordinator.shutdown();
        }
        self.suggestions.cancel();
    }
}

fn has_valid_position(poi: &Poi) -> bool {
    match validate_coordinates(poi.latitude, poi.longitude) {
        Ok(()) => true,
        Err(error) => {
            warn!(id = %poi.id, %error, "dropping POI with invalid coordinates");
            false
        }
    }
}

impl Drop for MapEngine {
    fn drop(&mut self) {
        self.stop_background();
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
