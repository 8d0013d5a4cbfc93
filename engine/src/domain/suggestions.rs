//! Search-as-you-type suggestions with latest-wins delivery.
//!
//! A lookup merges up to three geocoded addresses with named places found
//! around the user. [`SuggestionService::request`] debounces keystrokes,
//! skips a settled query equal to the previous one, and supersedes whatever
//! lookup is still running, so only the newest query ever reaches the
//! event bus.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, warn};

use super::cache::{EngineCaches, locked};
use super::events::{EngineEvent, EventBus};
use super::geocoding::{GeocodeResult, GeocodingService};
use super::geometry::Coordinate;
use super::ports::{GeocodeOptions, NearbyPlace, PlaceSearchSource};
use super::retry::{RetryPolicy, RetryRunner};

/// Queries shorter than this, after trimming, yield no suggestions.
pub const MIN_SUGGESTION_CHARS: usize = 2;
/// Address hits considered per lookup.
pub const MAX_ADDRESS_SUGGESTIONS: usize = 3;
/// Upper bound on a merged suggestion list.
pub const MAX_SUGGESTIONS: usize = 8;
/// Confidence assigned to place-name hits.
pub const PLACE_CONFIDENCE: f64 = 0.8;

/// Origin of a suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionKind {
    /// Geocoded street address.
    Address,
    /// Administrative place or locality.
    Place,
    /// Named point of interest.
    Poi,
}

/// One entry of the suggestion dropdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSuggestion {
    /// Label shown to the user.
    pub text: String,
    /// Where the suggestion came from.
    #[serde(rename = "type")]
    pub kind: SuggestionKind,
    /// Latitude, when the suggestion is locatable.
    pub latitude: Option<f64>,
    /// Longitude, when the suggestion is locatable.
    pub longitude: Option<f64>,
    /// Category of POI suggestions.
    pub category: Option<String>,
    /// Ranking confidence in `[0, 1]`.
    pub confidence: f64,
}

impl From<&GeocodeResult> for SearchSuggestion {
    fn from(result: &GeocodeResult) -> Self {
        Self {
            text: result.display_name.clone(),
            kind: SuggestionKind::Address,
            latitude: Some(result.latitude),
            longitude: Some(result.longitude),
            category: None,
            confidence: result.confidence,
        }
    }
}

impl From<&NearbyPlace> for SearchSuggestion {
    fn from(place: &NearbyPlace) -> Self {
        Self {
            text: place.name.clone(),
            kind: SuggestionKind::Poi,
            latitude: Some(place.latitude),
            longitude: Some(place.longitude),
            category: Some(place.category.clone()),
            confidence: PLACE_CONFIDENCE,
        }
    }
}

/// Merge address and place hits into one ranked list.
///
/// Takes at most [`MAX_ADDRESS_SUGGESTIONS`] addresses, sorts by confidence
/// (stable, highest first) and keeps [`MAX_SUGGESTIONS`] entries.
pub fn merge_suggestions(addresses: &[GeocodeResult], places: &[NearbyPlace]) -> Vec<SearchSuggestion> {
    let mut merged: Vec<SearchSuggestion> = addresses
        .iter()
        .take(MAX_ADDRESS_SUGGESTIONS)
        .map(SearchSuggestion::from)
        .chain(places.iter().map(SearchSuggestion::from))
        .collect();
    merged.sort_by(|left, right| right.confidence.total_cmp(&left.confidence));
    merged.truncate(MAX_SUGGESTIONS);
    merged
}

/// Cache key for a suggestion query, or `None` when it is too short.
pub fn suggestion_cache_key(query: &str) -> Option<String> {
    let normalized = query.trim().to_lowercase();
    (normalized.chars().count() >= MIN_SUGGESTION_CHARS).then_some(normalized)
}

struct SuggestionLookup {
    geocoding: GeocodingService,
    places: Arc<dyn PlaceSearchSource>,
    caches: Arc<EngineCaches>,
    runner: RetryRunner,
    place_policy: RetryPolicy,
}

impl SuggestionLookup {
    async fn suggestions(&self, query: &str, around: Coordinate) -> Vec<SearchSuggestion> {
        let Some(key) = suggestion_cache_key(query) else {
            return Vec::new();
        };
        if let Some(hit) = self.caches.suggestions(&key) {
            debug!(key, "suggestion cache hit");
            return hit;
        }

        let options = GeocodeOptions::default().with_limit(3);
        let addresses = self.geocoding.geocode(query, &options).await;
        let places = self
            .runner
            .run("search_places", &self.place_policy, || {
                let places = Arc::clone(&self.places);
                let query = query.to_owned();
                async move { places.search_places(&query, around).await }
            })
            .await;

        let complete = addresses.is_ok() && places.is_ok();
        let addresses = addresses.unwrap_or_else(|error| {
            warn!(%error, "address suggestions unavailable");
            Vec::new()
        });
        let places = places.unwrap_or_else(|error| {
            warn!(%error, "place suggestions unavailable");
            Vec::new()
        });

        let merged = merge_suggestions(&addresses, &places);
        if complete {
            self.caches.store_suggestions(key, merged.clone());
        }
        merged
    }
}

/// Quiet period before a typed query is looked up.
pub const SUGGESTION_DEBOUNCE: Duration = Duration::from_millis(300);

/// Trailing-edge debouncer for typed queries, suppressing a settled query
/// equal to the previous one.
#[derive(Debug)]
pub struct QueryDebouncer {
    window: Duration,
    pending: Option<(String, Coordinate, Instant)>,
    last_emitted: Option<String>,
}

impl QueryDebouncer {
    /// Create a debouncer with the given quiet period.
    pub const fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
            last_emitted: None,
        }
    }

    /// Record a keystroke observed at `now`, restarting the quiet period.
    pub fn push(&mut self, query: String, around: Coordinate, now: Instant) {
        self.pending = Some((query, around, now));
    }

    /// Instant at which the pending query becomes due, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(_, _, at)| *at + self.window)
    }

    /// Release the pending query once its quiet period has elapsed and it
    /// differs from the last released one.
    pub fn poll(&mut self, now: Instant) -> Option<(String, Coordinate)> {
        let due = self.deadline().is_some_and(|deadline| now >= deadline);
        if !due {
            return None;
        }
        let (query, around, _) = self.pending.take()?;
        if self.last_emitted.as_deref() == Some(query.as_str()) {
            debug!(query, "query unchanged; suppressing lookup");
            return None;
        }
        self.last_emitted = Some(query.clone());
        Some((query, around))
    }
}

struct Dispatcher {
    lookup: SuggestionLookup,
    bus: EventBus,
    latest: AtomicU64,
    in_flight: Mutex<Option<JoinHandle<()>>>,
}

impl Dispatcher {
    /// Start a lookup, superseding any lookup still running.
    fn dispatch(self: &Arc<Self>, query: String, around: Coordinate) {
        let generation = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        let mut slot = locked(&self.in_flight);
        if let Some(previous) = slot.take() {
            previous.abort();
        }

        let dispatcher = Arc::clone(self);
        *slot = Some(tokio::spawn(async move {
            let suggestions = dispatcher.lookup.suggestions(&query, around).await;
            if dispatcher.latest.load(Ordering::SeqCst) == generation {
                dispatcher
                    .bus
                    .publish(EngineEvent::SearchSuggestions(suggestions));
            } else {
                debug!(query, generation, "dropping superseded suggestions");
            }
        }));
    }

    fn cancel(&self) {
        self.latest.fetch_add(1, Ordering::SeqCst);
        if let Some(previous) = locked(&self.in_flight).take() {
            previous.abort();
        }
    }
}

type KeystrokeSender = mpsc::UnboundedSender<(String, Coordinate)>;

/// Suggestion front end: debounced, distinct, latest-wins.
pub struct SuggestionService {
    dispatcher: Arc<Dispatcher>,
    window: Duration,
    input: Mutex<Option<(KeystrokeSender, JoinHandle<()>)>>,
}

impl SuggestionService {
    /// Assemble the service; results of [`Self::request`] go to `bus`.
    pub fn new(
        geocoding: GeocodingService,
        places: Arc<dyn PlaceSearchSource>,
        caches: Arc<EngineCaches>,
        bus: EventBus,
    ) -> Self {
        let lookup = SuggestionLookup {
            geocoding,
            places,
            caches,
            runner: RetryRunner::default(),
            place_policy: RetryPolicy::place_search(),
        };
        Self {
            dispatcher: Arc::new(Dispatcher {
                lookup,
                bus,
                latest: AtomicU64::new(0),
                in_flight: Mutex::new(None),
            }),
            window: SUGGESTION_DEBOUNCE,
            input: Mutex::new(None),
        }
    }

    /// Replace the place-search retry budget and runner.
    #[must_use]
    pub fn with_retry(mut self, place_policy: RetryPolicy, runner: RetryRunner) -> Self {
        let current = &self.dispatcher.lookup;
        let lookup = SuggestionLookup {
            geocoding: current.geocoding.clone(),
            places: Arc::clone(&current.places),
            caches: Arc::clone(&current.caches),
            runner,
            place_policy,
        };
        self.dispatcher = Arc::new(Dispatcher {
            lookup,
            bus: self.dispatcher.bus.clone(),
            latest: AtomicU64::new(0),
            in_flight: Mutex::new(None),
        });
        self
    }

    /// Replace the keystroke quiet period.
    #[must_use]
    pub fn with_debounce(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Compute suggestions for `query` directly, bypassing the debounce and
    /// the event bus.
    ///
    /// Provider failures degrade to fewer suggestions; degraded lists are
    /// not cached.
    pub async fn suggestions(&self, query: &str, around: Coordinate) -> Vec<SearchSuggestion> {
        self.dispatcher.lookup.suggestions(query, around).await
    }

    /// Feed a keystroke.
    ///
    /// A lookup starts once no keystroke arrived for the quiet period and
    /// the settled query differs from the previous one; it supersedes any
    /// lookup still running. The result is published as
    /// [`EngineEvent::SearchSuggestions`] only if no newer lookup started
    /// in the meantime. Must be called within a tokio runtime.
    pub fn request(&self, query: &str, around: Coordinate) {
        let mut input = locked(&self.input);
        let keystroke = (query.to_owned(), around);
        let keystroke = match input.as_ref() {
            Some((sender, _)) => match sender.send(keystroke) {
                Ok(()) => return,
                Err(mpsc::error::SendError(keystroke)) => keystroke,
            },
            None => keystroke,
        };
        let (sender, task) = self.spawn_input();
        if sender.send(keystroke).is_err() {
            warn!("suggestion input stopped; dropping keystroke");
        }
        if let Some((_, previous)) = input.replace((sender, task)) {
            previous.abort();
        }
    }

    fn spawn_input(&self) -> (KeystrokeSender, JoinHandle<()>) {
        let (sender, mut inbox) = mpsc::unbounded_channel::<(String, Coordinate)>();
        let dispatcher = Arc::clone(&self.dispatcher);
        let window = self.window;
        let task = tokio::spawn(async move {
            let mut debouncer = QueryDebouncer::new(window);
            loop {
                let deadline = debouncer.deadline();
                tokio::select! {
                    received = inbox.recv() => match received {
                        Some((query, around)) => debouncer.push(query, around, Instant::now()),
                        None => break,
                    },
                    () = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                        if let Some((query, around)) = debouncer.poll(Instant::now()) {
                            dispatcher.dispatch(query, around);
                        }
                    }
                }
            }
        });
        (sender, task)
    }

    /// Drop pending keystrokes and abort the running lookup, if any.
    pub fn cancel(&self) {
        if let Some((_, task)) = locked(&self.input).take() {
            task.abort();
        }
        self.dispatcher.cancel();
    }
}

impl Drop for SuggestionService {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    //! Merge ordering and latest-wins delivery.

    use std::collections::BTreeMap;
    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;

    use super::*;
    use crate::domain::geocoding::{Locality, ServiceArea};
    use crate::domain::ports::{FixtureGeocodingProvider, MockPlaceSearchSource, NetworkError};
    use rstest::rstest;

    const CENTER: Coordinate = Coordinate::new(3.8480, 11.5021);

    fn address(name: &str, confidence: f64) -> GeocodeResult {
        GeocodeResult {
            latitude: 3.85,
            longitude: 11.50,
            display_name: name.to_owned(),
            address: name.to_owned(),
            neighborhood: None,
            city: None,
            country: None,
            postcode: None,
            confidence,
            bounds: None,
        }
    }

    fn place(name: &str) -> NearbyPlace {
        NearbyPlace {
            id: format!("node-{name}"),
            name: name.to_owned(),
            category: "restaurant".to_owned(),
            latitude: 3.86,
            longitude: 11.51,
            distance_km: 1.2,
            address: None,
            tags: BTreeMap::new(),
        }
    }

    fn service(places: Arc<dyn PlaceSearchSource>, caches: Arc<EngineCaches>) -> SuggestionService {
        let geocoding = GeocodingService::new(
            Arc::new(FixtureGeocodingProvider::default()),
            Arc::clone(&caches),
            ServiceArea {
                center: CENTER,
                radius_km: 50.0,
            },
            Locality::default(),
        );
        SuggestionService::new(geocoding, places, caches, EventBus::new(16))
    }

    #[rstest]
    fn merge_ranks_by_confidence_and_caps() {
        let addresses: Vec<GeocodeResult> = [0.95, 0.4, 0.9, 0.99]
            .into_iter()
            .enumerate()
            .map(|(index, confidence)| address(&format!("addr-{index}"), confidence))
            .collect();
        let places: Vec<NearbyPlace> = (0..7).map(|index| place(&format!("place-{index}"))).collect();

        let merged = merge_suggestions(&addresses, &places);

        assert_eq!(merged.len(), MAX_SUGGESTIONS);
        let texts: Vec<&str> = merged.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(&texts[..3], ["addr-0", "addr-2", "place-0"]);
        assert!(!texts.contains(&"addr-3"), "only the first three addresses count");
        assert!(merged.iter().all(|s| s.kind != SuggestionKind::Place));
    }

    #[rstest]
    #[case("", None)]
    #[case(" a ", None)]
    #[case(" Hôtel ", Some("hôtel"))]
    fn cache_keys_are_trimmed_and_lowercased(#[case] query: &str, #[case] expected: Option<&str>) {
        assert_eq!(suggestion_cache_key(query).as_deref(), expected);
    }

    #[rstest]
    #[tokio::test]
    async fn failed_place_search_degrades_and_is_not_cached() {
        let mut places = MockPlaceSearchSource::new();
        places
            .expect_search_places()
            .times(2)
            .returning(|_, _| Err(NetworkError::transport("overpass down")));
        let caches = Arc::new(EngineCaches::default());
        let service = service(Arc::new(places), Arc::clone(&caches));

        assert!(service.suggestions("pharmacie", CENTER).await.is_empty());
        assert!(service.suggestions("pharmacie", CENTER).await.is_empty());
        assert_eq!(caches.len(crate::domain::cache::CacheKind::Suggestions), 0);
    }

    struct SlowPlaces;

    #[async_trait]
    impl PlaceSearchSource for SlowPlaces {
        async fn search_places(
            &self,
            query: &str,
            _around: Coordinate,
        ) -> Result<Vec<NearbyPlace>, NetworkError> {
            let delay = if query.starts_with("res") { 900 } else { 100 };
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok(vec![place(query)])
        }

        async fn nearby_places(
            &self,
            _center: Coordinate,
            _radius_km: f64,
            _category: Option<String>,
        ) -> Result<Vec<NearbyPlace>, NetworkError> {
            Ok(Vec::new())
        }
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn only_the_latest_lookup_is_published() {
        let caches = Arc::new(EngineCaches::default());
        let service = service(Arc::new(SlowPlaces), caches);
        let mut events = service.dispatcher.bus.subscribe();

        service.request("resto", CENTER);
        tokio::time::sleep(SUGGESTION_DEBOUNCE + Duration::from_millis(10)).await;
        service.request("pharmacie", CENTER);
        tokio::time::sleep(Duration::from_secs(2)).await;

        match events.recv().await.expect("one publication") {
            EngineEvent::SearchSuggestions(suggestions) => {
                assert_eq!(suggestions.len(), 1);
                assert_eq!(suggestions[0].text, "pharmacie");
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(events.try_recv().is_err(), "superseded lookup must stay silent");
    }

    struct CountingPlaces(AtomicUsize);

    #[async_trait]
    impl PlaceSearchSource for CountingPlaces {
        async fn search_places(
            &self,
            query: &str,
            _around: Coordinate,
        ) -> Result<Vec<NearbyPlace>, NetworkError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(vec![place(query)])
        }

        async fn nearby_places(
            &self,
            _center: Coordinate,
            _radius_km: f64,
            _category: Option<String>,
        ) -> Result<Vec<NearbyPlace>, NetworkError> {
            Ok(Vec::new())
        }
    }

    fn texts(event: EngineEvent) -> Vec<String> {
        match event {
            EngineEvent::SearchSuggestions(suggestions) => {
                suggestions.into_iter().map(|s| s.text).collect()
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn typing_burst_triggers_one_lookup() {
        let places = Arc::new(CountingPlaces(AtomicUsize::new(0)));
        let service = service(places.clone(), Arc::new(EngineCaches::default()));
        let mut events = service.dispatcher.bus.subscribe();

        for query in ["ph", "pha", "phar", "pharma"] {
            service.request(query, CENTER);
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        tokio::time::sleep(SUGGESTION_DEBOUNCE).await;

        assert_eq!(places.0.load(Ordering::SeqCst), 1);
        assert_eq!(texts(events.try_recv().expect("published")), ["pharma"]);
        assert!(events.try_recv().is_err());
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn repeated_query_is_not_looked_up_again() {
        let places = Arc::new(CountingPlaces(AtomicUsize::new(0)));
        let service = service(places.clone(), Arc::new(EngineCaches::default()));
        let mut events = service.dispatcher.bus.subscribe();

        service.request("marché", CENTER);
        tokio::time::sleep(SUGGESTION_DEBOUNCE * 2).await;
        service.request("marché", CENTER);
        tokio::time::sleep(SUGGESTION_DEBOUNCE * 2).await;
        service.request("marche", CENTER);
        tokio::time::sleep(SUGGESTION_DEBOUNCE * 2).await;

        assert_eq!(places.0.load(Ordering::SeqCst), 2);
        assert_eq!(texts(events.try_recv().expect("first")), ["marché"]);
        assert_eq!(texts(events.try_recv().expect("second")), ["marche"]);
        assert!(events.try_recv().is_err());
    }

    #[rstest]
    fn debouncer_waits_for_quiet_and_skips_repeats() {
        let start = Instant::now();
        let window = SUGGESTION_DEBOUNCE;
        let mut debouncer = QueryDebouncer::new(window);
        debouncer.push("pi".to_owned(), CENTER, start);
        debouncer.push("pizza".to_owned(), CENTER, start + Duration::from_millis(200));
        assert!(debouncer.poll(start + window).is_none());

        let settled = debouncer.poll(start + Duration::from_millis(500));
        assert_eq!(settled.map(|(query, _)| query).as_deref(), Some("pizza"));

        debouncer.push("pizza".to_owned(), CENTER, start + Duration::from_secs(1));
        assert!(debouncer.poll(start + Duration::from_secs(2)).is_none());
        assert_eq!(debouncer.deadline(), None);
    }
}
