//! Test utilities for the engine crate.
//!
//! Shared by unit tests (in `src/`) and integration tests (in `tests/`);
//! compiled for tests and under the `test-support` feature.

use std::io;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeDelta, Utc};
use mockable::Clock;

use crate::domain::geometry::{Coordinate, bounds_from_radius};
use crate::domain::markers::RenderInstruction;
use crate::domain::poi::{Poi, PoiId};
use crate::domain::retry::{BackoffJitter, RetrySleeper};
use crate::domain::viewport::ViewportState;

/// Half-width of the box produced by [`viewport`], in kilometres.
pub const VIEWPORT_RADIUS_KM: f64 = 2.0;

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Builder for [`Poi`] values with sensible defaults.
///
/// POIs start at the Yaoundé city centre, unrated and unverified, with no
/// feature flags.
#[derive(Debug, Clone)]
pub struct PoiFixture {
    poi: Poi,
}

impl PoiFixture {
    pub fn new(id: &str, name: &str, category: &str) -> Self {
        Self {
            poi: Poi {
                id: PoiId::from(id),
                name: name.to_owned(),
                description: String::new(),
                latitude: 3.8480,
                longitude: 11.5021,
                address: None,
                category: category.to_owned(),
                rating: 0.0,
                rating_count: 0,
                is_verified: false,
                is_restaurant: false,
                is_transport: false,
                is_stadium: false,
                is_booking: false,
                created_at: None,
                updated_at: None,
            },
        }
    }

    #[must_use]
    pub const fn at(mut self, latitude: f64, longitude: f64) -> Self {
        self.poi.latitude = latitude;
        self.poi.longitude = longitude;
        self
    }

    #[must_use]
    pub const fn rating(mut self, rating: f64) -> Self {
        self.poi.rating = rating;
        self.poi.rating_count = 1;
        self
    }

    #[must_use]
    pub const fn verified(mut self) -> Self {
        self.poi.is_verified = true;
        self
    }

    #[must_use]
    pub const fn restaurant(mut self) -> Self {
        self.poi.is_restaurant = true;
        self
    }

    #[must_use]
    pub const fn transport(mut self) -> Self {
        self.poi.is_transport = true;
        self
    }

    #[must_use]
    pub const fn stadium(mut self) -> Self {
        self.poi.is_stadium = true;
        self
    }

    #[must_use]
    pub const fn booking(mut self) -> Self {
        self.poi.is_booking = true;
        self
    }

    #[must_use]
    pub fn description(mut self, description: &str) -> Self {
        description.clone_into(&mut self.poi.description);
        self
    }

    pub fn build(self) -> Poi {
        self.poi
    }
}

/// Viewport centred on `(latitude, longitude)` spanning
/// [`VIEWPORT_RADIUS_KM`] in every direction.
pub fn viewport(latitude: f64, longitude: f64, zoom: u8) -> ViewportState {
    let center = Coordinate::new(latitude, longitude);
    ViewportState {
        center,
        zoom,
        bounds: bounds_from_radius(&center, VIEWPORT_RADIUS_KM),
        timestamp: DateTime::from_timestamp(1_780_000_000, 0).unwrap_or_default(),
    }
}

/// Clock that only moves when told to.
pub struct MutableClock(Mutex<DateTime<Utc>>);

impl MutableClock {
    pub const fn new(now: DateTime<Utc>) -> Self {
        Self(Mutex::new(now))
    }

    pub fn advance(&self, delta: Duration) {
        let delta = TimeDelta::from_std(delta).unwrap_or(TimeDelta::MAX);
        *locked(&self.0) += delta;
    }
}

impl Clock for MutableClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *locked(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ImmediateSleeper;

#[async_trait]
impl RetrySleeper for ImmediateSleeper {
    async fn sleep(&self, _duration: Duration) {}
}

/// Sleeper that returns at once and remembers every requested delay.
#[derive(Debug, Default)]
pub struct RecordingSleeper(Mutex<Vec<Duration>>);

impl RecordingSleeper {
    pub fn recorded(&self) -> Vec<Duration> {
        locked(&self.0).clone()
    }
}

#[async_trait]
impl RetrySleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        locked(&self.0).push(duration);
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoJitter;

impl BackoffJitter for NoJitter {
    fn jittered_delay(&self, base: Duration, _attempt: u32, _now: DateTime<Utc>) -> Duration {
        base
    }
}

/// Render collaborator double that replays instructions into a drawn set.
#[derive(Debug, Default)]
pub struct RecordingRenderSink {
    log: Vec<RenderInstruction>,
    drawn: Vec<PoiId>,
    clusters: usize,
}

impl RecordingRenderSink {
    /// Apply `instructions` in order.
    pub fn apply(&mut self, instructions: Vec<RenderInstruction>) {
        for instruction in instructions {
            match &instruction {
                RenderInstruction::Add { marker } => self.drawn.push(marker.id.clone()),
                RenderInstruction::Remove { id, .. } => self.drawn.retain(|drawn| drawn != id),
                RenderInstruction::ClearClusters => self.clusters = 0,
                RenderInstruction::UpdateCluster { .. } => self.clusters += 1,
            }
            self.log.push(instruction);
        }
    }

    /// Marker ids currently drawn, in draw order.
    pub fn drawn(&self) -> &[PoiId] {
        &self.drawn
    }

    /// Cluster icons currently drawn.
    pub const fn cluster_count(&self) -> usize {
        self.clusters
    }

    /// Every instruction received so far.
    pub fn log(&self) -> &[RenderInstruction] {
        &self.log
    }
}

/// Write `pois` as a JSON array into a fresh temporary directory.
///
/// Returns the directory guard with the file path; the file disappears when
/// the guard drops.
pub fn poi_file(pois: &[Poi]) -> io::Result<(tempfile::TempDir, PathBuf)> {
    let directory = tempfile::tempdir()?;
    let path = directory.path().join("pois.json");
    let body = serde_json::to_vec_pretty(pois).map_err(io::Error::other)?;
    let root = cap_std::fs::Dir::open_ambient_dir(directory.path(), cap_std::ambient_authority())?;
    root.write("pois.json", body)?;
    Ok((directory, path))
}
