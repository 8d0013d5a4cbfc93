//! User positioning with a fixed fallback.

use std::sync::Arc;
use std::time::Duration;

use mockable::Clock;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::events::{EngineEvent, EventBus};
use super::geometry::Coordinate;
use super::ports::{GeolocationError, GeolocationProvider, Position};

/// Accuracy reported for the fallback position, in metres.
pub const FALLBACK_ACCURACY_M: f64 = 1000.0;

/// Fixes at the same spot within this many milliseconds are not re-published.
const DUPLICATE_WINDOW_MS: i64 = 30_000;

/// Geolocation front end that never fails.
#[derive(Clone)]
pub struct LocationService {
    provider: Arc<dyn GeolocationProvider>,
    fallback: Coordinate,
    clock: Arc<dyn Clock>,
}

impl LocationService {
    /// Assemble the service; `fallback` is used whenever the provider fails.
    pub fn new(
        provider: Arc<dyn GeolocationProvider>,
        fallback: Coordinate,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            provider,
            fallback,
            clock,
        }
    }

    /// Ask the provider for a fix without falling back.
    pub async fn try_locate(&self) -> Result<Position, GeolocationError> {
        self.provider.current_position().await
    }

    /// Current position, or the fallback coordinate at
    /// [`FALLBACK_ACCURACY_M`] when the provider fails.
    pub async fn locate(&self) -> Position {
        match self.try_locate().await {
            Ok(position) => position,
            Err(error) => {
                warn!(%error, "geolocation failed; using default position");
                self.fallback_position()
            }
        }
    }

    fn fallback_position(&self) -> Position {
        Position {
            coordinate: self.fallback,
            accuracy_m: FALLBACK_ACCURACY_M,
            timestamp: self.clock.utc(),
        }
    }

    /// Poll the provider every `interval` and publish new fixes as
    /// [`EngineEvent::UserLocated`].
    ///
    /// Failed polls are logged and skipped. A fix at the same coordinate as
    /// the previous one, less than 30 seconds later, is not re-published.
    /// The newest fix is also held by the returned handle; see
    /// [`LocationWatch::take_update`].
    pub fn watch(&self, interval: Duration, bus: EventBus) -> LocationWatch {
        let service = self.clone();
        let (latest_tx, latest) = watch::channel(None);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            let mut last: Option<Position> = None;
            loop {
                ticker.tick().await;
                let position = match service.try_locate().await {
                    Ok(position) => position,
                    Err(error) => {
                        warn!(%error, "position watch poll failed");
                        continue;
                    }
                };
                if last.is_some_and(|previous| is_duplicate(&previous, &position)) {
                    continue;
                }
                debug!(accuracy_m = position.accuracy_m, "user position updated");
                latest_tx.send_replace(Some(position));
                bus.publish(EngineEvent::UserLocated(position.coordinate));
                last = Some(position);
            }
        });
        LocationWatch { task, latest }
    }
}

fn is_duplicate(previous: &Position, current: &Position) -> bool {
    previous.coordinate == current.coordinate
        && (current.timestamp - previous.timestamp)
            .num_milliseconds()
            .abs()
            < DUPLICATE_WINDOW_MS
}

/// Handle on a running position watch; dropping it stops the watch.
#[derive(Debug)]
pub struct LocationWatch {
    task: JoinHandle<()>,
    latest: watch::Receiver<Option<Position>>,
}

impl LocationWatch {
    /// The newest fix not yet taken, if any.
    ///
    /// A fix delivered before the watch stopped can still be taken.
    pub fn take_update(&mut self) -> Option<Position> {
        let latest = self.latest.borrow_and_update();
        if latest.has_changed() {
            *latest
        } else {
            None
        }
    }

    /// Stop delivering positions.
    pub fn stop(&self) {
        self.task.abort();
    }

    /// Whether the watch task has ended.
    pub fn is_stopped(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for LocationWatch {
    fn drop(&mut self) {
        self.task.abort();
    }
}
