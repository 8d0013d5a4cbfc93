//! Viewport debouncing and zoom-gesture policy.
//!
//! Raw move/zoom events arrive far faster than clustering can usefully run.
//! [`ViewportDebouncer`] is the clock-driven state machine that collapses
//! them; [`ViewportCoordinator`] drives it from a tokio task and publishes
//! the surviving states.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::debug;

use super::events::{EngineEvent, EventBus};
use super::geometry::{Bounds, Coordinate};

/// Immutable snapshot of the visible map region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewportState {
    /// Map centre.
    pub center: Coordinate,
    /// Integer zoom level.
    pub zoom: u8,
    /// Visible bounding box.
    pub bounds: Bounds,
    /// When the renderer reported the state.
    pub timestamp: DateTime<Utc>,
}

impl ViewportState {
    /// Whether `other` shares this state's centre and zoom.
    ///
    /// Bounds and timestamp are ignored: they change on every resize and
    /// frame without the map having moved.
    pub fn same_position(&self, other: &Self) -> bool {
        self.center == other.center && self.zoom == other.zoom
    }
}

/// Trailing-edge debouncer with distinct-until-changed on `(center, zoom)`.
#[derive(Debug)]
pub struct ViewportDebouncer {
    window: Duration,
    pending: Option<(ViewportState, Instant)>,
    last_emitted: Option<ViewportState>,
}

impl ViewportDebouncer {
    /// Create a debouncer with the given quiet period.
    pub const fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
            last_emitted: None,
        }
    }

    /// Record a raw event observed at `now`, restarting the quiet period.
    pub fn push(&mut self, state: ViewportState, now: Instant) {
        self.pending = Some((state, now));
    }

    /// Instant at which the pending event becomes due, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(_, at)| *at + self.window)
    }

    /// Restart the quiet period of the pending state, if any.
    pub fn defer(&mut self, now: Instant) {
        if let Some((_, at)) = self.pending.as_mut() {
            *at = now;
        }
    }

    /// Release the pending state if its quiet period has elapsed.
    ///
    /// Returns `None` while the window is still open, and also when the
    /// settled state has the same centre and zoom as the last emission.
    pub fn poll(&mut self, now: Instant) -> Option<ViewportState> {
        let due = self.deadline().is_some_and(|deadline| now >= deadline);
        if !due {
            return None;
        }
        let (state, _) = self.pending.take()?;
        if self
            .last_emitted
            .as_ref()
            .is_some_and(|last| last.same_position(&state))
        {
            debug!(zoom = state.zoom, "viewport unchanged; suppressing emission");
            return None;
        }
        self.last_emitted = Some(state.clone());
        Some(state)
    }

    /// Last state that passed the debouncer.
    pub const fn last_emitted(&self) -> Option<&ViewportState> {
        self.last_emitted.as_ref()
    }
}

/// Shared flag tracking whether a zoom gesture is in progress.
///
/// Clustering is suspended while the flag is set so intermediate animation
/// frames never trigger a recompute.
#[derive(Debug, Clone, Default)]
pub struct ZoomGesture(Arc<AtomicBool>);

impl ZoomGesture {
    /// Mark the start of a zoom gesture.
    pub fn begin(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Mark the end of a zoom gesture.
    pub fn end(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    /// Whether a gesture is currently active.
    pub fn is_active(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Background task turning raw viewport events into debounced states.
///
/// Dropping the coordinator stops the task.
#[derive(Debug)]
pub struct ViewportCoordinator {
    raw: mpsc::UnboundedSender<ViewportState>,
    settled: watch::Receiver<Option<ViewportState>>,
    task: JoinHandle<()>,
}

impl ViewportCoordinator {
    /// Spawn the coordinator on the current tokio runtime.
    ///
    /// Each settled state is published on `bus` as
    /// [`EngineEvent::ViewportMoved`] and stored for [`Self::subscribe`].
    /// While `gesture` is active a due state is held back; it is released
    /// at most one quiet period after the gesture ends.
    pub fn spawn(window: Duration, bus: EventBus, gesture: ZoomGesture) -> Self {
        let (raw, mut inbox) = mpsc::unbounded_channel::<ViewportState>();
        let (publish, settled) = watch::channel(None);
        let task = tokio::spawn(async move {
            let mut debouncer = ViewportDebouncer::new(window);
            loop {
                let deadline = debouncer.deadline();
                tokio::select! {
                    received = inbox.recv() => match received {
                        Some(state) => debouncer.push(state, Instant::now()),
                        None => break,
                    },
                    () = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                        if gesture.is_active() {
                            debouncer.defer(Instant::now());
                            continue;
                        }
                        if let Some(state) = debouncer.poll(Instant::now()) {
                            debug!(zoom = state.zoom, "viewport settled");
                            publish.send_replace(Some(state.clone()));
                            bus.publish(EngineEvent::ViewportMoved(state));
                        }
                    }
                }
            }
        });
        Self { raw, settled, task }
    }

    /// Feed a raw move or zoom event from the renderer.
    pub fn push(&self, state: ViewportState) {
        if self.raw.send(state).is_err() {
            debug!("viewport coordinator stopped; dropping raw event");
        }
    }

    /// Receive every settled state; the initial value is `None`.
    pub fn subscribe(&self) -> watch::Receiver<Option<ViewportState>> {
        self.settled.clone()
    }

    /// Stop the background task.
    pub fn shutdown(&self) {
        self.task.abort();
    }
}

impl Drop for ViewportCoordinator {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    //! Debounce timing and change-detection coverage.

    use super::*;
    use crate::test_support::viewport;
    use rstest::rstest;

    const WINDOW: Duration = Duration::from_millis(300);

    #[rstest]
    fn burst_collapses_into_final_state() {
        let start = Instant::now();
        let mut debouncer = ViewportDebouncer::new(WINDOW);
        for step in 0..5_u64 {
            let lng = 11.50 + 0.01 * f64::from(u32::try_from(step).unwrap_or(0));
            debouncer.push(viewport(3.85, lng, 13), start + Duration::from_millis(step * 50));
            assert!(debouncer.poll(start + Duration::from_millis(step * 50)).is_none());
        }

        let settled_at = start + Duration::from_millis(200) + WINDOW;
        let emitted = debouncer.poll(settled_at).expect("burst should settle");
        assert_eq!(emitted.center, Coordinate::new(3.85, 11.54));
        assert!(debouncer.poll(settled_at + WINDOW).is_none());
    }

    #[rstest]
    fn quiet_period_restarts_on_each_event() {
        let start = Instant::now();
        let mut debouncer = ViewportDebouncer::new(WINDOW);
        debouncer.push(viewport(3.85, 11.50, 13), start);
        debouncer.push(viewport(3.86, 11.50, 13), start + Duration::from_millis(250));
        assert!(debouncer.poll(start + WINDOW).is_none());
        assert!(debouncer.poll(start + Duration::from_millis(550)).is_some());
    }

    #[rstest]
    fn bounds_only_changes_are_suppressed() {
        let start = Instant::now();
        let mut debouncer = ViewportDebouncer::new(WINDOW);
        debouncer.push(viewport(3.85, 11.50, 13), start);
        assert!(debouncer.poll(start + WINDOW).is_some());

        let mut resized = viewport(3.85, 11.50, 13);
        resized.bounds.north += 0.2;
        debouncer.push(resized, start + WINDOW);
        assert!(debouncer.poll(start + WINDOW * 2).is_none());

        debouncer.push(viewport(3.85, 11.50, 14), start + WINDOW * 2);
        assert_eq!(
            debouncer.poll(start + WINDOW * 3).map(|state| state.zoom),
            Some(14)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn coordinator_publishes_one_state_per_burst() {
        let bus = EventBus::new(16);
        let mut events = bus.subscribe();
        let coordinator = ViewportCoordinator::spawn(WINDOW, bus.clone(), ZoomGesture::default());
        let mut settled = coordinator.subscribe();

        for step in 0..6_u8 {
            coordinator.push(viewport(3.85, 11.50, 10 + step));
            tokio::time::sleep(Duration::from_millis(40)).await;
        }
        settled.changed().await.expect("coordinator alive");

        let state = settled.borrow().clone().expect("state published");
        assert_eq!(state.zoom, 15);
        match events.recv().await.expect("event published") {
            EngineEvent::ViewportMoved(moved) => assert_eq!(moved, state),
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(events.try_recv().is_err(), "only one emission expected");
        coordinator.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn coordinator_holds_states_during_a_zoom_gesture() {
        let gesture = ZoomGesture::default();
        let coordinator = ViewportCoordinator::spawn(WINDOW, EventBus::new(16), gesture.clone());
        let mut settled = coordinator.subscribe();

        gesture.begin();
        coordinator.push(viewport(3.85, 11.50, 14));
        tokio::time::sleep(WINDOW * 4).await;
        assert!(settled.borrow_and_update().is_none(), "held while zooming");

        gesture.end();
        tokio::time::sleep(WINDOW * 2).await;
        assert!(settled.has_changed().expect("coordinator alive"));
        assert_eq!(settled.borrow().as_ref().map(|state| state.zoom), Some(14));
        coordinator.shutdown();
    }

    #[rstest]
    fn deferring_restarts_the_quiet_period() {
        let start = Instant::now();
        let mut debouncer = ViewportDebouncer::new(WINDOW);
        debouncer.push(viewport(3.85, 11.50, 13), start);
        debouncer.defer(start + WINDOW);
        assert!(debouncer.poll(start + WINDOW).is_none());
        assert!(debouncer.poll(start + WINDOW * 2).is_some());
    }

    #[rstest]
    fn gesture_flag_round_trips() {
        let gesture = ZoomGesture::default();
        assert!(!gesture.is_active());
        gesture.begin();
        assert!(gesture.clone().is_active());
        gesture.end();
        assert!(!gesture.is_active());
    }
}
