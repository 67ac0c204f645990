mod effects;
mod lanes;

use std::{
    collections::VecDeque,
    sync::Arc,
    thread,
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};

use crossbeam::{atomic::AtomicCell, channel::unbounded};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

pub use effects::*;
pub use lanes::*;

use crate::{DanmuConfig, DanmuEvent, DanmuEventReceiver, DanmuEventSender, Id};

pub type DanmuId = Id<DanmuMessage>;

/// A floating comment as received from the room's reaction stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DanmuMessage {
    pub username: String,
    pub text: String,
    pub color: String,
    pub is_quick: bool,
    pub timestamp: u64,
}

/// The area messages travel across, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

/// Presentation bookkeeping for a message that is currently traveling.
#[derive(Debug, Clone)]
struct ActiveDanmu {
    lane: usize,
    started_at_ms: u64,
    duration_ms: u64,
    travel_distance: f32,
    /// Progress already covered before the most recent (re)start.
    progress_base: f32,
}

/// The danmu engine accepts an unbounded stream of incoming messages and
/// schedules them onto a fixed set of lanes, handing placement decisions
/// to the rendering subsystem as [DanmuEvent]s.
pub struct DanmuEngine {
    config: DanmuConfig,
    event_sender: DanmuEventSender,

    queue: Mutex<VecDeque<DanmuMessage>>,
    lanes: Mutex<LaneTable>,
    active: DashMap<DanmuId, ActiveDanmu>,

    visible: AtomicCell<bool>,
    speed: AtomicCell<u8>,
    viewport: AtomicCell<Viewport>,
}

impl DanmuEngine {
    pub fn new(config: DanmuConfig, viewport: Viewport) -> (Self, DanmuEventReceiver) {
        let (event_sender, event_receiver) = unbounded();
        let lanes = LaneTable::new(&config, viewport.height);

        let engine = Self {
            config,
            event_sender,
            queue: Default::default(),
            lanes: lanes.into(),
            active: Default::default(),
            visible: AtomicCell::new(true),
            speed: AtomicCell::new(DanmuConfig::MIDPOINT_SPEED),
            viewport: AtomicCell::new(viewport),
        };

        (engine, event_receiver)
    }

    /// Adds a message to the pending queue. Arrival order is preserved.
    pub fn enqueue(&self, message: DanmuMessage) {
        self.queue.lock().push_back(message);
    }

    /// Processes the queue once. Called on a fixed interval by the driver.
    ///
    /// At most one message is placed per tick: a fully free lane is
    /// preferred, otherwise the lane that frees up earliest takes it.
    pub fn tick(&self, now_ms: u64) {
        if !self.visible.load() {
            return;
        }

        let mut queue = self.queue.lock();

        let Some(message) = queue.front() else {
            return;
        };

        let mut lanes = self.lanes.lock();

        let Some(lane_index) = lanes.pick(now_ms) else {
            return;
        };

        let viewport = self.viewport.load();
        let label_width = self.config.label_width(&message.text, message.is_quick);
        let travel_distance = self.config.travel_distance(viewport.width, label_width);
        let duration_ms = self.config.duration_ms(travel_distance, self.speed.load());

        let message = queue.pop_front().expect("queue has a front entry");
        let id = DanmuId::new();

        lanes.occupy(lane_index, now_ms + duration_ms);
        let vertical_offset = lanes
            .get(lane_index)
            .map(|l| l.vertical_offset)
            .unwrap_or_default();

        self.active.insert(
            id,
            ActiveDanmu {
                lane: lane_index,
                started_at_ms: now_ms,
                duration_ms,
                travel_distance,
                progress_base: 0.,
            },
        );

        self.emit(DanmuEvent::Spawned {
            id,
            message,
            lane: lane_index,
            vertical_offset,
            duration_ms,
            travel_distance,
        });
    }

    /// Called by the renderer when a message finishes its animation.
    /// Frees the lane's occupancy flag and drops the message from tracking.
    pub fn complete(&self, id: DanmuId) {
        if let Some((_, entry)) = self.active.remove(&id) {
            self.lanes.lock().release(entry.lane);
        }
    }

    /// Changes the global speed setting.
    ///
    /// Every in-flight message keeps its current position: its remaining
    /// duration is recomputed proportionally to the distance already covered
    /// and the animation resumes from there at the new rate.
    pub fn set_speed(&self, speed: u8, now_ms: u64) {
        let speed = DanmuConfig::clamp_speed(speed);
        self.speed.store(speed);

        for mut entry in self.active.iter_mut() {
            let id = *entry.key();

            let elapsed = now_ms.saturating_sub(entry.started_at_ms) as f32;
            let fraction = (elapsed / entry.duration_ms.max(1) as f32).min(1.);
            let progress = entry.progress_base + (1. - entry.progress_base) * fraction;

            let full_duration = self.config.duration_ms(entry.travel_distance, speed);
            let remaining_ms = (full_duration as f32 * (1. - progress)) as u64;

            entry.started_at_ms = now_ms;
            entry.duration_ms = remaining_ms.max(1);
            entry.progress_base = progress;

            self.emit(DanmuEvent::Restarted {
                id,
                progress,
                remaining_ms,
            });
        }
    }

    /// Triggers a one-shot decorative burst. The particles never participate
    /// in lane occupancy.
    pub fn trigger_effect(&self, kind: EffectKind) {
        let viewport = self.viewport.load();
        let particles = kind.particles(viewport.width, viewport.height);

        self.emit(DanmuEvent::EffectTriggered { kind, particles });
    }

    /// Recomputes the lane table for a new viewport size.
    pub fn resize(&self, viewport: Viewport) {
        self.viewport.store(viewport);
        *self.lanes.lock() = LaneTable::new(&self.config, viewport.height);
    }

    /// Resumes queue processing.
    pub fn show(&self) {
        self.visible.store(true);
    }

    /// Stops new messages from being dequeued. The pending queue and active
    /// tracking are left intact so resuming continues where it stopped.
    pub fn hide(&self) {
        self.visible.store(false);
    }

    pub fn is_visible(&self) -> bool {
        self.visible.load()
    }

    /// Empties the queue, resets every lane, and removes all displayed
    /// messages immediately.
    pub fn clear(&self) {
        self.queue.lock().clear();
        self.lanes.lock().reset();
        self.active.clear();

        self.emit(DanmuEvent::Cleared);
    }

    pub fn speed(&self) -> u8 {
        self.speed.load()
    }

    pub fn pending_count(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    fn emit(&self, event: DanmuEvent) {
        // The receiver living as long as the engine is an internal invariant
        self.event_sender.send(event).expect("event is sent");
    }
}

/// Drives the engine's tick on a dedicated thread at the configured rate.
pub fn spawn_tick_thread(engine: &Arc<DanmuEngine>) {
    let engine = engine.clone();
    let tick_rate = Duration::from_millis(engine.config.tick_interval_ms);

    let run = move || {
        let mut next = Instant::now();

        loop {
            engine.tick(epoch_ms());

            next += tick_rate;
            spin_sleep::sleep(next.saturating_duration_since(Instant::now()))
        }
    };

    thread::Builder::new()
        .name("danmu-tick".to_string())
        .spawn(run)
        .expect("danmu-tick thread is spawned");
}

fn epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time goes forward")
        .as_millis() as u64
}

#[cfg(test)]
mod test {
    use super::*;

    fn test_engine(lane_count: usize) -> (DanmuEngine, DanmuEventReceiver) {
        let config = DanmuConfig {
            lane_height: 40.,
            top_margin: 0.,
            bottom_margin: 0.,
            ..Default::default()
        };

        DanmuEngine::new(
            config,
            Viewport {
                width: 1280.,
                height: lane_count as f32 * 40.,
            },
        )
    }

    fn message(text: &str) -> DanmuMessage {
        DanmuMessage {
            username: "tester".to_string(),
            text: text.to_string(),
            color: "#ffffff".to_string(),
            is_quick: false,
            timestamp: 0,
        }
    }

    #[test]
    fn test_idle_lanes_are_assigned_distinctly_in_arrival_order() {
        let (engine, events) = test_engine(5);

        for i in 0..5 {
            engine.enqueue(message(&format!("message {i}")));
        }

        for tick in 0..5 {
            engine.tick(1000 + tick);
        }

        let mut seen_lanes = vec![];

        for i in 0..5 {
            match events.recv().unwrap() {
                DanmuEvent::Spawned { message, lane, .. } => {
                    assert_eq!(message.text, format!("message {i}"), "arrival order kept");
                    seen_lanes.push(lane);
                }
                other => panic!("unexpected event: {other:?}"),
            }
        }

        seen_lanes.sort();
        seen_lanes.dedup();
        assert_eq!(seen_lanes.len(), 5, "no two messages share a lane");
    }

    #[test]
    fn test_hidden_engine_processes_nothing() {
        let (engine, events) = test_engine(3);

        engine.enqueue(message("hello"));
        engine.hide();
        engine.tick(1000);

        assert!(events.try_recv().is_err());
        assert_eq!(engine.pending_count(), 1, "queue survives hiding");

        // Resuming picks up the same queue
        engine.show();
        engine.tick(2000);

        assert!(matches!(
            events.try_recv().unwrap(),
            DanmuEvent::Spawned { .. }
        ));
    }

    #[test]
    fn test_speed_change_preserves_progress() {
        let (engine, events) = test_engine(3);

        engine.enqueue(message("in flight"));
        engine.tick(0);

        let duration_ms = match events.recv().unwrap() {
            DanmuEvent::Spawned { duration_ms, .. } => duration_ms,
            other => panic!("unexpected event: {other:?}"),
        };

        // Halfway through its travel, double the speed
        engine.set_speed(10, duration_ms / 2);

        match events.recv().unwrap() {
            DanmuEvent::Restarted {
                progress,
                remaining_ms,
                ..
            } => {
                assert!(
                    (progress - 0.5).abs() < 0.01,
                    "on-screen position is kept, got {progress}"
                );
                assert!(
                    remaining_ms < duration_ms / 2,
                    "remaining time shrinks at the faster rate"
                );
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_completion_frees_the_lane_flag() {
        let (engine, events) = test_engine(1);

        engine.enqueue(message("only one"));
        engine.tick(0);

        let id = match events.recv().unwrap() {
            DanmuEvent::Spawned { id, .. } => id,
            other => panic!("unexpected event: {other:?}"),
        };

        assert_eq!(engine.active_count(), 1);
        engine.complete(id);
        assert_eq!(engine.active_count(), 0);
    }

    #[test]
    fn test_clear_resets_everything() {
        let (engine, events) = test_engine(2);

        engine.enqueue(message("a"));
        engine.enqueue(message("b"));
        engine.tick(0);
        engine.clear();

        assert_eq!(engine.pending_count(), 0);
        assert_eq!(engine.active_count(), 0);

        // Spawned for "a", then Cleared
        assert!(matches!(events.recv().unwrap(), DanmuEvent::Spawned { .. }));
        assert!(matches!(events.recv().unwrap(), DanmuEvent::Cleared));
    }

    #[test]
    fn test_effects_never_touch_lanes() {
        let (engine, events) = test_engine(2);

        engine.trigger_effect(EffectKind::Hearts);

        match events.recv().unwrap() {
            DanmuEvent::EffectTriggered { kind, particles } => {
                assert_eq!(kind, EffectKind::Hearts);
                assert!(!particles.is_empty());
            }
            other => panic!("unexpected event: {other:?}"),
        }

        // Lane bookkeeping is untouched
        assert_eq!(engine.active_count(), 0);
        assert_eq!(engine.lanes.lock().pick(0), Some(0));
    }
}
