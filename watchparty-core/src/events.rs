use crossbeam::channel::{Receiver, Sender};

use crate::{DanmuId, DanmuMessage, EffectKind, Particle};

pub type DanmuEventSender = Sender<DanmuEvent>;
pub type DanmuEventReceiver = Receiver<DanmuEvent>;

/// Describes the events the danmu engine hands to the rendering subsystem.
#[derive(Debug, Clone)]
pub enum DanmuEvent {
    /// A queued message was assigned a lane and should start traveling.
    Spawned {
        id: DanmuId,
        message: DanmuMessage,
        /// The lane the message was placed on.
        lane: usize,
        /// Distance from the top of the viewport, in pixels.
        vertical_offset: f32,
        /// How long the message takes to fully cross the viewport.
        duration_ms: u64,
        /// The full travel distance, off the right edge to off the left edge.
        travel_distance: f32,
    },
    /// The global speed changed and an in-flight message must continue from
    /// its current position at the new rate.
    Restarted {
        id: DanmuId,
        /// Fraction of the travel distance already covered, 0 to 1.
        progress: f32,
        /// Time left to cover the remaining distance at the new rate.
        remaining_ms: u64,
    },
    /// A one-shot decorative burst. Particles are independently timed and
    /// self-cleaning, and never touch lane bookkeeping.
    EffectTriggered {
        kind: EffectKind,
        particles: Vec<Particle>,
    },
    /// Every displayed message should be removed immediately.
    Cleared,
}
