mod player;

use std::sync::Arc;

use crossbeam::atomic::AtomicCell;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

pub use player::*;

use crate::SyncConfig;

/// The authoritative playback state as carried by a sync broadcast.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncPayload {
    pub video_id: String,
    /// The authoritative position, in seconds.
    pub time: f32,
    pub is_playing: bool,
    /// Server timestamp, used to discard stale payloads.
    pub timestamp: u64,
}

/// A playback action relayed from another member of the room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoActionKind {
    Play,
    Pause,
    Seek,
    Ended,
}

/// What happened when a sync payload was handed to the synchronizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The payload was applied against the local player.
    Applied { seeked: bool, toggled: bool },
    /// The payload is older than one already applied and was discarded.
    Stale,
    /// The player is not ready yet, the payload was queued for retry.
    Deferred,
}

/// An instruction that arrived before the player finished initializing.
#[derive(Debug, Clone)]
enum DeferredInstruction {
    Load { video_id: String, start_offset: f32 },
    Sync(SyncPayload),
}

/// Keeps a follower's local player converging toward the last broadcast
/// authoritative state without fighting over sub-tolerance differences.
pub struct PlaybackSynchronizer<P> {
    player: Arc<P>,
    config: SyncConfig,

    current_video: Mutex<Option<String>>,
    pending: Mutex<Vec<DeferredInstruction>>,

    /// Timestamp of the last applied sync payload.
    last_applied_ms: AtomicCell<u64>,
    /// While this has not passed, locally observed state changes must not
    /// be broadcast, otherwise applying a sync would look like a new
    /// authoritative action and cause oscillation.
    suppressed_until_ms: AtomicCell<u64>,
    last_broadcast_ms: AtomicCell<u64>,
}

impl<P> PlaybackSynchronizer<P>
where
    P: VideoPlayer,
{
    pub fn new(player: Arc<P>, config: SyncConfig) -> Self {
        Self {
            player,
            config,
            current_video: Default::default(),
            pending: Default::default(),
            last_applied_ms: AtomicCell::new(0),
            suppressed_until_ms: AtomicCell::new(0),
            last_broadcast_ms: AtomicCell::new(0),
        }
    }

    /// Reconciles the local player against an incoming authoritative state.
    ///
    /// Position and play/pause state are reconciled independently: a seek is
    /// only issued when the drift reaches the configured tolerance, and the
    /// play/pause transition is issued after the seek so it lands on the
    /// corrected position.
    pub fn apply_sync(&self, payload: SyncPayload, now_ms: u64) -> SyncOutcome {
        if payload.timestamp <= self.last_applied_ms.load() {
            return SyncOutcome::Stale;
        }

        if !self.player.state().is_ready() {
            self.pending.lock().push(DeferredInstruction::Sync(payload));
            return SyncOutcome::Deferred;
        }

        let drift = (self.player.current_time() - payload.time).abs();
        let seeked = drift >= self.config.drift_tolerance;

        if seeked {
            self.player.seek_to(payload.time);
        }

        let locally_playing = self.player.state() == PlaybackState::Playing;
        let toggled = payload.is_playing != locally_playing;

        if payload.is_playing && !locally_playing {
            self.player.play();
        } else if !payload.is_playing && locally_playing {
            self.player.pause();
        }

        self.last_applied_ms.store(payload.timestamp);
        self.suppress(now_ms);

        SyncOutcome::Applied { seeked, toggled }
    }

    /// Applies a playback action relayed from another member.
    pub fn apply_action(&self, kind: VideoActionKind, time: f32, now_ms: u64) {
        if !self.player.state().is_ready() {
            return;
        }

        self.suppress(now_ms);

        match kind {
            VideoActionKind::Play => {
                self.player.seek_to(time);
                self.player.play();
            }
            VideoActionKind::Pause => {
                self.player.seek_to(time);
                self.player.pause();
            }
            VideoActionKind::Seek => self.player.seek_to(time),
            // The player reaches the end on its own
            VideoActionKind::Ended => {}
        }
    }

    /// Loads a video, or queues the load if the player is not ready yet.
    pub fn load_video(&self, video_id: &str, start_offset: f32) {
        *self.current_video.lock() = Some(video_id.to_string());

        if self.player.state().is_ready() {
            self.player.load(video_id, start_offset);
        } else {
            self.pending.lock().push(DeferredInstruction::Load {
                video_id: video_id.to_string(),
                start_offset,
            });
        }
    }

    /// Called once the player reports ready. Replays queued instructions
    /// in arrival order.
    pub fn player_ready(&self, now_ms: u64) {
        let pending: Vec<_> = self.pending.lock().drain(..).collect();

        for instruction in pending {
            match instruction {
                DeferredInstruction::Load {
                    video_id,
                    start_offset,
                } => self.player.load(&video_id, start_offset),
                DeferredInstruction::Sync(payload) => {
                    self.apply_sync(payload, now_ms);
                }
            }
        }
    }

    /// Whether the echo-suppression window is still open.
    pub fn is_suppressed(&self, now_ms: u64) -> bool {
        now_ms < self.suppressed_until_ms.load()
    }

    /// Whether it is time to emit a periodic authoritative broadcast.
    /// Broadcasts are more frequent during active playback.
    pub fn should_broadcast(&self, now_ms: u64) -> bool {
        if self.is_suppressed(now_ms) {
            return false;
        }

        if self.current_video.lock().is_none() {
            return false;
        }

        let interval = if self.player.state() == PlaybackState::Playing {
            self.config.playing_broadcast_interval_ms
        } else {
            self.config.idle_broadcast_interval_ms
        };

        now_ms.saturating_sub(self.last_broadcast_ms.load()) >= interval
    }

    /// Produces the payload for a periodic broadcast and records the send.
    pub fn broadcast_payload(&self, now_ms: u64) -> Option<SyncPayload> {
        let video_id = self.current_video.lock().clone()?;

        self.last_broadcast_ms.store(now_ms);

        Some(SyncPayload {
            video_id,
            time: self.player.current_time(),
            is_playing: self.player.state() == PlaybackState::Playing,
            timestamp: now_ms,
        })
    }

    fn suppress(&self, now_ms: u64) {
        self.suppressed_until_ms
            .store(now_ms + self.config.suppression_window_ms);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    /// A scripted stand-in for the playback widget.
    #[derive(Default)]
    struct FakePlayer {
        state: AtomicCell<PlaybackState>,
        position: AtomicCell<f32>,
        commands: Mutex<Vec<String>>,
    }

    impl FakePlayer {
        fn ready_at(position: f32) -> Arc<Self> {
            let player = Self::default();
            player.state.store(PlaybackState::Paused);
            player.position.store(position);
            player.into()
        }

        fn commands(&self) -> Vec<String> {
            self.commands.lock().clone()
        }
    }

    impl VideoPlayer for FakePlayer {
        fn load(&self, video_id: &str, start_offset: f32) {
            self.commands
                .lock()
                .push(format!("load {video_id} at {start_offset}"));
        }

        fn play(&self) {
            self.state.store(PlaybackState::Playing);
            self.commands.lock().push("play".to_string());
        }

        fn pause(&self) {
            self.state.store(PlaybackState::Paused);
            self.commands.lock().push("pause".to_string());
        }

        fn seek_to(&self, time: f32) {
            self.position.store(time);
            self.commands.lock().push(format!("seek {time}"));
        }

        fn current_time(&self) -> f32 {
            self.position.load()
        }

        fn duration(&self) -> f32 {
            300.
        }

        fn state(&self) -> PlaybackState {
            self.state.load()
        }
    }

    fn payload(time: f32, is_playing: bool, timestamp: u64) -> SyncPayload {
        SyncPayload {
            video_id: "dQw4w9WgXcQ".to_string(),
            time,
            is_playing,
            timestamp,
        }
    }

    #[test]
    fn test_drift_at_tolerance_seeks() {
        let player = FakePlayer::ready_at(40.);
        let sync = PlaybackSynchronizer::new(player.clone(), SyncConfig::default());

        let outcome = sync.apply_sync(payload(43., false, 100), 0);

        assert_eq!(
            outcome,
            SyncOutcome::Applied {
                seeked: true,
                toggled: false
            }
        );
        assert_eq!(player.commands(), vec!["seek 43"]);
    }

    #[test]
    fn test_drift_under_tolerance_is_left_alone() {
        let player = FakePlayer::ready_at(40.);
        let sync = PlaybackSynchronizer::new(player.clone(), SyncConfig::default());

        let outcome = sync.apply_sync(payload(41.5, false, 100), 0);

        assert_eq!(
            outcome,
            SyncOutcome::Applied {
                seeked: false,
                toggled: false
            }
        );
        assert!(player.commands().is_empty(), "no seek, no toggle");
    }

    #[test]
    fn test_play_state_reconciles_after_seek() {
        let player = FakePlayer::ready_at(10.);
        let sync = PlaybackSynchronizer::new(player.clone(), SyncConfig::default());

        sync.apply_sync(payload(50., true, 100), 0);

        assert_eq!(player.commands(), vec!["seek 50", "play"]);
    }

    #[test]
    fn test_stale_payload_is_discarded() {
        let player = FakePlayer::ready_at(40.);
        let sync = PlaybackSynchronizer::new(player.clone(), SyncConfig::default());

        sync.apply_sync(payload(50., true, 200), 0);
        let outcome = sync.apply_sync(payload(10., false, 150), 0);

        assert_eq!(outcome, SyncOutcome::Stale);
        assert_eq!(
            player.current_time(),
            50.,
            "older payload must not regress the position"
        );
    }

    #[test]
    fn test_applying_sync_opens_suppression_window() {
        let player = FakePlayer::ready_at(40.);
        let sync = PlaybackSynchronizer::new(player, SyncConfig::default());

        sync.apply_sync(payload(50., true, 100), 1000);

        assert!(sync.is_suppressed(1500));
        assert!(!sync.is_suppressed(2500), "window closes after a second");
    }

    #[test]
    fn test_instructions_are_deferred_until_ready() {
        let player: Arc<FakePlayer> = FakePlayer::default().into();
        let sync = PlaybackSynchronizer::new(player.clone(), SyncConfig::default());

        sync.load_video("dQw4w9WgXcQ", 0.);
        let outcome = sync.apply_sync(payload(30., true, 100), 0);

        assert_eq!(outcome, SyncOutcome::Deferred);
        assert!(player.commands().is_empty());

        player.state.store(PlaybackState::Unstarted);
        sync.player_ready(50);

        let commands = player.commands();
        assert_eq!(commands[0], "load dQw4w9WgXcQ at 0");
        assert!(commands.contains(&"seek 30".to_string()));
    }

    #[test]
    fn test_broadcast_cadence_depends_on_playback() {
        let player = FakePlayer::ready_at(0.);
        let sync = PlaybackSynchronizer::new(player.clone(), SyncConfig::default());

        assert!(
            !sync.should_broadcast(20_000),
            "nothing to broadcast without a video"
        );

        sync.load_video("dQw4w9WgXcQ", 0.);
        assert!(sync.should_broadcast(20_000));
        sync.broadcast_payload(20_000);

        // Paused: the idle interval applies
        assert!(!sync.should_broadcast(25_000));
        assert!(sync.should_broadcast(30_000));

        player.state.store(PlaybackState::Playing);
        assert!(sync.should_broadcast(25_000), "playing broadcasts sooner");
    }

    #[test]
    fn test_suppression_silences_broadcasts() {
        let player = FakePlayer::ready_at(0.);
        let sync = PlaybackSynchronizer::new(player, SyncConfig::default());

        sync.load_video("dQw4w9WgXcQ", 0.);
        sync.apply_sync(payload(30., false, 100), 20_000);

        assert!(!sync.should_broadcast(20_500), "cooldown window holds");
        assert!(sync.should_broadcast(21_500));
    }

    #[test]
    fn test_payload_wire_shape() {
        let json = serde_json::to_value(payload(43., true, 100)).unwrap();

        assert_eq!(json["videoId"], "dQw4w9WgXcQ");
        assert_eq!(json["isPlaying"], true);
        assert_eq!(json["timestamp"], 100);
    }

    #[test]
    fn test_remote_pause_seeks_first() {
        let player = FakePlayer::ready_at(0.);
        player.state.store(PlaybackState::Playing);
        let sync = PlaybackSynchronizer::new(player.clone(), SyncConfig::default());

        sync.apply_action(VideoActionKind::Pause, 12., 0);

        assert_eq!(player.commands(), vec!["seek 12", "pause"]);
        assert!(sync.is_suppressed(500));
    }
}
