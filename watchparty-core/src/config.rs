/// The configuration of the danmu engine
#[derive(Debug, Clone)]
pub struct DanmuConfig {
    /// The height of a single lane, in pixels
    pub lane_height: f32,
    /// Space left above the first lane, in pixels
    pub top_margin: f32,
    /// Space left below the last lane, in pixels
    pub bottom_margin: f32,
    /// How fast a message travels at the midpoint speed setting, in pixels per second
    pub base_speed: f32,
    /// Extra distance past the label width so a message fully clears the viewport, in pixels
    pub clearance: f32,
    /// The shortest a message is allowed to stay on screen
    pub min_duration_ms: u64,
    /// The longest a message is allowed to stay on screen
    pub max_duration_ms: u64,
    /// How often the queue is processed
    pub tick_interval_ms: u64,
    /// Approximate width of a rendered character, in pixels
    pub char_width: f32,
    /// How much larger quick messages render compared to normal ones
    pub quick_scale: f32,
}

impl DanmuConfig {
    /// The speed setting is an integer on this scale.
    pub const SPEED_RANGE: (u8, u8) = (1, 10);

    /// The speed setting that maps to a multiplier of exactly 1.
    pub const MIDPOINT_SPEED: u8 = 5;

    /// How many lanes fit in a viewport of the given height
    pub fn lane_count(&self, viewport_height: f32) -> usize {
        let usable = (viewport_height - self.top_margin - self.bottom_margin).max(0.);
        (usable / self.lane_height) as usize
    }

    /// The vertical offset of a lane by index
    pub fn lane_offset(&self, index: usize) -> f32 {
        self.top_margin + index as f32 * self.lane_height
    }

    /// Clamps a raw speed setting into the supported scale
    pub fn clamp_speed(speed: u8) -> u8 {
        speed.clamp(Self::SPEED_RANGE.0, Self::SPEED_RANGE.1)
    }

    /// Estimated width of a rendered label.
    /// The engine never touches a layout system, so this is an approximation
    /// the renderer is free to correct for.
    pub fn label_width(&self, text: &str, is_quick: bool) -> f32 {
        let scale = if is_quick { self.quick_scale } else { 1. };
        text.chars().count() as f32 * self.char_width * scale
    }

    /// The full distance a message travels: it enters from off the right edge
    /// and exits past the left edge.
    pub fn travel_distance(&self, viewport_width: f32, label_width: f32) -> f32 {
        viewport_width + label_width + self.clearance
    }

    /// How long a message takes to cross the viewport at the given speed setting,
    /// clamped so extreme settings stay perceptible.
    pub fn duration_ms(&self, travel_distance: f32, speed: u8) -> u64 {
        let multiplier = Self::clamp_speed(speed) as f32 / Self::MIDPOINT_SPEED as f32;
        let seconds = travel_distance / (self.base_speed * multiplier);

        ((seconds * 1000.) as u64).clamp(self.min_duration_ms, self.max_duration_ms)
    }
}

impl Default for DanmuConfig {
    fn default() -> Self {
        Self {
            // Enough for two lines of text with padding
            lane_height: 40.,
            top_margin: 50.,
            bottom_margin: 30.,
            base_speed: 120.,
            clearance: 40.,
            min_duration_ms: 3000,
            max_duration_ms: 15_000,
            tick_interval_ms: 120,
            char_width: 16.,
            quick_scale: 1.5,
        }
    }
}

/// The configuration of the playback synchronizer
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// How far local playback may drift from the authoritative position
    /// before a seek is issued, in seconds
    pub drift_tolerance: f32,
    /// How long after applying an incoming sync the follower must stay
    /// quiet, so its own state changes aren't rebroadcast as new actions
    pub suppression_window_ms: u64,
    /// How often authoritative state is broadcast while paused or idle
    pub idle_broadcast_interval_ms: u64,
    /// How often authoritative state is broadcast during active playback
    pub playing_broadcast_interval_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            // Small enough to feel synchronized, large enough to avoid
            // seek stutter on every periodic tick
            drift_tolerance: 2.,
            suppression_window_ms: 1000,
            idle_broadcast_interval_ms: 10_000,
            playing_broadcast_interval_ms: 5000,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_lane_count() {
        let config = DanmuConfig::default();

        // 480 usable pixels at 40 per lane
        assert_eq!(config.lane_count(560.), 12);
        assert_eq!(config.lane_count(0.), 0);
    }

    #[test]
    fn test_duration_clamping() {
        let config = DanmuConfig::default();

        // A tiny distance at maximum speed hits the floor
        assert_eq!(config.duration_ms(10., 10), config.min_duration_ms);
        // A huge distance at minimum speed hits the ceiling
        assert_eq!(config.duration_ms(100_000., 1), config.max_duration_ms);
    }

    #[test]
    fn test_duration_scales_with_speed() {
        let config = DanmuConfig {
            min_duration_ms: 0,
            max_duration_ms: u64::MAX,
            ..Default::default()
        };

        let slow = config.duration_ms(2400., 1);
        let mid = config.duration_ms(2400., 5);
        let fast = config.duration_ms(2400., 10);

        assert!(slow > mid, "lower speed travels longer");
        assert!(mid > fast, "higher speed travels shorter");
        // Midpoint speed is the base speed exactly
        assert_eq!(mid, 20_000);
    }
}
