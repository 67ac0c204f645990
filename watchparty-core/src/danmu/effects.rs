use rand::Rng;

const HEART_GLYPH: &str = "\u{2764}\u{fe0f}";
const CONFETTI_GLYPHS: [&str; 5] = [
    "\u{1f389}",
    "\u{1f38a}",
    "\u{2728}",
    "\u{2b50}",
    "\u{1f4ab}",
];
const BURST_COLORS: [&str; 6] = [
    "#ff6b6b", "#4ecdc4", "#45b7d1", "#96ceb4", "#ffeaa7", "#dda0dd",
];

/// The decorative full-screen bursts a quick message can trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectKind {
    Hearts,
    Fireworks,
    Confetti,
}

/// A single independently-timed particle. Each one removes itself from the
/// display tree when its own animation finishes.
#[derive(Debug, Clone)]
pub struct Particle {
    /// A text glyph to render, or None for a plain colored dot.
    pub glyph: Option<&'static str>,
    pub color: &'static str,
    pub x: f32,
    pub y: f32,
    pub end_x: f32,
    pub end_y: f32,
    pub size: f32,
    /// How long to wait before the particle starts animating.
    pub delay_ms: u64,
    pub duration_ms: u64,
    /// Total rotation over the particle's lifetime, in degrees.
    pub rotation: f32,
}

impl EffectKind {
    /// Generates the particle batch for this effect within the given viewport.
    pub fn particles(&self, viewport_width: f32, viewport_height: f32) -> Vec<Particle> {
        match self {
            Self::Hearts => hearts(viewport_width, viewport_height),
            Self::Fireworks => fireworks(viewport_width, viewport_height),
            Self::Confetti => confetti(viewport_width, viewport_height),
        }
    }
}

/// Hearts drift from the bottom edge to above the top edge.
fn hearts(width: f32, height: f32) -> Vec<Particle> {
    let mut rng = rand::thread_rng();

    (0..10)
        .map(|i| Particle {
            glyph: Some(HEART_GLYPH),
            color: "#ffffff",
            x: rng.gen_range(0.0..width),
            y: height,
            end_x: rng.gen_range(0.0..width),
            end_y: -50.,
            size: rng.gen_range(20.0..40.),
            delay_ms: i as u64 * 100,
            duration_ms: rng.gen_range(3000..5000),
            rotation: rng.gen_range(0.0..360.),
        })
        .collect()
}

/// Radial bursts around random centers in the upper part of the viewport.
fn fireworks(width: f32, height: f32) -> Vec<Particle> {
    let mut rng = rand::thread_rng();
    let mut particles = Vec::new();

    for burst in 0..5 {
        let center_x = rng.gen_range(0.0..width);
        let center_y = rng.gen_range(0.2..0.8) * height;

        for i in 0..20 {
            let angle = i as f32 / 20. * std::f32::consts::TAU;
            let distance = rng.gen_range(100.0..200.);

            particles.push(Particle {
                glyph: None,
                color: BURST_COLORS[rng.gen_range(0..BURST_COLORS.len())],
                x: center_x,
                y: center_y,
                end_x: center_x + angle.cos() * distance,
                end_y: center_y + angle.sin() * distance,
                size: 4.,
                delay_ms: burst as u64 * 500,
                duration_ms: rng.gen_range(1000..1500),
                rotation: 0.,
            });
        }
    }

    particles
}

/// Glyphs rain from above the top edge down past the bottom.
fn confetti(width: f32, height: f32) -> Vec<Particle> {
    let mut rng = rand::thread_rng();

    (0..50)
        .map(|i| Particle {
            glyph: Some(CONFETTI_GLYPHS[rng.gen_range(0..CONFETTI_GLYPHS.len())]),
            color: BURST_COLORS[rng.gen_range(0..5)],
            x: rng.gen_range(0.0..width),
            y: -50.,
            end_x: rng.gen_range(0.0..width),
            end_y: height + 100.,
            size: rng.gen_range(10.0..25.),
            delay_ms: i as u64 * 50,
            duration_ms: rng.gen_range(3000..5000),
            rotation: rng.gen_range(360.0..720.),
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_hearts_travel_upward() {
        let particles = EffectKind::Hearts.particles(1920., 1080.);

        assert_eq!(particles.len(), 10);
        for particle in particles {
            assert!(particle.end_y < particle.y, "hearts float up");
            assert!(particle.glyph.is_some());
        }
    }

    #[test]
    fn test_fireworks_burst_outward() {
        let particles = EffectKind::Fireworks.particles(1920., 1080.);

        // 5 bursts of 20 particles
        assert_eq!(particles.len(), 100);
        for particle in particles {
            let dx = particle.end_x - particle.x;
            let dy = particle.end_y - particle.y;
            let distance = (dx * dx + dy * dy).sqrt();

            assert!(
                (99.0..=201.).contains(&distance),
                "particles travel a bounded radial distance"
            );
        }
    }

    #[test]
    fn test_confetti_staggers_start() {
        let particles = EffectKind::Confetti.particles(800., 600.);

        assert_eq!(particles.len(), 50);
        assert_eq!(particles[0].delay_ms, 0);
        assert_eq!(particles[49].delay_ms, 49 * 50);
    }
}
