//! Band-driven particle field drawn onto a fading trail buffer.

use glam::Vec2;
use std::f32::consts::TAU;
use std::ops::Range;

use super::{FrameInput, Visualizer};
use crate::render::canvas::{skip_failed, Canvas, Color, Rect, Surface};

const LOW_BAND: Range<usize> = 1..8;
const MID_BAND: Range<usize> = 8..64;
const HIGH_BAND: Range<usize> = 64..256;

const LOW_THRESHOLD: f32 = 0.25;
const MID_THRESHOLD: f32 = 0.15;
const HIGH_THRESHOLD: f32 = 0.08;

const DRAG: f32 = 0.97;
const TRAIL_FADE: f32 = 0.12;
/// Particles this far outside the canvas are retired early.
const OFFSCREEN_MARGIN: f32 = 64.0;

const BASS_COLOR: Color = Color::MAGENTA;
const MID_COLOR: Color = Color::rgb(128, 128, 255);
const SPARK_COLOR: Color = Color::rgb(200, 255, 255);

/// One spawn request.
#[derive(Clone, Copy, Debug)]
pub struct Spawn {
    pub position: Vec2,
    pub velocity: Vec2,
    pub size: f32,
    pub color: Color,
    pub lifetime: f32,
}

/// Fixed-capacity particle arena stored as parallel arrays. Freed slots are
/// reused by index; a spawn with no free slot is dropped.
pub struct ParticlePool {
    position: Vec<Vec2>,
    velocity: Vec<Vec2>,
    size: Vec<f32>,
    color: Vec<Color>,
    age: Vec<f32>,
    lifetime: Vec<f32>,
    active: Vec<bool>,
    free: Vec<usize>,
}

impl ParticlePool {
    pub fn new(capacity: usize) -> Self {
        Self {
            position: vec![Vec2::ZERO; capacity],
            velocity: vec![Vec2::ZERO; capacity],
            size: vec![0.0; capacity],
            color: vec![Color::BLACK; capacity],
            age: vec![0.0; capacity],
            lifetime: vec![0.0; capacity],
            active: vec![false; capacity],
            // Reversed so low indices are handed out first
            free: (0..capacity).rev().collect(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.active.len()
    }

    #[cfg(test)]
    pub fn active_count(&self) -> usize {
        self.capacity() - self.free.len()
    }

    /// Claim a slot; returns `false` when the pool is full.
    pub fn spawn(&mut self, spawn: Spawn) -> bool {
        let Some(slot) = self.free.pop() else {
            return false;
        };
        self.position[slot] = spawn.position;
        self.velocity[slot] = spawn.velocity;
        self.size[slot] = spawn.size;
        self.color[slot] = spawn.color;
        self.age[slot] = 0.0;
        self.lifetime[slot] = spawn.lifetime.max(f32::EPSILON);
        self.active[slot] = true;
        true
    }

    fn retire(&mut self, slot: usize) {
        self.active[slot] = false;
        self.free.push(slot);
    }

    pub fn active_slots(&self) -> impl Iterator<Item = usize> + '_ {
        self.active.iter().enumerate().filter(|(_, a)| **a).map(|(i, _)| i)
    }

    /// Add a random velocity kick of up to `strength` to every live particle.
    pub fn stir(&mut self, rng: &mut fastrand::Rng, strength: f32) {
        for slot in 0..self.capacity() {
            if self.active[slot] {
                let kick = Vec2::new(rng.f32() - 0.5, rng.f32() - 0.5) * 2.0 * strength;
                self.velocity[slot] += kick;
            }
        }
    }

    /// Age and move every live particle, retiring the expired and the
    /// ones that drifted well past `bounds`.
    pub fn step(&mut self, dt: f32, drag: f32, bounds: Vec2) {
        for slot in 0..self.capacity() {
            if !self.active[slot] {
                continue;
            }
            self.age[slot] += dt;
            self.position[slot] += self.velocity[slot] * dt;
            self.velocity[slot] *= drag;

            let p = self.position[slot];
            let offscreen = p.x < -OFFSCREEN_MARGIN
                || p.y < -OFFSCREEN_MARGIN
                || p.x > bounds.x + OFFSCREEN_MARGIN
                || p.y > bounds.y + OFFSCREEN_MARGIN;
            if self.age[slot] >= self.lifetime[slot] || offscreen || !p.is_finite() {
                self.retire(slot);
            }
        }
    }

    /// Remaining life fraction in [0, 1].
    fn vitality(&self, slot: usize) -> f32 {
        (1.0 - self.age[slot] / self.lifetime[slot]).clamp(0.0, 1.0)
    }
}

/// Mean energy of the low, mid and high bands.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BandEnergy {
    pub low: f32,
    pub mid: f32,
    pub high: f32,
}

pub struct ParticleField {
    pool: ParticlePool,
    trail: Option<Canvas>,
    rng: fastrand::Rng,
    dt: f32,
}

impl ParticleField {
    pub fn new(capacity: usize, dt: f32, rng: fastrand::Rng) -> Self {
        Self {
            pool: ParticlePool::new(capacity),
            trail: None,
            rng,
            dt,
        }
    }

    #[cfg(test)]
    pub fn pool(&self) -> &ParticlePool {
        &self.pool
    }

    fn range(&mut self, range: Range<f32>) -> f32 {
        range.start + self.rng.f32() * (range.end - range.start)
    }

    fn direction(&mut self) -> Vec2 {
        Vec2::from_angle(self.rng.f32() * TAU)
    }

    /// A point on a random edge of the canvas and an inward heading.
    fn edge_origin(&mut self, size: Vec2) -> (Vec2, Vec2) {
        let t = self.rng.f32();
        match self.rng.u8(0..4) {
            0 => (Vec2::new(t * size.x, 0.0), Vec2::Y),
            1 => (Vec2::new(t * size.x, size.y), Vec2::NEG_Y),
            2 => (Vec2::new(0.0, t * size.y), Vec2::X),
            _ => (Vec2::new(size.x, t * size.y), Vec2::NEG_X),
        }
    }

    /// Turn band energy into spawn requests and velocity turbulence.
    pub fn emit(&mut self, energy: BandEnergy, size: Vec2) {
        let center = size / 2.0;

        // Bass: few large, slow particles bursting from the centre
        if energy.low > LOW_THRESHOLD {
            let count = (((energy.low - LOW_THRESHOLD) * 20.0) as usize + 1).min(12);
            for _ in 0..count {
                let speed = self.range(40.0..120.0) * (0.5 + energy.low);
                let spawn = Spawn {
                    position: center,
                    velocity: self.direction() * speed,
                    size: self.range(4.0..8.0),
                    color: BASS_COLOR,
                    lifetime: self.range(1.5..3.0),
                };
                self.pool.spawn(spawn);
            }
        }

        // Mid: stir what is alive, plus a ring of moderate particles
        if energy.mid > MID_THRESHOLD {
            self.pool.stir(&mut self.rng, energy.mid * 60.0);
            let count = (((energy.mid - MID_THRESHOLD) * 30.0) as usize + 1).min(8);
            let ring = size.min_element() * 0.25;
            for _ in 0..count {
                let heading = self.direction();
                let spawn = Spawn {
                    position: center + heading * ring,
                    velocity: heading * self.range(80.0..200.0),
                    size: self.range(2.0..4.0),
                    color: MID_COLOR,
                    lifetime: self.range(1.0..2.0),
                };
                self.pool.spawn(spawn);
            }
        }

        // Treble: many small fast sparks from the centre or the edges
        if energy.high > HIGH_THRESHOLD {
            let count = (((energy.high - HIGH_THRESHOLD) * 100.0) as usize + 2).min(24);
            for _ in 0..count {
                let (position, heading) = if self.rng.bool() {
                    (center, self.direction())
                } else {
                    let (origin, inward) = self.edge_origin(size);
                    let spread = Vec2::from_angle(self.range(-0.6..0.6));
                    (origin, spread.rotate(inward))
                };
                let spawn = Spawn {
                    position,
                    velocity: heading * self.range(200.0..400.0),
                    size: self.range(1.0..2.0),
                    color: SPARK_COLOR,
                    lifetime: self.range(0.3..0.8),
                };
                self.pool.spawn(spawn);
            }
        }
    }
}

impl Visualizer for ParticleField {
    fn render(&mut self, input: &FrameInput, surface: &mut dyn Surface) {
        let (width, height) = surface.size();
        let size = Vec2::new(width as f32, height as f32);

        let energy = BandEnergy {
            low: input.spectrum.band_mean(LOW_BAND),
            mid: input.spectrum.band_mean(MID_BAND),
            high: input.spectrum.band_mean(HIGH_BAND),
        };
        self.emit(energy, size);
        self.pool.step(self.dt, DRAG, size);

        let stale = self
            .trail
            .as_ref()
            .map_or(true, |t| t.width() != width || t.height() != height);
        if stale {
            self.trail = Some(Canvas::new(width, height));
        }
        let Some(trail) = self.trail.as_mut() else {
            return;
        };
        trail.fade(TRAIL_FADE);
        for slot in self.pool.active_slots() {
            let life = self.pool.vitality(slot);
            let color = self.pool.color[slot].scaled(life);
            let radius = self.pool.size[slot] * (0.5 + 0.5 * life);
            skip_failed(trail.circle(self.pool.position[slot], radius, color, None));
        }
        surface.blit(trail, Rect::new(0, 0, width, height));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::analysis::{Phase, Spectrum};
    use crate::audio::SampleBlock;
    use crate::viz::normalize::Scale;

    fn spark(position: Vec2) -> Spawn {
        Spawn {
            position,
            velocity: Vec2::new(10.0, 0.0),
            size: 2.0,
            color: Color::WHITE,
            lifetime: 1.0,
        }
    }

    #[test]
    fn full_pool_drops_spawns() {
        let mut pool = ParticlePool::new(4);
        for _ in 0..4 {
            assert!(pool.spawn(spark(Vec2::ZERO)));
        }
        assert_eq!(pool.active_count(), 4);
        assert!(!pool.spawn(spark(Vec2::ZERO)));
        assert_eq!(pool.active_count(), 4);
    }

    #[test]
    fn expired_slots_are_reused() {
        let mut pool = ParticlePool::new(2);
        pool.spawn(spark(Vec2::new(10.0, 10.0)));
        pool.spawn(spark(Vec2::new(10.0, 10.0)));
        for _ in 0..11 {
            pool.step(0.1, 1.0, Vec2::new(100.0, 100.0));
        }
        assert_eq!(pool.active_count(), 0);
        assert!(pool.spawn(spark(Vec2::ZERO)));
        assert_eq!(pool.active_slots().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn motion_applies_velocity_then_drag() {
        let mut pool = ParticlePool::new(1);
        pool.spawn(spark(Vec2::new(10.0, 10.0)));
        pool.step(0.5, 0.5, Vec2::new(100.0, 100.0));
        pool.step(0.5, 0.5, Vec2::new(100.0, 100.0));
        // 10 + 10 * 0.5 + 5 * 0.5
        assert!((pool.position[0].x - 17.5).abs() < 1e-5);
    }

    #[test]
    fn offscreen_particles_are_retired() {
        let mut pool = ParticlePool::new(1);
        pool.spawn(Spawn {
            velocity: Vec2::new(-1000.0, 0.0),
            ..spark(Vec2::new(5.0, 5.0))
        });
        pool.step(0.1, 1.0, Vec2::new(100.0, 100.0));
        assert_eq!(pool.active_count(), 0);
    }

    #[test]
    fn loud_bands_spawn_within_capacity() {
        let mut field = ParticleField::new(50, 1.0 / 60.0, fastrand::Rng::with_seed(11));
        let spectrum = Spectrum::new(vec![1.0; 1025], vec![1.0; 1025]);
        let phase = Phase::zeros(1025);
        let samples = SampleBlock::silent(16);
        let input = FrameInput {
            spectrum: &spectrum,
            phase: &phase,
            samples: &samples,
            scale: Scale::Automatic,
        };
        let mut canvas = Canvas::new(160, 120);
        for _ in 0..30 {
            field.render(&input, &mut canvas);
            assert!(field.pool().active_count() <= 50);
        }
        assert!(field.pool().active_count() > 0);
        assert!(canvas.lit_pixels() > 0);
    }

    #[test]
    fn silence_spawns_nothing() {
        let mut field = ParticleField::new(50, 1.0 / 60.0, fastrand::Rng::with_seed(5));
        field.emit(BandEnergy::default(), Vec2::new(100.0, 100.0));
        assert_eq!(field.pool().active_count(), 0);
    }
}
