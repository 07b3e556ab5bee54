//! Polar renderers: radial bars, closed radial curves and the phase clock.

use glam::Vec2;
use std::f32::consts::{PI, TAU};

use super::spline::CubicSpline;
use super::{spread_indices, FrameInput, Visualizer, CHANNEL_COLORS};
use crate::audio::CHANNELS;
use crate::render::canvas::{skip_failed, Color, Surface};

const MAX_BARS: usize = 120;
const CONTROL_POINTS: usize = 18;
const CURVE_POINTS: usize = 180;
const CLOCK_HANDS: usize = 80;

fn polar(center: Vec2, radius: f32, angle: f32) -> Vec2 {
    center + Vec2::from_angle(angle) * radius
}

/// Centre point and the smaller display dimension.
fn frame_geometry(surface: &dyn Surface) -> (Vec2, f32) {
    let (w, h) = surface.size();
    let center = Vec2::new((w / 2) as f32, (h / 2) as f32);
    (center, w.min(h) as f32)
}

/// Sunburst of bars around an inner circle; neighbouring bars alternate
/// between channels.
pub struct RadialBars;

impl RadialBars {
    /// Spectrum bin drawn by bar `i` of `num_bars`.
    pub fn bin_for_bar(i: usize, num_bars: usize, limit: usize) -> usize {
        let per_channel = (num_bars / CHANNELS).max(1);
        let bin = (i / CHANNELS) as f32 * (limit as f32 / per_channel as f32);
        (bin as usize).min(limit.saturating_sub(1))
    }
}

impl Visualizer for RadialBars {
    fn render(&mut self, input: &FrameInput, surface: &mut dyn Surface) {
        let limit = input.spectrum.len() / 4;
        if limit == 0 {
            return;
        }
        let (center, short_side) = frame_geometry(surface);
        let inner = (short_side / 8.0).floor();
        let max_bar = (short_side / 2.0).floor() - inner - 20.0;
        let num_bars = limit.min(MAX_BARS);

        skip_failed(surface.circle(center, inner, Color::rgb(50, 50, 50), Some(2.0)));

        for i in 0..num_bars {
            let angle = TAU * i as f32 / num_bars as f32;
            let ch = i % CHANNELS;
            let magnitude = input.spectrum.channel(ch)[Self::bin_for_bar(i, num_bars, limit)];
            let length = magnitude * max_bar * 0.9;
            let color = CHANNEL_COLORS[ch].scaled(0.3 + 0.7 * (magnitude * 1.5).min(1.0));
            skip_failed(surface.line(
                polar(center, inner, angle),
                polar(center, inner + length, angle),
                color,
                3.0,
            ));
        }
    }
}

/// Per-channel closed curve through bin-averaged control points.
pub struct RadialCurves {
    control_points: usize,
    resolution: usize,
}

impl Default for RadialCurves {
    fn default() -> Self {
        Self {
            control_points: CONTROL_POINTS,
            resolution: CURVE_POINTS,
        }
    }
}

impl RadialCurves {
    /// Mean magnitude of each of `control_points` equal chunks; a chunk
    /// with no bins contributes zero.
    pub fn control_magnitudes(&self, bins: &[f32]) -> Vec<f32> {
        let chunk = bins.len() / self.control_points;
        (0..self.control_points)
            .map(|i| {
                let slice = &bins[i * chunk..(i + 1) * chunk];
                if slice.is_empty() {
                    0.0
                } else {
                    slice.iter().sum::<f32>() / slice.len() as f32
                }
            })
            .collect()
    }

    /// Closed outline in screen space.
    pub fn outline(&self, radii: &[f32], center: Vec2) -> Vec<Vec2> {
        let n = radii.len();
        if n == 0 {
            return Vec::new();
        }
        let mut angles: Vec<f32> = (0..n).map(|i| TAU * i as f32 / n as f32).collect();
        let mut knots = radii.to_vec();
        angles.push(TAU);
        knots.push(radii[0]);

        match CubicSpline::periodic(&angles, &knots) {
            Ok(spline) => spline
                .sample(self.resolution)
                .into_iter()
                .map(|(angle, radius)| polar(center, radius, angle))
                .collect(),
            Err(err) => {
                log::trace!("Periodic spline failed, using control polygon: {}", err);
                // Non-finite radii collapse onto the centre
                radii
                    .iter()
                    .enumerate()
                    .map(|(i, &r)| {
                        let r = if r.is_finite() { r } else { 0.0 };
                        polar(center, r, TAU * i as f32 / n as f32)
                    })
                    .collect()
            }
        }
    }
}

impl Visualizer for RadialCurves {
    fn render(&mut self, input: &FrameInput, surface: &mut dyn Surface) {
        let limit = input.spectrum.len() / 4;
        if limit == 0 {
            return;
        }
        let (center, short_side) = frame_geometry(surface);
        let inner = (short_side / 8.0).floor();
        let reach = (short_side / 2.0).floor() - 20.0;

        skip_failed(surface.circle(center, inner, Color::rgb(30, 30, 30), Some(1.0)));

        for (ch, &color) in CHANNEL_COLORS.iter().enumerate() {
            let radii: Vec<f32> = self
                .control_magnitudes(&input.spectrum.channel(ch)[..limit])
                .into_iter()
                .map(|m| inner + m * (reach - inner))
                .collect();
            let points = self.outline(&radii, center);
            skip_failed(surface.polyline(&points, true, color, 2.0));
        }
    }
}

/// Each sampled bin is a hand from the centre; its tick angle is rotated
/// by the bin's instantaneous phase.
pub struct PhaseClock;

impl PhaseClock {
    /// End points, colours and widths of every hand for one channel.
    pub fn hands(
        magnitudes: &[f32],
        phases: &[f32],
        ch: usize,
        center: Vec2,
        max_length: f32,
    ) -> Vec<(Vec2, Color, f32)> {
        let step = TAU / CLOCK_HANDS as f32;
        let offset = if ch == 1 { PI / CLOCK_HANDS as f32 } else { 0.0 };
        spread_indices(magnitudes.len(), CLOCK_HANDS)
            .enumerate()
            .map(|(i, bin)| {
                let magnitude = magnitudes[bin];
                let angle = step * i as f32 + offset + phases[bin];
                let end = polar(center, magnitude * max_length * 0.8, angle);

                let brightness = (magnitude * 2.0).min(1.0);
                let freq_factor = i as f32 / CLOCK_HANDS as f32;
                let color = CHANNEL_COLORS[ch]
                    .scaled((0.3 + 0.7 * freq_factor) * (0.4 + 0.6 * brightness));
                let width = (1.0 + brightness * 2.0).floor().max(1.0);
                (end, color, width)
            })
            .collect()
    }
}

impl Visualizer for PhaseClock {
    fn render(&mut self, input: &FrameInput, surface: &mut dyn Surface) {
        let limit = (input.spectrum.len() / 4).min(CLOCK_HANDS * 2);
        if limit == 0 || input.phase.len() < limit {
            return;
        }
        let (center, short_side) = frame_geometry(surface);
        let max_length = (short_side / 2.0).floor() - 30.0;

        skip_failed(surface.circle(center, 5.0, Color::rgb(40, 40, 40), None));

        for ch in 0..CHANNELS {
            let hands = Self::hands(
                &input.spectrum.channel(ch)[..limit],
                &input.phase.channel(ch)[..limit],
                ch,
                center,
                max_length,
            );
            for (end, color, width) in hands {
                skip_failed(surface.line(center, end, color, width));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::analysis::{Phase, Spectrum};
    use crate::audio::SampleBlock;
    use crate::render::canvas::Canvas;
    use crate::viz::normalize::Scale;

    fn render(visualizer: &mut dyn Visualizer, spectrum: &Spectrum, phase: &Phase, canvas: &mut Canvas) {
        let samples = SampleBlock::silent(8);
        let input = FrameInput {
            spectrum,
            phase,
            samples: &samples,
            scale: Scale::Automatic,
        };
        visualizer.render(&input, canvas);
    }

    #[test]
    fn bar_bins_stay_in_range() {
        for limit in [1, 7, 120, 256] {
            let bars = limit.min(MAX_BARS);
            for i in 0..bars {
                assert!(RadialBars::bin_for_bar(i, bars, limit) < limit);
            }
        }
        // Bars 0 and 1 share bin 0, one per channel
        assert_eq!(RadialBars::bin_for_bar(0, 120, 256), 0);
        assert_eq!(RadialBars::bin_for_bar(1, 120, 256), 0);
        assert_eq!(RadialBars::bin_for_bar(2, 120, 256), 4);
    }

    #[test]
    fn radial_bars_leave_centre_dark() {
        let spectrum = Spectrum::new(vec![1.0; 1025], vec![1.0; 1025]);
        let phase = Phase::zeros(1025);
        let mut canvas = Canvas::new(400, 400);
        render(&mut RadialBars, &spectrum, &phase, &mut canvas);
        assert_eq!(canvas.pixel(200, 200), Some(Color::BLACK));
        // Bar 0 points right, from r = 50 out to 50 + 130 * 0.9
        assert_ne!(canvas.pixel(250 + 60, 200), Some(Color::BLACK));
    }

    #[test]
    fn control_points_average_chunks() {
        let curves = RadialCurves::default();
        let bins: Vec<f32> = (0..36).map(|i| (i / 2) as f32).collect();
        let mags = curves.control_magnitudes(&bins);
        assert_eq!(mags.len(), 18);
        assert!((mags[0] - 0.0).abs() < 1e-6);
        assert!((mags[17] - 17.0).abs() < 1e-6);
        // Fewer bins than control points: all chunks empty
        assert!(curves.control_magnitudes(&[1.0; 5]).iter().all(|&m| m == 0.0));
    }

    #[test]
    fn uniform_radii_make_a_circle() {
        let curves = RadialCurves::default();
        let center = Vec2::new(100.0, 100.0);
        let points = curves.outline(&[40.0; 18], center);
        assert_eq!(points.len(), 180);
        assert!(points.iter().all(|p| (p.distance(center) - 40.0).abs() < 1e-2));
    }

    #[test]
    fn phase_rotates_hands() {
        let mags = vec![0.5; 160];
        let still = PhaseClock::hands(&mags, &vec![0.0; 160], 0, Vec2::ZERO, 100.0);
        let turned = PhaseClock::hands(&mags, &vec![PI / 2.0; 160], 0, Vec2::ZERO, 100.0);
        assert_eq!(still.len(), 80);
        // Hand 0: 40 px along +x, rotated a quarter turn onto +y
        assert!((still[0].0 - Vec2::new(40.0, 0.0)).length() < 1e-3);
        assert!((turned[0].0 - Vec2::new(0.0, 40.0)).length() < 1e-3);
        assert_eq!(still[0].2, 3.0);
    }

    #[test]
    fn right_channel_hands_are_offset_half_a_tick() {
        let mags = vec![1.0; 160];
        let phases = vec![0.0; 160];
        let left = PhaseClock::hands(&mags, &phases, 0, Vec2::ZERO, 100.0);
        let right = PhaseClock::hands(&mags, &phases, 1, Vec2::ZERO, 100.0);
        let delta = right[0].0.to_angle() - left[0].0.to_angle();
        assert!((delta - PI / 80.0).abs() < 1e-4);
    }

    #[test]
    fn phase_clock_draws_centre_dot() {
        let spectrum = Spectrum::zeros(1025);
        let phase = Phase::zeros(1025);
        let mut canvas = Canvas::new(200, 200);
        render(&mut PhaseClock, &spectrum, &phase, &mut canvas);
        // Zero-length hands only touch the exact centre pixel
        assert_eq!(canvas.pixel(102, 100), Some(Color::rgb(40, 40, 40)));
    }

    #[test]
    fn non_finite_radius_falls_back_to_finite_polygon() {
        let curves = RadialCurves::default();
        let center = Vec2::new(100.0, 100.0);
        let mut radii = [40.0; 18];
        radii[3] = f32::NAN;
        radii[7] = f32::INFINITY;
        let points = curves.outline(&radii, center);
        assert_eq!(points.len(), 18);
        assert!(points.iter().all(|p| p.is_finite()));
        assert_eq!(points[3], center);
        assert!((points[0].distance(center) - 40.0).abs() < 1e-3);
        assert!(curves.outline(&[], center).is_empty());
    }

    #[test]
    fn nan_spectrum_still_draws_curves() {
        let mut bins = vec![0.5; 1025];
        bins[10] = f32::NAN;
        let spectrum = Spectrum::new(bins.clone(), bins);
        let phase = Phase::zeros(1025);
        let mut canvas = Canvas::new(400, 400);
        render(&mut RadialCurves::default(), &spectrum, &phase, &mut canvas);
        // Chunk 0 collapses to the centre, the rest of the outline still draws
        let reach = 180.0;
        let r = 50.0 + 0.5 * (reach - 50.0);
        let angle = TAU * 9.0 / 18.0;
        let point = polar(Vec2::new(200.0, 200.0), r, angle);
        assert_ne!(
            canvas.pixel(point.x.round() as u32, point.y.round() as u32),
            Some(Color::BLACK)
        );
    }
}
