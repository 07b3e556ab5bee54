//! Scrolling 3-D wireframe of recent spectra, one landscape per channel.

use glam::{Mat4, Vec2, Vec3};
use std::collections::VecDeque;

use super::{FrameInput, Visualizer, CHANNEL_COLORS};
use crate::audio::CHANNELS;
use crate::render::canvas::{skip_failed, Surface};

const CAMERA_TILT: f32 = 0.45;
const FIELD_OF_VIEW: f32 = 0.9;
const EYE: Vec3 = Vec3::new(0.0, 1.1, 2.0);
/// Half-width of the frequency axis in world units.
const SPAN: f32 = 0.7;
/// World length of the depth axis.
const DEPTH: f32 = 2.0;
const PEAK_HEIGHT: f32 = 0.5;
const VERTICAL_STRIDE: usize = 4;
const FAR_BRIGHTNESS: f32 = 0.15;

/// Bounded per-channel slice history, newest first.
pub struct TerrainHistory {
    depth: usize,
    channels: [VecDeque<Vec<f32>>; CHANNELS],
}

impl TerrainHistory {
    pub fn new(depth: usize) -> Self {
        let depth = depth.max(1);
        Self {
            depth,
            channels: std::array::from_fn(|_| VecDeque::with_capacity(depth + 1)),
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.channels[0].len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append one slice per channel, evicting the oldest beyond `depth`.
    pub fn push(&mut self, slices: [Vec<f32>; CHANNELS]) {
        for (history, slice) in self.channels.iter_mut().zip(slices) {
            history.push_front(slice);
            history.truncate(self.depth);
        }
    }

    /// Slices for one channel, newest first.
    pub fn channel(&self, ch: usize) -> &VecDeque<Vec<f32>> {
        &self.channels[ch]
    }
}

/// Average `bins` into `bands` contiguous groups.
pub fn band_slice(bins: &[f32], bands: usize) -> Vec<f32> {
    let len = bins.len();
    if len == 0 {
        return vec![0.0; bands];
    }
    (0..bands)
        .map(|i| {
            let start = (i * len / bands).min(len - 1);
            let end = ((i + 1) * len / bands).clamp(start + 1, len);
            let group = &bins[start..end];
            let mean = group.iter().sum::<f32>() / group.len() as f32;
            if mean.is_finite() {
                mean.max(0.0)
            } else {
                0.0
            }
        })
        .collect()
}

/// Perspective camera over one half of the display.
struct Projection {
    view_proj: Mat4,
    origin: Vec2,
    size: Vec2,
}

impl Projection {
    fn new(origin: Vec2, size: Vec2) -> Self {
        let aspect = (size.x / size.y.max(1.0)).max(0.01);
        let proj = Mat4::perspective_rh(FIELD_OF_VIEW, aspect, 0.1, 50.0);
        let view = Mat4::from_rotation_x(CAMERA_TILT) * Mat4::from_translation(-EYE);
        Self {
            view_proj: proj * view,
            origin,
            size,
        }
    }

    /// Screen position, or `None` behind the camera.
    fn project(&self, world: Vec3) -> Option<Vec2> {
        let clip = self.view_proj * world.extend(1.0);
        if clip.w <= 1e-4 {
            return None;
        }
        let ndc = clip.truncate() / clip.w;
        Some(Vec2::new(
            self.origin.x + (ndc.x + 1.0) * 0.5 * self.size.x,
            self.origin.y + (1.0 - ndc.y) * 0.5 * self.size.y,
        ))
    }
}

pub struct Terrain {
    history: TerrainHistory,
    bins: usize,
}

impl Terrain {
    pub fn new(depth: usize, bins: usize) -> Self {
        Self {
            history: TerrainHistory::new(depth),
            bins: bins.max(2),
        }
    }

    #[cfg(test)]
    pub fn history(&self) -> &TerrainHistory {
        &self.history
    }

    fn brightness(&self, row: usize) -> f32 {
        let far = (self.history.depth() - 1).max(1) as f32;
        1.0 - (1.0 - FAR_BRIGHTNESS) * (row as f32 / far)
    }

    /// Projected grid for one channel: `grid[row][bin]`, row 0 newest.
    fn grid(&self, ch: usize, projection: &Projection) -> Vec<Vec<Option<Vec2>>> {
        let rows = self.history.depth();
        self.history
            .channel(ch)
            .iter()
            .enumerate()
            .map(|(row, slice)| {
                let z = -DEPTH * row as f32 / (rows - 1).max(1) as f32;
                slice
                    .iter()
                    .enumerate()
                    .map(|(bin, &m)| {
                        let x = -SPAN + 2.0 * SPAN * bin as f32 / (slice.len() - 1).max(1) as f32;
                        let y = m.min(1.5) * PEAK_HEIGHT;
                        projection.project(Vec3::new(x, y, z))
                    })
                    .collect()
            })
            .collect()
    }
}

impl Visualizer for Terrain {
    fn render(&mut self, input: &FrameInput, surface: &mut dyn Surface) {
        let limit = input.spectrum.len() / 4;
        if limit == 0 {
            return;
        }
        let slices = std::array::from_fn(|ch| band_slice(&input.spectrum.channel(ch)[..limit], self.bins));
        self.history.push(slices);

        let (width, height) = surface.size();
        let half = width / 2;
        let viewports = [(0, half), (half, width - half)];

        for (ch, &(x, w)) in viewports.iter().enumerate() {
            if w == 0 {
                continue;
            }
            let projection = Projection::new(
                Vec2::new(x as f32, 0.0),
                Vec2::new(w as f32, height as f32),
            );
            let grid = self.grid(ch, &projection);

            // Far rows first so nearer lines overwrite them
            for row in (0..grid.len()).rev() {
                let color = CHANNEL_COLORS[ch].scaled(self.brightness(row));
                for pair in grid[row].windows(2) {
                    if let (Some(a), Some(b)) = (pair[0], pair[1]) {
                        skip_failed(surface.line(a, b, color, 1.0));
                    }
                }
                if row + 1 < grid.len() {
                    let dim = color.scaled(0.6);
                    for bin in (0..grid[row].len()).step_by(VERTICAL_STRIDE) {
                        let far = grid[row + 1].get(bin).copied().flatten();
                        if let (Some(a), Some(b)) = (grid[row][bin], far) {
                            skip_failed(surface.line(a, b, dim, 1.0));
                        }
                    }
                }
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

    #[test]
    fn history_keeps_most_recent_in_order() {
        let mut history = TerrainHistory::new(3);
        for i in 0..10 {
            let v = i as f32;
            history.push([vec![v], vec![-v]]);
            assert!(history.len() <= 3);
        }
        assert_eq!(history.len(), 3);
        let left: Vec<f32> = history.channel(0).iter().map(|s| s[0]).collect();
        let right: Vec<f32> = history.channel(1).iter().map(|s| s[0]).collect();
        assert_eq!(left, vec![9.0, 8.0, 7.0]);
        assert_eq!(right, vec![-9.0, -8.0, -7.0]);
    }

    #[test]
    fn band_slice_averages_groups() {
        let bins: Vec<f32> = (0..8).map(|i| i as f32).collect();
        assert_eq!(band_slice(&bins, 4), vec![0.5, 2.5, 4.5, 6.5]);
        // More bands than bins repeats the nearest bin
        assert_eq!(band_slice(&[1.0, 3.0], 4), vec![1.0, 1.0, 3.0, 3.0]);
        assert_eq!(band_slice(&[], 3), vec![0.0; 3]);
        assert_eq!(band_slice(&[f32::NAN, 1.0], 2), vec![0.0, 1.0]);
    }

    #[test]
    fn newest_row_projects_below_oldest() {
        let projection = Projection::new(Vec2::ZERO, Vec2::new(400.0, 480.0));
        let near = projection.project(Vec3::new(0.0, 0.0, 0.0)).unwrap();
        let far = projection.project(Vec3::new(0.0, 0.0, -DEPTH)).unwrap();
        assert!(near.y > far.y);
        assert!(near.y < 480.0 && far.y > 0.0);
        assert!((near.x - 200.0).abs() < 1e-3);
        let left = projection.project(Vec3::new(-SPAN, 0.0, 0.0)).unwrap();
        assert!(left.x > 0.0 && left.x < 200.0);
        assert!(projection.project(EYE + Vec3::new(0.0, 0.0, 1.0)).is_none());
    }

    #[test]
    fn depth_dims_to_floor() {
        let terrain = Terrain::new(48, 64);
        assert_eq!(terrain.brightness(0), 1.0);
        assert!((terrain.brightness(47) - FAR_BRIGHTNESS).abs() < 1e-6);
    }

    #[test]
    fn render_fills_history_and_draws() {
        let mut terrain = Terrain::new(5, 16);
        let spectrum = Spectrum::new(vec![0.5; 1025], vec![0.8; 1025]);
        let phase = Phase::zeros(1025);
        let samples = SampleBlock::silent(8);
        let input = FrameInput {
            spectrum: &spectrum,
            phase: &phase,
            samples: &samples,
            scale: Scale::Automatic,
        };
        let mut canvas = Canvas::new(320, 200);
        for _ in 0..8 {
            terrain.render(&input, &mut canvas);
        }
        assert_eq!(terrain.history().len(), 5);
        assert_eq!(terrain.history().channel(0)[0].len(), 16);
        assert!(canvas.lit_pixels() > 0);
    }
}
