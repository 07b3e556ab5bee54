use glam::Vec2;

use super::spline::CubicSpline;
use super::{linspace, FrameInput, Visualizer, CHANNEL_COLORS};
use crate::render::canvas::{skip_failed, Rect, Surface};

/// Fraction of the display height reached by a full-scale bin.
const HEIGHT_FRACTION: f32 = 0.9;

/// Low/mid quarter of the spectrum shown by the linear modes.
fn visible_bins(len: usize) -> usize {
    len / 4
}

fn bin_height(magnitude: f32, height: f32) -> f32 {
    if magnitude.is_finite() {
        (magnitude * height * HEIGHT_FRACTION).clamp(0.0, height)
    } else {
        0.0
    }
}

/// Outlined bar per bin, right channel shifted two pixels.
pub struct Bars;

impl Visualizer for Bars {
    fn render(&mut self, input: &FrameInput, surface: &mut dyn Surface) {
        let (width, height) = surface.size();
        let limit = visible_bins(input.spectrum.len());
        if limit == 0 || width == 0 {
            return;
        }
        let bar_width = (width as usize / limit).max(1);
        let count = limit.min(width as usize / bar_width);

        for (ch, &color) in CHANNEL_COLORS.iter().enumerate() {
            let bins = &input.spectrum.channel(ch)[..count];
            for (i, &magnitude) in bins.iter().enumerate() {
                let bar_height = bin_height(magnitude, height as f32) as u32;
                let x = (i * bar_width + ch * 2) as i32;
                let rect = Rect::new(
                    x,
                    (height - bar_height) as i32,
                    (bar_width as u32).saturating_sub(1).max(1),
                    bar_height,
                );
                surface.stroke_rect(rect, color, 1);
            }
        }
    }
}

/// Smooth line through the visible bins.
pub struct Curves {
    resolution: usize,
}

impl Default for Curves {
    fn default() -> Self {
        Self { resolution: 300 }
    }
}

impl Curves {
    /// Screen-space points for one channel, spline-smoothed when possible.
    pub fn trace(&self, bins: &[f32], width: f32, height: f32) -> Vec<Vec2> {
        let xs: Vec<f32> = linspace(0.0, width, bins.len()).collect();
        let ys: Vec<f32> = bins.iter().map(|&m| height - bin_height(m, height)).collect();

        if bins.len() > 3 {
            match CubicSpline::natural(&xs, &ys) {
                Ok(spline) => {
                    return spline
                        .sample(self.resolution)
                        .into_iter()
                        .map(|(x, y)| Vec2::new(x, y.clamp(0.0, height)))
                        .collect();
                }
                Err(err) => log::trace!("Spline fit failed, drawing straight segments: {}", err),
            }
        }
        xs.into_iter().zip(ys).map(|(x, y)| Vec2::new(x, y)).collect()
    }
}

impl Visualizer for Curves {
    fn render(&mut self, input: &FrameInput, surface: &mut dyn Surface) {
        let (width, height) = surface.size();
        let limit = visible_bins(input.spectrum.len());
        if limit < 2 {
            return;
        }
        for (ch, &color) in CHANNEL_COLORS.iter().enumerate() {
            let points = self.trace(&input.spectrum.channel(ch)[..limit], width as f32, height as f32);
            skip_failed(surface.polyline(&points, false, color, 2.0));
        }
    }
}
