use glam::Vec2;

use super::normalize::{AdaptiveGain, Scale};
use super::{linspace, FrameInput, Visualizer, CHANNEL_COLORS};
use crate::audio::{SampleBlock, CHANNELS};
use crate::render::canvas::{skip_failed, Surface};

const INITIAL_PEAK: f32 = 0.1;
/// Half-height fraction used by a full-scale sample.
const HEIGHT_FRACTION: f32 = 0.8;
const RIGHT_OFFSET: f32 = 2.0;

/// First rising zero crossing of `samples` within its first half.
pub fn trigger_index(samples: &[f32]) -> usize {
    (0..samples.len() / 2)
        .find(|&i| samples[i] < 0.0 && samples[i + 1] > 0.0)
        .unwrap_or(0)
}

/// Triggered oscilloscope trace.
pub struct Waveform {
    gain: AdaptiveGain,
}

impl Waveform {
    pub fn new(decay: f32, floor: f32) -> Self {
        Self {
            gain: AdaptiveGain::new(INITIAL_PEAK, decay, floor),
        }
    }

    /// Screen-space polylines for both channels.
    pub fn trace(&mut self, block: &SampleBlock, scale: Scale, width: u32, height: u32) -> [Vec<Vec2>; CHANNELS] {
        let left: Vec<f32> = block.channel(0).collect();
        let trigger = trigger_index(&left);
        let draw_len = (block.len() - trigger).min(width.max(2) as usize);
        let window = &block.frames[trigger..trigger + draw_len];

        let half = height as f32 / 2.0;
        let pixels_per_unit = match scale {
            Scale::Manual(factor) => half * HEIGHT_FRACTION * factor,
            Scale::Automatic => {
                let peak = window
                    .iter()
                    .flat_map(|f| f.iter())
                    .map(|s| s.abs())
                    .fold(0.0f32, f32::max);
                self.gain.update(peak);
                half * HEIGHT_FRACTION / self.gain.divisor()
            }
        };

        let mut traces: [Vec<Vec2>; CHANNELS] = Default::default();
        for (ch, trace) in traces.iter_mut().enumerate() {
            let offset = if ch == 1 { RIGHT_OFFSET } else { 0.0 };
            *trace = linspace(0.0, width as f32, window.len())
                .zip(window)
                .map(|(x, frame)| {
                    let sample = if frame[ch].is_finite() { frame[ch] } else { 0.0 };
                    Vec2::new(x, half - sample * pixels_per_unit + offset)
                })
                .collect();
        }
        traces
    }
}

impl Visualizer for Waveform {
    fn render(&mut self, input: &FrameInput, surface: &mut dyn Surface) {
        if input.samples.len() < 2 {
            return;
        }
        let (width, height) = surface.size();
        let traces = self.trace(input.samples, input.scale, width, height);
        for (trace, &color) in traces.iter().zip(&CHANNEL_COLORS) {
            if trace.len() > 1 {
                skip_failed(surface.polyline(trace, false, color, 2.0));
            }
        }
    }
}
