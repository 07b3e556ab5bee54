use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

use super::{SampleBlock, CHANNELS};

/// Per-channel values indexed by frequency bin. Both channels always have
/// the same length.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StereoBins {
    pub channels: [Vec<f32>; CHANNELS],
}

/// Non-negative magnitudes per bin.
pub type Spectrum = StereoBins;
/// Phase angles in (-π, π], paired with the `Spectrum` of the same tick.
pub type Phase = StereoBins;

impl StereoBins {
    pub fn new(left: Vec<f32>, right: Vec<f32>) -> Self {
        debug_assert_eq!(left.len(), right.len());
        Self {
            channels: [left, right],
        }
    }

    #[cfg(test)]
    pub fn zeros(len: usize) -> Self {
        Self::new(vec![0.0; len], vec![0.0; len])
    }

    /// Bins per channel.
    pub fn len(&self) -> usize {
        self.channels[0].len().min(self.channels[1].len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn channel(&self, ch: usize) -> &[f32] {
        &self.channels[ch][..self.len()]
    }

    pub fn max(&self) -> f32 {
        self.channels
            .iter()
            .flat_map(|c| c.iter())
            .copied()
            .fold(0.0f32, f32::max)
    }

    pub fn map(&self, f: impl Fn(f32) -> f32) -> Self {
        Self {
            channels: [
                self.channels[0].iter().map(|&v| f(v)).collect(),
                self.channels[1].iter().map(|&v| f(v)).collect(),
            ],
        }
    }

    /// Mean of both channels over `range`, clipped to the available bins.
    pub fn band_mean(&self, range: std::ops::Range<usize>) -> f32 {
        let end = range.end.min(self.len());
        let start = range.start.min(end);
        if start == end {
            return 0.0;
        }
        let sum: f32 = self
            .channels
            .iter()
            .map(|c| c[start..end].iter().sum::<f32>())
            .sum();
        sum / ((end - start) * CHANNELS) as f32
    }
}

/// Windowed FFT over each channel of a block.
pub struct SpectralAnalyzer {
    fft_size: usize,
    sample_rate: u32,
    window: Vec<f32>,
    fft: Arc<dyn Fft<f32>>,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
}

impl SpectralAnalyzer {
    pub fn new(fft_size: usize, sample_rate: u32) -> Self {
        let fft_size = fft_size.max(2);
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(fft_size);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];
        Self {
            fft_size,
            sample_rate,
            window: hann_window(fft_size),
            fft,
            buffer: vec![Complex::new(0.0, 0.0); fft_size],
            scratch,
        }
    }

    pub fn num_bins(&self) -> usize {
        self.fft_size / 2 + 1
    }

    pub fn bin_frequency(&self, bin: usize) -> f32 {
        bin as f32 * self.sample_rate as f32 / self.fft_size as f32
    }

    /// Magnitude and phase per channel. The block is zero-padded or truncated
    /// to the analysis window.
    pub fn process(&mut self, block: &SampleBlock) -> (Spectrum, Phase) {
        let half = self.num_bins();
        let mut magnitudes: [Vec<f32>; CHANNELS] = Default::default();
        let mut phases: [Vec<f32>; CHANNELS] = Default::default();

        for ch in 0..CHANNELS {
            for (i, slot) in self.buffer.iter_mut().enumerate() {
                let sample = block.frames.get(i).map_or(0.0, |f| f[ch]);
                *slot = Complex::new(sample * self.window[i], 0.0);
            }
            self.fft.process_with_scratch(&mut self.buffer, &mut self.scratch);

            magnitudes[ch] = self.buffer[..half].iter().map(|c| c.norm()).collect();
            phases[ch] = self.buffer[..half].iter().map(|c| c.arg()).collect();
        }

        (Spectrum { channels: magnitudes }, Phase { channels: phases })
    }
}

pub fn hann_window(size: usize) -> Vec<f32> {
    if size < 2 {
        return vec![1.0; size];
    }
    (0..size)
        .map(|i| {
            0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / (size - 1) as f32).cos())
        })
        .collect()
}

/// Index of the largest magnitude in a channel.
pub fn peak_bin(bins: &[f32]) -> Option<usize> {
    bins.iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
}
