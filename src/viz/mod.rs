pub mod normalize;
pub mod particles;
pub mod radial;
pub mod spectrogram;
pub mod spectrum;
pub mod spline;
pub mod terrain;
pub mod waveform;

use crate::audio::analysis::{Phase, Spectrum};
use crate::audio::SampleBlock;
use crate::config::Config;
use crate::render::canvas::{Color, Surface};

use normalize::{Normalizer, Scale, Smoother};

/// Left channel cyan, right channel magenta.
pub const CHANNEL_COLORS: [Color; 2] = [Color::CYAN, Color::MAGENTA];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Mode {
    Bars,
    Curves,
    Spectrogram,
    Oscilloscope,
    Radial,
    RadialCurves,
    PhaseClock,
    Particles,
    Terrain,
}

impl Mode {
    pub const ALL: [Mode; 9] = [
        Mode::Bars,
        Mode::Curves,
        Mode::Spectrogram,
        Mode::Oscilloscope,
        Mode::Radial,
        Mode::RadialCurves,
        Mode::PhaseClock,
        Mode::Particles,
        Mode::Terrain,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Mode::Bars => "Spectrum Bars",
            Mode::Curves => "Spectrum Curves",
            Mode::Spectrogram => "Spectrogram",
            Mode::Oscilloscope => "Oscilloscope",
            Mode::Radial => "Radial Spectrum",
            Mode::RadialCurves => "Radial Curves",
            Mode::PhaseClock => "Phase Clock",
            Mode::Particles => "Particle Field",
            Mode::Terrain => "Spectral Terrain",
        }
    }

    /// Short command-line name.
    pub fn slug(self) -> &'static str {
        match self {
            Mode::Bars => "bars",
            Mode::Curves => "curves",
            Mode::Spectrogram => "spectrogram",
            Mode::Oscilloscope => "oscilloscope",
            Mode::Radial => "radial",
            Mode::RadialCurves => "radial-curves",
            Mode::PhaseClock => "phase-clock",
            Mode::Particles => "particles",
            Mode::Terrain => "terrain",
        }
    }

    pub fn index(self) -> usize {
        Self::ALL.iter().position(|&m| m == self).unwrap_or(0)
    }

    pub fn next(self) -> Mode {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    /// Matches a slug or display name, ignoring case, spaces and dashes.
    pub fn parse(text: &str) -> Option<Mode> {
        let key = |s: &str| {
            s.chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
                .to_lowercase()
        };
        let wanted = key(text);
        Self::ALL
            .into_iter()
            .find(|m| key(m.slug()) == wanted || key(m.name()) == wanted)
    }

    /// A uniformly chosen mode other than `self`.
    pub fn random_other(self, rng: &mut fastrand::Rng) -> Mode {
        let offset = rng.usize(1..Self::ALL.len());
        Self::ALL[(self.index() + offset) % Self::ALL.len()]
    }
}

/// Everything a renderer sees for one tick.
pub struct FrameInput<'a> {
    pub spectrum: &'a Spectrum,
    pub phase: &'a Phase,
    pub samples: &'a SampleBlock,
    pub scale: Scale,
}

pub trait Visualizer {
    fn render(&mut self, input: &FrameInput, surface: &mut dyn Surface);
}

/// `count` evenly spaced values from `start` to `end` inclusive.
pub fn linspace(start: f32, end: f32, count: usize) -> impl Iterator<Item = f32> {
    let step = if count > 1 { (end - start) / (count - 1) as f32 } else { 0.0 };
    (0..count).map(move |i| if i + 1 == count && count > 1 { end } else { start + step * i as f32 })
}

/// `count` evenly spaced indices into a sequence of `len` items.
pub fn spread_indices(len: usize, count: usize) -> impl Iterator<Item = usize> {
    let last = len.saturating_sub(1);
    linspace(0.0, last as f32, count).map(move |v| (v as usize).min(last))
}

/// Owns normalization, smoothing and every mode's persistent state.
pub struct Engine {
    mode: Mode,
    scale: Scale,
    normalizer: Normalizer,
    smoother: Smoother,
    renderers: Vec<Box<dyn Visualizer>>,
}

impl Engine {
    pub fn new(config: &Config) -> Self {
        Self::with_rng(config, fastrand::Rng::new())
    }

    pub fn with_rng(config: &Config, mut rng: fastrand::Rng) -> Self {
        let analysis = &config.analysis;
        let visual = &config.visual;
        let dt = config.frame_dt();
        let renderers: Vec<Box<dyn Visualizer>> = Mode::ALL
            .into_iter()
            .map(|mode| -> Box<dyn Visualizer> {
                match mode {
                    Mode::Bars => Box::new(spectrum::Bars),
                    Mode::Curves => Box::new(spectrum::Curves::default()),
                    Mode::Spectrogram => Box::new(spectrogram::Spectrogram::new(
                        config.display.width,
                        config.spectrogram_rows(),
                    )),
                    Mode::Oscilloscope => Box::new(waveform::Waveform::new(
                        analysis.decay,
                        analysis.waveform_floor,
                    )),
                    Mode::Radial => Box::new(radial::RadialBars),
                    Mode::RadialCurves => Box::new(radial::RadialCurves::default()),
                    Mode::PhaseClock => Box::new(radial::PhaseClock),
                    Mode::Particles => Box::new(particles::ParticleField::new(
                        visual.particle_capacity,
                        dt,
                        rng.fork(),
                    )),
                    Mode::Terrain => Box::new(terrain::Terrain::new(
                        visual.terrain_depth,
                        visual.terrain_bins,
                    )),
                }
            })
            .collect();

        Self {
            mode: Mode::Bars,
            scale: Scale::Automatic,
            normalizer: Normalizer::new(analysis.decay, analysis.spectrum_floor),
            smoother: Smoother::new(analysis.smoothing),
            renderers,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: Mode) {
        if mode != self.mode {
            log::debug!("Mode: {}", mode.name());
        }
        self.mode = mode;
    }

    pub fn cycle_mode(&mut self) -> Mode {
        self.set_mode(self.mode.next());
        self.mode
    }

    pub fn scale(&self) -> Scale {
        self.scale
    }

    pub fn set_scale(&mut self, scale: Scale) {
        self.scale = scale;
    }

    /// Normalize then smooth. `None` for an empty spectrum.
    pub fn prepare(&mut self, spectrum: &Spectrum) -> Option<Spectrum> {
        if spectrum.is_empty() {
            return None;
        }
        let normalized = self.normalizer.apply(spectrum, self.scale);
        Some(self.smoother.apply(&normalized))
    }

    /// Draw one frame of the current mode. Empty input leaves the surface
    /// untouched.
    pub fn render(
        &mut self,
        samples: &SampleBlock,
        spectrum: &Spectrum,
        phase: &Phase,
        surface: &mut dyn Surface,
    ) {
        let Some(prepared) = self.prepare(spectrum) else {
            log::trace!("Empty spectrum, skipping frame");
            return;
        };
        surface.clear(Color::BLACK);
        let input = FrameInput {
            spectrum: &prepared,
            phase,
            samples,
            scale: self.scale,
        };
        self.renderers[self.mode.index()].render(&input, surface);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::analysis::{peak_bin, SpectralAnalyzer};
    use crate::render::canvas::Canvas;

    fn sine_block(freq: f32, sample_rate: u32, len: usize) -> SampleBlock {
        let frames = (0..len)
            .map(|i| {
                let t = i as f32 / sample_rate as f32;
                let s = (2.0 * std::f32::consts::PI * freq * t).sin() * 0.5;
                [s, s]
            })
            .collect();
        SampleBlock::from_frames(frames)
    }

    fn engine() -> Engine {
        Engine::with_rng(&Config::default(), fastrand::Rng::with_seed(7))
    }

    #[test]
    fn sine_survives_analysis_and_normalization() {
        let config = Config::default();
        let mut analyzer = SpectralAnalyzer::new(config.analysis.fft_size, config.audio.sample_rate);
        let mut engine = engine();
        let block = sine_block(440.0, config.audio.sample_rate, config.audio.block_size);
        let (spectrum, _) = analyzer.process(&block);
        let prepared = engine.prepare(&spectrum).unwrap();

        let resolution = analyzer.bin_frequency(1);
        for ch in 0..2 {
            let peak = peak_bin(prepared.channel(ch)).unwrap();
            assert!((analyzer.bin_frequency(peak) - 440.0).abs() <= resolution);
        }
        assert!(prepared.max() <= 1.0 + 1e-5);
    }

    #[test]
    fn every_mode_renders_a_sine() {
        let config = Config::default();
        let mut analyzer = SpectralAnalyzer::new(config.analysis.fft_size, config.audio.sample_rate);
        let mut engine = engine();
        let block = sine_block(440.0, config.audio.sample_rate, config.audio.block_size);
        let (spectrum, phase) = analyzer.process(&block);
        let mut canvas = Canvas::new(config.display.width, config.display.height);

        for mode in Mode::ALL {
            engine.set_mode(mode);
            for _ in 0..3 {
                engine.render(&block, &spectrum, &phase, &mut canvas);
            }
            // A steady sine stays under every particle spawn threshold
            if mode != Mode::Particles {
                assert!(canvas.lit_pixels() > 0, "{} drew nothing", mode.name());
            }
        }
    }

    #[test]
    fn empty_spectrum_is_a_no_op() {
        let mut engine = engine();
        let mut canvas = Canvas::new(32, 32);
        canvas.clear(Color::WHITE);
        let empty = Spectrum::zeros(0);
        engine.render(&SampleBlock::silent(0), &empty, &empty, &mut canvas);
        assert_eq!(canvas.pixel(5, 5), Some(Color::WHITE));
    }

    #[test]
    fn mode_cycle_and_parse() {
        let mut engine = engine();
        assert_eq!(engine.cycle_mode(), Mode::Curves);
        engine.set_mode(Mode::Terrain);
        assert_eq!(engine.cycle_mode(), Mode::Bars);

        assert_eq!(Mode::parse("phase-clock"), Some(Mode::PhaseClock));
        assert_eq!(Mode::parse("Radial Curves"), Some(Mode::RadialCurves));
        assert_eq!(Mode::parse("OSCILLOSCOPE"), Some(Mode::Oscilloscope));
        assert_eq!(Mode::parse("nope"), None);
    }

    #[test]
    fn random_other_never_repeats() {
        let mut rng = fastrand::Rng::with_seed(42);
        for mode in Mode::ALL {
            for _ in 0..50 {
                assert_ne!(mode.random_other(&mut rng), mode);
            }
        }
    }

    #[test]
    fn linspace_hits_both_ends() {
        let v: Vec<f32> = linspace(0.0, 10.0, 5).collect();
        assert_eq!(v, vec![0.0, 2.5, 5.0, 7.5, 10.0]);
        assert_eq!(linspace(3.0, 9.0, 1).collect::<Vec<_>>(), vec![3.0]);
        let idx: Vec<usize> = spread_indices(1025, 400).collect();
        assert_eq!(idx.len(), 400);
        assert_eq!(idx[0], 0);
        assert_eq!(idx[399], 1024);
    }
}
