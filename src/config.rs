use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub visual: VisualConfig,
    #[serde(default)]
    pub shuffle: ShuffleConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    /// Frames per block handed to the analyzer each tick
    #[serde(default = "default_block_size")]
    pub block_size: usize,
    #[serde(default = "default_true")]
    pub loop_playback: bool,
    /// Input device name (substring) or index for live capture
    #[serde(default)]
    pub device: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_fft_size")]
    pub fft_size: usize,
    /// EMA weight of the previous smoothed spectrum (0.0 = off)
    #[serde(default = "default_smoothing")]
    pub smoothing: f32,
    /// Per-tick release factor of the running maxima
    #[serde(default = "default_decay")]
    pub decay: f32,
    #[serde(default = "default_spectrum_floor")]
    pub spectrum_floor: f32,
    #[serde(default = "default_waveform_floor")]
    pub waveform_floor: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default)]
    pub fullscreen: bool,
    /// TTF/OTF used for widget labels
    #[serde(default)]
    pub font: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VisualConfig {
    #[serde(default = "default_particle_capacity")]
    pub particle_capacity: usize,
    #[serde(default = "default_terrain_depth")]
    pub terrain_depth: usize,
    #[serde(default = "default_terrain_bins")]
    pub terrain_bins: usize,
    /// Rows kept by the spectrogram; defaults to the display height
    #[serde(default)]
    pub spectrogram_history: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShuffleConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_shuffle_interval")]
    pub interval_secs: f32,
    /// Peak amplitude below which a block counts as silence
    #[serde(default = "default_silence_threshold")]
    pub silence_threshold: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            block_size: default_block_size(),
            loop_playback: true,
            device: None,
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            fft_size: default_fft_size(),
            smoothing: default_smoothing(),
            decay: default_decay(),
            spectrum_floor: default_spectrum_floor(),
            waveform_floor: default_waveform_floor(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            fps: default_fps(),
            fullscreen: false,
            font: None,
        }
    }
}

impl Default for VisualConfig {
    fn default() -> Self {
        Self {
            particle_capacity: default_particle_capacity(),
            terrain_depth: default_terrain_depth(),
            terrain_bins: default_terrain_bins(),
            spectrogram_history: None,
        }
    }
}

impl Default for ShuffleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: default_shuffle_interval(),
            silence_threshold: default_silence_threshold(),
        }
    }
}

/// Apply `fix` to `value`, logging when it changes anything.
fn clamp_field<T>(name: &str, value: &mut T, fix: impl FnOnce(T) -> T)
where
    T: PartialEq + Copy + std::fmt::Display,
{
    let fixed = fix(*value);
    if *value != fixed {
        log::warn!("Config {} = {} is out of range, using {}", name, value, fixed);
        *value = fixed;
    }
}

fn finite_or(value: f32, fallback: f32, fix: impl FnOnce(f32) -> f32) -> f32 {
    if value.is_finite() { fix(value) } else { fallback }
}

impl Config {
    /// Seconds between ticks at the configured frame rate.
    pub fn frame_dt(&self) -> f32 {
        1.0 / self.display.fps.max(1) as f32
    }

    pub fn spectrogram_rows(&self) -> u32 {
        self.visual
            .spectrogram_history
            .unwrap_or(self.display.height)
            .max(1)
    }

    /// Pull every knob into the range the engine can run with.
    pub fn validate(&mut self) {
        let audio = &mut self.audio;
        clamp_field("audio.sample_rate", &mut audio.sample_rate, |v| v.max(1000));
        clamp_field("audio.block_size", &mut audio.block_size, |v| v.clamp(16, 1 << 16));

        let analysis = &mut self.analysis;
        clamp_field("analysis.fft_size", &mut analysis.fft_size, |v| v.clamp(16, 1 << 16));
        clamp_field("analysis.smoothing", &mut analysis.smoothing, |v| {
            finite_or(v, default_smoothing(), |v| v.clamp(0.0, 0.99))
        });
        // Decay above 1 would let the running maxima grow without bound
        clamp_field("analysis.decay", &mut analysis.decay, |v| {
            finite_or(v, default_decay(), |v| v.clamp(0.0, 1.0))
        });
        clamp_field("analysis.spectrum_floor", &mut analysis.spectrum_floor, |v| {
            finite_or(v, default_spectrum_floor(), |v| v.max(1e-6))
        });
        clamp_field("analysis.waveform_floor", &mut analysis.waveform_floor, |v| {
            finite_or(v, default_waveform_floor(), |v| v.max(1e-6))
        });

        let display = &mut self.display;
        clamp_field("display.width", &mut display.width, |v| v.clamp(64, 8192));
        clamp_field("display.height", &mut display.height, |v| v.clamp(64, 8192));
        clamp_field("display.fps", &mut display.fps, |v| v.clamp(1, 240));

        let visual = &mut self.visual;
        clamp_field("visual.terrain_depth", &mut visual.terrain_depth, |v| v.max(2));
        clamp_field("visual.terrain_bins", &mut visual.terrain_bins, |v| v.max(2));

        clamp_field("shuffle.interval_secs", &mut self.shuffle.interval_secs, |v| {
            finite_or(v, default_shuffle_interval(), |v| v.max(0.1))
        });
    }
}

fn default_true() -> bool { true }
fn default_sample_rate() -> u32 { 48_000 }
fn default_block_size() -> usize { 1024 }
fn default_fft_size() -> usize { 2048 }
fn default_smoothing() -> f32 { 0.7 }
fn default_decay() -> f32 { 0.995 }
fn default_spectrum_floor() -> f32 { 1.0 }
fn default_waveform_floor() -> f32 { 0.01 }
fn default_width() -> u32 { 800 }
fn default_height() -> u32 { 480 }
fn default_fps() -> u32 { 60 }
fn default_particle_capacity() -> usize { 2000 }
fn default_terrain_depth() -> usize { 48 }
fn default_terrain_bins() -> usize { 64 }
fn default_shuffle_interval() -> f32 { 15.0 }
fn default_silence_threshold() -> f32 { 0.01 }

pub fn load_config(path: &Path) -> Option<Config> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str::<Config>(&content) {
        Ok(mut config) => {
            config.validate();
            Some(config)
        }
        Err(err) => {
            log::warn!("Invalid config {}: {}", path.display(), err);
            None
        }
    }
}

/// Explicit path first, then `spectrascope.toml` in the working directory,
/// then the per-user config locations.
pub fn discover_config(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from("spectrascope.toml");
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("spectrascope").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("spectrascope").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.audio.sample_rate, 48_000);
        assert_eq!(config.audio.block_size, 1024);
        assert_eq!(config.analysis.fft_size, 2048);
        assert_eq!(config.display.fps, 60);
        assert_eq!(config.visual.terrain_depth, 48);
        assert!(config.audio.loop_playback);
        assert_eq!(config.spectrogram_rows(), config.display.height);
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let config: Config = toml::from_str(
            r#"
            [display]
            fps = 30
            width = 640

            [visual]
            spectrogram_history = 120
            "#,
        )
        .unwrap();
        assert_eq!(config.display.fps, 30);
        assert_eq!(config.display.width, 640);
        assert_eq!(config.display.height, 480);
        assert_eq!(config.spectrogram_rows(), 120);
        assert!((config.analysis.decay - 0.995).abs() < 1e-6);
        assert!((config.frame_dt() - 1.0 / 30.0).abs() < 1e-6);
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let mut config: Config = toml::from_str(
            r#"
            [audio]
            block_size = 0

            [analysis]
            decay = 1.5
            smoothing = -2.0

            [display]
            fps = 0
            "#,
        )
        .unwrap();
        config.validate();
        assert_eq!(config.audio.block_size, 16);
        assert_eq!(config.analysis.decay, 1.0);
        assert_eq!(config.analysis.smoothing, 0.0);
        assert_eq!(config.display.fps, 1);
        // In-range values pass through untouched
        assert_eq!(config.audio.sample_rate, 48_000);
        assert_eq!(config.display.width, 800);
    }

    #[test]
    fn non_finite_values_fall_back_to_defaults() {
        let mut config = Config::default();
        config.analysis.decay = f32::NAN;
        config.shuffle.interval_secs = f32::INFINITY;
        config.validate();
        assert!((config.analysis.decay - 0.995).abs() < 1e-6);
        assert_eq!(config.shuffle.interval_secs, 15.0);
    }
}
