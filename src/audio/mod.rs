pub mod analysis;
pub mod decode;
pub mod file_source;
pub mod live_source;

use thiserror::Error;

pub const CHANNELS: usize = 2;

/// First two samples of an interleaved frame; mono is duplicated.
pub fn front_pair<T: Copy>(frame: &[T]) -> [T; CHANNELS] {
    let left = frame[0];
    let right = frame.get(1).copied().unwrap_or(left);
    [left, right]
}

/// One tick of stereo audio, `frames[i] = [left, right]`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SampleBlock {
    pub frames: Vec<[f32; CHANNELS]>,
}

impl SampleBlock {
    pub fn silent(len: usize) -> Self {
        Self {
            frames: vec![[0.0; CHANNELS]; len],
        }
    }

    pub fn from_frames(frames: Vec<[f32; CHANNELS]>) -> Self {
        Self { frames }
    }

    /// Build a block from interleaved samples; mono is duplicated, extra
    /// channels beyond the second are dropped.
    pub fn from_interleaved(samples: &[f32], channels: usize) -> Self {
        let channels = channels.max(1);
        let frames = samples.chunks_exact(channels).map(front_pair).collect();
        Self { frames }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn channel(&self, ch: usize) -> impl Iterator<Item = f32> + '_ {
        self.frames.iter().map(move |f| f[ch])
    }

    /// Peak absolute amplitude over both channels.
    pub fn peak(&self) -> f32 {
        self.frames
            .iter()
            .flat_map(|f| f.iter())
            .map(|s| s.abs())
            .fold(0.0f32, f32::max)
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("no input device matching '{0}'")]
    DeviceNotFound(String),
    #[error("no default input device available")]
    NoDefaultDevice,
    #[error("failed to query input config: {0}")]
    Config(#[from] cpal::DefaultStreamConfigError),
    #[error("failed to build input stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),
    #[error("failed to start input stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),
    #[error("failed to enumerate devices: {0}")]
    Devices(#[from] cpal::DevicesError),
    #[error("unsupported sample format {0:?}")]
    UnsupportedFormat(cpal::SampleFormat),
}

/// Anything that hands out fixed-size stereo blocks on demand.
///
/// `read_chunk` never fails: sources degrade to silence and log instead.
pub trait AudioSource {
    fn start(&mut self) -> Result<(), SourceError>;
    fn stop(&mut self);
    fn read_chunk(&mut self) -> SampleBlock;
    /// Rate the blocks actually arrive at. For live input this is only
    /// final after `start`, since the device may refuse the requested rate.
    fn sample_rate(&self) -> u32;
    /// Path of the file being played, if any (used to mux recordings).
    fn media_path(&self) -> Option<&std::path::Path> {
        None
    }
}
