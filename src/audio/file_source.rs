use std::path::{Path, PathBuf};

use super::decode::{decode_audio, resample, AudioData};
use super::{AudioSource, SampleBlock, SourceError, CHANNELS};

const SILENCE_SECS: usize = 5;

/// Plays a decoded file block by block, looping or zero-padding at the end.
pub struct FileSource {
    path: Option<PathBuf>,
    frames: Vec<[f32; CHANNELS]>,
    sample_rate: u32,
    block_size: usize,
    cursor: usize,
    looping: bool,
}

impl FileSource {
    /// Decodes `path` up front. A missing or undecodable file is not fatal:
    /// it is reported once and replaced by a few seconds of silence.
    pub fn open(path: &Path, sample_rate: u32, block_size: usize, looping: bool) -> Self {
        let decoded = decode_audio(path).and_then(|audio| resample(audio, sample_rate));
        match decoded {
            Ok(audio) => {
                log::info!(
                    "Loaded audio file: {} ({:.2}s)",
                    path.display(),
                    audio.duration_secs()
                );
                Self::from_audio(audio, block_size, looping).with_path(path)
            }
            Err(err) => {
                log::warn!("Could not load {}: {:#}. Using silence.", path.display(), err);
                Self::silence(sample_rate, block_size)
            }
        }
    }

    pub fn from_audio(audio: AudioData, block_size: usize, looping: bool) -> Self {
        Self {
            path: None,
            frames: audio.frames,
            sample_rate: audio.sample_rate,
            block_size,
            cursor: 0,
            looping,
        }
    }

    pub fn silence(sample_rate: u32, block_size: usize) -> Self {
        let frames = vec![[0.0; CHANNELS]; sample_rate as usize * SILENCE_SECS];
        Self::from_audio(AudioData { frames, sample_rate }, block_size, true)
    }

    fn with_path(mut self, path: &Path) -> Self {
        self.path = Some(path.to_path_buf());
        self
    }
}

impl AudioSource for FileSource {
    fn start(&mut self) -> Result<(), SourceError> {
        self.cursor = 0;
        Ok(())
    }

    fn stop(&mut self) {}

    fn read_chunk(&mut self) -> SampleBlock {
        let total = self.frames.len();
        if total == 0 {
            return SampleBlock::silent(self.block_size);
        }

        let end = self.cursor + self.block_size;
        if end <= total {
            let block = SampleBlock::from_frames(self.frames[self.cursor..end].to_vec());
            self.cursor = end;
            return block;
        }

        let mut chunk = self.frames[self.cursor..].to_vec();
        if self.looping {
            // Wrap around, possibly several times for files shorter than a block
            while chunk.len() < self.block_size {
                let take = (self.block_size - chunk.len()).min(total);
                chunk.extend_from_slice(&self.frames[..take]);
                self.cursor = take;
            }
        } else {
            chunk.resize(self.block_size, [0.0; CHANNELS]);
            self.cursor = total;
        }
        SampleBlock::from_frames(chunk)
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn media_path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(len: usize) -> AudioData {
        AudioData {
            frames: (0..len).map(|i| [i as f32, -(i as f32)]).collect(),
            sample_rate: 48_000,
        }
    }

    #[test]
    fn reports_decoded_rate() {
        let audio = AudioData {
            frames: vec![[0.0; CHANNELS]; 8],
            sample_rate: 44_100,
        };
        assert_eq!(FileSource::from_audio(audio, 4, true).sample_rate(), 44_100);
        assert_eq!(FileSource::silence(32_000, 4).sample_rate(), 32_000);
    }

    #[test]
    fn reads_consecutive_blocks() {
        let mut source = FileSource::from_audio(ramp(10), 4, true);
        source.start().unwrap();
        assert_eq!(source.read_chunk().frames[0], [0.0, 0.0]);
        assert_eq!(source.read_chunk().frames[0], [4.0, -4.0]);
    }

    #[test]
    fn loops_at_end_of_file() {
        let mut source = FileSource::from_audio(ramp(6), 4, true);
        source.read_chunk();
        let wrapped = source.read_chunk();
        let left: Vec<f32> = wrapped.channel(0).collect();
        assert_eq!(left, vec![4.0, 5.0, 0.0, 1.0]);
        assert_eq!(source.read_chunk().frames[0], [2.0, -2.0]);
    }

    #[test]
    fn pads_with_zeros_without_loop() {
        let mut source = FileSource::from_audio(ramp(6), 4, false);
        source.read_chunk();
        let tail: Vec<f32> = source.read_chunk().channel(0).collect();
        assert_eq!(tail, vec![4.0, 5.0, 0.0, 0.0]);
        let after = source.read_chunk();
        assert_eq!(after.len(), 4);
        assert_eq!(after.peak(), 0.0);
    }

    #[test]
    fn file_shorter_than_block_still_fills_block() {
        let mut source = FileSource::from_audio(ramp(3), 8, true);
        let block = source.read_chunk();
        assert_eq!(block.len(), 8);
        let left: Vec<f32> = block.channel(0).collect();
        assert_eq!(left, vec![0.0, 1.0, 2.0, 0.0, 1.0, 2.0, 0.0, 1.0]);
    }

    #[test]
    fn missing_file_degrades_to_silence() {
        let mut source = FileSource::open(Path::new("/nonexistent/track.wav"), 48_000, 256, true);
        let block = source.read_chunk();
        assert_eq!(block.len(), 256);
        assert_eq!(block.peak(), 0.0);
        assert!(source.media_path().is_none());
    }
}
