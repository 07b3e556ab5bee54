use anyhow::{Context, Result};
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::{SampleBlock, CHANNELS};

/// Decoded stereo audio, one `[left, right]` pair per frame.
pub struct AudioData {
    pub frames: Vec<[f32; CHANNELS]>,
    pub sample_rate: u32,
}

impl AudioData {
    pub fn duration_secs(&self) -> f32 {
        self.frames.len() as f32 / self.sample_rate.max(1) as f32
    }
}

pub fn decode_audio(path: &Path) -> Result<AudioData> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open audio file: {}", path.display()))?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .context("Failed to detect audio format")?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .context("No audio tracks found")?;

    let track_id = track.id;
    let channels = track.codec_params.channels.map_or(1, |c| c.count());
    let sample_rate = track.codec_params.sample_rate.context("Unknown sample rate")?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .context("Failed to create audio decoder")?;

    let mut frames: Vec<[f32; CHANNELS]> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(symphonia::core::errors::Error::DecodeError(_)) => continue,
            Err(e) => return Err(e.into()),
        };

        let signal_spec = *decoded.spec();
        let num_frames = decoded.frames();

        let mut sample_buf = SampleBuffer::<f32>::new(num_frames as u64, signal_spec);
        sample_buf.copy_interleaved_ref(decoded);

        frames.extend(SampleBlock::from_interleaved(sample_buf.samples(), channels).frames);
    }

    log::info!(
        "Decoded audio: {} frames, {} channel(s), {}Hz, {:.1}s",
        frames.len(),
        channels,
        sample_rate,
        frames.len() as f32 / sample_rate as f32
    );

    Ok(AudioData { frames, sample_rate })
}

/// Input frames handed to the resampler per call.
const RESAMPLE_CHUNK: usize = 4096;

fn deinterleave(frames: &[[f32; CHANNELS]]) -> Vec<Vec<f32>> {
    (0..CHANNELS)
        .map(|ch| frames.iter().map(|f| f[ch]).collect())
        .collect()
}

fn append_planar(output: &mut Vec<[f32; CHANNELS]>, planar: &[Vec<f32>]) {
    let len = planar.iter().map(Vec::len).min().unwrap_or(0);
    output.extend((0..len).map(|i| [planar[0][i], planar[1][i]]));
}

/// Resample stereo audio to `to_rate` using rubato's sinc interpolator.
/// Works through the file in fixed chunks, flushes the filter tail and
/// trims the filter delay, so the output lines up with the input.
pub fn resample(audio: AudioData, to_rate: u32) -> Result<AudioData> {
    use rubato::{Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction};

    if audio.sample_rate == to_rate || audio.frames.is_empty() {
        return Ok(AudioData {
            frames: audio.frames,
            sample_rate: to_rate,
        });
    }

    log::info!("Resampling from {} to {} Hz...", audio.sample_rate, to_rate);

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let ratio = to_rate as f64 / audio.sample_rate as f64;
    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, RESAMPLE_CHUNK, CHANNELS)
        .context("Failed to create resampler")?;

    let delay = resampler.output_delay();
    let expected = (audio.frames.len() as f64 * ratio).round() as usize;
    let mut output: Vec<[f32; CHANNELS]> = Vec::with_capacity(expected + delay);

    let mut chunks = audio.frames.chunks_exact(RESAMPLE_CHUNK);
    for chunk in &mut chunks {
        let planar = resampler
            .process(&deinterleave(chunk)[..], None)
            .context("Resampling failed")?;
        append_planar(&mut output, &planar);
    }
    let rest = chunks.remainder();
    if !rest.is_empty() {
        let input = deinterleave(rest);
        let planar = resampler
            .process_partial(Some(input.as_slice()), None)
            .context("Resampling failed")?;
        append_planar(&mut output, &planar);
    }

    // Drain the filter until the delayed tail is out
    while output.len() < expected + delay {
        let planar = resampler
            .process_partial(None::<&[Vec<f32>]>, None)
            .context("Resampling flush failed")?;
        if planar.first().map_or(true, Vec::is_empty) {
            break;
        }
        append_planar(&mut output, &planar);
    }

    let frames: Vec<[f32; CHANNELS]> = output.into_iter().skip(delay).take(expected).collect();
    log::debug!("Resampled {} frames to {} (delay {})", audio.frames.len(), frames.len(), delay);

    Ok(AudioData {
        frames,
        sample_rate: to_rate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant(value: f32, frames: usize, sample_rate: u32) -> AudioData {
        AudioData {
            frames: vec![[value, -value]; frames],
            sample_rate,
        }
    }

    #[test]
    fn same_rate_passes_through() {
        let out = resample(constant(0.5, 100, 48_000), 48_000).unwrap();
        assert_eq!(out.frames.len(), 100);
        assert_eq!(out.sample_rate, 48_000);
    }

    #[test]
    fn upsampling_keeps_duration_and_tail() {
        let out = resample(constant(0.5, 44_100, 44_100), 48_000).unwrap();
        assert_eq!(out.sample_rate, 48_000);
        assert!((out.frames.len() as i64 - 48_000).abs() <= 2);
        assert!((out.duration_secs() - 1.0).abs() < 1e-3);

        // Past the filter edge the level settles without a leading gap
        let early = out.frames[200];
        assert!((early[0] - 0.5).abs() < 0.02, "early {:?}", early);
        assert!((early[1] + 0.5).abs() < 0.02);
        // The last chunk was flushed rather than dropped
        let late = out.frames[out.frames.len() - 200];
        assert!((late[0] - 0.5).abs() < 0.02, "late {:?}", late);
    }

    #[test]
    fn short_input_shorter_than_one_chunk() {
        let out = resample(constant(0.25, 1000, 22_050), 44_100).unwrap();
        assert!((out.frames.len() as i64 - 2000).abs() <= 2);
        assert!((out.frames[1000][0] - 0.25).abs() < 0.02);
    }
}
