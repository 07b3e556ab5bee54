use anyhow::Result;
use std::time::{Duration, Instant};

use crate::audio::analysis::{peak_bin, SpectralAnalyzer};
use crate::audio::AudioSource;
use crate::encode::ffmpeg::FfmpegRecorder;
use crate::render::canvas::Canvas;
use crate::render::display::Display;
use crate::ui::Controls;
use crate::viz::Engine;

#[derive(Debug, Clone)]
pub struct RunLimits {
    /// Stop after this many ticks
    pub max_frames: Option<u64>,
    /// Target tick length; `None` runs as fast as the source allows
    pub frame_budget: Option<Duration>,
}

/// Everything one tick mutates, owned for the duration of the loop.
pub struct FrameLoop<'a> {
    pub source: &'a mut dyn AudioSource,
    pub analyzer: &'a mut SpectralAnalyzer,
    pub engine: &'a mut Engine,
    pub controls: &'a mut Controls,
    pub display: &'a mut dyn Display,
    pub recorder: Option<&'a mut FfmpegRecorder>,
    pub canvas: &'a mut Canvas,
}

/// Run ticks until quit or the frame limit. The source is stopped on every
/// exit path. Returns the number of ticks completed.
pub fn run(mut frame_loop: FrameLoop, limits: &RunLimits) -> Result<u64> {
    let result = tick_until_done(&mut frame_loop, limits);
    frame_loop.source.stop();
    result
}

fn tick_until_done(frame_loop: &mut FrameLoop, limits: &RunLimits) -> Result<u64> {
    let mut frames = 0u64;
    while !frame_loop.controls.quit_requested() {
        if limits.max_frames.is_some_and(|max| frames >= max) {
            log::info!("Frame limit reached");
            break;
        }
        let started = Instant::now();
        tick(frame_loop)?;
        frames += 1;

        if let Some(budget) = limits.frame_budget {
            let elapsed = started.elapsed();
            if elapsed < budget {
                std::thread::sleep(budget - elapsed);
            } else {
                log::trace!("Tick {} over budget by {:?}", frames, elapsed - budget);
            }
        }
    }
    log::info!("Stopped after {} frames", frames);
    Ok(frames)
}

fn tick(frame_loop: &mut FrameLoop) -> Result<()> {
    let block = frame_loop.source.read_chunk();
    let (spectrum, phase) = frame_loop.analyzer.process(&block);
    if log::log_enabled!(log::Level::Trace) {
        if let Some(bin) = peak_bin(spectrum.channel(0)) {
            log::trace!("Peak {:.1} Hz", frame_loop.analyzer.bin_frequency(bin));
        }
    }

    frame_loop
        .engine
        .render(&block, &spectrum, &phase, &mut *frame_loop.canvas);
    frame_loop.controls.draw(frame_loop.canvas);

    frame_loop.display.present(frame_loop.canvas)?;
    if let Some(recorder) = frame_loop.recorder.as_deref_mut() {
        recorder.write_frame(frame_loop.canvas)?;
    }

    for event in frame_loop.display.poll_events() {
        frame_loop.controls.handle(event, frame_loop.engine);
    }

    let block_secs = block.len() as f32 / frame_loop.source.sample_rate().max(1) as f32;
    frame_loop
        .controls
        .tick(block_secs, block.peak(), frame_loop.engine);
    Ok(())
}
