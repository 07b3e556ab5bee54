use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample, StreamConfig};
use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use super::{front_pair, AudioSource, SampleBlock, SourceError, CHANNELS};

/// Blocks of headroom the capture ring holds before dropping old frames.
const RING_BLOCKS: usize = 8;
const OVERFLOW_WARN_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct InputDeviceInfo {
    pub index: usize,
    pub name: String,
    pub max_channels: u16,
    pub default_sample_rate: Option<u32>,
}

/// Frames written by the device callback and drained by `read_chunk`.
struct CaptureRing {
    frames: VecDeque<[f32; CHANNELS]>,
    capacity: usize,
    overflowed: bool,
}

impl CaptureRing {
    fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            frames: VecDeque::with_capacity(capacity),
            capacity,
            overflowed: false,
        }
    }

    fn push_interleaved<T>(&mut self, data: &[T], channels: usize)
    where
        T: Sample,
        f32: FromSample<T>,
    {
        for frame in data.chunks_exact(channels) {
            let [left, right] = front_pair(frame).map(f32::from_sample);
            if self.frames.len() == self.capacity {
                self.frames.pop_front();
                self.overflowed = true;
            }
            self.frames.push_back([left, right]);
        }
    }
}

type SharedRing = Arc<(Mutex<CaptureRing>, Condvar)>;

/// Captures from an input device; `read_chunk` blocks until a full block
/// has arrived.
pub struct LiveSource {
    device_query: Option<String>,
    sample_rate: u32,
    block_size: usize,
    ring: SharedRing,
    stream: Option<cpal::Stream>,
    last_overflow_warning: Option<Instant>,
    starved_warned: bool,
}

impl LiveSource {
    pub fn new(device_query: Option<String>, sample_rate: u32, block_size: usize) -> Self {
        let ring = Arc::new((
            Mutex::new(CaptureRing::new(block_size * RING_BLOCKS)),
            Condvar::new(),
        ));
        Self {
            device_query,
            sample_rate,
            block_size,
            ring,
            stream: None,
            last_overflow_warning: None,
            starved_warned: false,
        }
    }

    fn read_timeout(&self) -> Duration {
        let block_secs = self.block_size as f64 / self.sample_rate.max(1) as f64;
        Duration::from_secs_f64(block_secs * 4.0)
    }

    /// Open the capture stream and return it with the rate it runs at.
    fn open_stream(&self) -> Result<(cpal::Stream, u32), SourceError> {
        let host = cpal::default_host();
        let device = find_input_device(&host, self.device_query.as_deref())?;
        let supported = device.default_input_config()?;
        let format = supported.sample_format();

        log::info!("Starting live audio capture...");
        log::info!(
            "  Device: {}",
            device.name().unwrap_or_else(|_| "Unknown".to_string())
        );
        log::info!("  Sample rate: {} Hz", self.sample_rate);
        log::info!("  Channels: {}", supported.channels());
        log::info!("  Block size: {}", self.block_size);

        let requested = StreamConfig {
            channels: supported.channels(),
            sample_rate: cpal::SampleRate(self.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        match build_stream_for(&device, &requested, format, Arc::clone(&self.ring)) {
            Ok(stream) => Ok((stream, self.sample_rate)),
            Err(err) => {
                let fallback: StreamConfig = supported.config();
                log::warn!(
                    "Device rejected {} Hz ({}); capturing at its default {} Hz",
                    self.sample_rate,
                    err,
                    fallback.sample_rate.0
                );
                let stream = build_stream_for(&device, &fallback, format, Arc::clone(&self.ring))?;
                Ok((stream, fallback.sample_rate.0))
            }
        }
    }
}

impl AudioSource for LiveSource {
    fn start(&mut self) -> Result<(), SourceError> {
        let (stream, rate) = self.open_stream()?;
        stream.play()?;
        log::info!("Live audio stream started at {} Hz", rate);
        self.sample_rate = rate;
        self.stream = Some(stream);
        Ok(())
    }

    fn stop(&mut self) {
        if self.stream.take().is_some() {
            log::info!("Audio stream stopped");
        }
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn read_chunk(&mut self) -> SampleBlock {
        if self.stream.is_none() {
            return SampleBlock::silent(self.block_size);
        }

        let timeout = self.read_timeout();
        let (lock, ready) = &*self.ring;
        let guard = match lock.lock() {
            Ok(guard) => guard,
            Err(_) => {
                log::warn!("Capture buffer poisoned; returning silence");
                return SampleBlock::silent(self.block_size);
            }
        };
        let block_size = self.block_size;
        let (mut ring, wait) = match ready
            .wait_timeout_while(guard, timeout, |ring| ring.frames.len() < block_size)
        {
            Ok(result) => result,
            Err(_) => return SampleBlock::silent(self.block_size),
        };

        if wait.timed_out() && ring.frames.len() < block_size {
            if !self.starved_warned {
                log::warn!("Audio input stalled; substituting silence");
                self.starved_warned = true;
            }
            return SampleBlock::silent(self.block_size);
        }
        self.starved_warned = false;

        if ring.overflowed {
            ring.overflowed = false;
            let due = self
                .last_overflow_warning
                .map_or(true, |t| t.elapsed() >= OVERFLOW_WARN_INTERVAL);
            if due {
                log::warn!("Audio buffer overflow detected!");
                self.last_overflow_warning = Some(Instant::now());
            }
        }

        let frames: Vec<[f32; CHANNELS]> = ring.frames.drain(..block_size).collect();
        SampleBlock::from_frames(frames)
    }
}

fn build_stream_for(
    device: &cpal::Device,
    config: &StreamConfig,
    format: SampleFormat,
    ring: SharedRing,
) -> Result<cpal::Stream, SourceError> {
    match format {
        SampleFormat::F32 => build_stream::<f32>(device, config, ring),
        SampleFormat::I16 => build_stream::<i16>(device, config, ring),
        SampleFormat::U16 => build_stream::<u16>(device, config, ring),
        SampleFormat::I32 => build_stream::<i32>(device, config, ring),
        other => Err(SourceError::UnsupportedFormat(other)),
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    ring: SharedRing,
) -> Result<cpal::Stream, SourceError>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let channels = config.channels.max(1) as usize;
    let stream = device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            let (lock, ready) = &*ring;
            if let Ok(mut ring) = lock.lock() {
                ring.push_interleaved(data, channels);
            }
            ready.notify_one();
        },
        |err| log::warn!("Audio stream error: {}", err),
        None,
    )?;
    Ok(stream)
}

/// Resolve a device by numeric index into the input list, or by name
/// substring; `None` selects the host default.
fn find_input_device(host: &cpal::Host, query: Option<&str>) -> Result<cpal::Device, SourceError> {
    let Some(query) = query else {
        return host.default_input_device().ok_or(SourceError::NoDefaultDevice);
    };

    let devices: Vec<cpal::Device> = host.input_devices()?.collect();
    if let Ok(index) = query.parse::<usize>() {
        if let Some(device) = devices.get(index) {
            return Ok(device.clone());
        }
    }
    let needle = query.to_lowercase();
    devices
        .into_iter()
        .find(|d| d.name().map_or(false, |n| n.to_lowercase().contains(&needle)))
        .ok_or_else(|| SourceError::DeviceNotFound(query.to_string()))
}

pub fn list_input_devices() -> Result<Vec<InputDeviceInfo>, SourceError> {
    let host = cpal::default_host();
    let mut infos = Vec::new();
    for (index, device) in host.input_devices()?.enumerate() {
        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        let default = device.default_input_config().ok();
        infos.push(InputDeviceInfo {
            index,
            name,
            max_channels: default.as_ref().map_or(0, |c| c.channels()),
            default_sample_rate: default.map(|c| c.sample_rate().0),
        });
    }
    Ok(infos)
}
