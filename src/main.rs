mod app;
mod audio;
mod cli;
mod config;
mod encode;
mod render;
mod ui;
mod viz;

use anyhow::Result;
use clap::Parser;
use std::time::Duration;

use app::{FrameLoop, RunLimits};
use audio::analysis::SpectralAnalyzer;
use audio::file_source::FileSource;
use audio::live_source::{list_input_devices, LiveSource};
use audio::AudioSource;
use cli::Cli;
use config::Config;
use encode::ffmpeg::{FfmpegRecorder, RecordSettings};
use render::canvas::Canvas;
use render::display::{Display, HeadlessDisplay};
use render::text::TextOverlay;
use render::window::WindowDisplay;
use ui::Controls;
use viz::normalize::Scale;
use viz::{Engine, Mode};

const LABEL_FONT_SIZE: f32 = 18.0;

fn print_devices() {
    match list_input_devices() {
        Ok(devices) if devices.is_empty() => println!("No input devices found"),
        Ok(devices) => {
            println!("Available input devices:");
            for d in &devices {
                let rate = d
                    .default_sample_rate
                    .map_or_else(|| "?".to_string(), |r| r.to_string());
                println!("  [{}] {} ({} ch, {} Hz)", d.index, d.name, d.max_channels, rate);
            }
        }
        Err(err) => log::error!("Could not list input devices: {}", err),
    }
}

fn load_config(cli: &Cli) -> Config {
    let mut config = match config::discover_config(cli.config.as_deref()) {
        Some(path) => match config::load_config(&path) {
            Some(cfg) => {
                log::info!("Loaded config from {}", path.display());
                cfg
            }
            None => {
                log::warn!("Failed to load config from {}, using defaults", path.display());
                Config::default()
            }
        },
        None => Config::default(),
    };
    cli.apply_to(&mut config);
    config.validate();
    config
}

fn build_engine(cli: &Cli, config: &Config) -> Engine {
    let mut engine = Engine::new(config);
    if let Some(name) = cli.mode.as_deref() {
        match Mode::parse(name) {
            Some(mode) => engine.set_mode(mode),
            None => log::warn!("Unknown mode '{}', starting with {}", name, engine.mode().name()),
        }
    }
    if let Some(text) = cli.scale.as_deref() {
        match Scale::parse(text) {
            Some(scale) => engine.set_scale(scale),
            None => log::warn!("Unknown scale '{}', using automatic", text),
        }
    }
    engine
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    if cli.list_modes {
        println!("Available modes:");
        for mode in Mode::ALL {
            println!("  {:<14} {}", mode.slug(), mode.name());
        }
        return Ok(());
    }
    if cli.list_devices {
        print_devices();
        return Ok(());
    }

    let config = load_config(&cli);
    let audio_cfg = &config.audio;

    log::info!("spectrascope - real-time audio visualizer");
    log::info!(
        "Display: {}x{} @ {}fps{}",
        config.display.width,
        config.display.height,
        config.display.fps,
        if config.display.fullscreen { " (fullscreen)" } else { "" }
    );
    log::info!(
        "Analysis: {} Hz, block {}, FFT {}",
        audio_cfg.sample_rate,
        audio_cfg.block_size,
        config.analysis.fft_size
    );

    // 1. Audio source
    let mut source: Box<dyn AudioSource> = if cli.live {
        Box::new(LiveSource::new(
            audio_cfg.device.clone(),
            audio_cfg.sample_rate,
            audio_cfg.block_size,
        ))
    } else if let Some(path) = cli.file.as_deref() {
        Box::new(FileSource::open(
            path,
            audio_cfg.sample_rate,
            audio_cfg.block_size,
            audio_cfg.loop_playback,
        ))
    } else {
        log::warn!("No --file or --live given; visualizing silence");
        Box::new(FileSource::silence(audio_cfg.sample_rate, audio_cfg.block_size))
    };

    if let Err(err) = source.start() {
        log::error!("Failed to start audio input: {}", err);
        print_devices();
        std::process::exit(1);
    }

    // Live devices may settle on a different rate than requested
    let sample_rate = source.sample_rate();
    if sample_rate != audio_cfg.sample_rate {
        log::info!("Analyzing at the source rate of {} Hz", sample_rate);
    }

    // 2. Analysis, visuals and controls
    let mut analyzer = SpectralAnalyzer::new(config.analysis.fft_size, sample_rate);
    let mut engine = build_engine(&cli, &config);
    log::info!("Mode: {}, scale: {}", engine.mode().name(), engine.scale().label());

    let text = TextOverlay::load(config.display.font.as_deref(), LABEL_FONT_SIZE);
    let mut controls = Controls::new(&config, &engine, text, fastrand::Rng::new());
    let mut canvas = Canvas::new(config.display.width, config.display.height);

    // 3. Output
    let mut display: Box<dyn Display> = if cli.headless {
        log::info!("Running headless");
        Box::new(HeadlessDisplay::new())
    } else {
        Box::new(WindowDisplay::new(&config.display)?)
    };

    let mut recorder = match cli.record.as_deref() {
        Some(output) => {
            let settings = RecordSettings::for_blocks(
                config.display.width,
                config.display.height,
                sample_rate,
                audio_cfg.block_size,
            );
            Some(FfmpegRecorder::start(output, source.media_path(), &settings)?)
        }
        None => None,
    };

    // Headless recording has nothing to keep in step with
    let frame_budget = if cli.headless && recorder.is_some() {
        None
    } else {
        Some(Duration::from_secs_f32(config.frame_dt()))
    };
    let limits = RunLimits {
        max_frames: cli.frames,
        frame_budget,
    };

    // 4. Frame loop
    let result = app::run(
        FrameLoop {
            source: source.as_mut(),
            analyzer: &mut analyzer,
            engine: &mut engine,
            controls: &mut controls,
            display: display.as_mut(),
            recorder: recorder.as_mut(),
            canvas: &mut canvas,
        },
        &limits,
    );

    if let Some(recorder) = recorder {
        recorder.finish()?;
    }
    result?;

    log::info!("Goodbye");
    Ok(())
}
