use clap::Parser;
use std::path::PathBuf;

use crate::config::Config;

#[derive(Parser, Debug)]
#[command(name = "spectrascope", about = "Real-time audio visualizer")]
pub struct Cli {
    /// Audio file to visualize (WAV, MP3, FLAC, OGG)
    #[arg(short, long, conflicts_with = "live")]
    pub file: Option<PathBuf>,

    /// Capture from an input device instead of a file
    #[arg(long)]
    pub live: bool,

    /// Input device name (substring) or index, used with --live
    #[arg(short, long)]
    pub device: Option<String>,

    /// Initial visualization mode (see --list-modes)
    #[arg(short, long)]
    pub mode: Option<String>,

    /// Initial scale: auto, 0.5x, 1x, 2x, 5x or 10x
    #[arg(short, long)]
    pub scale: Option<String>,

    /// Frames per second
    #[arg(long)]
    pub fps: Option<u32>,

    /// Display width in pixels
    #[arg(long)]
    pub width: Option<u32>,

    /// Display height in pixels
    #[arg(long)]
    pub height: Option<u32>,

    #[arg(long)]
    pub fullscreen: bool,

    /// Zero-pad at the end of the file instead of looping
    #[arg(long)]
    pub no_loop: bool,

    /// Run without a window
    #[arg(long)]
    pub headless: bool,

    /// Stop after this many frames
    #[arg(long)]
    pub frames: Option<u64>,

    /// Record the rendered frames to a video file through ffmpeg
    #[arg(short, long)]
    pub record: Option<PathBuf>,

    /// Config file (defaults to spectrascope.toml or the user config dir)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// List available input devices and exit
    #[arg(long)]
    pub list_devices: bool,

    /// List visualization modes and exit
    #[arg(long)]
    pub list_modes: bool,
}

impl Cli {
    /// Explicit flags override values loaded from the config file.
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(fps) = self.fps {
            config.display.fps = fps;
        }
        if let Some(width) = self.width {
            config.display.width = width;
        }
        if let Some(height) = self.height {
            config.display.height = height;
        }
        if self.fullscreen {
            config.display.fullscreen = true;
        }
        if self.no_loop {
            config.audio.loop_playback = false;
        }
        if self.device.is_some() {
            config.audio.device = self.device.clone();
        }
    }
}
