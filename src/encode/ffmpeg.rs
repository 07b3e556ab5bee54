use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;
use std::process::{Child, Command, Stdio};

use crate::render::canvas::Canvas;

/// Output geometry and timing of a recording.
#[derive(Debug, Clone)]
pub struct RecordSettings {
    pub width: u32,
    pub height: u32,
    /// Frame rate as an ffmpeg rational, e.g. `48000/1024`
    pub framerate: String,
    pub codec: String,
    pub crf: u32,
}

impl RecordSettings {
    /// One video frame per audio block keeps a muxed soundtrack in sync.
    pub fn for_blocks(width: u32, height: u32, sample_rate: u32, block_size: usize) -> Self {
        Self {
            width,
            height,
            framerate: format!("{}/{}", sample_rate, block_size.max(1)),
            codec: "libx264".into(),
            crf: 18,
        }
    }
}

fn path_arg(path: &Path) -> Result<String> {
    path.to_str()
        .map(str::to_string)
        .with_context(|| format!("Path is not valid UTF-8: {}", path.display()))
}

pub fn ffmpeg_args(output: &Path, audio: Option<&Path>, settings: &RecordSettings) -> Result<Vec<String>> {
    let mut args = vec![
        "-y".to_string(),
        "-f".into(), "rawvideo".into(),
        "-pixel_format".into(), "rgba".into(),
        "-video_size".into(), format!("{}x{}", settings.width, settings.height),
        "-framerate".into(), settings.framerate.clone(),
        "-i".into(), "pipe:0".into(),
    ];
    if let Some(audio) = audio {
        args.extend(["-i".to_string(), path_arg(audio)?]);
    }

    args.extend([
        "-c:v".into(), settings.codec.clone(),
        "-pix_fmt".into(), "yuv420p".into(),
        "-crf".into(), settings.crf.to_string(),
        "-preset".into(), "medium".into(),
    ]);

    if audio.is_some() {
        args.extend([
            "-c:a".into(), "aac".into(),
            "-b:a".into(), "192k".into(),
            "-shortest".into(),
        ]);
    }
    args.push(path_arg(output)?);
    Ok(args)
}

/// Pipes presented frames into an ffmpeg child process.
pub struct FfmpegRecorder {
    child: Child,
    width: u32,
    height: u32,
    frames: u64,
}

impl FfmpegRecorder {
    pub fn start(output: &Path, audio: Option<&Path>, settings: &RecordSettings) -> Result<Self> {
        let args = ffmpeg_args(output, audio, settings)?;

        let child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .context("Failed to spawn ffmpeg. Is ffmpeg installed?")?;

        log::info!(
            "Recording to {}: {}x{} @ {} fps, codec={}",
            output.display(),
            settings.width,
            settings.height,
            settings.framerate,
            settings.codec
        );
        if let Some(audio) = audio {
            log::info!("Muxing audio from {}", audio.display());
        }

        Ok(Self {
            child,
            width: settings.width,
            height: settings.height,
            frames: 0,
        })
    }

    pub fn write_frame(&mut self, canvas: &Canvas) -> Result<()> {
        if canvas.width() != self.width || canvas.height() != self.height {
            anyhow::bail!(
                "Frame is {}x{}, recording expects {}x{}",
                canvas.width(),
                canvas.height(),
                self.width,
                self.height
            );
        }
        let stdin = self.child.stdin.as_mut().context("FFmpeg stdin not available")?;
        stdin
            .write_all(canvas.as_bytes())
            .context("Failed to write frame to ffmpeg")?;
        self.frames += 1;
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        // Close stdin to signal EOF
        drop(self.child.stdin.take());

        let output = self.child.wait_with_output().context("Failed to wait for ffmpeg")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("FFmpeg exited with error:\n{}", stderr);
        }

        log::info!("Recording complete: {} frames", self.frames);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn settings() -> RecordSettings {
        RecordSettings::for_blocks(800, 480, 48_000, 1024)
    }

    #[test]
    fn framerate_follows_audio_blocks() {
        assert_eq!(settings().framerate, "48000/1024");
    }

    #[test]
    fn video_only_without_audio() {
        let args = ffmpeg_args(&PathBuf::from("out.mp4"), None, &settings()).unwrap();
        assert_eq!(args.iter().filter(|a| *a == "-i").count(), 1);
        assert!(!args.iter().any(|a| a == "-c:a" || a == "-shortest"));
        assert!(args.contains(&"800x480".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("out.mp4"));
    }

    #[test]
    fn muxes_file_audio() {
        let audio = PathBuf::from("song.flac");
        let args = ffmpeg_args(&PathBuf::from("out.mp4"), Some(audio.as_path()), &settings()).unwrap();
        let inputs: Vec<&str> = args
            .iter()
            .zip(args.iter().skip(1))
            .filter(|(flag, _)| *flag == "-i")
            .map(|(_, value)| value.as_str())
            .collect();
        assert_eq!(inputs, vec!["pipe:0", "song.flac"]);
        assert!(args.contains(&"-shortest".to_string()));
    }
}
