//! MP3 export with ID3 tags via ffmpeg.

use crate::audio::RenderedAudio;
use crate::tool::{self, ToolError};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("cannot write to {}: destination directory does not exist", .0.display())]
    Destination(PathBuf),

    #[error("failed to stage waveform for encoding: {0}")]
    Stage(#[from] std::io::Error),

    #[error("failed to write staging WAV: {0}")]
    Wav(#[from] hound::Error),

    #[error(transparent)]
    Tool(#[from] ToolError),
}

/// Metadata attached to the exported file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tags {
    pub title: String,
    pub artist: String,
    pub genre: Option<String>,
}

impl Tags {
    /// Tags for a rendering of `input`: the title is the file stem.
    pub fn for_input(input: &Path, artist: impl Into<String>, genre: Option<String>) -> Self {
        let title = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unknown".to_string());
        Self {
            title,
            artist: artist.into(),
            genre,
        }
    }
}

/// Writes a processed waveform to its final, compressed form.
pub trait Encoder {
    fn encode(&self, audio: &RenderedAudio, dest: &Path, tags: &Tags) -> Result<(), ExportError>;
}

/// Encodes through `ffmpeg` with libmp3lame.
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    program: String,
    bitrate: String,
}

impl FfmpegEncoder {
    pub fn new(program: impl Into<String>, bitrate: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            bitrate: bitrate.into(),
        }
    }

    fn command(&self, wav: &Path, dest: &Path, tags: &Tags) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(["-y", "-loglevel", "error", "-i"])
            .arg(wav)
            .args(["-codec:a", "libmp3lame", "-b:a"])
            .arg(&self.bitrate)
            .args(metadata_args(tags))
            .arg(dest);
        cmd
    }
}

fn metadata_args(tags: &Tags) -> Vec<OsString> {
    let mut args = Vec::new();
    let mut push = |key: &str, value: &str| {
        args.push(OsString::from("-metadata"));
        args.push(OsString::from(format!("{}={}", key, value)));
    };
    push("title", &tags.title);
    push("artist", &tags.artist);
    if let Some(genre) = &tags.genre {
        push("genre", genre);
    }
    args
}

/// Fail early if the destination's directory is missing.
fn check_destination(dest: &Path) -> Result<(), ExportError> {
    let dir = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    if !dir.is_dir() {
        return Err(ExportError::Destination(dest.to_path_buf()));
    }
    Ok(())
}

impl Encoder for FfmpegEncoder {
    fn encode(&self, audio: &RenderedAudio, dest: &Path, tags: &Tags) -> Result<(), ExportError> {
        check_destination(dest)?;

        let staged = tempfile::Builder::new()
            .prefix("voyage-export")
            .suffix(".wav")
            .tempfile()?;
        audio.write_wav(staged.path())?;

        tool::run(&mut self.command(staged.path(), dest, tags))?;

        tracing::info!(
            dest = %dest.display(),
            title = %tags.title,
            artist = %tags.artist,
            "exported"
        );
        Ok(())
    }
}
