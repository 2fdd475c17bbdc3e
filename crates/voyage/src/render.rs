//! MIDI to waveform rendering.
//!
//! [`Renderer`] is the seam the pipeline talks to. The default backend shells
//! out to fluidsynth; [`RustySynthRenderer`] does the same job in-process.

use crate::audio::RenderedAudio;
use crate::tool::{self, ToolError};
use rustysynth::{MidiFile, MidiFileSequencer, SoundFont, Synthesizer, SynthesizerSettings};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("synthesizer produced no output at {}", .0.display())]
    MissingOutput(PathBuf),

    #[error("failed to read rendered audio: {0}")]
    Decode(#[from] hound::Error),

    #[error("failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("synthesis failed: {0}")]
    Synth(String),
}

/// Turns a MIDI file into audio using a sound font.
pub trait Renderer {
    fn render(&self, midi: &Path, font: &Path) -> Result<RenderedAudio, RenderError>;
}

impl<T: Renderer + ?Sized> Renderer for Box<T> {
    fn render(&self, midi: &Path, font: &Path) -> Result<RenderedAudio, RenderError> {
        (**self).render(midi, font)
    }
}

/// Renders by running `fluidsynth -ni -F OUT -r RATE FONT MIDI`.
#[derive(Debug, Clone)]
pub struct FluidSynthRenderer {
    program: String,
    sample_rate: u32,
}

impl FluidSynthRenderer {
    pub fn new(program: impl Into<String>, sample_rate: u32) -> Self {
        Self {
            program: program.into(),
            sample_rate,
        }
    }

    fn command(&self, midi: &Path, font: &Path, wav: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-ni")
            .arg("-F")
            .arg(wav)
            .arg("-r")
            .arg(self.sample_rate.to_string())
            .arg(font)
            .arg(midi);
        cmd
    }
}

impl Renderer for FluidSynthRenderer {
    fn render(&self, midi: &Path, font: &Path) -> Result<RenderedAudio, RenderError> {
        // The raw waveform lives only as long as this directory.
        let scratch = tempfile::Builder::new()
            .prefix("voyage-render")
            .tempdir()
            .map_err(|source| RenderError::Open {
                path: std::env::temp_dir(),
                source,
            })?;
        let wav = scratch.path().join("render.wav");

        tool::run(&mut self.command(midi, font, &wav))?;

        if !wav.exists() {
            return Err(RenderError::MissingOutput(wav));
        }

        let audio = RenderedAudio::read_wav(&wav)?;
        tracing::info!(
            frames = audio.frames(),
            sample_rate = audio.sample_rate,
            bits = audio.bits_per_sample,
            channels = audio.channels,
            "fluidsynth render complete"
        );
        Ok(audio)
    }
}

/// In-process wavetable synthesis with rustysynth.
#[derive(Debug, Clone)]
pub struct RustySynthRenderer {
    sample_rate: u32,
    /// Seconds rendered past the last MIDI event so releases can ring out.
    /// Zero keeps the waveform exactly as long as the MIDI file.
    tail_secs: f64,
}

impl RustySynthRenderer {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            tail_secs: 0.0,
        }
    }

    pub fn with_tail(mut self, tail_secs: f64) -> Self {
        self.tail_secs = tail_secs.max(0.0);
        self
    }
}

/// Frames needed to hold `seconds` of audio at `sample_rate`.
fn frame_count(seconds: f64, sample_rate: u32) -> usize {
    (f64::from(sample_rate) * seconds).round() as usize
}

fn open(path: &Path) -> Result<BufReader<File>, RenderError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| RenderError::Open {
            path: path.to_path_buf(),
            source,
        })
}

impl Renderer for RustySynthRenderer {
    fn render(&self, midi: &Path, font: &Path) -> Result<RenderedAudio, RenderError> {
        let sound_font = Arc::new(
            SoundFont::new(&mut open(font)?)
                .map_err(|e| RenderError::Synth(format!("failed to load SoundFont: {:?}", e)))?,
        );
        let midi_file = Arc::new(
            MidiFile::new(&mut open(midi)?)
                .map_err(|e| RenderError::Synth(format!("failed to parse MIDI file: {:?}", e)))?,
        );

        let settings = SynthesizerSettings::new(self.sample_rate as i32);
        let synthesizer = Synthesizer::new(&sound_font, &settings)
            .map_err(|e| RenderError::Synth(format!("failed to create synthesizer: {:?}", e)))?;

        let mut sequencer = MidiFileSequencer::new(synthesizer);
        sequencer.play(&midi_file, false);

        let total_time = midi_file.get_length() + self.tail_secs;
        let sample_count = frame_count(total_time, self.sample_rate);

        let mut left = vec![0f32; sample_count];
        let mut right = vec![0f32; sample_count];
        sequencer.render(&mut left[..], &mut right[..]);

        tracing::info!(
            frames = sample_count,
            seconds = total_time,
            "rustysynth render complete"
        );
        Ok(RenderedAudio::from_stereo_f32(&left, &right, self.sample_rate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::describe;

    #[test]
    fn fluidsynth_command_line() {
        let renderer = FluidSynthRenderer::new("fluidsynth", 44_100);
        let cmd = renderer.command(
            Path::new("song.aux.mid"),
            Path::new("/sf2/FluidR3_GM.sf2"),
            Path::new("/tmp/x/render.wav"),
        );
        assert_eq!(
            describe(&cmd),
            "fluidsynth -ni -F /tmp/x/render.wav -r 44100 /sf2/FluidR3_GM.sf2 song.aux.mid"
        );
    }

    #[test]
    fn missing_fluidsynth_is_a_render_error() {
        let renderer = FluidSynthRenderer::new("voyage-no-such-fluidsynth", 44_100);
        let err = renderer
            .render(Path::new("in.mid"), Path::new("font.sf2"))
            .unwrap_err();
        assert!(matches!(err, RenderError::Tool(ToolError::Spawn { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn tool_that_writes_nothing_is_missing_output() {
        let renderer = FluidSynthRenderer::new("true", 44_100);
        let err = renderer
            .render(Path::new("in.mid"), Path::new("font.sf2"))
            .unwrap_err();
        assert!(matches!(err, RenderError::MissingOutput(_)), "got {:?}", err);
    }

    #[cfg(unix)]
    #[test]
    fn failing_tool_is_a_render_error() {
        let renderer = FluidSynthRenderer::new("false", 44_100);
        let err = renderer
            .render(Path::new("in.mid"), Path::new("font.sf2"))
            .unwrap_err();
        assert!(matches!(err, RenderError::Tool(ToolError::Failed { .. })));
    }

    #[test]
    fn rustysynth_renders_without_tail_by_default() {
        let renderer = RustySynthRenderer::new(44_100);
        assert_eq!(renderer.tail_secs, 0.0);
        assert_eq!(renderer.with_tail(-1.0).tail_secs, 0.0);
    }

    #[test]
    fn frame_count_matches_duration() {
        assert_eq!(frame_count(0.5, 44_100), 22_050);
        assert_eq!(frame_count(0.0, 44_100), 0);
        assert_eq!(frame_count(2.5, 44_100), 110_250);
    }

    #[test]
    fn rustysynth_reports_unreadable_font() {
        let err = RustySynthRenderer::new(44_100)
            .render(Path::new("in.mid"), Path::new("/no/such/font.sf2"))
            .unwrap_err();
        assert!(matches!(err, RenderError::Open { .. }));
    }
}
