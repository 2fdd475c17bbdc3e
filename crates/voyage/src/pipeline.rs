//! Rewrite → render → post-process → export, one stage after another.

use crate::audio;
use crate::error::PipelineError;
use crate::export::{Encoder, Tags};
use crate::render::Renderer;
use crate::reverb::ReverbParams;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{info, warn};
use voyage_midi::{InsertionPolicy, RewriteReport};
use voyageconf::ConfigError;

/// Everything needed to convert one MIDI file.
#[derive(Debug, Clone)]
pub struct Conversion {
    pub midi: PathBuf,
    pub output: PathBuf,
    pub font: PathBuf,
    /// General MIDI program for every channel
    pub program: u8,
    pub volume_db: i32,
    /// Reverb settings, or `None` to skip reverb
    pub reverb: Option<ReverbParams>,
    pub tags: Tags,
    pub policy: InsertionPolicy,
}

impl Conversion {
    /// `song.mid` → `song.mp3`, next to the input.
    pub fn default_output(midi: &Path) -> PathBuf {
        midi.with_extension("mp3")
    }
}

/// What a successful run did.
#[derive(Debug, Clone)]
pub struct ConversionReport {
    pub rewrite: RewriteReport,
    pub duration_secs: f64,
    pub output: PathBuf,
}

/// Sequential conversion pipeline over a renderer and an encoder.
pub struct Pipeline<R, E> {
    renderer: R,
    encoder: E,
}

impl<R: Renderer, E: Encoder> Pipeline<R, E> {
    pub fn new(renderer: R, encoder: E) -> Self {
        Self { renderer, encoder }
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn encoder(&self) -> &E {
        &self.encoder
    }

    /// Run one conversion to completion.
    ///
    /// The rewritten MIDI is staged in a temporary `.aux.mid` file that is
    /// removed once rendering finishes, whether or not it succeeded.
    pub fn run(&self, job: &Conversion) -> Result<ConversionReport, PipelineError> {
        if !job.midi.is_file() {
            return Err(ConfigError::MissingInput(job.midi.clone()).into());
        }

        info!(
            input = %job.midi.display(),
            program = job.program,
            policy = %job.policy,
            "rewriting instruments"
        );
        let (bytes, rewrite) = voyage_midi::rewrite_file(&job.midi, job.program, job.policy)?;
        info!(
            tracks = rewrite.tracks,
            overwritten = rewrite.overwritten,
            inserted = rewrite.inserted,
            "rewrite complete"
        );

        let aux = stage_aux(&job.midi, &bytes).map_err(PipelineError::Staging)?;

        info!(font = %job.font.display(), "rendering");
        let rendered = self.renderer.render(aux.path(), &job.font);
        let aux_path = aux.path().to_path_buf();
        if let Err(e) = aux.close() {
            warn!(path = %aux_path.display(), error = %e, "failed to remove rewritten MIDI");
        }
        let rendered = rendered?;

        info!(
            volume_db = job.volume_db,
            reverb = job.reverb.is_some(),
            "post-processing"
        );
        let processed = audio::process(rendered, job.volume_db, job.reverb.as_ref());
        let duration_secs = processed.duration_secs();

        info!(output = %job.output.display(), "exporting");
        self.encoder.encode(&processed, &job.output, &job.tags)?;

        Ok(ConversionReport {
            rewrite,
            duration_secs,
            output: job.output.clone(),
        })
    }
}

/// Write the rewritten MIDI beside the input, or in the system temp
/// directory when the input's directory is not writable.
fn stage_aux(midi: &Path, bytes: &[u8]) -> std::io::Result<NamedTempFile> {
    let dir = match midi.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let prefix = format!(
        "{}.",
        midi.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "voyage".to_string())
    );

    let mut builder = tempfile::Builder::new();
    builder.prefix(&prefix).suffix(".aux.mid");

    let mut file = match builder.tempfile_in(dir) {
        Ok(file) => file,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "staging rewritten MIDI in temp dir instead");
            builder.tempfile()?
        }
    };
    file.write_all(bytes)?;
    file.flush()?;
    Ok(file)
}
