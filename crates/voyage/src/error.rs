use crate::export::ExportError;
use crate::render::RenderError;
use voyageconf::ConfigError;

/// Why a conversion stopped. Every variant is fatal; nothing is retried.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Missing sound font or input file, or an out-of-range setting.
    #[error(transparent)]
    Configuration(#[from] ConfigError),

    /// The input could not be parsed or the rewrite could not be serialized.
    #[error(transparent)]
    MalformedMidi(voyage_midi::Error),

    #[error("failed to stage rewritten MIDI: {0}")]
    Staging(#[source] std::io::Error),

    #[error("render failed: {0}")]
    Render(#[from] RenderError),

    #[error("export failed: {0}")]
    Export(#[from] ExportError),
}

impl From<voyage_midi::Error> for PipelineError {
    fn from(err: voyage_midi::Error) -> Self {
        match err {
            voyage_midi::Error::ProgramOutOfRange(program) => {
                Self::Configuration(ConfigError::Invalid {
                    key: "instrument".to_string(),
                    message: format!("{} is outside 0-127", program),
                })
            }
            voyage_midi::Error::Read { path, source }
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                Self::Configuration(ConfigError::MissingInput(path))
            }
            other => Self::MalformedMidi(other),
        }
    }
}
