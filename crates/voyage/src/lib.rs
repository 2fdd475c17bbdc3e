//! Render a MIDI file with a single instrument to a tagged MP3.
//!
//! The [`Pipeline`] runs four stages in order: force every channel onto one
//! General MIDI program, synthesize the result with a sound font, apply gain
//! and optional reverb, then encode to MP3 with title and artist tags.
//! Rendering and encoding sit behind the [`Renderer`] and [`Encoder`] traits.

pub mod audio;
pub mod error;
pub mod export;
pub mod pipeline;
pub mod render;
pub mod reverb;
pub mod soundfont;
pub mod tool;

pub use audio::RenderedAudio;
pub use error::PipelineError;
pub use export::{Encoder, ExportError, FfmpegEncoder, Tags};
pub use pipeline::{Conversion, ConversionReport, Pipeline};
pub use render::{FluidSynthRenderer, RenderError, Renderer, RustySynthRenderer};
pub use reverb::ReverbParams;
pub use soundfont::{bank_programs, load_presets, program_name, PresetInfo, SoundFontError};
