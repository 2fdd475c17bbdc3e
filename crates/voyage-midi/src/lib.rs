//! Instrument rewriting for Standard MIDI Files.
//!
//! Forces every channel of a MIDI file onto a single General MIDI program:
//! existing program changes are corrected in place and synthetic ones are
//! inserted ahead of notes that would otherwise start on the synth's default
//! instrument. Timing is never altered; inserted events carry a zero delta.
//!
//! # Example
//!
//! ```no_run
//! use voyage_midi::{rewrite_file, InsertionPolicy};
//!
//! let (bytes, report) = rewrite_file("last.mid", 4, InsertionPolicy::default()).unwrap();
//! println!("{} inserted, {} overwritten", report.inserted, report.overwritten);
//! std::fs::write("last.mid.aux", bytes).unwrap();
//! ```

pub mod file;
pub mod rewrite;

pub use file::{parse, rewrite_bytes, rewrite_file, to_bytes};
pub use rewrite::{rewrite, rewrite_track, track_span, InsertionPolicy, RewriteReport};

use std::path::PathBuf;

/// Errors from loading, rewriting or serializing MIDI data.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("malformed MIDI: {0}")]
    Malformed(String),

    #[error("program number {0} is outside 0-127")]
    ProgramOutOfRange(u8),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to serialize MIDI: {0}")]
    Write(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
