//! Byte- and file-level entry points around [`rewrite`](crate::rewrite).

use crate::rewrite::{rewrite, InsertionPolicy, RewriteReport};
use crate::{Error, Result};
use midly::num::u7;
use midly::Smf;
use std::path::Path;

/// Parse SMF bytes, mapping parser failures to [`Error::Malformed`].
pub fn parse(bytes: &[u8]) -> Result<Smf<'_>> {
    Smf::parse(bytes).map_err(|e| Error::Malformed(e.to_string()))
}

/// Serialize an SMF back to bytes.
pub fn to_bytes(smf: &Smf<'_>) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    smf.write_std(&mut buf).map_err(Error::Write)?;
    Ok(buf)
}

/// Parse, rewrite to `program`, and serialize.
pub fn rewrite_bytes(
    bytes: &[u8],
    program: u8,
    policy: InsertionPolicy,
) -> Result<(Vec<u8>, RewriteReport)> {
    let program = u7::try_from(program).ok_or(Error::ProgramOutOfRange(program))?;
    let smf = parse(bytes)?;
    let (rewritten, report) = rewrite(&smf, program, policy);

    tracing::debug!(
        tracks = report.tracks,
        overwritten = report.overwritten,
        inserted = report.inserted,
        "rewrote program changes"
    );

    Ok((to_bytes(&rewritten)?, report))
}

/// Read a MIDI file from disk and rewrite it. The input file is not modified.
pub fn rewrite_file(
    path: impl AsRef<Path>,
    program: u8,
    policy: InsertionPolicy,
) -> Result<(Vec<u8>, RewriteReport)> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    rewrite_bytes(&bytes, program, policy)
}
