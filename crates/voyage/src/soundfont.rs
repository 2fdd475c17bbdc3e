//! SoundFont program listing.

use rustysynth::SoundFont;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Preset name some General MIDI fonts use for filler slots.
pub const PLACEHOLDER_PRESET: &str = "Gun Shot";

#[derive(Debug, thiserror::Error)]
pub enum SoundFontError {
    #[error("failed to open sound font {}: {source}", path.display())]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse sound font {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
}

/// A preset in the SoundFont.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresetInfo {
    pub name: String,
    pub bank: i32,
    pub program: i32,
}

/// Load the preset table of a sound font, sorted by bank then program.
pub fn load_presets(path: &Path) -> Result<Vec<PresetInfo>, SoundFontError> {
    let file = File::open(path).map_err(|source| SoundFontError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let soundfont = SoundFont::new(&mut BufReader::new(file)).map_err(|e| SoundFontError::Parse {
        path: path.to_path_buf(),
        message: format!("{:?}", e),
    })?;

    let mut presets: Vec<PresetInfo> = soundfont
        .get_presets()
        .iter()
        .map(|p| PresetInfo {
            name: p.get_name().to_string(),
            bank: p.get_bank_number(),
            program: p.get_patch_number(),
        })
        .collect();

    presets.sort_by(|a, b| a.bank.cmp(&b.bank).then(a.program.cmp(&b.program)));
    tracing::debug!(count = presets.len(), font = %path.display(), "loaded presets");

    Ok(presets)
}

/// Name of the preset at `bank`/`program`, if the font defines one.
pub fn program_name(presets: &[PresetInfo], bank: i32, program: i32) -> Option<&str> {
    presets
        .iter()
        .find(|p| p.bank == bank && p.program == program)
        .map(|p| p.name.as_str())
}

/// Programs 0-127 of `bank` in slot order, without empty slots or
/// [`PLACEHOLDER_PRESET`] entries.
pub fn bank_programs(presets: &[PresetInfo], bank: i32) -> Vec<&PresetInfo> {
    (0..128)
        .filter_map(|program| {
            let preset = presets
                .iter()
                .find(|p| p.bank == bank && p.program == program);
            if preset.is_none() {
                tracing::debug!(bank, program, "no preset in slot");
            }
            preset
        })
        .filter(|p| p.name != PLACEHOLDER_PRESET)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn preset(bank: i32, program: i32, name: &str) -> PresetInfo {
        PresetInfo {
            name: name.to_string(),
            bank,
            program,
        }
    }

    fn full_bank() -> Vec<PresetInfo> {
        (0..128)
            .map(|p| preset(0, p, &format!("Instrument {}", p)))
            .collect()
    }

    #[test]
    fn placeholder_slot_is_skipped() {
        let mut presets = full_bank();
        presets[0].name = PLACEHOLDER_PRESET.to_string();

        let listed = bank_programs(&presets, 0);

        assert_eq!(listed.len(), 127);
        assert_eq!(listed[0].program, 1);
        assert!(listed.iter().all(|p| p.name != "Gun Shot"));
    }

    #[test]
    fn only_exact_name_is_filtered() {
        let mut presets = full_bank();
        presets[127].name = "Gunshot".to_string();
        assert_eq!(bank_programs(&presets, 0).len(), 128);
    }

    #[test]
    fn other_banks_and_gaps_are_ignored() {
        let presets = vec![
            preset(0, 0, "Yamaha Grand Piano"),
            preset(0, 4, "Rhodes EP"),
            preset(8, 4, "Detuned EP 1"),
            preset(128, 0, "Standard"),
        ];

        let names: Vec<&str> = bank_programs(&presets, 0)
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(names, vec!["Yamaha Grand Piano", "Rhodes EP"]);
    }

    #[test]
    fn program_name_lookup() {
        let presets = vec![preset(0, 4, "Rhodes EP"), preset(128, 4, "Room")];
        assert_eq!(program_name(&presets, 0, 4), Some("Rhodes EP"));
        assert_eq!(program_name(&presets, 0, 5), None);
    }

    #[test]
    fn unreadable_font_is_an_open_error() {
        let err = load_presets(Path::new("/no/such/font.sf2")).unwrap_err();
        assert!(matches!(err, SoundFontError::Open { .. }));
    }

    #[test]
    fn garbage_font_is_a_parse_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("bad.sf2");
        std::fs::write(&path, b"definitely not RIFF").unwrap();
        let err = load_presets(&path).unwrap_err();
        assert!(matches!(err, SoundFontError::Parse { .. }));
    }
}
