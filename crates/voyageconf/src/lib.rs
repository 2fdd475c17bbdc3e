//! Configuration for voyage.
//!
//! Built once at startup and handed down to every stage; nothing below the
//! CLI reads the environment on its own.
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/voyage/config.toml` (system)
//! 2. `~/.config/voyage/config.toml` (user)
//! 3. `./voyage.toml` or the `--config` path (local override)
//! 4. Environment variables (`FLUID_SF2`, `VOYAGE_*`, `RUST_LOG`)
//!
//! Command-line flags are applied on top by the binary.
//!
//! # Example Config
//!
//! ```toml
//! [paths]
//! soundfont = "~/midi/SF2/FluidR3_GM.sf2"
//!
//! [defaults]
//! midi = "last.mid"
//! instrument = 4
//! volume = 16
//! reverb = false
//! insertion = "first-note-per-channel"
//!
//! [tags]
//! artist = "Kaloyan Krastev"
//! genre = "Jazz"
//!
//! [render]
//! backend = "fluidsynth"
//! fluidsynth = "/usr/bin/fluidsynth"
//! sample_rate = 44100
//! tail_secs = 0.0
//!
//! [export]
//! ffmpeg = "ffmpeg"
//! bitrate = "192k"
//!
//! [reverb]
//! room_size = 0.75
//! damping = 0.5
//! wet_level = 0.3
//!
//! [telemetry]
//! log_level = "info"
//! ```

pub mod loader;

pub use loader::{discover_config_files, discover_config_files_with_override, expand_path, ConfigSources};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Environment variable holding the default sound font path.
pub const SOUNDFONT_ENV: &str = "FLUID_SF2";

/// Configuration loading and resolution errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("cannot find sound font")]
    MissingSoundFont,

    #[error("{} not found", .0.display())]
    MissingInput(PathBuf),

    #[error("invalid {key}: {message}")]
    Invalid { key: String, message: String },
}

/// Complete voyage configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct VoyageConfig {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub defaults: DefaultsConfig,
    #[serde(default)]
    pub tags: TagsConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub reverb: ReverbConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PathsConfig {
    /// Sound font used for rendering and program listing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub soundfont: Option<PathBuf>,
}

/// Defaults for the conversion flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultsConfig {
    #[serde(default = "DefaultsConfig::default_midi")]
    pub midi: PathBuf,

    /// General MIDI program number (0-127)
    #[serde(default = "DefaultsConfig::default_instrument")]
    pub instrument: u8,

    /// Gain in dB applied after rendering
    #[serde(default = "DefaultsConfig::default_volume")]
    pub volume: i32,

    #[serde(default)]
    pub reverb: bool,

    /// Program change insertion policy name
    #[serde(default = "DefaultsConfig::default_insertion")]
    pub insertion: String,
}

impl DefaultsConfig {
    fn default_midi() -> PathBuf {
        PathBuf::from("last.mid")
    }

    fn default_instrument() -> u8 {
        4
    }

    fn default_volume() -> i32 {
        16
    }

    fn default_insertion() -> String {
        "first-note-per-channel".to_string()
    }
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            midi: Self::default_midi(),
            instrument: Self::default_instrument(),
            volume: Self::default_volume(),
            reverb: false,
            insertion: Self::default_insertion(),
        }
    }
}

/// Metadata written into exported files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagsConfig {
    #[serde(default = "TagsConfig::default_artist")]
    pub artist: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
}

impl TagsConfig {
    fn default_artist() -> String {
        "Kaloyan Krastev".to_string()
    }
}

impl Default for TagsConfig {
    fn default() -> Self {
        Self {
            artist: Self::default_artist(),
            genre: None,
        }
    }
}

/// Which synthesizer turns MIDI into a waveform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderBackend {
    /// External `fluidsynth` process
    #[default]
    FluidSynth,
    /// In-process rustysynth
    RustySynth,
}

impl fmt::Display for RenderBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FluidSynth => f.write_str("fluidsynth"),
            Self::RustySynth => f.write_str("rustysynth"),
        }
    }
}

impl FromStr for RenderBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fluidsynth" => Ok(Self::FluidSynth),
            "rustysynth" => Ok(Self::RustySynth),
            other => Err(ConfigError::Invalid {
                key: "render.backend".to_string(),
                message: format!("unknown backend '{}'", other),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderConfig {
    #[serde(default)]
    pub backend: RenderBackend,

    /// fluidsynth executable name or path
    #[serde(default = "RenderConfig::default_fluidsynth")]
    pub fluidsynth: String,

    #[serde(default = "RenderConfig::default_sample_rate")]
    pub sample_rate: u32,

    /// Extra seconds the in-process synth renders past the last MIDI event
    #[serde(default)]
    pub tail_secs: f64,
}

impl RenderConfig {
    fn default_fluidsynth() -> String {
        "fluidsynth".to_string()
    }

    fn default_sample_rate() -> u32 {
        44_100
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            backend: RenderBackend::default(),
            fluidsynth: Self::default_fluidsynth(),
            sample_rate: Self::default_sample_rate(),
            tail_secs: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportConfig {
    /// ffmpeg executable name or path
    #[serde(default = "ExportConfig::default_ffmpeg")]
    pub ffmpeg: String,

    #[serde(default = "ExportConfig::default_bitrate")]
    pub bitrate: String,
}

impl ExportConfig {
    fn default_ffmpeg() -> String {
        "ffmpeg".to_string()
    }

    fn default_bitrate() -> String {
        "192k".to_string()
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            ffmpeg: Self::default_ffmpeg(),
            bitrate: Self::default_bitrate(),
        }
    }
}

/// Room reverb settings, all in 0.0..=1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReverbConfig {
    #[serde(default = "ReverbConfig::default_room_size")]
    pub room_size: f32,
    #[serde(default = "ReverbConfig::default_damping")]
    pub damping: f32,
    #[serde(default = "ReverbConfig::default_wet_level")]
    pub wet_level: f32,
    #[serde(default = "ReverbConfig::default_dry_level")]
    pub dry_level: f32,
    #[serde(default = "ReverbConfig::default_width")]
    pub width: f32,
}

impl ReverbConfig {
    fn default_room_size() -> f32 {
        0.75
    }

    fn default_damping() -> f32 {
        0.5
    }

    fn default_wet_level() -> f32 {
        0.3
    }

    fn default_dry_level() -> f32 {
        0.4
    }

    fn default_width() -> f32 {
        1.0
    }
}

impl Default for ReverbConfig {
    fn default() -> Self {
        Self {
            room_size: Self::default_room_size(),
            damping: Self::default_damping(),
            wet_level: Self::default_wet_level(),
            dry_level: Self::default_dry_level(),
            width: Self::default_width(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// tracing filter directive, e.g. "info" or "voyage=debug"
    #[serde(default = "TelemetryConfig::default_log_level")]
    pub log_level: String,
}

impl TelemetryConfig {
    fn default_log_level() -> String {
        "info".to_string()
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
        }
    }
}

impl VoyageConfig {
    /// Load configuration from all sources.
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load configuration, letting `config_path` replace `./voyage.toml`.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration and report which files and variables contributed.
    pub fn load_with_sources_from(
        config_path: Option<&Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let files = loader::discover_config_files_with_override(config_path);
        loader::load_layers(&files, |key| std::env::var(key).ok())
    }

    /// Pick the sound font for this run.
    ///
    /// A default must come from `FLUID_SF2` or `[paths] soundfont`; without
    /// one the run is over even when `flag` names a font. With a default in
    /// place, `flag` replaces it.
    pub fn resolve_soundfont(&self, flag: Option<&Path>) -> Result<PathBuf, ConfigError> {
        let default = self
            .paths
            .soundfont
            .as_ref()
            .ok_or(ConfigError::MissingSoundFont)?;
        Ok(flag.unwrap_or(default.as_path()).to_path_buf())
    }

    /// Serialize the effective configuration as TOML.
    pub fn to_toml(&self) -> String {
        let mut output = String::from("# voyage configuration\n\n");
        match toml::to_string_pretty(self) {
            Ok(body) => output.push_str(&body),
            Err(e) => output.push_str(&format!("# failed to serialize: {}\n", e)),
        }
        output
    }
}
