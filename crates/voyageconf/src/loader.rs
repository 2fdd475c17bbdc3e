//! Config file discovery, layering, and environment variable overlay.

use crate::{ConfigError, VoyageConfig, SOUNDFONT_ENV};
use std::env;
use std::path::{Path, PathBuf};

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Discover config files in standard locations.
pub fn discover_config_files() -> Vec<PathBuf> {
    discover_config_files_with_override(None)
}

/// Discover config files, optionally with a CLI override path.
///
/// Returns paths in load order (system, user, local/cli). System and user
/// files are only returned when they exist. An explicit `cli_path` is always
/// returned so a typo surfaces as a read error instead of being ignored.
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/voyage/config.toml");
    if system.exists() {
        files.push(system);
    }

    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("voyage/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        files.push(path.to_path_buf());
        return files;
    }

    let local = PathBuf::from("voyage.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Read one config file as a raw TOML table.
///
/// The table is also deserialized on its own so type errors are reported
/// against the file that contains them.
pub fn load_table(path: &Path) -> Result<toml::Table, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    parse_table(&contents, path)
}

fn parse_table(contents: &str, path: &Path) -> Result<toml::Table, ConfigError> {
    let table: toml::Table = contents.parse().map_err(|e: toml::de::Error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    toml::Value::Table(table.clone())
        .try_into::<VoyageConfig>()
        .map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    Ok(table)
}

/// Deep-merge `overlay` into `base`. Nested tables merge key by key;
/// any other value in `overlay` replaces the one in `base`.
pub fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// Load and merge `files` in order, then apply environment overrides
/// looked up through `lookup`.
pub fn load_layers<F>(files: &[PathBuf], lookup: F) -> Result<(VoyageConfig, ConfigSources), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut sources = ConfigSources::default();
    let mut merged = toml::Table::new();

    for path in files {
        let table = load_table(path)?;
        merge_tables(&mut merged, table);
        sources.files.push(path.clone());
    }

    let mut config: VoyageConfig = toml::Value::Table(merged)
        .try_into()
        .map_err(|e: toml::de::Error| ConfigError::Parse {
            path: files.last().cloned().unwrap_or_default(),
            message: e.to_string(),
        })?;

    if let Some(font) = config.paths.soundfont.take() {
        config.paths.soundfont = Some(expand_path(&font.to_string_lossy()));
    }

    apply_env_overrides(&mut config, &mut sources, lookup);

    Ok((config, sources))
}

/// Apply environment variable overrides to config.
pub fn apply_env_overrides<F>(config: &mut VoyageConfig, sources: &mut ConfigSources, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let mut take = |key: &str| -> Option<String> {
        let value = lookup(key).filter(|v| !v.is_empty())?;
        sources.env_overrides.push(key.to_string());
        Some(value)
    };

    if let Some(v) = take(SOUNDFONT_ENV) {
        config.paths.soundfont = Some(expand_path(&v));
    }
    if let Some(v) = take("VOYAGE_FLUIDSYNTH") {
        config.render.fluidsynth = v;
    }
    if let Some(v) = take("VOYAGE_FFMPEG") {
        config.export.ffmpeg = v;
    }
    if let Some(v) = take("VOYAGE_ARTIST") {
        config.tags.artist = v;
    }
    if let Some(v) = take("VOYAGE_LOG_LEVEL") {
        config.telemetry.log_level = v;
    }
    // RUST_LOG wins over VOYAGE_LOG_LEVEL
    if let Some(v) = take("RUST_LOG") {
        config.telemetry.log_level = v;
    }
}

/// Expand ~ and environment variables in a path.
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
            return home.join(stripped);
        }
        return PathBuf::from(path);
    }

    if let Some(stripped) = path.strip_prefix('$') {
        // $VAR/rest/of/path
        let (var_name, rest) = match stripped.find('/') {
            Some(slash_pos) => (&stripped[..slash_pos], Some(&stripped[slash_pos + 1..])),
            None => (stripped, None),
        };
        return match (env::var(var_name), rest) {
            (Ok(value), Some(rest)) => PathBuf::from(value).join(rest),
            (Ok(value), None) => PathBuf::from(value),
            (Err(_), _) => PathBuf::from(path),
        };
    }

    PathBuf::from(path)
}
