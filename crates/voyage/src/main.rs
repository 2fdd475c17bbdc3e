use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use voyage::{
    soundfont, Conversion, FfmpegEncoder, FluidSynthRenderer, Pipeline, PipelineError, Renderer,
    ReverbParams, RustySynthRenderer, Tags,
};
use voyage_midi::InsertionPolicy;
use voyageconf::{ConfigError, RenderBackend, VoyageConfig};

/// Render a MIDI file with one instrument and export it as a tagged MP3
#[derive(Parser, Debug)]
#[command(name = "voyage", version, about, long_about = None)]
struct Cli {
    /// MIDI input file [default: last.mid]
    #[arg(short, long)]
    midi: Option<PathBuf>,

    /// MP3 output file [default: input with .mp3 extension]
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Sound font [default: $FLUID_SF2]
    #[arg(short, long)]
    font: Option<PathBuf>,

    /// General MIDI program number [default: 4]
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(0..=127))]
    instrument: Option<u8>,

    /// Gain in dB [default: 16]
    #[arg(short, long, allow_negative_numbers = true)]
    volume: Option<i32>,

    /// Add room reverb
    #[arg(short, long)]
    reverb: bool,

    /// List the sound font's bank 0 programs and exit
    #[arg(short, long)]
    programs: bool,

    /// Synthesizer backend
    #[arg(long)]
    backend: Option<RenderBackend>,

    /// Where synthetic program changes go: first-note-per-channel or every-unprefixed-note
    #[arg(long)]
    insertion: Option<InsertionPolicy>,

    /// Config file used instead of ./voyage.toml
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let (config, sources) = match VoyageConfig::load_with_sources_from(cli.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    init_tracing(&config.telemetry.log_level);
    debug!(files = ?sources.files, env = ?sources.env_overrides, "configuration loaded");

    match run(&cli, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => match setup_failure(&err) {
            // Missing inputs are reported on stdout and are not a crash.
            Some(reason) => {
                println!("{}\ni am dead", reason);
                ExitCode::SUCCESS
            }
            None => {
                eprintln!("error: {:#}", err);
                ExitCode::FAILURE
            }
        },
    }
}

fn init_tracing(directive: &str) {
    let filter = EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// The missing sound font or input that stopped the run, if that is what happened.
fn setup_failure(err: &anyhow::Error) -> Option<&ConfigError> {
    let config_err = err.downcast_ref::<ConfigError>().or_else(|| {
        match err.downcast_ref::<PipelineError>() {
            Some(PipelineError::Configuration(e)) => Some(e),
            _ => None,
        }
    })?;
    match config_err {
        ConfigError::MissingSoundFont | ConfigError::MissingInput(_) => Some(config_err),
        _ => None,
    }
}

fn run(cli: &Cli, config: &VoyageConfig) -> Result<()> {
    if cli.print_config {
        print!("{}", config.to_toml());
        return Ok(());
    }

    let midi = cli
        .midi
        .clone()
        .unwrap_or_else(|| config.defaults.midi.clone());
    let program = match cli.instrument {
        Some(program) => program,
        None => validate_program(config.defaults.instrument)?,
    };
    info!("instrument: {}, input: {}", program, midi.display());

    let font = config.resolve_soundfont(cli.font.as_deref())?;

    if cli.programs {
        return list_programs(&font);
    }

    let policy = match cli.insertion {
        Some(policy) => policy,
        None => config
            .defaults
            .insertion
            .parse::<InsertionPolicy>()
            .map_err(|message| ConfigError::Invalid {
                key: "defaults.insertion".to_string(),
                message,
            })?,
    };

    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| Conversion::default_output(&midi));
    let reverb = (cli.reverb || config.defaults.reverb).then(|| ReverbParams::from(&config.reverb));

    let job = Conversion {
        tags: Tags::for_input(&midi, config.tags.artist.clone(), config.tags.genre.clone()),
        midi,
        output,
        font,
        program,
        volume_db: cli.volume.unwrap_or(config.defaults.volume),
        reverb,
        policy,
    };

    let backend = cli.backend.unwrap_or(config.render.backend);
    let renderer: Box<dyn Renderer> = match backend {
        RenderBackend::FluidSynth => Box::new(FluidSynthRenderer::new(
            config.render.fluidsynth.clone(),
            config.render.sample_rate,
        )),
        RenderBackend::RustySynth => Box::new(
            RustySynthRenderer::new(config.render.sample_rate).with_tail(config.render.tail_secs),
        ),
    };
    debug!(%backend, "renderer selected");
    let encoder = FfmpegEncoder::new(config.export.ffmpeg.clone(), config.export.bitrate.clone());

    let report = Pipeline::new(renderer, encoder).run(&job)?;
    info!(
        seconds = report.duration_secs,
        inserted = report.rewrite.inserted,
        overwritten = report.rewrite.overwritten,
        "conversion complete"
    );

    println!("{}", "= ".repeat(33));
    println!(
        "synthesized {} from {} with {} {}",
        report.output.display(),
        job.midi.display(),
        job.program,
        instrument_name(&job.font, job.program)
    );
    Ok(())
}

fn validate_program(program: u8) -> Result<u8, ConfigError> {
    if program > 127 {
        return Err(ConfigError::Invalid {
            key: "defaults.instrument".to_string(),
            message: format!("{} is outside 0-127", program),
        });
    }
    Ok(program)
}

fn list_programs(font: &Path) -> Result<()> {
    let presets = soundfont::load_presets(font)
        .with_context(|| format!("cannot list programs of {}", font.display()))?;
    for preset in soundfont::bank_programs(&presets, 0) {
        println!("{} {} {}", preset.bank, preset.program, preset.name);
    }
    Ok(())
}

fn instrument_name(font: &Path, program: u8) -> String {
    match soundfont::load_presets(font) {
        Ok(presets) => soundfont::program_name(&presets, 0, i32::from(program))
            .unwrap_or("unknown")
            .to_string(),
        Err(e) => {
            debug!(error = %e, "could not read preset names");
            "unknown".to_string()
        }
    }
}
