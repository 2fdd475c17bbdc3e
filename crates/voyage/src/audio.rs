//! In-memory waveform plus the post-processing applied before export.
//!
//! Samples are interleaved integers at the waveform's own bit depth. Gain
//! keeps the depth; reverb always comes back as 16-bit so the exporter only
//! ever has to deal with what fluidsynth produces by default.

use crate::reverb::{Reverb, ReverbParams};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::path::Path;

/// Sample rate the renderers are asked for.
pub const RENDER_SAMPLE_RATE: u32 = 44_100;

/// A rendered waveform.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedAudio {
    /// Interleaved samples, each within the signed range of `bits_per_sample`
    pub samples: Vec<i32>,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    pub channels: u16,
}

impl RenderedAudio {
    /// All-zero waveform of `frames` frames.
    pub fn silent(frames: usize, sample_rate: u32, bits_per_sample: u16, channels: u16) -> Self {
        Self {
            samples: vec![0; frames * channels as usize],
            sample_rate,
            bits_per_sample,
            channels,
        }
    }

    /// Build 16-bit stereo audio from normalized float channels.
    pub fn from_stereo_f32(left: &[f32], right: &[f32], sample_rate: u32) -> Self {
        let samples = left
            .iter()
            .zip(right.iter())
            .flat_map(|(&l, &r)| [i32::from(to_i16(l)), i32::from(to_i16(r))])
            .collect();

        Self {
            samples,
            sample_rate,
            bits_per_sample: 16,
            channels: 2,
        }
    }

    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Magnitude of full scale at this bit depth: 32768 for 16-bit,
    /// 8388608 for 24-bit.
    pub fn full_scale(&self) -> f32 {
        (1u64 << (self.bits_per_sample.clamp(1, 32) - 1)) as f32
    }

    /// Largest absolute sample value.
    pub fn peak(&self) -> u32 {
        self.samples
            .iter()
            .map(|s| s.unsigned_abs())
            .max()
            .unwrap_or(0)
    }

    /// RMS level relative to full scale, in dB. Silence is `-inf`.
    pub fn rms_dbfs(&self) -> f64 {
        if self.samples.is_empty() {
            return f64::NEG_INFINITY;
        }
        let sum: f64 = self.samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
        let rms = (sum / self.samples.len() as f64).sqrt();
        20.0 * (rms / self.full_scale() as f64).log10()
    }

    /// Read a WAV file. Float WAVs are converted to 16-bit integers.
    pub fn read_wav(path: impl AsRef<Path>) -> Result<Self, hound::Error> {
        let reader = WavReader::open(path)?;
        let spec = reader.spec();

        let (samples, bits_per_sample) = match spec.sample_format {
            SampleFormat::Int => (
                reader.into_samples::<i32>().collect::<Result<Vec<_>, _>>()?,
                spec.bits_per_sample,
            ),
            SampleFormat::Float => (
                reader
                    .into_samples::<f32>()
                    .map(|s| s.map(|v| i32::from(to_i16(v))))
                    .collect::<Result<Vec<_>, _>>()?,
                16,
            ),
        };

        Ok(Self {
            samples,
            sample_rate: spec.sample_rate,
            bits_per_sample,
            channels: spec.channels,
        })
    }

    /// Write an integer PCM WAV file at the waveform's own bit depth.
    pub fn write_wav(&self, path: impl AsRef<Path>) -> Result<(), hound::Error> {
        let spec = WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: self.bits_per_sample,
            sample_format: SampleFormat::Int,
        };

        let mut writer = WavWriter::create(path, spec)?;
        for &sample in &self.samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()
    }
}

fn to_i16(v: f32) -> i16 {
    (v.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

/// Linear factor for a gain in dB.
pub fn db_to_gain(db: f64) -> f64 {
    10f64.powf(db / 20.0)
}

/// Add `db` decibels to the waveform, saturating at the bit depth's limits.
pub fn apply_gain(audio: &mut RenderedAudio, db: i32) {
    if db == 0 {
        return;
    }

    let factor = db_to_gain(f64::from(db));
    let max = audio.full_scale() as f64 - 1.0;
    let min = -(audio.full_scale() as f64);

    for sample in &mut audio.samples {
        *sample = (*sample as f64 * factor).round().clamp(min, max) as i32;
    }
}

/// Run the waveform through a room reverb.
///
/// Samples are normalized by the source bit depth, processed per channel,
/// and rescaled to 16-bit. The result is always 16-bit regardless of input.
pub fn apply_reverb(audio: &RenderedAudio, params: &ReverbParams) -> RenderedAudio {
    let scale = audio.full_scale();
    let channels = audio.channels.max(1) as usize;
    let frames = audio.frames();

    let mut planes: Vec<Vec<f32>> = (0..channels)
        .map(|ch| {
            (0..frames)
                .map(|frame| audio.samples[frame * channels + ch] as f32 / scale)
                .collect()
        })
        .collect();

    let mut reverb = Reverb::new(audio.sample_rate as f32, params);
    reverb.process(&mut planes);

    let mut samples = Vec::with_capacity(frames * channels);
    for frame in 0..frames {
        for plane in &planes {
            let v = (plane[frame] * 32768.0).clamp(-32768.0, 32767.0);
            samples.push(v as i32);
        }
    }

    RenderedAudio {
        samples,
        sample_rate: audio.sample_rate,
        bits_per_sample: 16,
        channels: audio.channels,
    }
}

/// Reverb (if requested) followed by gain.
pub fn process(audio: RenderedAudio, volume_db: i32, reverb: Option<&ReverbParams>) -> RenderedAudio {
    let mut out = match reverb {
        Some(params) => {
            tracing::debug!(?params, "applying reverb");
            apply_reverb(&audio, params)
        }
        None => audio,
    };
    tracing::debug!(volume_db, "applying gain");
    apply_gain(&mut out, volume_db);
    out
}
