//! Freeverb-style room reverb: eight damped comb filters in parallel
//! feeding four all-pass filters in series, one tank per channel. The right
//! channel's delay lines are offset by a small stereo spread.

use voyageconf::ReverbConfig;

const COMB_LENGTHS: [usize; 8] = [1116, 1188, 1277, 1356, 1422, 1491, 1557, 1617];
const ALLPASS_LENGTHS: [usize; 4] = [556, 441, 341, 225];
const STEREO_SPREAD: usize = 23;

const FIXED_GAIN: f32 = 0.015;
const SCALE_DAMP: f32 = 0.4;
const SCALE_ROOM: f32 = 0.28;
const OFFSET_ROOM: f32 = 0.7;
const SCALE_WET: f32 = 3.0;
const SCALE_DRY: f32 = 2.0;

/// User-facing reverb parameters, each in 0.0..=1.0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReverbParams {
    pub room_size: f32,
    pub damping: f32,
    pub wet_level: f32,
    pub dry_level: f32,
    pub width: f32,
}

impl Default for ReverbParams {
    fn default() -> Self {
        Self::from(&ReverbConfig::default())
    }
}

impl From<&ReverbConfig> for ReverbParams {
    fn from(config: &ReverbConfig) -> Self {
        Self {
            room_size: config.room_size.clamp(0.0, 1.0),
            damping: config.damping.clamp(0.0, 1.0),
            wet_level: config.wet_level.clamp(0.0, 1.0),
            dry_level: config.dry_level.clamp(0.0, 1.0),
            width: config.width.clamp(0.0, 1.0),
        }
    }
}

#[derive(Debug, Clone)]
struct CombFilter {
    buffer: Vec<f32>,
    index: usize,
    feedback: f32,
    damp: f32,
    filter_store: f32,
}

impl CombFilter {
    fn new(length: usize, feedback: f32, damp: f32) -> Self {
        Self {
            buffer: vec![0.0; length.max(1)],
            index: 0,
            feedback,
            damp,
            filter_store: 0.0,
        }
    }

    fn process(&mut self, input: f32) -> f32 {
        let output = self.buffer[self.index];
        self.filter_store = output * (1.0 - self.damp) + self.filter_store * self.damp;
        self.buffer[self.index] = input + self.filter_store * self.feedback;
        self.index = (self.index + 1) % self.buffer.len();
        output
    }
}

#[derive(Debug, Clone)]
struct AllPassFilter {
    buffer: Vec<f32>,
    index: usize,
}

impl AllPassFilter {
    fn new(length: usize) -> Self {
        Self {
            buffer: vec![0.0; length.max(1)],
            index: 0,
        }
    }

    fn process(&mut self, input: f32) -> f32 {
        let buffered = self.buffer[self.index];
        self.buffer[self.index] = input + buffered * 0.5;
        self.index = (self.index + 1) % self.buffer.len();
        buffered - input
    }
}

#[derive(Debug, Clone)]
struct Tank {
    combs: Vec<CombFilter>,
    allpasses: Vec<AllPassFilter>,
}

impl Tank {
    fn new(sample_rate: f32, spread: usize, feedback: f32, damp: f32) -> Self {
        let scale = (sample_rate / 44_100.0).max(0.25);
        let scaled = |length: usize| ((length + spread) as f32 * scale).round() as usize;

        Self {
            combs: COMB_LENGTHS
                .iter()
                .map(|&len| CombFilter::new(scaled(len), feedback, damp))
                .collect(),
            allpasses: ALLPASS_LENGTHS
                .iter()
                .map(|&len| AllPassFilter::new(scaled(len)))
                .collect(),
        }
    }

    fn process(&mut self, input: f32) -> f32 {
        let mut out = 0.0;
        for comb in &mut self.combs {
            out += comb.process(input);
        }
        for allpass in &mut self.allpasses {
            out = allpass.process(out);
        }
        out
    }
}

/// A reverb instance sized for one waveform.
pub struct Reverb {
    sample_rate: f32,
    feedback: f32,
    damp: f32,
    wet1: f32,
    wet2: f32,
    dry: f32,
}

impl Reverb {
    pub fn new(sample_rate: f32, params: &ReverbParams) -> Self {
        let wet = params.wet_level * SCALE_WET;
        Self {
            sample_rate: sample_rate.max(1.0),
            feedback: params.room_size * SCALE_ROOM + OFFSET_ROOM,
            damp: params.damping * SCALE_DAMP,
            wet1: 0.5 * wet * (1.0 + params.width),
            wet2: 0.5 * wet * (1.0 - params.width),
            dry: params.dry_level * SCALE_DRY,
        }
    }

    fn tank(&self, spread: usize) -> Tank {
        Tank::new(self.sample_rate, spread, self.feedback, self.damp)
    }

    /// Process de-interleaved channels in place. Two channels are treated
    /// as a stereo pair; anything else gets an independent mono tank per
    /// channel.
    pub fn process(&mut self, planes: &mut [Vec<f32>]) {
        match planes {
            [left, right] => self.process_stereo(left, right),
            planes => {
                for plane in planes.iter_mut() {
                    self.process_mono(plane);
                }
            }
        }
    }

    fn process_mono(&self, samples: &mut [f32]) {
        let mut tank = self.tank(0);
        for sample in samples.iter_mut() {
            let input = *sample * FIXED_GAIN;
            let out = tank.process(input);
            *sample = out * self.wet1 + *sample * self.dry;
        }
    }

    fn process_stereo(&self, left: &mut [f32], right: &mut [f32]) {
        let mut tank_l = self.tank(0);
        let mut tank_r = self.tank(STEREO_SPREAD);
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            let input = (*l + *r) * FIXED_GAIN;
            let out_l = tank_l.process(input);
            let out_r = tank_r.process(input);
            *l = out_l * self.wet1 + out_r * self.wet2 + *l * self.dry;
            *r = out_r * self.wet1 + out_l * self.wet2 + *r * self.dry;
        }
    }
}
