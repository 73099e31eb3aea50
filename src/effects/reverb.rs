//! Convolution reverb built from a synthesized noise tail.
//!
//! Every call draws a fresh impulse response from the caller's random source:
//! an exponentially decaying burst of Gaussian noise 300 ms long, normalized
//! to a peak of 1.0. Each channel is convolved with it, cut back to its
//! original length, and blended with the dry signal.
//!
//! The mix law is `dry = 1 - wet / 2`, so the dry signal never falls below
//! half level. Nothing limits the result; a loud input at a high amount can
//! leave `[-1.0, 1.0]`.

use crate::audio_io::AudioData;
use crate::effects::dsp::{convolve, exponential_decay};
use crate::effects::{float_param, AudioEffect, EffectError, ParameterDef, ParameterValue, Parameters};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, StandardNormal};

/// Length of the synthesized tail in seconds.
pub const IMPULSE_SECONDS: f64 = 0.3;
/// The envelope falls from `exp(0)` to `exp(-DECAY_EXPONENT)` across the tail.
pub const DECAY_EXPONENT: f64 = 5.0;

pub const MIN_AMOUNT: f32 = 0.0;
pub const MAX_AMOUNT: f32 = 100.0;

pub const AMOUNT_PARAM: &str = "amount";

/// A synthesized impulse response, peak-normalized to 1.0.
#[derive(Debug, Clone, PartialEq)]
pub struct ImpulseResponse {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl ImpulseResponse {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Reverb intensity on the 0..=100 scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReverbParameters {
    amount: f32,
}

impl ReverbParameters {
    pub fn new(amount: f32) -> Result<Self, EffectError> {
        if !amount.is_finite() || !(MIN_AMOUNT..=MAX_AMOUNT).contains(&amount) {
            return Err(EffectError::InvalidParameter(format!(
                "amount must be between {} and {}, got {}",
                MIN_AMOUNT, MAX_AMOUNT, amount
            )));
        }
        Ok(Self { amount })
    }

    pub fn amount(&self) -> f32 {
        self.amount
    }

    pub fn wet(&self) -> f32 {
        self.amount / 100.0
    }

    pub fn dry(&self) -> f32 {
        1.0 - 0.5 * self.wet()
    }
}

/// Number of impulse samples for a sample rate.
pub fn impulse_length(sample_rate: u32) -> usize {
    (sample_rate as f64 * IMPULSE_SECONDS).round() as usize
}

/// Synthesize a decaying noise impulse response for `sample_rate`.
///
/// Draws exactly `impulse_length(sample_rate)` standard normal values from
/// `rng`, in order. Nothing is drawn if the sample rate is rejected.
pub fn synthesize_impulse<R: Rng + ?Sized>(
    sample_rate: u32,
    rng: &mut R,
) -> Result<ImpulseResponse, EffectError> {
    let len = impulse_length(sample_rate);
    if len < 1 {
        return Err(EffectError::InvalidParameter(format!(
            "sample rate {} Hz is too low for a {} s impulse",
            sample_rate, IMPULSE_SECONDS
        )));
    }

    let shaped: Vec<f64> = exponential_decay(len, DECAY_EXPONENT)
        .into_iter()
        .map(|gain| {
            let noise: f64 = StandardNormal.sample(&mut *rng);
            gain * noise
        })
        .collect();

    normalize_impulse(&shaped, sample_rate)
}

fn normalize_impulse(shaped: &[f64], sample_rate: u32) -> Result<ImpulseResponse, EffectError> {
    let peak = shaped.iter().fold(0.0f64, |m, s| m.max(s.abs()));
    if peak == 0.0 || !peak.is_finite() {
        return Err(EffectError::DegenerateSignal);
    }

    Ok(ImpulseResponse {
        samples: shaped.iter().map(|s| (s / peak) as f32).collect(),
        sample_rate,
    })
}

/// Apply the reverb to a whole buffer and return the processed copy.
///
/// The amount and buffer are checked before `rng` is touched. The output has
/// the same channel count, frame count and spec as `audio`.
pub fn apply_reverb<R: Rng + ?Sized>(
    audio: &AudioData,
    amount: f32,
    rng: &mut R,
) -> Result<AudioData, EffectError> {
    let params = ReverbParameters::new(amount)?;
    if audio.is_empty() {
        return Err(EffectError::InvalidParameter("audio buffer is empty".into()));
    }
    if !audio.is_well_formed() {
        return Err(EffectError::InvalidParameter(format!(
            "{} samples cannot be split across {} channels",
            audio.len(),
            audio.num_channels
        )));
    }

    let impulse = synthesize_impulse(audio.sample_rate, rng)?;
    let (dry, wet) = (params.dry(), params.wet());

    let frames = audio.num_frames();
    let channels = audio.num_channels;
    let mut samples = vec![0.0f32; audio.len()];

    for c in 0..channels {
        let input = audio.channel(c);
        let reverberated = convolve(&input, &impulse.samples, frames)?;
        for (frame, (x, r)) in input.iter().zip(&reverberated).enumerate() {
            samples[frame * channels + c] = dry * x + wet * r;
        }
    }

    Ok(AudioData::new(samples, audio.spec))
}

/// The reverb as an [`AudioEffect`], owning its amount and random source.
pub struct ConvolutionReverb<R = ChaCha8Rng> {
    params: ReverbParameters,
    rng: R,
}

impl ConvolutionReverb<ChaCha8Rng> {
    /// Reproducible effect: the same seed yields the same impulse sequence.
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(ChaCha8Rng::seed_from_u64(seed))
    }

    pub fn from_entropy() -> Self {
        Self::with_rng(ChaCha8Rng::from_entropy())
    }
}

impl<R: Rng> ConvolutionReverb<R> {
    pub fn with_rng(rng: R) -> Self {
        Self {
            params: ReverbParameters { amount: MIN_AMOUNT },
            rng,
        }
    }

    pub fn amount(&self) -> f32 {
        self.params.amount()
    }

    pub fn set_amount(&mut self, amount: f32) -> Result<(), EffectError> {
        self.params = ReverbParameters::new(amount)?;
        Ok(())
    }

    /// Draw an impulse response from this effect's random source.
    pub fn impulse(&mut self, sample_rate: u32) -> Result<ImpulseResponse, EffectError> {
        synthesize_impulse(sample_rate, &mut self.rng)
    }
}

impl<R: Rng> AudioEffect for ConvolutionReverb<R> {
    fn name(&self) -> &str {
        "Convolution Reverb"
    }

    fn parameter_definitions(&self) -> Vec<ParameterDef> {
        vec![float_param(
            AMOUNT_PARAM,
            "Reverb amount (0 = dry, 100 = full wet over half-level dry)",
            MIN_AMOUNT,
            MIN_AMOUNT,
            MAX_AMOUNT,
        )]
    }

    fn set_parameters(&mut self, params: Parameters) -> Result<(), EffectError> {
        let mut next = self.params;

        for (key, value) in params {
            match key.as_str() {
                AMOUNT_PARAM => {
                    let amount = value.as_float().ok_or_else(|| {
                        EffectError::InvalidParameter("amount must be a number".into())
                    })?;
                    next = ReverbParameters::new(amount)?;
                }
                _ => {
                    return Err(EffectError::InvalidParameter(format!(
                        "Unknown parameter: {}",
                        key
                    )))
                }
            }
        }

        self.params = next;
        Ok(())
    }

    fn get_parameters(&self) -> Parameters {
        let mut params = Parameters::new();
        params.insert(
            AMOUNT_PARAM.to_string(),
            ParameterValue::Float(self.params.amount()),
        );
        params
    }

    fn process(&mut self, input: &AudioData) -> Result<AudioData, EffectError> {
        apply_reverb(input, self.params.amount(), &mut self.rng)
    }

    fn supports_format(&self, sample_rate: u32, channels: usize) -> bool {
        impulse_length(sample_rate) >= 1 && channels >= 1
    }
}
