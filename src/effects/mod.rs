use crate::audio_io::AudioData;
use std::collections::HashMap;
use thiserror::Error;

pub mod reverb;

/// Errors raised while configuring or running an effect.
#[derive(Debug, Error)]
pub enum EffectError {
    /// Out-of-range amount, unusable sample rate, empty or malformed buffer,
    /// or an unknown parameter.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    /// Impulse synthesis produced an envelope with no energy.
    #[error("impulse response is silent and cannot be normalized")]
    DegenerateSignal,
    #[error("convolution failed: {0}")]
    Convolution(#[from] realfft::FftError),
}

/// Common parameter types for audio effects
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterValue {
    Float(f32),
    Int(i32),
}

impl ParameterValue {
    pub fn as_float(&self) -> Option<f32> {
        match self {
            ParameterValue::Float(v) => Some(*v),
            ParameterValue::Int(v) => Some(*v as f32),
        }
    }
}

/// Parameter definition for effects
#[derive(Debug, Clone)]
pub struct ParameterDef {
    pub name: String,
    pub description: String,
    pub default_value: ParameterValue,
    pub min_value: Option<ParameterValue>,
    pub max_value: Option<ParameterValue>,
}

/// Collection of parameters for an effect
pub type Parameters = HashMap<String, ParameterValue>;

/// Common trait for all audio effects
///
/// Effects run over a whole buffer at once and hand back a new buffer; the
/// input is never modified.
pub trait AudioEffect {
    /// Get the name of the effect
    fn name(&self) -> &str;

    /// Get parameter definitions for this effect
    fn parameter_definitions(&self) -> Vec<ParameterDef>;

    /// Set effect parameters. On error no parameter is changed.
    fn set_parameters(&mut self, params: Parameters) -> Result<(), EffectError>;

    /// Get current parameter values
    fn get_parameters(&self) -> Parameters;

    /// Process audio data through the effect
    fn process(&mut self, input: &AudioData) -> Result<AudioData, EffectError>;

    /// Check if the effect supports the given sample rate and channel count
    fn supports_format(&self, sample_rate: u32, channels: usize) -> bool {
        (8000..=192_000).contains(&sample_rate) && (1..=8).contains(&channels)
    }
}

pub fn float_param(name: &str, desc: &str, default: f32, min: f32, max: f32) -> ParameterDef {
    ParameterDef {
        name: name.to_string(),
        description: desc.to_string(),
        default_value: ParameterValue::Float(default),
        min_value: Some(ParameterValue::Float(min)),
        max_value: Some(ParameterValue::Float(max)),
    }
}

/// Common DSP utilities
pub mod dsp {
    use realfft::{FftError, RealFftPlanner};

    /// Above this many multiply-adds the FFT path is faster than direct
    /// summation.
    const DIRECT_CONVOLUTION_LIMIT: usize = 1 << 16;

    /// Largest absolute sample value, or 0.0 for an empty slice.
    pub fn peak(samples: &[f32]) -> f32 {
        samples.iter().fold(0.0f32, |m, s| m.max(s.abs()))
    }

    /// `exp(-exponent * t)` sampled at `len` evenly spaced points with t
    /// running from 0 to 1 inclusive.
    pub fn exponential_decay(len: usize, exponent: f64) -> Vec<f64> {
        match len {
            0 => Vec::new(),
            1 => vec![1.0],
            _ => {
                let last = (len - 1) as f64;
                (0..len)
                    .map(|i| (-exponent * i as f64 / last).exp())
                    .collect()
            }
        }
    }

    /// The first `out_len` samples of the linear convolution of `signal`
    /// with `kernel`. Positions past the full convolution are zero.
    pub fn convolve(signal: &[f32], kernel: &[f32], out_len: usize) -> Result<Vec<f32>, FftError> {
        if signal.is_empty() || kernel.is_empty() {
            return Ok(vec![0.0; out_len]);
        }
        if signal.len().saturating_mul(kernel.len()) <= DIRECT_CONVOLUTION_LIMIT {
            Ok(convolve_direct(signal, kernel, out_len))
        } else {
            convolve_fft(signal, kernel, out_len)
        }
    }

    /// Time-domain convolution, O(out_len * kernel.len()).
    pub fn convolve_direct(signal: &[f32], kernel: &[f32], out_len: usize) -> Vec<f32> {
        let mut out = vec![0.0f32; out_len];
        if signal.is_empty() {
            return out;
        }

        for (n, y) in out.iter_mut().enumerate() {
            let k_start = n.saturating_sub(signal.len() - 1);
            let k_end = kernel.len().min(n + 1);
            let mut acc = 0.0f64;
            for k in k_start..k_end {
                acc += kernel[k] as f64 * signal[n - k] as f64;
            }
            *y = acc as f32;
        }
        out
    }

    /// Zero-padded real FFT convolution computed in f64.
    pub fn convolve_fft(signal: &[f32], kernel: &[f32], out_len: usize) -> Result<Vec<f32>, FftError> {
        if signal.is_empty() || kernel.is_empty() {
            return Ok(vec![0.0; out_len]);
        }

        let full_len = signal.len() + kernel.len() - 1;
        let fft_size = full_len.next_power_of_two();

        let mut planner = RealFftPlanner::<f64>::new();
        let forward = planner.plan_fft_forward(fft_size);
        let inverse = planner.plan_fft_inverse(fft_size);
        let mut scratch = forward.make_scratch_vec();

        let mut signal_buf = forward.make_input_vec();
        for (dst, &src) in signal_buf.iter_mut().zip(signal) {
            *dst = src as f64;
        }
        let mut signal_spec = forward.make_output_vec();
        forward.process_with_scratch(&mut signal_buf, &mut signal_spec, &mut scratch)?;

        let mut kernel_buf = forward.make_input_vec();
        for (dst, &src) in kernel_buf.iter_mut().zip(kernel) {
            *dst = src as f64;
        }
        let mut kernel_spec = forward.make_output_vec();
        forward.process_with_scratch(&mut kernel_buf, &mut kernel_spec, &mut scratch)?;

        for (s, k) in signal_spec.iter_mut().zip(&kernel_spec) {
            *s = *s * *k;
        }

        let mut out_buf = inverse.make_output_vec();
        let mut inverse_scratch = inverse.make_scratch_vec();
        inverse.process_with_scratch(&mut signal_spec, &mut out_buf, &mut inverse_scratch)?;

        // realfft's inverse is unnormalized
        let norm = 1.0 / fft_size as f64;
        let mut out: Vec<f32> = out_buf
            .iter()
            .take(full_len.min(out_len))
            .map(|&s| (s * norm) as f32)
            .collect();
        out.resize(out_len, 0.0);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_value_conversions() {
        let float_val = ParameterValue::Float(3.5);
        assert_eq!(float_val.as_float(), Some(3.5));

        let int_val = ParameterValue::Int(42);
        assert_eq!(int_val.as_float(), Some(42.0));
    }

    #[test]
    fn test_float_param() {
        let def = float_param("amount", "Reverb amount", 0.0, 0.0, 100.0);
        assert_eq!(def.name, "amount");
        assert_eq!(def.default_value, ParameterValue::Float(0.0));
        assert_eq!(def.max_value, Some(ParameterValue::Float(100.0)));
    }

    #[test]
    fn test_peak() {
        use crate::effects::dsp::peak;

        assert_eq!(peak(&[]), 0.0);
        assert_eq!(peak(&[0.25, -0.75, 0.5]), 0.75);
    }

    #[test]
    fn test_exponential_decay() {
        use crate::effects::dsp::exponential_decay;

        assert!(exponential_decay(0, 5.0).is_empty());
        assert_eq!(exponential_decay(1, 5.0), vec![1.0]);

        let env = exponential_decay(11, 5.0);
        assert_eq!(env[0], 1.0);
        assert!((env[10] - (-5.0f64).exp()).abs() < 1e-12);
        assert!((env[5] - (-2.5f64).exp()).abs() < 1e-12);
        assert!(env.windows(2).all(|w| w[1] < w[0]));
    }

    #[test]
    fn test_direct_convolution() {
        use crate::effects::dsp::convolve_direct;

        let full = convolve_direct(&[1.0, 2.0, 3.0], &[1.0, 0.5], 4);
        assert_eq!(full, vec![1.0, 2.5, 4.0, 1.5]);

        // Truncated to the signal length
        let truncated = convolve_direct(&[1.0, 2.0, 3.0], &[1.0, 0.5], 3);
        assert_eq!(truncated, vec![1.0, 2.5, 4.0]);

        // Padded past the full convolution
        let padded = convolve_direct(&[1.0], &[0.5, 0.25], 4);
        assert_eq!(padded, vec![0.5, 0.25, 0.0, 0.0]);
    }

    #[test]
    fn test_fft_matches_direct() {
        use crate::effects::dsp::{convolve_direct, convolve_fft};

        let signal: Vec<f32> = (0..1000).map(|i| ((i * 37 % 101) as f32 / 50.0) - 1.0).collect();
        let kernel: Vec<f32> = (0..300).map(|i| (-(i as f32) / 60.0).exp()).collect();

        let direct = convolve_direct(&signal, &kernel, signal.len());
        let fft = convolve_fft(&signal, &kernel, signal.len()).unwrap();

        assert_eq!(direct.len(), fft.len());
        for (d, f) in direct.iter().zip(&fft) {
            assert!((d - f).abs() < 1e-4, "{} vs {}", d, f);
        }
    }

    #[test]
    fn test_convolve_empty_inputs() {
        use crate::effects::dsp::convolve;

        assert_eq!(convolve(&[], &[1.0], 3).unwrap(), vec![0.0; 3]);
        assert_eq!(convolve(&[1.0], &[], 2).unwrap(), vec![0.0; 2]);
    }
}
