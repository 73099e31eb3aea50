use dasp::Sample;
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use log::debug;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("Audio file not found: {0}")]
    FileNotFound(String),
    #[error("Invalid audio format: {0}")]
    InvalidFormat(String),
    #[error("I/O error: {0}")]
    Io(String),
}

/// A decoded audio buffer.
///
/// Samples are interleaved frame by frame (`L R L R ...` for stereo) and
/// normalized to `[-1.0, 1.0]` at decode time. Processing may push values
/// past that range; the encoder clamps when quantizing.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioData {
    pub samples: Vec<f32>,
    pub spec: WavSpec,
    pub num_channels: usize,
    pub sample_rate: u32,
}

impl AudioData {
    pub fn new(samples: Vec<f32>, spec: WavSpec) -> Self {
        Self {
            num_channels: spec.channels as usize,
            sample_rate: spec.sample_rate,
            samples,
            spec,
        }
    }

    /// Build an interleaved buffer from planar channels.
    ///
    /// Fails if no channels are given or the channels differ in length.
    pub fn from_channels(channels: &[Vec<f32>], spec: WavSpec) -> Result<Self, AudioError> {
        let frames = channels
            .first()
            .map(Vec::len)
            .ok_or_else(|| AudioError::InvalidFormat("at least one channel is required".into()))?;
        if channels.iter().any(|c| c.len() != frames) {
            return Err(AudioError::InvalidFormat(
                "all channels must have the same length".into(),
            ));
        }

        let mut samples = Vec::with_capacity(frames * channels.len());
        for frame in 0..frames {
            samples.extend(channels.iter().map(|c| c[frame]));
        }

        let spec = WavSpec {
            channels: channels.len() as u16,
            ..spec
        };
        Ok(Self::new(samples, spec))
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of frames (samples per channel).
    pub fn num_frames(&self) -> usize {
        if self.num_channels == 0 {
            return 0;
        }
        self.samples.len() / self.num_channels
    }

    /// True when every channel holds the same number of samples.
    pub fn is_well_formed(&self) -> bool {
        self.num_channels > 0 && self.samples.len() % self.num_channels == 0
    }

    /// Copy one channel out of the interleaved buffer.
    pub fn channel(&self, index: usize) -> Vec<f32> {
        self.samples
            .iter()
            .skip(index)
            .step_by(self.num_channels.max(1))
            .copied()
            .collect()
    }

    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.num_frames() as f64 / self.sample_rate as f64
    }
}

/// Read a WAV file and return samples as f32 values normalized to [-1.0, 1.0].
///
/// Integer PCM at 8, 16, 24 and 32 bits and 32-bit float are accepted.
pub fn read_audio_file<P: AsRef<Path>>(path: P) -> Result<AudioData, AudioError> {
    let path_str = path.as_ref().to_string_lossy().to_string();

    let mut reader = WavReader::open(&path)
        .map_err(|e| AudioError::FileNotFound(format!("{}: {}", path_str, e)))?;

    let spec = reader.spec();

    let samples: Result<Vec<f32>, hound::Error> = match (spec.sample_format, spec.bits_per_sample)
    {
        (SampleFormat::Int, 8) => reader
            .samples::<i8>()
            .map(|s| s.map(|s| s.to_sample::<f32>()))
            .collect(),
        (SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .map(|s| s.map(|s| s.to_sample::<f32>()))
            .collect(),
        (SampleFormat::Int, bits @ (24 | 32)) => {
            let scale = int_scale(bits);
            reader
                .samples::<i32>()
                .map(|s| s.map(|s| (s as f64 / scale) as f32))
                .collect()
        }
        (SampleFormat::Float, 32) => reader.samples::<f32>().collect(),
        (format, bits) => {
            return Err(AudioError::InvalidFormat(format!(
                "{} bit {:?} samples are not supported",
                bits, format
            )))
        }
    };

    let samples =
        samples.map_err(|e| AudioError::Io(format!("Failed to read samples: {}", e)))?;

    let audio = AudioData::new(samples, spec);
    if !audio.is_well_formed() {
        return Err(AudioError::InvalidFormat(format!(
            "{} samples cannot be split across {} channels",
            audio.len(),
            audio.num_channels
        )));
    }

    debug!(
        "decoded {}: {} channels, {} Hz, {} frames",
        path_str,
        audio.num_channels,
        audio.sample_rate,
        audio.num_frames()
    );
    Ok(audio)
}

/// Write a buffer to a WAV file using the buffer's own spec.
///
/// Integer formats are clamped to their representable range; float output is
/// written unchanged.
pub fn write_audio_file<P: AsRef<Path>>(path: P, audio: &AudioData) -> Result<(), AudioError> {
    let path_str = path.as_ref().to_string_lossy().to_string();
    let spec = audio.spec;

    if !audio.is_well_formed() {
        return Err(AudioError::InvalidFormat(format!(
            "{} samples cannot be split across {} channels",
            audio.len(),
            audio.num_channels
        )));
    }

    let mut writer = WavWriter::create(&path, spec)
        .map_err(|e| AudioError::Io(format!("Failed to create {}: {}", path_str, e)))?;

    let written = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Int, 8) => audio
            .samples
            .iter()
            .try_for_each(|&s| writer.write_sample(clamp_unit(s).to_sample::<i8>())),
        (SampleFormat::Int, 16) => audio
            .samples
            .iter()
            .try_for_each(|&s| writer.write_sample(f32_to_i16(s))),
        (SampleFormat::Int, bits @ (24 | 32)) => {
            let scale = int_scale(bits);
            let max = scale - 1.0;
            audio.samples.iter().try_for_each(|&s| {
                let value = (s as f64 * scale).round().clamp(-scale, max) as i32;
                writer.write_sample(value)
            })
        }
        (SampleFormat::Float, 32) => audio
            .samples
            .iter()
            .try_for_each(|&s| writer.write_sample(s)),
        (format, bits) => {
            return Err(AudioError::InvalidFormat(format!(
                "cannot encode {} bit {:?} samples",
                bits, format
            )))
        }
    };
    written.map_err(|e| AudioError::Io(format!("Failed to write sample: {}", e)))?;

    writer
        .finalize()
        .map_err(|e| AudioError::Io(format!("Failed to finalize {}: {}", path_str, e)))?;

    debug!("encoded {} ({} samples)", path_str, audio.len());
    Ok(())
}

fn int_scale(bits: u16) -> f64 {
    (1u64 << (bits - 1)) as f64
}

fn clamp_unit(sample: f32) -> f32 {
    sample.clamp(-1.0, 1.0)
}

/// Convert i16 sample to f32 normalized to [-1.0, 1.0]
pub fn i16_to_f32(sample: i16) -> f32 {
    sample.to_sample::<f32>()
}

/// Convert f32 sample to i16, clamping to valid range
pub fn f32_to_i16(sample: f32) -> i16 {
    clamp_unit(sample).to_sample::<i16>()
}

/// Create a default WAV spec for output files
pub fn default_wav_spec(channels: u16, sample_rate: u32) -> WavSpec {
    WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    }
}

/// Spec for 32-bit float output, which survives values outside [-1.0, 1.0].
pub fn float_wav_spec(channels: u16, sample_rate: u32) -> WavSpec {
    WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("reverbfx-{}-{}.wav", std::process::id(), name))
    }

    #[test]
    fn test_sample_conversion() {
        assert_eq!(i16_to_f32(0), 0.0);
        assert_eq!(i16_to_f32(16384), 0.5);
        assert_eq!(i16_to_f32(-32768), -1.0);

        assert_eq!(f32_to_i16(0.0), 0);
        assert_eq!(f32_to_i16(0.5), 16384);
        assert_eq!(f32_to_i16(-1.0), -32768);

        // Out of range values are clamped
        assert_eq!(f32_to_i16(2.0), 32767);
        assert_eq!(f32_to_i16(-2.0), -32768);
    }

    #[test]
    fn test_default_wav_spec() {
        let spec = default_wav_spec(2, 44100);
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.sample_rate, 44100);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(spec.sample_format, SampleFormat::Int);
    }

    #[test]
    fn test_channel_layout() {
        let left = vec![1.0, 2.0, 3.0];
        let right = vec![-1.0, -2.0, -3.0];
        let audio =
            AudioData::from_channels(&[left.clone(), right.clone()], default_wav_spec(1, 8000))
                .unwrap();

        assert_eq!(audio.num_channels, 2);
        assert_eq!(audio.spec.channels, 2);
        assert_eq!(audio.num_frames(), 3);
        assert_eq!(audio.samples, vec![1.0, -1.0, 2.0, -2.0, 3.0, -3.0]);
        assert_eq!(audio.channel(0), left);
        assert_eq!(audio.channel(1), right);
    }

    #[test]
    fn test_ragged_channels_rejected() {
        let result = AudioData::from_channels(
            &[vec![0.0; 3], vec![0.0; 2]],
            default_wav_spec(2, 8000),
        );
        assert!(matches!(result, Err(AudioError::InvalidFormat(_))));
        assert!(AudioData::from_channels(&[], default_wav_spec(2, 8000)).is_err());
    }

    #[test]
    fn test_duration() {
        let audio = AudioData::new(vec![0.0; 88200], default_wav_spec(2, 44100));
        assert_eq!(audio.num_frames(), 44100);
        assert!((audio.duration_seconds() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_pcm16_round_trip_preserves_layout() {
        let path = scratch_path("pcm16");
        let samples: Vec<f32> = (-8..8).map(|i| i as f32 / 16.0).collect();
        let audio = AudioData::new(samples, default_wav_spec(2, 22050));

        write_audio_file(&path, &audio).unwrap();
        let decoded = read_audio_file(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(decoded.spec, audio.spec);
        assert_eq!(decoded.num_channels, 2);
        assert_eq!(decoded.sample_rate, 22050);
        assert_eq!(decoded.samples, audio.samples);
    }

    #[test]
    fn test_float_round_trip_keeps_out_of_range_values() {
        let path = scratch_path("float");
        let audio = AudioData::new(vec![1.5, -2.25, 0.125], float_wav_spec(1, 48000));

        write_audio_file(&path, &audio).unwrap();
        let decoded = read_audio_file(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(decoded, audio);
    }

    #[test]
    fn test_pcm24_round_trip() {
        let path = scratch_path("pcm24");
        let spec = WavSpec {
            channels: 1,
            sample_rate: 44100,
            bits_per_sample: 24,
            sample_format: SampleFormat::Int,
        };
        let audio = AudioData::new(vec![0.0, 0.5, -0.25, -1.0], spec);

        write_audio_file(&path, &audio).unwrap();
        let decoded = read_audio_file(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(decoded.samples, audio.samples);
    }

    #[test]
    fn test_missing_file() {
        let result = read_audio_file("/definitely/not/here.wav");
        assert!(matches!(result, Err(AudioError::FileNotFound(_))));
    }
}
