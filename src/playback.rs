//! Audio output for previews.
//!
//! Every [`Playback`] blocks until the whole buffer has been rendered.

use crate::audio_io::{write_audio_file, AudioData, AudioError};
use log::info;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("no audio output device is available")]
    NoDevice,
    #[error("audio device error: {0}")]
    Device(String),
    #[error(transparent)]
    Render(#[from] AudioError),
}

pub trait Playback {
    /// Render `audio` and return once it has finished.
    fn play(&mut self, audio: &AudioData) -> Result<(), PlaybackError>;
}

/// Renders playback into a WAV file instead of a device.
pub struct WavRender {
    path: PathBuf,
}

impl WavRender {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl Playback for WavRender {
    fn play(&mut self, audio: &AudioData) -> Result<(), PlaybackError> {
        write_audio_file(&self.path, audio)?;
        info!("Rendered {:.2}s of audio to {}", audio.duration_seconds(), self.path.display());
        Ok(())
    }
}

#[cfg(feature = "playback")]
pub use device::DevicePlayback;

#[cfg(feature = "playback")]
mod device {
    use super::{Playback, PlaybackError};
    use crate::audio_io::AudioData;
    use cpal::{
        traits::{DeviceTrait, HostTrait, StreamTrait},
        BufferSize, Device, FromSample, Sample, SampleRate, SizedSample, Stream, StreamConfig,
    };
    use log::{info, warn};
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::time::Duration;

    /// Extra time allowed for the device to drain its last buffer.
    const DRAIN_GRACE: Duration = Duration::from_millis(500);

    /// Plays through the system's default output device.
    pub struct DevicePlayback {
        device: Device,
    }

    impl DevicePlayback {
        pub fn new() -> Result<Self, PlaybackError> {
            let host = cpal::default_host();
            let device = host.default_output_device().ok_or(PlaybackError::NoDevice)?;
            info!(
                "Output device: {}",
                device.name().unwrap_or_else(|_| "unknown".to_string())
            );
            Ok(Self { device })
        }

        fn make_stream<T>(
            &self,
            config: &StreamConfig,
            samples: Arc<Vec<f32>>,
            done: mpsc::SyncSender<()>,
        ) -> Result<Stream, PlaybackError>
        where
            T: SizedSample + FromSample<f32>,
        {
            let mut cursor = 0usize;
            let mut finished = false;
            let err_fn = |err| warn!("Error on output stream: {}", err);

            self.device
                .build_output_stream(
                    config,
                    move |output: &mut [T], _: &cpal::OutputCallbackInfo| {
                        for sample in output.iter_mut() {
                            let value = samples.get(cursor).copied().unwrap_or(0.0);
                            *sample = <T as Sample>::from_sample(value);
                            cursor += 1;
                        }
                        if cursor >= samples.len() && !finished {
                            finished = true;
                            let _ = done.try_send(());
                        }
                    },
                    err_fn,
                    None,
                )
                .map_err(|e| PlaybackError::Device(e.to_string()))
        }
    }

    impl Playback for DevicePlayback {
        fn play(&mut self, audio: &AudioData) -> Result<(), PlaybackError> {
            let supported = self
                .device
                .default_output_config()
                .map_err(|e| PlaybackError::Device(e.to_string()))?;

            let config = StreamConfig {
                channels: audio.num_channels as u16,
                sample_rate: SampleRate(audio.sample_rate),
                buffer_size: BufferSize::Default,
            };

            let samples = Arc::new(audio.samples.clone());
            let (done_tx, done_rx) = mpsc::sync_channel(1);

            let stream = match supported.sample_format() {
                cpal::SampleFormat::I16 => self.make_stream::<i16>(&config, samples, done_tx)?,
                cpal::SampleFormat::I32 => self.make_stream::<i32>(&config, samples, done_tx)?,
                cpal::SampleFormat::U16 => self.make_stream::<u16>(&config, samples, done_tx)?,
                cpal::SampleFormat::F32 => self.make_stream::<f32>(&config, samples, done_tx)?,
                cpal::SampleFormat::F64 => self.make_stream::<f64>(&config, samples, done_tx)?,
                sample_format => {
                    return Err(PlaybackError::Device(format!(
                        "Unsupported sample format '{}'",
                        sample_format
                    )))
                }
            };

            stream
                .play()
                .map_err(|e| PlaybackError::Device(e.to_string()))?;
            info!(
                "Playing {:.2}s at {} Hz, {} channels",
                audio.duration_seconds(),
                audio.sample_rate,
                audio.num_channels
            );

            let timeout = Duration::from_secs_f64(audio.duration_seconds()) + DRAIN_GRACE;
            if done_rx.recv_timeout(timeout).is_err() {
                warn!("Playback did not finish within {:.2}s", timeout.as_secs_f64());
            }
            // Let the final device buffer play out before the stream drops.
            std::thread::sleep(DRAIN_GRACE);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_io::{default_wav_spec, read_audio_file};

    #[test]
    fn test_wav_render_writes_buffer() {
        let path = std::env::temp_dir().join(format!("reverbfx-{}-render.wav", std::process::id()));
        let audio = AudioData::new(vec![0.0, 0.5, -0.5, 0.25], default_wav_spec(2, 8000));

        let mut render = WavRender::new(&path);
        render.play(&audio).unwrap();

        let written = read_audio_file(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(written, audio);
    }

    #[test]
    fn test_wav_render_reports_io_failure() {
        let audio = AudioData::new(vec![0.0; 4], default_wav_spec(1, 8000));
        let mut render = WavRender::new("/nonexistent-dir/preview.wav");
        assert!(matches!(render.play(&audio), Err(PlaybackError::Render(_))));
    }
}
