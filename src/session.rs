//! Load / preview / apply / save workflow around the reverb.
//!
//! A [`Session`] is either empty, holding a loaded file, or holding a loaded
//! file plus its processed version. Failed actions leave it where it was.

use crate::audio_io::{read_audio_file, write_audio_file, AudioData, AudioError};
use crate::effects::reverb::ConvolutionReverb;
use crate::effects::{AudioEffect, EffectError};
use crate::playback::{Playback, PlaybackError};
use log::info;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no audio file is loaded")]
    NoAudioLoaded,
    #[error("no processed audio to save; apply the effect first")]
    NothingToSave,
    #[error(transparent)]
    Audio(#[from] AudioError),
    #[error(transparent)]
    Effect(#[from] EffectError),
    #[error(transparent)]
    Playback(#[from] PlaybackError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Empty,
    Loaded {
        original: AudioData,
    },
    Processed {
        original: AudioData,
        processed: AudioData,
    },
}

impl SessionState {
    pub fn original(&self) -> Option<&AudioData> {
        match self {
            SessionState::Empty => None,
            SessionState::Loaded { original } | SessionState::Processed { original, .. } => {
                Some(original)
            }
        }
    }

    pub fn processed(&self) -> Option<&AudioData> {
        match self {
            SessionState::Processed { processed, .. } => Some(processed),
            _ => None,
        }
    }
}

pub struct Session<R = ChaCha8Rng> {
    state: SessionState,
    reverb: ConvolutionReverb<R>,
}

impl<R: Rng> Session<R> {
    pub fn new(reverb: ConvolutionReverb<R>) -> Self {
        Self {
            state: SessionState::Empty,
            reverb,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Replace whatever is loaded with already-decoded audio.
    pub fn load(&mut self, audio: AudioData) {
        self.state = SessionState::Loaded { original: audio };
    }

    /// Decode `path` and make it the current file. Any processed result is
    /// dropped.
    pub fn load_audio<P: AsRef<Path>>(&mut self, path: P) -> Result<&AudioData, SessionError> {
        let audio = read_audio_file(&path)?;
        info!(
            "Loaded {}: {} channels, {} Hz, {:.2}s",
            path.as_ref().display(),
            audio.num_channels,
            audio.sample_rate,
            audio.duration_seconds()
        );
        self.load(audio);
        self.state.original().ok_or(SessionError::NoAudioLoaded)
    }

    pub fn play_original(&self, output: &mut dyn Playback) -> Result<(), SessionError> {
        let original = self.state.original().ok_or(SessionError::NoAudioLoaded)?;
        output.play(original)?;
        Ok(())
    }

    /// Run the effect on the loaded file and play the result without keeping
    /// it. Each preview draws a new impulse, so it will not match a later
    /// apply exactly.
    pub fn preview_effect(&mut self, amount: f32, output: &mut dyn Playback) -> Result<(), SessionError> {
        let preview = self.render(amount)?;
        info!("Previewing reverb at amount {}", amount);
        output.play(&preview)?;
        Ok(())
    }

    /// Run the effect on the loaded file and keep the result for saving.
    pub fn apply_effect(&mut self, amount: f32) -> Result<&AudioData, SessionError> {
        let processed = self.render(amount)?;
        let original = match std::mem::replace(&mut self.state, SessionState::Empty) {
            SessionState::Loaded { original } | SessionState::Processed { original, .. } => original,
            SessionState::Empty => return Err(SessionError::NoAudioLoaded),
        };
        info!("Applied reverb at amount {}", amount);
        self.state = SessionState::Processed { original, processed };
        self.state.processed().ok_or(SessionError::NothingToSave)
    }

    pub fn save_audio<P: AsRef<Path>>(&self, path: P) -> Result<(), SessionError> {
        let processed = self.state.processed().ok_or(SessionError::NothingToSave)?;
        write_audio_file(&path, processed)?;
        info!("Saved processed audio to {}", path.as_ref().display());
        Ok(())
    }

    fn render(&mut self, amount: f32) -> Result<AudioData, SessionError> {
        let original = self.state.original().ok_or(SessionError::NoAudioLoaded)?;
        self.reverb.set_amount(amount)?;
        Ok(self.reverb.process(original)?)
    }
}
