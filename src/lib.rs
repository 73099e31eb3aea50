pub mod audio_io;
pub mod cli;
pub mod effects;
pub mod logging;
pub mod playback;
pub mod session;
