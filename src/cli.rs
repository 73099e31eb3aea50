use crate::audio_io::{float_wav_spec, read_audio_file, write_audio_file, AudioData};
use crate::effects::reverb::{ConvolutionReverb, ReverbParameters};
use crate::effects::{AudioEffect, ParameterValue};
use crate::logging::init_logger;
use crate::playback::{Playback, WavRender};
use crate::session::Session;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use std::path::{Path, PathBuf};
use std::process;

/// Amount used when `--amount` is not given.
pub const DEFAULT_AMOUNT: f32 = 50.0;

#[derive(Parser, Debug)]
#[command(name = "reverbfx", version, about = "Synthetic convolution reverb for WAV files")]
pub struct Cli {
    /// Log debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Apply the reverb and write the result
    Apply {
        input: PathBuf,
        output: PathBuf,
        /// Reverb amount, 0 to 100
        #[arg(short, long, default_value_t = DEFAULT_AMOUNT, value_parser = parse_amount)]
        amount: f32,
        /// Seed for the impulse response (random if omitted)
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Play the input with the reverb applied
    Preview {
        input: PathBuf,
        #[arg(short, long, default_value_t = DEFAULT_AMOUNT, value_parser = parse_amount)]
        amount: f32,
        #[arg(long)]
        seed: Option<u64>,
        /// Write the preview to this WAV file instead of the audio device
        #[arg(long)]
        render: Option<PathBuf>,
    },
    /// Play the input unprocessed
    Play {
        input: PathBuf,
        /// Write to this WAV file instead of the audio device
        #[arg(long)]
        render: Option<PathBuf>,
    },
    /// Show the format of a WAV file
    Info { input: PathBuf },
    /// Write a synthesized impulse response as a mono float WAV
    Impulse {
        output: PathBuf,
        #[arg(long, default_value_t = 44_100)]
        sample_rate: u32,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// List the effect's parameters
    Params,
}

fn parse_amount(value: &str) -> Result<f32, String> {
    let amount: f32 = value
        .parse()
        .map_err(|_| format!("'{}' is not a number", value))?;
    ReverbParameters::new(amount)
        .map(|p| p.amount())
        .map_err(|e| e.to_string())
}

fn make_reverb(seed: Option<u64>) -> ConvolutionReverb {
    match seed {
        Some(seed) => ConvolutionReverb::seeded(seed),
        None => ConvolutionReverb::from_entropy(),
    }
}

fn output_for(render: Option<&Path>) -> Result<Box<dyn Playback>> {
    match render {
        Some(path) => Ok(Box::new(WavRender::new(path))),
        None => device_output(),
    }
}

#[cfg(feature = "playback")]
fn device_output() -> Result<Box<dyn Playback>> {
    Ok(Box::new(crate::playback::DevicePlayback::new()?))
}

#[cfg(not(feature = "playback"))]
fn device_output() -> Result<Box<dyn Playback>> {
    anyhow::bail!("built without the `playback` feature; pass --render <file.wav> to write the audio instead")
}

#[derive(Default)]
pub struct CliApp;

impl CliApp {
    pub fn new() -> Self {
        Self
    }

    pub fn run(&self, cli: Cli) -> Result<()> {
        match cli.command {
            Command::Apply {
                input,
                output,
                amount,
                seed,
            } => self.process_audio(&input, &output, amount, seed),
            Command::Preview {
                input,
                amount,
                seed,
                render,
            } => self.preview(&input, amount, seed, render.as_deref()),
            Command::Play { input, render } => self.play(&input, render.as_deref()),
            Command::Info { input } => self.show_file_info(&input),
            Command::Impulse {
                output,
                sample_rate,
                seed,
            } => self.write_impulse(&output, sample_rate, seed),
            Command::Params => {
                self.show_effect_info();
                Ok(())
            }
        }
    }

    fn load(&self, session: &mut Session, input: &Path) -> Result<()> {
        session
            .load_audio(input)
            .with_context(|| format!("Failed to read input file {}", input.display()))?;
        Ok(())
    }

    fn process_audio(&self, input: &Path, output: &Path, amount: f32, seed: Option<u64>) -> Result<()> {
        let mut session = Session::new(make_reverb(seed));
        self.load(&mut session, input)?;

        session
            .apply_effect(amount)
            .context("Failed to process audio")?;
        session
            .save_audio(output)
            .with_context(|| format!("Failed to write output file {}", output.display()))?;

        println!("Successfully wrote output to: {}", output.display());
        Ok(())
    }

    fn preview(&self, input: &Path, amount: f32, seed: Option<u64>, render: Option<&Path>) -> Result<()> {
        let mut session = Session::new(make_reverb(seed));
        self.load(&mut session, input)?;

        let mut out = output_for(render)?;
        session
            .preview_effect(amount, out.as_mut())
            .context("Failed to preview reverb")?;
        Ok(())
    }

    fn play(&self, input: &Path, render: Option<&Path>) -> Result<()> {
        let mut session = Session::new(make_reverb(None));
        self.load(&mut session, input)?;

        let mut out = output_for(render)?;
        session
            .play_original(out.as_mut())
            .context("Failed to play audio")?;
        Ok(())
    }

    fn show_file_info(&self, input: &Path) -> Result<()> {
        let audio = read_audio_file(input)
            .with_context(|| format!("Failed to read input file {}", input.display()))?;

        println!("File: {}", input.display());
        println!("  Channels:    {}", audio.num_channels);
        println!("  Sample rate: {} Hz", audio.sample_rate);
        println!("  Frames:      {}", audio.num_frames());
        println!("  Duration:    {:.2}s", audio.duration_seconds());
        println!(
            "  Format:      {} bit {:?}",
            audio.spec.bits_per_sample, audio.spec.sample_format
        );
        Ok(())
    }

    fn write_impulse(&self, output: &Path, sample_rate: u32, seed: Option<u64>) -> Result<()> {
        let mut reverb = make_reverb(seed);
        let impulse = reverb
            .impulse(sample_rate)
            .context("Failed to synthesize impulse response")?;

        let audio = AudioData::new(impulse.samples, float_wav_spec(1, sample_rate));
        write_audio_file(output, &audio)
            .with_context(|| format!("Failed to write impulse to {}", output.display()))?;

        info!(
            "Wrote {} sample impulse response to {}",
            audio.len(),
            output.display()
        );
        Ok(())
    }

    fn show_effect_info(&self) {
        let effect = ConvolutionReverb::seeded(0);
        let params = effect.parameter_definitions();

        println!("Effect: {}", effect.name());
        println!();
        println!("Parameters:");
        for param in &params {
            println!("  --{}", param.name);
            println!("    Description: {}", param.description);
            println!("    Default: {}", format_value(&param.default_value));
            if let (Some(min), Some(max)) = (&param.min_value, &param.max_value) {
                println!("    Range: {} to {}", format_value(min), format_value(max));
            }
            println!();
        }

        println!("Example:");
        println!("  reverbfx apply input.wav output.wav --amount {}", DEFAULT_AMOUNT);
    }
}

fn format_value(value: &ParameterValue) -> String {
    match value {
        ParameterValue::Float(v) => v.to_string(),
        ParameterValue::Int(v) => v.to_string(),
    }
}

pub fn run_cli() {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    if let Err(error) = CliApp::new().run(cli) {
        eprintln!("Error: {:#}", error);
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_io::default_wav_spec;
    use crate::effects::dsp::peak;
    use clap::CommandFactory;

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("reverbfx-{}-cli-{}.wav", std::process::id(), name))
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_apply_parsing() {
        let cli = Cli::try_parse_from([
            "reverbfx", "apply", "in.wav", "out.wav", "--amount", "75", "--seed", "9",
        ])
        .unwrap();

        match cli.command {
            Command::Apply {
                input,
                output,
                amount,
                seed,
            } => {
                assert_eq!(input, PathBuf::from("in.wav"));
                assert_eq!(output, PathBuf::from("out.wav"));
                assert_eq!(amount, 75.0);
                assert_eq!(seed, Some(9));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_default_amount() {
        let cli = Cli::try_parse_from(["reverbfx", "preview", "in.wav"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Preview { amount, render: None, .. } if amount == DEFAULT_AMOUNT
        ));
    }

    #[test]
    fn test_amount_out_of_range_rejected() {
        assert!(Cli::try_parse_from(["reverbfx", "apply", "a.wav", "b.wav", "--amount", "150"]).is_err());
        assert!(Cli::try_parse_from(["reverbfx", "apply", "a.wav", "b.wav", "--amount", "loud"]).is_err());
    }

    #[test]
    fn test_apply_writes_output() {
        let input = scratch_path("apply-in");
        let output = scratch_path("apply-out");
        let audio = AudioData::new(
            (0..2000).map(|i| if i % 400 == 0 { 0.5 } else { 0.0 }).collect(),
            default_wav_spec(2, 8000),
        );
        write_audio_file(&input, &audio).unwrap();

        let cli = Cli::try_parse_from([
            "reverbfx",
            "apply",
            input.to_str().unwrap(),
            output.to_str().unwrap(),
            "--seed",
            "1",
        ])
        .unwrap();
        CliApp::new().run(cli).unwrap();

        let written = read_audio_file(&output).unwrap();
        std::fs::remove_file(&input).ok();
        std::fs::remove_file(&output).ok();

        assert_eq!(written.spec, audio.spec);
        assert_eq!(written.num_frames(), audio.num_frames());
        assert_ne!(written.samples, audio.samples);
    }

    #[test]
    fn test_impulse_command() {
        let output = scratch_path("impulse");
        let cli = Cli::try_parse_from([
            "reverbfx",
            "impulse",
            output.to_str().unwrap(),
            "--sample-rate",
            "8000",
            "--seed",
            "3",
        ])
        .unwrap();
        CliApp::new().run(cli).unwrap();

        let impulse = read_audio_file(&output).unwrap();
        std::fs::remove_file(&output).ok();

        assert_eq!(impulse.num_channels, 1);
        assert_eq!(impulse.sample_rate, 8000);
        assert_eq!(impulse.len(), 2400);
        assert!((peak(&impulse.samples) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_missing_input_reports_error() {
        let cli = Cli::try_parse_from(["reverbfx", "info", "/definitely/not/here.wav"]).unwrap();
        assert!(CliApp::new().run(cli).is_err());
    }
}
