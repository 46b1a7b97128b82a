use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;
use std::path::PathBuf;
use std::time::Duration;

use boxbeat::audio::{AudioOutput, RodioOutput, SilentOutput};
use boxbeat::{app, headless, Visualizer, VisualizerConfig};

#[derive(Parser, Debug)]
#[command(name = "boxbeat")]
#[command(about = "Audio-reactive boxes: four frequency bands, four animated cubes")]
struct Args {
    /// Audio file to play (MP3, WAV, FLAC, OGG)
    #[arg(long)]
    audio: Option<PathBuf>,

    /// JSON configuration file
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Analysis window size in samples (power of two)
    #[arg(long)]
    fft_size: Option<usize>,

    /// Spectrum smoothing constant, 0 to 1
    #[arg(long)]
    smoothing: Option<f32>,

    /// Playback volume, 0 to 1
    #[arg(long)]
    volume: Option<f32>,

    /// Print band levels to the terminal instead of opening a window
    #[arg(long)]
    headless: bool,

    /// Keep time without opening an audio device
    #[arg(long)]
    mute: bool,

    /// Stop a headless run after this many seconds
    #[arg(long)]
    duration: Option<f32>,
}

impl Args {
    fn build_config(&self) -> Result<VisualizerConfig> {
        let mut config = match &self.config {
            Some(path) => VisualizerConfig::load(path)?,
            None => VisualizerConfig::default(),
        };

        if let Some(audio) = &self.audio {
            config.asset_path = audio.clone();
        }
        if let Some(fft_size) = self.fft_size {
            config.analysis.fft_size = fft_size;
        }
        if let Some(smoothing) = self.smoothing {
            config.analysis.smoothing_time_constant = smoothing;
        }
        if let Some(volume) = self.volume {
            config.volume = volume;
        }

        config.validate().context("Invalid command line options")?;
        Ok(config)
    }

    fn duration(&self) -> Result<Option<Duration>> {
        match self.duration {
            Some(secs) if !secs.is_finite() || secs <= 0.0 => bail!("--duration must be a positive number of seconds"),
            Some(secs) => Ok(Some(Duration::from_secs_f32(secs))),
            None => Ok(None),
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = args.build_config()?;
    let duration = args.duration()?;

    info!("Starting boxbeat");
    info!("Audio file: {}", config.asset_path.display());
    info!("FFT size: {}, smoothing: {}", config.analysis.fft_size, config.analysis.smoothing_time_constant);

    let output: Box<dyn AudioOutput> = if args.mute {
        Box::new(SilentOutput::default())
    } else {
        Box::new(RodioOutput::new(config.volume))
    };
    let visualizer = Visualizer::new(&config, output);

    if args.headless {
        headless::run(visualizer, duration)
    } else {
        app::run(visualizer)
    }
}
