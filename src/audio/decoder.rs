use anyhow::{bail, Context, Result};
use log::info;
use rodio::{Decoder, Source};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// An audio asset decoded fully into memory.
///
/// `samples` keeps the interleaved PCM handed to the output device, `mono` is
/// the per-frame channel average that the analyser reads.
#[derive(Debug)]
pub struct DecodedAudio {
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<i16>,
    pub mono: Vec<f32>,
}

impl DecodedAudio {
    pub fn from_interleaved(samples: Vec<i16>, channels: u16, sample_rate: u32) -> Result<Self> {
        if channels == 0 {
            bail!("Audio reports zero channels");
        }
        if sample_rate == 0 {
            bail!("Audio reports a zero sample rate");
        }
        if samples.len() < channels as usize {
            bail!("Audio contains no complete frames");
        }

        // Mix to mono for analysis
        let mono = samples
            .chunks_exact(channels as usize)
            .map(|chunk| {
                let sum: f32 = chunk.iter().map(|&s| s as f32 / 32768.0).sum();
                sum / channels as f32
            })
            .collect();

        Ok(Self {
            sample_rate,
            channels,
            samples,
            mono,
        })
    }

    /// Number of sample frames (one sample per channel each).
    pub fn frames(&self) -> usize {
        self.mono.len()
    }

    pub fn duration_secs(&self) -> f32 {
        self.frames() as f32 / self.sample_rate as f32
    }
}

/// Open and decode an audio file with whatever codecs rodio was built with.
pub fn decode_file<P: AsRef<Path>>(path: P) -> Result<DecodedAudio> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open audio asset {}", path.display()))?;
    let source = Decoder::new(BufReader::new(file))
        .with_context(|| format!("Failed to decode audio asset {}", path.display()))?;

    let sample_rate = source.sample_rate();
    let channels = source.channels();
    let samples: Vec<i16> = source.collect();

    let audio = DecodedAudio::from_interleaved(samples, channels, sample_rate)
        .with_context(|| format!("Unusable audio asset {}", path.display()))?;

    info!(
        "Decoded {:?} ({}Hz, {} channels, {} frames, {:.1}s)",
        path,
        audio.sample_rate,
        audio.channels,
        audio.frames(),
        audio.duration_secs()
    );

    Ok(audio)
}
