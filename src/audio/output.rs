use anyhow::{anyhow, Context, Result};
use log::info;
use rodio::{OutputStream, OutputStreamHandle, Sink, Source};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::DecodedAudio;

/// One playback of the decoded asset.
///
/// Handles are one-shot: `stop` consumes the handle, and playing again
/// means asking the output for a fresh one.
pub trait PlaybackHandle {
    /// Sample frames consumed by the device so far.
    fn position_frames(&self) -> usize;

    /// True once every sample of the asset has been handed to the device.
    fn is_finished(&self) -> bool;

    fn stop(self: Box<Self>);
}

/// Where decoded audio gets played.
///
/// The real implementation talks to the default device through rodio; the
/// silent one only advances a clock, which keeps headless runs and machines
/// without a sound card working.
pub trait AudioOutput {
    /// Open the device. Called once per initialization attempt; must be
    /// idempotent.
    fn open(&mut self) -> Result<()>;

    /// Start a new playback of `audio` from its first frame.
    fn start(&mut self, audio: Arc<DecodedAudio>) -> Result<Box<dyn PlaybackHandle>>;

    /// Short identification for logging ("rodio", "silent", ...).
    fn name(&self) -> &'static str;
}

struct OpenDevice {
    #[allow(dead_code)]
    stream: OutputStream,
    stream_handle: OutputStreamHandle,
}

pub struct RodioOutput {
    device: Option<OpenDevice>,
    volume: f32,
}

impl RodioOutput {
    pub fn new(volume: f32) -> Self {
        Self {
            device: None,
            volume: volume.clamp(0.0, 1.0),
        }
    }
}

impl AudioOutput for RodioOutput {
    fn open(&mut self) -> Result<()> {
        if self.device.is_none() {
            let (stream, stream_handle) =
                OutputStream::try_default().context("Failed to open the default audio output device")?;
            info!("Opened default audio output device");
            self.device = Some(OpenDevice {
                stream,
                stream_handle,
            });
        }
        Ok(())
    }

    fn start(&mut self, audio: Arc<DecodedAudio>) -> Result<Box<dyn PlaybackHandle>> {
        let device = self
            .device
            .as_ref()
            .ok_or_else(|| anyhow!("Audio output device is not open"))?;

        let sink = Sink::try_new(&device.stream_handle).context("Failed to create playback sink")?;
        sink.set_volume(self.volume);

        let played_frames = Arc::new(AtomicUsize::new(0));
        sink.append(SharedSource {
            audio,
            cursor: 0,
            played_frames: Arc::clone(&played_frames),
        });

        Ok(Box::new(RodioPlayback {
            sink,
            played_frames,
        }))
    }

    fn name(&self) -> &'static str {
        "rodio"
    }
}

struct RodioPlayback {
    sink: Sink,
    played_frames: Arc<AtomicUsize>,
}

impl PlaybackHandle for RodioPlayback {
    fn position_frames(&self) -> usize {
        self.played_frames.load(Ordering::Relaxed)
    }

    fn is_finished(&self) -> bool {
        self.sink.empty()
    }

    fn stop(self: Box<Self>) {
        self.sink.stop();
    }
}

/// Streams the shared decoded buffer to rodio without copying it, publishing
/// how many frames the device has pulled.
struct SharedSource {
    audio: Arc<DecodedAudio>,
    cursor: usize,
    played_frames: Arc<AtomicUsize>,
}

impl Iterator for SharedSource {
    type Item = i16;

    fn next(&mut self) -> Option<i16> {
        let sample = *self.audio.samples.get(self.cursor)?;
        self.cursor += 1;

        let channels = self.audio.channels as usize;
        if self.cursor % channels == 0 {
            self.played_frames.store(self.cursor / channels, Ordering::Relaxed);
        }

        Some(sample)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.audio.samples.len() - self.cursor;
        (remaining, Some(remaining))
    }
}

impl Source for SharedSource {
    fn current_frame_len(&self) -> Option<usize> {
        Some(self.audio.samples.len() - self.cursor)
    }

    fn channels(&self) -> u16 {
        self.audio.channels
    }

    fn sample_rate(&self) -> u32 {
        self.audio.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        Some(Duration::from_secs_f32(self.audio.duration_secs()))
    }
}

/// Output that plays nothing and reports a wall-clock position.
#[derive(Default)]
pub struct SilentOutput;

impl AudioOutput for SilentOutput {
    fn open(&mut self) -> Result<()> {
        Ok(())
    }

    fn start(&mut self, audio: Arc<DecodedAudio>) -> Result<Box<dyn PlaybackHandle>> {
        Ok(Box::new(ClockPlayback {
            started: Instant::now(),
            sample_rate: audio.sample_rate,
            frames: audio.frames(),
        }))
    }

    fn name(&self) -> &'static str {
        "silent"
    }
}

struct ClockPlayback {
    started: Instant,
    sample_rate: u32,
    frames: usize,
}

impl PlaybackHandle for ClockPlayback {
    fn position_frames(&self) -> usize {
        let elapsed = self.started.elapsed().as_secs_f64();
        ((elapsed * self.sample_rate as f64) as usize).min(self.frames)
    }

    fn is_finished(&self) -> bool {
        self.position_frames() >= self.frames
    }

    fn stop(self: Box<Self>) {}
}
