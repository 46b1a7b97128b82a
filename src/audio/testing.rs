//! Test doubles shared by the audio and visualizer tests.

use anyhow::{bail, Result};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use super::{AudioOutput, DecodedAudio, PlaybackHandle};

#[derive(Default)]
pub(crate) struct ManualState {
    pub opened: AtomicUsize,
    pub started: AtomicUsize,
    pub stopped: AtomicUsize,
    pub released: AtomicUsize,
    pub position: AtomicUsize,
    pub finished: AtomicBool,
    pub fail_open: AtomicBool,
}

impl ManualState {
    pub fn set_position(&self, frames: usize) {
        self.position.store(frames, Ordering::SeqCst);
    }

    pub fn live_handles(&self) -> usize {
        self.started.load(Ordering::SeqCst) - self.released.load(Ordering::SeqCst)
    }
}

/// Output whose playback position is moved by the test.
pub(crate) struct ManualOutput {
    pub state: Arc<ManualState>,
}

impl ManualOutput {
    pub fn new() -> (Self, Arc<ManualState>) {
        let state = Arc::new(ManualState::default());
        (
            Self {
                state: Arc::clone(&state),
            },
            state,
        )
    }
}

impl AudioOutput for ManualOutput {
    fn open(&mut self) -> Result<()> {
        if self.state.fail_open.load(Ordering::SeqCst) {
            bail!("no audio device in this test");
        }
        self.state.opened.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn start(&mut self, _audio: Arc<DecodedAudio>) -> Result<Box<dyn PlaybackHandle>> {
        self.state.started.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ManualPlayback {
            state: Arc::clone(&self.state),
        }))
    }

    fn name(&self) -> &'static str {
        "manual"
    }
}

struct ManualPlayback {
    state: Arc<ManualState>,
}

impl PlaybackHandle for ManualPlayback {
    fn position_frames(&self) -> usize {
        self.state.position.load(Ordering::SeqCst)
    }

    fn is_finished(&self) -> bool {
        self.state.finished.load(Ordering::SeqCst)
    }

    fn stop(self: Box<Self>) {
        self.state.stopped.fetch_add(1, Ordering::SeqCst);
    }
}

impl Drop for ManualPlayback {
    fn drop(&mut self) {
        self.state.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// A file in the system temp dir, removed on drop.
pub(crate) struct TempAsset {
    path: PathBuf,
}

impl TempAsset {
    pub fn new(name: &str) -> Self {
        static COUNTER: AtomicUsize = AtomicUsize::new(0);
        let unique = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!("boxbeat-{}-{}-{}", std::process::id(), unique, name));
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempAsset {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

pub(crate) fn write_wav(path: &Path, samples: &[i16], channels: u16, sample_rate: u32) {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for &sample in samples {
        writer.write_sample(sample).unwrap();
    }
    writer.finalize().unwrap();
}

/// Write a mono sine tone and return the asset guard.
pub(crate) fn tone_asset(name: &str, freq: f32, sample_rate: u32, secs: f32) -> TempAsset {
    let asset = TempAsset::new(name);
    let frames = (sample_rate as f32 * secs) as usize;
    let samples: Vec<i16> = (0..frames)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            ((2.0 * std::f32::consts::PI * freq * t).sin() * 8000.0) as i16
        })
        .collect();
    write_wav(asset.path(), &samples, 1, sample_rate);
    asset
}
