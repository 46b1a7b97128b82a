use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{Receiver, TryRecvError};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use super::{decode_file, AnalyserSettings, AudioOutput, DecodedAudio, PlaybackHandle, SpectrumAnalyser};

/// Byte magnitudes per frequency bin, `fft_size / 2` long.
///
/// The caller allocates one snapshot and hands it to
/// [`AudioPipeline::read_spectrum`] every frame; it is overwritten in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpectrumSnapshot {
    bins: Vec<u8>,
}

impl SpectrumSnapshot {
    pub fn new(bin_count: usize) -> Self {
        Self {
            bins: vec![0; bin_count],
        }
    }

    pub fn from_bins(bins: Vec<u8>) -> Self {
        Self { bins }
    }

    pub fn bins(&self) -> &[u8] {
        &self.bins
    }

    pub fn bins_mut(&mut self) -> &mut [u8] {
        &mut self.bins
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }
}

enum PipelineState {
    Uninitialized,
    Loading(Receiver<Result<DecodedAudio>>),
    Ready(Session),
}

struct Session {
    audio: Arc<DecodedAudio>,
    analyser: SpectrumAnalyser,
    playback: Option<Box<dyn PlaybackHandle>>,
    end_reported: bool,
}

/// Decoding, play/stop lifecycle and the live spectrum of one audio asset.
///
/// Lifecycle: `Uninitialized -> Loading -> Ready(stopped) <-> Ready(playing)`.
/// Nothing happens until the first [`toggle`](Self::toggle) or
/// [`ensure_ready`](Self::ensure_ready); the asset is then decoded on a
/// background thread and picked up by [`poll`](Self::poll). A failed load
/// drops back to `Uninitialized` so the next toggle retries.
pub struct AudioPipeline {
    asset_path: PathBuf,
    settings: AnalyserSettings,
    output: Box<dyn AudioOutput>,
    state: PipelineState,
}

impl AudioPipeline {
    pub fn new(asset_path: impl Into<PathBuf>, settings: AnalyserSettings, output: Box<dyn AudioOutput>) -> Self {
        Self {
            asset_path: asset_path.into(),
            settings,
            output,
            state: PipelineState::Uninitialized,
        }
    }

    /// Open the output device and start decoding the asset in the background.
    ///
    /// No-op while a decode is in flight or once ready.
    pub fn ensure_ready(&mut self) -> Result<()> {
        match self.state {
            PipelineState::Uninitialized => {}
            PipelineState::Loading(_) => {
                debug!("Audio initialization already in progress");
                return Ok(());
            }
            PipelineState::Ready(_) => return Ok(()),
        }

        self.output.open()?;

        info!("Loading {:?} for {} output", self.asset_path, self.output.name());
        let (sender, receiver) = crossbeam_channel::bounded(1);
        let path = self.asset_path.clone();

        thread::Builder::new()
            .name("asset-decoder".to_string())
            .spawn(move || {
                if sender.send(decode_file(&path)).is_err() {
                    warn!("Audio pipeline went away before {:?} finished decoding", path);
                }
            })
            .context("Failed to spawn the decoder thread")?;

        self.state = PipelineState::Loading(receiver);
        Ok(())
    }

    /// Pick up a finished decode without blocking.
    pub fn poll(&mut self) -> Result<()> {
        let PipelineState::Loading(receiver) = &self.state else {
            return Ok(());
        };

        let received = receiver.try_recv();
        match received {
            Ok(result) => self.finish_loading(result),
            Err(TryRecvError::Empty) => Ok(()),
            Err(TryRecvError::Disconnected) => {
                self.finish_loading(Err(anyhow!("Decoder thread exited without a result")))
            }
        }
    }

    /// Block until an in-flight decode finishes.
    pub fn wait_until_ready(&mut self) -> Result<()> {
        let PipelineState::Loading(receiver) = &self.state else {
            return if self.is_ready() {
                Ok(())
            } else {
                Err(anyhow!("Audio pipeline is not initializing"))
            };
        };

        let result = receiver
            .recv()
            .unwrap_or_else(|_| Err(anyhow!("Decoder thread exited without a result")));
        self.finish_loading(result)
    }

    fn finish_loading(&mut self, result: Result<DecodedAudio>) -> Result<()> {
        match result {
            Ok(audio) => {
                info!(
                    "Audio ready: {}Hz, {} bins of {:.1}Hz",
                    audio.sample_rate,
                    self.settings.bin_count(),
                    audio.sample_rate as f32 / self.settings.fft_size as f32
                );
                self.state = PipelineState::Ready(Session {
                    audio: Arc::new(audio),
                    analyser: SpectrumAnalyser::new(self.settings),
                    playback: None,
                    end_reported: false,
                });
                Ok(())
            }
            Err(e) => {
                self.state = PipelineState::Uninitialized;
                Err(e)
            }
        }
    }

    /// Play/stop switch.
    ///
    /// Before the pipeline is ready this only initializes: the first toggle
    /// never starts playback by itself.
    pub fn toggle(&mut self) -> Result<()> {
        self.poll()?;

        match &mut self.state {
            PipelineState::Ready(session) => {
                match session.playback.take() {
                    Some(handle) => {
                        handle.stop();
                        info!("Playback stopped");
                    }
                    None => {
                        let handle = self.output.start(Arc::clone(&session.audio))?;
                        session.playback = Some(handle);
                        session.end_reported = false;
                        info!("Playback started");
                    }
                }
                Ok(())
            }
            _ => self.ensure_ready(),
        }
    }

    /// Refresh `snapshot` from the current playback position.
    ///
    /// Returns `false` and leaves `snapshot` untouched unless playing.
    pub fn read_spectrum(&mut self, snapshot: &mut SpectrumSnapshot) -> bool {
        let PipelineState::Ready(session) = &mut self.state else {
            return false;
        };
        let Some(handle) = &session.playback else {
            return false;
        };

        let end = if handle.is_finished() {
            if !session.end_reported {
                info!("Reached the end of {:?}", self.asset_path);
                session.end_reported = true;
            }
            // Past the last frame: the analyser sees only silence
            session.audio.frames() + self.settings.fft_size
        } else {
            handle.position_frames()
        };

        session.analyser.analyse(&session.audio.mono, end, snapshot.bins_mut());
        true
    }

    pub fn is_playing(&self) -> bool {
        matches!(&self.state, PipelineState::Ready(session) if session.playback.is_some())
    }

    /// Playing, but the asset has run out.
    pub fn is_finished(&self) -> bool {
        match &self.state {
            PipelineState::Ready(session) => session.playback.as_ref().is_some_and(|handle| handle.is_finished()),
            _ => false,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, PipelineState::Ready(_))
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state, PipelineState::Loading(_))
    }

    /// Sample rate of the decoded asset, once ready.
    pub fn sample_rate(&self) -> Option<f32> {
        match &self.state {
            PipelineState::Ready(session) => Some(session.audio.sample_rate as f32),
            _ => None,
        }
    }

    pub fn bin_count(&self) -> usize {
        self.settings.bin_count()
    }

    pub fn new_snapshot(&self) -> SpectrumSnapshot {
        SpectrumSnapshot::new(self.bin_count())
    }

    pub fn asset_path(&self) -> &Path {
        &self.asset_path
    }
}
