use log::{debug, error};

use crate::audio::{AudioOutput, AudioPipeline, SpectrumSnapshot};
use crate::config::VisualizerConfig;
use crate::scene::{BandVisualState, FrequencyMapper, Scene};

const DEBUG_LOG_INTERVAL: u64 = 120;

/// Per-frame driver shared by the windowed and headless shells.
///
/// Owns the audio pipeline, the mapper, the scene and the one snapshot
/// buffer that is reused every frame.
pub struct Visualizer {
    pipeline: AudioPipeline,
    mapper: FrequencyMapper,
    scene: Scene,
    snapshot: SpectrumSnapshot,
    frames: u64,
}

impl Visualizer {
    pub fn new(config: &VisualizerConfig, output: Box<dyn AudioOutput>) -> Self {
        let pipeline = AudioPipeline::new(config.asset_path.clone(), config.analysis, output);
        let snapshot = pipeline.new_snapshot();

        Self {
            pipeline,
            mapper: FrequencyMapper::new(config.bands.clone(), config.scene.rotation_step),
            scene: Scene::new(&config.bands, &config.scene),
            snapshot,
            frames: 0,
        }
    }

    /// Advance one rendered frame. Returns true if the boxes were updated.
    pub fn frame(&mut self) -> bool {
        if let Err(e) = self.pipeline.poll() {
            error!("Audio initialization failed: {:#}", e);
        }
        self.scene.set_playing(self.pipeline.is_playing());

        let Some(sample_rate) = self.pipeline.sample_rate() else {
            return false;
        };
        if !self.pipeline.read_spectrum(&mut self.snapshot) {
            return false;
        }

        self.mapper.apply(&self.snapshot, sample_rate, &mut self.scene);

        self.frames += 1;
        if self.frames % DEBUG_LOG_INTERVAL == 0 {
            self.log_band_levels();
        }

        true
    }

    fn log_band_levels(&mut self) {
        let states = self.band_states();
        for (band, state) in self.mapper.bands().iter().zip(&states) {
            debug!("{:>10}: average {:6.1}, intensity {:.3}", band.name, state.average, state.intensity);
        }
    }

    /// Frames that updated the boxes so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Click on the toggle box.
    pub fn toggle(&mut self) {
        if let Err(e) = self.pipeline.toggle() {
            error!("Audio toggle failed: {:#}", e);
        }
        self.scene.set_playing(self.pipeline.is_playing());
    }

    /// Band states for the current snapshot; empty until the asset is loaded.
    pub fn band_states(&mut self) -> Vec<BandVisualState> {
        match self.pipeline.sample_rate() {
            Some(sample_rate) => self.mapper.compute(&self.snapshot, sample_rate),
            None => Vec::new(),
        }
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn mapper(&self) -> &FrequencyMapper {
        &self.mapper
    }

    pub fn pipeline(&self) -> &AudioPipeline {
        &self.pipeline
    }

    pub fn pipeline_mut(&mut self) -> &mut AudioPipeline {
        &mut self.pipeline
    }

    pub fn snapshot(&self) -> &SpectrumSnapshot {
        &self.snapshot
    }
}
