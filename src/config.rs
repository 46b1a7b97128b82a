use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::audio::analyser::{AnalyserSettings, MAX_FFT_SIZE, MIN_FFT_SIZE};
use crate::scene::{default_bands, FrequencyBand, SceneSettings};

pub const DEFAULT_ASSET_PATH: &str = "assets/nakamatomo.mp3";

/// Everything that can be set from a JSON config file.
///
/// Missing fields fall back to the defaults, which reproduce the stock
/// four-band demo:
///
/// ```json
/// {
///   "asset_path": "assets/nakamatomo.mp3",
///   "analysis": { "fft_size": 4096, "smoothing_time_constant": 0.8 },
///   "bands": [
///     { "name": "sub-bass", "min_hz": 20, "max_hz": 60, "color": "#ffff00" }
///   ]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualizerConfig {
    pub asset_path: PathBuf,
    pub volume: f32,
    pub analysis: AnalyserSettings,
    pub bands: Vec<FrequencyBand>,
    pub scene: SceneSettings,
}

impl Default for VisualizerConfig {
    fn default() -> Self {
        Self {
            asset_path: PathBuf::from(DEFAULT_ASSET_PATH),
            volume: 1.0,
            analysis: AnalyserSettings::default(),
            bands: default_bands(),
            scene: SceneSettings::default(),
        }
    }
}

impl VisualizerConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let analysis = &self.analysis;
        if !analysis.fft_size.is_power_of_two() || !(MIN_FFT_SIZE..=MAX_FFT_SIZE).contains(&analysis.fft_size) {
            bail!(
                "fft_size must be a power of two between {} and {}, got {}",
                MIN_FFT_SIZE,
                MAX_FFT_SIZE,
                analysis.fft_size
            );
        }
        if !(0.0..=1.0).contains(&analysis.smoothing_time_constant) {
            bail!(
                "smoothing_time_constant must be within 0..=1, got {}",
                analysis.smoothing_time_constant
            );
        }
        if analysis.min_decibels >= analysis.max_decibels {
            bail!(
                "min_decibels ({}) must be below max_decibels ({})",
                analysis.min_decibels,
                analysis.max_decibels
            );
        }
        if !(0.0..=1.0).contains(&self.volume) {
            bail!("volume must be within 0..=1, got {}", self.volume);
        }
        if self.bands.is_empty() {
            bail!("At least one frequency band is required");
        }
        for band in &self.bands {
            band.validate()?;
        }
        if !self.scene.box_spacing.is_finite() || !self.scene.rotation_step.is_finite() {
            bail!("Scene settings must be finite numbers");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::testing::TempAsset;
    use crate::scene::Rgb;

    #[test]
    fn test_defaults_are_valid() {
        let config = VisualizerConfig::default();
        config.validate().unwrap();

        assert_eq!(config.analysis.fft_size, 4096);
        assert_eq!(config.analysis.bin_count(), 2048);
        assert_eq!(config.bands.len(), 4);
        assert_eq!(config.scene.rotation_step, 0.01);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: VisualizerConfig = serde_json::from_str(
            r##"{
                "analysis": { "fft_size": 2048 },
                "bands": [ { "name": "low", "min_hz": 20, "max_hz": 200, "color": "#336699" } ]
            }"##,
        )
        .unwrap();

        config.validate().unwrap();
        assert_eq!(config.analysis.fft_size, 2048);
        assert_eq!(config.analysis.smoothing_time_constant, 0.8);
        assert_eq!(config.bands[0].color, Rgb::from_hex(0x336699));
        assert_eq!(config.asset_path, PathBuf::from(DEFAULT_ASSET_PATH));
    }

    #[test]
    fn test_rejects_bad_fft_size() {
        let mut config = VisualizerConfig::default();

        config.analysis.fft_size = 3000;
        assert!(config.validate().is_err());

        config.analysis.fft_size = 16;
        assert!(config.validate().is_err());

        config.analysis.fft_size = 65536;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_ranges() {
        let mut config = VisualizerConfig::default();
        config.analysis.min_decibels = -20.0;
        assert!(config.validate().is_err());

        let mut config = VisualizerConfig::default();
        config.bands.clear();
        assert!(config.validate().is_err());

        let mut config = VisualizerConfig::default();
        config.bands[2].min_hz = 5000.0;
        assert!(config.validate().is_err());

        let mut config = VisualizerConfig::default();
        config.volume = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_reports_file_and_reason() {
        let asset = TempAsset::new("config.json");
        std::fs::write(asset.path(), r#"{ "analysis": { "fft_size": 100 } }"#).unwrap();

        let err = VisualizerConfig::load(asset.path()).unwrap_err();
        let message = format!("{:#}", err);
        assert!(message.contains("config.json"));
        assert!(message.contains("power of two"));
    }

    #[test]
    fn test_load_round_trip_file() {
        let asset = TempAsset::new("roundtrip.json");
        let mut config = VisualizerConfig::default();
        config.asset_path = PathBuf::from("music/track.ogg");
        std::fs::write(asset.path(), serde_json::to_string_pretty(&config).unwrap()).unwrap();

        assert_eq!(VisualizerConfig::load(asset.path()).unwrap(), config);
    }
}
