use rustfft::{num_complex::Complex, Fft, FftPlanner};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const DEFAULT_FFT_SIZE: usize = 4096;
pub const MIN_FFT_SIZE: usize = 32;
pub const MAX_FFT_SIZE: usize = 32768;

/// Analysis parameters, mirroring the knobs of a Web Audio `AnalyserNode`.
///
/// A larger `fft_size` buys finer frequency resolution (`sample_rate /
/// fft_size` Hz per bin) at the cost of a longer, blurrier time window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyserSettings {
    pub fft_size: usize,
    pub smoothing_time_constant: f32,
    pub min_decibels: f32,
    pub max_decibels: f32,
}

impl Default for AnalyserSettings {
    fn default() -> Self {
        Self {
            fft_size: DEFAULT_FFT_SIZE,
            smoothing_time_constant: 0.8,
            min_decibels: -100.0,
            max_decibels: -30.0,
        }
    }
}

impl AnalyserSettings {
    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }
}

/// Byte-magnitude spectrum analyser.
///
/// Every call windows the most recent `fft_size` samples with a Blackman
/// window, runs a forward FFT, smooths the normalized magnitudes against the
/// previous call and maps them from decibels onto `0..=255`. All buffers are
/// allocated up front so the per-frame path never allocates.
pub struct SpectrumAnalyser {
    settings: AnalyserSettings,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    smoothed: Vec<f32>,
}

impl SpectrumAnalyser {
    pub fn new(settings: AnalyserSettings) -> Self {
        let fft_size = settings.fft_size;
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];

        Self {
            settings,
            fft,
            window: Self::blackman_window(fft_size),
            buffer: vec![Complex::new(0.0, 0.0); fft_size],
            scratch,
            smoothed: vec![0.0; settings.bin_count()],
        }
    }

    fn blackman_window(size: usize) -> Vec<f32> {
        const A0: f32 = 0.42;
        const A1: f32 = 0.5;
        const A2: f32 = 0.08;

        (0..size)
            .map(|i| {
                let x = i as f32 / size as f32;
                A0 - A1 * (2.0 * std::f32::consts::PI * x).cos()
                    + A2 * (4.0 * std::f32::consts::PI * x).cos()
            })
            .collect()
    }

    pub fn settings(&self) -> &AnalyserSettings {
        &self.settings
    }

    pub fn bin_count(&self) -> usize {
        self.smoothed.len()
    }

    /// Analyse the `fft_size` samples of `mono` that end just before `end`
    /// and write one byte per bin into `out`.
    ///
    /// Positions before the start of `mono` or past its end read as silence.
    /// If `out` is shorter than the bin count only its prefix is written.
    pub fn analyse(&mut self, mono: &[f32], end: usize, out: &mut [u8]) {
        self.load_window(mono, end);
        self.fft.process_with_scratch(&mut self.buffer, &mut self.scratch);
        self.smooth_magnitudes();
        self.write_bytes(out);
    }

    fn load_window(&mut self, mono: &[f32], end: usize) {
        let fft_size = self.buffer.len();

        for (i, (slot, &w)) in self.buffer.iter_mut().zip(&self.window).enumerate() {
            // Sample index is end - fft_size + i, kept unsigned
            let shifted = end + i;
            let sample = if shifted < fft_size {
                0.0
            } else {
                mono.get(shifted - fft_size).copied().unwrap_or(0.0)
            };
            *slot = Complex::new(sample * w, 0.0);
        }
    }

    fn smooth_magnitudes(&mut self) {
        let scale = 1.0 / self.buffer.len() as f32;
        let tau = self.settings.smoothing_time_constant;

        for (smoothed, bin) in self.smoothed.iter_mut().zip(&self.buffer) {
            let magnitude = bin.norm() * scale;
            *smoothed = tau * *smoothed + (1.0 - tau) * magnitude;
            if !smoothed.is_finite() {
                *smoothed = 0.0;
            }
        }
    }

    fn write_bytes(&self, out: &mut [u8]) {
        let min_db = self.settings.min_decibels;
        let range_scale = 255.0 / (self.settings.max_decibels - min_db);

        for (byte, &magnitude) in out.iter_mut().zip(&self.smoothed) {
            // log10(0) is -inf, which clamps to 0 below
            let db = 20.0 * magnitude.log10();
            let scaled = (db - min_db) * range_scale;
            *byte = if scaled.is_nan() {
                0
            } else {
                scaled.clamp(0.0, 255.0) as u8
            };
        }
    }
}
