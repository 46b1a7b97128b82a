use glam::{Quat, Vec3};
use log::{debug, trace, warn};

use super::{FrequencyBand, Rgb, Scene, SceneObject};
use crate::audio::SpectrumSnapshot;

/// Inclusive span of spectrum bins, `low <= high`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinRange {
    pub low: usize,
    pub high: usize,
}

impl BinRange {
    pub fn len(&self) -> usize {
        self.high - self.low + 1
    }
}

/// Linear map from Hz to a snapshot index: `round(hz / nyquist * bin_count)`.
pub fn hz_to_bin(hz: f32, sample_rate: f32, bin_count: usize) -> usize {
    let nyquist = sample_rate / 2.0;
    (hz / nyquist * bin_count as f32).round().max(0.0) as usize
}

/// Bin span of every band, `None` where a band covers no bin.
///
/// High indices are clamped to the last bin. Where two consecutive bands
/// share a Hz edge, both edges round to the same bin and the upper band
/// keeps it, unless that would leave the lower band with no bins at all.
pub fn bin_ranges(bands: &[FrequencyBand], sample_rate: f32, bin_count: usize) -> Vec<Option<BinRange>> {
    let Some(last) = bin_count.checked_sub(1) else {
        return vec![None; bands.len()];
    };

    let mut ranges: Vec<Option<BinRange>> = bands
        .iter()
        .map(|band| {
            let low = hz_to_bin(band.min_hz, sample_rate, bin_count);
            let high = hz_to_bin(band.max_hz, sample_rate, bin_count).min(last);
            (low <= high).then_some(BinRange { low, high })
        })
        .collect();

    for i in 1..bands.len() {
        if bands[i - 1].max_hz != bands[i].min_hz {
            continue;
        }
        if let (Some(lower), Some(upper)) = (ranges[i - 1], ranges[i]) {
            // a band narrower than one bin keeps sharing it
            if lower.high >= upper.low && upper.low > lower.low {
                ranges[i - 1] = Some(BinRange {
                    low: lower.low,
                    high: upper.low - 1,
                });
            }
        }
    }

    ranges
}

/// Mean byte magnitude over `range`; an empty or out-of-bounds range is 0.
pub fn average_magnitude(bins: &[u8], range: Option<BinRange>) -> f32 {
    let Some(slice) = range.and_then(|r| bins.get(r.low..=r.high)) else {
        return 0.0;
    };
    let total: u32 = slice.iter().map(|&b| b as u32).sum();
    total as f32 / slice.len() as f32
}

/// Per-frame rotation: `angle` radians around the axis `(0, tan(average) / 10, 0)`.
///
/// `average` is the raw 0..=255 magnitude, not the normalized intensity, so
/// the spin direction and speed jump around as tan() wraps. The axis is not
/// unit length; the quaternion is assembled from its components and then
/// normalized.
pub fn rotation_delta(average: f32, angle: f32) -> Quat {
    let axis_y = average.tan() / 10.0;
    if !axis_y.is_finite() {
        return Quat::IDENTITY;
    }
    let (sin_half, cos_half) = (angle * 0.5).sin_cos();
    Quat::from_xyzw(0.0, axis_y * sin_half, 0.0, cos_half).normalize()
}

/// Everything one band contributes to its box in one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandVisualState {
    pub average: f32,
    /// `average / 255`, in `0.0..=1.0`.
    pub intensity: f32,
    /// `1 + intensity`, in `1.0..=2.0`.
    pub scale_factor: f32,
    pub scale: Vec3,
    pub position_y: f32,
    pub rotation_delta: Quat,
    pub color: Rgb,
}

impl BandVisualState {
    pub fn from_average(average: f32, base_color: Rgb, rotation_step: f32) -> Self {
        let intensity = (average / 255.0).clamp(0.0, 1.0);
        let scale_factor = 1.0 + intensity;

        Self {
            average,
            intensity,
            scale_factor,
            scale: Vec3::new(1.0, scale_factor.sin(), 1.0),
            position_y: scale_factor.cos() / 2.0,
            rotation_delta: rotation_delta(average, rotation_step),
            color: base_color.scaled(intensity),
        }
    }

    /// Overwrite scale, height and color; accumulate the rotation.
    pub fn apply_to(&self, object: &mut SceneObject) {
        object.scale = self.scale;
        object.position.y = self.position_y;
        object.rotation = (self.rotation_delta * object.rotation).normalize();
        object.color = self.color;
    }
}

struct BinLayout {
    sample_rate: f32,
    bin_count: usize,
    ranges: Vec<Option<BinRange>>,
}

/// Reduces each band's slice of the spectrum to a [`BandVisualState`] and
/// writes it into the matching scene box.
pub struct FrequencyMapper {
    bands: Vec<FrequencyBand>,
    rotation_step: f32,
    layout: Option<BinLayout>,
}

impl FrequencyMapper {
    pub fn new(bands: Vec<FrequencyBand>, rotation_step: f32) -> Self {
        Self {
            bands,
            rotation_step,
            layout: None,
        }
    }

    pub fn bands(&self) -> &[FrequencyBand] {
        &self.bands
    }

    /// Bin spans for the given rate and snapshot length, cached between frames.
    pub fn ranges(&mut self, sample_rate: f32, bin_count: usize) -> &[Option<BinRange>] {
        self.refresh_layout(sample_rate, bin_count);
        self.layout.as_ref().map_or(&[], |layout| layout.ranges.as_slice())
    }

    fn refresh_layout(&mut self, sample_rate: f32, bin_count: usize) {
        if let Some(layout) = &self.layout {
            if layout.sample_rate == sample_rate && layout.bin_count == bin_count {
                return;
            }
        }

        let nyquist = sample_rate / 2.0;
        for band in &self.bands {
            if !band.fits_below(nyquist) {
                warn!(
                    "Band '{}' reaches {}Hz, above the {}Hz Nyquist limit; clamping to the last bin",
                    band.name, band.max_hz, nyquist
                );
            }
        }

        let ranges = bin_ranges(&self.bands, sample_rate, bin_count);
        for (band, range) in self.bands.iter().zip(&ranges) {
            debug!("Band '{}' ({}-{}Hz) -> bins {:?}", band.name, band.min_hz, band.max_hz, range);
        }

        self.layout = Some(BinLayout {
            sample_rate,
            bin_count,
            ranges,
        });
    }

    /// Visual state of every band for this snapshot.
    pub fn compute(&mut self, snapshot: &SpectrumSnapshot, sample_rate: f32) -> Vec<BandVisualState> {
        self.refresh_layout(sample_rate, snapshot.len());
        let Some(layout) = self.layout.as_ref() else {
            return Vec::new();
        };

        self.bands
            .iter()
            .zip(&layout.ranges)
            .map(|(band, &range)| {
                let average = average_magnitude(snapshot.bins(), range);
                BandVisualState::from_average(average, band.color, self.rotation_step)
            })
            .collect()
    }

    /// Drive the scene's band boxes from `snapshot`. Bands without a box are
    /// skipped.
    pub fn apply(&mut self, snapshot: &SpectrumSnapshot, sample_rate: f32, scene: &mut Scene) {
        self.refresh_layout(sample_rate, snapshot.len());
        let Some(layout) = self.layout.as_ref() else {
            return;
        };

        for (index, (band, &range)) in self.bands.iter().zip(&layout.ranges).enumerate() {
            let Some(object) = scene.band_box_mut(index) else {
                trace!("No box for band '{}', skipping", band.name);
                continue;
            };
            let average = average_magnitude(snapshot.bins(), range);
            BandVisualState::from_average(average, band.color, self.rotation_step).apply_to(object);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{default_bands, SceneSettings};

    const SAMPLE_RATE: f32 = 44100.0;
    const BIN_COUNT: usize = 2048;

    fn mapper() -> FrequencyMapper {
        FrequencyMapper::new(default_bands(), 0.01)
    }

    fn scene() -> Scene {
        Scene::new(&default_bands(), &SceneSettings::default())
    }

    #[test]
    fn test_default_bands_have_ordered_indices() {
        let mut mapper = mapper();
        let ranges = mapper.ranges(SAMPLE_RATE, BIN_COUNT).to_vec();

        assert_eq!(ranges.len(), 4);
        for range in &ranges {
            let range = range.expect("every default band covers at least one bin");
            assert!(range.low <= range.high);
        }
    }

    #[test]
    fn test_default_band_bins_are_disjoint() {
        let ranges = bin_ranges(&default_bands(), SAMPLE_RATE, BIN_COUNT);

        assert_eq!(ranges[0], Some(BinRange { low: 2, high: 5 }));
        assert_eq!(ranges[1], Some(BinRange { low: 6, high: 22 }));
        assert_eq!(ranges[2], Some(BinRange { low: 23, high: 185 }));
        assert_eq!(ranges[3], Some(BinRange { low: 186, high: 743 }));
    }

    #[test]
    fn test_hz_to_bin_rounds_linearly() {
        assert_eq!(hz_to_bin(0.0, SAMPLE_RATE, BIN_COUNT), 0);
        assert_eq!(hz_to_bin(20.0, SAMPLE_RATE, BIN_COUNT), 2);
        assert_eq!(hz_to_bin(60.0, SAMPLE_RATE, BIN_COUNT), 6);
        assert_eq!(hz_to_bin(22050.0, SAMPLE_RATE, BIN_COUNT), 2048);
    }

    #[test]
    fn test_ranges_above_nyquist_are_clamped() {
        let bands = vec![
            FrequencyBand::new("top", 20000.0, 30000.0, Rgb::WHITE),
            FrequencyBand::new("beyond", 25000.0, 30000.0, Rgb::WHITE),
        ];
        let ranges = bin_ranges(&bands, SAMPLE_RATE, BIN_COUNT);

        assert_eq!(ranges[0].unwrap().high, BIN_COUNT - 1);
        assert_eq!(ranges[1], None);
    }

    #[test]
    fn test_overlapping_bands_keep_their_bins() {
        let bands = vec![
            FrequencyBand::new("a", 100.0, 400.0, Rgb::WHITE),
            FrequencyBand::new("b", 300.0, 500.0, Rgb::WHITE),
        ];
        let ranges = bin_ranges(&bands, SAMPLE_RATE, BIN_COUNT);

        assert!(ranges[0].unwrap().high > ranges[1].unwrap().low);
    }

    #[test]
    fn test_band_narrower_than_a_bin_keeps_the_shared_bin() {
        // both edges round to bin 6, which the next band also starts on
        let bands = vec![
            FrequencyBand::new("sliver", 59.5, 60.0, Rgb::WHITE),
            FrequencyBand::new("next", 60.0, 100.0, Rgb::WHITE),
        ];
        let ranges = bin_ranges(&bands, SAMPLE_RATE, BIN_COUNT);
        assert_eq!(ranges[0], Some(BinRange { low: 6, high: 6 }));
        assert_eq!(ranges[1].unwrap().low, 6);

        let bins = vec![255u8; BIN_COUNT];
        let state = BandVisualState::from_average(average_magnitude(&bins, ranges[0]), Rgb::WHITE, 0.01);
        assert_eq!(state.intensity, 1.0);
    }

    #[test]
    fn test_band_above_nyquist_is_zero_not_nan() {
        let bands = vec![FrequencyBand::new("ultra", 30000.0, 40000.0, Rgb::WHITE)];
        let ranges = bin_ranges(&bands, SAMPLE_RATE, BIN_COUNT);
        assert_eq!(ranges[0], None);

        let bins = vec![255u8; BIN_COUNT];
        let average = average_magnitude(&bins, ranges[0]);
        let state = BandVisualState::from_average(average, Rgb::WHITE, 0.01);
        assert_eq!(state.intensity, 0.0);
        assert!(!state.scale.is_nan());
        assert_eq!(state.color, Rgb::BLACK);
    }

    #[test]
    fn test_intensity_and_scale_factor_bounds() {
        for byte in 0..=255u8 {
            let state = BandVisualState::from_average(byte as f32, Rgb::RED, 0.01);
            assert!((0.0..=1.0).contains(&state.intensity));
            assert!((1.0..=2.0).contains(&state.scale_factor));
            assert!(state.scale.y > 0.8 && state.scale.y <= 1.0);
            assert!(state.position_y.abs() <= 0.5);
            assert!(state.rotation_delta.is_normalized());
        }
    }

    #[test]
    fn test_bass_only_spectrum() {
        let mut mapper = mapper();
        let mut bins = vec![0u8; BIN_COUNT];
        let bass = mapper.ranges(SAMPLE_RATE, BIN_COUNT)[1].unwrap();
        bins[bass.low..=bass.high].fill(255);
        let snapshot = SpectrumSnapshot::from_bins(bins);

        let states = mapper.compute(&snapshot, SAMPLE_RATE);

        assert_eq!(states[1].intensity, 1.0);
        assert_eq!(states[1].color, Rgb::RED);
        assert_eq!(states[0].intensity, 0.0);
        assert_eq!(states[0].color, Rgb::BLACK);
        assert_eq!(states[2].intensity, 0.0);
    }

    #[test]
    fn test_apply_writes_into_scene_boxes() {
        let mut mapper = mapper();
        let mut scene = scene();
        let snapshot = SpectrumSnapshot::from_bins(vec![255; BIN_COUNT]);

        mapper.apply(&snapshot, SAMPLE_RATE, &mut scene);

        for (object, band) in scene.band_boxes().iter().zip(default_bands()) {
            assert_eq!(object.color, band.color);
            assert!((object.scale.y - 2f32.sin()).abs() < 1e-6);
            assert!((object.position.y - 2f32.cos() / 2.0).abs() < 1e-6);
        }
        // X placement is left alone
        assert_eq!(scene.band_box(0).unwrap().position.x, -2.0);
    }

    #[test]
    fn test_rotation_accumulates_across_frames() {
        let mut mapper = mapper();
        let mut scene = scene();
        // tan(1) / 10 gives a positive Y axis component
        let snapshot = SpectrumSnapshot::from_bins(vec![1; BIN_COUNT]);

        mapper.apply(&snapshot, SAMPLE_RATE, &mut scene);
        let once = scene.band_box(0).unwrap().rotation;
        mapper.apply(&snapshot, SAMPLE_RATE, &mut scene);
        let twice = scene.band_box(0).unwrap().rotation;

        assert!(once.y > 0.0);
        assert!(twice.abs_diff_eq(once * once, 1e-6));
        assert!((twice.y - 2.0 * once.y).abs() < 1e-6);
    }

    #[test]
    fn test_silent_band_does_not_rotate() {
        // tan(0) is 0: a degenerate axis, which leaves the orientation alone
        let delta = rotation_delta(0.0, 0.01);
        assert!(delta.abs_diff_eq(Quat::IDENTITY, 1e-6));
    }

    #[test]
    fn test_rotation_uses_raw_average() {
        // Averages that differ by pi give the same tan(), so the same spin
        let a = rotation_delta(10.0, 0.01);
        let b = rotation_delta(10.0 + std::f32::consts::PI, 0.01);
        assert!(a.abs_diff_eq(b, 1e-4));
        assert!(!a.abs_diff_eq(rotation_delta(10.0 / 255.0, 0.01), 1e-6));
    }

    #[test]
    fn test_rotation_angle_scales_with_tan_of_average() {
        // the non-unit axis shrinks the step: angle = 2 atan(|tan(avg)| / 10 * tan(step / 2))
        let step = 0.01f32;
        for average in [1.0f32, 50.0, 128.0, 255.0] {
            let delta = rotation_delta(average, step);
            let angle = 2.0 * delta.y.abs().atan2(delta.w);
            let expected = 2.0 * (average.tan().abs() / 10.0 * (step * 0.5).tan()).atan();

            assert!((angle - expected).abs() < 1e-6, "average {average}: {angle} vs {expected}");
            assert!(angle < step);
        }
        let at_one = rotation_delta(1.0, step);
        assert!((2.0 * at_one.y.abs().atan2(at_one.w) - 0.001557).abs() < 1e-5);
    }

    #[test]
    fn test_missing_box_is_skipped() {
        let mut mapper = mapper();
        let mut scene = Scene::new(&default_bands()[..2], &SceneSettings::default());
        let snapshot = SpectrumSnapshot::from_bins(vec![128; BIN_COUNT]);

        mapper.apply(&snapshot, SAMPLE_RATE, &mut scene);

        assert_eq!(scene.band_boxes().len(), 2);
        assert!(scene.band_box(0).unwrap().color != Rgb::YELLOW);
    }
}
