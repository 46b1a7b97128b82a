use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Linear RGB color with components nominally in `0.0..=1.0`.
///
/// Serialized as a `#rrggbb` string.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0.0, 0.0, 0.0);
    pub const WHITE: Rgb = Rgb::new(1.0, 1.0, 1.0);
    pub const RED: Rgb = Rgb::new(1.0, 0.0, 0.0);
    pub const GREEN: Rgb = Rgb::new(0.0, 1.0, 0.0);
    pub const BLUE: Rgb = Rgb::new(0.0, 0.0, 1.0);
    pub const YELLOW: Rgb = Rgb::new(1.0, 1.0, 0.0);

    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub fn from_hex(hex: u32) -> Self {
        let channel = |shift: u32| ((hex >> shift) & 0xff) as f32 / 255.0;
        Self::new(channel(16), channel(8), channel(0))
    }

    pub fn to_hex(self) -> u32 {
        let channel = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u32;
        (channel(self.r) << 16) | (channel(self.g) << 8) | channel(self.b)
    }

    pub fn scaled(self, factor: f32) -> Self {
        Self::new(self.r * factor, self.g * factor, self.b * factor)
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:06x}", self.to_hex())
    }
}

impl FromStr for Rgb {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let digits = s.trim().trim_start_matches('#');
        if digits.len() != 6 {
            bail!("Expected a #rrggbb color, got {:?}", s);
        }
        let hex = u32::from_str_radix(digits, 16).map_err(|e| anyhow!("Invalid color {:?}: {}", s, e))?;
        Ok(Self::from_hex(hex))
    }
}

impl TryFrom<String> for Rgb {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Rgb> for String {
    fn from(color: Rgb) -> Self {
        color.to_string()
    }
}

/// A frequency range that drives one box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyBand {
    pub name: String,
    pub min_hz: f32,
    pub max_hz: f32,
    pub color: Rgb,
}

impl FrequencyBand {
    pub fn new(name: &str, min_hz: f32, max_hz: f32, color: Rgb) -> Self {
        Self {
            name: name.to_string(),
            min_hz,
            max_hz,
            color,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.min_hz.is_finite() && self.max_hz.is_finite()) {
            bail!("Band '{}' has a non-finite range", self.name);
        }
        if self.min_hz < 0.0 {
            bail!("Band '{}' starts below 0Hz ({})", self.name, self.min_hz);
        }
        if self.min_hz > self.max_hz {
            bail!(
                "Band '{}' has min_hz {} above max_hz {}",
                self.name,
                self.min_hz,
                self.max_hz
            );
        }
        Ok(())
    }

    pub fn fits_below(&self, nyquist: f32) -> bool {
        self.max_hz <= nyquist
    }
}

/// Sub-bass, bass, mid and treble, in display order.
pub fn default_bands() -> Vec<FrequencyBand> {
    vec![
        FrequencyBand::new("sub-bass", 20.0, 60.0, Rgb::YELLOW),
        FrequencyBand::new("bass", 60.0, 250.0, Rgb::RED),
        FrequencyBand::new("mid", 250.0, 2000.0, Rgb::GREEN),
        FrequencyBand::new("treble", 2000.0, 8000.0, Rgb::BLUE),
    ]
}
