use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

use super::{FrequencyBand, Ray, Rgb};

/// Layout knobs for the box scene.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneSettings {
    /// Distance between neighbouring band boxes along X.
    pub box_spacing: f32,
    /// Radians the band boxes turn each frame.
    pub rotation_step: f32,
}

impl Default for SceneSettings {
    fn default() -> Self {
        Self {
            box_spacing: 2.0,
            rotation_step: 0.01,
        }
    }
}

/// A box mesh with its transform and display color.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneObject {
    /// Geometry dimensions, before `scale`.
    pub size: Vec3,
    pub position: Vec3,
    pub scale: Vec3,
    pub rotation: Quat,
    pub color: Rgb,
}

impl SceneObject {
    pub fn new(size: Vec3, position: Vec3, color: Rgb) -> Self {
        Self {
            size,
            position,
            scale: Vec3::ONE,
            rotation: Quat::IDENTITY,
            color,
        }
    }

    pub fn model_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position) * Mat4::from_scale(self.size)
    }

    /// Axis-aligned bounds, ignoring rotation.
    pub fn aabb(&self) -> (Vec3, Vec3) {
        let half = self.size * self.scale * 0.5;
        (self.position - half, self.position + half)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Lighting {
    pub ambient_color: Rgb,
    pub ambient_intensity: f32,
    pub point_position: Vec3,
    pub point_color: Rgb,
    pub point_intensity: f32,
}

impl Default for Lighting {
    fn default() -> Self {
        Self {
            ambient_color: Rgb::WHITE,
            ambient_intensity: 0.5,
            point_position: Vec3::new(10.0, 10.0, 10.0),
            point_color: Rgb::WHITE,
            point_intensity: 1.0,
        }
    }
}

pub const TOGGLE_PLAYING_COLOR: Rgb = Rgb::GREEN;
pub const TOGGLE_STOPPED_COLOR: Rgb = Rgb::RED;

/// Band boxes in a row along X, with the play/stop box underneath.
pub struct Scene {
    band_boxes: Vec<SceneObject>,
    toggle: SceneObject,
    lighting: Lighting,
    background: Rgb,
}

impl Scene {
    pub fn new(bands: &[FrequencyBand], settings: &SceneSettings) -> Self {
        let spacing = settings.box_spacing;
        let band_boxes = bands
            .iter()
            .enumerate()
            .map(|(index, band)| {
                let x = index as f32 * spacing - spacing;
                SceneObject::new(Vec3::ONE, Vec3::new(x, 0.0, 0.0), band.color)
            })
            .collect();

        let toggle = SceneObject::new(
            Vec3::new(1.0, 0.5, 0.5),
            Vec3::new(0.0, -2.0, 0.0),
            TOGGLE_STOPPED_COLOR,
        );

        Self {
            band_boxes,
            toggle,
            lighting: Lighting::default(),
            background: Rgb::BLACK,
        }
    }

    pub fn band_boxes(&self) -> &[SceneObject] {
        &self.band_boxes
    }

    pub fn band_box(&self, index: usize) -> Option<&SceneObject> {
        self.band_boxes.get(index)
    }

    pub fn band_box_mut(&mut self, index: usize) -> Option<&mut SceneObject> {
        self.band_boxes.get_mut(index)
    }

    pub fn toggle_box(&self) -> &SceneObject {
        &self.toggle
    }

    pub fn set_playing(&mut self, playing: bool) {
        self.toggle.color = if playing {
            TOGGLE_PLAYING_COLOR
        } else {
            TOGGLE_STOPPED_COLOR
        };
    }

    /// Every drawable object, band boxes first.
    pub fn objects(&self) -> impl Iterator<Item = &SceneObject> {
        self.band_boxes.iter().chain(std::iter::once(&self.toggle))
    }

    pub fn lighting(&self) -> &Lighting {
        &self.lighting
    }

    pub fn background(&self) -> Rgb {
        self.background
    }

    pub fn hits_toggle(&self, ray: &Ray) -> bool {
        let (min, max) = self.toggle.aabb();
        ray.intersect_aabb(min, max).is_some()
    }
}
