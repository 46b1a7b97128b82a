use glam::{Mat4, Vec2, Vec3};

/// A half-line used for picking.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
        }
    }

    /// Distance along the ray to an axis-aligned box, if it is hit.
    pub fn intersect_aabb(&self, min: Vec3, max: Vec3) -> Option<f32> {
        let inv = self.direction.recip();
        let t1 = (min - self.origin) * inv;
        let t2 = (max - self.origin) * inv;

        let t_near = t1.min(t2).max_element();
        let t_far = t1.max(t2).min_element();

        if t_near.is_nan() || t_far.is_nan() || t_far < t_near.max(0.0) {
            return None;
        }
        Some(t_near.max(0.0))
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// Perspective camera orbiting a target point, driven by mouse drag and
/// scroll.
#[derive(Debug, Clone, PartialEq)]
pub struct OrbitCamera {
    pub target: Vec3,
    pub distance: f32,
    /// Azimuth around +Y, zero looking down -Z.
    pub yaw: f32,
    /// Elevation above the XZ plane.
    pub pitch: f32,
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
    pub min_distance: f32,
    pub max_distance: f32,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self {
            target: Vec3::ZERO,
            distance: 10.0,
            yaw: 0.0,
            pitch: 0.0,
            fov_y: 75f32.to_radians(),
            near: 0.1,
            far: 1000.0,
            min_distance: 1.0,
            max_distance: 100.0,
        }
    }
}

const PITCH_LIMIT: f32 = std::f32::consts::FRAC_PI_2 - 0.01;
const ZOOM_STEP: f32 = 0.95;

impl OrbitCamera {
    pub fn eye(&self) -> Vec3 {
        let (sin_yaw, cos_yaw) = self.yaw.sin_cos();
        let (sin_pitch, cos_pitch) = self.pitch.sin_cos();
        self.target + self.distance * Vec3::new(cos_pitch * sin_yaw, sin_pitch, cos_pitch * cos_yaw)
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye(), self.target, Vec3::Y)
    }

    pub fn projection(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, aspect.max(f32::EPSILON), self.near, self.far)
    }

    pub fn view_proj(&self, aspect: f32) -> Mat4 {
        self.projection(aspect) * self.view()
    }

    /// Orbit by a pointer drag of `delta` pixels in a viewport `height` pixels tall.
    pub fn rotate(&mut self, delta: Vec2, height: f32) {
        let per_pixel = 2.0 * std::f32::consts::PI / height.max(1.0);
        self.yaw -= delta.x * per_pixel;
        self.pitch = (self.pitch + delta.y * per_pixel).clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    /// Zoom by scroll `lines`; positive moves closer.
    pub fn zoom(&mut self, lines: f32) {
        self.distance = (self.distance * ZOOM_STEP.powf(lines)).clamp(self.min_distance, self.max_distance);
    }

    /// Ray through a cursor position given in pixels from the top-left.
    pub fn ray_through(&self, cursor: Vec2, viewport: Vec2) -> Ray {
        let ndc = Vec2::new(
            2.0 * cursor.x / viewport.x.max(1.0) - 1.0,
            1.0 - 2.0 * cursor.y / viewport.y.max(1.0),
        );
        let inverse = self.view_proj(viewport.x / viewport.y.max(1.0)).inverse();
        let near = inverse.project_point3(ndc.extend(0.0));
        let far = inverse.project_point3(ndc.extend(1.0));
        Ray::new(near, far - near)
    }

    /// Pixel position of a world point, for tests and overlays.
    pub fn project(&self, point: Vec3, viewport: Vec2) -> Vec2 {
        let ndc = self.view_proj(viewport.x / viewport.y.max(1.0)).project_point3(point);
        Vec2::new((ndc.x + 1.0) * 0.5 * viewport.x, (1.0 - ndc.y) * 0.5 * viewport.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIEWPORT: Vec2 = Vec2::new(1200.0, 800.0);

    #[test]
    fn test_default_eye_position() {
        let camera = OrbitCamera::default();
        assert!(camera.eye().abs_diff_eq(Vec3::new(0.0, 0.0, 10.0), 1e-5));
    }

    #[test]
    fn test_center_ray_points_at_target() {
        let camera = OrbitCamera::default();
        let ray = camera.ray_through(VIEWPORT / 2.0, VIEWPORT);

        assert!(ray.direction.abs_diff_eq(Vec3::NEG_Z, 1e-4));
        assert!((ray.origin.z - 9.9).abs() < 1e-3);
    }

    #[test]
    fn test_project_then_pick_round_trip() {
        let camera = OrbitCamera::default();
        let point = Vec3::new(0.0, -2.0, 0.0);
        let pixel = camera.project(point, VIEWPORT);
        assert!(pixel.y > VIEWPORT.y / 2.0);

        let ray = camera.ray_through(pixel, VIEWPORT);
        let t = ray
            .intersect_aabb(point - Vec3::splat(0.25), point + Vec3::splat(0.25))
            .unwrap();
        assert!(ray.at(t).distance(point) < 0.3);
    }

    #[test]
    fn test_drag_orbits_and_clamps_pitch() {
        let mut camera = OrbitCamera::default();

        camera.rotate(Vec2::new(200.0, 0.0), 800.0);
        assert!((camera.yaw + std::f32::consts::FRAC_PI_2).abs() < 1e-5);
        assert!((camera.eye().length() - 10.0).abs() < 1e-4);

        camera.rotate(Vec2::new(0.0, 100_000.0), 800.0);
        assert!(camera.pitch < std::f32::consts::FRAC_PI_2);
        assert!(camera.eye().y > 9.9);
    }

    #[test]
    fn test_zoom_is_clamped() {
        let mut camera = OrbitCamera::default();

        camera.zoom(1.0);
        assert!((camera.distance - 9.5).abs() < 1e-5);

        camera.zoom(1000.0);
        assert_eq!(camera.distance, camera.min_distance);

        camera.zoom(-1000.0);
        assert_eq!(camera.distance, camera.max_distance);
    }

    #[test]
    fn test_ray_misses_box_behind_it() {
        let ray = Ray::new(Vec3::ZERO, Vec3::Z);
        assert!(ray.intersect_aabb(Vec3::new(-1.0, -1.0, -5.0), Vec3::new(1.0, 1.0, -3.0)).is_none());
        assert_eq!(ray.intersect_aabb(Vec3::new(-1.0, -1.0, 3.0), Vec3::new(1.0, 1.0, 5.0)), Some(3.0));
    }
}
