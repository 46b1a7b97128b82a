pub mod band;
pub mod camera;
pub mod layout;
pub mod mapper;

pub use band::{default_bands, FrequencyBand, Rgb};
pub use camera::{OrbitCamera, Ray};
pub use layout::{Lighting, Scene, SceneObject, SceneSettings};
pub use mapper::{BandVisualState, BinRange, FrequencyMapper};
