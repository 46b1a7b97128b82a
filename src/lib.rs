pub mod app;
pub mod audio;
pub mod config;
pub mod graphics;
pub mod headless;
pub mod scene;
pub mod visualizer;

pub use config::VisualizerConfig;
pub use visualizer::Visualizer;
