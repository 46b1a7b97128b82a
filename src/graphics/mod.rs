pub mod engine;
pub mod shader;
pub mod texture;
pub mod vertex;

pub use engine::{GraphicsEngine, Uniforms};
pub use shader::ShaderManager;
pub use texture::{DepthTexture, DEPTH_FORMAT};
pub use vertex::{unit_cube, InstanceBuffer, InstanceRaw, Vertex, VertexBuffer};
