use bytemuck::{Pod, Zeroable};
use glam::{Mat3, Vec3};
use wgpu::util::DeviceExt;

use crate::scene::SceneObject;

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

impl Vertex {
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

/// Unit cube centred on the origin, two counter-clockwise triangles per face.
pub fn unit_cube() -> Vec<Vertex> {
    const FACES: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
        // normal, u axis, v axis (u x v == normal)
        ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
        ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
        ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
    ];

    let mut vertices = Vec::with_capacity(36);
    for (normal, u, v) in FACES {
        let (n, u, v) = (Vec3::from(normal) * 0.5, Vec3::from(u) * 0.5, Vec3::from(v) * 0.5);
        let corners = [n - u - v, n + u - v, n + u + v, n - u + v];
        for index in [0, 1, 2, 0, 2, 3] {
            vertices.push(Vertex {
                position: corners[index].to_array(),
                normal,
            });
        }
    }
    vertices
}

/// Per-box data streamed to the GPU each frame.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct InstanceRaw {
    pub model: [[f32; 4]; 4],
    pub normal: [[f32; 4]; 3],
    pub color: [f32; 4],
}

impl InstanceRaw {
    const ATTRIBUTES: [wgpu::VertexAttribute; 8] = wgpu::vertex_attr_array![
        2 => Float32x4,
        3 => Float32x4,
        4 => Float32x4,
        5 => Float32x4,
        6 => Float32x4,
        7 => Float32x4,
        8 => Float32x4,
        9 => Float32x4,
    ];

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<InstanceRaw>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &Self::ATTRIBUTES,
        }
    }

    pub fn from_object(object: &SceneObject) -> Self {
        let model = object.model_matrix();
        let linear = Mat3::from_mat4(model);
        let normal = if linear.determinant().abs() > f32::EPSILON {
            linear.inverse().transpose()
        } else {
            Mat3::IDENTITY
        };
        let [r, g, b] = object.color.to_array();

        Self {
            model: model.to_cols_array_2d(),
            normal: [
                normal.x_axis.extend(0.0).to_array(),
                normal.y_axis.extend(0.0).to_array(),
                normal.z_axis.extend(0.0).to_array(),
            ],
            color: [r, g, b, 1.0],
        }
    }
}

pub struct VertexBuffer {
    pub buffer: wgpu::Buffer,
    pub vertex_count: u32,
}

impl VertexBuffer {
    pub fn new(device: &wgpu::Device, vertices: &[Vertex]) -> Self {
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Vertex Buffer"),
            contents: bytemuck::cast_slice(vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });

        Self {
            buffer,
            vertex_count: vertices.len() as u32,
        }
    }
}

/// Growable instance buffer; reallocated only when the box count outgrows it.
pub struct InstanceBuffer {
    pub buffer: wgpu::Buffer,
    capacity: usize,
    len: u32,
}

impl InstanceBuffer {
    pub fn new(device: &wgpu::Device, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buffer: Self::allocate(device, capacity),
            capacity,
            len: 0,
        }
    }

    fn allocate(device: &wgpu::Device, capacity: usize) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Instance Buffer"),
            size: (capacity * std::mem::size_of::<InstanceRaw>()) as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    pub fn update(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, instances: &[InstanceRaw]) {
        if instances.len() > self.capacity {
            self.capacity = instances.len().next_power_of_two();
            self.buffer = Self::allocate(device, self.capacity);
        }
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(instances));
        self.len = instances.len() as u32;
    }

    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Rgb;
    use glam::{Quat, Vec4};

    #[test]
    fn test_cube_winding_faces_outward() {
        let cube = unit_cube();
        assert_eq!(cube.len(), 36);

        for triangle in cube.chunks(3) {
            let [a, b, c] = [0, 1, 2].map(|i| Vec3::from(triangle[i].position));
            let normal = Vec3::from(triangle[0].normal);
            assert!((b - a).cross(c - a).dot(normal) > 0.0);
            // every vertex lies on the face its normal points at
            assert!(triangle.iter().all(|v| (Vec3::from(v.position).dot(normal) - 0.5).abs() < 1e-6));
        }
    }

    #[test]
    fn test_instance_carries_model_and_color() {
        let mut object = SceneObject::new(Vec3::ONE, Vec3::new(2.0, 1.0, 0.0), Rgb::new(0.25, 0.5, 1.0));
        object.rotation = Quat::from_rotation_y(0.3);

        let raw = InstanceRaw::from_object(&object);

        assert_eq!(raw.model, object.model_matrix().to_cols_array_2d());
        assert_eq!(raw.color, [0.25, 0.5, 1.0, 1.0]);
        // uniform scale: the normal matrix is just the rotation
        let rotated = Mat3::from_quat(object.rotation);
        assert!(Vec4::from(raw.normal[0]).truncate().abs_diff_eq(rotated.x_axis, 1e-5));
        assert!(Vec4::from(raw.normal[2]).truncate().abs_diff_eq(rotated.z_axis, 1e-5));
    }

    #[test]
    fn test_flattened_box_falls_back_to_identity_normals() {
        let mut object = SceneObject::new(Vec3::ONE, Vec3::ZERO, Rgb::WHITE);
        object.scale = Vec3::new(1.0, 0.0, 1.0);

        let raw = InstanceRaw::from_object(&object);
        assert_eq!(raw.normal[1], [0.0, 1.0, 0.0, 0.0]);
    }
}
