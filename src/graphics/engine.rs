use anyhow::Result;
use log::{debug, warn};
use std::sync::Arc;
use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::scene::{OrbitCamera, Scene};
use super::{unit_cube, DepthTexture, InstanceBuffer, InstanceRaw, ShaderManager, VertexBuffer, DEPTH_FORMAT};

const PIPELINE: &str = "boxes";

pub struct GraphicsEngine {
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    size: winit::dpi::PhysicalSize<u32>,

    shader_manager: ShaderManager,
    depth: DepthTexture,

    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,

    vertex_buffer: VertexBuffer,
    instance_buffer: InstanceBuffer,
    instances: Vec<InstanceRaw>,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Uniforms {
    pub view_proj: [[f32; 4]; 4],
    pub camera_position: [f32; 4],
    pub light_position: [f32; 4],
    pub light_color: [f32; 4],
    pub ambient: [f32; 4],
}

impl Uniforms {
    pub fn new(scene: &Scene, camera: &OrbitCamera, aspect: f32) -> Self {
        let lighting = scene.lighting();
        let [lr, lg, lb] = lighting.point_color.scaled(lighting.point_intensity).to_array();
        let [ar, ag, ab] = lighting.ambient_color.scaled(lighting.ambient_intensity).to_array();

        Self {
            view_proj: camera.view_proj(aspect).to_cols_array_2d(),
            camera_position: camera.eye().extend(1.0).to_array(),
            light_position: lighting.point_position.extend(1.0).to_array(),
            light_color: [lr, lg, lb, 1.0],
            ambient: [ar, ag, ab, 1.0],
        }
    }
}

impl GraphicsEngine {
    pub async fn new(window: Arc<Window>) -> Result<Self> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance.create_surface(window)?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| anyhow::anyhow!("Failed to find an appropriate adapter"))?;

        debug!("Using adapter: {:?}", adapter.get_info());

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    label: None,
                },
                None,
            )
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| anyhow::anyhow!("Surface reports no supported formats"))?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: surface_caps.alpha_modes.first().copied().unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        surface.configure(&device, &config);

        let uniform_bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
            label: Some("uniform_bind_group_layout"),
        });

        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Uniform Buffer"),
            contents: bytemuck::bytes_of(&<Uniforms as bytemuck::Zeroable>::zeroed()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &uniform_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
            label: Some("uniform_bind_group"),
        });

        let mut shader_manager = ShaderManager::new();
        shader_manager.load_shader(&device, "boxes", include_str!("../../shaders/boxes.wgsl"))?;
        shader_manager.create_pipeline(
            &device,
            PIPELINE,
            "boxes",
            surface_format,
            DEPTH_FORMAT,
            &uniform_bind_group_layout,
        )?;

        let vertex_buffer = VertexBuffer::new(&device, &unit_cube());
        let instance_buffer = InstanceBuffer::new(&device, 8);
        let depth = DepthTexture::new(&device, config.width, config.height);

        Ok(Self {
            surface,
            device,
            queue,
            config,
            size,
            shader_manager,
            depth,
            uniform_buffer,
            uniform_bind_group,
            vertex_buffer,
            instance_buffer,
            instances: Vec::new(),
        })
    }

    pub fn size(&self) -> winit::dpi::PhysicalSize<u32> {
        self.size
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.size = new_size;
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.device, &self.config);
            self.depth = DepthTexture::new(&self.device, new_size.width, new_size.height);
        }
    }

    pub fn render(&mut self, scene: &Scene, camera: &OrbitCamera) -> Result<()> {
        let aspect = self.config.width as f32 / self.config.height as f32;
        let uniforms = Uniforms::new(scene, camera, aspect);
        self.queue.write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[uniforms]));

        self.instances.clear();
        self.instances.extend(scene.objects().map(InstanceRaw::from_object));
        self.instance_buffer.update(&self.device, &self.queue, &self.instances);

        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                warn!("Surface lost, reconfiguring");
                self.surface.configure(&self.device, &self.config);
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Render Encoder"),
        });

        let background = scene.background();
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: background.r as f64,
                            g: background.g as f64,
                            b: background.b as f64,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            if let Some(pipeline) = self.shader_manager.get_pipeline(PIPELINE) {
                render_pass.set_pipeline(pipeline);
                render_pass.set_bind_group(0, &self.uniform_bind_group, &[]);
                render_pass.set_vertex_buffer(0, self.vertex_buffer.buffer.slice(..));
                render_pass.set_vertex_buffer(1, self.instance_buffer.buffer.slice(..));
                render_pass.draw(0..self.vertex_buffer.vertex_count, 0..self.instance_buffer.len());
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{default_bands, SceneSettings};

    #[test]
    fn test_uniforms_follow_scene_lighting() {
        let scene = Scene::new(&default_bands(), &SceneSettings::default());
        let camera = OrbitCamera::default();

        let uniforms = Uniforms::new(&scene, &camera, 1.5);

        assert_eq!(uniforms.camera_position, [0.0, 0.0, 10.0, 1.0]);
        assert_eq!(uniforms.light_position, [10.0, 10.0, 10.0, 1.0]);
        assert_eq!(uniforms.light_color, [1.0, 1.0, 1.0, 1.0]);
        assert_eq!(uniforms.ambient, [0.5, 0.5, 0.5, 1.0]);
        assert_eq!(uniforms.view_proj, camera.view_proj(1.5).to_cols_array_2d());
        assert_eq!(std::mem::size_of::<Uniforms>(), 128);
    }
}
