use anyhow::{anyhow, Result};
use std::collections::HashMap;
use wgpu::{Device, RenderPipeline, ShaderModule};

use super::vertex::{InstanceRaw, Vertex};

/// Opaque, back-face culled, depth-tested triangles.
pub fn box_primitive() -> wgpu::PrimitiveState {
    wgpu::PrimitiveState {
        topology: wgpu::PrimitiveTopology::TriangleList,
        front_face: wgpu::FrontFace::Ccw,
        cull_mode: Some(wgpu::Face::Back),
        ..Default::default()
    }
}

pub fn box_depth_state(format: wgpu::TextureFormat) -> wgpu::DepthStencilState {
    wgpu::DepthStencilState {
        format,
        depth_write_enabled: true,
        depth_compare: wgpu::CompareFunction::Less,
        stencil: wgpu::StencilState::default(),
        bias: wgpu::DepthBiasState::default(),
    }
}

/// Compiled WGSL modules and the pipelines built from them, by name.
#[derive(Default)]
pub struct ShaderManager {
    modules: HashMap<String, ShaderModule>,
    pipelines: HashMap<String, RenderPipeline>,
}

impl ShaderManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_shader(&mut self, device: &Device, name: &str, source: &str) -> Result<()> {
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(name),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
        self.modules.insert(name.to_string(), module);
        Ok(())
    }

    /// Pipeline drawing the cube mesh once per [`InstanceRaw`], lit by the
    /// uniforms in `bind_group_layout`.
    pub fn create_pipeline(
        &mut self,
        device: &Device,
        name: &str,
        shader_name: &str,
        color_format: wgpu::TextureFormat,
        depth_format: wgpu::TextureFormat,
        bind_group_layout: &wgpu::BindGroupLayout,
    ) -> Result<()> {
        let module = self
            .modules
            .get(shader_name)
            .ok_or_else(|| anyhow!("Shader '{}' not loaded", shader_name))?;

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(&format!("{} layout", name)),
            bind_group_layouts: &[bind_group_layout],
            push_constant_ranges: &[],
        });

        let targets = [Some(wgpu::ColorTargetState {
            format: color_format,
            blend: Some(wgpu::BlendState::REPLACE),
            write_mask: wgpu::ColorWrites::ALL,
        })];

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(name),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module,
                entry_point: "vs_main",
                buffers: &[Vertex::desc(), InstanceRaw::desc()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module,
                entry_point: "fs_main",
                targets: &targets,
                compilation_options: Default::default(),
            }),
            primitive: box_primitive(),
            depth_stencil: Some(box_depth_state(depth_format)),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });

        self.pipelines.insert(name.to_string(), pipeline);
        Ok(())
    }

    pub fn get_pipeline(&self, name: &str) -> Option<&RenderPipeline> {
        self.pipelines.get(name)
    }
}
