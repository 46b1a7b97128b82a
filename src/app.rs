//! Windowed shell: winit event loop driving the visualizer and the renderer.

use anyhow::Result;
use glam::Vec2;
use log::{error, info};
use std::sync::Arc;
use winit::{
    dpi::LogicalSize,
    event::{ElementState, Event, MouseButton, MouseScrollDelta, WindowEvent},
    event_loop::EventLoop,
    keyboard::{KeyCode, PhysicalKey},
    window::WindowBuilder,
};

use crate::graphics::GraphicsEngine;
use crate::scene::OrbitCamera;
use crate::visualizer::Visualizer;

/// Pixels a press may travel and still count as a click.
const CLICK_SLOP: f32 = 4.0;
const PIXELS_PER_LINE: f32 = 50.0;

/// Tells left-button drags (orbit) apart from clicks (pick).
#[derive(Debug, Default)]
pub(crate) struct PointerState {
    cursor: Vec2,
    pressed_at: Option<Vec2>,
    dragging: bool,
}

impl PointerState {
    /// Returns the drag delta while the button is held.
    pub fn moved(&mut self, position: Vec2) -> Option<Vec2> {
        let delta = position - self.cursor;
        self.cursor = position;

        let origin = self.pressed_at?;
        if !self.dragging && position.distance(origin) > CLICK_SLOP {
            self.dragging = true;
        }
        Some(delta)
    }

    pub fn pressed(&mut self) {
        self.pressed_at = Some(self.cursor);
        self.dragging = false;
    }

    /// Returns the click position if the press never turned into a drag.
    pub fn released(&mut self) -> Option<Vec2> {
        let was_click = self.pressed_at.take().is_some() && !self.dragging;
        self.dragging = false;
        was_click.then_some(self.cursor)
    }
}

pub fn run(mut visualizer: Visualizer) -> Result<()> {
    let event_loop = EventLoop::new()?;
    let window = Arc::new(WindowBuilder::new()
        .with_title("boxbeat")
        .with_inner_size(LogicalSize::new(1200, 800))
        .build(&event_loop)?);

    let mut graphics_engine = pollster::block_on(GraphicsEngine::new(Arc::clone(&window)))?;
    let mut camera = OrbitCamera::default();
    let mut pointer = PointerState::default();

    info!("Click the red box (or press Space) to load audio, then again to play");

    let window_clone = Arc::clone(&window);
    event_loop.run(move |event, elwt| {
        match event {
            Event::WindowEvent { event, .. } => match event {
                WindowEvent::CloseRequested => {
                    info!("Close requested");
                    elwt.exit();
                }
                WindowEvent::KeyboardInput { event, .. } => {
                    if event.state != ElementState::Pressed || event.repeat {
                        return;
                    }
                    match event.physical_key {
                        PhysicalKey::Code(KeyCode::Escape) => {
                            info!("Escape pressed");
                            elwt.exit();
                        }
                        PhysicalKey::Code(KeyCode::Space) => visualizer.toggle(),
                        _ => {}
                    }
                }
                WindowEvent::CursorMoved { position, .. } => {
                    let position = Vec2::new(position.x as f32, position.y as f32);
                    if let Some(delta) = pointer.moved(position) {
                        camera.rotate(delta, graphics_engine.size().height as f32);
                    }
                }
                WindowEvent::MouseInput { state, button: MouseButton::Left, .. } => match state {
                    ElementState::Pressed => pointer.pressed(),
                    ElementState::Released => {
                        if let Some(click) = pointer.released() {
                            let size = graphics_engine.size();
                            let viewport = Vec2::new(size.width as f32, size.height as f32);
                            let ray = camera.ray_through(click, viewport);
                            if visualizer.scene().hits_toggle(&ray) {
                                visualizer.toggle();
                            }
                        }
                    }
                },
                WindowEvent::MouseWheel { delta, .. } => {
                    let lines = match delta {
                        MouseScrollDelta::LineDelta(_, y) => y,
                        MouseScrollDelta::PixelDelta(pixels) => pixels.y as f32 / PIXELS_PER_LINE,
                    };
                    // scrolling up moves the camera closer
                    camera.zoom(lines);
                }
                WindowEvent::Resized(physical_size) => {
                    graphics_engine.resize(physical_size);
                }
                WindowEvent::RedrawRequested => {
                    visualizer.frame();
                    if let Err(e) = graphics_engine.render(visualizer.scene(), &camera) {
                        error!("Render error: {}", e);
                    }
                }
                _ => {}
            },
            Event::AboutToWait => {
                window_clone.request_redraw();
            }
            _ => {}
        }
    })?;

    Ok(())
}
