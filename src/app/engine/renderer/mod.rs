use anyhow::Result;
use context::Context;
use frame::Frame;
use pipeline::{VulkanProgram, VulkanShaderBackend};
use std::sync::Arc;
use swapchain::Swapchain;
use vertex::{TRIANGLE, Vertex, VertexBuffer};
use vulkanalia::prelude::v1_0::*;
use winit::window::Window;

use crate::config::{DemoConfig, ShaderFailurePolicy};
use crate::shader::{ShaderProgram, ShaderProgramBuilder};

mod context;
mod frame;
mod pipeline;
mod swapchain;
pub mod vertex;

/// Everything needed to draw the triangle into one window.
///
/// Fields drop in declaration order, so the device-owned objects go before
/// the context that owns the device.
pub struct Renderer {
    program: Option<ShaderProgram<VulkanProgram>>,
    vertices: VertexBuffer,
    frame: Frame,
    swapchain: Swapchain,
    context: Context,
}

impl Renderer {
    pub fn new(window: Arc<Window>, config: &DemoConfig) -> Result<Self> {
        // SAFETY: the window outlives the renderer (the engine drops the
        // renderer first), and every Vulkan object below is destroyed before
        // the context.
        let context = unsafe { Context::create(&window)? };
        let swapchain = unsafe { Swapchain::create(&window, &context)? };
        let frame = unsafe { Frame::create(&context)? };
        let vertices = unsafe { VertexBuffer::create(&context, &TRIANGLE)? };

        let backend =
            VulkanShaderBackend::new(&context.device, swapchain.render_pass, swapchain.extent);
        let built = ShaderProgramBuilder::new(&backend)
            .with_vertex_layout(Vertex::layout())
            .build_from_files(&config.vertex_shader, &config.fragment_shader);

        let program = match (built, config.on_shader_failure) {
            (Ok(program), _) => Some(program),
            (Err(error), ShaderFailurePolicy::Abort) => return Err(error.into()),
            (Err(error), ShaderFailurePolicy::KeepGoing) => {
                tracing::warn!("Continuing without a shader program: {}", error);
                None
            }
        };

        Ok(Self {
            program,
            vertices,
            frame,
            swapchain,
            context,
        })
    }

    pub fn has_program(&self) -> bool {
        self.program.is_some()
    }

    pub fn render_frame(&self) -> Result<()> {
        let program = self.program.as_ref().map(ShaderProgram::handle);
        // SAFETY: all handles used by the frame belong to `self.context`.
        unsafe {
            self.frame
                .present(&self.context, &self.swapchain, &self.vertices, program)
        }
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        if let Err(error) = unsafe { self.context.device.device_wait_idle() } {
            tracing::warn!("Failed to wait for the device before teardown: {}", error);
        }
    }
}
