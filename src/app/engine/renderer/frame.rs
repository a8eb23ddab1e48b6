use anyhow::{Result, anyhow};
use vulkanalia::prelude::v1_0::*;
use vulkanalia::vk;
use vulkanalia::vk::KhrSwapchainExtension;

use super::context::Context;
use super::pipeline::VulkanProgram;
use super::swapchain::Swapchain;
use super::vertex::VertexBuffer;

/// Clear color of the presented frame (opaque black).
pub const CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// Command buffer and synchronisation objects for a single frame.
pub struct Frame {
    device: Device,
    command_pool: vk::CommandPool,
    command_buffer: vk::CommandBuffer,
    image_available: vk::Semaphore,
    render_finished: vk::Semaphore,
    in_flight: vk::Fence,
}

impl Frame {
    pub unsafe fn create(context: &Context) -> Result<Self> {
        let device = &context.device;

        let pool_info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::empty())
            .queue_family_index(context.data.queue_families.graphics);

        let mut this = Self {
            device: device.clone(),
            command_pool: device.create_command_pool(&pool_info, None)?,
            command_buffer: vk::CommandBuffer::null(),
            image_available: vk::Semaphore::null(),
            render_finished: vk::Semaphore::null(),
            in_flight: vk::Fence::null(),
        };

        let allocate_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(this.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        this.command_buffer = device.allocate_command_buffers(&allocate_info)?[0];

        let semaphore_info = vk::SemaphoreCreateInfo::builder();
        this.image_available = device.create_semaphore(&semaphore_info, None)?;
        this.render_finished = device.create_semaphore(&semaphore_info, None)?;
        this.in_flight = device.create_fence(&vk::FenceCreateInfo::builder(), None)?;

        Ok(this)
    }

    /// Records, submits and presents one frame, then waits for the GPU to
    /// finish with it. Without a program only the clear is recorded.
    pub unsafe fn present(
        &self,
        context: &Context,
        swapchain: &Swapchain,
        vertices: &VertexBuffer,
        program: Option<&VulkanProgram>,
    ) -> Result<()> {
        let device = &self.device;

        let image_index = match device.acquire_next_image_khr(
            swapchain.swapchain,
            u64::MAX,
            self.image_available,
            vk::Fence::null(),
        ) {
            Ok((image_index, _)) => image_index,
            Err(error) => return Err(anyhow!("Failed to acquire a swapchain image: {}", error)),
        };

        self.record(swapchain, image_index as usize, vertices, program)?;

        let wait_semaphores = &[self.image_available];
        let wait_stages = &[vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = &[self.command_buffer];
        let signal_semaphores = &[self.render_finished];
        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(wait_semaphores)
            .wait_dst_stage_mask(wait_stages)
            .command_buffers(command_buffers)
            .signal_semaphores(signal_semaphores);

        device.queue_submit(context.data.graphics_queue, &[submit_info], self.in_flight)?;

        let swapchains = &[swapchain.swapchain];
        let image_indices = &[image_index];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(signal_semaphores)
            .swapchains(swapchains)
            .image_indices(image_indices);

        device.queue_present_khr(context.data.present_queue, &present_info)?;

        device.wait_for_fences(&[self.in_flight], true, u64::MAX)?;
        device.queue_wait_idle(context.data.present_queue)?;

        tracing::info!(
            "Presented swapchain image {} ({})",
            image_index,
            if program.is_some() { "triangle" } else { "clear only" }
        );
        Ok(())
    }

    unsafe fn record(
        &self,
        swapchain: &Swapchain,
        image_index: usize,
        vertices: &VertexBuffer,
        program: Option<&VulkanProgram>,
    ) -> Result<()> {
        let device = &self.device;
        let command_buffer = self.command_buffer;

        let begin_info = vk::CommandBufferBeginInfo::builder()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        device.begin_command_buffer(command_buffer, &begin_info)?;

        let render_area = vk::Rect2D::builder()
            .offset(vk::Offset2D::default())
            .extent(swapchain.extent);

        let clear_value = vk::ClearValue {
            color: vk::ClearColorValue {
                float32: CLEAR_COLOR,
            },
        };

        let clear_values = &[clear_value];
        let info = vk::RenderPassBeginInfo::builder()
            .render_pass(swapchain.render_pass)
            .framebuffer(swapchain.framebuffers[image_index])
            .render_area(render_area)
            .clear_values(clear_values);

        device.cmd_begin_render_pass(command_buffer, &info, vk::SubpassContents::INLINE);
        if let Some(program) = program {
            device.cmd_bind_pipeline(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                program.pipeline,
            );
            device.cmd_bind_vertex_buffers(command_buffer, 0, &[vertices.buffer], &[0]);
            device.cmd_draw(command_buffer, vertices.vertex_count, 1, 0, 0);
        }
        device.cmd_end_render_pass(command_buffer);

        device.end_command_buffer(command_buffer)?;
        Ok(())
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_fence(self.in_flight, None);
            self.device.destroy_semaphore(self.render_finished, None);
            self.device.destroy_semaphore(self.image_available, None);
            // Freeing the pool frees its command buffers.
            self.device.destroy_command_pool(self.command_pool, None);
        }
    }
}
