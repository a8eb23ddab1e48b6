use anyhow::Result;
use bytemuck::{Pod, Zeroable};
use std::ptr;
use vulkanalia::prelude::v1_0::*;
use vulkanalia::vk;

use super::context::Context;
use crate::shader::{AttributeFormat, VertexAttribute, VertexLayout};

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
}

impl Vertex {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self {
            position: [x, y, z],
        }
    }

    pub fn layout() -> VertexLayout {
        VertexLayout {
            stride: size_of::<Vertex>() as u32,
            attributes: vec![VertexAttribute {
                location: 0,
                format: AttributeFormat::Float3,
                offset: 0,
            }],
        }
    }
}

pub const TRIANGLE: [Vertex; 3] = [
    Vertex::new(-0.5, -0.5, 0.0),
    Vertex::new(0.5, -0.5, 0.0),
    Vertex::new(0.0, 0.5, 0.0),
];

/// Host-visible vertex buffer, filled once at creation.
pub struct VertexBuffer {
    device: Device,
    pub buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    pub vertex_count: u32,
}

impl VertexBuffer {
    pub unsafe fn create(context: &Context, vertices: &[Vertex]) -> Result<Self> {
        let device = &context.device;
        let bytes: &[u8] = bytemuck::cast_slice(vertices);

        let info = vk::BufferCreateInfo::builder()
            .size(bytes.len() as u64)
            .usage(vk::BufferUsageFlags::VERTEX_BUFFER)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = device.create_buffer(&info, None)?;
        let mut this = Self {
            device: device.clone(),
            buffer,
            memory: vk::DeviceMemory::null(),
            vertex_count: vertices.len() as u32,
        };

        let requirements = device.get_buffer_memory_requirements(buffer);
        let memory_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(context.memory_type_index(
                vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
                requirements,
            )?);

        this.memory = device.allocate_memory(&memory_info, None)?;
        device.bind_buffer_memory(buffer, this.memory, 0)?;

        let mapped = device.map_memory(
            this.memory,
            0,
            bytes.len() as u64,
            vk::MemoryMapFlags::empty(),
        )?;
        ptr::copy_nonoverlapping(bytes.as_ptr(), mapped.cast::<u8>(), bytes.len());
        device.unmap_memory(this.memory);

        tracing::debug!("Uploaded {} vertices ({} bytes)", vertices.len(), bytes.len());
        Ok(this)
    }
}

impl Drop for VertexBuffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_buffer(self.buffer, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_matches_the_struct() {
        let layout = Vertex::layout();
        assert_eq!(layout.stride, 12);
        assert_eq!(layout.attributes.len(), 1);
        assert_eq!(layout.attributes[0].format.size(), layout.stride);
    }

    #[test]
    fn triangle_bytes_are_tightly_packed() {
        let bytes: &[u8] = bytemuck::cast_slice(&TRIANGLE);
        assert_eq!(bytes.len(), 3 * 12);

        let floats: &[f32] = bytemuck::cast_slice(bytes);
        assert_eq!(&floats[..3], &[-0.5, -0.5, 0.0]);
        assert_eq!(&floats[6..], &[0.0, 0.5, 0.0]);
    }
}
