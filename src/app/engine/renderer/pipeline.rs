use vulkanalia::prelude::v1_0::*;
use vulkanalia::vk;

use crate::shader::{
    AttributeFormat, CompiledStage, Diagnostic, ProgramInterface, ShaderBackend, StageKind,
};

/// Builds shader modules and graphics pipelines on a live device.
///
/// Pipelines target `render_pass` and a fixed `extent`; this demo never
/// resizes.
pub struct VulkanShaderBackend {
    device: Device,
    render_pass: vk::RenderPass,
    extent: vk::Extent2D,
}

impl VulkanShaderBackend {
    pub fn new(device: &Device, render_pass: vk::RenderPass, extent: vk::Extent2D) -> Self {
        Self {
            device: device.clone(),
            render_pass,
            extent,
        }
    }
}

pub struct VulkanShaderModule {
    device: Device,
    module: vk::ShaderModule,
    stage: vk::ShaderStageFlags,
    entry_point: Vec<u8>,
}

impl Drop for VulkanShaderModule {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_shader_module(self.module, None);
        }
    }
}

pub struct VulkanProgram {
    device: Device,
    pub layout: vk::PipelineLayout,
    pub pipeline: vk::Pipeline,
}

impl Drop for VulkanProgram {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_pipeline(self.pipeline, None);
            self.device.destroy_pipeline_layout(self.layout, None);
        }
    }
}

fn vertex_format(format: AttributeFormat) -> vk::Format {
    match format {
        AttributeFormat::Float => vk::Format::R32_SFLOAT,
        AttributeFormat::Float2 => vk::Format::R32G32_SFLOAT,
        AttributeFormat::Float3 => vk::Format::R32G32B32_SFLOAT,
        AttributeFormat::Float4 => vk::Format::R32G32B32A32_SFLOAT,
    }
}

fn link_diagnostic(what: &str, error: vk::ErrorCode) -> Diagnostic {
    Diagnostic::new(format!("{} failed: {}", what, error))
}

impl ShaderBackend for VulkanShaderBackend {
    type Module = VulkanShaderModule;
    type Program = VulkanProgram;

    fn create_module(&self, stage: &CompiledStage) -> Result<VulkanShaderModule, Diagnostic> {
        let info = vk::ShaderModuleCreateInfo::builder()
            .code_size(stage.spirv.len() * size_of::<u32>())
            .code(&stage.spirv);

        let module = unsafe { self.device.create_shader_module(&info, None) }.map_err(|error| {
            Diagnostic::new(format!(
                "vkCreateShaderModule for the {} stage failed: {}",
                stage.kind.name(),
                error
            ))
        })?;

        let mut entry_point = stage.entry_point.clone().into_bytes();
        entry_point.push(0);

        Ok(VulkanShaderModule {
            device: self.device.clone(),
            module,
            stage: match stage.kind {
                StageKind::Vertex => vk::ShaderStageFlags::VERTEX,
                StageKind::Fragment => vk::ShaderStageFlags::FRAGMENT,
            },
            entry_point,
        })
    }

    fn create_program(
        &self,
        vertex: &VulkanShaderModule,
        fragment: &VulkanShaderModule,
        interface: &ProgramInterface,
    ) -> Result<VulkanProgram, Diagnostic> {
        let stages = [vertex, fragment].map(|module| {
            vk::PipelineShaderStageCreateInfo::builder()
                .stage(module.stage)
                .module(module.module)
                .name(&module.entry_point)
        });

        let bindings = interface
            .vertex_stride
            .map(|stride| {
                vk::VertexInputBindingDescription::builder()
                    .binding(0)
                    .stride(stride)
                    .input_rate(vk::VertexInputRate::VERTEX)
            })
            .into_iter()
            .collect::<Vec<_>>();

        let attributes = interface
            .vertex_attributes
            .iter()
            .map(|attribute| {
                vk::VertexInputAttributeDescription::builder()
                    .binding(0)
                    .location(attribute.location)
                    .format(vertex_format(attribute.format))
                    .offset(attribute.offset)
            })
            .collect::<Vec<_>>();

        let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::builder()
            .vertex_binding_descriptions(&bindings)
            .vertex_attribute_descriptions(&attributes);

        let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);

        let viewport = vk::Viewport::builder()
            .x(0.0)
            .y(0.0)
            .width(self.extent.width as f32)
            .height(self.extent.height as f32)
            .min_depth(0.0)
            .max_depth(1.0);

        let scissor = vk::Rect2D::builder()
            .offset(vk::Offset2D { x: 0, y: 0 })
            .extent(self.extent);

        let viewports = &[viewport];
        let scissors = &[scissor];
        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewports(viewports)
            .scissors(scissors);

        // No culling: winding flips depending on which clip-space convention
        // the sources were written against.
        let rasterization_state = vk::PipelineRasterizationStateCreateInfo::builder()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(vk::CullModeFlags::NONE)
            .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
            .depth_bias_enable(false);

        let multisample_state = vk::PipelineMultisampleStateCreateInfo::builder()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::_1);

        let attachment = vk::PipelineColorBlendAttachmentState::builder()
            .color_write_mask(vk::ColorComponentFlags::all())
            .blend_enable(false);

        let attachments = &[attachment];
        let color_blend_state = vk::PipelineColorBlendStateCreateInfo::builder()
            .logic_op_enable(false)
            .logic_op(vk::LogicOp::COPY)
            .attachments(attachments)
            .blend_constants([0.0, 0.0, 0.0, 0.0]);

        let layout_info = vk::PipelineLayoutCreateInfo::builder();
        let layout = unsafe { self.device.create_pipeline_layout(&layout_info, None) }
            .map_err(|error| link_diagnostic("vkCreatePipelineLayout", error))?;

        let info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(&stages)
            .vertex_input_state(&vertex_input_state)
            .input_assembly_state(&input_assembly_state)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization_state)
            .multisample_state(&multisample_state)
            .color_blend_state(&color_blend_state)
            .layout(layout)
            .render_pass(self.render_pass)
            .subpass(0);

        let pipeline = unsafe {
            self.device
                .create_graphics_pipelines(vk::PipelineCache::null(), &[info], None)
        };

        match pipeline {
            Ok((pipelines, _)) => {
                tracing::debug!(
                    "Created graphics pipeline with {} vertex attributes",
                    attributes.len()
                );
                Ok(VulkanProgram {
                    device: self.device.clone(),
                    layout,
                    pipeline: pipelines[0],
                })
            }
            Err(error) => {
                unsafe { self.device.destroy_pipeline_layout(layout, None) };
                Err(link_diagnostic("vkCreateGraphicsPipelines", error))
            }
        }
    }
}
