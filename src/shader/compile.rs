use naga::back::spv;
use naga::front::glsl;
use naga::valid::{Capabilities, ValidationFlags, Validator};

use super::StageKind;
use super::diagnostic::Diagnostic;
use super::interface::StageInterface;
use super::source::ShaderSource;

pub const ENTRY_POINT: &str = "main";

/// A stage that made it through parsing and validation: SPIR-V ready to hand
/// to a backend, plus its reflected interface.
#[derive(Clone, Debug)]
pub struct CompiledStage {
    pub kind: StageKind,
    pub entry_point: String,
    pub spirv: Vec<u32>,
    pub interface: StageInterface,
}

/// Parses, validates and lowers GLSL for one stage.
pub fn compile_glsl(kind: StageKind, source: &ShaderSource) -> Result<CompiledStage, Diagnostic> {
    let stage = kind.naga_stage();
    let text = source.text();

    let mut frontend = glsl::Frontend::default();
    let module = frontend
        .parse(&glsl::Options::from(stage), text)
        .map_err(|errors| Diagnostic::new(errors.emit_to_string(text)))?;

    let entry_point = module
        .entry_points
        .iter()
        .find(|entry_point| entry_point.stage == stage && entry_point.name == ENTRY_POINT)
        .ok_or_else(|| {
            Diagnostic::new(format!(
                "{}: no `{}` entry point for the {} stage",
                source.origin(),
                ENTRY_POINT,
                kind.name()
            ))
        })?;

    let info = Validator::new(ValidationFlags::all(), Capabilities::empty())
        .validate(&module)
        .map_err(|error| Diagnostic::new(error.emit_to_string(text)))?;

    let pipeline_options = spv::PipelineOptions {
        shader_stage: stage,
        entry_point: ENTRY_POINT.to_owned(),
    };
    // The default writer flags flip clip-space Y, so GL-style coordinates in
    // the sources come out upright under Vulkan.
    let spirv = spv::write_vec(
        &module,
        &info,
        &spv::Options::default(),
        Some(&pipeline_options),
    )
    .map_err(|error| Diagnostic::new(format!("SPIR-V generation failed: {}", error)))?;

    let interface = StageInterface::reflect(&module, entry_point);
    tracing::debug!(
        "Compiled {} stage from `{}`: {} SPIR-V words, {} inputs, {} outputs",
        kind.name(),
        source.origin(),
        spirv.len(),
        interface.inputs.len(),
        interface.outputs.len()
    );

    Ok(CompiledStage {
        kind,
        entry_point: ENTRY_POINT.to_owned(),
        spirv,
        interface,
    })
}
