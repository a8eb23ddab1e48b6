//! Shader program building: load GLSL sources, compile each stage, link the
//! pair into a program on some backend, and report what went wrong.
//!
//! Stage handles and programs own their backend objects, so releasing them is
//! a matter of dropping them. A [`ShaderProgram`] only exists when both stages
//! compiled and the link succeeded.

use std::fmt;
use std::path::Path;

mod compile;
mod diagnostic;
mod error;
mod interface;
mod link;
mod offline;
mod source;

pub use compile::CompiledStage;
pub use diagnostic::Diagnostic;
pub use error::{ShaderError, ShaderResult};
pub use interface::{
    AttributeFormat, ProgramInterface, StageInterface, VertexAttribute, VertexLayout,
};
pub use offline::OfflineBackend;
pub use source::ShaderSource;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StageKind {
    Vertex,
    Fragment,
}

impl StageKind {
    pub fn name(self) -> &'static str {
        match self {
            StageKind::Vertex => "vertex",
            StageKind::Fragment => "fragment",
        }
    }

    fn naga_stage(self) -> naga::ShaderStage {
        match self {
            StageKind::Vertex => naga::ShaderStage::Vertex,
            StageKind::Fragment => naga::ShaderStage::Fragment,
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StageKind::Vertex => "Vertex",
            StageKind::Fragment => "Fragment",
        })
    }
}

/// The graphics side of program building.
///
/// `Module` and `Program` own their backend objects and release them on drop.
pub trait ShaderBackend {
    type Module;
    type Program;

    fn create_module(&self, stage: &CompiledStage) -> Result<Self::Module, Diagnostic>;

    fn create_program(
        &self,
        vertex: &Self::Module,
        fragment: &Self::Module,
        interface: &ProgramInterface,
    ) -> Result<Self::Program, Diagnostic>;
}

/// A compiled stage, valid from compilation until it is released.
pub struct StageHandle<M> {
    kind: StageKind,
    interface: StageInterface,
    module: M,
}

impl<M> StageHandle<M> {
    pub fn kind(&self) -> StageKind {
        self.kind
    }

    pub fn interface(&self) -> &StageInterface {
        &self.interface
    }

    pub fn module(&self) -> &M {
        &self.module
    }

    /// Hands the stage back to the backend. Dropping the handle does the same.
    pub fn release(self) {
        tracing::trace!("Releasing {} stage", self.kind.name());
    }
}

impl<M> fmt::Debug for StageHandle<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageHandle")
            .field("kind", &self.kind)
            .field("interface", &self.interface)
            .finish_non_exhaustive()
    }
}

/// A linked program, ready to be bound for rendering.
pub struct ShaderProgram<P> {
    program: P,
    interface: ProgramInterface,
}

impl<P> ShaderProgram<P> {
    pub fn handle(&self) -> &P {
        &self.program
    }

    pub fn interface(&self) -> &ProgramInterface {
        &self.interface
    }
}

impl<P> fmt::Debug for ShaderProgram<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShaderProgram")
            .field("interface", &self.interface)
            .finish_non_exhaustive()
    }
}

pub struct ShaderProgramBuilder<'a, B: ShaderBackend> {
    backend: &'a B,
    vertex_layout: Option<VertexLayout>,
}

impl<'a, B: ShaderBackend> ShaderProgramBuilder<'a, B> {
    pub fn new(backend: &'a B) -> Self {
        Self {
            backend,
            vertex_layout: None,
        }
    }

    /// Makes linking also check the vertex stage's inputs against the buffer
    /// layout the program will be fed with.
    pub fn with_vertex_layout(mut self, layout: VertexLayout) -> Self {
        self.vertex_layout = Some(layout);
        self
    }

    pub fn compile_stage(
        &self,
        kind: StageKind,
        source: &ShaderSource,
    ) -> ShaderResult<StageHandle<B::Module>> {
        let result = compile::compile_glsl(kind, source).and_then(|stage| {
            let module = self.backend.create_module(&stage)?;
            Ok(StageHandle {
                kind,
                interface: stage.interface,
                module,
            })
        });

        result.map_err(|diagnostic| {
            tracing::error!(
                truncated = diagnostic.is_truncated(),
                "{} shader error: {}",
                kind,
                diagnostic
            );
            ShaderError::StageCompile { kind, diagnostic }
        })
    }

    pub fn link_program(
        &self,
        vertex: &StageHandle<B::Module>,
        fragment: &StageHandle<B::Module>,
    ) -> ShaderResult<ShaderProgram<B::Program>> {
        let result = link::link_interfaces(
            (vertex.kind(), vertex.interface()),
            (fragment.kind(), fragment.interface()),
            self.vertex_layout.as_ref(),
        )
        .and_then(|interface| {
            let program =
                self.backend
                    .create_program(vertex.module(), fragment.module(), &interface)?;
            Ok(ShaderProgram { program, interface })
        });

        result.map_err(|diagnostic| {
            tracing::error!(
                truncated = diagnostic.is_truncated(),
                "Link error: {}",
                diagnostic
            );
            ShaderError::Link { diagnostic }
        })
    }

    /// Compiles both stages, links them, and releases the stages whatever the
    /// outcome. Both stages are compiled before giving up so that every
    /// compile diagnostic gets reported.
    pub fn build_from_sources(
        &self,
        vertex: &ShaderSource,
        fragment: &ShaderSource,
    ) -> ShaderResult<ShaderProgram<B::Program>> {
        let vertex_stage = self.compile_stage(StageKind::Vertex, vertex);
        let fragment_stage = self.compile_stage(StageKind::Fragment, fragment);
        let (vertex_stage, fragment_stage) = (vertex_stage?, fragment_stage?);

        let program = self.link_program(&vertex_stage, &fragment_stage);

        vertex_stage.release();
        fragment_stage.release();
        program
    }

    pub fn build_from_files(
        &self,
        vertex_path: impl AsRef<Path>,
        fragment_path: impl AsRef<Path>,
    ) -> ShaderResult<ShaderProgram<B::Program>> {
        let vertex = load_logged(vertex_path.as_ref())?;
        let fragment = load_logged(fragment_path.as_ref())?;
        let program = self.build_from_sources(&vertex, &fragment)?;

        tracing::info!(
            "Linked shader program from `{}` and `{}`",
            vertex.origin(),
            fragment.origin()
        );
        Ok(program)
    }
}

fn load_logged(path: &Path) -> ShaderResult<ShaderSource> {
    ShaderSource::load(path).inspect_err(|error| tracing::error!("{}", error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::interface::InterfaceType;

    const VERTEX: &str = "#version 450
void main() { gl_Position = vec4(0, 0, 0, 1); }
";

    const FRAGMENT: &str = "#version 450
void main() { }
";

    const COLORED_VERTEX: &str = "#version 450
layout(location = 0) in vec3 a_position;
layout(location = 0) out vec3 v_color;
void main() {
    v_color = vec3(1.0, 0.5, 0.2);
    gl_Position = vec4(a_position, 1.0);
}
";

    const COLORED_FRAGMENT: &str = "#version 450
layout(location = 0) in vec3 v_color;
layout(location = 0) out vec4 out_color;
void main() { out_color = vec4(v_color, 1.0); }
";

    fn source(text: &str) -> ShaderSource {
        ShaderSource::from_text("inline", text)
    }

    fn position_layout() -> VertexLayout {
        VertexLayout {
            stride: 12,
            attributes: vec![VertexAttribute {
                location: 0,
                format: AttributeFormat::Float3,
                offset: 0,
            }],
        }
    }

    #[test]
    fn minimal_stages_link_without_diagnostics() {
        let backend = OfflineBackend::default();
        let builder = ShaderProgramBuilder::new(&backend);

        let program = builder
            .build_from_sources(&source(VERTEX), &source(FRAGMENT))
            .unwrap();

        assert!(program.interface().varyings.is_empty());
        assert_eq!(backend.live_programs(), 1);
        // The intermediate stages are gone once the program exists.
        assert_eq!(backend.live_modules(), 0);
    }

    #[test]
    fn varyings_and_attributes_are_resolved() {
        let backend = OfflineBackend::default();
        let builder = ShaderProgramBuilder::new(&backend).with_vertex_layout(position_layout());

        let program = builder
            .build_from_sources(&source(COLORED_VERTEX), &source(COLORED_FRAGMENT))
            .unwrap();

        let interface = program.interface();
        assert_eq!(interface.vertex_stride, Some(12));
        assert_eq!(interface.vertex_attributes[0].location, 0);
        assert_eq!(interface.varyings.len(), 1);
        assert_eq!(interface.varyings[0].ty, InterfaceType::VEC3);
    }

    #[test]
    fn fragment_interpolation_qualifier_need_not_match() {
        let backend = OfflineBackend::default();
        let builder = ShaderProgramBuilder::new(&backend).with_vertex_layout(position_layout());
        let flat_fragment = COLORED_FRAGMENT.replace("in vec3 v_color", "flat in vec3 v_color");

        let program = builder
            .build_from_sources(&source(COLORED_VERTEX), &source(&flat_fragment))
            .unwrap();

        assert_eq!(program.interface().varyings.len(), 1);
    }

    #[test]
    fn syntax_error_is_a_stage_compile_failure() {
        let backend = OfflineBackend::default();
        let builder = ShaderProgramBuilder::new(&backend);
        let broken = source("#version 450\nvoid main() { invalid_token; }\n");

        match builder.compile_stage(StageKind::Vertex, &broken) {
            Err(ShaderError::StageCompile { kind, diagnostic }) => {
                assert_eq!(kind, StageKind::Vertex);
                assert!(!diagnostic.text().is_empty());
            }
            other => panic!("expected a compile failure, got {:?}", other),
        }
        assert_eq!(backend.live_modules(), 0);
    }

    #[test]
    fn failed_fragment_compile_releases_the_vertex_stage() {
        let backend = OfflineBackend::default();
        let builder = ShaderProgramBuilder::new(&backend);

        let error = builder
            .build_from_sources(&source(VERTEX), &source("#version 450\nvoid main() {"))
            .unwrap_err();

        assert!(matches!(
            error,
            ShaderError::StageCompile {
                kind: StageKind::Fragment,
                ..
            }
        ));
        assert_eq!(backend.live_modules(), 0);
        assert_eq!(backend.live_programs(), 0);
    }

    #[test]
    fn two_vertex_stages_do_not_link() {
        let backend = OfflineBackend::default();
        let builder = ShaderProgramBuilder::new(&backend);

        let first = builder.compile_stage(StageKind::Vertex, &source(VERTEX)).unwrap();
        let second = builder.compile_stage(StageKind::Vertex, &source(VERTEX)).unwrap();

        match builder.link_program(&first, &second) {
            Err(ShaderError::Link { diagnostic }) => assert!(!diagnostic.text().is_empty()),
            other => panic!("expected a link failure, got {:?}", other),
        }
        assert_eq!(backend.live_programs(), 0);
    }

    #[test]
    fn unmatched_varying_is_a_link_failure() {
        let backend = OfflineBackend::default();
        let builder = ShaderProgramBuilder::new(&backend);

        let error = builder
            .build_from_sources(&source(VERTEX), &source(COLORED_FRAGMENT))
            .unwrap_err();

        match error {
            ShaderError::Link { diagnostic } => {
                assert!(diagnostic.text().contains("v_color"));
            }
            other => panic!("expected a link failure, got {:?}", other),
        }
        // Stages are released even though linking failed.
        assert_eq!(backend.live_modules(), 0);
    }

    #[test]
    fn same_source_twice_gives_independent_stages() {
        let backend = OfflineBackend::default();
        let builder = ShaderProgramBuilder::new(&backend);

        let first = builder.compile_stage(StageKind::Vertex, &source(VERTEX)).unwrap();
        let second = builder.compile_stage(StageKind::Vertex, &source(VERTEX)).unwrap();
        assert_ne!(first.module().id(), second.module().id());
        assert_eq!(backend.live_modules(), 2);

        let second_id = second.module().id();
        first.release();
        assert_eq!(backend.live_modules(), 1);
        assert!(backend.is_module_live(second_id));

        second.release();
        assert_eq!(backend.live_modules(), 0);
    }

    #[test]
    fn missing_file_is_a_source_load_failure() {
        let backend = OfflineBackend::default();
        let builder = ShaderProgramBuilder::new(&backend);
        let missing = std::env::temp_dir().join("vulkan_shader_demo_missing.vert");

        let error = builder.build_from_files(&missing, &missing).unwrap_err();

        assert!(matches!(error, ShaderError::SourceLoad { .. }));
        assert_eq!(backend.live_modules(), 0);
    }

    #[test]
    fn build_from_files_reads_both_stages() {
        let dir = std::env::temp_dir()
            .join(format!("vulkan_shader_demo_build_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let vertex_path = dir.join("main.vert");
        let fragment_path = dir.join("main.frag");
        std::fs::write(&vertex_path, COLORED_VERTEX).unwrap();
        std::fs::write(&fragment_path, COLORED_FRAGMENT).unwrap();

        let backend = OfflineBackend::default();
        let result = ShaderProgramBuilder::new(&backend)
            .with_vertex_layout(position_layout())
            .build_from_files(&vertex_path, &fragment_path);
        let _ = std::fs::remove_dir_all(&dir);

        let program = result.unwrap();
        assert_eq!(program.interface().varyings.len(), 1);
    }

    #[test]
    fn backend_rejection_surfaces_as_link_failure() {
        let backend = OfflineBackend::default().rejecting_programs("pipeline creation refused");
        let builder = ShaderProgramBuilder::new(&backend);

        let error = builder
            .build_from_sources(&source(VERTEX), &source(FRAGMENT))
            .unwrap_err();

        assert_eq!(error.to_string(), "Link error: pipeline creation refused");
        assert_eq!(backend.live_modules(), 0);
    }
}
