use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::rc::Rc;

use super::compile::CompiledStage;
use super::diagnostic::Diagnostic;
use super::interface::ProgramInterface;
use super::{ShaderBackend, StageKind};

const SPIRV_MAGIC: u32 = 0x0723_0203;

#[derive(Default)]
struct Registry {
    modules: BTreeSet<u64>,
    programs: usize,
}

/// A backend with no GPU behind it.
///
/// Modules and programs are bookkeeping entries, so a build against it checks
/// everything up to (but not including) driver-side pipeline creation.
#[derive(Default)]
pub struct OfflineBackend {
    next_id: Cell<u64>,
    registry: Rc<RefCell<Registry>>,
    #[cfg(test)]
    program_rejection: Option<String>,
}

impl OfflineBackend {
    pub fn live_modules(&self) -> usize {
        self.registry.borrow().modules.len()
    }

    pub fn live_programs(&self) -> usize {
        self.registry.borrow().programs
    }

    #[cfg(test)]
    pub(crate) fn is_module_live(&self, id: u64) -> bool {
        self.registry.borrow().modules.contains(&id)
    }

    #[cfg(test)]
    pub(crate) fn rejecting_programs(mut self, reason: &str) -> Self {
        self.program_rejection = Some(reason.to_owned());
        self
    }
}

pub struct OfflineModule {
    id: u64,
    kind: StageKind,
    registry: Rc<RefCell<Registry>>,
}

impl OfflineModule {
    #[cfg(test)]
    pub(crate) fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for OfflineModule {
    fn drop(&mut self) {
        self.registry.borrow_mut().modules.remove(&self.id);
    }
}

pub struct OfflineProgram {
    registry: Rc<RefCell<Registry>>,
}

impl Drop for OfflineProgram {
    fn drop(&mut self) {
        self.registry.borrow_mut().programs -= 1;
    }
}

impl ShaderBackend for OfflineBackend {
    type Module = OfflineModule;
    type Program = OfflineProgram;

    fn create_module(&self, stage: &CompiledStage) -> Result<OfflineModule, Diagnostic> {
        if stage.spirv.first() != Some(&SPIRV_MAGIC) {
            return Err(Diagnostic::new(format!(
                "{} stage is not a SPIR-V module",
                stage.kind.name()
            )));
        }

        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.registry.borrow_mut().modules.insert(id);

        Ok(OfflineModule {
            id,
            kind: stage.kind,
            registry: Rc::clone(&self.registry),
        })
    }

    fn create_program(
        &self,
        vertex: &OfflineModule,
        fragment: &OfflineModule,
        interface: &ProgramInterface,
    ) -> Result<OfflineProgram, Diagnostic> {
        #[cfg(test)]
        if let Some(reason) = &self.program_rejection {
            return Err(Diagnostic::new(reason.clone()));
        }

        tracing::debug!(
            "Offline program from modules {} ({}) and {} ({}): {} attributes, {} varyings",
            vertex.id,
            vertex.kind.name(),
            fragment.id,
            fragment.kind.name(),
            interface.vertex_attributes.len(),
            interface.varyings.len()
        );

        self.registry.borrow_mut().programs += 1;
        Ok(OfflineProgram {
            registry: Rc::clone(&self.registry),
        })
    }
}
