use std::path::{Path, PathBuf};

use crate::error::{EngineError, Result};
use crate::gpu::{ProgramId, ProgramLayout, ProgramSource, ReleaseQueue, ReleasedHandle, RenderBackend, Technique};

use super::reflect::reflect_program;
use super::{Resource, ResourceKind};

/// Stage hint given at load time. Kept for diagnostics only; WGSL modules carry
/// their own stages.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum ShaderStage {
    Vertex,
    Pixel,
    Geometry,
    Hull,
    #[default]
    Unspecified,
}

/// Opaque reference to a technique of one program.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct TechniqueHandle(usize);

impl TechniqueHandle {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Compiled WGSL program with its reflected techniques and semantic parameters.
pub struct ShaderProgram {
    id: Option<ProgramId>,
    path: PathBuf,
    stage: ShaderStage,
    source: Option<ProgramSource>,
    active: Option<usize>,
    releases: ReleaseQueue,
}

impl std::fmt::Debug for ShaderProgram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShaderProgram")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("stage", &self.stage)
            .field("active", &self.active)
            .finish()
    }
}

impl ShaderProgram {
    pub fn new(releases: ReleaseQueue) -> Self {
        Self {
            id: None,
            path: PathBuf::new(),
            stage: ShaderStage::Unspecified,
            source: None,
            active: None,
            releases,
        }
    }

    #[inline]
    pub fn id(&self) -> Option<ProgramId> {
        self.id
    }

    #[inline]
    pub fn is_loaded(&self) -> bool {
        self.id.is_some()
    }

    #[inline]
    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn layout(&self) -> Option<&ProgramLayout> {
        self.source.as_ref().map(|s| &s.layout)
    }

    /// Reads, validates and compiles a WGSL file. The first technique becomes active.
    pub fn load_from_file(
        &mut self,
        backend: &mut dyn RenderBackend,
        path: impl AsRef<Path>,
        stage: ShaderStage,
    ) -> Result<()> {
        let path = path.as_ref();
        let wgsl = std::fs::read_to_string(path).map_err(|err| EngineError::load(path, err))?;
        self.load_from_source(backend, path, &wgsl, stage)
    }

    /// Like [`ShaderProgram::load_from_file`] with the source already in memory.
    /// `path` names the program in diagnostics.
    pub fn load_from_source(
        &mut self,
        backend: &mut dyn RenderBackend,
        path: impl AsRef<Path>,
        wgsl: &str,
        stage: ShaderStage,
    ) -> Result<()> {
        let path = path.as_ref();
        let label = path.display().to_string();
        let source = reflect_program(&label, wgsl)
            .map_err(|diag| EngineError::load(path, format!("[stage={stage:?}] {diag}")))?;
        let id = backend
            .create_program(&source)
            .map_err(|err| EngineError::load(path, format!("[stage={stage:?}] {err}")))?;

        self.release_handle(backend);
        self.id = Some(id);
        self.path = path.to_path_buf();
        self.stage = stage;
        self.active = (!source.layout.techniques.is_empty()).then_some(0);
        log::debug!(
            "loaded program {label} ({} techniques)",
            source.layout.techniques.len()
        );
        self.source = Some(source);
        Ok(())
    }

    /// Selects a technique by name. Returns `None` (and keeps the current one) if absent.
    pub fn set_active_technique(&mut self, name: &str) -> Option<TechniqueHandle> {
        let index = self.layout()?.technique_index(name)?;
        self.active = Some(index);
        Some(TechniqueHandle(index))
    }

    pub fn active_technique(&self) -> Option<TechniqueHandle> {
        self.active.map(TechniqueHandle)
    }

    pub fn technique(&self, handle: TechniqueHandle) -> Option<&Technique> {
        self.layout()?.techniques.get(handle.0)
    }

    fn release_handle(&mut self, backend: &mut dyn RenderBackend) {
        if let Some(id) = self.id.take() {
            if let Err(err) = backend.destroy_program(id) {
                log::debug!("destroying program `{}`: {err}", self.path.display());
            }
        }
    }
}

impl Resource for ShaderProgram {
    fn kind(&self) -> ResourceKind {
        ResourceKind::ShaderProgram
    }

    fn name(&self) -> String {
        self.path.display().to_string()
    }

    fn load(&mut self, backend: &mut dyn RenderBackend, path: &Path) -> Result<()> {
        self.load_from_file(backend, path, ShaderStage::Unspecified)
    }

    fn unload(&mut self, backend: &mut dyn RenderBackend) {
        self.release_handle(backend);
        self.source = None;
        self.active = None;
    }

    fn on_device_lost(&mut self, backend: &mut dyn RenderBackend) -> Result<()> {
        self.release_handle(backend);
        Ok(())
    }

    fn on_device_restored(&mut self, backend: &mut dyn RenderBackend) -> Result<()> {
        let Some(source) = &self.source else { return Ok(()) };
        let id = backend.create_program(source).map_err(|err| {
            EngineError::DeviceFatal(format!("recreating program `{}`: {err}", self.path.display()))
        })?;
        self.id = Some(id);
        Ok(())
    }
}

impl Drop for ShaderProgram {
    fn drop(&mut self) {
        if let Some(id) = self.id.take() {
            self.releases.push(ReleasedHandle::Program(id));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::HeadlessBackend;
    use crate::resource::DEFAULT_PROGRAM_WGSL;

    fn loaded(backend: &mut HeadlessBackend) -> ShaderProgram {
        let mut program = ShaderProgram::new(ReleaseQueue::new());
        program
            .load_from_source(backend, "default", DEFAULT_PROGRAM_WGSL, ShaderStage::Unspecified)
            .unwrap();
        program
    }

    #[test]
    fn first_technique_is_active_after_load() {
        let mut backend = HeadlessBackend::new();
        let program = loaded(&mut backend);
        let active = program.active_technique().unwrap();
        assert_eq!(program.technique(active).unwrap().name, "render");
    }

    #[test]
    fn unknown_technique_keeps_the_current_one() {
        let mut backend = HeadlessBackend::new();
        let mut program = loaded(&mut backend);
        assert_eq!(program.set_active_technique("missing"), None);
        assert_eq!(program.active_technique().map(TechniqueHandle::index), Some(0));
        assert!(program.set_active_technique("render").is_some());
    }

    #[test]
    fn compile_errors_report_stage_and_diagnostic() {
        let mut backend = HeadlessBackend::new();
        let mut program = ShaderProgram::new(ReleaseQueue::new());
        let err = program
            .load_from_source(&mut backend, "bad.wgsl", "fn (", ShaderStage::Pixel)
            .unwrap_err();
        match err {
            EngineError::ResourceLoad { path, diagnostic } => {
                assert_eq!(path, PathBuf::from("bad.wgsl"));
                assert!(diagnostic.contains("Pixel"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!program.is_loaded());
    }

    #[test]
    fn program_is_recreated_after_reset() {
        let mut backend = HeadlessBackend::new();
        let mut program = loaded(&mut backend);

        backend.lose_device();
        program.on_device_lost(&mut backend).unwrap();
        backend.reset().unwrap();
        program.on_device_restored(&mut backend).unwrap();

        let id = program.id().unwrap();
        assert_eq!(backend.program_source(id).unwrap().layout.techniques[0].name, "render");
    }
}
