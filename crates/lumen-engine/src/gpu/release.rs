use std::cell::RefCell;
use std::rc::Rc;

use super::backend::{BufferId, ProgramId, RenderBackend, TextureId};

/// Backend handle whose owner went away.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ReleasedHandle {
    Buffer(BufferId),
    Texture(TextureId),
    Program(ProgramId),
}

/// Drop sink for backend handles.
///
/// Resources are shared (`Rc`) and may be dropped anywhere, usually without access to
/// the backend. Their `Drop` impls push handles here; the device destroys them at the
/// next frame start or before a reset. Cloning yields another sender to the same queue.
#[derive(Debug, Clone, Default)]
pub struct ReleaseQueue {
    pending: Rc<RefCell<Vec<ReleasedHandle>>>,
}

impl ReleaseQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, handle: ReleasedHandle) {
        self.pending.borrow_mut().push(handle);
    }

    pub fn len(&self) -> usize {
        self.pending.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.borrow().is_empty()
    }

    /// Destroys every queued handle. Returns how many were processed.
    ///
    /// Stale handles (issued before a reset) are skipped.
    pub fn drain(&self, backend: &mut dyn RenderBackend) -> usize {
        let handles = std::mem::take(&mut *self.pending.borrow_mut());
        for handle in &handles {
            let res = match *handle {
                ReleasedHandle::Buffer(id) => backend.destroy_buffer(id),
                ReleasedHandle::Texture(id) => backend.destroy_texture(id),
                ReleasedHandle::Program(id) => backend.destroy_program(id),
            };
            if let Err(err) = res {
                log::debug!("deferred release of {handle:?} skipped: {err}");
            }
        }
        handles.len()
    }
}
