use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::error::{EngineError, Result};
use crate::gpu::RenderBackend;

/// Component owning GPU state that does not survive a device reset.
///
/// Hooks run in registration order. An error from either hook is treated as an
/// unrecoverable device failure.
pub trait DeviceListener {
    /// Release every backend handle. The device is about to be reset.
    fn on_device_lost(&mut self, backend: &mut dyn RenderBackend) -> Result<()>;

    /// Recreate what was released in [`DeviceListener::on_device_lost`].
    fn on_device_restored(&mut self, backend: &mut dyn RenderBackend) -> Result<()>;
}

/// Registration handle returned by [`ListenerTable::register`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct ListenerId(u64);

struct ListenerEntry {
    id: ListenerId,
    listener: Weak<RefCell<dyn DeviceListener>>,
}

/// Ordered, non-owning listener list.
///
/// Listeners are held weakly. Owners are expected to [`ListenerTable::unregister`]
/// before dropping a listener; an entry whose listener died anyway is pruned with
/// a warning instead of being dereferenced.
#[derive(Default)]
pub struct ListenerTable {
    entries: Vec<ListenerEntry>,
    next_id: u64,
}

#[derive(Copy, Clone)]
enum Event {
    Lost,
    Restored,
}

impl ListenerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a listener. Registering the same listener again returns its existing id.
    pub fn register<L>(&mut self, listener: &Rc<RefCell<L>>) -> ListenerId
    where
        L: DeviceListener + 'static,
    {
        let listener: Rc<RefCell<dyn DeviceListener>> = listener.clone();
        let weak = Rc::downgrade(&listener);

        if let Some(existing) = self
            .entries
            .iter()
            .find(|e| std::ptr::addr_eq(e.listener.as_ptr(), weak.as_ptr()))
        {
            return existing.id;
        }

        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.entries.push(ListenerEntry {
            id,
            listener: weak,
        });
        id
    }

    /// Removes a listener. Returns `false` if the id was not registered.
    pub fn unregister(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        self.entries.len() != before
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn notify_lost(&mut self, backend: &mut dyn RenderBackend) -> Result<()> {
        self.dispatch(backend, Event::Lost)
    }

    pub fn notify_restored(&mut self, backend: &mut dyn RenderBackend) -> Result<()> {
        self.dispatch(backend, Event::Restored)
    }

    fn dispatch(&mut self, backend: &mut dyn RenderBackend, event: Event) -> Result<()> {
        self.prune_dead();

        // Upgrade everything first so a listener that unregisters another mid-dispatch
        // does not shift the iteration.
        let live: Vec<(ListenerId, Rc<RefCell<dyn DeviceListener>>)> = self
            .entries
            .iter()
            .filter_map(|e| e.listener.upgrade().map(|l| (e.id, l)))
            .collect();

        for (id, listener) in live {
            let mut listener = listener.try_borrow_mut().map_err(|_| {
                EngineError::DeviceFatal(format!(
                    "device listener {id:?} is borrowed during lifecycle dispatch"
                ))
            })?;
            match event {
                Event::Lost => listener.on_device_lost(backend)?,
                Event::Restored => listener.on_device_restored(backend)?,
            }
        }
        Ok(())
    }

    fn prune_dead(&mut self) {
        self.entries.retain(|e| {
            let alive = e.listener.strong_count() > 0;
            if !alive {
                log::warn!(
                    "device listener {:?} was dropped without unregistering; pruning it",
                    e.id
                );
            }
            alive
        });
    }
}
