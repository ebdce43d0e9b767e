use crate::core::Graphics;
use crate::device::Device;
use crate::error::{DrawError, Result};

/// A unit of per-frame work owned by a [`Scene`].
///
/// `update` runs at most once per step, before `render`.
pub trait Task {
    fn update(&mut self, gfx: &mut Graphics) -> Result<()>;

    fn render(&mut self, device: &mut Device) -> std::result::Result<(), DrawError> {
        let _ = device;
        Ok(())
    }
}

/// Stable reference to a task inside its scene.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

struct TaskSlot {
    id: TaskId,
    task: Box<dyn Task>,
    /// Updates run so far.
    frame: u64,
    frame_end: u64,
    finished: bool,
    draw_failures: u32,
}

/// Ordered task list.
///
/// Each update runs every unfinished task, advances its frame counter and marks it
/// finished once the counter reaches its end frame. Finished tasks are not rendered
/// and are dropped on the following update.
#[derive(Default)]
pub struct Scene {
    tasks: Vec<TaskSlot>,
    frame: u64,
    next_id: u64,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Updates run so far.
    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    #[inline]
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Appends a task. It runs until its end frame, unbounded by default.
    pub fn add_task(&mut self, task: impl Task + 'static) -> TaskId {
        self.insert_task(self.tasks.len(), task)
    }

    /// Inserts a task before position `index` (clamped to the list length).
    pub fn insert_task(&mut self, index: usize, task: impl Task + 'static) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        let slot = TaskSlot {
            id,
            task: Box::new(task),
            frame: 0,
            frame_end: u64::MAX,
            finished: false,
            draw_failures: 0,
        };
        self.tasks.insert(index.min(self.tasks.len()), slot);
        id
    }

    /// Position of a task in update and render order.
    pub fn position(&self, id: TaskId) -> Option<usize> {
        self.tasks.iter().position(|slot| slot.id == id)
    }

    fn slot(&self, id: TaskId) -> Option<&TaskSlot> {
        self.tasks.iter().find(|slot| slot.id == id)
    }

    /// Returns `false` if the task is gone.
    pub fn set_end_frame(&mut self, id: TaskId, frame_end: u64) -> bool {
        match self.tasks.iter_mut().find(|slot| slot.id == id) {
            Some(slot) => {
                slot.frame_end = frame_end;
                true
            }
            None => false,
        }
    }

    pub fn task_frame(&self, id: TaskId) -> Option<u64> {
        self.slot(id).map(|slot| slot.frame)
    }

    /// `None` once the task was dropped from the list.
    pub fn is_finished(&self, id: TaskId) -> Option<bool> {
        self.slot(id).map(|slot| slot.finished)
    }

    /// Runs one step.
    ///
    /// A task whose update fails is finished; the error is logged unless it is
    /// [`EngineError::DeviceFatal`](crate::error::EngineError::DeviceFatal), which is
    /// returned immediately.
    pub fn update(&mut self, gfx: &mut Graphics) -> Result<()> {
        self.tasks.retain(|slot| !slot.finished);

        for slot in &mut self.tasks {
            if let Err(err) = slot.task.update(gfx) {
                if err.is_fatal() {
                    return Err(err);
                }
                log::warn!("task {:?} failed and was finished: {err}", slot.id);
                slot.finished = true;
                continue;
            }
            slot.frame += 1;
            if slot.frame >= slot.frame_end {
                slot.finished = true;
            }
        }

        self.frame += 1;
        Ok(())
    }

    /// Renders every unfinished task in order. Returns how many draws failed.
    pub fn render(&mut self, device: &mut Device) -> usize {
        let mut failed = 0;
        for slot in self.tasks.iter_mut().filter(|slot| !slot.finished) {
            if let Err(err) = slot.task.render(device) {
                failed += 1;
                slot.draw_failures += 1;
                if slot.draw_failures == 1 {
                    log::warn!("task {:?} draw failed: {err}", slot.id);
                } else {
                    log::debug!("task {:?} draw failed: {err}", slot.id);
                }
            }
        }
        failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    use crate::config::{AssetRoot, GraphicsConfig};
    use crate::error::EngineError;
    use crate::gpu::HeadlessBackend;

    type Log = Rc<RefCell<Vec<String>>>;

    struct Probe {
        name: &'static str,
        log: Log,
        fail_update: Option<fn() -> EngineError>,
        fail_render: bool,
    }

    impl Probe {
        fn new(name: &'static str, log: &Log) -> Self {
            Self {
                name,
                log: log.clone(),
                fail_update: None,
                fail_render: false,
            }
        }
    }

    impl Task for Probe {
        fn update(&mut self, _gfx: &mut Graphics) -> Result<()> {
            self.log.borrow_mut().push(format!("update {}", self.name));
            match self.fail_update {
                Some(make) => Err(make()),
                None => Ok(()),
            }
        }

        fn render(&mut self, _device: &mut Device) -> std::result::Result<(), DrawError> {
            self.log.borrow_mut().push(format!("render {}", self.name));
            if self.fail_render {
                return Err(DrawError::MissingShader);
            }
            Ok(())
        }
    }

    fn graphics() -> Graphics {
        let config = GraphicsConfig {
            asset_root: AssetRoot::new("."),
            ..GraphicsConfig::default()
        };
        Graphics::new(Box::new(HeadlessBackend::new()), config).unwrap()
    }

    #[test]
    fn tasks_run_in_list_order() {
        let mut gfx = graphics();
        let log = Log::default();
        let mut scene = Scene::new();
        scene.add_task(Probe::new("b", &log));
        scene.insert_task(0, Probe::new("a", &log));
        scene.insert_task(99, Probe::new("c", &log));

        scene.update(&mut gfx).unwrap();
        scene.render(gfx.device_mut());
        assert_eq!(
            *log.borrow(),
            ["update a", "update b", "update c", "render a", "render b", "render c"]
        );
        assert_eq!(scene.frame(), 1);
    }

    #[test]
    fn finished_tasks_stop_rendering_and_leave_next_update() {
        let mut gfx = graphics();
        let log = Log::default();
        let mut scene = Scene::new();
        let id = scene.add_task(Probe::new("t", &log));
        scene.set_end_frame(id, 2);

        scene.update(&mut gfx).unwrap();
        assert_eq!(scene.is_finished(id), Some(false));
        scene.update(&mut gfx).unwrap();
        assert_eq!(scene.task_frame(id), Some(2));
        assert_eq!(scene.is_finished(id), Some(true));

        log.borrow_mut().clear();
        scene.render(gfx.device_mut());
        assert!(log.borrow().is_empty());

        scene.update(&mut gfx).unwrap();
        assert_eq!(scene.task_count(), 0);
        assert_eq!(scene.is_finished(id), None);
        assert_eq!(scene.frame(), 3);
    }

    #[test]
    fn failing_update_finishes_only_that_task() {
        let mut gfx = graphics();
        let log = Log::default();
        let mut scene = Scene::new();
        let mut bad = Probe::new("bad", &log);
        bad.fail_update = Some(|| EngineError::InvalidArgument("boom".into()));
        let bad = scene.add_task(bad);
        let good = scene.add_task(Probe::new("good", &log));

        scene.update(&mut gfx).unwrap();
        assert_eq!(scene.is_finished(bad), Some(true));
        assert_eq!(scene.is_finished(good), Some(false));
    }

    #[test]
    fn fatal_update_is_returned() {
        let mut gfx = graphics();
        let log = Log::default();
        let mut scene = Scene::new();
        let mut fatal = Probe::new("fatal", &log);
        fatal.fail_update = Some(|| EngineError::DeviceFatal("gone".into()));
        scene.add_task(fatal);
        assert!(scene.update(&mut gfx).unwrap_err().is_fatal());
    }

    #[test]
    fn draw_failures_are_counted_not_propagated() {
        let mut gfx = graphics();
        let log = Log::default();
        let mut scene = Scene::new();
        let mut broken = Probe::new("broken", &log);
        broken.fail_render = true;
        scene.add_task(broken);
        scene.add_task(Probe::new("fine", &log));

        assert_eq!(scene.render(gfx.device_mut()), 1);
        assert_eq!(log.borrow().last().map(String::as_str), Some("render fine"));
    }
}
