use std::cell::RefCell;
use std::rc::Rc;

use lumen_engine::config::{AssetRoot, GraphicsConfig};
use lumen_engine::core::Graphics;
use lumen_engine::device::DeviceListener;
use lumen_engine::gpu::{DeviceStatus, FrameStatus, HeadlessBackend, RenderBackend, SharedHeadless};
use lumen_engine::paint::Color;
use lumen_engine::resource::Texture;

fn graphics() -> (Graphics, SharedHeadless) {
    let backend = HeadlessBackend::shared();
    let config = GraphicsConfig {
        asset_root: AssetRoot::new("."),
        ..GraphicsConfig::default()
    };
    let gfx = Graphics::new(Box::new(backend.clone()), config).unwrap();
    (gfx, backend)
}

type Journal = Rc<RefCell<Vec<String>>>;

struct Recorder {
    name: &'static str,
    journal: Journal,
}

impl DeviceListener for Recorder {
    fn on_device_lost(&mut self, _backend: &mut dyn RenderBackend) -> lumen_engine::Result<()> {
        self.journal.borrow_mut().push(format!("{} lost", self.name));
        Ok(())
    }

    fn on_device_restored(&mut self, _backend: &mut dyn RenderBackend) -> lumen_engine::Result<()> {
        self.journal.borrow_mut().push(format!("{} restored", self.name));
        Ok(())
    }
}

#[test]
fn render_target_survives_device_reset() {
    let (mut gfx, backend) = graphics();

    let mut target = Texture::new(gfx.device().release_queue());
    target
        .create_render_target(gfx.device_mut().backend_mut(), "scratch", 4, 4)
        .unwrap();
    let target = Rc::new(RefCell::new(target));
    target
        .borrow_mut()
        .fill(gfx.device_mut().backend_mut(), Color::from_rgba8(10, 20, 30, 255))
        .unwrap();
    gfx.registry()
        .borrow_mut()
        .add("scratch", target.clone())
        .unwrap();
    let before = target
        .borrow()
        .read_pixels(gfx.device_mut().backend_mut())
        .unwrap();
    let old_id = target.borrow().id();

    backend.borrow_mut().lose_device();
    assert!(gfx.device_mut().test_cooperation().unwrap());

    let target = target.borrow();
    assert_ne!(target.id(), old_id);
    assert_eq!(target.read_pixels(gfx.device_mut().backend_mut()).unwrap(), before);
    assert_eq!(&before[..4], &[10, 20, 30, 255]);
}

#[test]
fn target_under_two_keys_is_restored_once() {
    let (mut gfx, backend) = graphics();

    let mut target = Texture::new(gfx.device().release_queue());
    target
        .create_render_target(gfx.device_mut().backend_mut(), "shared", 2, 1)
        .unwrap();
    target
        .write_pixels(gfx.device_mut().backend_mut(), &[1, 2, 3, 4, 5, 6, 7, 8])
        .unwrap();
    let target = Rc::new(RefCell::new(target));
    for key in ["a", "b"] {
        gfx.registry()
            .borrow_mut()
            .add(key, target.clone())
            .unwrap();
    }
    let live_before = backend.borrow().live_textures();

    backend.borrow_mut().lose_device();
    assert!(gfx.device_mut().test_cooperation().unwrap());

    assert_eq!(backend.borrow().live_textures(), live_before);
    assert_eq!(
        target
            .borrow()
            .read_pixels(gfx.device_mut().backend_mut())
            .unwrap(),
        vec![1, 2, 3, 4, 5, 6, 7, 8]
    );
}

#[test]
fn listeners_hear_loss_then_restore_once_in_order() {
    let (mut gfx, backend) = graphics();
    let journal = Journal::default();
    let first = Rc::new(RefCell::new(Recorder {
        name: "first",
        journal: journal.clone(),
    }));
    let second = Rc::new(RefCell::new(Recorder {
        name: "second",
        journal: journal.clone(),
    }));
    gfx.device_mut().register_listener(&first);
    gfx.device_mut().register_listener(&second);

    backend.borrow_mut().lose_device();
    // The backend refuses the frame; the device notices and restores.
    assert_eq!(gfx.begin_frame().unwrap(), FrameStatus::Skipped);
    gfx.end_frame(false).unwrap();
    assert_eq!(gfx.begin_frame().unwrap(), FrameStatus::Ready);
    gfx.end_frame(true).unwrap();

    assert_eq!(
        *journal.borrow(),
        ["first lost", "second lost", "first restored", "second restored"]
    );
    assert_eq!(gfx.device().generation(), 1);
}

#[test]
fn nothing_is_notified_until_the_device_can_be_reset() {
    let (mut gfx, backend) = graphics();
    let journal = Journal::default();
    let listener = Rc::new(RefCell::new(Recorder {
        name: "l",
        journal: journal.clone(),
    }));
    gfx.device_mut().register_listener(&listener);

    backend.borrow_mut().set_status(DeviceStatus::Lost);
    for _ in 0..3 {
        assert_eq!(gfx.begin_frame().unwrap(), FrameStatus::Skipped);
        gfx.end_frame(false).unwrap();
    }
    assert!(journal.borrow().is_empty());
    assert!(!gfx.device().is_active());

    backend.borrow_mut().lose_device();
    assert_eq!(gfx.begin_frame().unwrap(), FrameStatus::Ready);
    assert_eq!(*journal.borrow(), ["l lost", "l restored"]);
}

#[test]
fn failed_reset_is_fatal() {
    let (mut gfx, backend) = graphics();
    backend.borrow_mut().lose_device();
    backend
        .borrow_mut()
        .fail_next_reset(lumen_engine::error::BackendError::Other("driver hung".into()));

    assert!(gfx.begin_frame().unwrap_err().is_fatal());
    assert!(gfx.begin_frame().unwrap_err().is_fatal());
}

#[test]
fn unregistered_listener_is_not_notified() {
    let (mut gfx, backend) = graphics();
    let journal = Journal::default();
    let listener = Rc::new(RefCell::new(Recorder {
        name: "gone",
        journal: journal.clone(),
    }));
    let id = gfx.device_mut().register_listener(&listener);
    assert!(gfx.device_mut().unregister_listener(id));

    backend.borrow_mut().lose_device();
    assert!(gfx.device_mut().test_cooperation().unwrap());
    assert!(journal.borrow().is_empty());
}
