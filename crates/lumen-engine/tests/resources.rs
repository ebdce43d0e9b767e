use std::path::Path;
use std::rc::Rc;

use lumen_engine::EngineError;
use lumen_engine::config::{AssetRoot, GraphicsConfig};
use lumen_engine::core::Graphics;
use lumen_engine::gpu::{HeadlessBackend, SharedHeadless};
use lumen_engine::resource::{
    DEFAULT_PROGRAM_WGSL, DEFAULT_SHADER_KEY, EMPTY_TEXTURE_KEY, ShaderProgram, Texture,
};

fn graphics(root: &Path) -> (Graphics, SharedHeadless) {
    let backend = HeadlessBackend::shared();
    let config = GraphicsConfig {
        asset_root: AssetRoot::new(root),
        ..GraphicsConfig::default()
    };
    let gfx = Graphics::new(Box::new(backend.clone()), config).unwrap();
    (gfx, backend)
}

fn write_png(dir: &Path, name: &str, w: u32, h: u32) {
    image::RgbaImage::from_pixel(w, h, image::Rgba([200, 100, 50, 255]))
        .save(dir.join(name))
        .unwrap();
}

#[test]
fn same_key_loads_once_and_returns_the_same_object() {
    let dir = tempfile::tempdir().unwrap();
    write_png(dir.path(), "hero.png", 8, 4);
    let (mut gfx, backend) = graphics(dir.path());
    let textures_before = backend.borrow().live_textures();

    let a = gfx.load_texture("hero.png", "hero").unwrap();
    let b = gfx.load_texture("hero.png", "hero").unwrap();

    assert!(Rc::ptr_eq(&a, &b));
    assert_eq!(backend.borrow().live_textures(), textures_before + 1);
    assert_eq!((a.borrow().width(), a.borrow().height()), (8, 4));
}

#[test]
fn programs_load_from_the_asset_root() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("tint.wgsl"), DEFAULT_PROGRAM_WGSL).unwrap();
    let (mut gfx, _backend) = graphics(dir.path());

    let program = gfx.load_program("tint.wgsl", "tint").unwrap();
    let again = gfx.load_program("tint.wgsl", "tint").unwrap();
    assert!(Rc::ptr_eq(&program, &again));
    assert!(program.borrow().active_technique().is_some());
}

#[test]
fn missing_file_is_a_load_error_and_leaves_no_entry() {
    let dir = tempfile::tempdir().unwrap();
    let (mut gfx, _backend) = graphics(dir.path());

    let err = gfx.load_texture("nope.png", "nope").unwrap_err();
    assert!(matches!(err, EngineError::ResourceLoad { .. }), "{err}");
    assert!(!gfx.registry().borrow().contains("nope"));
}

#[test]
fn broken_program_is_a_load_error() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("bad.wgsl"), "fn vs_render( {").unwrap();
    let (mut gfx, _backend) = graphics(dir.path());

    let err = gfx.load_program("bad.wgsl", "bad").unwrap_err();
    assert!(matches!(err, EngineError::ResourceLoad { .. }), "{err}");
}

#[test]
fn key_holding_another_kind_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    write_png(dir.path(), "a.png", 1, 1);
    let (mut gfx, _backend) = graphics(dir.path());

    gfx.load_texture("a.png", "shared").unwrap();
    let err = gfx.load_program("a.png", "shared").unwrap_err();
    assert!(matches!(err, EngineError::InvalidArgument(_)), "{err}");
}

#[test]
fn reserved_keys_cannot_be_loaded_into() {
    let dir = tempfile::tempdir().unwrap();
    write_png(dir.path(), "a.png", 1, 1);
    let (mut gfx, _backend) = graphics(dir.path());

    let err = gfx.load_texture("a.png", EMPTY_TEXTURE_KEY).unwrap_err();
    assert!(matches!(err, EngineError::InvalidArgument(_)), "{err}");
}

#[test]
fn unset_texture_and_shader_fall_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let (gfx, _backend) = graphics(dir.path());

    let mut sprite = gfx.new_sprite();
    let defaults = gfx.defaults();
    sprite.object_mut().set_texture(None);
    sprite.object_mut().set_shader(None);

    assert!(Rc::ptr_eq(sprite.object().texture(), &defaults.texture));
    assert!(Rc::ptr_eq(sprite.object().shader(), &defaults.program));

    let registry = gfx.registry().borrow();
    let empty = registry.get_as::<Texture>(EMPTY_TEXTURE_KEY).unwrap().unwrap();
    let shader = registry
        .get_as::<ShaderProgram>(DEFAULT_SHADER_KEY)
        .unwrap()
        .unwrap();
    assert!(Rc::ptr_eq(&empty, &defaults.texture));
    assert!(Rc::ptr_eq(&shader, &defaults.program));
    assert_eq!((empty.borrow().width(), empty.borrow().height()), (1, 1));
}

#[test]
fn replaced_entry_stays_usable_by_its_holders() {
    let dir = tempfile::tempdir().unwrap();
    write_png(dir.path(), "a.png", 2, 2);
    write_png(dir.path(), "b.png", 4, 4);
    let (mut gfx, backend) = graphics(dir.path());

    let old = gfx.load_texture("a.png", "tex").unwrap();
    let mut replacement = Texture::new(gfx.device().release_queue());
    replacement
        .load_from_file(gfx.device_mut().backend_mut(), dir.path().join("b.png"), false)
        .unwrap();
    gfx.registry()
        .borrow_mut()
        .add("tex", Rc::new(std::cell::RefCell::new(replacement)))
        .unwrap();

    assert!(old.borrow().is_loaded());
    let live = backend.borrow().live_textures();
    drop(old);
    gfx.device_mut().collect_released();
    assert_eq!(backend.borrow().live_textures(), live - 1);
}
