//! Engine configuration.
//!
//! Plain structs with defaults. Nothing here is persisted.

use std::path::{Path, PathBuf};

use crate::paint::Color;

/// Working-directory root every resource path is resolved against.
///
/// Resolved once at startup; relative load paths are joined onto it and absolute
/// paths pass through unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRoot {
    root: PathBuf,
}

impl AssetRoot {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root at the process working directory. Falls back to `.` when it cannot be read.
    pub fn from_current_dir() -> Self {
        match std::env::current_dir() {
            Ok(dir) => Self::new(dir),
            Err(err) => {
                log::warn!("cannot read working directory ({err}); resolving assets against `.`");
                Self::new(".")
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        self.root.join(path)
    }
}

impl Default for AssetRoot {
    fn default() -> Self {
        Self::from_current_dir()
    }
}

/// Process-level graphics settings.
#[derive(Debug, Clone)]
pub struct GraphicsConfig {
    /// Logical screen size; the default viewport and view-projection cover it.
    pub screen_width: u32,
    pub screen_height: u32,
    pub clear_color: Color,
    pub asset_root: AssetRoot,
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            screen_width: 640,
            screen_height: 480,
            clear_color: Color::from_argb(0xff00_0022),
            asset_root: AssetRoot::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_join_the_root() {
        let root = AssetRoot::new("/game");
        assert_eq!(root.resolve("img/a.png"), PathBuf::from("/game/img/a.png"));
    }

    #[cfg(unix)]
    #[test]
    fn absolute_paths_pass_through() {
        let root = AssetRoot::new("/game");
        assert_eq!(root.resolve("/tmp/a.png"), PathBuf::from("/tmp/a.png"));
    }

    #[test]
    fn default_clear_color_is_dark_blue() {
        assert_eq!(GraphicsConfig::default().clear_color.to_rgba8(), [0, 0, 0x22, 0xff]);
    }
}
