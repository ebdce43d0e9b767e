//! Engine error taxonomy.
//!
//! Three layers:
//! - [`BackendError`]: what a [`RenderBackend`](crate::gpu::RenderBackend) reports
//! - [`EngineError`]: what construction, load and lifecycle paths surface to callers
//! - [`DrawError`]: per-draw soft failures returned from `render()`; the frame keeps going

use std::path::PathBuf;

use thiserror::Error;

/// Failure reported by a rendering backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("out of device memory")]
    OutOfMemory,

    #[error("unsupported request: {0}")]
    Unsupported(String),

    /// The device is lost. Recoverable through the per-frame cooperation test.
    #[error("device lost")]
    DeviceLost,

    /// The handle does not name a live backend object (stale after a reset, or destroyed).
    #[error("invalid handle")]
    InvalidHandle,

    #[error("invalid call: {0}")]
    InvalidCall(String),

    #[error("{0}")]
    Other(String),
}

pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Error surfaced by engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The backend refused a buffer, texture or render-target allocation.
    #[error("failed to allocate {what}: {source}")]
    Allocation {
        what: String,
        #[source]
        source: BackendError,
    },

    /// File missing or corrupt, or program compilation failed.
    #[error("failed to load resource `{}`: {diagnostic}", path.display())]
    ResourceLoad { path: PathBuf, diagnostic: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Unexpected backend failure while handling device loss or restore.
    #[error("unrecoverable device failure: {0}")]
    DeviceFatal(String),
}

impl EngineError {
    pub(crate) fn allocation(what: impl Into<String>, source: BackendError) -> Self {
        Self::Allocation {
            what: what.into(),
            source,
        }
    }

    pub(crate) fn load(path: impl Into<PathBuf>, diagnostic: impl ToString) -> Self {
        Self::ResourceLoad {
            path: path.into(),
            diagnostic: diagnostic.to_string(),
        }
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    #[inline]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::DeviceFatal(_))
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// Soft failure of a single draw.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DrawError {
    #[error("render object was destroyed")]
    Destroyed,

    #[error("no shader program bound")]
    MissingShader,

    #[error("shader program has no technique `{0}`")]
    MissingTechnique(String),

    /// Device is lost or resetting; the draw was skipped.
    #[error("device lost")]
    DeviceLost,

    #[error("geometry upload failed: {0}")]
    Upload(String),

    #[error(transparent)]
    Backend(BackendError),
}

impl From<BackendError> for DrawError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::DeviceLost => Self::DeviceLost,
            other => Self::Backend(other),
        }
    }
}

impl From<EngineError> for DrawError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Allocation {
                source: BackendError::DeviceLost,
                ..
            } => Self::DeviceLost,
            other => Self::Upload(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_lost_backend_error_maps_to_soft_draw_error() {
        assert_eq!(DrawError::from(BackendError::DeviceLost), DrawError::DeviceLost);
        assert_eq!(
            DrawError::from(BackendError::InvalidHandle),
            DrawError::Backend(BackendError::InvalidHandle)
        );
    }

    #[test]
    fn allocation_during_loss_is_not_an_upload_failure() {
        let err = EngineError::allocation("vertex buffer", BackendError::DeviceLost);
        assert_eq!(DrawError::from(err), DrawError::DeviceLost);
    }

    #[test]
    fn resource_load_message_carries_diagnostic() {
        let err = EngineError::load("tex/a.png", "bad magic");
        let msg = err.to_string();
        assert!(msg.contains("tex/a.png"));
        assert!(msg.contains("bad magic"));
        assert!(!err.is_fatal());
        assert!(EngineError::DeviceFatal("x".into()).is_fatal());
    }
}
