//! Logger bootstrap.
//!
//! The library logs through the `log` facade only; `env_logger` is installed once by
//! the binary (or the windowing runtime) through [`init_logging`].

mod init;

pub use init::{init_logging, LoggingConfig, DEFAULT_FILTER};
