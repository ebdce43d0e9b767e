//! Task list driving per-frame update and render.

mod task;

pub use task::{Scene, Task, TaskId};
