//! Time subsystem.
//!
//! Fixed-step timing, decoupled from the runtime so it can be driven in tests:
//! - call `tick()` once per loop iteration to learn how many steps are due
//! - call `next_step()` once per step to obtain its `StepTime`

mod fixed_step;

pub use fixed_step::{FixedStepClock, StepTime};
