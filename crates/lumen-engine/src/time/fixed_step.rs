use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Snapshot handed to each fixed update.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct StepTime {
    /// Fixed step length, in seconds.
    pub dt: f32,

    /// Monotonic step counter, starting at 0.
    pub step_index: u64,
}

/// Fixed-step accumulator clock.
///
/// Elapsed wall time is accumulated and converted into whole steps of a fixed length;
/// the remainder carries over to the next tick. Step count and spacing are
/// deterministic, so under load the simulation lags wall time rather than skipping.
/// After a stall every missed step is still delivered on the next tick.
#[derive(Debug, Clone)]
pub struct FixedStepClock {
    step: Duration,
    last: Instant,
    accumulator: Duration,
    step_index: u64,

    fps_window: Duration,
    fps_elapsed: Duration,
    fps_steps: u32,
    fps_history: VecDeque<f32>,
}

impl FixedStepClock {
    /// FPS sampling interval.
    pub const FPS_WINDOW: Duration = Duration::from_millis(500);

    /// Number of FPS samples kept for [`FixedStepClock::average_fps`].
    pub const FPS_HISTORY: usize = 64;

    /// Creates a clock running `steps_per_second` steps (clamped to at least 1).
    pub fn new(steps_per_second: u32) -> Self {
        let step = Duration::from_secs_f64(1.0 / f64::from(steps_per_second.max(1)));
        Self {
            step,
            last: Instant::now(),
            accumulator: Duration::ZERO,
            step_index: 0,
            fps_window: Self::FPS_WINDOW,
            fps_elapsed: Duration::ZERO,
            fps_steps: 0,
            fps_history: VecDeque::with_capacity(Self::FPS_HISTORY),
        }
    }

    #[inline]
    pub fn step_duration(&self) -> Duration {
        self.step
    }

    /// Resets the baseline without touching counters.
    ///
    /// Useful after resuming from suspension.
    pub fn reset(&mut self) {
        self.last = Instant::now();
        self.accumulator = Duration::ZERO;
        self.fps_elapsed = Duration::ZERO;
        self.fps_steps = 0;
    }

    /// Measures wall time since the previous tick and returns how many steps are due.
    pub fn tick(&mut self) -> u32 {
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(self.last);
        self.last = now;
        self.advance(elapsed)
    }

    /// Feeds `elapsed` into the accumulator and returns how many steps are due.
    ///
    /// Call [`FixedStepClock::next_step`] once per returned step.
    pub fn advance(&mut self, elapsed: Duration) -> u32 {
        self.accumulator += elapsed;

        let mut due = 0;
        while self.accumulator >= self.step {
            self.accumulator -= self.step;
            due += 1;
        }

        self.sample_fps(elapsed, due);
        due
    }

    /// Consumes one step and returns its timing.
    pub fn next_step(&mut self) -> StepTime {
        let time = StepTime {
            dt: self.step.as_secs_f32(),
            step_index: self.step_index,
        };
        self.step_index = self.step_index.wrapping_add(1);
        time
    }

    /// Steps consumed so far.
    #[inline]
    pub fn step_index(&self) -> u64 {
        self.step_index
    }

    /// Latest FPS sample, or 0 before the first window completes.
    pub fn fps(&self) -> f32 {
        self.fps_history.back().copied().unwrap_or(0.0)
    }

    /// Mean of the retained FPS samples.
    pub fn average_fps(&self) -> f32 {
        if self.fps_history.is_empty() {
            return 0.0;
        }
        self.fps_history.iter().sum::<f32>() / self.fps_history.len() as f32
    }

    fn sample_fps(&mut self, elapsed: Duration, steps: u32) {
        self.fps_elapsed += elapsed;
        self.fps_steps += steps;
        if self.fps_elapsed < self.fps_window {
            return;
        }

        let fps = self.fps_steps as f32 / self.fps_elapsed.as_secs_f32();
        if self.fps_history.len() == Self::FPS_HISTORY {
            self.fps_history.pop_front();
        }
        self.fps_history.push_back(fps);
        log::trace!("fps {fps:.2}");

        self.fps_elapsed = Duration::ZERO;
        self.fps_steps = 0;
    }
}

impl Default for FixedStepClock {
    fn default() -> Self {
        Self::new(60)
    }
}
