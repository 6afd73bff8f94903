//! Time system for the strand runtime
//!
//! Tracks the frame clock that drives per-frame systems and the per-system
//! accumulators that drive fixed-timestep systems.

use std::time::{Duration, Instant};

/// Errors that can occur when configuring timesteps
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimeError {
    #[error("fixed time step must be greater than zero")]
    ZeroStep,
}

/// Frame clock
///
/// Advanced once per update, either from the wall clock ([`Time::update`]) or
/// by an explicit amount ([`Time::update_with_delta`]).
#[derive(Debug, Clone)]
pub struct Time {
    /// Instant of the last wall-clock update
    last_instant: Instant,
    /// Time between the last two updates
    delta: Duration,
    /// Sum of every delta since the clock was created
    elapsed: Duration,
    /// Number of updates so far
    frame_count: u64,
}

impl Default for Time {
    fn default() -> Self {
        Self::new()
    }
}

impl Time {
    /// Create a clock starting now
    pub fn new() -> Self {
        Self {
            last_instant: Instant::now(),
            delta: Duration::ZERO,
            elapsed: Duration::ZERO,
            frame_count: 0,
        }
    }

    /// Advance the clock by the wall-clock time since the previous update
    pub fn update(&mut self) {
        let now = Instant::now();
        let delta = now.saturating_duration_since(self.last_instant);
        self.last_instant = now;
        self.advance(delta);
    }

    /// Advance the clock by exactly `delta`
    pub fn update_with_delta(&mut self, delta: Duration) {
        self.last_instant = Instant::now();
        self.advance(delta);
    }

    fn advance(&mut self, delta: Duration) {
        self.delta = delta;
        self.elapsed += delta;
        self.frame_count += 1;
    }

    /// Time between the last two updates
    pub fn delta(&self) -> Duration {
        self.delta
    }

    /// Total time simulated since the clock was created
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Number of updates so far
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

/// Accumulator for a system that runs at a constant logical rate.
///
/// Each update adds the elapsed frame time; the owner then calls
/// [`FixedTimestep::consume`] until it returns `false`, running one step
/// per successful call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedTimestep {
    step: Duration,
    accumulated: Duration,
}

impl FixedTimestep {
    /// Create an accumulator for the given step, starting empty
    pub fn new(step: Duration) -> Result<Self, TimeError> {
        if step.is_zero() {
            return Err(TimeError::ZeroStep);
        }
        Ok(Self {
            step,
            accumulated: Duration::ZERO,
        })
    }

    /// The logical time covered by one step
    pub fn step(&self) -> Duration {
        self.step
    }

    /// Time that has been accumulated but not simulated yet
    pub fn accumulated(&self) -> Duration {
        self.accumulated
    }

    /// Add frame time to the accumulator
    pub fn accumulate(&mut self, delta: Duration) {
        self.accumulated += delta;
    }

    /// Take one step out of the accumulator if a whole step is available
    pub fn consume(&mut self) -> bool {
        if self.accumulated >= self.step {
            self.accumulated -= self.step;
            true
        } else {
            false
        }
    }

    /// Fraction of a step left in the accumulator, for interpolation
    pub fn overstep_fraction(&self) -> f64 {
        self.accumulated.as_secs_f64() / self.step.as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_with_delta() {
        let mut time = Time::new();
        time.update_with_delta(Duration::from_millis(16));
        time.update_with_delta(Duration::from_millis(4));

        assert_eq!(time.delta(), Duration::from_millis(4));
        assert_eq!(time.elapsed(), Duration::from_millis(20));
        assert_eq!(time.frame_count(), 2);
    }

    #[test]
    fn test_wall_clock_elapsed_is_sum_of_deltas() {
        let mut time = Time::new();
        let mut total = Duration::ZERO;
        for _ in 0..3 {
            std::thread::sleep(Duration::from_millis(1));
            time.update();
            total += time.delta();
        }
        assert_eq!(time.elapsed(), total);
        assert!(time.elapsed() >= Duration::from_millis(3));
    }

    #[test]
    fn test_fixed_steps() {
        let mut fixed = FixedTimestep::new(Duration::from_millis(2)).unwrap();
        fixed.accumulate(Duration::from_millis(5));

        let mut steps = 0;
        while fixed.consume() {
            steps += 1;
        }
        assert_eq!(steps, 2);
        assert_eq!(fixed.accumulated(), Duration::from_millis(1));
        assert!((fixed.overstep_fraction() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_zero_step_rejected() {
        assert_eq!(FixedTimestep::new(Duration::ZERO), Err(TimeError::ZeroStep));
    }
}
