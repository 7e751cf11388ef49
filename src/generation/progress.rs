// Progress bookkeeping for the simulated generation wait

/// Progress is counted in hundredths of a percent so fractional steps
/// (0.5 % by default) accumulate exactly.
const FULL: u32 = 10_000;

/// Snapshot published to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgressState {
    pub percent_complete: u8,
    pub is_complete: bool,
}

/// Monotonic percentage counter that freezes once completed.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    step: u32,
    filled: u32,
    complete: bool,
}

impl ProgressTracker {
    /// `step_percent` is the amount added per tick, e.g. `0.5`.
    pub fn new(step_percent: f64) -> Self {
        let step = if step_percent.is_finite() {
            (step_percent * 100.0).round().clamp(0.0, FULL as f64) as u32
        } else {
            0
        };
        Self {
            step,
            filled: 0,
            complete: false,
        }
    }

    /// Advance by one step. Has no effect after completion.
    pub fn tick(&mut self) {
        if self.complete {
            return;
        }
        self.filled = (self.filled + self.step).min(FULL);
    }

    /// Mark the wait finished. The bar is shown full from here on.
    /// Returns `false` if it was already complete.
    pub fn complete(&mut self) -> bool {
        if self.complete {
            return false;
        }
        self.complete = true;
        self.filled = FULL;
        true
    }

    pub fn percent(&self) -> u8 {
        (self.filled / 100) as u8
    }

    /// Fill fraction in `[0, 1]` for drawing a ring or bar.
    pub fn fraction(&self) -> f64 {
        self.filled as f64 / FULL as f64
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn snapshot(&self) -> ProgressState {
        ProgressState {
            percent_complete: self.percent(),
            is_complete: self.complete,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_is_min_of_hundred_and_ticks_times_step() {
        let mut tracker = ProgressTracker::new(0.5);
        let mut last = 0;
        for n in 1..=250u32 {
            tracker.tick();
            let expected = (n * 50 / 100).min(100) as u8;
            assert_eq!(tracker.percent(), expected, "after {} ticks", n);
            assert!(tracker.percent() >= last);
            last = tracker.percent();
        }
        assert_eq!(tracker.percent(), 100);
    }

    #[test]
    fn whole_percent_steps() {
        let mut tracker = ProgressTracker::new(3.0);
        for _ in 0..10 {
            tracker.tick();
        }
        assert_eq!(tracker.percent(), 30);
        assert!((tracker.fraction() - 0.3).abs() < 1e-9);
    }

    #[test]
    fn completion_fills_and_freezes() {
        let mut tracker = ProgressTracker::new(0.5);
        for _ in 0..166 {
            tracker.tick();
        }
        assert_eq!(tracker.percent(), 83);

        assert!(tracker.complete());
        assert_eq!(tracker.percent(), 100);
        assert!(!tracker.complete());

        tracker.tick();
        assert_eq!(
            tracker.snapshot(),
            ProgressState {
                percent_complete: 100,
                is_complete: true
            }
        );
    }

    #[test]
    fn nonsense_step_never_advances() {
        let mut tracker = ProgressTracker::new(f64::NAN);
        tracker.tick();
        assert_eq!(tracker.percent(), 0);

        let mut tracker = ProgressTracker::new(-2.0);
        tracker.tick();
        assert_eq!(tracker.percent(), 0);
    }
}
