//! Sleep-based render frame rate cap.

use std::thread;
use std::time::{Duration, Instant};

/// Caps a loop to a target frame rate and measures frame deltas
#[derive(Debug)]
pub struct FrameLimiter {
    frame_budget: Duration,
    last_frame: Instant,
    delta: Duration,
}

impl FrameLimiter {
    /// Limiter for `target_fps`, or uncapped when it is 0
    #[must_use]
    pub fn new(target_fps: u32) -> Self {
        let frame_budget = if target_fps == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs(1) / target_fps
        };
        Self {
            frame_budget,
            last_frame: Instant::now(),
            delta: Duration::ZERO,
        }
    }

    #[must_use]
    pub const fn frame_budget(&self) -> Duration {
        self.frame_budget
    }

    /// Time left in the frame budget after `work` has been spent
    #[must_use]
    pub fn sleep_duration(frame_budget: Duration, work: Duration) -> Duration {
        frame_budget.saturating_sub(work)
    }

    /// Sleep out the rest of the frame and return the full frame delta in seconds
    pub fn wait(&mut self) -> f32 {
        let sleep = Self::sleep_duration(self.frame_budget, self.last_frame.elapsed());
        if !sleep.is_zero() {
            thread::sleep(sleep);
        }
        let now = Instant::now();
        self.delta = now - self.last_frame;
        self.last_frame = now;
        self.delta.as_secs_f32()
    }

    /// Last measured frame delta in seconds
    #[must_use]
    pub fn delta_seconds(&self) -> f32 {
        self.delta.as_secs_f32()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_budget() {
        assert_eq!(FrameLimiter::new(50).frame_budget(), Duration::from_millis(20));
        assert_eq!(FrameLimiter::new(0).frame_budget(), Duration::ZERO);
    }

    #[test]
    fn test_sleep_duration() {
        let budget = Duration::from_millis(16);
        assert_eq!(FrameLimiter::sleep_duration(budget, Duration::from_millis(6)), Duration::from_millis(10));
        assert_eq!(FrameLimiter::sleep_duration(budget, Duration::from_millis(30)), Duration::ZERO);
    }

    #[test]
    fn test_wait_holds_the_budget() {
        let mut limiter = FrameLimiter::new(100);
        let delta = limiter.wait();
        assert!(delta >= 0.009);
        assert!((limiter.delta_seconds() - delta).abs() < f32::EPSILON);
    }
}
