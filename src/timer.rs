use std::time::{Duration, Instant};

/// Quiet-period timer for the detector.
///
/// Holds at most one pending evaluation deadline: arming replaces whatever
/// deadline was outstanding, so cancel-then-reschedule is a single operation
/// and a stale deadline can never fire against state that has moved on.
#[derive(Clone, Copy, Debug, Default)]
pub struct QuietTimer {
    deadline: Option<Instant>,
}

impl QuietTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules the timer to fire `delay` after `now`, replacing any
    /// previously armed deadline.
    pub fn arm(&mut self, now: Instant, delay: Duration) {
        self.deadline = Some(now + delay);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Disarms and reports true when the deadline has been reached.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_disarmed() {
        let mut timer = QuietTimer::new();
        assert!(!timer.is_armed());
        assert!(!timer.fire(Instant::now()));
    }

    #[test]
    fn fires_at_deadline_and_disarms() {
        let mut timer = QuietTimer::new();
        let now = Instant::now();
        timer.arm(now, Duration::from_millis(100));

        assert!(!timer.fire(now + Duration::from_millis(99)));
        assert!(timer.is_armed());

        assert!(timer.fire(now + Duration::from_millis(100)));
        assert!(!timer.is_armed());

        // Already consumed
        assert!(!timer.fire(now + Duration::from_millis(200)));
    }

    #[test]
    fn arming_replaces_prior_deadline() {
        let mut timer = QuietTimer::new();
        let now = Instant::now();
        timer.arm(now, Duration::from_millis(10));
        timer.arm(now, Duration::from_millis(100));

        // The first deadline must not fire
        assert!(!timer.fire(now + Duration::from_millis(50)));
        assert!(timer.fire(now + Duration::from_millis(100)));
    }

    #[test]
    fn cancel_clears_deadline() {
        let mut timer = QuietTimer::new();
        let now = Instant::now();
        timer.arm(now, Duration::from_millis(10));
        timer.cancel();
        assert!(!timer.fire(now + Duration::from_secs(1)));
    }
}
