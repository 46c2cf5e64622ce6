//! Tick-counted cadence timers

/// Fires at most once every `interval` ticks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickTimer {
    last: Option<u64>,
}

impl TickTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `now` as the last firing
    pub fn update(&mut self, now: u64) {
        self.last = Some(now);
    }

    /// Whether `interval` ticks have passed since the last firing; a timer
    /// that never fired is always due
    pub fn check(&self, now: u64, interval: u64) -> bool {
        match self.last {
            Some(last) => now.saturating_sub(last) >= interval,
            None => true,
        }
    }

    /// [`check`](Self::check) and, when due, [`update`](Self::update)
    pub fn run(&mut self, now: u64, interval: u64) -> bool {
        if self.check(now, interval) {
            self.update(now);
            true
        } else {
            false
        }
    }

    pub fn reset(&mut self) {
        self.last = None;
    }

    pub fn last(&self) -> Option<u64> {
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cadence() {
        let mut timer = TickTimer::new();
        assert!(timer.run(10, 5));
        assert!(!timer.run(14, 5));
        assert!(timer.run(15, 5));
        assert_eq!(timer.last(), Some(15));

        timer.reset();
        assert!(timer.check(0, 100));
    }
}
