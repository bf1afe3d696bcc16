//! Index-pulse scheduler: a free-running two-phase software timer giving
//! a 2ms active-high pulse once per 200ms revolution. The read engine may
//! override the low-phase re-arm to stay synced to the image's internal
//! index mark.

pub const REVOLUTION_TICKS_MS: u32 = 200;
pub const PULSE_TICKS_MS: u32 = 2;
pub const GAP_TICKS_MS: u32 = REVOLUTION_TICKS_MS - PULSE_TICKS_MS;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Phase {
    High,
    Low,
}

/// Re-arms itself from the previous absolute deadline rather than "now",
/// so jitter in the foreground loop's poll rate never accumulates drift.
pub struct Index {
    phase: Phase,
    prev_time: u32,
    deadline: u32,
    pub active: bool,
}

impl Index {
    pub const fn new() -> Self {
        Index {
            phase: Phase::Low,
            prev_time: 0,
            deadline: 0,
            active: false,
        }
    }

    pub fn start(&mut self, now_ms: u32) {
        self.prev_time = now_ms;
        self.phase = Phase::Low;
        self.active = false;
        self.deadline = now_ms.wrapping_add(GAP_TICKS_MS);
    }

    pub fn prev_time(&self) -> u32 {
        self.prev_time
    }

    /// Called from the timer update ISR when `now_ms` has reached
    /// `deadline`; flips phase and re-arms. Returns the new pin level.
    pub fn on_deadline(&mut self, now_ms: u32) -> bool {
        match self.phase {
            Phase::Low => {
                self.phase = Phase::High;
                self.active = true;
                self.prev_time = now_ms;
                self.deadline = self.prev_time.wrapping_add(PULSE_TICKS_MS);
            }
            Phase::High => {
                self.phase = Phase::Low;
                self.active = false;
                self.deadline = self.prev_time.wrapping_add(REVOLUTION_TICKS_MS);
            }
        }
        self.active
    }

    pub fn deadline(&self) -> u32 {
        self.deadline
    }

    /// Override the low-phase re-arm with a deadline computed from the
    /// read engine's live bitstream, used while the read engine is Active
    /// to keep the virtual index synced to the image's own index mark.
    pub fn resync(&mut self, index_time: u32) {
        self.prev_time = index_time;
        if self.phase == Phase::Low {
            self.deadline = index_time.wrapping_add(REVOLUTION_TICKS_MS);
        }
    }

    pub fn has_fired(&self, now_ms: u32) -> bool {
        (now_ms.wrapping_sub(self.deadline) as i32) >= 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duty_cycle_is_2ms_per_200ms() {
        let mut idx = Index::new();
        idx.start(0);
        // low -> high
        assert!(idx.on_deadline(GAP_TICKS_MS));
        assert_eq!(idx.deadline(), GAP_TICKS_MS + PULSE_TICKS_MS);
        // high -> low
        assert!(!idx.on_deadline(GAP_TICKS_MS + PULSE_TICKS_MS));
        assert_eq!(idx.deadline(), GAP_TICKS_MS + PULSE_TICKS_MS + GAP_TICKS_MS);
    }

    #[test]
    fn five_pulses_in_one_second_window() {
        let mut idx = Index::new();
        idx.start(0);
        let mut high_ticks = 0u32;
        let mut phase_start = 0u32;
        for _ in 0..10 {
            let deadline = idx.deadline();
            let was_active = idx.active;
            idx.on_deadline(deadline);
            if was_active {
                high_ticks += deadline - phase_start;
            }
            phase_start = deadline;
        }
        assert_eq!(high_ticks, 5 * PULSE_TICKS_MS);
    }

    #[test]
    fn resync_rearms_low_phase_from_index_time() {
        let mut idx = Index::new();
        idx.start(0);
        idx.resync(150);
        assert_eq!(idx.deadline(), 150 + REVOLUTION_TICKS_MS);
    }
}
