//! Head-stepping state machine and drive-status output multiplexer.
//!
//! Two-tier: a high-priority EXTI ISR records the raw step pulse and
//! direction; a low-priority soft-IRQ work item does the debounce-then-
//! settle state walk; a timer completes the Latched/Settling phases.

use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

pub const SETTLE_MS: u32 = 12;
const LATCH_MS: u32 = 2;

/// Convert a millisecond duration into system-clock ticks, the unit
/// `start_time`/`Clock::now()` are expressed in.
fn ms_to_ticks(ms: u32, sysclk_hz: u32) -> u32 {
    ms.wrapping_mul(sysclk_hz / 1_000)
}

#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StepState {
    Idle = 0,
    Started = 1,
    Latched = 2,
    Settling = 3,
}

impl StepState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => StepState::Idle,
            1 => StepState::Started,
            2 => StepState::Latched,
            _ => StepState::Settling,
        }
    }
}

pub struct Step {
    state: AtomicU8,
    start_time: AtomicU32,
    direction_outward: AtomicBool,
    pub cyl: u8,
    pub trk0: bool,
}

impl Step {
    pub const fn new() -> Self {
        Step {
            state: AtomicU8::new(StepState::Idle as u8),
            start_time: AtomicU32::new(0),
            direction_outward: AtomicBool::new(false),
            cyl: 0,
            trk0: true,
        }
    }

    pub fn state(&self) -> StepState {
        StepState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// High-priority EXTI handler: records the pulse and latches
    /// direction. Always legal, regardless of current state.
    pub fn on_step_pulse(&self, now: u32, outward: bool) {
        self.start_time.store(now, Ordering::Release);
        self.direction_outward.store(outward, Ordering::Release);
        self.state.store(StepState::Started as u8, Ordering::Release);
    }

    pub fn start_time(&self) -> u32 {
        self.start_time.load(Ordering::Acquire)
    }

    pub fn direction_outward(&self) -> bool {
        self.direction_outward.load(Ordering::Acquire)
    }

    /// Low-priority soft-IRQ: observes `Started`, transitions to
    /// `Latched`. Returns the deadline (start + `LATCH_MS`) to re-arm the
    /// step timer for, or `None` if there was nothing to latch.
    pub fn latch(&self, sysclk_hz: u32) -> Option<u32> {
        if self.state.load(Ordering::Acquire) == StepState::Started as u8 {
            self.state.store(StepState::Latched as u8, Ordering::Release);
            Some(self.start_time().wrapping_add(ms_to_ticks(LATCH_MS, sysclk_hz)))
        } else {
            None
        }
    }

    /// Timer fires in `Latched`: clamp-then-apply the cylinder move, set
    /// `trk0`, and move to `Settling`. Returns the new settle deadline.
    pub fn complete_latch(&mut self, sysclk_hz: u32) -> u32 {
        let outward = self.direction_outward();
        self.cyl = apply_step(self.cyl, outward);
        self.trk0 = self.cyl == 0;
        let deadline = self.start_time().wrapping_add(ms_to_ticks(SETTLE_MS, sysclk_hz));
        self.state.store(StepState::Settling as u8, Ordering::Release);
        deadline
    }

    /// Timer fires in `Settling`: CAS to `Idle`. If a new step pulse has
    /// already bumped the state back to `Started`, the CAS fails and the
    /// completion is silently dropped.
    pub fn complete_settle(&self) -> bool {
        self.state
            .compare_exchange(
                StepState::Settling as u8,
                StepState::Idle as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}

/// Clamp-then-apply: an outward step from cyl >= 84 snaps to 84 first,
/// then the step is applied, matching the hardware's historical "fast
/// step back from 255" absorption; an outward step at cyl 0 is a no-op.
pub fn apply_step(cyl: u8, outward: bool) -> u8 {
    if outward {
        let clamped = if cyl >= 84 { 84 } else { cyl };
        clamped.saturating_sub(1)
    } else {
        cyl.saturating_add(1)
    }
}

/// Shadow register for all status outputs (index, ready, disk-change,
/// write-protect, track-0). Writes to the physical port only happen while
/// `sel` is true; a drive-select edge replays the shadow.
pub struct OutputMux {
    shadow: AtomicU32,
}

pub const MASK_INDEX: u32 = 1 << 0;
pub const MASK_READY: u32 = 1 << 1;
pub const MASK_DSKCHG: u32 = 1 << 2;
pub const MASK_WRPROT: u32 = 1 << 3;
pub const MASK_TRK0: u32 = 1 << 4;

impl OutputMux {
    pub const fn new() -> Self {
        OutputMux {
            shadow: AtomicU32::new(0),
        }
    }

    pub fn shadow(&self) -> u32 {
        self.shadow.load(Ordering::Acquire)
    }

    /// Update the shadow under critical_section::free-equivalent caller
    /// protection (the caller is expected to disable IRQs around this).
    /// Returns the new shadow value so the caller can write it to the
    /// port iff `sel` is true.
    pub fn change_outputs(&self, mask: u32, value: u32) -> u32 {
        let new = (self.shadow.load(Ordering::Acquire) & !mask) | (value & mask);
        self.shadow.store(new, Ordering::Release);
        new
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outward_step_from_255_clamps_to_84_then_decrements() {
        assert_eq!(apply_step(255, true), 83);
    }

    #[test]
    fn outward_step_from_zero_is_floored() {
        assert_eq!(apply_step(0, true), 0);
    }

    #[test]
    fn inward_step_increments() {
        assert_eq!(apply_step(10, false), 11);
    }

    #[test]
    fn output_shadow_change_is_idempotent() {
        let mux = OutputMux::new();
        let a = mux.change_outputs(MASK_INDEX | MASK_TRK0, MASK_TRK0);
        let b = mux.change_outputs(MASK_INDEX | MASK_TRK0, MASK_TRK0);
        assert_eq!(a, b);
        assert_eq!(mux.shadow(), MASK_TRK0);
    }

    #[test]
    fn settle_completion_dropped_if_new_step_arrived() {
        let step = Step::new();
        step.on_step_pulse(0, false);
        step.latch(72_000_000);
        // Simulate a concurrent new pulse arriving before the settle timer fires.
        step.state.store(StepState::Started as u8, Ordering::Release);
        assert!(!step.complete_settle());
    }

    #[test]
    fn settle_completion_succeeds_when_uncontested() {
        let mut step = Step::new();
        step.on_step_pulse(0, false);
        step.latch(72_000_000);
        step.complete_latch(72_000_000);
        assert!(step.complete_settle());
        assert_eq!(step.state(), StepState::Idle);
    }

    #[test]
    fn latch_and_settle_deadlines_scale_with_sysclk() {
        let step = Step::new();
        step.on_step_pulse(1_000, false);
        let deadline = step.latch(1_000_000).unwrap();
        // 2ms at 1MHz is 2_000 ticks.
        assert_eq!(deadline, 1_000 + 2_000);
    }
}
