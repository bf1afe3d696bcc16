// Derived from hs-probe-bsp's SysTick-based delay helper, extended into a
// free-running monotonic tick source. The flux engine compares deadlines in
// raw system-clock ticks (the same unit DMA ARR/CCR samples are expressed
// in), so the 24-bit hardware downcounter is extended in software rather
// than exposed directly.

use core::sync::atomic::{AtomicU32, Ordering};
use stm32ral::syst;
use stm32ral::{modify_reg, read_reg, write_reg};

use crate::rcc::Clocks;

const SYST_CSR_ENABLE: u32 = 1 << 0;
const SYST_CSR_TICKINT: u32 = 1 << 1;
const SYST_CSR_CLKSOURCE: u32 = 1 << 2;

/// SysTick reload value: a 24-bit downcounter, reloaded from this constant
/// on every wrap. Chosen as the largest representable value so the
/// extending interrupt fires as infrequently as possible.
const RELOAD: u32 = 0x00ff_ffff;

static OVERFLOWS: AtomicU32 = AtomicU32::new(0);

pub struct Clock {
    systick: syst::Instance,
    base_clock: AtomicU32,
}

impl Clock {
    pub fn new(systick: syst::Instance) -> Self {
        modify_reg!(syst, systick, CSR, |r| (r | SYST_CSR_CLKSOURCE));
        write_reg!(syst, systick, RVR, RELOAD);
        write_reg!(syst, systick, CVR, 0);
        modify_reg!(syst, systick, CSR, |r| (r | SYST_CSR_ENABLE | SYST_CSR_TICKINT));

        Clock {
            systick,
            base_clock: AtomicU32::new(0),
        }
    }

    pub fn set_sysclk(&self, clocks: &Clocks) {
        self.base_clock.store(clocks.hclk(), Ordering::SeqCst);
    }

    pub fn sysclk_hz(&self) -> u32 {
        let hz = self.base_clock.load(Ordering::SeqCst);
        assert!(hz > 0);
        hz
    }

    /// Called from the `SysTick` exception handler. Not reentrant; the
    /// exception runs to completion without preemption by design.
    pub fn on_tick(&self) {
        OVERFLOWS.fetch_add(1, Ordering::SeqCst);
    }

    #[inline(always)]
    fn current(&self) -> u32 {
        read_reg!(syst, self.systick, CVR)
    }

    /// Monotonic system-clock tick count, wrapping at `u32::MAX`. Comparisons
    /// against values returned by this function must use wrapping
    /// subtraction, matching the convention used throughout the flux engine.
    pub fn now(&self) -> u32 {
        // Read overflow count before and after sampling CVR to detect (and
        // retry past) a wrap that lands between the two reads.
        loop {
            let before = OVERFLOWS.load(Ordering::SeqCst);
            let elapsed = RELOAD - self.current();
            let after = OVERFLOWS.load(Ordering::SeqCst);
            if before == after {
                return before.wrapping_mul(RELOAD.wrapping_add(1)).wrapping_add(elapsed);
            }
        }
    }

    pub fn delay_us(&self, us: u32) {
        assert!(us < 10_000);
        let ticks = (us as u64) * (self.sysclk_hz() as u64) / 1_000_000;
        self.delay_ticks(ticks as u32);
    }

    pub fn delay_ticks(&self, ticks: u32) {
        let deadline = self.now().wrapping_add(ticks);
        while (self.now().wrapping_sub(deadline) as i32) < 0 {}
    }

    /// True once `deadline` (a value previously returned by `now()` plus an
    /// offset) has passed.
    pub fn has_passed(&self, deadline: u32) -> bool {
        (self.now().wrapping_sub(deadline) as i32) >= 0
    }
}
