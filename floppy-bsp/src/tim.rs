//! General-purpose timer wrapper covering the three roles the flux engine
//! needs from TIM2/TIM3/TIM4: PWM output for RDATA, input capture for
//! WDATA, and a plain periodic update interrupt for the index scheduler.
//!
//! TIM2/TIM3/TIM4 share one register layout on this part, so `stm32ral`
//! gives them all the same `Instance` type (distinguished only by the
//! `addr` baked into each singleton returned by `TIM2::take()` /
//! `TIM3::take()` / `TIM4::take()`); one wrapper body covers all three.

use stm32ral::tim2;
use stm32ral::tim2::Instance;
use stm32ral::{modify_reg, read_reg, write_reg};

const DIER_UDE_OFFSET: u32 = 8;
const CCER_CC1P_OFFSET: u32 = 1;
const DIER_CC1DE_MASK: u32 = 1 << 9;

/// PWM output on channel 1, used to drive RDATA. `ARR` (the flux
/// interval) is fed by circular DMA tied to the timer's update-DMA
/// request; `CCR1` holds a fixed pulse width.
pub struct PwmOut {
    tim: Instance,
}

impl PwmOut {
    pub fn new(tim: Instance, pulse_ticks: u16) -> Self {
        modify_reg!(tim2, tim, CCMR1, |r| (r & !((0b111 << 4) | (1 << 3))) | (0b110 << 4) | (1 << 3));
        modify_reg!(tim2, tim, CCER, |r| r | 1); // CC1E
        write_reg!(tim2, tim, CCR1, pulse_ticks as u32);
        modify_reg!(tim2, tim, CR1, |r| r | (1 << 7)); // ARPE
        modify_reg!(tim2, tim, DIER, |r| r | (1 << DIER_UDE_OFFSET)); // UDE
        PwmOut { tim }
    }

    pub fn arr_addr(&self) -> u32 {
        &self.tim.ARR as *const _ as u32
    }

    /// Force the first reload value to latch, then start the counter.
    pub fn start(&self, first_interval: u16) {
        write_reg!(tim2, self.tim, ARR, first_interval as u32);
        write_reg!(tim2, self.tim, EGR, UG: Update);
        modify_reg!(tim2, self.tim, CR1, CEN: Enabled);
    }

    pub fn stop(&self) {
        modify_reg!(tim2, self.tim, CR1, CEN: Disabled);
    }
}

/// Input capture on channel 1, used to sample WDATA transition timestamps
/// into memory via DMA.
pub struct InputCapture {
    tim: Instance,
}

impl InputCapture {
    pub fn new(tim: Instance) -> Self {
        // CC1S = 01 (input, mapped to TI1 directly), no filter/prescaler.
        modify_reg!(tim2, tim, CCMR1, |r| (r & !0b11) | 0b01);
        modify_reg!(tim2, tim, CCER, |r| r | (1 << CCER_CC1P_OFFSET) | 1); // falling edge, CC1E
        modify_reg!(tim2, tim, DIER, |r| r | DIER_CC1DE_MASK); // CC1DE
        InputCapture { tim }
    }

    pub fn ccr1_addr(&self) -> u32 {
        &self.tim.CCR1 as *const _ as u32
    }

    pub fn start(&self) {
        write_reg!(tim2, self.tim, EGR, UG: Update);
        modify_reg!(tim2, self.tim, CR1, CEN: Enabled);
    }

    pub fn stop(&self) {
        modify_reg!(tim2, self.tim, CR1, CEN: Disabled);
    }
}

/// A plain free-running timer generating an update interrupt every
/// `period_ticks`, used by the index scheduler to self-rearm its two
/// phases (index pulse width, inter-index gap) without DMA.
pub struct Periodic {
    tim: Instance,
}

impl Periodic {
    pub fn new(tim: Instance) -> Self {
        modify_reg!(tim2, tim, DIER, |r| r | 1); // UIE
        Periodic { tim }
    }

    pub fn start(&self, period_ticks: u32) {
        write_reg!(tim2, self.tim, ARR, period_ticks);
        write_reg!(tim2, self.tim, EGR, UG: Update);
        modify_reg!(tim2, self.tim, SR, UIF: Clear);
        modify_reg!(tim2, self.tim, CR1, CEN: Enabled);
    }

    /// Re-arm for the next phase, called from the timer's update ISR.
    pub fn rearm(&self, period_ticks: u32) {
        modify_reg!(tim2, self.tim, SR, UIF: Clear);
        write_reg!(tim2, self.tim, ARR, period_ticks);
    }

    pub fn stop(&self) {
        modify_reg!(tim2, self.tim, CR1, CEN: Disabled);
    }

    pub fn update_pending(&self) -> bool {
        (read_reg!(tim2, self.tim, SR) & 1) != 0
    }
}
