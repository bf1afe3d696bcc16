//! The singleton tying the flux engines to real hardware: constructed once
//! in `main`, `setup()` once, then `floppy_handle()` polled forever. The
//! EXTI/DMA ISRs in `interrupts.rs` only touch the atomic fields inside
//! `Step`/`RingStateCell`/`OutputMux`; everything else here is only ever
//! touched from the foreground loop.

use floppy_bsp::dma::DMA;
use floppy_bsp::exti::{Edge, Exti};
use floppy_bsp::gpio::Pins;
use floppy_bsp::delay::Clock;
use floppy_bsp::tim::{InputCapture, Periodic, PwmOut};
use stm32ral::{tim2, tim3, tim4};

use crate::error::Error;
use crate::image::Image;
use crate::index::Index;
use crate::log::{debug, warn};
use crate::rdata::{RdataEngine, RdataHw};
use crate::step::{OutputMux, Step, StepState, MASK_DSKCHG, MASK_INDEX, MASK_READY, MASK_TRK0, MASK_WRPROT};
use crate::wdata::{WdataEngine, WdataHw};

pub const EXTI_STEP: u8 = 0;
pub const EXTI_SIDE_SELECT: u8 = 2;
pub const EXTI_DRIVE_SELECT: u8 = 3;
pub const EXTI_WRITE_GATE: u8 = 5;

struct RdataHwImpl<'a> {
    pwm: &'a PwmOut,
    dma: &'a DMA,
    read_data: &'a floppy_bsp::gpio::Pin<'a>,
}

impl<'a> RdataHw for RdataHwImpl<'a> {
    fn ndtr(&self) -> usize {
        self.dma.rdata_ndtr()
    }
    fn start(&mut self, first_interval: u16) {
        self.read_data.set_mode_alternate_pushpull();
        self.dma.rdata_start();
        self.pwm.start(first_interval);
    }
    fn stop(&mut self) {
        self.pwm.stop();
        self.dma.rdata_stop();
        self.read_data.set_mode_output_pushpull();
        self.read_data.set_high();
    }
    fn kick(&mut self) {
        self.dma.rdata_kick();
    }
}

struct WdataHwImpl<'a> {
    capture: &'a InputCapture,
    dma: &'a DMA,
}

impl<'a> WdataHw for WdataHwImpl<'a> {
    fn ndtr(&self) -> usize {
        self.dma.wdata_ndtr()
    }
    fn start(&mut self) {
        self.dma.wdata_start();
        self.capture.start();
    }
    fn stop(&mut self) {
        self.capture.stop();
        self.dma.wdata_stop();
    }
}

pub struct FloppyCore<'a> {
    pins: &'a Pins<'a>,
    clock: &'a Clock,
    dma: &'a DMA,
    exti: &'a Exti,
    rdata_pwm: PwmOut,
    wdata_capture: InputCapture,
    index_timer: Periodic,
    image: &'a mut dyn Image,

    rdata: RdataEngine,
    wdata: WdataEngine,
    step: Step,
    outputs: OutputMux,
    index: Index,
    drive_selected: bool,
    write_gate_active: bool,
    /// Whether `image.open()` found a disk image at `setup()` time; drives
    /// `pin_rdy`.
    image_ready: bool,
    /// Currently selected head, tracked from the SIDE_SELECT line.
    head: u8,
}

impl<'a> FloppyCore<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pins: &'a Pins<'a>,
        clock: &'a Clock,
        dma: &'a DMA,
        exti: &'a Exti,
        tim3: tim3::Instance,
        tim4: tim4::Instance,
        tim2: tim2::Instance,
        image: &'a mut dyn Image,
    ) -> Self {
        // A 4us pulse width on RDATA regardless of cell density.
        let rdata_pwm = PwmOut::new(tim3, 4 * 72);
        let wdata_capture = InputCapture::new(tim4);
        let index_timer = Periodic::new(tim2);

        FloppyCore {
            pins,
            clock,
            dma,
            exti,
            rdata_pwm,
            wdata_capture,
            index_timer,
            image,
            rdata: RdataEngine::new(),
            wdata: WdataEngine::new(),
            step: Step::new(),
            outputs: OutputMux::new(),
            index: Index::new(),
            drive_selected: false,
            write_gate_active: false,
            image_ready: false,
            head: 0,
        }
    }

    /// Unsafety: call once from the main context before any interrupts
    /// that touch this instance's atomic fields are unmasked.
    pub unsafe fn setup(&mut self) {
        self.pins.step.set_mode_input_pullup();
        self.pins.direction.set_mode_input_pullup();
        self.pins.side_select.set_mode_input_pullup();
        self.pins.drive_select.set_mode_input_pullup();
        self.pins.motor_on.set_mode_input_pullup();
        self.pins.write_gate.set_mode_input_pullup();
        self.pins.write_data.set_mode_input_floating();

        self.pins.index.set_mode_output_pushpull();
        self.pins.ready.set_mode_output_pushpull();
        self.pins.track0.set_mode_output_pushpull();
        self.pins.write_protect.set_mode_output_pushpull();
        self.pins.disk_change.set_mode_output_pushpull();
        // Idle high push-pull until `RdataHwImpl::start` switches it to the
        // PWM alternate function; this is the drive->host RDATA line, the
        // opposite direction from `write_data`.
        self.pins.read_data.set_mode_output_pushpull();
        self.pins.read_data.set_high();

        self.dma.rdata_setup(self.rdata_pwm.arr_addr(), &self.rdata.ring.buf);
        self.dma.wdata_setup(self.wdata_capture.ccr1_addr(), &mut self.wdata.ring.buf);

        self.exti.configure(EXTI_STEP, 0, Edge::Falling);
        self.exti.configure(EXTI_SIDE_SELECT, 0, Edge::Both);
        self.exti.configure(EXTI_DRIVE_SELECT, 0, Edge::Both);
        self.exti.configure(EXTI_WRITE_GATE, 0, Edge::Both);
        self.exti.unmask(EXTI_STEP);
        self.exti.unmask(EXTI_SIDE_SELECT);
        self.exti.unmask(EXTI_DRIVE_SELECT);
        self.exti.unmask(EXTI_WRITE_GATE);

        self.image_ready = self.image.open(0);
        self.head = if self.pins.side_select.is_low() { 1 } else { 0 };
        let now = self.clock.now();
        self.index.start(now);
        self.index_timer.start(200_000 * (self.clock.sysclk_hz() / 1_000_000));
    }

    /// High-priority: the STEP line's falling edge. Called from the real
    /// EXTI ISR; touches only `Step`'s atomics.
    pub fn on_step_edge(&self) {
        self.exti.clear_pending(EXTI_STEP);
        let outward = self.pins.direction.is_high();
        self.step.on_step_pulse(self.clock.now(), outward);
    }

    pub fn on_drive_select_edge(&mut self) {
        self.exti.clear_pending(EXTI_DRIVE_SELECT);
        self.drive_selected = self.pins.drive_select.is_low();
        if self.drive_selected {
            let shadow = self.outputs.shadow();
            self.pins.index.set_bool(shadow & MASK_INDEX != 0);
            self.pins.ready.set_bool(shadow & MASK_READY != 0);
            self.pins.disk_change.set_bool(shadow & MASK_DSKCHG != 0);
            self.pins.write_protect.set_bool(shadow & MASK_WRPROT != 0);
            self.pins.track0.set_bool(shadow & MASK_TRK0 != 0);
        }
    }

    pub fn on_write_gate_edge(&mut self) {
        self.exti.clear_pending(EXTI_WRITE_GATE);
        let asserted = self.pins.write_gate.is_low();
        if asserted && self.rdata.ring.state.load() != crate::ring::RingState::Inactive {
            self.rdata.request_stop();
        }
        self.write_gate_active = asserted;
    }

    /// A side change mid-stream invalidates whatever the read engine has
    /// already buffered for the old head; drain and restart against the
    /// new one rather than keep emitting the wrong side's flux.
    pub fn on_side_select_edge(&mut self) {
        self.exti.clear_pending(EXTI_SIDE_SELECT);
        let head = if self.pins.side_select.is_low() { 1 } else { 0 };
        if head != self.head {
            self.head = head;
            if self.rdata.ring.state.load() != crate::ring::RingState::Inactive {
                self.rdata.request_stop();
            }
        }
    }

    /// Cooperative foreground loop, called forever from `main`.
    pub fn floppy_handle(&mut self) {
        let now = self.clock.now();

        if self.index_timer.update_pending() {
            let active = self.index.on_deadline(now);
            self.outputs.change_outputs(MASK_INDEX, if active { MASK_INDEX } else { 0 });
            if self.drive_selected {
                self.pins.index.set_bool(active);
            }
            let period = if active {
                crate::index::PULSE_TICKS_MS
            } else {
                crate::index::GAP_TICKS_MS
            };
            self.index_timer.rearm(period * (self.clock.sysclk_hz() / 1_000));
        }

        let sysclk_hz = self.clock.sysclk_hz();
        match self.step.state() {
            StepState::Started => {
                if let Some(deadline) = self.step.latch(sysclk_hz) {
                    while !self.clock.has_passed(deadline) {}
                    let settle_deadline = self.step.complete_latch(sysclk_hz);
                    while !self.clock.has_passed(settle_deadline) {}
                    let _ = self.step.complete_settle();
                }
            }
            StepState::Latched | StepState::Settling | StepState::Idle => {}
        }

        // While actively streaming from the image, keep the virtual index
        // schedule synced to the codec's own rotational position rather
        // than letting it free-run from `index_timer` alone.
        if self.rdata.ring.state.load() == crate::ring::RingState::Active {
            self.index.resync(self.image.ticks_since_index());
        }

        // Re-derived every iteration rather than only on the events that
        // change them (step completion, image open): cheap, and it covers
        // the initial state for free the same way the write-protect bit
        // already did.
        let status_mask = MASK_WRPROT | MASK_READY | MASK_DSKCHG | MASK_TRK0;
        let status_value = (if self.image.writable() { 0 } else { MASK_WRPROT })
            | (if self.image_ready { MASK_READY } else { 0 })
            | MASK_DSKCHG
            | (if self.step.trk0 { MASK_TRK0 } else { 0 });
        let shadow = self.outputs.change_outputs(status_mask, status_value);
        if self.drive_selected {
            self.pins.write_protect.set_bool(shadow & MASK_WRPROT != 0);
            self.pins.ready.set_bool(shadow & MASK_READY != 0);
            self.pins.disk_change.set_bool(shadow & MASK_DSKCHG != 0);
            self.pins.track0.set_bool(shadow & MASK_TRK0 != 0);
        }

        if self.write_gate_active {
            if self.wdata.ring.state.load() == crate::ring::RingState::Inactive {
                // Observed-empirically settle delay between write-gate assertion
                // and the first meaningful input-capture sample.
                self.clock.delay_ticks(crate::wdata::XCOPY_WORKAROUND_TICKS);
                let mut hw = WdataHwImpl { capture: &self.wdata_capture, dma: self.dma };
                self.wdata.start(self.image, self.index.prev_time(), &mut hw);
            }
            let hw = WdataHwImpl { capture: &self.wdata_capture, dma: self.dma };
            if let Err(e) = self.wdata.poll(self.image, &hw) {
                warn!("wdata poll error: {:?}", e);
            }
        } else if self.wdata.ring.state.load() != crate::ring::RingState::Inactive {
            let mut hw = WdataHwImpl { capture: &self.wdata_capture, dma: self.dma };
            self.wdata.request_stop(self.image, &mut hw);
        }

        let mut hw = RdataHwImpl { pwm: &self.rdata_pwm, dma: self.dma, read_data: &self.pins.read_data };
        let step_active = self.step.state() != StepState::Idle;
        match self.rdata.poll(
            self.image,
            &mut hw,
            now,
            self.index.prev_time(),
            step_active,
            self.write_gate_active,
            None,
            self.step.cyl,
            self.head,
            sysclk_hz,
        ) {
            Ok(_) => {}
            Err(Error::Underrun) => {
                debug!("rdata underrun, restarting");
                self.rdata.request_stop();
            }
            Err(e) => warn!("rdata poll error: {:?}", e),
        }
    }
}
