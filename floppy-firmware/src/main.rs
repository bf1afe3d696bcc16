// Pure-logic modules (rdata/wdata/step/index/ring/image) carry their own
// `#[cfg(test)]` suites; building the binary under `cargo test` needs `std`
// for the test harness, so `no_std`/`no_main` and the panic handler are only
// applied to the real firmware build.
#![cfg_attr(not(test), no_std)]
#![cfg_attr(not(test), no_main)]

mod engine;
mod error;
mod image;
mod index;
mod interrupts;
mod log;
mod rdata;
mod ring;
mod step;
mod wdata;

#[cfg(not(test))]
use cortex_m_rt::entry;
#[cfg(not(test))]
use panic_rtt_target as _;
#[cfg(not(test))]
use rtt_target::{rprintln, rtt_init_print};

use floppy_bsp::board;
use floppy_bsp::delay::Clock;
use floppy_bsp::dma::DMA;
use floppy_bsp::exti::Exti;
use floppy_bsp::gpio::{Pins, GPIO};
use floppy_bsp::rcc::RCC;

use crate::engine::FloppyCore;

#[cfg(all(not(test), feature = "board-touch"))]
use board::touch as pinmap;
#[cfg(all(not(test), feature = "board-gotek"))]
use board::gotek as pinmap;

/// A backing store that never has a disk image loaded; a real image codec
/// is out of scope here, so every track reads back as a flux stream of
/// silence and writes are discarded.
#[cfg(not(test))]
struct EmptyImage;

#[cfg(not(test))]
impl crate::image::Image for EmptyImage {
    fn open(&mut self, _slot: usize) -> bool {
        false
    }
    fn seek_track(&mut self, _cylinder: u8, _head: u8, _position_ticks: Option<&mut u32>) -> crate::image::SeekResult {
        crate::image::SeekResult::Ready
    }
    fn rdata_flux(&mut self, _buf: &mut [u16]) -> usize {
        0
    }
    fn read_track(&mut self) -> bool {
        false
    }
    fn write_track(&mut self, _flush: bool) {}
    fn ticks_since_index(&self) -> u32 {
        0
    }
    fn syncword(&self) -> u32 {
        0x4489_4489
    }
    fn set_write_start(&mut self, _ticks: u32) {}
    fn file_sync(&mut self) {}
    fn writable(&self) -> bool {
        false
    }
}

#[cfg(not(test))]
#[entry]
fn main() -> ! {
    rtt_init_print!();
    rprintln!("floppy-firmware starting");

    let rcc = RCC::new(stm32ral::rcc::RCC::take().unwrap());
    let clocks = unsafe { rcc.setup() };

    let clock = Clock::new(stm32ral::syst::SYST::take().unwrap());
    clock.set_sysclk(&clocks);

    let dma = DMA::new(stm32ral::dma::DMA1::take().unwrap());
    let exti = Exti::new(
        stm32ral::afio::AFIO::take().unwrap(),
        stm32ral::exti::EXTI::take().unwrap(),
    );

    let gpioa = GPIO::new(stm32ral::gpio::GPIOA::take().unwrap());
    let gpiob = GPIO::new(stm32ral::gpio::GPIOB::take().unwrap());

    let pins = Pins {
        step: gpioa.pin(pinmap::STEP_PIN),
        direction: gpioa.pin(pinmap::DIRECTION_PIN),
        side_select: gpioa.pin(pinmap::SIDE_SELECT_PIN),
        drive_select: gpioa.pin(pinmap::DRIVE_SELECT_PIN),
        motor_on: gpioa.pin(pinmap::MOTOR_ON_PIN),
        write_gate: gpioa.pin(pinmap::WRITE_GATE_PIN),
        write_data: gpioa.pin(pinmap::WRITE_DATA_PIN),
        index: gpiob.pin(pinmap::INDEX_PIN),
        ready: gpiob.pin(pinmap::READY_PIN),
        track0: gpiob.pin(pinmap::TRACK0_PIN),
        write_protect: gpiob.pin(pinmap::WRITE_PROTECT_PIN),
        disk_change: gpiob.pin(pinmap::DISK_CHANGE_PIN),
        read_data: gpiob.pin(pinmap::READ_DATA_PIN),
    };

    let tim2 = stm32ral::tim2::TIM2::take().unwrap();
    let tim3 = stm32ral::tim3::TIM3::take().unwrap();
    let tim4 = stm32ral::tim4::TIM4::take().unwrap();

    let mut image = EmptyImage;

    let mut floppy = FloppyCore::new(&pins, &clock, &dma, &exti, tim3, tim4, tim2, &mut image);

    unsafe {
        floppy.setup();
        // Safety: `floppy` is a local in this `-> !` function, so it lives
        // for the remainder of the program; interrupts are unmasked only
        // after this point.
        interrupts::register(core::mem::transmute::<&mut FloppyCore, &mut FloppyCore<'static>>(&mut floppy));
    }

    rprintln!("floppy-firmware running");

    loop {
        floppy.floppy_handle();
    }
}
