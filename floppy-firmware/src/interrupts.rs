//! Vector-table entries for the hardware interrupts the flux engine relies
//! on. `stm32ral` has no generated `Interrupt` enum for `cortex-m-rt`'s
//! `#[interrupt]` attribute, so these are plain `extern "C"` overrides of
//! the weak symbols its `device.x` linker script provides (`EXTI0`,
//! `EXTI9_5`, `DMA1_Channel2`, `DMA1_Channel4`, ...).
//!
//! Each handler only reaches into the atomic fields `FloppyCore` exposes
//! for this purpose (`Step`, the ring `RingStateCell`s, `OutputMux`); nothing
//! here borrows the rest of the singleton, which the foreground loop owns
//! exclusively.

use core::cell::RefCell;
use cortex_m::interrupt::Mutex;

use crate::engine::FloppyCore;

// Stored as an address rather than a raw pointer: `*mut T` is not `Send`,
// which `cortex_m::interrupt::Mutex`'s `Sync` impl requires of its contents.
static CORE: Mutex<RefCell<Option<usize>>> = Mutex::new(RefCell::new(None));

/// Unsafety: caller guarantees `core` outlives the program (it does: it is
/// a local in `main`'s `-> !` function) and that this runs before any of
/// the below handlers are unmasked.
pub unsafe fn register(core: &mut FloppyCore<'static>) {
    cortex_m::interrupt::free(|cs| {
        *CORE.borrow(cs).borrow_mut() = Some(core as *mut _ as usize);
    });
}

fn with_core<F: FnOnce(&mut FloppyCore<'static>)>(f: F) {
    cortex_m::interrupt::free(|cs| {
        if let Some(addr) = *CORE.borrow(cs).borrow() {
            f(unsafe { &mut *(addr as *mut FloppyCore<'static>) });
        }
    });
}

#[no_mangle]
pub unsafe extern "C" fn EXTI0() {
    with_core(|core| core.on_step_edge());
}

/// Line 2 (SIDE_SELECT) has its own dedicated vector.
#[no_mangle]
pub unsafe extern "C" fn EXTI2() {
    with_core(|core| core.on_side_select_edge());
}

/// Line 3 (DRIVE_SELECT) has its own dedicated vector.
#[no_mangle]
pub unsafe extern "C" fn EXTI3() {
    with_core(|core| core.on_drive_select_edge());
}

/// Lines 5-9 share one vector; WRITE_GATE (line 5) is the only one routed
/// here, so no further line-pending disambiguation is needed.
#[no_mangle]
pub unsafe extern "C" fn EXTI9_5() {
    with_core(|core| core.on_write_gate_edge());
}
