//! Board pin maps and NVIC interrupt numbers for the STM32F107
//! connectivity-line part.
//!
//! `stm32ral` does not generate a PAC-style `Interrupt` enum (only raw
//! `extern "C"` vector-table symbols), so the handful of lines this crate
//! actually pends/masks are named here, numbered per the connectivity-line
//! vector table in the reference manual.

use cortex_m::interrupt::Nr;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Interrupt {
    Exti0 = 6,
    Exti1 = 7,
    Exti2 = 8,
    Exti3 = 9,
    Exti4 = 10,
    Dma1Channel1 = 11,
    Dma1Channel2 = 12,
    Dma1Channel3 = 13,
    Dma1Channel4 = 14,
    Dma1Channel5 = 15,
    Exti9_5 = 22,
    Tim2 = 27,
    Tim3 = 28,
    Tim4 = 29,
    Exti15_10 = 40,
}

unsafe impl Nr for Interrupt {
    fn nr(&self) -> u8 {
        *self as u8
    }
}

/// Pin roles for the touchscreen reference board: a STM32F107 dev board
/// wired to a Shugart cable with no onboard USB-to-drive connector.
#[cfg(feature = "board-touch")]
pub mod touch {
    pub const STEP_PORT: u8 = 0; // GPIOA
    pub const STEP_PIN: u8 = 0;
    pub const DIRECTION_PIN: u8 = 1;
    pub const SIDE_SELECT_PIN: u8 = 2;
    pub const DRIVE_SELECT_PIN: u8 = 3;
    pub const MOTOR_ON_PIN: u8 = 4;
    pub const WRITE_GATE_PIN: u8 = 5;
    pub const WRITE_DATA_PIN: u8 = 6;

    pub const INDEX_PORT: u8 = 1; // GPIOB
    pub const INDEX_PIN: u8 = 0;
    pub const READY_PIN: u8 = 1;
    pub const TRACK0_PIN: u8 = 2;
    pub const WRITE_PROTECT_PIN: u8 = 3;
    pub const DISK_CHANGE_PIN: u8 = 4;
    pub const READ_DATA_PIN: u8 = 5;
}

/// Pin roles for the Gotek enclosure's onboard STM32F105 board, re-targeted
/// here at the feature-equivalent F107.
#[cfg(feature = "board-gotek")]
pub mod gotek {
    pub const STEP_PORT: u8 = 0; // GPIOA
    pub const STEP_PIN: u8 = 8;
    pub const DIRECTION_PIN: u8 = 9;
    pub const SIDE_SELECT_PIN: u8 = 10;
    pub const DRIVE_SELECT_PIN: u8 = 11;
    pub const MOTOR_ON_PIN: u8 = 12;
    pub const WRITE_GATE_PIN: u8 = 15;
    pub const WRITE_DATA_PIN: u8 = 1;

    pub const INDEX_PORT: u8 = 2; // GPIOC
    pub const INDEX_PIN: u8 = 6;
    pub const READY_PIN: u8 = 7;
    pub const TRACK0_PIN: u8 = 8;
    pub const WRITE_PROTECT_PIN: u8 = 9;
    pub const DISK_CHANGE_PIN: u8 = 10;
    pub const READ_DATA_PIN: u8 = 11;
}
