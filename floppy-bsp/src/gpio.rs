use stm32ral::gpio;
use stm32ral::{modify_reg, read_reg, write_reg};

/// MODE/CNF encodings for the STM32F1 CRL/CRH pin-configuration registers.
/// Each pin has a 2-bit MODE (input, or output at one of three slew rates)
/// and a 2-bit CNF whose meaning depends on MODE.
mod cfg {
    pub const MODE_INPUT: u32 = 0b00;
    pub const MODE_OUTPUT_10MHZ: u32 = 0b01;
    pub const MODE_OUTPUT_2MHZ: u32 = 0b10;
    pub const MODE_OUTPUT_50MHZ: u32 = 0b11;

    pub const CNF_INPUT_ANALOG: u32 = 0b00;
    pub const CNF_INPUT_FLOATING: u32 = 0b01;
    pub const CNF_INPUT_PULL: u32 = 0b10;

    pub const CNF_OUTPUT_PUSHPULL: u32 = 0b00;
    pub const CNF_OUTPUT_OPENDRAIN: u32 = 0b01;
    pub const CNF_OUTPUT_AF_PUSHPULL: u32 = 0b10;
    pub const CNF_OUTPUT_AF_OPENDRAIN: u32 = 0b11;
}

pub struct GPIO {
    p: gpio::Instance,
}

impl<'a> GPIO {
    pub fn new(p: gpio::Instance) -> Self {
        GPIO { p }
    }

    pub fn pin(&'a self, n: u8) -> Pin<'a> {
        assert!(n < 16);
        Pin { n, port: self }
    }

    #[inline(always)]
    pub fn set_high(&'a self, n: u8) -> &Self {
        write_reg!(gpio, self.p, BSRR, 1 << n);
        self
    }

    #[inline(always)]
    pub fn set_low(&'a self, n: u8) -> &Self {
        write_reg!(gpio, self.p, BSRR, 1 << (n + 16));
        self
    }

    #[inline]
    pub fn toggle(&'a self, n: u8) -> &Self {
        if (read_reg!(gpio, self.p, IDR) >> n) & 1 == 1 {
            self.set_low(n)
        } else {
            self.set_high(n)
        }
    }

    /// Write `mode`/`cnf` into the 4-bit field for pin `n` in CRL (pins
    /// 0-7) or CRH (pins 8-15).
    fn configure(&'a self, n: u8, mode: u32, cnf: u32) -> &Self {
        let field = n % 8;
        let offset = field * 4;
        let mask = 0b1111u32 << offset;
        let val = ((cnf << 2 | mode) << offset) & mask;
        if n < 8 {
            modify_reg!(gpio, self.p, CRL, |r| (r & !mask) | val);
        } else {
            modify_reg!(gpio, self.p, CRH, |r| (r & !mask) | val);
        }
        self
    }

    #[inline]
    pub fn set_mode_input_floating(&'a self, n: u8) -> &Self {
        self.configure(n, cfg::MODE_INPUT, cfg::CNF_INPUT_FLOATING)
    }

    #[inline]
    pub fn set_mode_input_pullup(&'a self, n: u8) -> &Self {
        self.set_high(n);
        self.configure(n, cfg::MODE_INPUT, cfg::CNF_INPUT_PULL)
    }

    #[inline]
    pub fn set_mode_input_pulldown(&'a self, n: u8) -> &Self {
        self.set_low(n);
        self.configure(n, cfg::MODE_INPUT, cfg::CNF_INPUT_PULL)
    }

    #[inline]
    pub fn set_mode_input_analog(&'a self, n: u8) -> &Self {
        self.configure(n, cfg::MODE_INPUT, cfg::CNF_INPUT_ANALOG)
    }

    #[inline]
    pub fn set_mode_output_pushpull(&'a self, n: u8) -> &Self {
        self.configure(n, cfg::MODE_OUTPUT_50MHZ, cfg::CNF_OUTPUT_PUSHPULL)
    }

    #[inline]
    pub fn set_mode_output_opendrain(&'a self, n: u8) -> &Self {
        self.configure(n, cfg::MODE_OUTPUT_50MHZ, cfg::CNF_OUTPUT_OPENDRAIN)
    }

    #[inline]
    pub fn set_mode_alternate_pushpull(&'a self, n: u8) -> &Self {
        self.configure(n, cfg::MODE_OUTPUT_50MHZ, cfg::CNF_OUTPUT_AF_PUSHPULL)
    }

    #[inline]
    pub fn set_mode_alternate_opendrain(&'a self, n: u8) -> &Self {
        self.configure(n, cfg::MODE_OUTPUT_50MHZ, cfg::CNF_OUTPUT_AF_OPENDRAIN)
    }

    #[inline]
    pub fn get_idr(&'a self) -> u32 {
        read_reg!(gpio, self.p, IDR)
    }

    #[inline]
    pub fn get_pin_idr(&'a self, n: u8) -> bool {
        (self.get_idr() & (1 << n)) != 0
    }
}

#[repr(u16)]
#[derive(Copy, Clone, PartialEq, Eq)]
pub enum PinState {
    Low = 0,
    High = 1,
}

pub struct Pin<'a> {
    n: u8,
    port: &'a GPIO,
}

impl<'a> Pin<'a> {
    #[inline(always)]
    pub fn set_high(&self) -> &Self {
        self.port.set_high(self.n);
        self
    }

    #[inline(always)]
    pub fn set_low(&self) -> &Self {
        self.port.set_low(self.n);
        self
    }

    #[inline(always)]
    pub fn set_bool(&self, state: bool) {
        match state {
            false => self.set_low(),
            true => self.set_high(),
        };
    }

    #[inline(always)]
    pub fn set_state(&self, state: PinState) {
        self.set_bool(state == PinState::High);
    }

    #[inline(always)]
    pub fn is_high(&self) -> bool {
        self.port.get_pin_idr(self.n)
    }

    #[inline(always)]
    pub fn is_low(&self) -> bool {
        !self.is_high()
    }

    #[inline]
    pub fn toggle(&'a self) -> &Self {
        self.port.toggle(self.n);
        self
    }

    #[inline]
    pub fn set_mode_input_floating(&'a self) -> &Self {
        self.port.set_mode_input_floating(self.n);
        self
    }

    #[inline]
    pub fn set_mode_input_pullup(&'a self) -> &Self {
        self.port.set_mode_input_pullup(self.n);
        self
    }

    #[inline]
    pub fn set_mode_input_pulldown(&'a self) -> &Self {
        self.port.set_mode_input_pulldown(self.n);
        self
    }

    #[inline]
    pub fn set_mode_output_pushpull(&'a self) -> &Self {
        self.port.set_mode_output_pushpull(self.n);
        self
    }

    #[inline]
    pub fn set_mode_output_opendrain(&'a self) -> &Self {
        self.port.set_mode_output_opendrain(self.n);
        self
    }

    #[inline]
    pub fn set_mode_alternate_pushpull(&'a self) -> &Self {
        self.port.set_mode_alternate_pushpull(self.n);
        self
    }

    #[inline]
    pub fn set_mode_alternate_opendrain(&'a self) -> &Self {
        self.port.set_mode_alternate_opendrain(self.n);
        self
    }
}

/// Pins relevant to the floppy interface cable. A board module
/// (`board::touch` / `board::gotek`) maps these roles onto concrete
/// GPIO ports and pin numbers.
pub struct Pins<'a> {
    // Host -> drive
    pub step: Pin<'a>,
    pub direction: Pin<'a>,
    pub side_select: Pin<'a>,
    pub drive_select: Pin<'a>,
    pub motor_on: Pin<'a>,
    pub write_gate: Pin<'a>,
    pub write_data: Pin<'a>,

    // Drive -> host
    pub index: Pin<'a>,
    pub ready: Pin<'a>,
    pub track0: Pin<'a>,
    pub write_protect: Pin<'a>,
    pub disk_change: Pin<'a>,
    pub read_data: Pin<'a>,
}
