//! External interrupt line setup for the four pins the step/status engine
//! watches directly in hardware: STEP, WRITE_GATE, DRIVE_SELECT and
//! SIDE_SELECT. Each EXTI line is routed to a GPIO port via AFIO's
//! EXTICRx registers, then configured edge-sensitive in EXTI itself.

use stm32ral::{afio, exti};
use stm32ral::{modify_reg, write_reg};

pub struct Exti {
    afio: afio::Instance,
    exti: exti::Instance,
}

#[derive(Copy, Clone)]
pub enum Edge {
    Rising,
    Falling,
    Both,
}

impl Exti {
    pub fn new(afio: afio::Instance, exti: exti::Instance) -> Self {
        Exti { afio, exti }
    }

    /// Route EXTI line `line` (0-15) to GPIO port `port` (0=A, 1=B, 2=C, ...)
    /// and arm it for `edge`, leaving it masked. Call `unmask` to enable.
    pub fn configure(&self, line: u8, port: u8, edge: Edge) {
        assert!(line < 16);
        let reg_idx = line / 4;
        let field = (line % 4) * 4;
        let mask = 0b1111u32 << field;
        let val = (port as u32) << field;
        match reg_idx {
            0 => modify_reg!(afio, self.afio, EXTICR1, |r| (r & !mask) | val),
            1 => modify_reg!(afio, self.afio, EXTICR2, |r| (r & !mask) | val),
            2 => modify_reg!(afio, self.afio, EXTICR3, |r| (r & !mask) | val),
            _ => modify_reg!(afio, self.afio, EXTICR4, |r| (r & !mask) | val),
        };

        let bit = 1u32 << line;
        let (rising, falling) = match edge {
            Edge::Rising => (true, false),
            Edge::Falling => (false, true),
            Edge::Both => (true, true),
        };
        modify_reg!(exti, self.exti, RTSR, |r| if rising { r | bit } else { r & !bit });
        modify_reg!(exti, self.exti, FTSR, |r| if falling { r | bit } else { r & !bit });
    }

    pub fn unmask(&self, line: u8) {
        modify_reg!(exti, self.exti, IMR, |r| r | (1u32 << line));
    }

    pub fn mask(&self, line: u8) {
        modify_reg!(exti, self.exti, IMR, |r| r & !(1u32 << line));
    }

    pub fn pending(&self, line: u8) -> bool {
        stm32ral::read_reg!(exti, self.exti, PR) & (1u32 << line) != 0
    }

    pub fn clear_pending(&self, line: u8) {
        // PR is write-1-to-clear.
        write_reg!(exti, self.exti, PR, 1u32 << line);
    }
}
