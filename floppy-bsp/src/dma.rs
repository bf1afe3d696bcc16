use stm32ral::dma;
use stm32ral::{modify_reg, read_reg, write_reg};

use crate::board::Interrupt;

/// RDATA uses DMA1 channel 2, memory -> peripheral, circular, feeding a
/// timer's ARR register with the next flux interval on every update event.
/// WDATA uses DMA1 channel 4, peripheral -> memory, circular, capturing a
/// timer's CCR register on every edge seen by input capture.
pub struct DMA {
    dma1: dma::Instance,
}

impl DMA {
    pub fn new(dma1: dma::Instance) -> Self {
        DMA { dma1 }
    }

    /// Bind channel 2 to `tim_arr_addr` (the ARR register of the timer
    /// driving RDATA) and `buf` (the flux ring's backing storage). Leaves
    /// the channel disabled; call `rdata_start` to begin transfers.
    pub fn rdata_setup(&self, tim_arr_addr: u32, buf: &[u16]) {
        write_reg!(dma, self.dma1, PAR2, tim_arr_addr);
        write_reg!(dma, self.dma1, MAR2, buf.as_ptr() as u32);
        write_reg!(dma, self.dma1, NDTR2, buf.len() as u32);
        write_reg!(
            dma,
            self.dma1,
            CR2,
            MSIZE: Bits16,
            PSIZE: Bits16,
            MINC: Enabled,
            PINC: Disabled,
            CIRC: Enabled,
            DIR: FromMemory,
            PL: High,
            TCIE: Enabled,
            HTIE: Enabled,
            TEIE: Enabled,
            EN: Disabled
        );
    }

    pub fn rdata_start(&self) {
        write_reg!(dma, self.dma1, IFCR, CGIF2: Clear);
        modify_reg!(dma, self.dma1, CR2, EN: Enabled);
    }

    pub fn rdata_stop(&self) {
        modify_reg!(dma, self.dma1, CR2, EN: Disabled);
    }

    /// Number of transfers remaining in the current pass of the circular
    /// buffer; the flux ring derives its consumer position as
    /// `capacity - ndtr`, mirroring how the UART ring reads `usart1_ndtr`.
    pub fn rdata_ndtr(&self) -> usize {
        read_reg!(dma, self.dma1, NDTR2) as usize
    }

    pub fn rdata_half_pending(&self) -> bool {
        read_reg!(dma, self.dma1, ISR, HTIF2 == Half)
    }

    pub fn rdata_full_pending(&self) -> bool {
        read_reg!(dma, self.dma1, ISR, TCIF2 == Complete)
    }

    pub fn rdata_error_pending(&self) -> bool {
        read_reg!(dma, self.dma1, ISR, TEIF2 == Error)
    }

    pub fn rdata_clear_pending(&self) {
        write_reg!(dma, self.dma1, IFCR, CGIF2: Clear);
    }

    /// Pend the channel 2 ISR from software, used after loading the first
    /// few flux intervals so the foreground loop doesn't have to wait for
    /// real DMA activity to prime the ring.
    pub fn rdata_kick(&self) {
        cortex_m::peripheral::NVIC::pend(Interrupt::Dma1Channel2);
    }

    /// Bind channel 4 to `tim_ccr_addr` (the CCRx register of the timer
    /// doing input capture for WDATA) and `buf` (the write ring's backing
    /// storage). Leaves the channel disabled; call `wdata_start` to begin.
    pub fn wdata_setup(&self, tim_ccr_addr: u32, buf: &mut [u16]) {
        write_reg!(dma, self.dma1, PAR4, tim_ccr_addr);
        write_reg!(dma, self.dma1, MAR4, buf.as_mut_ptr() as u32);
        write_reg!(dma, self.dma1, NDTR4, buf.len() as u32);
        write_reg!(
            dma,
            self.dma1,
            CR4,
            MSIZE: Bits16,
            PSIZE: Bits16,
            MINC: Enabled,
            PINC: Disabled,
            CIRC: Enabled,
            DIR: FromPeripheral,
            PL: High,
            TCIE: Enabled,
            HTIE: Enabled,
            TEIE: Enabled,
            EN: Disabled
        );
    }

    pub fn wdata_start(&self) {
        write_reg!(dma, self.dma1, IFCR, CGIF4: Clear);
        modify_reg!(dma, self.dma1, CR4, EN: Enabled);
    }

    pub fn wdata_stop(&self) {
        modify_reg!(dma, self.dma1, CR4, EN: Disabled);
    }

    pub fn wdata_ndtr(&self) -> usize {
        read_reg!(dma, self.dma1, NDTR4) as usize
    }

    pub fn wdata_half_pending(&self) -> bool {
        read_reg!(dma, self.dma1, ISR, HTIF4 == Half)
    }

    pub fn wdata_full_pending(&self) -> bool {
        read_reg!(dma, self.dma1, ISR, TCIF4 == Complete)
    }

    pub fn wdata_error_pending(&self) -> bool {
        read_reg!(dma, self.dma1, ISR, TEIF4 == Error)
    }

    pub fn wdata_clear_pending(&self) {
        write_reg!(dma, self.dma1, IFCR, CGIF4: Clear);
    }

    pub fn wdata_kick(&self) {
        cortex_m::peripheral::NVIC::pend(Interrupt::Dma1Channel4);
    }
}
