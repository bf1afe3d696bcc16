//! Flux ring buffers. One `ReadRing` feeds RDATA, one `WriteRing` drains
//! WDATA; each is a fixed power-of-two circular buffer of 16-bit timer
//! samples shared with a DMA channel. `state` is the sole synchronisation
//! protocol between the owning context and the DMA engine, so it is the
//! only field touched from both an ISR and the foreground loop.

use core::sync::atomic::{AtomicU8, Ordering};

pub const CAPACITY: usize = 1024;
const MASK: usize = CAPACITY - 1;

#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RingState {
    Inactive = 0,
    Starting = 1,
    Active = 2,
    Stopping = 3,
}

impl RingState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => RingState::Inactive,
            1 => RingState::Starting,
            2 => RingState::Active,
            _ => RingState::Stopping,
        }
    }
}

/// Atomically-accessed ring state, legal transitions only:
/// `Inactive -> Starting -> Active -> Stopping -> Inactive`.
pub struct RingStateCell(AtomicU8);

impl RingStateCell {
    pub const fn new() -> Self {
        RingStateCell(AtomicU8::new(RingState::Inactive as u8))
    }

    pub fn load(&self) -> RingState {
        RingState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub fn store(&self, s: RingState) {
        self.0.store(s as u8, Ordering::Release);
    }

    /// Used at the Starting/Active boundary and the Starting/Stopping
    /// boundary, where a concurrent stop request can race the first ISR
    /// to service the ring.
    pub fn compare_and_swap(&self, old: RingState, new: RingState) -> bool {
        self.0
            .compare_exchange(old as u8, new as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// Index arithmetic shared by both ring directions: given a DMA transfer-
/// count-remaining register, derive the hardware side's position in the
/// buffer. Mirrors `capacity - ndtr` used for UART ring positions.
pub fn position_from_ndtr(ndtr: usize) -> usize {
    CAPACITY - ndtr
}

/// Read-side ring: CPU (foreground loop while Starting, then the RDATA DMA
/// ISR while Active) is producer, DMA hardware is consumer.
pub struct ReadRing {
    pub buf: [u16; CAPACITY],
    pub state: RingStateCell,
    prod: usize,
    /// Total samples produced since the last `reset`, never wrapped —
    /// `prod` alone can't tell a full buffer from an empty one once it
    /// has wrapped past `CAPACITY`.
    filled: usize,
    pub kick_dma_irq: bool,
}

impl ReadRing {
    pub const fn new() -> Self {
        ReadRing {
            buf: [0; CAPACITY],
            state: RingStateCell::new(),
            prod: 0,
            filled: 0,
            kick_dma_irq: false,
        }
    }

    pub fn reset(&mut self) {
        self.prod = 0;
        self.filled = 0;
        self.kick_dma_irq = false;
    }

    pub fn producer(&self) -> usize {
        self.prod
    }

    /// Samples produced since the last `reset`, capped at `CAPACITY` (a
    /// full ring stays "full" rather than wrapping back to zero).
    pub fn filled(&self) -> usize {
        self.filled
    }

    /// Contiguous free run available to the producer before either the
    /// buffer wraps or it would overtake the DMA consumer position
    /// (derived from `ndtr`).
    pub fn free_run(&self, ndtr: usize) -> usize {
        let cons = position_from_ndtr(ndtr) & MASK;
        let prod = self.prod & MASK;
        let to_wrap = CAPACITY - prod;
        let to_consumer = if cons > prod {
            cons - prod
        } else if cons == prod {
            CAPACITY
        } else {
            CAPACITY - prod + cons
        };
        to_wrap.min(to_consumer)
    }

    /// Record that `n` freshly produced samples (already written at
    /// `[old_prod..old_prod+n)`) have been committed.
    pub fn advance(&mut self, n: usize) {
        self.prod = (self.prod + n) & MASK;
        self.filled = (self.filled + n).min(CAPACITY);
    }

    pub fn slot_mut(&mut self, offset: usize) -> &mut u16 {
        &mut self.buf[(self.prod + offset) & MASK]
    }

    /// True once the DMA consumer position has passed the producer,
    /// meaning the hardware ran dry of fresh samples.
    pub fn underrun(&self, ndtr: usize) -> bool {
        let cons = position_from_ndtr(ndtr) & MASK;
        cons == (self.prod & MASK) && self.prod != 0
    }
}

/// Write-side ring: DMA hardware is producer, the foreground loop's MFM
/// walk is consumer.
pub struct WriteRing {
    pub buf: [u16; CAPACITY],
    pub state: RingStateCell,
    cons: usize,
    pub prev_sample: u16,
}

impl WriteRing {
    pub const fn new() -> Self {
        WriteRing {
            buf: [0; CAPACITY],
            state: RingStateCell::new(),
            cons: 0,
            prev_sample: 0,
        }
    }

    pub fn reset(&mut self) {
        self.cons = 0;
        self.prev_sample = 0;
    }

    pub fn consumer(&self) -> usize {
        self.cons
    }

    /// Samples available between the consumer and the DMA producer
    /// position (derived from `ndtr`).
    pub fn available(&self, ndtr: usize) -> usize {
        let prod = position_from_ndtr(ndtr) & MASK;
        let cons = self.cons & MASK;
        if prod >= cons {
            prod - cons
        } else {
            CAPACITY - cons + prod
        }
    }

    pub fn peek(&self, offset: usize) -> u16 {
        self.buf[(self.cons + offset) & MASK]
    }

    pub fn advance(&mut self, n: usize) {
        self.cons = (self.cons + n) & MASK;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_run_stays_one_behind_consumer() {
        let ring = ReadRing::new();
        // Consumer at 0 (ndtr == CAPACITY), producer at 0: whole buffer
        // minus the one reserved slot is free, limited by the wrap.
        assert_eq!(ring.free_run(CAPACITY), CAPACITY);
    }

    #[test]
    fn free_run_respects_wrap_boundary() {
        let mut ring = ReadRing::new();
        ring.advance(CAPACITY - 4);
        // Consumer hasn't moved: plenty of logical room, but only 4
        // samples remain before the physical buffer wraps.
        assert_eq!(ring.free_run(CAPACITY), 4);
    }

    #[test]
    fn underrun_detected_when_consumer_catches_producer() {
        let mut ring = ReadRing::new();
        ring.advance(10);
        let ndtr = CAPACITY - 10;
        assert!(ring.underrun(ndtr));
        ring.advance(1);
        assert!(!ring.underrun(ndtr));
    }

    #[test]
    fn write_ring_available_wraps() {
        let mut ring = WriteRing::new();
        ring.advance(CAPACITY - 2);
        // Producer (ndtr-derived) has wrapped around to offset 3.
        let ndtr = CAPACITY - 3;
        assert_eq!(ring.available(ndtr), 5);
    }
}
