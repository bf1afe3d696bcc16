//! The `Image` trait is the external collaborator spec'd in the interface
//! section: a disk-image codec that turns stored sectors into flux
//! samples and back. The codec implementation itself is out of scope; the
//! flux engines only depend on this trait.

/// Result of a seek request: either the codec is ready at the requested
/// position, or it is still busy (e.g. waiting on a slow storage read)
/// and the caller should retry on the next poll.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SeekResult {
    Ready,
    Busy,
}

pub trait Image {
    /// Prepare the image for I/O against the given storage slot index.
    fn open(&mut self, slot: usize) -> bool;

    /// Set the codec to the given side+cylinder. If `position_ticks` is
    /// `Some`, the codec updates it to the actual aligned start position.
    fn seek_track(&mut self, cylinder: u8, head: u8, position_ticks: Option<&mut u32>) -> SeekResult;

    /// Fill up to `buf.len()` flux-interval samples (in system-clock
    /// ticks); returns the number actually produced, which may be short.
    fn rdata_flux(&mut self, buf: &mut [u16]) -> usize;

    /// Replenish the codec's internal read buffers from storage. Returns
    /// whether new data was actually buffered.
    fn read_track(&mut self) -> bool;

    /// Drain buffered MFM bits toward storage. `flush` requests a final
    /// commit (e.g. at the end of a write).
    fn write_track(&mut self, flush: bool);

    /// Current bit-level rotational position within one revolution, in
    /// system-clock ticks since the image's internal index mark.
    fn ticks_since_index(&self) -> u32;

    /// Codec-specific MFM sync pattern used to word-align the decoded
    /// write stream.
    fn syncword(&self) -> u32;

    /// Stash the rotational offset (system ticks since the last index
    /// edge) at which a write began, so the codec can place the data
    /// correctly on the track.
    fn set_write_start(&mut self, ticks: u32);

    /// Persist any buffered data to the backing file.
    fn file_sync(&mut self);

    /// Whether the loaded codec supports writing (gates `pin_wrprot`).
    fn writable(&self) -> bool;
}

/// Minimal in-memory `Image` used to exercise the flux engines without a
/// real storage-backed codec. Flux samples are queued up front by the
/// test and drained in order by `rdata_flux`.
#[cfg(test)]
pub struct NullImage {
    flux_queue: [u16; 4096],
    flux_head: usize,
    flux_tail: usize,
    pub ticks_since_index: u32,
    pub syncword: u32,
    pub writable: bool,
    pub write_start: Option<u32>,
}

#[cfg(test)]
impl NullImage {
    pub fn new() -> Self {
        NullImage {
            flux_queue: [0; 4096],
            flux_head: 0,
            flux_tail: 0,
            ticks_since_index: 0,
            syncword: 0x4489_4489,
            writable: true,
            write_start: None,
        }
    }

    pub fn push_flux(&mut self, ticks: u16) {
        self.flux_queue[self.flux_tail] = ticks;
        self.flux_tail = (self.flux_tail + 1) % self.flux_queue.len();
    }

    fn flux_queue_empty(&self) -> bool {
        self.flux_head == self.flux_tail
    }
}

#[cfg(test)]
impl Image for NullImage {
    fn open(&mut self, _slot: usize) -> bool {
        true
    }

    fn seek_track(&mut self, _cylinder: u8, _head: u8, _position_ticks: Option<&mut u32>) -> SeekResult {
        SeekResult::Ready
    }

    fn rdata_flux(&mut self, buf: &mut [u16]) -> usize {
        let mut n = 0;
        while n < buf.len() && !self.flux_queue_empty() {
            buf[n] = self.flux_queue[self.flux_head];
            self.flux_head = (self.flux_head + 1) % self.flux_queue.len();
            n += 1;
        }
        n
    }

    fn read_track(&mut self) -> bool {
        !self.flux_queue_empty()
    }

    fn write_track(&mut self, _flush: bool) {}

    fn ticks_since_index(&self) -> u32 {
        self.ticks_since_index
    }

    fn syncword(&self) -> u32 {
        self.syncword
    }

    fn set_write_start(&mut self, ticks: u32) {
        self.write_start = Some(ticks);
    }

    fn file_sync(&mut self) {}

    fn writable(&self) -> bool {
        self.writable
    }
}
