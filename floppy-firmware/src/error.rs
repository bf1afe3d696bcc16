/// Error kinds the foreground loop can hit. None of these are fatal; a
/// forbidden state combination is a `panic!`, not a variant here.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// DMA consumer overtook the read ring's producer.
    Underrun,
    /// A second write-gate assertion arrived before the write engine went
    /// `Inactive`; the new write is dropped.
    Overrun,
    /// `image_seek_track` reported busy; retry on the next poll.
    SeekBusy,
    /// The image codec failed to open; the drive stays empty.
    ImageOpenFailed,
}
