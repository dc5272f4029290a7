use thiserror::Error;

/// Errors that can occur during settings storage operations. Marked as non-exhaustive to allow
/// for future additions without breaking the API. `CorruptRecord`, `NoValidSlot` and
/// `SizeMismatch` classify slots while scanning and are never returned by the public API, a
/// device with such slots boots with the defaults.
#[derive(Error, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum Error {
    /// The base offset has to be aligned to the erase size of the flash
    #[error("invalid base offset")]
    InvalidBaseOffset,

    /// The slot stride has to be a multiple of the erase size and large enough for one record
    #[error("invalid slot stride")]
    InvalidSlotStride,

    /// All slots together have to fit into the flash capacity
    #[error("invalid region size")]
    InvalidRegionSize,

    /// `init` has not been called yet
    #[error("storage not initialized")]
    NotInitialized,

    /// The internal error value is returned from the provided flash on erase, program or read
    #[error("internal flash error")]
    FlashError,

    /// A magic value or the payload checksum did not match
    #[error("corrupt record")]
    CorruptRecord,

    /// No slot holds a valid record. Either a fresh device or every slot was corrupted.
    #[error("no valid slot")]
    NoValidSlot,

    /// The record length does not match the compile-time size of the settings type
    #[error("record size mismatch")]
    SizeMismatch,

    /// The sequence counter reached `u32::MAX`
    #[error("sequence exhausted")]
    SequenceExhausted,
}
