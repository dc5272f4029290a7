use crate::error::Error;
use crate::platform::{AlignedOps, FnCrc32, Platform};
use crate::settings::Settings;
use alloc::vec;
use alloc::vec::Vec;
#[cfg(feature = "defmt")]
use defmt::trace;

pub const MAGIC_START: u32 = 0x5345_5454;
pub const MAGIC_END: u32 = 0x444E_4553;

/// `magic_start`, `sequence` and `checksum`
pub const HEADER_SIZE: usize = 12;
/// `magic_end`
pub const TRAILER_SIZE: usize = 4;

const SEQUENCE_OFFSET: usize = 4;
const CHECKSUM_OFFSET: usize = 8;

/// Unpadded length of a record holding `S`.
pub const fn record_len<S: Settings>() -> usize {
    HEADER_SIZE + S::SIZE + TRAILER_SIZE
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Record<S> {
    pub(crate) sequence: u32,
    pub(crate) settings: S,
}

pub(crate) fn checksum(crc32: FnCrc32, payload: &[u8]) -> u32 {
    crc32(u32::MAX, payload)
}

/// Serializes a record and pads it with erased bytes up to the write alignment of the flash.
pub(crate) fn encode<T: Platform, S: Settings>(sequence: u32, settings: &S) -> Vec<u8> {
    let len = record_len::<S>();
    let mut buf = vec![0xFFu8; T::align_write_ceil(len)];

    let payload = &mut buf[HEADER_SIZE..HEADER_SIZE + S::SIZE];
    settings.encode(payload);
    let crc = checksum(T::crc32, payload);

    buf[..SEQUENCE_OFFSET].copy_from_slice(&MAGIC_START.to_le_bytes());
    buf[SEQUENCE_OFFSET..CHECKSUM_OFFSET].copy_from_slice(&sequence.to_le_bytes());
    buf[CHECKSUM_OFFSET..HEADER_SIZE].copy_from_slice(&crc.to_le_bytes());
    buf[len - TRAILER_SIZE..len].copy_from_slice(&MAGIC_END.to_le_bytes());

    buf
}

/// `bytes` has to be the unpadded record, i.e. exactly `record_len::<S>()` long.
pub(crate) fn decode<S: Settings>(crc32: FnCrc32, bytes: &[u8]) -> Result<Record<S>, Error> {
    if bytes.len() != record_len::<S>() {
        return Err(Error::SizeMismatch);
    }

    let (header, rest) = bytes.split_at(HEADER_SIZE);
    let (payload, trailer) = rest.split_at(S::SIZE);

    if read_u32(header, 0) != MAGIC_START || read_u32(trailer, 0) != MAGIC_END {
        return Err(Error::CorruptRecord);
    }

    if checksum(crc32, payload) != read_u32(header, CHECKSUM_OFFSET) {
        return Err(Error::CorruptRecord);
    }

    let settings = S::decode(payload).ok_or(Error::CorruptRecord)?;

    Ok(Record {
        sequence: read_u32(header, SEQUENCE_OFFSET),
        settings,
    })
}

/// Programs an encoded record so that `magic_end` is part of the last write. Writes are only
/// atomic per write unit, so everything up to the write unit holding the start of `magic_end` goes
/// first and the tail follows in a second write.
pub(crate) fn program<T: Platform>(
    hal: &mut T,
    offset: u32,
    bytes: &[u8],
    record_len: usize,
) -> Result<(), T::Error> {
    #[cfg(feature = "defmt")]
    trace!("program @{:#08x}: [{}]", offset, bytes.len());

    let pivot = T::align_write_floor(record_len - TRAILER_SIZE);
    let (body, tail) = bytes.split_at(pivot);

    if !body.is_empty() {
        hal.write(offset, body)?;
    }

    #[cfg(feature = "debug-logs")]
    println!("  record: program tail @{:#08x}", offset + pivot as u32);

    hal.write(offset + pivot as u32, tail)
}

/// True if `bytes` is still in the erased state and can be programmed without an erase.
pub(crate) fn is_erased(bytes: &[u8]) -> bool {
    bytes.iter().all(|&b| b == 0xFF)
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_le_bytes(raw)
}
