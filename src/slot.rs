use crate::error::Error;
use crate::platform::{AlignedOps, Platform};
use crate::record::{self, Record, record_len};
use crate::settings::Settings;
use alloc::vec;
#[cfg(feature = "defmt")]
use defmt::{debug, trace, warn};

/// What a scan or the last commit found in a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SlotStatus {
    /// Every byte of the record area reads as erased, no erase needed before programming.
    Erased,
    /// Holds a record that passed validation.
    Valid { sequence: u32 },
    /// Torn, corrupted, written by a different settings layout, or unreadable.
    Invalid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) struct ActiveSlot {
    pub(crate) index: usize,
    pub(crate) sequence: u32,
}

/// Fixed placement of the slots and the derived lengths of one record.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Geometry {
    base_offset: usize,
    slot_stride: usize,
    /// unpadded record length
    record_len: usize,
    /// record length rounded up to the write size
    program_len: usize,
    /// program length rounded up to the erase size
    erase_len: usize,
}

impl Geometry {
    pub(crate) fn new<T: Platform, S: Settings, const SLOTS: usize>(
        capacity: usize,
        base_offset: usize,
        slot_stride: usize,
    ) -> Result<Self, Error> {
        if !base_offset.is_multiple_of(T::ERASE_SIZE) {
            return Err(Error::InvalidBaseOffset);
        }

        let record_len = record_len::<S>();
        let program_len = T::align_write_ceil(record_len);
        let erase_len = T::align_erase_ceil(program_len);

        if !slot_stride.is_multiple_of(T::ERASE_SIZE) || slot_stride < erase_len {
            return Err(Error::InvalidSlotStride);
        }

        let end = slot_stride
            .checked_mul(SLOTS)
            .and_then(|len| len.checked_add(base_offset))
            .ok_or(Error::InvalidRegionSize)?;
        if end > capacity || end > u32::MAX as usize {
            return Err(Error::InvalidRegionSize);
        }

        Ok(Self {
            base_offset,
            slot_stride,
            record_len,
            program_len,
            erase_len,
        })
    }

    fn address(&self, index: usize) -> u32 {
        (self.base_offset + index * self.slot_stride) as u32
    }
}

/// Owns the slot rotation. Keeps the cached status of every slot in sync with what was
/// committed, so a write never has to re-read the target.
pub(crate) struct SlotManager<const SLOTS: usize> {
    geometry: Geometry,
    slots: [SlotStatus; SLOTS],
    active: Option<ActiveSlot>,
}

impl<const SLOTS: usize> SlotManager<SLOTS> {
    pub(crate) fn new(geometry: Geometry) -> Self {
        Self {
            geometry,
            slots: [SlotStatus::Invalid; SLOTS],
            active: None,
        }
    }

    pub(crate) fn active(&self) -> Option<ActiveSlot> {
        self.active
    }

    pub(crate) fn statuses(&self) -> [SlotStatus; SLOTS] {
        self.slots
    }

    /// Reads every slot and returns the valid record with the highest sequence. A slot that
    /// cannot be read is treated like a corrupted one.
    pub(crate) fn scan<T: Platform, S: Settings>(
        &mut self,
        hal: &mut T,
    ) -> Result<Record<S>, Error> {
        let mut newest: Option<(usize, Record<S>)> = None;
        let mut buf = vec![0u8; T::align_read(self.geometry.program_len)];

        for index in 0..SLOTS {
            let address = self.geometry.address(index);

            #[cfg(feature = "defmt")]
            trace!("scan: slot {} @{:#08x}", index, address);

            if hal.read(address, &mut buf).is_err() {
                #[cfg(feature = "defmt")]
                warn!("scan: slot {} unreadable", index);

                self.slots[index] = SlotStatus::Invalid;
                continue;
            }

            let programmed = &buf[..self.geometry.program_len];
            if record::is_erased(programmed) {
                self.slots[index] = SlotStatus::Erased;
                continue;
            }

            match record::decode::<S>(T::crc32, &programmed[..self.geometry.record_len]) {
                Ok(rec) => {
                    self.slots[index] = SlotStatus::Valid {
                        sequence: rec.sequence,
                    };
                    if newest
                        .as_ref()
                        .is_none_or(|(_, best)| rec.sequence > best.sequence)
                    {
                        newest = Some((index, rec));
                    }
                }
                Err(_e) => {
                    #[cfg(feature = "defmt")]
                    warn!("scan: slot {} rejected: {}", index, _e);

                    #[cfg(feature = "debug-logs")]
                    println!("  slot: scan {index} rejected: {_e:?}");

                    self.slots[index] = SlotStatus::Invalid;
                }
            }
        }

        match newest {
            Some((index, rec)) => {
                #[cfg(feature = "defmt")]
                debug!("scan: active slot {} sequence {}", index, rec.sequence);

                self.active = Some(ActiveSlot {
                    index,
                    sequence: rec.sequence,
                });
                Ok(rec)
            }
            None => {
                self.active = None;
                Err(Error::NoValidSlot)
            }
        }
    }

    /// Commits `settings` to the slot following the active one. The active slot is never
    /// touched, so an interrupted commit leaves the previous record loadable. Without an
    /// active slot, slot 0 counts as active with sequence 0.
    pub(crate) fn write_next<T: Platform, S: Settings>(
        &mut self,
        hal: &mut T,
        settings: &S,
    ) -> Result<ActiveSlot, Error> {
        let (active_index, active_sequence) = self
            .active
            .map_or((0, 0), |active| (active.index, active.sequence));
        let target = ActiveSlot {
            index: (active_index + 1) % SLOTS,
            sequence: active_sequence
                .checked_add(1)
                .ok_or(Error::SequenceExhausted)?,
        };
        let address = self.geometry.address(target.index);
        let bytes = record::encode::<T, S>(target.sequence, settings);

        #[cfg(feature = "defmt")]
        trace!(
            "write_next: slot {} @{:#08x} sequence {}",
            target.index, address, target.sequence
        );

        #[cfg(feature = "debug-logs")]
        println!(
            "  slot: write_next {} @{address:#08x} sequence {}",
            target.index, target.sequence
        );

        let erased = self.slots[target.index] == SlotStatus::Erased;
        // undefined until the record is complete
        self.slots[target.index] = SlotStatus::Invalid;

        if !erased {
            hal.erase(address, address + self.geometry.erase_len as u32)
                .map_err(|_| Error::FlashError)?;
        }

        record::program(hal, address, &bytes, self.geometry.record_len)
            .map_err(|_| Error::FlashError)?;

        self.slots[target.index] = SlotStatus::Valid {
            sequence: target.sequence,
        };
        self.active = Some(target);

        Ok(target)
    }
}
