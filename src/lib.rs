#![doc = include_str ! ("../README.md")]
#![cfg_attr(not(target_arch = "x86_64"), no_std)]

mod dirty;
pub mod error;
pub mod platform;
pub mod record;
mod settings;
mod slot;

pub use settings::{Decoder, Encoder, Settings};
pub use slot::SlotStatus;

extern crate alloc;

use crate::dirty::DirtyTracker;
use crate::error::Error;
use crate::platform::Platform;
use crate::slot::{Geometry, SlotManager};
#[cfg(feature = "defmt")]
use defmt::{debug, warn};

/// Where the in-memory settings came from.
#[derive(strum::Display, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    /// `init` has not run yet
    Unknown,
    /// The settings equal the defaults, either because nothing valid was stored or because the
    /// defaults were restored.
    Factory,
    /// The settings were loaded or saved and differ from the defaults.
    User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SaveOutcome {
    /// Nothing changed since the last load or save, the flash was not touched.
    Clean,
    /// A new record was committed.
    Written { slot: usize, sequence: u32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct StorageStatistics<const SLOTS: usize> {
    /// Slot holding the newest valid record
    pub active: Option<usize>,
    pub slots: [SlotStatus; SLOTS],
}

/// Persists one settings aggregate `S` in `SLOTS` sector-aligned slots of a NOR flash.
///
/// Every save goes to the slot after the active one, so the newest good record is never erased
/// before its successor is complete and the erase cycles are spread over all slots. Flash
/// operations block; call this from the main loop, never from the audio callback.
///
/// The slot count defaults to 2. Spell out the type to get it, e.g.
/// `let storage: SettingsStorage<_, MySettings> = SettingsStorage::new(flash, defaults);`
pub struct SettingsStorage<T: Platform, S: Settings, const SLOTS: usize = 2> {
    pub(crate) hal: T,
    pub(crate) defaults: S,
    pub(crate) settings: S,
    pub(crate) state: State,
    pub(crate) tracker: DirtyTracker<S>,

    // set after calling self.init
    pub(crate) slots: Option<SlotManager<SLOTS>>,
}

impl<T: Platform, S: Settings, const SLOTS: usize> SettingsStorage<T, S, SLOTS> {
    const ROTATES: () = assert!(SLOTS >= 2, "at least two slots are required");

    /// Does not touch the flash. Until `init` is called the settings are the defaults and the
    /// state is `Unknown`.
    pub fn new(hal: T, defaults: S) -> Self {
        let () = Self::ROTATES;

        Self {
            hal,
            settings: defaults.clone(),
            defaults,
            state: State::Unknown,
            tracker: DirtyTracker::new(),
            slots: None,
        }
    }

    /// Scans the slots at `base_offset`, `base_offset + slot_stride`, ... and loads the newest
    /// valid record. Without one the defaults are used and nothing is written.
    ///
    /// Only an invalid geometry is reported as an error. Unreadable, torn, corrupted or
    /// outdated records silently fall back to the defaults so the device always boots.
    pub fn init(&mut self, base_offset: usize, slot_stride: usize) -> Result<State, Error> {
        let geometry =
            Geometry::new::<T, S, SLOTS>(self.hal.capacity(), base_offset, slot_stride)?;
        let mut slots = SlotManager::new(geometry);

        self.settings = match slots.scan::<T, S>(&mut self.hal) {
            Ok(record) => record.settings,
            Err(_e) => {
                #[cfg(feature = "defmt")]
                warn!("init: using defaults: {}", _e);

                #[cfg(feature = "debug-logs")]
                println!("SettingsStorage: init using defaults: {_e:?}");

                self.defaults.clone()
            }
        };

        self.slots = Some(slots);
        self.tracker.snapshot(&self.settings);
        self.state = self.content_state();

        Ok(self.state)
    }

    pub fn settings(&self) -> &S {
        &self.settings
    }

    /// The settings are only persisted by a following `save`.
    pub fn settings_mut(&mut self) -> &mut S {
        &mut self.settings
    }

    pub fn defaults(&self) -> &S {
        &self.defaults
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// True if the settings differ from what was last loaded or saved.
    pub fn is_dirty(&self) -> bool {
        self.tracker.is_dirty(&self.settings)
    }

    /// Writes the settings if they changed since the last load or save. Cheap to call
    /// periodically.
    ///
    /// On error nothing in memory changes and the previously stored record stays the one that
    /// loads on the next boot, so the call can simply be retried.
    pub fn save(&mut self) -> Result<SaveOutcome, Error> {
        if self.slots.is_none() {
            return Err(Error::NotInitialized);
        }

        if !self.is_dirty() {
            return Ok(SaveOutcome::Clean);
        }

        self.commit()
    }

    /// Replaces the settings with the defaults and writes them immediately, even if they are
    /// unchanged. On error the settings stay at the defaults and remain dirty, so a later `save`
    /// persists them.
    pub fn restore_defaults(&mut self) -> Result<SaveOutcome, Error> {
        if self.slots.is_none() {
            return Err(Error::NotInitialized);
        }

        self.settings = self.defaults.clone();
        self.commit()
    }

    /// Replaces the settings with the defaults without writing them.
    pub fn reset_to_defaults(&mut self) {
        self.settings = self.defaults.clone();
    }

    pub fn statistics(&self) -> Result<StorageStatistics<SLOTS>, Error> {
        let slots = self.slots.as_ref().ok_or(Error::NotInitialized)?;

        Ok(StorageStatistics {
            active: slots.active().map(|active| active.index),
            slots: slots.statuses(),
        })
    }

    fn commit(&mut self) -> Result<SaveOutcome, Error> {
        let slots = self.slots.as_mut().ok_or(Error::NotInitialized)?;
        let written = slots.write_next(&mut self.hal, &self.settings)?;

        #[cfg(feature = "defmt")]
        debug!(
            "commit: slot {} sequence {}",
            written.index, written.sequence
        );

        self.tracker.snapshot(&self.settings);
        self.state = self.content_state();

        Ok(SaveOutcome::Written {
            slot: written.index,
            sequence: written.sequence,
        })
    }

    fn content_state(&self) -> State {
        if self.settings == self.defaults {
            State::Factory
        } else {
            State::User
        }
    }
}
