#![allow(dead_code)]

// filename according to https://doc.rust-lang.org/book/ch11-03-test-organization.html
use daisy_settings::{Decoder, Encoder, Settings, SettingsStorage};
use embedded_storage::nor_flash::{
    ErrorType, NorFlash, NorFlashError, NorFlashErrorKind, ReadNorFlash,
};

pub const FLASH_SECTOR_SIZE: usize = 4096;
pub const WORD_SIZE: usize = 4;

pub const MAGIC_START: u32 = 0x5345_5454;
pub const MAGIC_END: u32 = 0x444E_4553;

/// `Synth` record: 12 byte header + 9 byte payload + 4 byte magic end
pub const RECORD_LEN: usize = 25;
/// record length rounded up to `WORD_SIZE`
pub const PROGRAM_LEN: usize = 28;
/// first of the two program writes ends at the word holding the start of magic end
pub const BODY_LEN: usize = 20;

#[derive(Default)]
pub struct Flash {
    pub buf: Vec<u8>,
    pub fail_after_operation: usize,
    /// attempt number that fails exactly once
    pub transient_fault: Option<usize>,
    /// every read, write and erase call, including the failed ones
    pub attempts: usize,
    pub operations: Vec<Operation>,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Operation {
    Read { offset: u32, len: usize },
    Write { offset: u32, len: usize },
    Erase { offset: u32, len: usize },
}

impl Flash {
    pub fn new(sectors: usize) -> Self {
        Self {
            buf: vec![0xffu8; FLASH_SECTOR_SIZE * sectors],
            fail_after_operation: usize::MAX,
            ..Default::default()
        }
    }

    pub fn new_with_fault(sectors: usize, fail_after_operation: usize) -> Self {
        Self {
            buf: vec![0xffu8; FLASH_SECTOR_SIZE * sectors],
            fail_after_operation,
            ..Default::default()
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Lets the next `n` operations succeed and fails every one after.
    pub fn fail_after(&mut self, n: usize) {
        self.fail_after_operation = self.operations.len() + n;
    }

    /// Fails only the call `n` calls from now, the ones before and after succeed.
    pub fn fail_once_after(&mut self, n: usize) {
        self.transient_fault = Some(self.attempts + n);
    }

    pub fn disable_faults(&mut self) {
        self.fail_after_operation = usize::MAX;
        self.transient_fault = None;
    }

    fn fault(&mut self) -> bool {
        let attempt = self.attempts;
        self.attempts += 1;

        if self.operations.len() >= self.fail_after_operation
            || self.transient_fault == Some(attempt)
        {
            println!("    flash: FAULT");
            return true;
        }
        false
    }

    pub fn erases(&self) -> Vec<u32> {
        self.operations
            .iter()
            .filter_map(|op| match op {
                Operation::Erase { offset, .. } => Some(*offset),
                _ => None,
            })
            .collect()
    }

    pub fn writes(&self) -> usize {
        self.operations
            .iter()
            .filter(|op| matches!(op, Operation::Write { .. }))
            .count()
    }

    pub fn dump_operations(&self) {
        println!("Operations:");
        for op in &self.operations {
            println!("  {:?}", op);
        }
    }
}

#[derive(Debug)]
pub struct FlashError;

impl NorFlashError for FlashError {
    fn kind(&self) -> NorFlashErrorKind {
        NorFlashErrorKind::Other
    }
}

impl ErrorType for Flash {
    type Error = FlashError;
}

impl ReadNorFlash for Flash {
    const READ_SIZE: usize = WORD_SIZE;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        assert!(offset.is_multiple_of(Self::READ_SIZE as _));
        assert!(bytes.len().is_multiple_of(Self::READ_SIZE));

        println!(
            "    flash: read:  0x{offset:04X}[0x{:04X}] #{:>2}",
            bytes.len(),
            self.operations.len()
        );
        if self.fault() {
            return Err(FlashError);
        }
        self.operations.push(Operation::Read {
            offset,
            len: bytes.len(),
        });

        let offset = offset as usize;
        bytes.copy_from_slice(&self.buf[offset..offset + bytes.len()]);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.buf.len()
    }
}

impl NorFlash for Flash {
    const WRITE_SIZE: usize = WORD_SIZE;

    const ERASE_SIZE: usize = FLASH_SECTOR_SIZE;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        assert!(from.is_multiple_of(Self::ERASE_SIZE as _));
        assert!(to.is_multiple_of(Self::ERASE_SIZE as _));

        println!(
            "    flash: erase: {from:04X} - {to:04X} #{:>2}",
            self.operations.len()
        );

        if self.fault() {
            return Err(FlashError);
        }

        self.operations.push(Operation::Erase {
            offset: from,
            len: (to - from) as usize,
        });

        for addr in from..to {
            self.buf[addr as usize] = 0xff;
        }
        Ok(())
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        assert!(offset.is_multiple_of(Self::WRITE_SIZE as _));
        assert!(bytes.len().is_multiple_of(Self::WRITE_SIZE));

        println!(
            "    flash: write: 0x{offset:04X}[0x{:04X}] #{:>2}",
            bytes.len(),
            self.operations.len()
        );

        if self.fault() {
            return Err(FlashError);
        }
        assert!(!bytes.is_empty());

        self.operations.push(Operation::Write {
            offset,
            len: bytes.len(),
        });

        let offset = offset as usize;
        for (i, &val) in bytes.iter().enumerate() {
            // NOR flash can only flip bits from 1 to 0
            self.buf[offset + i] &= val;
        }
        Ok(())
    }
}

impl daisy_settings::platform::Crc for Flash {
    fn crc32(init: u32, data: &[u8]) -> u32 {
        unsafe { libz_sys::crc32(init as _, data.as_ptr(), data.len() as u32) as u32 }
    }
}

pub fn crc32(init: u32, data: &[u8]) -> u32 {
    <Flash as daisy_settings::platform::Crc>::crc32(init, data)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Synth {
    pub gain: f32,
    pub freq: f32,
    pub wave: u8,
}

impl Settings for Synth {
    const SIZE: usize = f32::SIZE + f32::SIZE + u8::SIZE;

    fn encode(&self, buf: &mut [u8]) {
        let mut enc = Encoder::new(buf);
        enc.put(&self.gain);
        enc.put(&self.freq);
        enc.put(&self.wave);
    }

    fn decode(buf: &[u8]) -> Option<Self> {
        let mut dec = Decoder::new(buf);
        let synth = Self {
            gain: dec.take()?,
            freq: dec.take()?,
            wave: dec.take()?,
        };
        // only sine, saw, square and triangle exist
        (synth.wave < 4).then_some(synth)
    }
}

pub fn defaults() -> Synth {
    Synth {
        gain: 0.5,
        freq: 440.0,
        wave: 0,
    }
}

/// Settings layout of a later firmware that added a field.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthV2 {
    pub gain: f32,
    pub freq: f32,
    pub wave: u8,
    pub detune: [i16; 2],
}

impl Settings for SynthV2 {
    const SIZE: usize = Synth::SIZE + <[i16; 2]>::SIZE;

    fn encode(&self, buf: &mut [u8]) {
        let mut enc = Encoder::new(buf);
        enc.put(&self.gain);
        enc.put(&self.freq);
        enc.put(&self.wave);
        enc.put(&self.detune);
    }

    fn decode(buf: &[u8]) -> Option<Self> {
        let mut dec = Decoder::new(buf);
        Some(Self {
            gain: dec.take()?,
            freq: dec.take()?,
            wave: dec.take()?,
            detune: dec.take()?,
        })
    }
}

pub fn defaults_v2() -> SynthV2 {
    SynthV2 {
        gain: 0.5,
        freq: 440.0,
        wave: 0,
        detune: [0, 0],
    }
}

/// Two slots of one sector each at offset 0, like a fresh boot.
pub fn boot(flash: &mut Flash) -> SettingsStorage<&mut Flash, Synth> {
    let mut storage: SettingsStorage<&mut Flash, Synth> = SettingsStorage::new(flash, defaults());
    storage
        .init(0, FLASH_SECTOR_SIZE)
        .expect("valid geometry");
    storage
}

/// Builds a record by hand for placing arbitrary content on the flash.
pub fn raw_record(sequence: u32, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&MAGIC_START.to_le_bytes());
    out.extend_from_slice(&sequence.to_le_bytes());
    out.extend_from_slice(&crc32(u32::MAX, payload).to_le_bytes());
    out.extend_from_slice(payload);
    out.extend_from_slice(&MAGIC_END.to_le_bytes());
    out
}

pub fn synth_payload(synth: &Synth) -> Vec<u8> {
    let mut payload = vec![0u8; Synth::SIZE];
    synth.encode(&mut payload);
    payload
}
