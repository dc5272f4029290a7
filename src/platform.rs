use embedded_storage::nor_flash::NorFlash;

/// See README.md for an example implementation.
pub trait Platform: Crc + NorFlash {}

impl<T: Crc + NorFlash> Platform for T {}

pub type FnCrc32 = fn(init: u32, data: &[u8]) -> u32;

/// CRC-32 (IEEE) with zlib style chaining: `crc32(crc32(init, a), b) == crc32(init, a ++ b)`
pub trait Crc {
    fn crc32(init: u32, data: &[u8]) -> u32;
}

impl<T: Crc> Crc for &mut T {
    fn crc32(init: u32, data: &[u8]) -> u32 {
        T::crc32(init, data)
    }
}

pub trait AlignedOps: Platform {
    fn align_read(size: usize) -> usize {
        align_ceil(size, Self::READ_SIZE)
    }

    fn align_write_ceil(size: usize) -> usize {
        align_ceil(size, Self::WRITE_SIZE)
    }

    fn align_write_floor(size: usize) -> usize {
        align_floor(size, Self::WRITE_SIZE)
    }

    fn align_erase_ceil(size: usize) -> usize {
        align_ceil(size, Self::ERASE_SIZE)
    }
}

#[inline(always)]
const fn align_ceil(size: usize, alignment: usize) -> usize {
    if alignment.is_power_of_two() {
        size.saturating_add(alignment - 1) & !(alignment - 1)
    } else {
        size.saturating_add(alignment - 1) / alignment * alignment
    }
}

#[inline(always)]
const fn align_floor(size: usize, alignment: usize) -> usize {
    if alignment.is_power_of_two() {
        size & !(alignment - 1)
    } else {
        size / alignment * alignment
    }
}

impl<T: Platform> AlignedOps for T {}

#[cfg(feature = "software-crc")]
mod software {
    use crate::platform::Crc;
    use embedded_storage::nor_flash::{ErrorType, NorFlash, ReadNorFlash};

    /// Wraps any NOR flash and computes the record checksum in software. Use it on targets
    /// where no CRC peripheral is wired up.
    pub struct SoftwareCrc<F> {
        inner: F,
    }

    impl<F> SoftwareCrc<F> {
        pub fn new(inner: F) -> Self {
            Self { inner }
        }

        pub fn into_inner(self) -> F {
            self.inner
        }
    }

    impl<F: ErrorType> ErrorType for SoftwareCrc<F> {
        type Error = F::Error;
    }

    impl<F: ReadNorFlash> ReadNorFlash for SoftwareCrc<F> {
        const READ_SIZE: usize = F::READ_SIZE;

        fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
            self.inner.read(offset, bytes)
        }

        fn capacity(&self) -> usize {
            self.inner.capacity()
        }
    }

    impl<F: NorFlash> NorFlash for SoftwareCrc<F> {
        const WRITE_SIZE: usize = F::WRITE_SIZE;
        const ERASE_SIZE: usize = F::ERASE_SIZE;

        fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
            self.inner.erase(from, to)
        }

        fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
            self.inner.write(offset, bytes)
        }
    }

    impl<F> Crc for SoftwareCrc<F> {
        fn crc32(init: u32, data: &[u8]) -> u32 {
            let mut hasher = crc32fast::Hasher::new_with_initial(init);
            hasher.update(data);
            hasher.finalize()
        }
    }
}

#[cfg(feature = "software-crc")]
pub use software::*;
