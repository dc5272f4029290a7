/// A fixed-size plain-data aggregate that can be persisted as one record.
///
/// `SIZE` is the exact payload length in bytes and is part of the on-flash format. Changing it
/// (adding or removing a field) invalidates all records written by older firmware, which then
/// fall back to the defaults on the next boot.
///
/// Equality is used for dirty tracking, so derive `PartialEq` to get field-wise comparison.
///
/// ```
/// use daisy_settings::{Decoder, Encoder, Settings};
///
/// #[derive(Clone, PartialEq)]
/// struct Oscillator {
///     gain: f32,
///     freq: f32,
///     wave: u8,
/// }
///
/// impl Settings for Oscillator {
///     const SIZE: usize = f32::SIZE + f32::SIZE + u8::SIZE;
///
///     fn encode(&self, buf: &mut [u8]) {
///         let mut enc = Encoder::new(buf);
///         enc.put(&self.gain);
///         enc.put(&self.freq);
///         enc.put(&self.wave);
///     }
///
///     fn decode(buf: &[u8]) -> Option<Self> {
///         let mut dec = Decoder::new(buf);
///         Some(Self {
///             gain: dec.take()?,
///             freq: dec.take()?,
///             wave: dec.take()?,
///         })
///     }
/// }
/// ```
pub trait Settings: Clone + PartialEq {
    const SIZE: usize;

    /// Serializes into `buf`, which is exactly `SIZE` bytes long.
    fn encode(&self, buf: &mut [u8]);

    /// Deserializes from `buf`, which is exactly `SIZE` bytes long. Returns `None` for content
    /// that is not a legal value of the type, e.g. an out of range enum discriminant.
    fn decode(buf: &[u8]) -> Option<Self>;
}

macro_rules! impl_settings_le {
    ($($t:ty),*) => {
        $(
            impl Settings for $t {
                const SIZE: usize = size_of::<$t>();

                fn encode(&self, buf: &mut [u8]) {
                    buf.copy_from_slice(&self.to_le_bytes());
                }

                fn decode(buf: &[u8]) -> Option<Self> {
                    Some(<$t>::from_le_bytes(buf.try_into().ok()?))
                }
            }
        )*
    };
}

impl_settings_le!(u8, u16, u32, u64, i8, i16, i32, i64, f32, f64);

impl Settings for bool {
    const SIZE: usize = 1;

    fn encode(&self, buf: &mut [u8]) {
        buf[0] = *self as u8;
    }

    fn decode(buf: &[u8]) -> Option<Self> {
        match buf {
            [0] => Some(false),
            [1] => Some(true),
            _ => None,
        }
    }
}

impl<T: Settings + Copy + Default, const N: usize> Settings for [T; N] {
    const SIZE: usize = T::SIZE * N;

    fn encode(&self, buf: &mut [u8]) {
        let mut enc = Encoder::new(buf);
        for item in self {
            enc.put(item);
        }
    }

    fn decode(buf: &[u8]) -> Option<Self> {
        let mut dec = Decoder::new(buf);
        let mut out = [T::default(); N];
        for item in &mut out {
            *item = dec.take()?;
        }
        Some(out)
    }
}

/// Writes fields back to back into a payload buffer.
pub struct Encoder<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> Encoder<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Panics if the field does not fit, which means `SIZE` is wrong.
    pub fn put<V: Settings>(&mut self, value: &V) {
        let end = self.pos + V::SIZE;
        value.encode(&mut self.buf[self.pos..end]);
        self.pos = end;
    }

    /// Number of bytes written so far
    pub fn position(&self) -> usize {
        self.pos
    }
}

/// Reads fields back to back from a payload buffer.
pub struct Decoder<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn take<V: Settings>(&mut self) -> Option<V> {
        let end = self.pos.checked_add(V::SIZE)?;
        let value = V::decode(self.buf.get(self.pos..end)?)?;
        self.pos = end;
        Some(value)
    }

    pub fn position(&self) -> usize {
        self.pos
    }
}
