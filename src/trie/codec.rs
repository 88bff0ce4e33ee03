//! Key-unit codecs: how a byte key becomes a path of child slots, and how a
//! path becomes a key again.

use smallvec::SmallVec;

/// Key assembled during a traversal. Keys up to 64 bytes stay inline.
pub type KeyBuf = SmallVec<[u8; 64]>;

/// Byte-to-slot conversion of a [`ByteTrie`](crate::ByteTrie).
pub type Convert = fn(u8) -> usize;

/// Splits keys into units, maps units to child slots and reassembles keys.
pub trait KeyCodec {
    /// Child slots per node.
    fn alphabet_size(&self) -> usize;

    /// Child slot for `unit`, or `None` if it lies outside the alphabet.
    fn slot(&self, unit: u8) -> Option<u8>;

    /// Units of `key` in path order.
    fn units(&self, key: &[u8]) -> impl Iterator<Item = u8>;

    /// Appends the unit found at `position` on the path.
    fn push_unit(&self, key: &mut KeyBuf, position: usize, unit: u8);

    /// Removes the unit appended at `position`.
    fn pop_unit(&self, key: &mut KeyBuf, position: usize);
}

/// One unit per byte, slot chosen by a conversion function.
#[derive(Clone, Copy, Debug)]
pub struct ByteCodec {
    alphabet_size: usize,
    convert: Convert,
}

impl ByteCodec {
    pub(crate) const fn new(alphabet_size: usize, convert: Convert) -> Self {
        Self {
            alphabet_size,
            convert,
        }
    }
}

impl KeyCodec for ByteCodec {
    fn alphabet_size(&self) -> usize {
        self.alphabet_size
    }

    fn slot(&self, unit: u8) -> Option<u8> {
        let slot = (self.convert)(unit);
        if slot < self.alphabet_size {
            u8::try_from(slot).ok()
        } else {
            None
        }
    }

    fn units(&self, key: &[u8]) -> impl Iterator<Item = u8> {
        key.iter().copied()
    }

    fn push_unit(&self, key: &mut KeyBuf, _position: usize, unit: u8) {
        key.push(unit);
    }

    fn pop_unit(&self, key: &mut KeyBuf, _position: usize) {
        key.pop();
    }
}

/// Identity conversion for a full 256-symbol alphabet.
#[must_use]
pub const fn identity(byte: u8) -> usize {
    byte as usize
}

/// Two units per byte: the low nibble, then the high nibble.
#[derive(Clone, Copy, Debug, Default)]
pub struct NibbleCodec;

/// Children per nibble node.
pub const NIBBLE_FANOUT: usize = 16;

impl KeyCodec for NibbleCodec {
    fn alphabet_size(&self) -> usize {
        NIBBLE_FANOUT
    }

    fn slot(&self, unit: u8) -> Option<u8> {
        (usize::from(unit) < NIBBLE_FANOUT).then_some(unit)
    }

    fn units(&self, key: &[u8]) -> impl Iterator<Item = u8> {
        key.iter().flat_map(|&byte| [byte & 0x0F, byte >> 4])
    }

    fn push_unit(&self, key: &mut KeyBuf, position: usize, unit: u8) {
        if position % 2 == 0 {
            key.push(unit);
        } else if let Some(last) = key.last_mut() {
            *last |= unit << 4;
        }
    }

    fn pop_unit(&self, key: &mut KeyBuf, position: usize) {
        if position % 2 == 0 {
            key.pop();
        } else if let Some(last) = key.last_mut() {
            *last &= 0x0F;
        }
    }
}
