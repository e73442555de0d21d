use num_bigint::BigUint;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::VALUES_PER_TUPLE;
use crate::crypto::CipherTuple;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PackError {
    #[error("value width must be non-zero")]
    ZeroWidth,
    #[error("tuple {tuple} value {field} needs {bits} bits, slot is {width}")]
    Overflow {
        tuple: usize,
        field: usize,
        bits: u64,
        width: usize,
    },
}

/// Where a bit of the stream came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitLocation {
    /// Index of the ciphertext tuple (input record order).
    pub tuple: usize,
    /// 0 = C1.x, 1 = C1.y, 2 = C2.
    pub field: usize,
    /// Offset within the value, 0 being the most significant bit of the slot.
    pub offset: usize,
}

/// Immutable, MSB-first serialization of a sequence of ciphertext tuples.
///
/// Each value occupies exactly `width` bits, zero-padded on the left. Bits are
/// stored packed eight to a byte, most significant first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitstream {
    data: Vec<u8>,
    len: usize,
    width: usize,
}

impl Bitstream {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Bit at `index`, or `None` past the end.
    pub fn bit(&self, index: usize) -> Option<u8> {
        if index >= self.len {
            return None;
        }
        let byte = self.data[index / 8];
        Some((byte >> (7 - (index % 8))) & 1)
    }

    /// Map a bit index back to its tuple, value and in-value offset.
    pub fn locate(&self, index: usize) -> Option<BitLocation> {
        if index >= self.len {
            return None;
        }
        let per_tuple = VALUES_PER_TUPLE * self.width;
        Some(BitLocation {
            tuple: index / per_tuple,
            field: (index % per_tuple) / self.width,
            offset: index % self.width,
        })
    }

    /// SHA-256 over the packed bytes, hex encoded.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update((self.len as u64).to_be_bytes());
        hasher.update(&self.data);
        format!("{:x}", hasher.finalize())
    }
}

/// Flatten tuples into a bitstream: tuple order, then `c1x, c1y, c2`, then
/// `width` bits per value from the most significant down.
pub fn pack(tuples: &[CipherTuple], width: usize) -> Result<Bitstream, PackError> {
    if width == 0 {
        return Err(PackError::ZeroWidth);
    }

    let len = tuples.len() * VALUES_PER_TUPLE * width;
    let mut data = vec![0u8; len.div_ceil(8)];
    let mut bit_index = 0usize;

    for (t, tuple) in tuples.iter().enumerate() {
        for (field, value) in tuple.values().into_iter().enumerate() {
            check_fits(value, width, t, field)?;
            for offset in 0..width {
                if value.bit((width - 1 - offset) as u64) {
                    data[bit_index / 8] |= 1 << (7 - (bit_index % 8));
                }
                bit_index += 1;
            }
        }
    }

    Ok(Bitstream { data, len, width })
}

fn check_fits(value: &BigUint, width: usize, tuple: usize, field: usize) -> Result<(), PackError> {
    let bits = value.bits();
    if bits > width as u64 {
        return Err(PackError::Overflow {
            tuple,
            field,
            bits,
            width,
        });
    }
    Ok(())
}

/// A forward-only position in a [`Bitstream`], shared by every frame and video
/// of one embedding run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BitCursor {
    position: usize,
}

impl BitCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn is_exhausted(&self, stream: &Bitstream) -> bool {
        self.position >= stream.len()
    }

    /// Take the next bit and advance; `None` once the stream is drained.
    pub fn next_bit(&mut self, stream: &Bitstream) -> Option<u8> {
        let bit = stream.bit(self.position)?;
        self.position += 1;
        Some(bit)
    }

    pub fn remaining(&self, stream: &Bitstream) -> usize {
        stream.len().saturating_sub(self.position)
    }
}
