//! Kademlia node Id or a lookup target
use rand::Rng;
use std::{
    convert::TryFrom,
    fmt::{self, Debug, Display, Formatter},
};

use crate::{Error, Result};

/// The size of node IDs in bytes.
pub const ID_SIZE: usize = 20;
/// The size of node IDs in bits, which is also the maximum [Id::distance].
pub const MAX_DISTANCE: u8 = ID_SIZE as u8 * 8;

#[derive(Clone, Copy, PartialEq, Ord, PartialOrd, Eq, Hash, Default)]
/// Kademlia node Id or a lookup target.
///
/// A 160 bit unsigned integer encoded in big-endian, so the derived
/// lexicographic [Ord] is also the numeric order.
pub struct Id([u8; ID_SIZE]);

impl Id {
    /// The all-zero Id.
    pub const ZERO: Id = Id([0; ID_SIZE]);
    /// The all-ones Id, farther from [Id::ZERO] than any other Id.
    pub const MAX: Id = Id([u8::MAX; ID_SIZE]);

    pub fn random() -> Id {
        let mut rng = rand::thread_rng();
        let random_bytes: [u8; ID_SIZE] = rng.gen();

        Id(random_bytes)
    }

    /// Create a new Id from some bytes. Returns Err if `bytes` is not of length
    /// [ID_SIZE](crate::ID_SIZE).
    pub fn from_bytes<T: AsRef<[u8]>>(bytes: T) -> Result<Id> {
        let bytes = bytes.as_ref();
        if bytes.len() != ID_SIZE {
            return Err(Error::InvalidIdSize(bytes.len()));
        }

        let mut tmp: [u8; ID_SIZE] = [0; ID_SIZE];
        tmp.copy_from_slice(bytes);

        Ok(Id(tmp))
    }

    /// XOR metric between this Id and another.
    ///
    /// Symmetric, zero only for equal Ids, and its own inverse:
    /// `a.xor(&b).xor(&b) == a`.
    pub fn xor(&self, other: &Id) -> Id {
        let mut result = [0_u8; ID_SIZE];

        for (i, byte) in result.iter_mut().enumerate() {
            *byte = self.0[i] ^ other.0[i];
        }

        Id(result)
    }

    /// Simplified XOR distance between this Id and a target Id.
    ///
    /// The distance is the number of trailing non zero bits in the XOR result.
    ///
    /// Distance to self is 0
    /// Distance to the furthest Id is 160
    /// Distance to an Id with 5 leading matching bits is 155
    pub fn distance(&self, other: &Id) -> u8 {
        self.xor(other).bit_len() as u8
    }

    /// Index of the highest set bit plus one, or 0 for [Id::ZERO].
    pub fn bit_len(&self) -> usize {
        for (i, byte) in self.0.iter().enumerate() {
            if *byte != 0 {
                return (ID_SIZE - i) * 8 - byte.leading_zeros() as usize;
            }
        }

        0
    }

    /// Returns the bit at `index`, where index 0 is the most significant bit.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not less than [MAX_DISTANCE].
    pub fn bit(&self, index: usize) -> bool {
        assert_bit_index(index);

        self.0[index / 8] & (0x80 >> (index % 8)) != 0
    }

    /// Sets the bit at `index`, where index 0 is the most significant bit.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not less than [MAX_DISTANCE].
    pub fn set_bit(&mut self, index: usize, value: bool) {
        assert_bit_index(index);

        let mask = 0x80 >> (index % 8);
        if value {
            self.0[index / 8] |= mask;
        } else {
            self.0[index / 8] &= !mask;
        }
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    pub fn as_bytes(&self) -> &[u8; ID_SIZE] {
        &self.0
    }

    pub fn to_bytes(&self) -> [u8; ID_SIZE] {
        self.0
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }
}

fn assert_bit_index(index: usize) {
    assert!(
        index < MAX_DISTANCE as usize,
        "bit index {} out of range for a {} bit Id",
        index,
        MAX_DISTANCE
    );
}

impl From<[u8; ID_SIZE]> for Id {
    fn from(bytes: [u8; ID_SIZE]) -> Self {
        Id(bytes)
    }
}

impl TryFrom<&[u8]> for Id {
    type Error = Error;

    fn try_from(bytes: &[u8]) -> Result<Self> {
        Id::from_bytes(bytes)
    }
}

impl Display for Id {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }

        Ok(())
    }
}

impl Debug for Id {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Id {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serde::Serialize::serialize(serde_bytes::Bytes::new(&self.0), serializer)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Id {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let bytes: serde_bytes::ByteBuf = serde::Deserialize::deserialize(deserializer)?;

        Id::from_bytes(bytes).map_err(serde::de::Error::custom)
    }
}
