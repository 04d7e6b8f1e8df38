//! Small integers stored directly in a tagged word

use std::fmt;

use serde::Serialize;

use crate::error::TaggedError;

/// Smi - a 31-bit signed integer that lives in the word itself
///
/// The payload sits in bits 1..32 with bit 0 clear. Only the low 32 bits of a
/// word are meaningful for a Smi, so a compressed slot round-trips it exactly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Smi(i32);

impl Smi {
    pub const BITS: u32 = 31;
    pub const MIN_VALUE: i32 = -(1 << 30);
    pub const MAX_VALUE: i32 = (1 << 30) - 1;
    pub const ZERO: Smi = Smi(0);

    /// Create a Smi, panicking if `value` is out of range
    ///
    /// Range checking is the caller's job; use [`Smi::try_new`] for the
    /// checked form.
    pub fn new(value: i32) -> Self {
        assert!(
            Self::is_valid(value as i64),
            "{} does not fit in a {}-bit Smi",
            value,
            Self::BITS
        );
        Smi(value)
    }

    /// Create a Smi if `value` is in range
    pub fn try_new(value: i64) -> Option<Self> {
        if Self::is_valid(value) {
            Some(Smi(value as i32))
        } else {
            None
        }
    }

    /// Check if `value` fits the Smi range
    #[inline]
    pub const fn is_valid(value: i64) -> bool {
        value >= Self::MIN_VALUE as i64 && value <= Self::MAX_VALUE as i64
    }

    #[inline]
    pub const fn value(self) -> i32 {
        self.0
    }

    /// Word encoding, sign-extended to the full machine word
    #[inline]
    pub(crate) const fn to_word(self) -> usize {
        ((self.0 as isize) << 1) as usize
    }

    /// Decode from any word with a clear Smi tag bit
    #[inline]
    pub(crate) const fn from_word(word: usize) -> Self {
        Smi((word as u32 as i32) >> 1)
    }
}

impl TryFrom<i64> for Smi {
    type Error = TaggedError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Smi::try_new(value).ok_or(TaggedError::SmiOutOfRange { value })
    }
}

impl fmt::Display for Smi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_encoding() {
        assert_eq!(Smi::new(0).to_word(), 0);
        assert_eq!(Smi::new(1).to_word(), 2);
        assert_eq!(Smi::new(-1).to_word(), usize::MAX - 1);
    }

    #[test]
    fn test_limits_round_trip() {
        for value in [Smi::MIN_VALUE, -1, 0, 1, Smi::MAX_VALUE] {
            let smi = Smi::new(value);
            assert_eq!(Smi::from_word(smi.to_word()), smi);
            assert_eq!(smi.to_word() & 1, 0);
        }
    }

    #[test]
    fn test_try_new_range() {
        assert!(Smi::try_new(Smi::MAX_VALUE as i64).is_some());
        assert!(Smi::try_new(Smi::MAX_VALUE as i64 + 1).is_none());
        assert!(Smi::try_new(Smi::MIN_VALUE as i64 - 1).is_none());
        assert_eq!(
            Smi::try_from(1i64 << 40),
            Err(TaggedError::SmiOutOfRange { value: 1 << 40 })
        );
    }

    #[test]
    #[should_panic(expected = "does not fit")]
    fn test_new_out_of_range_panics() {
        Smi::new(i32::MAX);
    }

    #[test]
    fn test_decode_ignores_upper_half() {
        let word = Smi::new(-7).to_word() & 0xFFFF_FFFF;
        assert_eq!(Smi::from_word(word).value(), -7);
    }
}
