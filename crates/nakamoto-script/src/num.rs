//! Script numbers.
//!
//! Numbers on the stack are little-endian byte strings with the sign carried in the high bit
//! of the last byte. Operands are limited to 4 bytes, results may grow beyond that.

use std::ops::{Add, Neg, Sub};

/// Script number error type.
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum NumError {
    #[error("script number overflow")]
    Overflow,
    #[error("non-minimally encoded script number")]
    NotMinimallyEncoded,
}

/// A numeric type used in Bitcoin Script operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct ScriptNum {
    value: i64,
}

impl<T: Into<i64>> From<T> for ScriptNum {
    fn from(value: T) -> Self {
        Self {
            value: value.into(),
        }
    }
}

impl ScriptNum {
    /// Maximum operand length in bytes for arithmetic opcodes.
    pub const MAX_NUM_SIZE: usize = 4;

    /// Operand length accepted by the lock-time opcodes, wide enough for any `u32` lock time.
    pub const LOCKTIME_NUM_SIZE: usize = 5;

    /// Decodes a stack element, rejecting anything longer than `max_size` bytes.
    pub fn from_bytes(data: &[u8], require_minimal: bool, max_size: usize) -> Result<Self, NumError> {
        if data.len() > max_size {
            return Err(NumError::Overflow);
        }

        let Some((&last, _)) = data.split_last() else {
            return Ok(Self { value: 0 });
        };

        if require_minimal && !Self::is_minimally_encoded(data) {
            return Err(NumError::NotMinimallyEncoded);
        }

        let magnitude = data.iter().enumerate().fold(0i64, |acc, (i, &byte)| {
            acc | i64::from(byte).wrapping_shl(8 * i as u32)
        });

        let value = if last & 0x80 != 0 {
            let sign_bit = 0x80i64.wrapping_shl(8 * (data.len() - 1) as u32);
            -(magnitude & !sign_bit)
        } else {
            magnitude
        };

        Ok(Self { value })
    }

    /// Minimal encoding of the number, zero is the empty vector.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut result = Vec::with_capacity(9);
        let mut magnitude = self.value.unsigned_abs();

        while magnitude != 0 {
            result.push((magnitude & 0xff) as u8);
            magnitude >>= 8;
        }

        let negative = self.value < 0;

        if let Some(last) = result.last_mut() {
            if *last & 0x80 != 0 {
                result.push(if negative { 0x80 } else { 0 });
            } else if negative {
                *last |= 0x80;
            }
        }

        result
    }

    /// Whether `data` is the shortest encoding of its value.
    pub fn is_minimally_encoded(data: &[u8]) -> bool {
        match data {
            [] => true,
            [.., last] if last & 0x7f != 0 => true,
            // A trailing sign byte is only allowed when the previous byte uses its high bit.
            [.., prev, _] => prev & 0x80 != 0,
            [_] => false,
        }
    }

    /// Get the underlying value.
    pub fn value(&self) -> i64 {
        self.value
    }

    pub fn is_zero(&self) -> bool {
        self.value == 0
    }

    pub fn is_negative(&self) -> bool {
        self.value.is_negative()
    }

    pub fn abs(&self) -> Self {
        self.value.wrapping_abs().into()
    }
}

impl std::fmt::Display for ScriptNum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl Add for ScriptNum {
    type Output = Result<Self, NumError>;

    fn add(self, other: Self) -> Result<Self, NumError> {
        self.value
            .checked_add(other.value)
            .map(|value| Self { value })
            .ok_or(NumError::Overflow)
    }
}

impl Sub for ScriptNum {
    type Output = Result<Self, NumError>;

    fn sub(self, other: Self) -> Result<Self, NumError> {
        self.value
            .checked_sub(other.value)
            .map(|value| Self { value })
            .ok_or(NumError::Overflow)
    }
}

impl Neg for ScriptNum {
    type Output = Result<Self, NumError>;

    fn neg(self) -> Result<Self, NumError> {
        self.value
            .checked_neg()
            .map(|value| Self { value })
            .ok_or(NumError::Overflow)
    }
}
