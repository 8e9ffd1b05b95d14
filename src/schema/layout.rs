//! Field layouts and the generic extraction routine
//!
//! Every decode rule in both wire tables is a [`FieldLayout`]: where the raw
//! bits live, how they are encoded, and how the raw integer becomes a signal
//! value. One routine, [`FieldLayout::extract`], interprets them all.

use serde::{Deserialize, Serialize};

use crate::types::{BitField, SignalId, SignalKind, SignalValue};
use crate::{Result, TelemetryError};

/// How raw bits are laid out in a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldEncoding {
    /// Unsigned byte
    U8,
    /// Two's-complement byte
    I8,
    /// Unsigned 16-bit word, low byte first
    U16Le,
    /// Unsigned 16-bit word, high byte first
    U16Be,
    /// Signed 16-bit word, high byte first
    I16Be,
    /// A single bit of the byte at the field offset
    Bit(u8),
    /// Set when either the byte at the field offset or the byte at the given
    /// offset is non-zero
    AnyNonZero(usize),
}

impl FieldEncoding {
    /// Number of contiguous bytes read starting at the field offset.
    pub const fn size(&self) -> usize {
        match self {
            FieldEncoding::U8 | FieldEncoding::I8 | FieldEncoding::Bit(_) => 1,
            FieldEncoding::AnyNonZero(_) => 1,
            FieldEncoding::U16Le | FieldEncoding::U16Be | FieldEncoding::I16Be => 2,
        }
    }

    /// Read the raw integer at `offset`.
    pub fn read(&self, data: &[u8], offset: usize) -> Result<i64> {
        let byte = |at: usize| data.get(at).copied().ok_or(TelemetryError::Memory { offset: at });

        let raw = match *self {
            FieldEncoding::U8 => byte(offset)? as i64,
            FieldEncoding::I8 => byte(offset)? as i8 as i64,
            FieldEncoding::U16Le => u16::from_le_bytes([byte(offset)?, byte(offset + 1)?]) as i64,
            FieldEncoding::U16Be => u16::from_be_bytes([byte(offset)?, byte(offset + 1)?]) as i64,
            FieldEncoding::I16Be => i16::from_be_bytes([byte(offset)?, byte(offset + 1)?]) as i64,
            FieldEncoding::Bit(bit) => BitField::new(byte(offset)?).is_set(bit) as i64,
            FieldEncoding::AnyNonZero(other) => (byte(offset)? != 0 || byte(other)? != 0) as i64,
        };

        Ok(raw)
    }

    /// Highest byte index touched plus one.
    pub fn end(&self, offset: usize) -> usize {
        match *self {
            FieldEncoding::AnyNonZero(other) => offset.max(other) + 1,
            _ => offset + self.size(),
        }
    }

    /// Every `(byte index, bit mask)` this encoding reads.
    pub fn footprint(&self, offset: usize) -> Vec<(usize, u8)> {
        match *self {
            FieldEncoding::Bit(bit) => vec![(offset, 1u8.checked_shl(bit as u32).unwrap_or(0))],
            FieldEncoding::AnyNonZero(other) => vec![(offset, 0xFF), (other, 0xFF)],
            _ => (offset..offset + self.size()).map(|at| (at, 0xFF)).collect(),
        }
    }
}

/// Conversion from a raw integer to a signal value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Transform {
    /// `raw * scale + offset`
    Linear { scale: f64, offset: f64 },
    /// Non-zero raw reads as set
    Flag,
}

impl Transform {
    pub const RAW: Transform = Transform::Linear { scale: 1.0, offset: 0.0 };

    pub const fn scale(scale: f64) -> Self {
        Transform::Linear { scale, offset: 0.0 }
    }

    pub const fn linear(scale: f64, offset: f64) -> Self {
        Transform::Linear { scale, offset }
    }

    pub fn apply(self, raw: i64) -> SignalValue {
        match self {
            Transform::Linear { scale, offset } => SignalValue::Number(raw as f64 * scale + offset),
            Transform::Flag => SignalValue::Flag(raw != 0),
        }
    }
}

/// One decode rule: a signal, its location, encoding and transform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldLayout {
    pub signal: SignalId,
    pub offset: usize,
    pub encoding: FieldEncoding,
    pub transform: Transform,
}

impl FieldLayout {
    pub const fn new(
        signal: SignalId,
        offset: usize,
        encoding: FieldEncoding,
        transform: Transform,
    ) -> Self {
        Self { signal, offset, encoding, transform }
    }

    /// Shorthand for a single status bit.
    pub const fn bit(signal: SignalId, offset: usize, bit: u8) -> Self {
        Self::new(signal, offset, FieldEncoding::Bit(bit), Transform::Flag)
    }

    /// Decode this field out of `data`.
    pub fn extract(&self, data: &[u8]) -> Result<SignalValue> {
        let raw = self.encoding.read(data, self.offset)?;
        Ok(self.transform.apply(raw))
    }

    pub fn end(&self) -> usize {
        self.encoding.end(self.offset)
    }

    /// Whether two rules read any of the same bits.
    pub fn overlaps(&self, other: &FieldLayout) -> Option<usize> {
        let theirs = other.encoding.footprint(other.offset);
        self.encoding.footprint(self.offset).into_iter().find_map(|(byte, mask)| {
            theirs.iter().any(|&(b, m)| b == byte && (m & mask) != 0).then_some(byte)
        })
    }
}

/// Two decode rules that read overlapping bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Collision {
    pub first: SignalId,
    pub second: SignalId,
    /// First byte both rules read
    pub byte: usize,
}

/// Every pairwise overlap within one set of rules sharing a payload.
pub fn find_collisions(fields: &[FieldLayout]) -> Vec<Collision> {
    let mut collisions = Vec::new();
    for (i, first) in fields.iter().enumerate() {
        for second in &fields[i + 1..] {
            if let Some(byte) = first.overlaps(second) {
                collisions.push(Collision { first: first.signal, second: second.signal, byte });
            }
        }
    }
    collisions
}

/// Check a set of rules sharing a payload of `capacity` bytes.
///
/// Rejects rules that reach past the payload, transforms that do not match
/// the signal kind, and signals with more than one rule.
pub fn validate_fields<'a, I>(fields: I, capacity: usize, context: &str) -> Result<()>
where
    I: IntoIterator<Item = &'a FieldLayout>,
{
    let mut seen = [false; crate::types::SIGNAL_COUNT];

    for field in fields {
        if field.end() > capacity {
            return Err(TelemetryError::Memory { offset: field.end() - 1 });
        }

        let transform_kind = match field.transform {
            Transform::Linear { .. } => SignalKind::Numeric,
            Transform::Flag => SignalKind::Flag,
        };
        if transform_kind != field.signal.kind() {
            return Err(TelemetryError::parse(
                context,
                format!("{:?} uses a {:?} transform", field.signal, transform_kind),
            ));
        }

        if std::mem::replace(&mut seen[field.signal.index()], true) {
            return Err(TelemetryError::parse(
                context,
                format!("{:?} has more than one decode rule", field.signal),
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_words_decode_in_declared_order(value in any::<u16>(), offset in 0usize..16) {
            let mut data = vec![0u8; offset + 2];
            data[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
            prop_assert_eq!(FieldEncoding::U16Le.read(&data, offset).unwrap(), value as i64);

            data[offset..offset + 2].copy_from_slice(&value.to_be_bytes());
            prop_assert_eq!(FieldEncoding::U16Be.read(&data, offset).unwrap(), value as i64);
            prop_assert_eq!(FieldEncoding::I16Be.read(&data, offset).unwrap(), value as i16 as i64);
        }

        #[test]
        fn prop_reads_past_end_fail(len in 0usize..8, offset in 0usize..16) {
            let data = vec![0u8; len];
            let result = FieldEncoding::U16Le.read(&data, offset);
            prop_assert_eq!(result.is_ok(), offset + 2 <= len);
        }
    }

    #[test]
    fn signed_byte_sign_extends() {
        assert_eq!(FieldEncoding::I8.read(&[0xF6], 0).unwrap(), -10);
        assert_eq!(FieldEncoding::U8.read(&[0xF6], 0).unwrap(), 246);
    }

    #[test]
    fn any_non_zero_reads_both_bytes() {
        let encoding = FieldEncoding::AnyNonZero(4);
        assert_eq!(encoding.read(&[0, 0, 0, 0, 0], 1).unwrap(), 0);
        assert_eq!(encoding.read(&[0, 0, 0, 0, 7], 1).unwrap(), 1);
        assert_eq!(encoding.read(&[0, 3, 0, 0, 0], 1).unwrap(), 1);
        assert_eq!(encoding.end(1), 5);
    }

    #[test]
    fn transform_applies_scale_and_offset() {
        assert_eq!(Transform::linear(0.1, -273.15).apply(3631), SignalValue::Number(3631.0 * 0.1 - 273.15));
        assert_eq!(Transform::Flag.apply(2), SignalValue::Flag(true));
        assert_eq!(Transform::RAW.apply(42), SignalValue::Number(42.0));
    }

    #[test]
    fn bits_in_the_same_byte_do_not_collide() {
        let fields = [
            FieldLayout::bit(SignalId::Sync, 31, 7),
            FieldLayout::bit(SignalId::RevLimiter, 31, 2),
            FieldLayout::bit(SignalId::LaunchControl, 31, 0),
        ];
        assert!(find_collisions(&fields).is_empty());
    }

    #[test]
    fn overlapping_rules_are_reported() {
        let fields = [
            FieldLayout::new(SignalId::Rpm, 14, FieldEncoding::U16Le, Transform::RAW),
            FieldLayout::bit(SignalId::Fan, 15, 3),
            FieldLayout::new(SignalId::ThrottlePosition, 20, FieldEncoding::U8, Transform::RAW),
        ];
        let collisions = find_collisions(&fields);
        assert_eq!(
            collisions,
            vec![Collision { first: SignalId::Rpm, second: SignalId::Fan, byte: 15 }]
        );
    }

    #[test]
    fn validation_rejects_bad_rules() {
        let past_end = [FieldLayout::new(SignalId::Rpm, 7, FieldEncoding::U16Be, Transform::RAW)];
        assert!(matches!(validate_fields(&past_end, 8, "test"), Err(TelemetryError::Memory { offset: 8 })));

        let wrong_kind = [FieldLayout::new(SignalId::Fan, 0, FieldEncoding::U8, Transform::RAW)];
        assert!(validate_fields(&wrong_kind, 8, "test").is_err());

        let duplicate = [
            FieldLayout::new(SignalId::Rpm, 0, FieldEncoding::U8, Transform::RAW),
            FieldLayout::new(SignalId::Rpm, 2, FieldEncoding::U8, Transform::RAW),
        ];
        assert!(validate_fields(&duplicate, 8, "test").is_err());
    }
}
