//! Decode table for the polled byte-stream transport
//!
//! Replies carry a fixed log layout: single bytes, little-endian words and
//! status bytes whose bits are individual flags. Temperatures and battery
//! voltage change slowly and are refreshed on their own cadence.

use serde::{Deserialize, Serialize};

use crate::Result;
use crate::types::SignalId;

use super::layout::{Collision, FieldEncoding, FieldLayout, Transform, find_collisions, validate_fields};

/// Receive buffer capacity; replies advertising more payload are rejected.
pub const STREAM_BUFFER_CAPACITY: usize = 128;

/// Request byte asking the ECU for its realtime log block.
pub const REQUEST_BYTE: u8 = b'n';

/// Second reply byte, identifying the realtime log block.
pub const REPLY_MARKER: u8 = 0x32;

/// How often a field is refreshed from the retained buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cadence {
    /// Every successful poll
    Fast,
    /// Only once the slow interval has elapsed, or while RPM is low
    Slow,
}

/// One stream decode rule and its refresh cadence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StreamField {
    pub layout: FieldLayout,
    pub cadence: Cadence,
}

/// Offset-keyed decode table for the retained reply buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamLayout {
    fields: Vec<StreamField>,
    capacity: usize,
}

const fn fast(layout: FieldLayout) -> StreamField {
    StreamField { layout, cadence: Cadence::Fast }
}

const fn slow(layout: FieldLayout) -> StreamField {
    StreamField { layout, cadence: Cadence::Slow }
}

impl Default for StreamLayout {
    fn default() -> Self {
        Self::standard()
    }
}

impl StreamLayout {
    /// The fixed realtime log layout.
    pub fn standard() -> Self {
        use FieldEncoding::*;
        use SignalId::*;

        let celsius = Transform::linear(1.0, -40.0);

        let fields = vec![
            fast(FieldLayout::new(Rpm, 14, U16Le, Transform::RAW)),
            fast(FieldLayout::new(ManifoldPressure, 4, U16Le, Transform::RAW)),
            fast(FieldLayout::new(AirFuelRatio, 10, U8, Transform::scale(0.1))),
            fast(FieldLayout::new(ThrottlePosition, 24, U8, Transform::scale(0.5))),
            fast(FieldLayout::new(IgnitionAdvance, 23, I8, Transform::RAW)),
            fast(FieldLayout::new(FuelPressure, 103, U8, Transform::RAW)),
            fast(FieldLayout::new(VehicleSpeed, 100, U16Le, Transform::RAW)),
            slow(FieldLayout::new(CoolantTemp, 7, U8, celsius)),
            slow(FieldLayout::new(IntakeTemp, 6, U8, celsius)),
            slow(FieldLayout::new(BatteryVoltage, 9, U8, Transform::scale(0.1))),
            fast(FieldLayout::bit(Sync, 31, 7)),
            fast(FieldLayout::bit(AfterStartEnrichment, 2, 2)),
            fast(FieldLayout::bit(WarmUpEnrichment, 2, 3)),
            fast(FieldLayout::bit(RevLimiter, 31, 2)),
            fast(FieldLayout::bit(LaunchControl, 31, 0)),
            fast(FieldLayout::bit(AirConditioning, 122, 1)),
            fast(FieldLayout::bit(Fan, 106, 3)),
            fast(FieldLayout::bit(DecelFuelCut, 1, 4)),
        ];

        Self { fields, capacity: STREAM_BUFFER_CAPACITY }
    }

    /// Build a custom table over a buffer of `capacity` bytes.
    pub fn new(fields: Vec<StreamField>, capacity: usize) -> Result<Self> {
        let layout = Self { fields, capacity };
        layout.validate()?;
        Ok(layout)
    }

    pub fn validate(&self) -> Result<()> {
        validate_fields(self.fields.iter().map(|f| &f.layout), self.capacity, "stream table")
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn fields(&self) -> &[StreamField] {
        &self.fields
    }

    /// Rules refreshed at `cadence`.
    pub fn with_cadence(&self, cadence: Cadence) -> impl Iterator<Item = &FieldLayout> {
        self.fields.iter().filter(move |f| f.cadence == cadence).map(|f| &f.layout)
    }

    /// Every pair of rules reading the same bits.
    pub fn collisions(&self) -> Vec<Collision> {
        let layouts: Vec<FieldLayout> = self.fields.iter().map(|f| f.layout).collect();
        find_collisions(&layouts)
    }

    pub fn decodes(&self, signal: SignalId) -> bool {
        self.fields.iter().any(|f| f.layout.signal == signal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_table_is_valid_and_collision_free() {
        let layout = StreamLayout::standard();
        layout.validate().unwrap();
        assert!(layout.collisions().is_empty());
    }

    #[test]
    fn slow_fields_are_thermal_and_battery() {
        let layout = StreamLayout::standard();
        let slow: Vec<_> = layout.with_cadence(Cadence::Slow).map(|f| f.signal).collect();
        assert_eq!(slow, vec![SignalId::CoolantTemp, SignalId::IntakeTemp, SignalId::BatteryVoltage]);
    }

    #[test]
    fn trigger_errors_have_no_stream_rule() {
        assert!(!StreamLayout::standard().decodes(SignalId::TriggerErrors));
    }

    #[test]
    fn custom_table_must_fit_buffer() {
        let fields = vec![fast(FieldLayout::new(SignalId::Rpm, 15, FieldEncoding::U16Le, Transform::RAW))];
        assert!(StreamLayout::new(fields.clone(), 16).is_err());
        assert!(StreamLayout::new(fields, 17).is_ok());
    }

    #[test]
    fn overlapping_custom_rules_are_reported() {
        let fields = vec![
            fast(FieldLayout::bit(SignalId::AirConditioning, 122, 1)),
            fast(FieldLayout::new(SignalId::FuelPressure, 122, FieldEncoding::U8, Transform::RAW)),
        ];
        let layout = StreamLayout::new(fields, STREAM_BUFFER_CAPACITY).unwrap();
        assert_eq!(layout.collisions().len(), 1);
    }
}
