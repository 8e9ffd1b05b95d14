//! Decode table for the frame-addressed bus transport
//!
//! Numeric fields are 16-bit big-endian words at fixed payload offsets.
//! The indicator frame packs five flags into byte pairs that overlap each
//! other; [`BusLayout::collisions`] reports those overlaps so they are visible
//! at startup instead of silently accepted.

use crate::Result;
use crate::types::{MAX_FRAME_PAYLOAD, SignalId};

use super::layout::{Collision, FieldEncoding, FieldLayout, Transform, find_collisions, validate_fields};

/// Decode rules for one frame identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct BusMessage {
    /// 11-bit frame identifier
    pub identifier: u16,
    pub name: &'static str,
    pub fields: Vec<FieldLayout>,
}

/// Identifier-keyed decode table.
#[derive(Debug, Clone, PartialEq)]
pub struct BusLayout {
    messages: Vec<BusMessage>,
}

const fn word(signal: SignalId, offset: usize, transform: Transform) -> FieldLayout {
    FieldLayout::new(signal, offset, FieldEncoding::U16Be, transform)
}

const fn either(signal: SignalId, first: usize, second: usize) -> FieldLayout {
    FieldLayout::new(signal, first, FieldEncoding::AnyNonZero(second), Transform::Flag)
}

impl Default for BusLayout {
    fn default() -> Self {
        Self::standard()
    }
}

impl BusLayout {
    /// The fixed identifier table broadcast by the ECU.
    pub fn standard() -> Self {
        let tenth = Transform::scale(0.1);
        let kelvin_tenths = Transform::linear(0.1, -273.15);

        let messages = vec![
            BusMessage {
                identifier: 0x360,
                name: "engine_core",
                fields: vec![
                    word(SignalId::Rpm, 0, Transform::RAW),
                    word(SignalId::ManifoldPressure, 2, tenth),
                    word(SignalId::ThrottlePosition, 4, tenth),
                ],
            },
            BusMessage {
                identifier: 0x361,
                name: "fuel_pressure",
                fields: vec![word(SignalId::FuelPressure, 0, Transform::linear(0.1, -101.3))],
            },
            BusMessage {
                identifier: 0x362,
                name: "ignition_angle",
                fields: vec![FieldLayout::new(
                    SignalId::IgnitionAdvance,
                    4,
                    FieldEncoding::I16Be,
                    tenth,
                )],
            },
            BusMessage {
                identifier: 0x368,
                name: "wideband",
                fields: vec![word(SignalId::AirFuelRatio, 0, Transform::scale(14.7 / 1000.0))],
            },
            BusMessage {
                identifier: 0x369,
                name: "trigger_errors",
                fields: vec![word(SignalId::TriggerErrors, 0, Transform::RAW)],
            },
            BusMessage {
                identifier: 0x370,
                name: "vehicle_speed",
                fields: vec![word(SignalId::VehicleSpeed, 0, tenth)],
            },
            BusMessage {
                identifier: 0x372,
                name: "battery",
                fields: vec![word(SignalId::BatteryVoltage, 0, tenth)],
            },
            BusMessage {
                identifier: 0x3E0,
                name: "temperatures",
                fields: vec![
                    word(SignalId::CoolantTemp, 0, kelvin_tenths),
                    word(SignalId::IntakeTemp, 2, kelvin_tenths),
                ],
            },
            BusMessage {
                identifier: 0x3E4,
                name: "indicators",
                fields: vec![
                    either(SignalId::DecelFuelCut, 1, 4),
                    either(SignalId::LaunchControl, 2, 6),
                    either(SignalId::AirConditioning, 3, 4),
                    either(SignalId::Fan, 3, 0),
                    either(SignalId::RevLimiter, 2, 5),
                ],
            },
        ];

        Self { messages }
    }

    /// Build a custom table.
    pub fn new(messages: Vec<BusMessage>) -> Result<Self> {
        let layout = Self { messages };
        layout.validate()?;
        Ok(layout)
    }

    /// Check every message fits an eight-byte payload and no signal is
    /// decoded by two rules anywhere in the table.
    pub fn validate(&self) -> Result<()> {
        for message in &self.messages {
            validate_fields(&message.fields, MAX_FRAME_PAYLOAD, message.name)?;
        }
        validate_fields(self.messages.iter().flat_map(|m| &m.fields), usize::MAX, "bus table")
    }

    /// Rules for a standard identifier, if it is recognized.
    pub fn lookup(&self, identifier: u16) -> Option<&BusMessage> {
        self.messages.iter().find(|message| message.identifier == identifier)
    }

    pub fn messages(&self) -> &[BusMessage] {
        &self.messages
    }

    /// Overlapping rules within each frame, tagged with the frame identifier.
    pub fn collisions(&self) -> Vec<(u16, Collision)> {
        self.messages
            .iter()
            .flat_map(|message| {
                find_collisions(&message.fields).into_iter().map(|c| (message.identifier, c))
            })
            .collect()
    }

    /// Whether any rule writes `signal`.
    pub fn decodes(&self, signal: SignalId) -> bool {
        self.messages.iter().flat_map(|m| &m.fields).any(|field| field.signal == signal)
    }
}
