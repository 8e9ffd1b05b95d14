//! Canonical signal identifiers and values

use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether a signal carries a number or an on/off flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalKind {
    Numeric,
    Flag,
}

/// Every engine signal the dashboard knows how to decode.
///
/// The discriminants are the stable signal codes used by persisted panel
/// configuration: numeric signals occupy 0..=10, indicators 11..=18.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum SignalId {
    IntakeTemp = 0,
    CoolantTemp = 1,
    AirFuelRatio = 2,
    IgnitionAdvance = 3,
    TriggerErrors = 4,
    ThrottlePosition = 5,
    BatteryVoltage = 6,
    ManifoldPressure = 7,
    Rpm = 8,
    FuelPressure = 9,
    VehicleSpeed = 10,
    Sync = 11,
    Fan = 12,
    AfterStartEnrichment = 13,
    WarmUpEnrichment = 14,
    RevLimiter = 15,
    LaunchControl = 16,
    AirConditioning = 17,
    DecelFuelCut = 18,
}

/// Number of distinct signals.
pub const SIGNAL_COUNT: usize = 19;

impl SignalId {
    /// All signals in code order.
    pub const ALL: [SignalId; SIGNAL_COUNT] = [
        SignalId::IntakeTemp,
        SignalId::CoolantTemp,
        SignalId::AirFuelRatio,
        SignalId::IgnitionAdvance,
        SignalId::TriggerErrors,
        SignalId::ThrottlePosition,
        SignalId::BatteryVoltage,
        SignalId::ManifoldPressure,
        SignalId::Rpm,
        SignalId::FuelPressure,
        SignalId::VehicleSpeed,
        SignalId::Sync,
        SignalId::Fan,
        SignalId::AfterStartEnrichment,
        SignalId::WarmUpEnrichment,
        SignalId::RevLimiter,
        SignalId::LaunchControl,
        SignalId::AirConditioning,
        SignalId::DecelFuelCut,
    ];

    /// Look up a signal by its persisted code.
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    /// Stable persisted code.
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Index into fixed-size per-signal arrays.
    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn kind(self) -> SignalKind {
        if (self as u8) < SignalId::Sync as u8 { SignalKind::Numeric } else { SignalKind::Flag }
    }

    pub const fn is_flag(self) -> bool {
        matches!(self.kind(), SignalKind::Flag)
    }

    /// Value a signal holds before anything has been decoded.
    pub const fn initial_value(self) -> SignalValue {
        match self.kind() {
            SignalKind::Numeric => SignalValue::Number(0.0),
            SignalKind::Flag => SignalValue::Flag(false),
        }
    }
}

impl fmt::Display for SignalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(crate::schema::signal_info(*self).label)
    }
}

/// Decoded value of one signal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SignalValue {
    Number(f64),
    Flag(bool),
}

impl SignalValue {
    /// Numeric view; flags read as 0.0 / 1.0.
    pub fn as_f64(self) -> f64 {
        match self {
            SignalValue::Number(value) => value,
            SignalValue::Flag(true) => 1.0,
            SignalValue::Flag(false) => 0.0,
        }
    }

    /// Flag view; numbers read as set when non-zero.
    pub fn as_bool(self) -> bool {
        match self {
            SignalValue::Number(value) => value != 0.0,
            SignalValue::Flag(flag) => flag,
        }
    }

    pub fn kind(self) -> SignalKind {
        match self {
            SignalValue::Number(_) => SignalKind::Numeric,
            SignalValue::Flag(_) => SignalKind::Flag,
        }
    }
}
