//! Presentation metadata for each signal

use crate::render::ColorHint;
use crate::types::{SIGNAL_COUNT, SignalId, SignalValue};

/// Static description of one signal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalInfo {
    pub id: SignalId,
    /// Short label shown next to the value
    pub label: &'static str,
    /// Unit suffix, empty for dimensionless values and flags
    pub unit: &'static str,
    /// Decimal places used when no panel configuration overrides it
    pub default_decimals: u8,
    pub description: &'static str,
}

const fn info(
    id: SignalId,
    label: &'static str,
    unit: &'static str,
    default_decimals: u8,
    description: &'static str,
) -> SignalInfo {
    SignalInfo { id, label, unit, default_decimals, description }
}

static SIGNALS: [SignalInfo; SIGNAL_COUNT] = [
    info(SignalId::IntakeTemp, "IAT", "°C", 0, "Intake air temperature"),
    info(SignalId::CoolantTemp, "Coolant", "°C", 0, "Coolant temperature"),
    info(SignalId::AirFuelRatio, "AFR", "", 1, "Air/fuel ratio"),
    info(SignalId::IgnitionAdvance, "ADV", "°", 0, "Ignition advance"),
    info(SignalId::TriggerErrors, "Trigger", "", 0, "Trigger system error count"),
    info(SignalId::ThrottlePosition, "TPS", "%", 0, "Throttle position"),
    info(SignalId::BatteryVoltage, "Voltage", "V", 1, "Battery voltage"),
    info(SignalId::ManifoldPressure, "MAP", "kPa", 0, "Manifold absolute pressure"),
    info(SignalId::Rpm, "RPM", "", 0, "Engine speed"),
    info(SignalId::FuelPressure, "FP", "kPa", 0, "Fuel pressure"),
    info(SignalId::VehicleSpeed, "VSS", "km/h", 0, "Vehicle speed"),
    info(SignalId::Sync, "SYNC", "", 0, "Crank/cam sync acquired"),
    info(SignalId::Fan, "FAN", "", 0, "Cooling fan on"),
    info(SignalId::AfterStartEnrichment, "ASE", "", 0, "After-start enrichment active"),
    info(SignalId::WarmUpEnrichment, "WUE", "", 0, "Warm-up enrichment active"),
    info(SignalId::RevLimiter, "REV", "", 0, "Rev limiter active"),
    info(SignalId::LaunchControl, "LCH", "", 0, "Launch control active"),
    info(SignalId::AirConditioning, "AC", "", 0, "Air conditioning requested"),
    info(SignalId::DecelFuelCut, "DFCO", "", 0, "Deceleration fuel cut-off active"),
];

/// Metadata for `id`.
pub fn signal_info(id: SignalId) -> &'static SignalInfo {
    &SIGNALS[id.index()]
}

/// Every signal's metadata in code order.
pub fn all_signals() -> &'static [SignalInfo] {
    &SIGNALS
}

/// Color the renderer should use for `value` of `id`.
pub fn color_hint(id: SignalId, value: SignalValue) -> ColorHint {
    let number = value.as_f64();
    match (id, value) {
        (_, SignalValue::Flag(true)) => ColorHint::Active,
        (_, SignalValue::Flag(false)) => ColorHint::Inactive,
        (SignalId::AirFuelRatio, _) if number < 13.0 => ColorHint::Warning,
        (SignalId::AirFuelRatio, _) if number > 14.7 => ColorHint::Critical,
        (SignalId::AirFuelRatio, _) => ColorHint::Good,
        (SignalId::CoolantTemp, _) if number > 95.0 => ColorHint::Critical,
        (SignalId::BatteryVoltage, _) if !(11.5..=14.5).contains(&number) => ColorHint::Warning,
        (SignalId::BatteryVoltage, _) => ColorHint::Good,
        (SignalId::IgnitionAdvance, _) => ColorHint::Accent,
        _ => ColorHint::Normal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_in_code_order() {
        for (index, info) in all_signals().iter().enumerate() {
            assert_eq!(info.id.index(), index);
            assert!(!info.label.is_empty());
        }
    }

    #[test]
    fn afr_thresholds() {
        assert_eq!(color_hint(SignalId::AirFuelRatio, SignalValue::Number(12.2)), ColorHint::Warning);
        assert_eq!(color_hint(SignalId::AirFuelRatio, SignalValue::Number(14.7)), ColorHint::Good);
        assert_eq!(color_hint(SignalId::AirFuelRatio, SignalValue::Number(15.1)), ColorHint::Critical);
    }

    #[test]
    fn thermal_and_electrical_thresholds() {
        assert_eq!(color_hint(SignalId::CoolantTemp, SignalValue::Number(96.0)), ColorHint::Critical);
        assert_eq!(color_hint(SignalId::CoolantTemp, SignalValue::Number(90.0)), ColorHint::Normal);
        assert_eq!(color_hint(SignalId::BatteryVoltage, SignalValue::Number(11.2)), ColorHint::Warning);
        assert_eq!(color_hint(SignalId::BatteryVoltage, SignalValue::Number(13.8)), ColorHint::Good);
        assert_eq!(color_hint(SignalId::BatteryVoltage, SignalValue::Number(14.9)), ColorHint::Warning);
    }

    #[test]
    fn flags_use_state_colors() {
        assert_eq!(color_hint(SignalId::Fan, SignalValue::Flag(true)), ColorHint::Active);
        assert_eq!(color_hint(SignalId::Fan, SignalValue::Flag(false)), ColorHint::Inactive);
    }
}
