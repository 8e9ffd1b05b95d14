//! Versioned snapshot of every signal

use tokio::time::Instant;

use super::{SIGNAL_COUNT, SignalId, SignalValue};

/// One signal's latest decoded value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Signal {
    pub id: SignalId,
    pub value: SignalValue,
    /// `None` until a producer has written this signal at least once
    pub last_updated: Option<Instant>,
}

/// The complete current signal set.
///
/// A snapshot has a single writer, the active producer. Each [`apply`]
/// call is one batch and bumps [`version`] by exactly one, so readers
/// holding a published copy can tell whether anything was written since.
///
/// [`apply`]: TelemetrySnapshot::apply
/// [`version`]: TelemetrySnapshot::version
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetrySnapshot {
    signals: [Signal; SIGNAL_COUNT],
    version: u64,
}

impl Default for TelemetrySnapshot {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetrySnapshot {
    /// All numbers zero, all flags off, version 0.
    pub fn new() -> Self {
        let signals = SignalId::ALL.map(|id| Signal {
            id,
            value: id.initial_value(),
            last_updated: None,
        });
        Self { signals, version: 0 }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn get(&self, id: SignalId) -> &Signal {
        &self.signals[id.index()]
    }

    pub fn value(&self, id: SignalId) -> SignalValue {
        self.signals[id.index()].value
    }

    pub fn number(&self, id: SignalId) -> f64 {
        self.value(id).as_f64()
    }

    pub fn flag(&self, id: SignalId) -> bool {
        self.value(id).as_bool()
    }

    pub fn signals(&self) -> impl Iterator<Item = &Signal> {
        self.signals.iter()
    }

    /// Write a batch of values and bump the version once.
    ///
    /// Values whose kind does not match the signal are coerced so a flag
    /// always stays a flag. Signals absent from the batch keep their
    /// previous value.
    pub fn apply<I>(&mut self, updates: I, now: Instant)
    where
        I: IntoIterator<Item = (SignalId, SignalValue)>,
    {
        for (id, value) in updates {
            let value = match id.initial_value() {
                SignalValue::Number(_) => SignalValue::Number(value.as_f64()),
                SignalValue::Flag(_) => SignalValue::Flag(value.as_bool()),
            };
            let signal = &mut self.signals[id.index()];
            signal.value = value;
            signal.last_updated = Some(now);
        }
        self.version = self.version.wrapping_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_zeroed() {
        let snapshot = TelemetrySnapshot::new();
        assert_eq!(snapshot.version(), 0);
        for signal in snapshot.signals() {
            assert_eq!(signal.value, signal.id.initial_value());
            assert!(signal.last_updated.is_none());
        }
    }

    #[test]
    fn apply_bumps_version_once_per_batch() {
        let mut snapshot = TelemetrySnapshot::new();
        let now = Instant::now();
        snapshot.apply(
            [
                (SignalId::Rpm, SignalValue::Number(3000.0)),
                (SignalId::ManifoldPressure, SignalValue::Number(85.0)),
                (SignalId::Fan, SignalValue::Flag(true)),
            ],
            now,
        );
        assert_eq!(snapshot.version(), 1);
        assert_eq!(snapshot.number(SignalId::Rpm), 3000.0);
        assert!(snapshot.flag(SignalId::Fan));
        assert_eq!(snapshot.get(SignalId::Rpm).last_updated, Some(now));

        snapshot.apply(std::iter::empty(), now);
        assert_eq!(snapshot.version(), 2);
    }

    #[test]
    fn untouched_signals_keep_previous_value() {
        let mut snapshot = TelemetrySnapshot::new();
        let now = Instant::now();
        snapshot.apply([(SignalId::CoolantTemp, SignalValue::Number(88.0))], now);
        snapshot.apply([(SignalId::Rpm, SignalValue::Number(900.0))], now);
        assert_eq!(snapshot.number(SignalId::CoolantTemp), 88.0);
    }

    #[test]
    fn values_are_coerced_to_signal_kind() {
        let mut snapshot = TelemetrySnapshot::new();
        snapshot.apply(
            [
                (SignalId::Sync, SignalValue::Number(4.0)),
                (SignalId::Rpm, SignalValue::Flag(true)),
            ],
            Instant::now(),
        );
        assert_eq!(snapshot.value(SignalId::Sync), SignalValue::Flag(true));
        assert_eq!(snapshot.value(SignalId::Rpm), SignalValue::Number(1.0));
    }
}
