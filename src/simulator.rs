//! Synthetic telemetry for bench testing without an engine
//!
//! Each mode generates an RPM trace; every other signal is derived from RPM
//! so the dashboard sees a plausible, internally consistent engine.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::types::{SignalId, SignalValue, TelemetrySnapshot};

/// Largest RPM reached by the sweep.
pub const SWEEP_PEAK_RPM: u32 = 6000;
const SWEEP_STEP_RPM: u32 = 50;

/// RPM span over which derived signals are interpolated.
const LOAD_RANGE: (f64, f64) = (800.0, 6000.0);

/// RPM trace generated by the simulator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulatorMode {
    /// Generate nothing; the snapshot is left to the real producer
    #[default]
    Off,
    /// 0 to 6000 RPM and back in 50 RPM steps
    Sweep,
    /// 850 to 895 RPM
    Idle,
    /// 1500 to 3500 RPM sine wave
    Cruise,
    /// 5750 to 5940 RPM
    Redline,
}

impl SimulatorMode {
    /// Mode by its console command digit.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(SimulatorMode::Off),
            1 => Some(SimulatorMode::Sweep),
            2 => Some(SimulatorMode::Idle),
            3 => Some(SimulatorMode::Cruise),
            4 => Some(SimulatorMode::Redline),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for SimulatorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SimulatorMode::Off => "off",
            SimulatorMode::Sweep => "sweep",
            SimulatorMode::Idle => "idle",
            SimulatorMode::Cruise => "cruise",
            SimulatorMode::Redline => "redline",
        };
        f.write_str(name)
    }
}

/// Deterministic telemetry generator.
///
/// Call [`tick`](SignalSimulator::tick) at the update cadence (100 ms in a
/// running session). With noise disabled, two simulators in the same mode
/// produce identical traces.
#[derive(Debug, Clone)]
pub struct SignalSimulator {
    mode: SimulatorMode,
    step: u32,
    rising: bool,
    noise: bool,
    rng: StdRng,
}

impl Default for SignalSimulator {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalSimulator {
    /// Simulator with entropy-seeded noise, starting in [`SimulatorMode::Off`].
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    /// Simulator with reproducible noise.
    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        Self { mode: SimulatorMode::Off, step: 0, rising: true, noise: true, rng }
    }

    /// Disable noise so traces depend only on the mode and step.
    pub fn without_noise(mut self) -> Self {
        self.noise = false;
        self
    }

    pub fn with_mode(mut self, mode: SimulatorMode) -> Self {
        self.set_mode(mode);
        self
    }

    pub fn mode(&self) -> SimulatorMode {
        self.mode
    }

    /// Switch mode and restart its trace from the beginning.
    pub fn set_mode(&mut self, mode: SimulatorMode) {
        info!(%mode, "Simulator mode changed");
        self.mode = mode;
        self.step = 0;
        self.rising = true;
    }

    /// Advance one step and write every signal as one batch.
    ///
    /// Returns `false` without touching the snapshot when the mode is `Off`.
    pub fn tick(&mut self, snapshot: &mut TelemetrySnapshot, now: Instant) -> bool {
        let Some(rpm) = self.next_rpm() else {
            return false;
        };

        let mut engine = if rpm == 0.0 { EngineState::stopped() } else { EngineState::running(rpm) };
        if self.noise && engine.rpm > 0.0 {
            self.add_noise(&mut engine);
        }

        debug!(mode = %self.mode, step = self.step, rpm = engine.rpm, "Simulator tick");
        snapshot.apply(engine.updates(), now);
        true
    }

    fn next_rpm(&mut self) -> Option<f64> {
        let rpm = match self.mode {
            SimulatorMode::Off => return None,
            SimulatorMode::Sweep => {
                let rpm = self.step * SWEEP_STEP_RPM;
                if self.rising {
                    if rpm >= SWEEP_PEAK_RPM {
                        self.rising = false;
                        self.step = SWEEP_PEAK_RPM / SWEEP_STEP_RPM;
                    } else {
                        self.step += 1;
                    }
                } else if rpm == 0 {
                    self.rising = true;
                    self.step = 0;
                } else {
                    self.step -= 1;
                }
                return Some(rpm as f64);
            }
            SimulatorMode::Idle => 850.0 + (self.step % 10) as f64 * 5.0,
            SimulatorMode::Cruise => (2500.0 + (self.step as f64 * 0.1).sin() * 1000.0).trunc(),
            SimulatorMode::Redline => 5750.0 + (self.step % 20) as f64 * 10.0,
        };
        self.step = self.step.wrapping_add(1);
        Some(rpm)
    }

    fn add_noise(&mut self, engine: &mut EngineState) {
        let rpm_ceiling = if self.mode == SimulatorMode::Sweep { 6500.0 } else { 7000.0 };

        engine.rpm = (engine.rpm + self.rng.gen_range(-10..10) as f64).clamp(0.0, rpm_ceiling);
        engine.map = (engine.map + self.rng.gen_range(-2..2) as f64).clamp(20.0, 105.0);
        engine.afr = (engine.afr + self.rng.gen_range(-20..20) as f64 / 100.0).clamp(10.0, 18.0);
        engine.battery = (engine.battery + self.rng.gen_range(-5..5) as f64 / 100.0).clamp(11.0, 15.0);
        engine.tps = (engine.tps + self.rng.gen_range(-2..2) as f64).clamp(0.0, 100.0);
        engine.advance = (engine.advance + self.rng.gen_range(-1..1) as f64).clamp(-5.0, 40.0);
    }
}

/// Linear interpolation of `rpm` over the load range onto `low..=high`,
/// clamped at both ends and rounded to whole units.
fn along_load(rpm: f64, low: f64, high: f64) -> f64 {
    let (from, to) = LOAD_RANGE;
    let t = ((rpm - from) / (to - from)).clamp(0.0, 1.0);
    (low + t * (high - low)).round()
}

/// One generated set of engine values.
#[derive(Debug, Clone, Copy, PartialEq)]
struct EngineState {
    rpm: f64,
    map: f64,
    tps: f64,
    advance: f64,
    afr: f64,
    fuel_pressure: f64,
    speed: f64,
    coolant: f64,
    intake: f64,
    battery: f64,
    sync: bool,
    fan: bool,
    after_start: bool,
    warm_up: bool,
    rev_limit: bool,
    decel_cut: bool,
}

impl EngineState {
    fn stopped() -> Self {
        Self {
            rpm: 0.0,
            map: 30.0,
            tps: 0.0,
            advance: 0.0,
            afr: 14.7,
            fuel_pressure: 0.0,
            speed: 0.0,
            coolant: 25.0,
            intake: 25.0,
            battery: 12.8,
            sync: false,
            fan: false,
            after_start: false,
            warm_up: false,
            rev_limit: false,
            decel_cut: false,
        }
    }

    fn running(rpm: f64) -> Self {
        let afr = if rpm < 1000.0 {
            14.7
        } else if rpm > 4000.0 {
            12.5
        } else {
            14.2
        };
        let coolant = along_load(rpm, 85.0, 95.0);
        let tps = along_load(rpm, 5.0, 85.0);

        Self {
            rpm,
            map: along_load(rpm, 35.0, 95.0),
            tps,
            advance: along_load(rpm, 10.0, 35.0),
            afr,
            fuel_pressure: along_load(rpm, 250.0, 350.0),
            speed: along_load(rpm, 0.0, 120.0),
            coolant,
            intake: along_load(rpm, 30.0, 45.0),
            battery: 14.2,
            sync: true,
            fan: coolant > 90.0,
            after_start: coolant < 60.0,
            warm_up: coolant < 80.0,
            rev_limit: rpm > 5500.0,
            decel_cut: rpm > 2000.0 && tps < 10.0,
        }
    }

    fn updates(&self) -> [(SignalId, SignalValue); 19] {
        use SignalId::*;
        use SignalValue::{Flag, Number};

        [
            (Rpm, Number(self.rpm)),
            (ManifoldPressure, Number(self.map)),
            (ThrottlePosition, Number(self.tps)),
            (IgnitionAdvance, Number(self.advance)),
            (AirFuelRatio, Number(self.afr)),
            (FuelPressure, Number(self.fuel_pressure)),
            (TriggerErrors, Number(0.0)),
            (VehicleSpeed, Number(self.speed)),
            (CoolantTemp, Number(self.coolant)),
            (IntakeTemp, Number(self.intake)),
            (BatteryVoltage, Number(self.battery)),
            (Sync, Flag(self.sync)),
            (Fan, Flag(self.fan)),
            (AfterStartEnrichment, Flag(self.after_start)),
            (WarmUpEnrichment, Flag(self.warm_up)),
            (RevLimiter, Flag(self.rev_limit)),
            (LaunchControl, Flag(false)),
            (AirConditioning, Flag(false)),
            (DecelFuelCut, Flag(self.decel_cut)),
        ]
    }
}
