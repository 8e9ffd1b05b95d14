//! Simulated engine producer

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval};
use tracing::{debug, info};

use crate::Result;
use crate::config::SourceKind;
use crate::diagnostics::DecodeRate;
use crate::provider::{Producer, Production};
use crate::simulator::{SignalSimulator, SimulatorMode};
use crate::types::TelemetrySnapshot;

/// Simulator step cadence.
pub const SIMULATOR_TICK: Duration = Duration::from_millis(100);

/// Producer that advances a [`SignalSimulator`] every 100 ms.
///
/// The mode can be changed while the session runs through an optional
/// watch channel; a change takes effect on the next step.
pub struct SimulatorProducer {
    simulator: SignalSimulator,
    interval: Interval,
    modes: Option<watch::Receiver<SimulatorMode>>,
    rate: DecodeRate,
}

impl SimulatorProducer {
    pub fn new(simulator: SignalSimulator) -> Self {
        let mut interval = interval(SIMULATOR_TICK);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(mode = %simulator.mode(), "Simulator producer ready");
        Self { simulator, interval, modes: None, rate: DecodeRate::new() }
    }

    /// Follow mode changes published on `modes`.
    pub fn with_mode_control(mut self, modes: watch::Receiver<SimulatorMode>) -> Self {
        self.modes = Some(modes);
        self
    }

    pub fn mode(&self) -> SimulatorMode {
        self.simulator.mode()
    }

    fn apply_mode_change(&mut self) {
        let Some(modes) = self.modes.as_mut() else {
            return;
        };
        match modes.has_changed() {
            Ok(true) => {
                let mode = *modes.borrow_and_update();
                if mode != self.simulator.mode() {
                    self.simulator.set_mode(mode);
                }
            }
            Ok(false) => {}
            Err(_) => {
                debug!("Mode control closed, keeping {}", self.simulator.mode());
                self.modes = None;
            }
        }
    }
}

#[async_trait::async_trait]
impl Producer for SimulatorProducer {
    async fn produce(&mut self, snapshot: &mut TelemetrySnapshot) -> Result<Production> {
        self.interval.tick().await;
        self.apply_mode_change();

        let now = Instant::now();
        if self.simulator.tick(snapshot, now) {
            self.rate.record(now);
            Ok(Production::Updated)
        } else {
            Ok(Production::Unchanged)
        }
    }

    fn source_kind(&self) -> SourceKind {
        SourceKind::Simulator
    }

    fn decode_rate(&self) -> f64 {
        self.rate.per_second_at(Instant::now())
    }

    fn tick_rate(&self) -> f64 {
        1.0 / SIMULATOR_TICK.as_secs_f64()
    }
}
