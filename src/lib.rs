//! Engine telemetry decoding and differential dashboard rendering.
//!
//! ecudash reads live engine data from an ECU, keeps one typed snapshot of
//! every signal, and redraws only the dashboard elements whose values
//! actually changed.
//!
//! # Features
//!
//! - **Two transports**: frame-addressed bus messages or a polled serial stream
//! - **Simulator**: bench-testing traces without an engine attached
//! - **Typed decode tables**: every signal's offset, width and scaling in one place
//! - **Differential rendering**: per-class redraw ceilings, quantized change detection
//! - **Configurable layout**: eight panels and eight indicators, persisted as YAML
//!
//! Decoding and rendering run as separate tokio tasks. The decode task owns
//! the only writable snapshot and publishes immutable copies; the render task
//! reads the latest copy on its own tick and never touches a transport.
//!
//! ## Example (simulator)
//!
//! ```rust,no_run
//! use ecudash::{Dashboard, DashboardConfig, RedrawRate, SignalId, SimulatorMode};
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DashboardConfig { simulator_mode: SimulatorMode::Sweep, ..Default::default() };
//!     let session = Dashboard::simulator(&config);
//!     let mut snapshots = session.subscribe(RedrawRate::MaxHz(5));
//!
//!     while let Some(snapshot) = snapshots.next().await {
//!         println!("RPM: {}", snapshot.number(SignalId::Rpm));
//!     }
//!     Ok(())
//! }
//! ```

// Core types and error handling
mod error;
#[cfg_attr(any(test, feature = "benchmark"), path = "test_utils.rs")]
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Decoding
pub mod decoder;
pub mod diagnostics;
pub mod schema;
pub mod simulator;
pub mod transport;

// Task architecture
pub mod driver;
pub mod provider;
pub mod providers;
pub mod session;
pub mod stream;

// Display
pub mod config;
pub mod panels;
pub mod render;

// Core exports
pub use error::*;
pub use types::*;

pub use config::{ConfigStore, DashboardConfig, DisplayLayout, SourceKind};
pub use decoder::{BusFrameDecoder, StreamPollDecoder};
pub use diagnostics::DecoderStats;
pub use panels::{DisplayBindings, PanelBinding};
pub use provider::{Producer, Production};
pub use render::{DrawIntent, ElementClass, ElementId, RenderScheduler, Renderer};
pub use session::DashboardSession;
pub use simulator::{SignalSimulator, SimulatorMode};
pub use transport::{BusTransport, StreamTransport};

use providers::{BusProducer, SimulatorProducer, StreamProducer};
use tokio::sync::watch;
use tracing::info;

/// Transports available to [`Dashboard::launch`]. Only the one matching
/// the configured source is used.
#[derive(Default)]
pub struct Transports {
    pub bus: Option<Box<dyn BusTransport>>,
    pub stream: Option<Box<dyn StreamTransport>>,
}

/// Entry point for starting a dashboard session.
///
/// Every constructor spawns tasks and must be called inside a tokio runtime.
pub struct Dashboard;

impl Dashboard {
    /// Decode frames from a bus transport.
    pub fn bus<T: BusTransport>(transport: T, config: &DashboardConfig) -> DashboardSession {
        DashboardSession::start(BusProducer::new(transport, &config.bus), config)
    }

    /// Poll a serial stream transport.
    pub fn stream<T: StreamTransport>(transport: T, config: &DashboardConfig) -> DashboardSession {
        DashboardSession::start(StreamProducer::new(transport, &config.stream), config)
    }

    /// Generate telemetry, starting in the configured simulator mode.
    pub fn simulator(config: &DashboardConfig) -> DashboardSession {
        let (modes, mode_rx) = watch::channel(config.simulator_mode);
        let simulator = SignalSimulator::new().with_mode(config.simulator_mode);
        let producer = SimulatorProducer::new(simulator).with_mode_control(mode_rx);
        DashboardSession::start(producer, config).with_simulator_control(modes)
    }

    /// Start the source selected in `config`.
    ///
    /// The source is fixed for the lifetime of the session.
    pub fn launch(config: &DashboardConfig, transports: Transports) -> Result<DashboardSession> {
        info!(source = %config.source, "Launching dashboard");
        match config.source {
            SourceKind::Bus => {
                let transport = transports
                    .bus
                    .ok_or_else(|| TelemetryError::configuration("bus source selected without a bus transport"))?;
                Ok(Self::bus(transport, config))
            }
            SourceKind::Stream => {
                let transport = transports.stream.ok_or_else(|| {
                    TelemetryError::configuration("stream source selected without a stream transport")
                })?;
                Ok(Self::stream(transport, config))
            }
            SourceKind::Simulator => Ok(Self::simulator(config)),
        }
    }
}
