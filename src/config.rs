//! Dashboard configuration
//!
//! Everything is plain serde data persisted as YAML. Unknown keys are
//! ignored and missing keys take their defaults, so an older file keeps
//! loading after new settings are added.
//!
//! ```rust
//! use ecudash::config::{DashboardConfig, SourceKind};
//!
//! let config = DashboardConfig::from_yaml("source: stream\nbus:\n  bitrate: 250000\n").unwrap();
//! assert_eq!(config.source, SourceKind::Stream);
//! assert_eq!(config.bus.effective_bitrate(), 500_000);
//! assert_eq!(config.layout.panels.len(), 8);
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::panels::DisplayBindings;
use crate::render::ClassRates;
use crate::simulator::SimulatorMode;
use crate::types::SignalId;
use crate::{Result, TelemetryError};

/// Bus bitrates the controller supports.
pub const SUPPORTED_BITRATES: [u32; 2] = [500_000, 1_000_000];

/// Bitrate used when the configured one is unsupported.
pub const DEFAULT_BITRATE: u32 = 500_000;

/// Which producer feeds the snapshot. Fixed for the lifetime of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Frame-addressed bus broadcast
    #[default]
    Bus,
    /// Request/response polling over a serial link
    Stream,
    /// Synthetic data
    Simulator,
}

impl SourceKind {
    /// Short text for the on-screen source badge.
    pub fn badge(self) -> &'static str {
        match self {
            SourceKind::Bus => "CAN",
            SourceKind::Stream => "SER",
            SourceKind::Simulator => "SIM",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceKind::Bus => "bus",
            SourceKind::Stream => "stream",
            SourceKind::Simulator => "simulator",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusSettings {
    /// Requested bitrate in bits per second
    pub bitrate: u32,
}

impl Default for BusSettings {
    fn default() -> Self {
        Self { bitrate: DEFAULT_BITRATE }
    }
}

impl BusSettings {
    /// The configured bitrate if supported, otherwise [`DEFAULT_BITRATE`].
    pub fn effective_bitrate(&self) -> u32 {
        if SUPPORTED_BITRATES.contains(&self.bitrate) {
            self.bitrate
        } else {
            DEFAULT_BITRATE
        }
    }
}

/// Polling cadence for the byte-stream transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamSettings {
    pub poll_interval_ms: u64,
    pub poll_timeout_ms: u64,
    /// Refresh interval for thermal and battery fields
    pub slow_interval_ms: u64,
    /// Below this RPM slow fields refresh on every poll
    pub low_rpm_threshold: f64,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self { poll_interval_ms: 15, poll_timeout_ms: 30, slow_interval_ms: 150, low_rpm_threshold: 100.0 }
    }
}

impl StreamSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn slow_interval(&self) -> Duration {
        Duration::from_millis(self.slow_interval_ms)
    }
}

/// How the primary RPM gauge is presented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RpmDisplay {
    #[default]
    Bar,
    Digital,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Render loop period
    pub tick_ms: u64,
    /// Redraw ceiling per element class
    pub rates: ClassRates,
    pub rpm_display: RpmDisplay,
    /// Show the CAN/SER/SIM source badge
    pub show_system_indicators: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            tick_ms: 20,
            rates: ClassRates::default(),
            rpm_display: RpmDisplay::Bar,
            show_system_indicators: true,
        }
    }
}

impl RenderSettings {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }

    pub fn tick_hz(&self) -> f64 {
        1.0 / self.tick().as_secs_f64()
    }
}

/// One persisted panel or indicator slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotConfig {
    pub position: usize,
    pub signal: SignalId,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    /// Overrides the signal's default precision
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimals: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

fn enabled_by_default() -> bool {
    true
}

impl SlotConfig {
    pub fn new(position: usize, signal: SignalId) -> Self {
        Self { position, signal, enabled: true, decimals: None, label: None, unit: None }
    }
}

/// Persisted panel and indicator tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayLayout {
    pub panels: Vec<SlotConfig>,
    pub indicators: Vec<SlotConfig>,
}

impl Default for DisplayLayout {
    fn default() -> Self {
        use SignalId::*;

        let panels = [
            AirFuelRatio,
            ThrottlePosition,
            IntakeTemp,
            ManifoldPressure,
            IgnitionAdvance,
            FuelPressure,
            CoolantTemp,
            BatteryVoltage,
        ];
        let indicators = [
            Sync,
            Fan,
            AfterStartEnrichment,
            WarmUpEnrichment,
            RevLimiter,
            LaunchControl,
            AirConditioning,
            DecelFuelCut,
        ];

        Self {
            panels: panels.into_iter().enumerate().map(|(p, s)| SlotConfig::new(p, s)).collect(),
            indicators: indicators
                .into_iter()
                .enumerate()
                .map(|(p, s)| SlotConfig::new(p, s))
                .collect(),
        }
    }
}

impl DisplayLayout {
    /// Check the layout would bind cleanly.
    pub fn validate(&self) -> Result<()> {
        DisplayBindings::from_layout(self).map(|_| ())
    }
}

/// Complete dashboard configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub source: SourceKind,
    /// Initial simulator mode when `source` is `simulator`
    pub simulator_mode: SimulatorMode,
    pub bus: BusSettings,
    pub stream: StreamSettings,
    pub render: RenderSettings,
    pub layout: DisplayLayout,
}

impl DashboardConfig {
    /// Parse YAML, replacing an invalid layout with the default one.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let mut config: DashboardConfig = serde_yaml_ng::from_str(yaml)?;
        config.sanitize();
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    /// Load from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| TelemetryError::file_error(path.to_path_buf(), e))?;
        debug!(path = %path.display(), bytes = yaml.len(), "Loaded configuration");
        Self::from_yaml(&yaml)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_yaml()?)
            .map_err(|e| TelemetryError::file_error(path.to_path_buf(), e))
    }

    /// Replace values the dashboard cannot use with defaults.
    pub fn sanitize(&mut self) {
        if self.bus.effective_bitrate() != self.bus.bitrate {
            warn!(requested = self.bus.bitrate, "Unsupported bus bitrate, using {}", DEFAULT_BITRATE);
            self.bus.bitrate = DEFAULT_BITRATE;
        }
        if let Err(e) = self.layout.validate() {
            warn!("Invalid display layout, using defaults: {}", e);
            self.layout = DisplayLayout::default();
        }
    }
}

/// Persistence for the display layout.
pub trait ConfigStore: Send + Sync {
    /// The saved layout, or `None` if nothing has been saved yet.
    fn load(&self) -> Result<Option<DisplayLayout>>;

    fn save(&self, layout: &DisplayLayout) -> Result<()>;
}

/// Layout stored as a YAML file.
#[derive(Debug, Clone)]
pub struct YamlFileStore {
    path: PathBuf,
}

impl YamlFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigStore for YamlFileStore {
    fn load(&self) -> Result<Option<DisplayLayout>> {
        let yaml = match std::fs::read_to_string(&self.path) {
            Ok(yaml) => yaml,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(TelemetryError::file_error(self.path.clone(), e)),
        };
        Ok(Some(serde_yaml_ng::from_str(&yaml)?))
    }

    fn save(&self, layout: &DisplayLayout) -> Result<()> {
        let yaml = serde_yaml_ng::to_string(layout)?;
        std::fs::write(&self.path, yaml).map_err(|e| TelemetryError::file_error(self.path.clone(), e))
    }
}

/// Layout kept in memory; clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct MemoryConfigStore {
    layout: Arc<Mutex<Option<DisplayLayout>>>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_layout(layout: DisplayLayout) -> Self {
        Self { layout: Arc::new(Mutex::new(Some(layout))) }
    }
}

impl ConfigStore for MemoryConfigStore {
    fn load(&self) -> Result<Option<DisplayLayout>> {
        let guard = self
            .layout
            .lock()
            .map_err(|_| TelemetryError::configuration("memory store lock poisoned"))?;
        Ok(guard.clone())
    }

    fn save(&self, layout: &DisplayLayout) -> Result<()> {
        let mut guard = self
            .layout
            .lock()
            .map_err(|_| TelemetryError::configuration("memory store lock poisoned"))?;
        *guard = Some(layout.clone());
        Ok(())
    }
}

/// Load the persisted layout, falling back to defaults when it is missing,
/// unreadable or does not bind.
pub fn load_layout_or_default(store: &dyn ConfigStore) -> DisplayLayout {
    match store.load() {
        Ok(Some(layout)) => match layout.validate() {
            Ok(()) => layout,
            Err(e) => {
                warn!("Persisted layout rejected, using defaults: {}", e);
                DisplayLayout::default()
            }
        },
        Ok(None) => {
            debug!("No persisted layout, using defaults");
            DisplayLayout::default()
        }
        Err(e) => {
            warn!("Failed to load layout, using defaults: {}", e);
            DisplayLayout::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RedrawRate;

    #[test]
    fn defaults_match_dashboard_layout() {
        let config = DashboardConfig::default();
        assert_eq!(config.source, SourceKind::Bus);
        assert_eq!(config.simulator_mode, SimulatorMode::Off);
        assert_eq!(config.stream.poll_interval(), Duration::from_millis(15));
        assert_eq!(config.stream.poll_timeout(), Duration::from_millis(30));
        assert_eq!(config.render.tick(), Duration::from_millis(20));
        assert_eq!(config.layout.panels[0].signal, SignalId::AirFuelRatio);
        assert_eq!(config.layout.panels[7].signal, SignalId::BatteryVoltage);
        assert_eq!(config.layout.indicators[7].signal, SignalId::DecelFuelCut);
        config.layout.validate().unwrap();
    }

    #[test]
    fn yaml_round_trip() {
        let mut config = DashboardConfig::default();
        config.source = SourceKind::Simulator;
        config.simulator_mode = SimulatorMode::Cruise;
        config.bus.bitrate = 1_000_000;
        config.render.rates.panel = RedrawRate::MaxHz(5);
        config.render.rpm_display = RpmDisplay::Digital;
        config.layout.panels[3].label = Some("Boost".to_string());
        config.layout.indicators[6].enabled = false;

        let yaml = config.to_yaml().unwrap();
        assert_eq!(DashboardConfig::from_yaml(&yaml).unwrap(), config);
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let config = DashboardConfig::from_yaml("source: simulator\nsimulator_mode: idle\n").unwrap();
        assert_eq!(config.simulator_mode, SimulatorMode::Idle);
        assert_eq!(config.stream, StreamSettings::default());
        assert_eq!(config.layout, DisplayLayout::default());
    }

    #[test]
    fn unsupported_bitrate_falls_back() {
        let config = DashboardConfig::from_yaml("bus:\n  bitrate: 125000\n").unwrap();
        assert_eq!(config.bus.bitrate, DEFAULT_BITRATE);
    }

    #[test]
    fn invalid_layout_falls_back_to_defaults() {
        let yaml = "layout:\n  panels:\n    - position: 9\n      signal: rpm\n  indicators: []\n";
        let config = DashboardConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.layout, DisplayLayout::default());

        let yaml = "layout:\n  panels:\n    - position: 0\n      signal: fan\n  indicators: []\n";
        let config = DashboardConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.layout, DisplayLayout::default());
    }

    #[test]
    fn malformed_yaml_is_a_parse_error() {
        let err = DashboardConfig::from_yaml("source: [unclosed").unwrap_err();
        assert!(matches!(err, TelemetryError::Parse { .. }));
    }

    #[test]
    fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dash.yaml");

        let mut config = DashboardConfig::default();
        config.source = SourceKind::Stream;
        config.save(&path).unwrap();
        assert_eq!(DashboardConfig::load(&path).unwrap(), config);

        let missing = DashboardConfig::load(dir.path().join("missing.yaml")).unwrap_err();
        assert!(matches!(missing, TelemetryError::File { .. }));
    }

    #[test]
    fn yaml_store_saves_and_loads_layout() {
        let dir = tempfile::tempdir().unwrap();
        let store = YamlFileStore::new(dir.path().join("layout.yaml"));
        assert_eq!(store.load().unwrap(), None);

        let mut layout = DisplayLayout::default();
        layout.panels[0].decimals = Some(2);
        store.save(&layout).unwrap();
        assert_eq!(store.load().unwrap(), Some(layout));
    }

    #[test]
    fn rejected_store_layout_falls_back() {
        let mut layout = DisplayLayout::default();
        layout.panels.push(SlotConfig::new(3, SignalId::Rpm));
        let store = MemoryConfigStore::with_layout(layout);
        assert_eq!(load_layout_or_default(&store), DisplayLayout::default());

        let empty = MemoryConfigStore::new();
        assert_eq!(load_layout_or_default(&empty), DisplayLayout::default());
    }

    #[test]
    fn source_badges() {
        assert_eq!(SourceKind::Bus.badge(), "CAN");
        assert_eq!(SourceKind::Stream.badge(), "SER");
        assert_eq!(SourceKind::Simulator.badge(), "SIM");
    }
}
