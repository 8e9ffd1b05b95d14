//! Running dashboard session

use std::sync::Arc;
use std::time::Duration;

use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{ConfigStore, DashboardConfig, RenderSettings, SourceKind, load_layout_or_default};
use crate::diagnostics::DecoderStats;
use crate::driver::Driver;
use crate::panels::{BindingEntry, DisplayBindings};
use crate::provider::Producer;
use crate::render::{
    ElementClass, RenderCommand, RenderHandle, RenderLoop, RenderScheduler, RenderStats, Renderer,
};
use crate::simulator::SimulatorMode;
use crate::stream::ThrottleExt;
use crate::types::{RedrawRate, SignalId, TelemetrySnapshot};
use crate::{BindError, Result, TelemetryError};

struct ActiveRender {
    handle: RenderHandle,
    cancel: CancellationToken,
}

/// A running dashboard: one decode task and at most one render task.
///
/// Dropping the session cancels both.
pub struct DashboardSession {
    source: SourceKind,
    source_hz: f64,
    render_settings: RenderSettings,
    snapshots: watch::Receiver<Arc<TelemetrySnapshot>>,
    stats: watch::Receiver<DecoderStats>,
    bindings: watch::Sender<Arc<DisplayBindings>>,
    store: Option<Arc<dyn ConfigStore>>,
    simulator_modes: Option<watch::Sender<SimulatorMode>>,
    render: Option<ActiveRender>,
    cancel: CancellationToken,
}

impl DashboardSession {
    /// Start decoding from `producer` with the layout and render settings
    /// in `config`.
    pub fn start<P>(producer: P, config: &DashboardConfig) -> Self
    where
        P: Producer,
    {
        let source = producer.source_kind();
        let source_hz = producer.tick_rate();
        let channels = Driver::spawn(producer);

        let bindings = DisplayBindings::from_layout(&config.layout).unwrap_or_else(|e| {
            warn!("Configured layout rejected, using defaults: {}", e);
            DisplayBindings::default()
        });
        let (bindings, _) = watch::channel(Arc::new(bindings));

        info!(%source, source_hz, "Dashboard session started");

        Self {
            source,
            source_hz,
            render_settings: config.render.clone(),
            snapshots: channels.snapshots,
            stats: channels.stats,
            bindings,
            store: None,
            simulator_modes: None,
            render: None,
            cancel: channels.cancel,
        }
    }

    pub(crate) fn with_simulator_control(mut self, modes: watch::Sender<SimulatorMode>) -> Self {
        self.simulator_modes = Some(modes);
        self
    }

    /// The source selected at startup.
    pub fn source(&self) -> SourceKind {
        self.source
    }

    /// The latest published snapshot.
    pub fn current(&self) -> Arc<TelemetrySnapshot> {
        self.snapshots.borrow().clone()
    }

    /// The latest decode counters.
    pub fn stats(&self) -> DecoderStats {
        self.stats.borrow().clone()
    }

    /// Every published snapshot, starting with the current one.
    pub fn snapshots(&self) -> impl Stream<Item = Arc<TelemetrySnapshot>> + 'static {
        WatchStream::new(self.snapshots.clone())
    }

    /// Published snapshots, at most `rate` per second.
    pub fn subscribe(&self, rate: RedrawRate) -> BoxStream<'static, Arc<TelemetrySnapshot>> {
        let snapshots = WatchStream::new(self.snapshots.clone());

        match rate.normalize(self.source_hz) {
            RedrawRate::Unlimited => snapshots.boxed(),
            limited => snapshots.throttle(limited.min_interval()).boxed(),
        }
    }

    /// Wait until the producer has published at least one update.
    pub async fn wait_for_data(&self, timeout: Duration) -> Result<Arc<TelemetrySnapshot>> {
        let mut snapshots = self.snapshots.clone();
        let waited = tokio::time::timeout(timeout, snapshots.wait_for(|s| s.version() > 0)).await;

        match waited {
            Ok(Ok(snapshot)) => Ok(snapshot.clone()),
            Ok(Err(_)) => Err(TelemetryError::configuration("decode task is not running")),
            Err(_) => {
                warn!(?timeout, "No telemetry received");
                Err(TelemetryError::TransportTimeout { duration: timeout })
            }
        }
    }

    /// The current panel and indicator bindings.
    pub fn bindings(&self) -> Arc<DisplayBindings> {
        self.bindings.borrow().clone()
    }

    /// Edit the bindings as one change.
    ///
    /// `edit` works on a copy; the copy is published only if it succeeds,
    /// so a failed edit leaves the bindings untouched. The edit runs under
    /// the channel lock, so concurrent edits never overwrite each other and
    /// `edit` must not read the session's bindings itself.
    pub fn update_bindings<F, R>(&self, edit: F) -> Result<R>
    where
        F: FnOnce(&mut DisplayBindings) -> std::result::Result<R, BindError>,
    {
        let mut outcome = None;
        self.bindings.send_if_modified(|current| {
            let mut next = DisplayBindings::clone(current);
            let edited = edit(&mut next);
            let modified = edited.is_ok();
            if modified {
                *current = Arc::new(next);
            }
            outcome = Some(edited);
            modified
        });
        let edited =
            outcome.ok_or_else(|| TelemetryError::configuration("binding edit was not applied"))?;
        Ok(edited?)
    }

    pub fn bind_panel(&self, position: usize, signal: SignalId) -> Result<()> {
        self.update_bindings(|b| b.panels.bind(position, signal))
    }

    pub fn bind_indicator(&self, position: usize, signal: SignalId) -> Result<()> {
        self.update_bindings(|b| b.indicators.bind(position, signal))
    }

    /// Bind by numeric signal code into whichever table matches its kind.
    pub fn bind_code(&self, position: usize, code: u8) -> Result<()> {
        let signal = SignalId::from_code(code).ok_or(BindError::UnknownSignal { code })?;
        self.update_bindings(|b| b.table_for(signal.kind()).bind(position, signal))
    }

    pub fn unbind_panel(&self, position: usize) -> Result<Option<BindingEntry>> {
        self.update_bindings(|b| b.panels.unbind(position))
    }

    pub fn unbind_indicator(&self, position: usize) -> Result<Option<BindingEntry>> {
        self.update_bindings(|b| b.indicators.unbind(position))
    }

    /// Load the persisted layout from `store` and keep it for saving.
    ///
    /// A missing or invalid persisted layout resets the bindings to the
    /// defaults.
    pub fn attach_store(&mut self, store: Arc<dyn ConfigStore>) {
        let layout = load_layout_or_default(store.as_ref());
        match DisplayBindings::from_layout(&layout) {
            Ok(bindings) => {
                self.bindings.send_replace(Arc::new(bindings));
            }
            Err(e) => warn!("Persisted layout rejected: {}", e),
        }
        self.store = Some(store);
    }

    /// Persist the current bindings to the attached store.
    pub fn save_layout(&self) -> Result<()> {
        let store = self
            .store
            .as_ref()
            .ok_or_else(|| TelemetryError::configuration("no configuration store attached"))?;
        store.save(&self.bindings().to_layout())?;
        debug!("Layout saved");
        Ok(())
    }

    /// Switch the simulator mode. Only valid for simulator sessions.
    pub fn set_simulator_mode(&self, mode: SimulatorMode) -> Result<()> {
        let modes = self.simulator_modes.as_ref().ok_or_else(|| {
            TelemetryError::configuration(format!("{} source has no simulator mode", self.source))
        })?;
        modes.send_replace(mode);
        Ok(())
    }

    /// Start drawing into `renderer`, replacing any running render task.
    pub fn spawn_renderer<R>(&mut self, renderer: R)
    where
        R: Renderer,
    {
        if let Some(previous) = self.render.take() {
            debug!("Replacing render task");
            previous.cancel.cancel();
        }

        let cancel = self.cancel.child_token();
        let scheduler = RenderScheduler::from_settings(&self.render_settings, self.source);
        let handle = RenderLoop::spawn(
            renderer,
            scheduler,
            &self.render_settings,
            self.snapshots.clone(),
            self.bindings.subscribe(),
            cancel.clone(),
        );
        self.render = Some(ActiveRender { handle, cancel });
    }

    /// Stop the render task and return its counters.
    pub async fn stop_renderer(&mut self) -> Option<RenderStats> {
        let active = self.render.take()?;
        active.cancel.cancel();
        match active.handle.task.await {
            Ok(stats) => Some(stats),
            Err(e) => {
                warn!("Render task failed: {}", e);
                None
            }
        }
    }

    /// Redraw every element of `class` on the next render tick.
    pub fn force_redraw(&self, class: ElementClass) -> Result<()> {
        self.send_render_command(RenderCommand::ForceRedraw(class))
    }

    /// Redraw the whole display on the next render tick.
    pub fn reset_display(&self) -> Result<()> {
        self.send_render_command(RenderCommand::Reset)
    }

    fn send_render_command(&self, command: RenderCommand) -> Result<()> {
        let active =
            self.render.as_ref().ok_or_else(|| TelemetryError::configuration("no renderer running"))?;
        active
            .handle
            .commands
            .send(command)
            .map_err(|_| TelemetryError::configuration("render task has stopped"))
    }

    /// Stop all tasks.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

impl Drop for DashboardSession {
    fn drop(&mut self) {
        debug!("Dropping dashboard session");
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryConfigStore;
    use crate::providers::SimulatorProducer;
    use crate::simulator::SignalSimulator;
    use crate::test_utils::RecordingRenderer;
    use crate::render::ElementId;

    fn simulator_session(mode: SimulatorMode) -> DashboardSession {
        let simulator = SignalSimulator::with_seed(11).without_noise().with_mode(mode);
        DashboardSession::start(SimulatorProducer::new(simulator), &DashboardConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn waits_for_first_update() {
        let session = simulator_session(SimulatorMode::Idle);
        let snapshot = session.wait_for_data(Duration::from_secs(1)).await.unwrap();
        assert_eq!(snapshot.version(), 1);
        assert_eq!(session.source(), SourceKind::Simulator);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_times_out_when_nothing_is_produced() {
        let session = simulator_session(SimulatorMode::Off);
        let err = session.wait_for_data(Duration::from_millis(500)).await.unwrap_err();
        assert!(matches!(err, TelemetryError::TransportTimeout { .. }));
        assert!(session.stats().updates == 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_edit_leaves_bindings_untouched() {
        let session = simulator_session(SimulatorMode::Off);
        let before = session.bindings();

        let err = session
            .update_bindings(|b| {
                b.panels.bind(0, SignalId::Rpm)?;
                b.panels.bind(9, SignalId::Rpm)
            })
            .unwrap_err();
        assert!(matches!(err, TelemetryError::Bind(BindError::InvalidPosition { position: 9, .. })));
        assert_eq!(*session.bindings(), *before);

        session.bind_code(2, SignalId::Fan.code()).unwrap();
        assert_eq!(session.bindings().indicators.get(2).map(|e| e.signal), Some(SignalId::Fan));
        assert!(matches!(
            session.bind_panel(1, SignalId::Fan),
            Err(TelemetryError::Bind(BindError::KindMismatch { .. }))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_edits_are_all_kept() {
        let session = Arc::new(simulator_session(SimulatorMode::Off));

        let editors: Vec<_> = (0..8usize)
            .map(|position| {
                let session = Arc::clone(&session);
                tokio::spawn(async move {
                    for round in 0..50 {
                        session
                            .update_bindings(|b| b.panels.set_label(position, format!("P{position}.{round}")))
                            .unwrap();
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();
        for editor in editors {
            editor.await.unwrap();
        }

        let bindings = session.bindings();
        for position in 0..8usize {
            let label = bindings.panels.get(position).map(|e| e.label.clone());
            assert_eq!(label, Some(format!("P{position}.49")));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn layout_round_trips_through_store() {
        let mut session = simulator_session(SimulatorMode::Off);
        let store = Arc::new(MemoryConfigStore::new());
        assert!(session.save_layout().is_err());

        session.attach_store(store.clone());
        session.unbind_panel(4).unwrap();
        session.save_layout().unwrap();

        let saved = store.load().unwrap().unwrap();
        assert_eq!(saved.panels.len(), 7);
        assert!(saved.panels.iter().all(|slot| slot.position != 4));
    }

    #[tokio::test(start_paused = true)]
    async fn simulator_mode_needs_simulator_control() {
        let session = simulator_session(SimulatorMode::Off);
        assert!(matches!(
            session.set_simulator_mode(SimulatorMode::Sweep),
            Err(TelemetryError::Configuration { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn renderer_sees_published_updates() {
        let mut session = simulator_session(SimulatorMode::Redline);
        let renderer = RecordingRenderer::new();
        assert!(session.force_redraw(ElementClass::Panel).is_err());

        session.spawn_renderer(renderer.clone());
        tokio::time::sleep(Duration::from_millis(150)).await;

        let rpm: Vec<_> = renderer
            .drawn()
            .into_iter()
            .filter(|intent| intent.element == ElementId::Rpm)
            .collect();
        assert!(rpm.len() >= 2);

        session.force_redraw(ElementClass::Status).unwrap();
        let stats = session.stop_renderer().await.unwrap();
        assert!(stats.draws > 0);
        assert!(session.reset_display().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn throttled_subscription_limits_rate() {
        let session = simulator_session(SimulatorMode::Sweep);
        let start = tokio::time::Instant::now();
        let received: Vec<_> = session.subscribe(RedrawRate::MaxHz(2)).take(3).collect().await;

        assert_eq!(received.len(), 3);
        assert!(start.elapsed() >= Duration::from_millis(1000));
        assert!(received.windows(2).all(|w| w[0].version() < w[1].version()));
    }
}
