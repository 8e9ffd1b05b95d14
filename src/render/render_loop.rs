//! Periodic render task

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::RenderSettings;
use crate::panels::DisplayBindings;
use crate::types::TelemetrySnapshot;

use super::{ElementClass, RenderScheduler, Renderer};

/// Requests sent to a running render task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderCommand {
    /// Redraw every element of a class on the next tick
    ForceRedraw(ElementClass),
    /// Redraw everything on the next tick
    Reset,
}

/// Counters returned when the render task ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub ticks: u64,
    pub draws: u64,
    pub render_errors: u64,
}

/// Handle to a spawned render task.
pub struct RenderHandle {
    pub commands: mpsc::UnboundedSender<RenderCommand>,
    pub task: JoinHandle<RenderStats>,
}

/// Ticks on a fixed interval, reads the latest published snapshot and
/// bindings, and hands changed elements to the renderer.
///
/// The task never touches a transport, so a slow decode cycle cannot stall
/// drawing and a slow display cannot stall decoding.
pub struct RenderLoop;

impl RenderLoop {
    pub fn spawn<R>(
        mut renderer: R,
        scheduler: RenderScheduler,
        settings: &RenderSettings,
        snapshots: watch::Receiver<Arc<TelemetrySnapshot>>,
        bindings: watch::Receiver<Arc<DisplayBindings>>,
        cancel: CancellationToken,
    ) -> RenderHandle
    where
        R: Renderer,
    {
        renderer.configure(settings);
        let tick = settings.tick();
        let (commands, command_rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(async move {
            Self::render_task(renderer, scheduler, tick, snapshots, bindings, command_rx, cancel)
                .await
        });

        RenderHandle { commands, task }
    }

    /// Run one render pass and return how many intents were drawn and failed.
    pub fn render_once<R>(
        renderer: &mut R,
        scheduler: &mut RenderScheduler,
        snapshot: &TelemetrySnapshot,
        bindings: &DisplayBindings,
        now: Instant,
    ) -> (u64, u64)
    where
        R: Renderer + ?Sized,
    {
        let mut drawn = 0;
        let mut failed = 0;
        for intent in scheduler.compute_draw_intents(snapshot, bindings, now) {
            match renderer.draw(&intent) {
                Ok(()) => drawn += 1,
                Err(e) => {
                    failed += 1;
                    warn!(element = %intent.element, "Draw failed: {}", e);
                }
            }
        }
        (drawn, failed)
    }

    async fn render_task<R>(
        mut renderer: R,
        mut scheduler: RenderScheduler,
        tick: Duration,
        snapshots: watch::Receiver<Arc<TelemetrySnapshot>>,
        bindings: watch::Receiver<Arc<DisplayBindings>>,
        mut commands: mpsc::UnboundedReceiver<RenderCommand>,
        cancel: CancellationToken,
    ) -> RenderStats
    where
        R: Renderer,
    {
        info!(?tick, "Render task started");
        let mut stats = RenderStats::default();
        let mut interval = tokio::time::interval(tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Render task cancelled");
                    break;
                }
                Some(command) = commands.recv() => {
                    match command {
                        RenderCommand::ForceRedraw(class) => scheduler.force_redraw(class),
                        RenderCommand::Reset => scheduler.reset(),
                    }
                }
                _ = interval.tick() => {
                    let snapshot = snapshots.borrow().clone();
                    let current = bindings.borrow().clone();
                    let (drawn, failed) = Self::render_once(
                        &mut renderer,
                        &mut scheduler,
                        &snapshot,
                        &current,
                        Instant::now(),
                    );
                    stats.ticks += 1;
                    stats.draws += drawn;
                    stats.render_errors += failed;
                }
            }
        }

        info!(ticks = stats.ticks, draws = stats.draws, errors = stats.render_errors, "Render task ended");
        stats
    }
}
