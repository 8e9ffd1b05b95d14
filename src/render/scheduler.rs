//! Differential render scheduler
//!
//! Full-screen redraws are slow and flicker on the target display, so the
//! scheduler decides per element whether anything visible changed and
//! whether its class is allowed to redraw yet.
//!
//! An element is drawn when
//! - it has never been drawn, its class was forced, or its binding changed
//!   (these are not rate limited), or
//! - its value, quantized to the displayed precision, or its color hint
//!   differs from what was last drawn and the class minimum interval has
//!   elapsed.
//!
//! A change held back by the rate limit is drawn with the latest value on the
//! next tick the class is eligible again.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::trace;

use crate::config::{RenderSettings, SourceKind};
use crate::panels::{BindingEntry, DisplayBindings};
use crate::schema::{color_hint, signal_info};
use crate::types::{RedrawRate, SignalId, SignalValue, TelemetrySnapshot};

use super::ColorHint;

/// Visual element classes sharing one redraw ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementClass {
    /// The RPM gauge
    PrimaryGauge,
    Panel,
    Indicator,
    /// Source badge
    Status,
}

impl ElementClass {
    pub const ALL: [ElementClass; 4] =
        [ElementClass::PrimaryGauge, ElementClass::Panel, ElementClass::Indicator, ElementClass::Status];

    const fn index(self) -> usize {
        self as usize
    }
}

/// Redraw ceiling per element class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassRates {
    pub primary_gauge: RedrawRate,
    pub panel: RedrawRate,
    pub indicator: RedrawRate,
    pub status: RedrawRate,
}

impl Default for ClassRates {
    fn default() -> Self {
        Self {
            primary_gauge: RedrawRate::MaxHz(20),
            panel: RedrawRate::MaxHz(10),
            indicator: RedrawRate::MaxHz(4),
            status: RedrawRate::MaxHz(1),
        }
    }
}

impl ClassRates {
    pub fn get(&self, class: ElementClass) -> RedrawRate {
        match class {
            ElementClass::PrimaryGauge => self.primary_gauge,
            ElementClass::Panel => self.panel,
            ElementClass::Indicator => self.indicator,
            ElementClass::Status => self.status,
        }
    }
}

/// One drawable element on the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ElementId {
    Rpm,
    Panel(u8),
    Indicator(u8),
    SourceBadge,
}

impl ElementId {
    pub fn class(self) -> ElementClass {
        match self {
            ElementId::Rpm => ElementClass::PrimaryGauge,
            ElementId::Panel(_) => ElementClass::Panel,
            ElementId::Indicator(_) => ElementClass::Indicator,
            ElementId::SourceBadge => ElementClass::Status,
        }
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementId::Rpm => f.write_str("rpm"),
            ElementId::Panel(position) => write!(f, "panel {}", position),
            ElementId::Indicator(position) => write!(f, "indicator {}", position),
            ElementId::SourceBadge => f.write_str("source badge"),
        }
    }
}

/// Value carried by a draw intent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DrawValue {
    Number(f64),
    Flag(bool),
    Text(&'static str),
}

/// Instruction to redraw one element.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawIntent {
    pub element: ElementId,
    pub value: DrawValue,
    pub label: String,
    pub unit: String,
    pub decimals: u8,
    pub color_hint: ColorHint,
}

/// Value as it appears on screen, used for change detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shown {
    Number(i64),
    Flag(bool),
    Text(&'static str),
}

fn quantize(value: DrawValue, decimals: u8) -> Shown {
    match value {
        DrawValue::Number(number) => {
            let factor = 10f64.powi(decimals.min(9) as i32);
            Shown::Number((number * factor).round() as i64)
        }
        DrawValue::Flag(flag) => Shown::Flag(flag),
        DrawValue::Text(text) => Shown::Text(text),
    }
}

/// What was last drawn for one element.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderState {
    last_drawn: Option<Shown>,
    last_hint: Option<ColorHint>,
    last_drawn_at: Option<Instant>,
    generation: u64,
}

impl RenderState {
    /// `false` until the element is drawn the first time.
    pub fn is_drawn(&self) -> bool {
        self.last_drawn.is_some()
    }

    pub fn last_drawn_at(&self) -> Option<Instant> {
        self.last_drawn_at
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Decides which elements to redraw on each render tick.
#[derive(Debug, Clone)]
pub struct RenderScheduler {
    intervals: [Duration; 4],
    forced: [bool; 4],
    states: HashMap<ElementId, RenderState>,
    badge: Option<SourceKind>,
}

/// Candidate for one element on one tick.
struct Candidate<'a> {
    element: ElementId,
    value: DrawValue,
    generation: u64,
    label: &'a str,
    unit: &'a str,
    decimals: u8,
    color_hint: ColorHint,
}

impl RenderScheduler {
    /// Scheduler with the given ceilings, normalized against the tick rate.
    pub fn new(rates: &ClassRates, tick_hz: f64) -> Self {
        let intervals =
            ElementClass::ALL.map(|class| rates.get(class).normalize(tick_hz).min_interval());
        Self { intervals, forced: [false; 4], states: HashMap::new(), badge: None }
    }

    /// Scheduler for a session drawing from `source`.
    pub fn from_settings(settings: &RenderSettings, source: SourceKind) -> Self {
        let scheduler = Self::new(&settings.rates, settings.tick_hz());
        if settings.show_system_indicators {
            scheduler.with_source_badge(source)
        } else {
            scheduler
        }
    }

    /// Also draw the source badge.
    pub fn with_source_badge(mut self, source: SourceKind) -> Self {
        self.badge = Some(source);
        self
    }

    pub fn min_interval(&self, class: ElementClass) -> Duration {
        self.intervals[class.index()]
    }

    /// Redraw every element of `class` on the next pass regardless of change.
    pub fn force_redraw(&mut self, class: ElementClass) {
        self.forced[class.index()] = true;
    }

    /// Forget everything drawn; the next pass draws every enabled element.
    pub fn reset(&mut self) {
        self.states.clear();
        self.forced = [false; 4];
    }

    pub fn state(&self, element: ElementId) -> Option<&RenderState> {
        self.states.get(&element)
    }

    /// Intents for every element that should be redrawn at `now`.
    ///
    /// Elements are visited in screen order: the RPM gauge, panels and
    /// indicators by position, then the source badge. Emitting an intent
    /// records it as drawn.
    pub fn compute_draw_intents(
        &mut self,
        snapshot: &TelemetrySnapshot,
        bindings: &DisplayBindings,
        now: Instant,
    ) -> Vec<DrawIntent> {
        let mut intents = Vec::new();

        let rpm = signal_info(SignalId::Rpm);
        let rpm_value = snapshot.value(SignalId::Rpm);
        self.consider(
            Candidate {
                element: ElementId::Rpm,
                value: draw_value(rpm_value),
                generation: 0,
                label: rpm.label,
                unit: rpm.unit,
                decimals: rpm.default_decimals,
                color_hint: color_hint(SignalId::Rpm, rpm_value),
            },
            now,
            &mut intents,
        );

        for entry in bindings.panels.list() {
            let candidate = bound(ElementId::Panel(entry.position as u8), entry, snapshot);
            self.consider(candidate, now, &mut intents);
        }

        for entry in bindings.indicators.list() {
            let candidate = bound(ElementId::Indicator(entry.position as u8), entry, snapshot);
            self.consider(candidate, now, &mut intents);
        }

        if let Some(source) = self.badge {
            let color_hint = match source {
                SourceKind::Simulator => ColorHint::Warning,
                SourceKind::Bus | SourceKind::Stream => ColorHint::Good,
            };
            self.consider(
                Candidate {
                    element: ElementId::SourceBadge,
                    value: DrawValue::Text(source.badge()),
                    generation: 0,
                    label: "",
                    unit: "",
                    decimals: 0,
                    color_hint,
                },
                now,
                &mut intents,
            );
        }

        self.forced = [false; 4];
        intents
    }

    fn consider(&mut self, candidate: Candidate<'_>, now: Instant, intents: &mut Vec<DrawIntent>) {
        let class = candidate.element.class();
        let interval = self.intervals[class.index()];
        let forced = self.forced[class.index()];
        let shown = quantize(candidate.value, candidate.decimals);
        let state = self.states.entry(candidate.element).or_default();

        let unlimited = state.last_drawn.is_none() || forced || state.generation != candidate.generation;
        if !unlimited {
            if state.last_drawn == Some(shown) && state.last_hint == Some(candidate.color_hint) {
                return;
            }
            let due = state
                .last_drawn_at
                .is_none_or(|at| now.saturating_duration_since(at) >= interval);
            if !due {
                trace!(element = %candidate.element, "Change deferred by rate limit");
                return;
            }
        }

        state.last_drawn = Some(shown);
        state.last_hint = Some(candidate.color_hint);
        state.last_drawn_at = Some(now);
        state.generation = candidate.generation;

        intents.push(DrawIntent {
            element: candidate.element,
            value: candidate.value,
            label: candidate.label.to_string(),
            unit: candidate.unit.to_string(),
            decimals: candidate.decimals,
            color_hint: candidate.color_hint,
        });
    }
}

fn draw_value(value: SignalValue) -> DrawValue {
    match value {
        SignalValue::Number(number) => DrawValue::Number(number),
        SignalValue::Flag(flag) => DrawValue::Flag(flag),
    }
}

fn bound<'a>(element: ElementId, entry: &'a BindingEntry, snapshot: &TelemetrySnapshot) -> Candidate<'a> {
    let value = snapshot.value(entry.signal);
    Candidate {
        element,
        value: draw_value(value),
        generation: entry.generation,
        label: &entry.label,
        unit: &entry.unit,
        decimals: entry.decimals,
        color_hint: color_hint(entry.signal, value),
    }
}
