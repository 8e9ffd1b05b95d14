//! Panel and indicator bindings
//!
//! The dashboard has eight numeric panels and eight indicator lamps. Each
//! position is bound to at most one signal of the matching kind. Bindings are
//! mutated by configuration requests and read by the render scheduler; every
//! change bumps the entry's generation so the scheduler redraws it even when
//! the bound value happens to be unchanged.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::{DisplayLayout, SlotConfig};
use crate::schema::signal_info;
use crate::types::{SignalId, SignalKind};
use crate::{BindError, Result};

/// Positions per binding table.
pub const BINDING_POSITIONS: usize = 8;

/// One bound position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingEntry {
    pub position: usize,
    pub signal: SignalId,
    /// Disabled entries are not drawn at all
    pub enabled: bool,
    pub decimals: u8,
    pub label: String,
    pub unit: String,
    /// Changes whenever this entry is (re)bound or edited
    pub generation: u64,
}

/// One table of eight positions holding signals of a single kind.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelBinding {
    kind: SignalKind,
    entries: [Option<BindingEntry>; BINDING_POSITIONS],
}

/// Generations are unique across every table so a replaced table never
/// repeats a generation the scheduler has already seen.
fn next_generation() -> u64 {
    static NEXT: AtomicU64 = AtomicU64::new(1);
    NEXT.fetch_add(1, Ordering::Relaxed)
}

impl PanelBinding {
    /// Empty table accepting signals of `kind`.
    pub fn new(kind: SignalKind) -> Self {
        Self { kind, entries: Default::default() }
    }

    pub fn kind(&self) -> SignalKind {
        self.kind
    }

    fn check_position(position: usize) -> Result<(), BindError> {
        if position >= BINDING_POSITIONS {
            return Err(BindError::InvalidPosition { position, max: BINDING_POSITIONS - 1 });
        }
        Ok(())
    }

    /// Bind `signal` at `position` with its default label, unit and precision.
    pub fn bind(&mut self, position: usize, signal: SignalId) -> Result<(), BindError> {
        Self::check_position(position)?;
        if signal.kind() != self.kind {
            return Err(BindError::KindMismatch { signal, expected: self.kind, actual: signal.kind() });
        }

        let info = signal_info(signal);
        let generation = next_generation();
        self.entries[position] = Some(BindingEntry {
            position,
            signal,
            enabled: true,
            decimals: info.default_decimals,
            label: info.label.to_string(),
            unit: info.unit.to_string(),
            generation,
        });
        Ok(())
    }

    /// Bind by numeric signal code.
    pub fn bind_code(&mut self, position: usize, code: u8) -> Result<(), BindError> {
        Self::check_position(position)?;
        let signal = SignalId::from_code(code).ok_or(BindError::UnknownSignal { code })?;
        self.bind(position, signal)
    }

    /// Clear `position`, returning what was bound there.
    pub fn unbind(&mut self, position: usize) -> Result<Option<BindingEntry>, BindError> {
        Self::check_position(position)?;
        Ok(self.entries[position].take())
    }

    pub fn get(&self, position: usize) -> Option<&BindingEntry> {
        self.entries.get(position).and_then(Option::as_ref)
    }

    /// Enabled entries in position order.
    pub fn list(&self) -> impl Iterator<Item = &BindingEntry> {
        self.entries.iter().flatten().filter(|entry| entry.enabled)
    }

    /// Every bound entry, enabled or not, in position order.
    pub fn entries(&self) -> impl Iterator<Item = &BindingEntry> {
        self.entries.iter().flatten()
    }

    /// Apply `edit` to a bound entry and bump its generation.
    ///
    /// Returns `Ok(false)` when nothing is bound at `position`.
    fn edit(
        &mut self,
        position: usize,
        edit: impl FnOnce(&mut BindingEntry),
    ) -> Result<bool, BindError> {
        Self::check_position(position)?;
        let Some(entry) = self.entries[position].as_mut() else {
            return Ok(false);
        };
        edit(entry);
        entry.generation = next_generation();
        Ok(true)
    }

    pub fn set_enabled(&mut self, position: usize, enabled: bool) -> Result<bool, BindError> {
        self.edit(position, |entry| entry.enabled = enabled)
    }

    pub fn set_decimals(&mut self, position: usize, decimals: u8) -> Result<bool, BindError> {
        self.edit(position, |entry| entry.decimals = decimals)
    }

    pub fn set_label(&mut self, position: usize, label: impl Into<String>) -> Result<bool, BindError> {
        let label = label.into();
        self.edit(position, |entry| entry.label = label)
    }

    pub fn set_unit(&mut self, position: usize, unit: impl Into<String>) -> Result<bool, BindError> {
        let unit = unit.into();
        self.edit(position, |entry| entry.unit = unit)
    }

    fn apply_slots(&mut self, slots: &[SlotConfig]) -> Result<(), BindError> {
        if slots.len() > BINDING_POSITIONS {
            return Err(BindError::InvalidPosition { position: slots.len() - 1, max: BINDING_POSITIONS - 1 });
        }
        for slot in slots {
            if self.get(slot.position).is_some() {
                return Err(BindError::InvalidPosition {
                    position: slot.position,
                    max: BINDING_POSITIONS - 1,
                });
            }
            self.bind(slot.position, slot.signal)?;
            self.edit(slot.position, |entry| {
                entry.enabled = slot.enabled;
                if let Some(decimals) = slot.decimals {
                    entry.decimals = decimals;
                }
                if let Some(label) = &slot.label {
                    entry.label = label.clone();
                }
                if let Some(unit) = &slot.unit {
                    entry.unit = unit.clone();
                }
            })?;
        }
        Ok(())
    }

    fn to_slots(&self) -> Vec<SlotConfig> {
        self.entries()
            .map(|entry| {
                let info = signal_info(entry.signal);
                SlotConfig {
                    position: entry.position,
                    signal: entry.signal,
                    enabled: entry.enabled,
                    decimals: (entry.decimals != info.default_decimals).then_some(entry.decimals),
                    label: (entry.label != info.label).then(|| entry.label.clone()),
                    unit: (entry.unit != info.unit).then(|| entry.unit.clone()),
                }
            })
            .collect()
    }
}

/// The panel and indicator tables together.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayBindings {
    pub panels: PanelBinding,
    pub indicators: PanelBinding,
}

impl Default for DisplayBindings {
    fn default() -> Self {
        // The default layout always binds
        Self::from_layout(&DisplayLayout::default()).unwrap_or_else(|_| Self::empty())
    }
}

impl DisplayBindings {
    /// Both tables with nothing bound.
    pub fn empty() -> Self {
        Self { panels: PanelBinding::new(SignalKind::Numeric), indicators: PanelBinding::new(SignalKind::Flag) }
    }

    /// Bind a persisted layout. Any invalid slot rejects the whole layout.
    pub fn from_layout(layout: &DisplayLayout) -> Result<Self> {
        let mut bindings = Self::empty();
        bindings.panels.apply_slots(&layout.panels)?;
        bindings.indicators.apply_slots(&layout.indicators)?;
        Ok(bindings)
    }

    /// Persistable form of the current bindings.
    pub fn to_layout(&self) -> DisplayLayout {
        DisplayLayout { panels: self.panels.to_slots(), indicators: self.indicators.to_slots() }
    }

    /// The table holding signals of `kind`.
    pub fn table_for(&mut self, kind: SignalKind) -> &mut PanelBinding {
        match kind {
            SignalKind::Numeric => &mut self.panels,
            SignalKind::Flag => &mut self.indicators,
        }
    }
}
